//! API server configuration.

use std::time::Duration;

use invoicer_core::auth::jwt::DEFAULT_ACCESS_TOKEN_HOURS;
use invoicer_core::auth::oauth::OAuthSettings;
use invoicer_core::rate_limit::{
    DEFAULT_ANONYMOUS_PER_MIN, DEFAULT_AUTHENTICATED_PER_MIN, DEFAULT_STALE_AFTER,
    DEFAULT_SWEEP_INTERVAL,
};
use thiserror::Error;

/// Default listen address.
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";

/// Default CORS origins (local frontend dev servers).
pub const DEFAULT_ALLOWED_ORIGINS: &[&str] = &["http://localhost:5173", "http://localhost:3000"];

/// Invalid startup configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("JWT_SECRET is required")]
    MissingSecret,

    #[error("{0} must be at least 1 request per minute")]
    ZeroCeiling(&'static str),

    #[error("rate-limit staleness ({stale:?}) must exceed the sweep interval ({sweep:?})")]
    StalenessTooShort { stale: Duration, sweep: Duration },

    #[error("federated login setup failed: {0}")]
    OAuth(String),
}

/// Configuration for the API server. Immutable once the server starts.
#[derive(Clone)]
pub struct ApiConfig {
    /// Address to bind the HTTP listener (e.g. "0.0.0.0:8080").
    pub bind_addr: String,
    /// JWT signing secret.
    pub jwt_secret: String,
    /// Access token lifetime in hours. Refresh lifetime is fixed at 7 days.
    pub access_token_hours: i64,
    /// Anonymous ceiling, requests per minute.
    pub rate_limit_per_min: u32,
    /// Authenticated ceiling, requests per minute.
    pub rate_limit_auth_per_min: u32,
    /// How often idle rate-limit buckets are swept.
    pub rate_limit_sweep_interval: Duration,
    /// Idle time after which a bucket is swept.
    pub rate_limit_stale_after: Duration,
    /// Google client settings; `None` disables federated login.
    pub google: Option<OAuthSettings>,
    /// CORS allow-list.
    pub allowed_origins: Vec<String>,
    /// Set the `Secure` attribute on cookies.
    pub secure_cookies: bool,
}

impl std::fmt::Debug for ApiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiConfig")
            .field("bind_addr", &self.bind_addr)
            .field("jwt_secret", &"<redacted>")
            .field("access_token_hours", &self.access_token_hours)
            .field("rate_limit_per_min", &self.rate_limit_per_min)
            .field("rate_limit_auth_per_min", &self.rate_limit_auth_per_min)
            .field("rate_limit_sweep_interval", &self.rate_limit_sweep_interval)
            .field("rate_limit_stale_after", &self.rate_limit_stale_after)
            .field("google", &self.google)
            .field("allowed_origins", &self.allowed_origins)
            .field("secure_cookies", &self.secure_cookies)
            .finish()
    }
}

impl ApiConfig {
    /// Configuration with defaults for everything but the secret.
    pub fn new(jwt_secret: impl Into<String>) -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR.into(),
            jwt_secret: jwt_secret.into(),
            access_token_hours: DEFAULT_ACCESS_TOKEN_HOURS,
            rate_limit_per_min: DEFAULT_ANONYMOUS_PER_MIN,
            rate_limit_auth_per_min: DEFAULT_AUTHENTICATED_PER_MIN,
            rate_limit_sweep_interval: DEFAULT_SWEEP_INTERVAL,
            rate_limit_stale_after: DEFAULT_STALE_AFTER,
            google: None,
            allowed_origins: DEFAULT_ALLOWED_ORIGINS.iter().map(|s| s.to_string()).collect(),
            secure_cookies: false,
        }
    }

    /// Enable Google login when both client id and secret are non-empty.
    pub fn with_google(
        mut self,
        client_id: Option<String>,
        client_secret: Option<String>,
        redirect_url: Option<String>,
    ) -> Self {
        self.google = match (client_id, client_secret) {
            (Some(id), Some(secret)) if !id.is_empty() && !secret.is_empty() => Some(
                OAuthSettings::google(id, secret, redirect_url.unwrap_or_default()),
            ),
            _ => None,
        };
        self
    }

    /// Reject configurations the server cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.jwt_secret.is_empty() {
            return Err(ConfigError::MissingSecret);
        }
        if self.rate_limit_per_min == 0 {
            return Err(ConfigError::ZeroCeiling("RATE_LIMIT_PER_MIN"));
        }
        if self.rate_limit_auth_per_min == 0 {
            return Err(ConfigError::ZeroCeiling("RATE_LIMIT_AUTH_PER_MIN"));
        }
        if self.rate_limit_stale_after <= self.rate_limit_sweep_interval {
            return Err(ConfigError::StalenessTooShort {
                stale: self.rate_limit_stale_after,
                sweep: self.rate_limit_sweep_interval,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        let config = ApiConfig::new("secret");
        assert_eq!(config.access_token_hours, 24);
        assert_eq!(config.rate_limit_per_min, 30);
        assert_eq!(config.rate_limit_auth_per_min, 60);
        assert!(config.google.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn empty_secret_is_rejected() {
        assert!(matches!(
            ApiConfig::new("").validate(),
            Err(ConfigError::MissingSecret)
        ));
    }

    #[test]
    fn zero_ceiling_is_rejected() {
        let mut config = ApiConfig::new("secret");
        config.rate_limit_auth_per_min = 0;
        assert!(matches!(config.validate(), Err(ConfigError::ZeroCeiling(_))));
    }

    #[test]
    fn staleness_must_exceed_sweep_interval() {
        let mut config = ApiConfig::new("secret");
        config.rate_limit_stale_after = config.rate_limit_sweep_interval;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::StalenessTooShort { .. })
        ));
    }

    #[test]
    fn google_requires_id_and_secret() {
        let none = ApiConfig::new("s").with_google(Some("id".into()), None, None);
        assert!(none.google.is_none());

        let empty = ApiConfig::new("s").with_google(Some("id".into()), Some(String::new()), None);
        assert!(empty.google.is_none());

        let some = ApiConfig::new("s").with_google(
            Some("id".into()),
            Some("secret".into()),
            Some("http://localhost/cb".into()),
        );
        let google = some.google.expect("google enabled");
        assert_eq!(google.client_id, "id");
        assert_eq!(google.redirect_url, "http://localhost/cb");
    }

    #[test]
    fn debug_redacts_secret() {
        let config = ApiConfig::new("very-secret-value");
        assert!(!format!("{config:?}").contains("very-secret-value"));
    }
}
