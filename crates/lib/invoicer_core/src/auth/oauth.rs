//! Google OAuth support for federated login.
//!
//! Drives the authorization-code flow: state generation, consent URL,
//! code exchange, profile fetch, and user upsert. CSRF state comparison is
//! the caller's job; the state travels in a cookie, not in server memory.

use std::sync::Arc;
use std::time::Duration;

use base64::Engine;
use rand::RngCore;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;
use url::Url;

use super::store::{CredentialStore, normalize_email};
use crate::models::auth::{Provider, User};

/// Google consent page.
pub const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/auth";
/// Google token endpoint.
pub const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
/// Google profile endpoint.
pub const GOOGLE_USERINFO_URL: &str = "https://www.googleapis.com/oauth2/v2/userinfo";

/// Scopes requested on the consent page.
pub const SCOPES: &[&str] = &["email", "profile"];

/// Timeout applied to every request to the identity provider.
const UPSTREAM_TIMEOUT: Duration = Duration::from_secs(10);

/// Random bytes in a state token (256 bits).
const STATE_BYTES: usize = 32;

/// Federated login errors. Each upstream step has its own variant so logs
/// can tell them apart; none of the detail is meant for the client.
#[derive(Debug, Error)]
pub enum OAuthError {
    #[error("failed to exchange code: {0}")]
    ExchangeFailed(String),

    #[error("failed to fetch user info: {0}")]
    FetchFailed(String),

    #[error("identity provider returned status {status} from {endpoint}")]
    UpstreamStatus { endpoint: &'static str, status: u16 },

    #[error("invalid identity provider response: {0}")]
    InvalidResponse(String),

    #[error("email not verified by identity provider")]
    UnverifiedEmail,

    #[error("http client: {0}")]
    Client(String),
}

/// Client credentials and endpoints for the identity provider.
#[derive(Clone)]
pub struct OAuthSettings {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_url: String,
    pub auth_url: String,
    pub token_url: String,
    pub userinfo_url: String,
}

impl OAuthSettings {
    /// Settings pointing at Google's production endpoints.
    pub fn google(client_id: String, client_secret: String, redirect_url: String) -> Self {
        Self {
            client_id,
            client_secret,
            redirect_url,
            auth_url: GOOGLE_AUTH_URL.to_string(),
            token_url: GOOGLE_TOKEN_URL.to_string(),
            userinfo_url: GOOGLE_USERINFO_URL.to_string(),
        }
    }
}

impl std::fmt::Debug for OAuthSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthSettings")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("redirect_url", &self.redirect_url)
            .field("auth_url", &self.auth_url)
            .field("token_url", &self.token_url)
            .field("userinfo_url", &self.userinfo_url)
            .finish()
    }
}

/// Response from the token endpoint.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Response from the userinfo endpoint.
#[derive(Debug, Deserialize)]
struct GoogleUserInfo {
    email: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    verified_email: bool,
}

/// Generate a cryptographic state parameter (CSRF token), URL-safe.
pub fn generate_state() -> String {
    let mut bytes = [0u8; STATE_BYTES];
    rand::rng().fill_bytes(&mut bytes);
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

/// Authorization-code flow against one identity provider.
pub struct OAuthBroker {
    settings: OAuthSettings,
    auth_url: Url,
    http: reqwest::Client,
    store: Arc<CredentialStore>,
}

impl OAuthBroker {
    pub fn new(settings: OAuthSettings, store: Arc<CredentialStore>) -> Result<Self, OAuthError> {
        let auth_url = Url::parse(&settings.auth_url)
            .map_err(|e| OAuthError::Client(format!("invalid authorization url: {e}")))?;
        let http = reqwest::Client::builder()
            .timeout(UPSTREAM_TIMEOUT)
            .build()
            .map_err(|e| OAuthError::Client(e.to_string()))?;
        Ok(Self {
            settings,
            auth_url,
            http,
            store,
        })
    }

    /// Generate a fresh state token.
    pub fn generate_state(&self) -> String {
        generate_state()
    }

    /// Consent page URL for `state`. Deterministic in its inputs.
    pub fn build_authorization_url(&self, state: &str) -> Url {
        let mut url = self.auth_url.clone();
        url.query_pairs_mut()
            .append_pair("client_id", &self.settings.client_id)
            .append_pair("redirect_uri", &self.settings.redirect_url)
            .append_pair("response_type", "code")
            .append_pair("scope", &SCOPES.join(" "))
            .append_pair("state", state)
            .append_pair("access_type", "offline");
        url
    }

    /// Exchange `code`, fetch the profile, and upsert the federated user.
    ///
    /// Holds no lock across the network calls; dropping the future cancels
    /// the in-flight request.
    pub async fn complete_flow(&self, code: &str) -> Result<User, OAuthError> {
        let access_token = self.exchange_code(code).await?;
        let info = self.fetch_user_info(&access_token).await?;

        if !info.verified_email {
            return Err(OAuthError::UnverifiedEmail);
        }

        let email = normalize_email(&info.email);
        if email.is_empty() {
            return Err(OAuthError::InvalidResponse("empty email".into()));
        }
        let user = self
            .store
            .upsert_federated_user(&email, info.name.trim(), Provider::Google);
        debug!(user_id = %user.id, "federated login completed");
        Ok(user)
    }

    async fn exchange_code(&self, code: &str) -> Result<String, OAuthError> {
        let params = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("client_id", self.settings.client_id.as_str()),
            ("client_secret", self.settings.client_secret.as_str()),
            ("redirect_uri", self.settings.redirect_url.as_str()),
        ];

        let resp = self
            .http
            .post(&self.settings.token_url)
            .form(&params)
            .send()
            .await
            .map_err(|e| OAuthError::ExchangeFailed(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(OAuthError::UpstreamStatus {
                endpoint: "token",
                status: resp.status().as_u16(),
            });
        }

        let token = resp
            .json::<TokenResponse>()
            .await
            .map_err(|e| OAuthError::ExchangeFailed(format!("token response parse error: {e}")))?;
        Ok(token.access_token)
    }

    async fn fetch_user_info(&self, access_token: &str) -> Result<GoogleUserInfo, OAuthError> {
        let resp = self
            .http
            .get(&self.settings.userinfo_url)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| OAuthError::FetchFailed(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(OAuthError::UpstreamStatus {
                endpoint: "userinfo",
                status: resp.status().as_u16(),
            });
        }

        resp.json::<GoogleUserInfo>()
            .await
            .map_err(|e| OAuthError::InvalidResponse(format!("user info parse error: {e}")))
    }
}
