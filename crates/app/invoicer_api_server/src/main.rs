//! Invoicer API server binary.
//!
//! Reads configuration from flags and environment (a `.env` file is loaded
//! first if present), then serves the API until Ctrl-C.

use std::net::SocketAddr;
use std::time::Duration;

use clap::Parser;
use invoicer_api::config::{ApiConfig, DEFAULT_BIND_ADDR};
use invoicer_core::auth::jwt::DEFAULT_ACCESS_TOKEN_HOURS;
use invoicer_core::rate_limit::{DEFAULT_ANONYMOUS_PER_MIN, DEFAULT_AUTHENTICATED_PER_MIN};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "info,invoicer_api=debug,invoicer_core=debug";

/// CLI arguments for the API server.
#[derive(Parser, Debug)]
#[command(name = "invoicer_api_server", about = "Invoicer API server")]
struct Args {
    /// Address to listen on.
    #[arg(long, env = "BIND_ADDR", default_value = DEFAULT_BIND_ADDR)]
    bind_addr: String,

    /// Token signing secret.
    #[arg(long, env = "JWT_SECRET", hide_env_values = true)]
    jwt_secret: String,

    /// Access token lifetime in hours.
    #[arg(long, env = "JWT_EXPIRY_HOURS", default_value_t = DEFAULT_ACCESS_TOKEN_HOURS)]
    jwt_expiry_hours: i64,

    /// Anonymous requests per minute.
    #[arg(long, env = "RATE_LIMIT_PER_MIN", default_value_t = DEFAULT_ANONYMOUS_PER_MIN)]
    rate_limit_per_min: u32,

    /// Authenticated requests per minute.
    #[arg(long, env = "RATE_LIMIT_AUTH_PER_MIN", default_value_t = DEFAULT_AUTHENTICATED_PER_MIN)]
    rate_limit_auth_per_min: u32,

    /// Seconds between sweeps of idle rate-limit buckets.
    #[arg(long, env = "RATE_LIMIT_SWEEP_SECS", default_value_t = 180)]
    rate_limit_sweep_secs: u64,

    /// Seconds of inactivity after which a bucket is swept.
    #[arg(long, env = "RATE_LIMIT_STALE_SECS", default_value_t = 300)]
    rate_limit_stale_secs: u64,

    /// Google OAuth client ID.
    #[arg(long, env = "GOOGLE_CLIENT_ID")]
    google_client_id: Option<String>,

    /// Google OAuth client secret.
    #[arg(long, env = "GOOGLE_CLIENT_SECRET", hide_env_values = true)]
    google_client_secret: Option<String>,

    /// Google OAuth redirect URL.
    #[arg(long, env = "GOOGLE_REDIRECT_URL")]
    google_redirect_url: Option<String>,

    /// Comma-separated CORS origins.
    #[arg(
        long,
        env = "ALLOWED_ORIGINS",
        value_delimiter = ',',
        default_value = "http://localhost:5173,http://localhost:3000"
    )]
    allowed_origins: Vec<String>,

    /// Mark cookies `Secure` (enable behind HTTPS).
    #[arg(long, env = "SECURE_COOKIES", default_value_t = false)]
    secure_cookies: bool,
}

impl Args {
    fn into_config(self) -> ApiConfig {
        let mut config = ApiConfig::new(self.jwt_secret).with_google(
            self.google_client_id,
            self.google_client_secret,
            self.google_redirect_url,
        );
        config.bind_addr = self.bind_addr;
        config.access_token_hours = self.jwt_expiry_hours;
        config.rate_limit_per_min = self.rate_limit_per_min;
        config.rate_limit_auth_per_min = self.rate_limit_auth_per_min;
        config.rate_limit_sweep_interval = Duration::from_secs(self.rate_limit_sweep_secs);
        config.rate_limit_stale_after = Duration::from_secs(self.rate_limit_stale_secs);
        config.allowed_origins = self.allowed_origins;
        config.secure_cookies = self.secure_cookies;
        config
    }
}

async fn shutdown_signal(shutdown: CancellationToken) {
    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                warn!(error = %e, "failed to listen for ctrl-c");
            }
            info!("shutdown requested");
            shutdown.cancel();
        }
        _ = shutdown.cancelled() => {}
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .init();

    let config = Args::parse().into_config();
    let state = invoicer_api::AppState::new(config.clone())?;

    info!(
        bind_addr = %config.bind_addr,
        google = state.oauth.is_some(),
        rate_limit_per_min = config.rate_limit_per_min,
        rate_limit_auth_per_min = config.rate_limit_auth_per_min,
        "starting invoicer_api_server"
    );

    let shutdown = CancellationToken::new();
    let sweeper = state.rate_limiter.spawn_sweeper(
        config.rate_limit_sweep_interval,
        config.rate_limit_stale_after,
        shutdown.clone(),
    );

    let app = invoicer_api::router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    info!(addr = %listener.local_addr()?, "REST API listening");

    let served = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal(shutdown.clone()))
    .await;

    // Stop the sweeper whether the server exited cleanly or not.
    shutdown.cancel();
    if let Err(e) = sweeper.await {
        warn!(error = %e, "rate-limit sweeper task failed");
    }

    served?;
    info!("server stopped");
    Ok(())
}
