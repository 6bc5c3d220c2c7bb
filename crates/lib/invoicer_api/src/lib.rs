//! # invoicer_api
//!
//! HTTP API library for Invoicer: authentication routes, the bearer-token
//! gate, and per-caller rate limiting.

pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;

use std::sync::Arc;

use axum::Router;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderValue, Method};
use axum::routing::{get, post};
use chrono::Duration;
use invoicer_core::auth::jwt::{REFRESH_TOKEN_EXPIRY_DAYS, TokenService};
use invoicer_core::auth::oauth::OAuthBroker;
use invoicer_core::auth::store::CredentialStore;
use invoicer_core::rate_limit::RateLimiter;
use invoicer_core::render::InvoiceRenderer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::config::{ApiConfig, ConfigError};
use crate::handlers::{auth, health, invoice, oauth};

/// Route paths.
pub mod routes {
    pub const GET_HEALTH: &str = "/health";
    pub const POST_AUTH_REGISTER: &str = "/api/auth/register";
    pub const POST_AUTH_LOGIN: &str = "/api/auth/login";
    pub const POST_AUTH_REFRESH: &str = "/api/auth/refresh";
    pub const GET_AUTH_GOOGLE: &str = "/api/auth/google";
    pub const GET_AUTH_GOOGLE_CALLBACK: &str = "/api/auth/google/callback";
    pub const GET_ME: &str = "/api/me";
    pub const POST_GENERATE_PDF: &str = "/api/generate-pdf";
}

/// Shared application state passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    /// API configuration.
    pub config: ApiConfig,
    /// User records.
    pub store: Arc<CredentialStore>,
    /// Token issue/validation.
    pub tokens: Arc<TokenService>,
    /// Federated login; `None` when not configured.
    pub oauth: Option<Arc<OAuthBroker>>,
    /// Per-caller request budgets.
    pub rate_limiter: Arc<RateLimiter>,
    /// PDF renderer; `None` until one is installed with [`AppState::with_renderer`].
    pub renderer: Option<Arc<dyn InvoiceRenderer>>,
}

impl AppState {
    /// Validate `config` and build every component from it.
    pub fn new(config: ApiConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let store = Arc::new(CredentialStore::new());
        let tokens = Arc::new(TokenService::new(
            config.jwt_secret.as_bytes(),
            Duration::hours(config.access_token_hours),
            Duration::days(REFRESH_TOKEN_EXPIRY_DAYS),
        ));
        let oauth = config
            .google
            .clone()
            .map(|settings| OAuthBroker::new(settings, Arc::clone(&store)))
            .transpose()
            .map_err(|e| ConfigError::OAuth(e.to_string()))?
            .map(Arc::new);
        let rate_limiter = Arc::new(RateLimiter::new(
            config.rate_limit_per_min,
            config.rate_limit_auth_per_min,
        ));

        Ok(Self {
            config,
            store,
            tokens,
            oauth,
            rate_limiter,
            renderer: None,
        })
    }

    /// Install the document renderer used by `POST /api/generate-pdf`.
    pub fn with_renderer(mut self, renderer: Arc<dyn InvoiceRenderer>) -> Self {
        self.renderer = Some(renderer);
        self
    }
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin.trim()) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .allow_credentials(true)
}

/// Builds the Axum router with all routes and shared state.
///
/// Serve it with `into_make_service_with_connect_info::<SocketAddr>()` so
/// anonymous callers are rate limited per IP.
pub fn router(state: AppState) -> Router {
    // Public routes (no auth required)
    let public = Router::new()
        .route(routes::GET_HEALTH, get(health::health_handler))
        .route(routes::POST_AUTH_REGISTER, post(auth::register_handler))
        .route(routes::POST_AUTH_LOGIN, post(auth::login_handler))
        .route(routes::POST_AUTH_REFRESH, post(auth::refresh_handler))
        .route(routes::GET_AUTH_GOOGLE, get(oauth::google_login_handler))
        .route(
            routes::GET_AUTH_GOOGLE_CALLBACK,
            get(oauth::google_callback_handler),
        );

    // Protected routes (require auth)
    let protected = Router::new()
        .route(routes::GET_ME, get(auth::me_handler))
        .route(routes::POST_GENERATE_PDF, post(invoice::generate_pdf_handler))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::require_auth,
        ));

    Router::new()
        .merge(public)
        .merge(protected)
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::rate_limit::rate_limit,
        ))
        .layer(cors_layer(&state.config.allowed_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
