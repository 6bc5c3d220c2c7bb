//! Application error types.

use axum::{
    Json,
    http::{HeaderValue, StatusCode, header::RETRY_AFTER},
    response::{IntoResponse, Response},
};
use invoicer_core::auth::AuthError;
use invoicer_core::auth::oauth::OAuthError;
use invoicer_core::models::invoice::InvoiceError;
use invoicer_core::rate_limit::RETRY_AFTER_SECS;
use invoicer_core::render::RenderError;
use thiserror::Error;
use tracing::error;

use crate::models::ErrorResponse;

/// Convenience alias for handler return types.
pub type AppResult<T> = Result<T, AppError>;

/// Application-level errors with HTTP status mapping.
///
/// `Internal` and `UpstreamAuth` details are logged, never sent.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Rate limit exceeded")]
    RateLimited,

    #[error("Federated authentication failed: {0}")]
    UpstreamAuth(String),

    #[error("Internal server error")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, message) = match &self {
            AppError::BadRequest(m) => (StatusCode::BAD_REQUEST, "bad_request", m.as_str()),
            AppError::Validation(m) => (StatusCode::BAD_REQUEST, "validation_error", m.as_str()),
            AppError::Conflict(m) => (StatusCode::CONFLICT, "conflict", m.as_str()),
            AppError::Unauthorized(m) => (StatusCode::UNAUTHORIZED, "unauthorized", m.as_str()),
            AppError::ServiceUnavailable(m) => {
                (StatusCode::SERVICE_UNAVAILABLE, "unavailable", m.as_str())
            }
            AppError::RateLimited => (
                StatusCode::TOO_MANY_REQUESTS,
                "too_many_requests",
                "Rate limit exceeded. Please try again later.",
            ),
            AppError::UpstreamAuth(detail) => {
                error!(detail = %detail, "federated authentication failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "Authentication failed",
                )
            }
            AppError::Internal(detail) => {
                error!(detail = %detail, "internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "Internal server error",
                )
            }
        };
        let body = Json(ErrorResponse {
            error: error.to_string(),
            message: message.to_string(),
        });
        let mut response = (status, body).into_response();
        if matches!(self, AppError::RateLimited) {
            response
                .headers_mut()
                .insert(RETRY_AFTER, HeaderValue::from(RETRY_AFTER_SECS));
        }
        response
    }
}

impl From<AuthError> for AppError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::EmailTaken => AppError::Conflict("Email already registered".into()),
            AuthError::UserNotFound => AppError::Unauthorized("User not found".into()),
            AuthError::CredentialError => {
                AppError::Unauthorized("Invalid email or password".into())
            }
            AuthError::Token(_) | AuthError::WrongTokenKind { .. } => {
                AppError::Unauthorized("Invalid or expired token".into())
            }
            AuthError::Internal(msg) => AppError::Internal(msg),
        }
    }
}

impl From<OAuthError> for AppError {
    fn from(e: OAuthError) -> Self {
        AppError::UpstreamAuth(e.to_string())
    }
}

impl From<InvoiceError> for AppError {
    fn from(e: InvoiceError) -> Self {
        AppError::Validation(format!("Invalid invoice data: {e}"))
    }
}

impl From<RenderError> for AppError {
    fn from(e: RenderError) -> Self {
        AppError::Internal(e.to_string())
    }
}
