//! Request handlers.

pub mod auth;
pub mod health;
pub mod invoice;
pub mod oauth;

use axum::Json;
use axum::extract::rejection::JsonRejection;

use crate::error::{AppError, AppResult};

/// Unwrap a JSON body, mapping extractor failures to a 400 envelope.
pub(crate) fn json_body<T>(body: Result<Json<T>, JsonRejection>) -> AppResult<T> {
    body.map(|Json(value)| value).map_err(|rejection| {
        tracing::debug!(error = %rejection, "rejected request body");
        AppError::BadRequest("Invalid JSON body".into())
    })
}
