//! Liveness endpoint.

use axum::Json;

use crate::models::HealthResponse;

/// Service name reported by `/health`.
pub const SERVICE_NAME: &str = "invoicer-api";

/// `GET /health`: liveness probe.
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".into(),
        service: SERVICE_NAME.into(),
    })
}
