//! Invoice document handler.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::http::HeaderValue;
use axum::response::IntoResponse;
use axum::{Extension, Json};
use invoicer_core::models::invoice::Invoice;
use tracing::{debug, info};

use super::json_body;
use crate::AppState;
use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthenticatedUser;

/// `POST /api/generate-pdf`: validate an invoice and return it as a PDF attachment.
pub async fn generate_pdf_handler(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(claims)): Extension<AuthenticatedUser>,
    body: Result<Json<Invoice>, JsonRejection>,
) -> AppResult<impl IntoResponse> {
    let invoice = json_body(body)?;
    invoice.validate().inspect_err(|e| {
        debug!(user_id = %claims.sub, error = %e, "invoice rejected");
    })?;

    let renderer = state
        .renderer
        .as_ref()
        .map(Arc::clone)
        .ok_or_else(|| AppError::ServiceUnavailable("PDF rendering is not configured".into()))?;

    let disposition = HeaderValue::from_str(&format!("attachment; filename={}", invoice.file_name()))
        .map_err(|e| AppError::Internal(format!("content-disposition: {e}")))?;

    // Rendering is CPU-bound.
    let (invoice, pdf) = tokio::task::spawn_blocking(move || {
        let pdf = renderer.render(&invoice);
        (invoice, pdf)
    })
    .await
    .map_err(|e| AppError::Internal(format!("render task: {e}")))?;
    let pdf = pdf?;

    info!(
        user_id = %claims.sub,
        invoice_number = %invoice.invoice_number,
        bytes = pdf.len(),
        "invoice rendered"
    );

    Ok((
        [
            (CONTENT_TYPE, HeaderValue::from_static("application/pdf")),
            (CONTENT_DISPOSITION, disposition),
        ],
        pdf,
    ))
}
