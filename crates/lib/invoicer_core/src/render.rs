//! Document rendering seam.
//!
//! Drawing the document is not done here. The API holds an
//! [`InvoiceRenderer`] supplied at startup and hands it validated invoices.

use thiserror::Error;

use crate::models::invoice::Invoice;

#[derive(Debug, Error)]
#[error("render failed: {0}")]
pub struct RenderError(pub String);

/// Turns a validated [`Invoice`] into PDF bytes.
pub trait InvoiceRenderer: Send + Sync {
    fn render(&self, invoice: &Invoice) -> Result<Vec<u8>, RenderError>;
}
