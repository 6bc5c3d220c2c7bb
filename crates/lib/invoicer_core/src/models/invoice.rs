//! Invoice document submitted for rendering.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One billed line.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LineItem {
    pub description: String,
    pub quantity: f64,
    pub rate: f64,
    pub tax_rate: f64,
    pub discount_rate: f64,
    pub amount: f64,
}

/// A complete invoice as posted by the client. Totals are computed
/// client-side and carried as-is.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Invoice {
    pub invoice_number: String,
    pub invoice_date: String,
    pub due_date: String,

    pub business_name: String,
    pub business_email: String,
    pub business_phone: String,
    pub business_address: String,

    pub client_name: String,
    pub client_email: String,
    pub client_address: String,

    pub items: Vec<LineItem>,

    pub subtotal: f64,
    pub discount_rate: f64,
    pub discount_amount: f64,
    pub tax_rate: f64,
    pub tax_amount: f64,
    pub total: f64,

    pub currency: String,
    pub notes: String,
    /// `minimal`, `corporate` or `modern`.
    pub selected_template: String,
}

/// First rule an invoice breaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum InvoiceError {
    #[error("invoice number is required")]
    MissingNumber,

    #[error("business name is required")]
    MissingBusinessName,

    #[error("client name is required")]
    MissingClientName,

    #[error("at least one item is required")]
    NoItems,

    #[error("total must be greater than zero")]
    NonPositiveTotal,
}

impl Invoice {
    /// Check the fields a renderer cannot do without.
    pub fn validate(&self) -> Result<(), InvoiceError> {
        if self.invoice_number.trim().is_empty() {
            return Err(InvoiceError::MissingNumber);
        }
        if self.business_name.trim().is_empty() {
            return Err(InvoiceError::MissingBusinessName);
        }
        if self.client_name.trim().is_empty() {
            return Err(InvoiceError::MissingClientName);
        }
        if self.items.is_empty() {
            return Err(InvoiceError::NoItems);
        }
        if self.total.is_nan() || self.total <= 0.0 {
            return Err(InvoiceError::NonPositiveTotal);
        }
        Ok(())
    }

    /// Download name for the rendered document, `invoice-<number>.pdf`.
    ///
    /// Characters outside `[A-Za-z0-9._-]` are replaced with `_` so the name
    /// is safe inside a `Content-Disposition` header.
    pub fn file_name(&self) -> String {
        let number: String = self
            .invoice_number
            .trim()
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        format!("invoice-{number}.pdf")
    }
}
