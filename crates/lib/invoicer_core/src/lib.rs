//! # invoicer_core
//!
//! Core domain logic for Invoicer: the credential store, token issuance and
//! validation, federated login, per-identity rate limiting, and the invoice
//! record handed to the document renderer.

pub mod auth;
pub mod models;
pub mod rate_limit;
pub mod render;
