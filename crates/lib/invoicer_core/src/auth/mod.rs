//! Authentication logic.
//!
//! Provides password hashing, the in-memory credential store, JWT issuance
//! and validation, and the Google authorization-code flow.

pub mod jwt;
pub mod oauth;
pub mod password;
pub mod store;

use thiserror::Error;

use crate::models::auth::TokenKind;

/// Authentication errors.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Email already registered")]
    EmailTaken,

    #[error("User not found")]
    UserNotFound,

    #[error("Invalid credentials")]
    CredentialError,

    #[error("Token error: {0}")]
    Token(#[from] TokenError),

    #[error("Expected {expected} token, got {actual}")]
    WrongTokenKind {
        expected: TokenKind,
        actual: TokenKind,
    },

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Reasons a token string fails validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TokenError {
    #[error("malformed token")]
    Malformed,

    #[error("bad signature")]
    BadSignature,

    #[error("token expired")]
    Expired,

    #[error("unexpected signing algorithm")]
    UnexpectedAlgorithm,
}
