//! Salted one-way hashing for local account passwords.
//!
//! Only [`CredentialStore`](super::store::CredentialStore) calls these; the
//! plaintext never outlives the call and is never logged.

use super::AuthError;

const COST: u32 = 10;

pub fn hash_password(plaintext: &str) -> Result<String, AuthError> {
    bcrypt::hash(plaintext, COST).map_err(|e| AuthError::Internal(format!("password hash: {e}")))
}

/// `Ok(false)` on mismatch; `Err` only when `stored` is not a bcrypt hash.
pub fn verify_password(plaintext: &str, stored: &str) -> Result<bool, AuthError> {
    bcrypt::verify(plaintext, stored)
        .map_err(|e| AuthError::Internal(format!("password verify: {e}")))
}
