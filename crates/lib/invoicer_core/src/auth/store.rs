//! In-memory credential store.
//!
//! Users live in a primary map keyed by ID plus an email → ID index. Both are
//! guarded by one `RwLock` so they are only ever observed updated together.
//!
//! Email comparison here is exact. Callers must pass emails through
//! [`normalize_email`] before every store call; that is what upholds the
//! "one account per address" rule.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::Utc;
use tracing::debug;

use super::AuthError;
use super::password::{hash_password, verify_password};
use crate::models::auth::{Provider, User};

/// Canonical form of an email address: trimmed and lowercased.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[derive(Debug, Default)]
struct Inner {
    users: HashMap<String, User>,
    by_email: HashMap<String, String>,
    next_id: u64,
}

impl Inner {
    fn insert(&mut self, email: &str, name: &str, password_hash: Option<String>, provider: Provider) -> User {
        self.next_id += 1;
        let user = User {
            id: format!("user_{}", self.next_id),
            email: email.to_string(),
            name: name.to_string(),
            password_hash,
            provider,
            created_at: Utc::now(),
        };
        self.users.insert(user.id.clone(), user.clone());
        self.by_email.insert(user.email.clone(), user.id.clone());
        user
    }

    fn by_email(&self, email: &str) -> Option<&User> {
        self.by_email.get(email).and_then(|id| self.users.get(id))
    }
}

/// Thread-safe, volatile user store.
#[derive(Debug, Default)]
pub struct CredentialStore {
    inner: RwLock<Inner>,
}

impl CredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    // A panic while holding the lock cannot leave the maps half-updated
    // (every mutation is a pair of infallible inserts), so poisoning is ignored.
    fn read(&self) -> RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Create a user. An empty `password` creates a passwordless record.
    ///
    /// Fails with [`AuthError::EmailTaken`] when the email is already indexed.
    /// The bcrypt hash is computed outside the lock; uniqueness is re-checked
    /// inside the write section that performs the insert.
    pub fn create_user(
        &self,
        email: &str,
        password: &str,
        name: &str,
        provider: Provider,
    ) -> Result<User, AuthError> {
        if self.read().by_email.contains_key(email) {
            return Err(AuthError::EmailTaken);
        }

        let password_hash = if password.is_empty() {
            None
        } else {
            Some(hash_password(password)?)
        };

        let mut inner = self.write();
        if inner.by_email.contains_key(email) {
            return Err(AuthError::EmailTaken);
        }
        let user = inner.insert(email, name, password_hash, provider);
        debug!(user_id = %user.id, provider = %provider, "user created");
        Ok(user)
    }

    /// Look up a user by (already normalized) email.
    pub fn get_user_by_email(&self, email: &str) -> Result<User, AuthError> {
        self.read().by_email(email).cloned().ok_or(AuthError::UserNotFound)
    }

    /// Look up a user by ID.
    pub fn get_user_by_id(&self, id: &str) -> Result<User, AuthError> {
        self.read().users.get(id).cloned().ok_or(AuthError::UserNotFound)
    }

    /// Verify `password` against the user's stored hash.
    ///
    /// Fails closed for accounts without a password hash.
    pub fn check_password(&self, user: &User, password: &str) -> Result<(), AuthError> {
        let Some(hash) = user.password_hash.as_deref() else {
            return Err(AuthError::CredentialError);
        };
        if verify_password(password, hash)? {
            Ok(())
        } else {
            Err(AuthError::CredentialError)
        }
    }

    /// Return the user registered under `email`, creating a passwordless
    /// record if none exists. An existing record is returned unchanged.
    pub fn upsert_federated_user(&self, email: &str, name: &str, provider: Provider) -> User {
        let mut inner = self.write();
        if let Some(existing) = inner.by_email(email) {
            return existing.clone();
        }
        let user = inner.insert(email, name, None, provider);
        debug!(user_id = %user.id, provider = %provider, "federated user created");
        user
    }

    /// Number of stored users.
    pub fn len(&self) -> usize {
        self.read().users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
