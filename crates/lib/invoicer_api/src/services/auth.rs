//! Authentication service: register/login/refresh flows on top of
//! `invoicer_core::auth`.

use std::sync::LazyLock;

use invoicer_core::auth::AuthError;
use invoicer_core::auth::jwt::TokenService;
use invoicer_core::auth::store::{CredentialStore, normalize_email};
use invoicer_core::models::auth::{Provider, TokenKind, User};
use regex::Regex;
use tracing::{debug, info};

use crate::error::{AppError, AppResult};
use crate::models::TokenResponse;

/// Minimum accepted password length.
pub const MIN_PASSWORD_LEN: usize = 8;

static EMAIL_RE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9._%+\-]+@[a-zA-Z0-9.\-]+\.[a-zA-Z]{2,}$").ok());

/// Whether `email` (already normalized) looks like an address.
pub fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.as_ref().is_some_and(|re| re.is_match(email))
}

/// Issue a fresh access + refresh pair for `user`.
pub fn issue_token_bundle(tokens: &TokenService, user: &User) -> AppResult<TokenResponse> {
    Ok(TokenResponse {
        access_token: tokens.issue_access_token(user)?,
        refresh_token: tokens.issue_refresh_token(user)?,
        expires_in: tokens.access_expiry_seconds(),
        token_type: "Bearer".to_string(),
    })
}

/// Register a new local account.
pub fn register(
    store: &CredentialStore,
    tokens: &TokenService,
    email: &str,
    password: &str,
    name: &str,
) -> AppResult<TokenResponse> {
    let email = normalize_email(email);
    let name = name.trim();

    if !is_valid_email(&email) {
        return Err(AppError::Validation("Invalid email address".into()));
    }
    if password.len() < MIN_PASSWORD_LEN {
        return Err(AppError::Validation(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    if name.is_empty() {
        return Err(AppError::Validation("Name is required".into()));
    }

    let user = store.create_user(&email, password, name, Provider::Local)?;
    info!(user_id = %user.id, "user registered");

    issue_token_bundle(tokens, &user)
}

/// Authenticate with email + password.
///
/// Unknown email, wrong password and passwordless accounts are
/// indistinguishable to the caller.
pub fn login(
    store: &CredentialStore,
    tokens: &TokenService,
    email: &str,
    password: &str,
) -> AppResult<TokenResponse> {
    let email = normalize_email(email);

    let user = store
        .get_user_by_email(&email)
        .map_err(|_| AuthError::CredentialError)?;
    store.check_password(&user, password).inspect_err(|_| {
        debug!(user_id = %user.id, "login rejected");
    })?;

    info!(user_id = %user.id, "user logged in");
    issue_token_bundle(tokens, &user)
}

/// Exchange a refresh token for a new token pair.
pub fn refresh(
    store: &CredentialStore,
    tokens: &TokenService,
    refresh_token: &str,
) -> AppResult<TokenResponse> {
    let claims = tokens
        .validate_kind(refresh_token, TokenKind::Refresh)
        .map_err(|e| {
            debug!(error = %e, "refresh rejected");
            AppError::Unauthorized("Invalid or expired refresh token".into())
        })?;

    let user = store.get_user_by_id(&claims.sub)?;
    issue_token_bundle(tokens, &user)
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn tokens() -> TokenService {
        TokenService::new(b"test-secret", Duration::hours(2), Duration::days(7))
    }

    #[test]
    fn email_validation() {
        assert!(is_valid_email("jane.doe+tag@example.co.uk"));
        assert!(!is_valid_email("jane"));
        assert!(!is_valid_email("jane@localhost"));
        assert!(!is_valid_email("jane @example.com"));
    }

    #[test]
    fn register_normalizes_email() {
        let store = CredentialStore::new();
        let bundle = register(&store, &tokens(), "  Jane@Example.COM ", "password123", " Jane ").unwrap();
        assert_eq!(bundle.token_type, "Bearer");
        assert_eq!(bundle.expires_in, 7200);

        let user = store.get_user_by_email("jane@example.com").unwrap();
        assert_eq!(user.name, "Jane");

        let dup = register(&store, &tokens(), "JANE@example.com", "password123", "Other");
        assert!(matches!(dup, Err(AppError::Conflict(_))));
    }

    #[test]
    fn register_validates_input() {
        let store = CredentialStore::new();
        let svc = tokens();
        assert!(matches!(
            register(&store, &svc, "bad", "password123", "Jane"),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            register(&store, &svc, "jane@example.com", "short", "Jane"),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            register(&store, &svc, "jane@example.com", "password123", "   "),
            Err(AppError::Validation(_))
        ));
        assert!(store.is_empty());
    }

    #[test]
    fn login_failures_are_uniform() {
        let store = CredentialStore::new();
        let svc = tokens();
        register(&store, &svc, "jane@example.com", "password123", "Jane").unwrap();
        store.upsert_federated_user("fed@example.com", "Fed", Provider::Google);

        let messages: Vec<String> = [
            ("nobody@example.com", "password123"),
            ("jane@example.com", "wrongpassword"),
            ("fed@example.com", ""),
        ]
        .into_iter()
        .map(|(email, pw)| match login(&store, &svc, email, pw) {
            Err(AppError::Unauthorized(m)) => m,
            other => panic!("expected unauthorized, got {other:?}"),
        })
        .collect();
        assert!(messages.iter().all(|m| m == &messages[0]));

        assert!(login(&store, &svc, "JANE@example.com", "password123").is_ok());
    }

    #[test]
    fn refresh_requires_refresh_token_and_live_user() {
        let store = CredentialStore::new();
        let svc = tokens();
        let bundle = register(&store, &svc, "jane@example.com", "password123", "Jane").unwrap();

        let renewed = refresh(&store, &svc, &bundle.refresh_token).unwrap();
        let claims = svc.validate(&renewed.access_token).unwrap();
        assert_eq!(claims.kind, TokenKind::Access);

        assert!(matches!(
            refresh(&store, &svc, &bundle.access_token),
            Err(AppError::Unauthorized(_))
        ));

        // Token for a user this store has never seen.
        let other_store = CredentialStore::new();
        assert!(matches!(
            refresh(&other_store, &svc, &bundle.refresh_token),
            Err(AppError::Unauthorized(_))
        ));
    }
}
