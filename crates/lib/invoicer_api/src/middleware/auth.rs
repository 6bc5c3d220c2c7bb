//! Authentication middleware: bearer token extraction and JWT verification.
//!
//! Evaluation order: header present → `Bearer <token>` shape → signature and
//! expiry → token kind is `access`. Refresh tokens are never accepted here.

use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use invoicer_core::auth::TokenError;
use invoicer_core::auth::jwt::TokenService;
use invoicer_core::models::auth::{TokenClaims, TokenKind};
use tracing::debug;

use crate::AppState;
use crate::error::AppError;

/// Validated claims, stored in request extensions for handlers to extract.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub TokenClaims);

/// Why a request was not authenticated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthRejection {
    MissingHeader,
    MalformedHeader,
    InvalidToken(TokenError),
    WrongTokenKind(TokenKind),
}

impl AuthRejection {
    pub fn message(&self) -> &'static str {
        match self {
            AuthRejection::MissingHeader => "Authorization header is required",
            AuthRejection::MalformedHeader => {
                "Authorization header must be in the format: Bearer <token>"
            }
            AuthRejection::InvalidToken(_) => "Invalid or expired token",
            AuthRejection::WrongTokenKind(_) => "Invalid token type",
        }
    }
}

impl From<AuthRejection> for AppError {
    fn from(r: AuthRejection) -> Self {
        AppError::Unauthorized(r.message().into())
    }
}

/// Run the gate against `headers`, returning the access-token claims.
pub fn authenticate(headers: &HeaderMap, tokens: &TokenService) -> Result<TokenClaims, AuthRejection> {
    let header = headers.get(AUTHORIZATION).ok_or(AuthRejection::MissingHeader)?;
    let header = header.to_str().map_err(|_| AuthRejection::MalformedHeader)?;

    let token = match header.split_once(' ') {
        Some((scheme, token)) if scheme.eq_ignore_ascii_case("Bearer") && !token.is_empty() => {
            token
        }
        _ => return Err(AuthRejection::MalformedHeader),
    };

    let claims = tokens.validate(token).map_err(AuthRejection::InvalidToken)?;
    if claims.kind != TokenKind::Access {
        return Err(AuthRejection::WrongTokenKind(claims.kind));
    }
    Ok(claims)
}

/// Axum middleware: authenticates the request and injects
/// [`AuthenticatedUser`] into request extensions, or responds 401.
///
/// Claims already attached by an outer layer are trusted as-is.
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    if request.extensions().get::<AuthenticatedUser>().is_some() {
        return Ok(next.run(request).await);
    }

    let claims = authenticate(request.headers(), &state.tokens).inspect_err(|rejection| {
        debug!(?rejection, path = %request.uri().path(), "request rejected by auth gate");
    })?;

    request.extensions_mut().insert(AuthenticatedUser(claims));
    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;
    use chrono::{Duration, Utc};
    use invoicer_core::models::auth::{Provider, User};

    use super::*;

    fn tokens() -> TokenService {
        TokenService::new(b"test-secret", Duration::hours(1), Duration::days(7))
    }

    fn user() -> User {
        User {
            id: "user_1".into(),
            email: "test@example.com".into(),
            name: "Test".into(),
            password_hash: None,
            provider: Provider::Local,
            created_at: Utc::now(),
        }
    }

    fn headers(value: &str) -> HeaderMap {
        let mut h = HeaderMap::new();
        h.insert(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        h
    }

    #[test]
    fn missing_header() {
        assert_eq!(
            authenticate(&HeaderMap::new(), &tokens()),
            Err(AuthRejection::MissingHeader)
        );
    }

    #[test]
    fn non_bearer_scheme() {
        let svc = tokens();
        let token = svc.issue_access_token(&user()).unwrap();
        for value in [format!("Basic {token}"), token.clone(), "Bearer".into(), "Bearer ".into()] {
            assert_eq!(
                authenticate(&headers(&value), &svc),
                Err(AuthRejection::MalformedHeader),
                "{value}"
            );
        }
    }

    #[test]
    fn invalid_token() {
        assert!(matches!(
            authenticate(&headers("Bearer invalid-token"), &tokens()),
            Err(AuthRejection::InvalidToken(_))
        ));
    }

    #[test]
    fn refresh_token_is_rejected() {
        let svc = tokens();
        let refresh = svc.issue_refresh_token(&user()).unwrap();
        assert_eq!(
            authenticate(&headers(&format!("Bearer {refresh}")), &svc),
            Err(AuthRejection::WrongTokenKind(TokenKind::Refresh))
        );
    }

    #[test]
    fn access_token_is_accepted_case_insensitive_scheme() {
        let svc = tokens();
        let access = svc.issue_access_token(&user()).unwrap();
        for scheme in ["Bearer", "bearer", "BEARER"] {
            let claims = authenticate(&headers(&format!("{scheme} {access}")), &svc).unwrap();
            assert_eq!(claims.sub, "user_1");
        }
    }
}
