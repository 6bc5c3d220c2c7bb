//! JWT token generation and verification.
//!
//! Tokens are stateless HS256 JWTs. Validation never touches the credential
//! store; callers that need liveness must re-resolve the subject.

use chrono::{Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};

use super::{AuthError, TokenError};
use crate::models::auth::{TokenClaims, TokenKind, User};

/// The only accepted signing algorithm.
const ALGORITHM: Algorithm = Algorithm::HS256;

/// Value of the `iss` claim.
pub const ISSUER: &str = "invoicer";

/// Default access token lifetime: 24 hours.
pub const DEFAULT_ACCESS_TOKEN_HOURS: i64 = 24;

/// Refresh token lifetime: 7 days.
pub const REFRESH_TOKEN_EXPIRY_DAYS: i64 = 7;

/// Issues and validates access and refresh tokens under one symmetric secret.
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl std::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenService")
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .finish_non_exhaustive()
    }
}

impl TokenService {
    /// Build a service signing with `secret`. Negative lifetimes are allowed
    /// and produce tokens that are already expired.
    pub fn new(secret: &[u8], access_ttl: Duration, refresh_ttl: Duration) -> Self {
        let mut validation = Validation::new(ALGORITHM);
        validation.leeway = 0;
        validation.validate_exp = true;
        validation.set_issuer(&[ISSUER]);
        validation.set_required_spec_claims(&["exp", "iss", "sub"]);

        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
            access_ttl,
            refresh_ttl,
        }
    }

    /// Service with the default access lifetime and the fixed 7 day refresh lifetime.
    pub fn with_defaults(secret: &[u8]) -> Self {
        Self::new(
            secret,
            Duration::hours(DEFAULT_ACCESS_TOKEN_HOURS),
            Duration::days(REFRESH_TOKEN_EXPIRY_DAYS),
        )
    }

    /// Generate a signed access token for `user`.
    pub fn issue_access_token(&self, user: &User) -> Result<String, AuthError> {
        self.issue(user, TokenKind::Access, self.access_ttl)
    }

    /// Generate a signed refresh token for `user`.
    pub fn issue_refresh_token(&self, user: &User) -> Result<String, AuthError> {
        self.issue(user, TokenKind::Refresh, self.refresh_ttl)
    }

    fn issue(&self, user: &User, kind: TokenKind, ttl: Duration) -> Result<String, AuthError> {
        let now = Utc::now();
        let claims = TokenClaims {
            sub: user.id.clone(),
            email: user.email.clone(),
            kind,
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
            iss: ISSUER.to_string(),
        };
        encode(&Header::new(ALGORITHM), &claims, &self.encoding_key)
            .map_err(|e| AuthError::Internal(format!("jwt encode: {e}")))
    }

    /// Decode and verify `token`, returning its claims.
    ///
    /// Rejects tokens signed with any algorithm other than HS256, tokens whose
    /// signature does not verify under this service's secret, and tokens whose
    /// expiry is at or before the current second.
    pub fn validate(&self, token: &str) -> Result<TokenClaims, TokenError> {
        let data = decode::<TokenClaims>(token, &self.decoding_key, &self.validation).map_err(
            |e| match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                ErrorKind::InvalidSignature => TokenError::BadSignature,
                ErrorKind::InvalidAlgorithm | ErrorKind::InvalidAlgorithmName => {
                    TokenError::UnexpectedAlgorithm
                }
                _ => TokenError::Malformed,
            },
        )?;

        // jsonwebtoken only rejects `exp < now`; expiry is exclusive here.
        if Utc::now().timestamp() >= data.claims.exp {
            return Err(TokenError::Expired);
        }
        Ok(data.claims)
    }

    /// Validate `token` and require it to be of `expected` kind.
    pub fn validate_kind(&self, token: &str, expected: TokenKind) -> Result<TokenClaims, AuthError> {
        let claims = self.validate(token)?;
        if claims.kind != expected {
            return Err(AuthError::WrongTokenKind {
                expected,
                actual: claims.kind,
            });
        }
        Ok(claims)
    }

    /// Configured access token lifetime, in seconds.
    pub fn access_expiry_seconds(&self) -> i64 {
        self.access_ttl.num_seconds()
    }
}
