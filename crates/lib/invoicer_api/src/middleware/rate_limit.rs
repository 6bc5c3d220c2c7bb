//! Rate-limit middleware.
//!
//! Wraps every route. The caller is identified with the same gate used on
//! protected routes: a valid access token keys the bucket by user ID under
//! the authenticated ceiling; anything else is keyed by remote IP. Resolved
//! claims are attached to the request as [`AuthenticatedUser`] so the gate
//! on protected routes does not decode the token again.

use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::Response,
};
use invoicer_core::rate_limit::Caller;

use crate::AppState;
use crate::error::AppError;
use crate::middleware::auth::{AuthenticatedUser, authenticate};

/// Axum middleware: debits one token from the caller's bucket, or responds
/// 429 with `Retry-After`.
pub async fn rate_limit(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let identity = authenticate(request.headers(), &state.tokens).ok();
    let caller = match &identity {
        Some(claims) => Caller::User(&claims.sub),
        None => Caller::Ip(
            request
                .extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip()),
        ),
    };

    if !state.rate_limiter.check(&caller) {
        return Err(AppError::RateLimited);
    }

    if let Some(claims) = identity {
        request.extensions_mut().insert(AuthenticatedUser(claims));
    }
    Ok(next.run(request).await)
}
