//! Cookie service: OAuth state cookie.

use axum_extra::extract::cookie::{Cookie, SameSite};
use time::Duration;

/// Cookie carrying the OAuth anti-forgery state.
pub const OAUTH_STATE_COOKIE: &str = "oauth_state";

/// Lifetime of the state cookie: 5 minutes.
pub const OAUTH_STATE_MAX_AGE_SECS: i64 = 300;

/// Build the httpOnly state cookie set before redirecting to the consent page.
pub fn oauth_state_cookie(state: &str, secure: bool) -> Cookie<'static> {
    Cookie::build((OAUTH_STATE_COOKIE.to_string(), state.to_string()))
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .path("/".to_string())
        .max_age(Duration::seconds(OAUTH_STATE_MAX_AGE_SECS))
        .build()
}

/// Build an expired state cookie.
pub fn clear_oauth_state_cookie(secure: bool) -> Cookie<'static> {
    Cookie::build((OAUTH_STATE_COOKIE.to_string(), String::new()))
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .path("/".to_string())
        .max_age(Duration::ZERO)
        .build()
}
