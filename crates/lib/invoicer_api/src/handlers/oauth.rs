//! Google login handlers.
//!
//! The anti-forgery state travels in an http-only cookie. The callback
//! compares it against the `state` query parameter before the broker is
//! ever asked to exchange the code.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Query, State};
use axum::response::Redirect;
use axum_extra::extract::cookie::CookieJar;
use invoicer_core::auth::oauth::OAuthBroker;
use tracing::{debug, info};

use crate::AppState;
use crate::error::{AppError, AppResult};
use crate::models::{OAuthCallbackParams, TokenResponse};
use crate::services::auth::issue_token_bundle;
use crate::services::cookies::{OAUTH_STATE_COOKIE, clear_oauth_state_cookie, oauth_state_cookie};

fn broker(state: &AppState) -> AppResult<&Arc<OAuthBroker>> {
    state
        .oauth
        .as_ref()
        .ok_or_else(|| AppError::ServiceUnavailable("Google OAuth is not configured".into()))
}

/// `GET /api/auth/google`: redirect to the consent page.
pub async fn google_login_handler(
    State(state): State<AppState>,
    jar: CookieJar,
) -> AppResult<(CookieJar, Redirect)> {
    let broker = broker(&state)?;
    let csrf = broker.generate_state();
    let url = broker.build_authorization_url(&csrf);

    let jar = jar.add(oauth_state_cookie(&csrf, state.config.secure_cookies));
    Ok((jar, Redirect::temporary(url.as_str())))
}

/// `GET /api/auth/google/callback`: verify state, complete the flow, and
/// issue a token bundle. The state cookie is cleared on every outcome past
/// the configuration check.
pub async fn google_callback_handler(
    State(state): State<AppState>,
    jar: CookieJar,
    Query(params): Query<OAuthCallbackParams>,
) -> Result<(CookieJar, Json<TokenResponse>), (CookieJar, AppError)> {
    let broker = broker(&state).map_err(|e| (jar.clone(), e))?;

    let expected = jar.get(OAUTH_STATE_COOKIE).map(|c| c.value().to_owned());
    let jar = jar.add(clear_oauth_state_cookie(state.config.secure_cookies));

    match (expected.as_deref(), params.state.as_deref()) {
        (Some(expected), Some(received)) if !expected.is_empty() && expected == received => {}
        _ => {
            debug!(cookie_present = expected.is_some(), "oauth state mismatch");
            return Err((jar, AppError::Unauthorized("Invalid OAuth state".into())));
        }
    }

    let Some(code) = params.code.filter(|c| !c.is_empty()) else {
        return Err((jar, AppError::BadRequest("Missing authorization code".into())));
    };

    let result: AppResult<TokenResponse> = async {
        let user = broker.complete_flow(&code).await?;
        info!(user_id = %user.id, "google login");
        issue_token_bundle(&state.tokens, &user)
    }
    .await;

    match result {
        Ok(bundle) => Ok((jar, Json(bundle))),
        Err(e) => Err((jar, e)),
    }
}
