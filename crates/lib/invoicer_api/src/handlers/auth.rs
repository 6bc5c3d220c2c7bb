//! Authentication request handlers.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::{Extension, Json};

use super::json_body;
use crate::AppState;
use crate::error::AppResult;
use crate::middleware::auth::AuthenticatedUser;
use crate::models::{LoginRequest, MeResponse, RefreshRequest, RegisterRequest, TokenResponse};
use crate::services::auth;

/// `POST /api/auth/register`: create a local account and sign it in.
pub async fn register_handler(
    State(state): State<AppState>,
    body: Result<Json<RegisterRequest>, JsonRejection>,
) -> AppResult<(StatusCode, Json<TokenResponse>)> {
    let body = json_body(body)?;
    let resp = auth::register(
        &state.store,
        &state.tokens,
        &body.email,
        &body.password,
        &body.name,
    )?;
    Ok((StatusCode::CREATED, Json(resp)))
}

/// `POST /api/auth/login`: authenticate with email + password.
pub async fn login_handler(
    State(state): State<AppState>,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> AppResult<Json<TokenResponse>> {
    let body = json_body(body)?;
    let resp = auth::login(&state.store, &state.tokens, &body.email, &body.password)?;
    Ok(Json(resp))
}

/// `POST /api/auth/refresh`: exchange a refresh token for a new token pair.
pub async fn refresh_handler(
    State(state): State<AppState>,
    body: Result<Json<RefreshRequest>, JsonRejection>,
) -> AppResult<Json<TokenResponse>> {
    let body = json_body(body)?;
    let resp = auth::refresh(&state.store, &state.tokens, &body.refresh_token)?;
    Ok(Json(resp))
}

/// `GET /api/me`: profile of the authenticated caller.
pub async fn me_handler(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(claims)): Extension<AuthenticatedUser>,
) -> AppResult<Json<MeResponse>> {
    let user = state.store.get_user_by_id(&claims.sub)?;
    Ok(Json(user.into()))
}
