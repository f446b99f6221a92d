//! Registration, login and logout.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tablegate_core::{AuthError, PublicUser, RegisterRequest, UserId};

use crate::error::AppError;
use crate::session::{clear_session_cookie, session_cookie};
use crate::AppState;

/// Authentication routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(handle_register))
        .route("/auth/login", post(handle_login))
        .route("/logout", post(handle_logout))
}

/// Registration response.
#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub id: UserId,
}

/// Login request body.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: Option<String>,
    pub password: Option<String>,
}

/// Login response.
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub user: PublicUser,
    pub token: String,
}

/// Plain message response.
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

async fn handle_register(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<RegisterResponse>), AppError> {
    let Json(request) = payload?;
    let id = state.run_blocking(move |auth| auth.register(request)).await?;
    Ok((StatusCode::CREATED, Json(RegisterResponse { id })))
}

async fn handle_login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(request) = payload?;
    // A missing field cannot match an account.
    let (Some(username), Some(password)) = (request.username, request.password) else {
        return Err(AuthError::InvalidCredentials.into());
    };

    let outcome = state
        .run_blocking(move |auth| auth.login(&username, &password))
        .await?;

    let cookie = session_cookie(
        &outcome.token.token,
        state.config.token_ttl.as_secs(),
        state.config.cookie_secure,
    )?;

    Ok((
        [(header::SET_COOKIE, cookie)],
        Json(LoginResponse {
            user: outcome.user,
            token: outcome.token.token,
        }),
    ))
}

/// Clears the cookie only. Issued tokens stay valid until they expire.
async fn handle_logout(State(state): State<AppState>) -> impl IntoResponse {
    (
        [(header::SET_COOKIE, clear_session_cookie(state.config.cookie_secure))],
        Json(MessageResponse {
            message: "Logout successful",
        }),
    )
}
