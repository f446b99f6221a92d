//! Session middleware and cookie handling.
//!
//! Two gates sit in front of handlers:
//!
//! - [`require_session`] (strict): no token is `403`, a bad token is `401`,
//!   and the handler never runs. On success the verified [`Claims`] are
//!   inserted into the request extensions.
//! - [`optional_session`] (soft): never rejects. Inserts
//!   [`MaybeSession`] with the claims when a valid token is present and
//!   `None` otherwise.
//!
//! The token is read from the `access_token` cookie, falling back to an
//! `Authorization: Bearer` header.

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, HeaderValue},
    middleware::Next,
    response::Response,
};
use tablegate_core::{AuthError, Claims};

use crate::error::AppError;
use crate::AppState;

/// Name of the session cookie.
pub const SESSION_COOKIE: &str = "access_token";

/// Soft-mode session: claims when the request carried a valid token.
#[derive(Debug, Clone)]
pub struct MaybeSession(pub Option<Claims>);

/// Strict gate: reject the request unless it carries a valid token.
pub async fn require_session(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let Some(token) = extract_token(request.headers()) else {
        tracing::debug!(path = %request.uri().path(), "no session token");
        return Err(AuthError::MissingToken.into());
    };

    let claims = state.auth.verify_token(&token).map_err(|e| {
        tracing::debug!(path = %request.uri().path(), reason = %e, "session token rejected");
        AuthError::InvalidToken(e)
    })?;

    request.extensions_mut().insert(claims);
    Ok(next.run(request).await)
}

/// Soft gate: attach the session if there is a valid one, then continue.
pub async fn optional_session(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let claims = extract_token(request.headers()).and_then(|token| {
        state
            .auth
            .verify_token(&token)
            .inspect_err(|e| tracing::debug!(reason = %e, "ignoring invalid session token"))
            .ok()
    });

    request.extensions_mut().insert(MaybeSession(claims));
    next.run(request).await
}

/// Find the session token in the request headers.
pub fn extract_token(headers: &HeaderMap) -> Option<String> {
    parse_cookie(headers, SESSION_COOKIE).or_else(|| bearer_token(headers))
}

fn parse_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, value)| *key == name && !value.is_empty())
        .map(|(_, value)| value.to_string())
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let token = value
        .strip_prefix("Bearer ")
        .or_else(|| value.strip_prefix("bearer "))?
        .trim();
    (!token.is_empty()).then(|| token.to_string())
}

/// `Set-Cookie` value carrying a freshly issued token.
pub fn session_cookie(token: &str, max_age_secs: u64, secure: bool) -> Result<HeaderValue, AppError> {
    let mut cookie = format!(
        "{SESSION_COOKIE}={token}; HttpOnly; SameSite=Strict; Path=/; Max-Age={max_age_secs}"
    );
    if secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
        .map_err(|e| AppError::from(AuthError::Internal(format!("invalid cookie value: {e}"))))
}

/// `Set-Cookie` value that removes the session cookie.
pub fn clear_session_cookie(secure: bool) -> HeaderValue {
    let mut cookie = format!(
        "{SESSION_COOKIE}=; HttpOnly; SameSite=Strict; Path=/; Max-Age=0; Expires=Thu, 01 Jan 1970 00:00:00 GMT"
    );
    if secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie).unwrap_or_else(|_| HeaderValue::from_static("access_token=; Max-Age=0"))
}
