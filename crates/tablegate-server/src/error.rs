//! Error handling for the HTTP boundary.
//!
//! Each failure maps to the narrowest safe status and a fixed message.
//! Internal detail is logged, never returned.

use axum::{
    extract::rejection::{JsonRejection, PathRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tablegate_core::{AuthError, HashError, TokenError};
use thiserror::Error;

/// Errors that stop the server from starting.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("password hasher: {0}")]
    Hasher(#[from] HashError),

    #[error("token codec: {0}")]
    Codec(#[from] TokenError),
}

/// Application error type.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// Request body or path could not be parsed.
    #[error("malformed request: {0}")]
    BadRequest(String),

    /// Blocking task panicked or was cancelled.
    #[error("worker task failed: {0}")]
    Join(String),
}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error flag.
    pub error: bool,
    /// Error code.
    pub code: &'static str,
    /// Error message.
    pub message: String,
}

impl AppError {
    fn parts(&self) -> (StatusCode, &'static str, String) {
        match self {
            AppError::Auth(err) => match err {
                AuthError::Validation(msg) => {
                    (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
                }
                AuthError::Conflict(_) => (
                    StatusCode::BAD_REQUEST,
                    "DUPLICATE_USERNAME",
                    "username already exists".to_string(),
                ),
                AuthError::InvalidCredentials => (
                    StatusCode::UNAUTHORIZED,
                    "INVALID_CREDENTIALS",
                    "invalid credentials".to_string(),
                ),
                AuthError::MissingToken => (
                    StatusCode::FORBIDDEN,
                    "MISSING_TOKEN",
                    "missing session token".to_string(),
                ),
                AuthError::InvalidToken(_) => (
                    StatusCode::UNAUTHORIZED,
                    "INVALID_TOKEN",
                    "invalid session token".to_string(),
                ),
                AuthError::Forbidden => (
                    StatusCode::FORBIDDEN,
                    "FORBIDDEN",
                    "operation not permitted".to_string(),
                ),
                AuthError::NotFound(_) => (
                    StatusCode::NOT_FOUND,
                    "NOT_FOUND",
                    "user not found".to_string(),
                ),
                AuthError::Internal(_) => internal(),
            },
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            AppError::Join(_) => internal(),
        }
    }
}

fn internal() -> (StatusCode, &'static str, String) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "INTERNAL_ERROR",
        "internal server error".to_string(),
    )
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = self.parts();

        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::debug!(error = %self, code, "request rejected");
        }

        let body = ErrorResponse {
            error: true,
            code,
            message,
        };

        (status, Json(body)).into_response()
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<tokio::task::JoinError> for AppError {
    fn from(err: tokio::task::JoinError) -> Self {
        AppError::Join(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (AuthError::Validation("x".into()), StatusCode::BAD_REQUEST),
            (AuthError::Conflict("alice".into()), StatusCode::BAD_REQUEST),
            (AuthError::InvalidCredentials, StatusCode::UNAUTHORIZED),
            (AuthError::MissingToken, StatusCode::FORBIDDEN),
            (
                AuthError::InvalidToken(TokenError::Expired),
                StatusCode::UNAUTHORIZED,
            ),
            (AuthError::Forbidden, StatusCode::FORBIDDEN),
            (AuthError::NotFound("user 1".into()), StatusCode::NOT_FOUND),
            (
                AuthError::Internal("disk on fire".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, expected) in cases {
            assert_eq!(AppError::from(err).parts().0, expected);
        }
    }

    #[test]
    fn test_token_failures_collapse() {
        let kinds = [
            TokenError::SignatureInvalid,
            TokenError::Expired,
            TokenError::Malformed("junk".into()),
        ];
        let parts: Vec<_> = kinds
            .into_iter()
            .map(|k| AppError::from(AuthError::InvalidToken(k)).parts())
            .collect();

        assert!(parts.windows(2).all(|w| w[0] == w[1]));
    }

    #[test]
    fn test_internal_detail_not_exposed() {
        let (_, _, message) = AppError::from(AuthError::Internal("sled: io error at /var".into())).parts();
        assert!(!message.contains("sled"));
    }
}
