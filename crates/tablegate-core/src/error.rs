//! Core error taxonomy.

use thiserror::Error;

use crate::password::HashError;
use crate::store::StoreError;
use crate::token::TokenError;

/// Errors surfaced by the credential lifecycle.
///
/// The HTTP boundary maps each variant to one status code and a fixed message.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Missing or malformed input.
    #[error("validation error: {0}")]
    Validation(String),

    /// Unknown username or wrong password. Never says which.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// No session token on a request that requires one.
    #[error("missing session token")]
    MissingToken,

    /// Session token failed verification.
    #[error("invalid session token: {0}")]
    InvalidToken(#[from] TokenError),

    /// Authenticated, but not allowed to perform the operation.
    #[error("forbidden")]
    Forbidden,

    /// Record not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Username already taken.
    #[error("username already exists: {0}")]
    Conflict(String),

    /// Store or hashing backend failure.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Result type for credential lifecycle operations.
pub type AuthResult<T> = Result<T, AuthError>;

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(what) => AuthError::NotFound(what),
            StoreError::DuplicateUsername(name) => AuthError::Conflict(name),
            other => AuthError::Internal(other.to_string()),
        }
    }
}

impl From<HashError> for AuthError {
    fn from(err: HashError) -> Self {
        match err {
            HashError::EmptyPassword | HashError::PasswordTooLong { .. } => {
                AuthError::Validation(err.to_string())
            }
            HashError::MalformedHash(_) | HashError::Backend(_) => {
                AuthError::Internal(err.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_error_mapping() {
        let err: AuthError = StoreError::DuplicateUsername("alice".into()).into();
        assert!(matches!(err, AuthError::Conflict(ref name) if name == "alice"));

        let err: AuthError = StoreError::NotFound("user 7".into()).into();
        assert!(matches!(err, AuthError::NotFound(_)));

        let err: AuthError = StoreError::Serialization("bad json".into()).into();
        assert!(matches!(err, AuthError::Internal(_)));
    }

    #[test]
    fn test_hash_error_mapping() {
        let err: AuthError = HashError::EmptyPassword.into();
        assert!(matches!(err, AuthError::Validation(_)));

        let err: AuthError = HashError::MalformedHash("garbage".into()).into();
        assert!(matches!(err, AuthError::Internal(_)));
    }

    #[test]
    fn test_invalid_credentials_display_is_generic() {
        assert_eq!(AuthError::InvalidCredentials.to_string(), "invalid credentials");
    }
}
