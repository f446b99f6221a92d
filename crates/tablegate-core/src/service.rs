//! The credential lifecycle: register, login, profile, update, delete.
//!
//! `AuthService` is the only place where the store, the hasher and the
//! token codec meet. All of its methods block (hashing is deliberately slow
//! and sled is synchronous); async callers should run them on a blocking
//! thread.

use std::sync::Arc;

use serde::Deserialize;

use crate::error::{AuthError, AuthResult};
use crate::identity::{Principal, Role, UserId};
use crate::password::PasswordHasher;
use crate::store::{NewUser, PublicUser, StoreError, UserStore, UserUpdate};
use crate::token::{Claims, IssuedToken, TokenCodec, TokenError};

/// Longest accepted username, in characters.
pub const MAX_USERNAME_CHARS: usize = 64;

/// Registration input.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RegisterRequest {
    pub username: Option<String>,
    pub password: Option<String>,
    /// Defaults to [`Role::User`].
    pub role: Option<String>,
}

/// Profile update input. Every field is required.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateRequest {
    pub username: Option<String>,
    pub password: Option<String>,
    pub role: Option<String>,
}

/// Successful login.
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub user: PublicUser,
    pub token: IssuedToken,
}

/// Credential lifecycle service.
#[derive(Clone)]
pub struct AuthService {
    store: Arc<dyn UserStore>,
    hasher: PasswordHasher,
    codec: TokenCodec,
}

impl AuthService {
    pub fn new(store: Arc<dyn UserStore>, hasher: PasswordHasher, codec: TokenCodec) -> Self {
        Self {
            store,
            hasher,
            codec,
        }
    }

    /// Register a new user and return its id.
    pub fn register(&self, request: RegisterRequest) -> AuthResult<UserId> {
        let username = require_field(request.username, "username")?;
        let password = require_field(request.password, "password")?;
        validate_username(&username)?;
        let role = match request.role {
            Some(role) => role.parse::<Role>()?,
            None => Role::User,
        };

        let password_hash = self.hasher.hash(&password)?;
        let id = self.store.insert(NewUser {
            username: username.clone(),
            password_hash,
            role,
        })?;

        tracing::info!(user_id = id, username = %username, role = %role, "user registered");
        Ok(id)
    }

    /// Check credentials and issue a session token.
    ///
    /// Unknown usernames and wrong passwords produce the same error.
    pub fn login(&self, username: &str, password: &str) -> AuthResult<LoginOutcome> {
        let record = match self.store.find_by_username(username) {
            Ok(record) => record,
            Err(StoreError::NotFound(_)) => {
                // Same hashing work as a known user with a wrong password.
                self.hasher.verify_decoy(password);
                tracing::debug!(username = %username, reason = "unknown_user", "login rejected");
                return Err(AuthError::InvalidCredentials);
            }
            Err(e) => return Err(e.into()),
        };

        if !self.hasher.verify(password, &record.password_hash)? {
            tracing::debug!(user_id = record.id, reason = "wrong_password", "login rejected");
            return Err(AuthError::InvalidCredentials);
        }

        let principal = Principal::new(record.id, record.username.clone(), record.role);
        let token = self
            .codec
            .issue(&principal)
            .map_err(|e| AuthError::Internal(e.to_string()))?;

        tracing::info!(user_id = record.id, "login succeeded");
        Ok(LoginOutcome {
            user: record.into_public(),
            token,
        })
    }

    /// Verify a session token.
    pub fn verify_token(&self, token: &str) -> Result<Claims, TokenError> {
        self.codec.verify(token)
    }

    /// Current record of a user, without its hash.
    pub fn profile(&self, id: UserId) -> AuthResult<PublicUser> {
        Ok(self.store.find_by_id(id)?.into_public())
    }

    /// Replace a user's username, password and role.
    ///
    /// `actor` must own the account or hold admin, and cannot grant a role
    /// above its own.
    pub fn update(
        &self,
        actor: &Principal,
        id: UserId,
        request: UpdateRequest,
    ) -> AuthResult<PublicUser> {
        let (username, password, role) = match (request.username, request.password, request.role)
        {
            (Some(u), Some(p), Some(r)) if !u.is_empty() && !p.is_empty() && !r.is_empty() => {
                (u, p, r)
            }
            _ => {
                return Err(AuthError::Validation(
                    "username, password and role are required".to_string(),
                ))
            }
        };
        validate_username(&username)?;
        let role = role.parse::<Role>()?;

        if !actor.may_manage(id) {
            tracing::warn!(actor = actor.id, target = id, "update of another account denied");
            return Err(AuthError::Forbidden);
        }
        // Granting a role requires holding it.
        actor.require(role)?;

        let password_hash = self.hasher.hash(&password)?;
        let updated = self.store.update(
            id,
            UserUpdate {
                username,
                password_hash,
                role,
            },
        )?;

        tracing::info!(actor = actor.id, user_id = id, "user updated");
        Ok(updated.into_public())
    }

    /// Delete a user.
    pub fn delete(&self, id: UserId) -> AuthResult<()> {
        self.store.delete_by_id(id)?;
        tracing::info!(user_id = id, "user deleted");
        Ok(())
    }
}

impl std::fmt::Debug for AuthService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthService")
            .field("hasher", &self.hasher)
            .field("codec", &self.codec)
            .finish_non_exhaustive()
    }
}

fn require_field(value: Option<String>, name: &str) -> AuthResult<String> {
    match value {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(AuthError::Validation(format!("{name} is required"))),
    }
}

fn validate_username(username: &str) -> AuthResult<()> {
    if username.trim().is_empty() {
        return Err(AuthError::Validation("username must not be blank".to_string()));
    }
    if username.chars().count() > MAX_USERNAME_CHARS {
        return Err(AuthError::Validation(format!(
            "username exceeds {MAX_USERNAME_CHARS} characters"
        )));
    }
    Ok(())
}
