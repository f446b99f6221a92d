//! Identity and role model.
//!
//! Every authorization decision in Tablegate goes through [`authorize`].
//! Adding a new privileged operation means adding a call site that asks for
//! [`Role::Admin`], never a new comparison.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{AuthError, AuthResult};

/// Store-assigned user identifier.
pub type UserId = i64;

/// Roles a principal can hold, ordered by privilege.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Regular account.
    #[default]
    User,
    /// Administrator - may perform privileged operations.
    Admin,
}

impl Role {
    /// Wire name of the role.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "admin" => Ok(Role::Admin),
            other => Err(AuthError::Validation(format!("unknown role: {other}"))),
        }
    }
}

/// Outcome of an authorization check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny,
}

impl Decision {
    pub fn is_allowed(self) -> bool {
        self == Decision::Allow
    }
}

/// Decide whether a principal holding `actual` may perform an operation
/// that requires `required`.
pub fn authorize(actual: Role, required: Role) -> Decision {
    if actual >= required {
        Decision::Allow
    } else {
        Decision::Deny
    }
}

/// An authenticated principal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: UserId,
    pub username: String,
    pub role: Role,
}

impl Principal {
    pub fn new(id: UserId, username: impl Into<String>, role: Role) -> Self {
        Self {
            id,
            username: username.into(),
            role,
        }
    }

    /// Fail with [`AuthError::Forbidden`] unless this principal holds `required`.
    pub fn require(&self, required: Role) -> AuthResult<()> {
        match authorize(self.role, required) {
            Decision::Allow => Ok(()),
            Decision::Deny => {
                tracing::debug!(
                    user_id = self.id,
                    role = %self.role,
                    required = %required,
                    "authorization denied"
                );
                Err(AuthError::Forbidden)
            }
        }
    }

    /// Whether this principal may manage the account `target`: its owner,
    /// or anyone allowed privileged operations.
    pub fn may_manage(&self, target: UserId) -> bool {
        self.id == target || authorize(self.role, Role::Admin).is_allowed()
    }
}
