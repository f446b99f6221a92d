//! Password hashing and verification using Argon2id.
//!
//! Hashes are PHC strings carrying their own salt and parameters, so a
//! stored hash stays verifiable after the configured cost changes.

use argon2::{
    password_hash::{
        rand_core::OsRng, PasswordHash, PasswordHasher as _, PasswordVerifier, SaltString,
    },
    Algorithm, Argon2, Params, Version,
};
use thiserror::Error;

/// Default time cost (Argon2 iterations).
pub const DEFAULT_HASH_COST: u32 = 10;

/// Default memory cost in KiB (19 MiB).
pub const DEFAULT_HASH_MEMORY_KIB: u32 = Params::DEFAULT_M_COST;

/// Longest plaintext accepted for hashing.
pub const MAX_PASSWORD_BYTES: usize = 1024;

const DECOY_PASSWORD: &str = "tablegate-decoy-password";

/// Password hashing errors.
#[derive(Debug, Error)]
pub enum HashError {
    #[error("password must not be empty")]
    EmptyPassword,

    #[error("password exceeds {max} bytes")]
    PasswordTooLong { max: usize },

    /// Stored hash is not a parseable PHC string.
    #[error("invalid password hash format: {0}")]
    MalformedHash(String),

    #[error("password hashing failed: {0}")]
    Backend(String),
}

/// Work factor for new hashes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashConfig {
    /// Argon2 time cost (iterations).
    pub cost: u32,
    /// Argon2 memory cost in KiB.
    pub memory_kib: u32,
}

impl Default for HashConfig {
    fn default() -> Self {
        Self {
            cost: DEFAULT_HASH_COST,
            memory_kib: DEFAULT_HASH_MEMORY_KIB,
        }
    }
}

/// One-way password hasher.
#[derive(Clone)]
pub struct PasswordHasher {
    argon2: Argon2<'static>,
    /// Hash of a fixed password under the configured parameters.
    decoy_hash: String,
}

impl std::fmt::Debug for PasswordHasher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let params = self.argon2.params();
        f.debug_struct("PasswordHasher")
            .field("cost", &params.t_cost())
            .field("memory_kib", &params.m_cost())
            .finish()
    }
}

impl PasswordHasher {
    /// Build a hasher, rejecting parameters Argon2 cannot use.
    pub fn new(config: HashConfig) -> Result<Self, HashError> {
        let params = Params::new(config.memory_kib, config.cost, 1, None)
            .map_err(|e| HashError::Backend(format!("invalid Argon2 parameters: {e}")))?;

        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);
        let salt = SaltString::generate(&mut OsRng);
        let decoy_hash = argon2
            .hash_password(DECOY_PASSWORD.as_bytes(), &salt)
            .map_err(|e| HashError::Backend(e.to_string()))?
            .to_string();

        Ok(Self { argon2, decoy_hash })
    }

    /// Hash a password with a fresh random salt.
    pub fn hash(&self, password: &str) -> Result<String, HashError> {
        check_plaintext(password)?;
        let salt = SaltString::generate(&mut OsRng);

        self.argon2
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| HashError::Backend(e.to_string()))
    }

    /// Verify a password against a stored hash.
    ///
    /// `Ok(false)` is a mismatch; an unparseable hash is an error.
    pub fn verify(&self, password: &str, hash: &str) -> Result<bool, HashError> {
        let parsed = PasswordHash::new(hash).map_err(|e| HashError::MalformedHash(e.to_string()))?;

        // Oversized input can never have been hashed; skip the work.
        if password.is_empty() || password.len() > MAX_PASSWORD_BYTES {
            return Ok(false);
        }

        Ok(self
            .argon2
            .verify_password(password.as_bytes(), &parsed)
            .is_ok())
    }

    /// Verify `password` against the decoy hash and discard the outcome.
    ///
    /// Costs the same as [`PasswordHasher::verify`] on a stored hash, for
    /// callers that found no account to check against. Returns whether the
    /// verification ran to completion.
    pub fn verify_decoy(&self, password: &str) -> bool {
        self.verify(password, &self.decoy_hash).is_ok()
    }
}

fn check_plaintext(password: &str) -> Result<(), HashError> {
    if password.is_empty() {
        return Err(HashError::EmptyPassword);
    }
    if password.len() > MAX_PASSWORD_BYTES {
        return Err(HashError::PasswordTooLong {
            max: MAX_PASSWORD_BYTES,
        });
    }
    Ok(())
}
