//! Session tokens.
//!
//! Tokens are HS256 JSON Web Tokens signed with a process-wide secret and
//! verified statelessly: there is no server-side session table, so a token
//! stays valid until `exp` even after logout.
//!
//! # Claims
//!
//! ```json
//! {
//!   "id": 42,
//!   "username": "bob",
//!   "role": "user",
//!   "iat": 1735603200,
//!   "exp": 1735606800
//! }
//! ```
//!
//! The identity fields are a snapshot taken at login; later changes to the
//! user record do not reach tokens already issued.

use std::time::Duration;

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::identity::{Principal, Role, UserId};

/// Default token lifetime (1 hour).
pub const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(60 * 60);

/// Token verification and signing errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    /// Signature does not match the header and claims.
    #[error("signature invalid")]
    SignatureInvalid,

    /// Token is past its `exp`.
    #[error("token expired")]
    Expired,

    /// Not a token this codec could have produced.
    #[error("malformed token: {0}")]
    Malformed(String),

    /// Signing secret is unusable.
    #[error("signing secret must not be empty")]
    EmptySecret,

    /// Encoding a new token failed.
    #[error("token signing failed: {0}")]
    Signing(String),
}

/// Claims carried by a session token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub id: UserId,
    pub username: String,
    pub role: Role,
    /// Issued at (Unix seconds).
    pub iat: u64,
    /// Expires at (Unix seconds).
    pub exp: u64,
}

impl Claims {
    /// The principal these claims identify.
    pub fn principal(&self) -> Principal {
        Principal::new(self.id, self.username.clone(), self.role)
    }
}

/// A freshly signed token together with its claims.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub claims: Claims,
}

/// Token codec configuration.
#[derive(Clone)]
pub struct TokenConfig {
    /// HMAC secret.
    pub secret: Vec<u8>,
    /// Lifetime of issued tokens.
    pub ttl: Duration,
}

impl TokenConfig {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        Self {
            secret: secret.as_ref().to_vec(),
            ttl: DEFAULT_TOKEN_TTL,
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }
}

impl std::fmt::Debug for TokenConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenConfig")
            .field("secret", &"<redacted>")
            .field("ttl", &self.ttl)
            .finish()
    }
}

/// Signs and verifies session tokens.
#[derive(Clone)]
pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl TokenCodec {
    /// Create a codec from an HMAC secret.
    pub fn new(config: TokenConfig) -> Result<Self, TokenError> {
        if config.secret.is_empty() {
            return Err(TokenError::EmptySecret);
        }

        // Expiry is checked by `verify_at` against an explicit clock.
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.leeway = 0;

        Ok(Self {
            encoding_key: EncodingKey::from_secret(&config.secret),
            decoding_key: DecodingKey::from_secret(&config.secret),
            validation,
            ttl: config.ttl,
        })
    }

    /// Issue a token for `principal` valid for the configured ttl.
    pub fn issue(&self, principal: &Principal) -> Result<IssuedToken, TokenError> {
        self.issue_at(principal, self.ttl, now())
    }

    /// Issue a token as if the current time were `now` (Unix seconds).
    pub fn issue_at(
        &self,
        principal: &Principal,
        ttl: Duration,
        now: u64,
    ) -> Result<IssuedToken, TokenError> {
        let claims = Claims {
            id: principal.id,
            username: principal.username.clone(),
            role: principal.role,
            iat: now,
            exp: now.saturating_add(ttl.as_secs()),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| TokenError::Signing(e.to_string()))?;

        Ok(IssuedToken { token, claims })
    }

    /// Verify a token against the current time.
    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        self.verify_at(token, now())
    }

    /// Verify a token as if the current time were `now` (Unix seconds).
    ///
    /// The signature is checked before expiry, so a forged token is reported
    /// as [`TokenError::SignatureInvalid`] whatever its `exp` says.
    pub fn verify_at(&self, token: &str, now: u64) -> Result<Claims, TokenError> {
        let data = decode::<Claims>(token, &self.decoding_key, &self.validation).map_err(
            |e| match e.kind() {
                ErrorKind::InvalidSignature => TokenError::SignatureInvalid,
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Malformed(e.to_string()),
            },
        )?;

        if now > data.claims.exp {
            return Err(TokenError::Expired);
        }

        Ok(data.claims)
    }
}

impl std::fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCodec").field("ttl", &self.ttl).finish()
    }
}

fn now() -> u64 {
    jsonwebtoken::get_current_timestamp()
}

#[cfg(test)]
mod tests {
    use super::*;

    const T0: u64 = 1_735_603_200;

    fn codec(secret: &str) -> TokenCodec {
        TokenCodec::new(TokenConfig::new(secret)).unwrap()
    }

    fn bob() -> Principal {
        Principal::new(7, "bob", Role::User)
    }

    #[test]
    fn test_roundtrip_before_expiry() {
        let codec = codec("test-secret-key-for-testing");
        let issued = codec.issue_at(&bob(), Duration::from_secs(3600), T0).unwrap();

        let claims = codec.verify_at(&issued.token, T0 + 10).unwrap();
        assert_eq!(claims, issued.claims);
        assert_eq!(claims.principal(), bob());
        assert_eq!(claims.exp, T0 + 3600);
    }

    #[test]
    fn test_valid_at_exact_expiry() {
        let codec = codec("test-secret");
        let issued = codec.issue_at(&bob(), Duration::from_secs(60), T0).unwrap();
        assert!(codec.verify_at(&issued.token, T0 + 60).is_ok());
    }

    #[test]
    fn test_expired_token() {
        let codec = codec("test-secret");
        let issued = codec.issue_at(&bob(), Duration::from_secs(60), T0).unwrap();

        assert_eq!(
            codec.verify_at(&issued.token, T0 + 61),
            Err(TokenError::Expired)
        );
    }

    #[test]
    fn test_wrong_secret() {
        let issued = codec("correct-secret")
            .issue_at(&bob(), Duration::from_secs(60), T0)
            .unwrap();

        assert_eq!(
            codec("wrong-secret").verify_at(&issued.token, T0),
            Err(TokenError::SignatureInvalid)
        );
    }

    #[test]
    fn test_signature_checked_before_expiry() {
        let issued = codec("correct-secret")
            .issue_at(&bob(), Duration::from_secs(60), T0)
            .unwrap();

        assert_eq!(
            codec("wrong-secret").verify_at(&issued.token, T0 + 3600),
            Err(TokenError::SignatureInvalid)
        );
    }

    #[test]
    fn test_tampered_claims_rejected() {
        let codec = codec("test-secret");
        let issued = codec.issue_at(&bob(), Duration::from_secs(60), T0).unwrap();

        // Swap in a forged payload granting admin, keeping the old signature.
        let forged = codec
            .issue_at(&Principal::new(7, "bob", Role::Admin), Duration::from_secs(60), T0)
            .unwrap();
        let parts: Vec<&str> = issued.token.split('.').collect();
        let forged_payload = forged.token.split('.').nth(1).unwrap();
        let tampered = format!("{}.{}.{}", parts[0], forged_payload, parts[2]);

        assert_eq!(
            codec.verify_at(&tampered, T0),
            Err(TokenError::SignatureInvalid)
        );
    }

    #[test]
    fn test_any_flipped_payload_byte_fails() {
        let codec = codec("test-secret");
        let issued = codec.issue_at(&bob(), Duration::from_secs(60), T0).unwrap();
        let header_len = issued.token.find('.').unwrap() + 1;
        let payload_len = issued.token[header_len..].find('.').unwrap();

        for offset in 0..payload_len {
            let mut bytes = issued.token.clone().into_bytes();
            let idx = header_len + offset;
            bytes[idx] = if bytes[idx] == b'A' { b'B' } else { b'A' };
            let tampered = String::from_utf8(bytes).unwrap();
            assert!(codec.verify_at(&tampered, T0).is_err(), "offset {offset}");
        }
    }

    #[test]
    fn test_malformed_token() {
        let codec = codec("test-secret");
        assert!(matches!(
            codec.verify_at("not-a-token", T0),
            Err(TokenError::Malformed(_))
        ));
        assert!(matches!(
            codec.verify_at("", T0),
            Err(TokenError::Malformed(_))
        ));
    }

    #[test]
    fn test_empty_secret_rejected() {
        assert!(matches!(
            TokenCodec::new(TokenConfig::new("")),
            Err(TokenError::EmptySecret)
        ));
    }

    #[test]
    fn test_issue_uses_configured_ttl() {
        let codec =
            TokenCodec::new(TokenConfig::new("s").with_ttl(Duration::from_secs(120))).unwrap();
        let issued = codec.issue(&bob()).unwrap();

        assert_eq!(issued.claims.exp - issued.claims.iat, 120);
        assert!(codec.verify(&issued.token).is_ok());
    }

    #[test]
    fn test_config_debug_redacts_secret() {
        let debug = format!("{:?}", TokenConfig::new("super-secret"));
        assert!(!debug.contains("super-secret"));
    }
}
