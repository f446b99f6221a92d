//! Tablegate Core - credential lifecycle for the Tablegate auth service.
//!
//! This crate holds everything that has invariants and no transport:
//! password hashing, session token signing and verification, the role
//! model, the user store contract and the service that ties them together.
//! The HTTP surface lives in `tablegate-server`.

pub mod error;
pub mod identity;
pub mod password;
pub mod service;
pub mod store;
pub mod token;

pub use error::{AuthError, AuthResult};
pub use identity::{authorize, Decision, Principal, Role, UserId};
pub use password::{HashConfig, HashError, PasswordHasher};
pub use service::{AuthService, LoginOutcome, RegisterRequest, UpdateRequest};
pub use store::{NewUser, PublicUser, SledUserStore, StoreError, UserRecord, UserStore, UserUpdate};
pub use token::{Claims, IssuedToken, TokenCodec, TokenConfig, TokenError};
