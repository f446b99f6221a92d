//! Tablegate HTTP authentication service.
//!
//! Wraps [`tablegate_core::AuthService`] in an axum router: registration,
//! login with a signed session cookie, profile management and the session
//! middleware that guards protected routes.

pub mod config;
pub mod error;
pub mod routes;
pub mod session;

pub use config::{Args, ServerConfig};
pub use error::{AppError, StartupError};
pub use session::{optional_session, require_session, MaybeSession};

use std::sync::Arc;

use axum::Router;
use tablegate_core::{AuthResult, AuthService, PasswordHasher, TokenCodec, UserStore};
use tower_http::trace::TraceLayer;

/// Application state shared across all routes.
#[derive(Clone)]
pub struct AppState {
    /// Credential lifecycle service.
    pub auth: Arc<AuthService>,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
}

impl AppState {
    /// Build the state from a validated configuration and a user store.
    pub fn new(config: ServerConfig, store: Arc<dyn UserStore>) -> Result<Self, StartupError> {
        config.validate().map_err(StartupError::Config)?;

        let hasher = PasswordHasher::new(config.hash)?;
        let codec = TokenCodec::new(config.token_config())?;

        Ok(Self {
            auth: Arc::new(AuthService::new(store, hasher, codec)),
            config: Arc::new(config),
        })
    }

    /// Run a blocking service call off the async executor.
    pub async fn run_blocking<T, F>(&self, f: F) -> Result<T, AppError>
    where
        F: FnOnce(&AuthService) -> AuthResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let auth = Arc::clone(&self.auth);
        Ok(tokio::task::spawn_blocking(move || f(&auth)).await??)
    }
}

/// Create the router with all routes.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .merge(routes::health::routes())
        .merge(routes::auth::routes())
        .merge(routes::users::routes(state.clone()))
        .merge(routes::home::routes(state.clone()))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
