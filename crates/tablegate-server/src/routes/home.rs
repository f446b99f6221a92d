//! Landing and protected endpoints.

use axum::{middleware, routing::get, Extension, Json, Router};
use serde::Serialize;
use tablegate_core::Claims;

use crate::session::{optional_session, require_session, MaybeSession};
use crate::AppState;

/// Response carrying a message and the caller's session claims.
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub message: &'static str,
    pub user: Option<Claims>,
}

/// Home routes: `/` reads the session softly, `/protected` requires one.
pub fn routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handle_index).route_layer(middleware::from_fn_with_state(
                state.clone(),
                optional_session,
            )),
        )
        .route(
            "/protected",
            get(handle_protected)
                .route_layer(middleware::from_fn_with_state(state, require_session)),
        )
}

async fn handle_index(Extension(MaybeSession(user)): Extension<MaybeSession>) -> Json<SessionResponse> {
    Json(SessionResponse {
        message: "Tablegate auth service",
        user,
    })
}

async fn handle_protected(Extension(claims): Extension<Claims>) -> Json<SessionResponse> {
    Json(SessionResponse {
        message: "Protected route",
        user: Some(claims),
    })
}
