//! User profile endpoints.

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, State,
    },
    middleware,
    routing::{get, put},
    Extension, Json, Router,
};
use tablegate_core::{Claims, PublicUser, UpdateRequest, UserId};

use crate::error::AppError;
use crate::routes::auth::MessageResponse;
use crate::session::require_session;
use crate::AppState;

/// User routes. `/users/me` and `PUT /users/:id` sit behind the strict
/// session gate; `DELETE /users/:id` does not.
pub fn routes(state: AppState) -> Router<AppState> {
    let strict = middleware::from_fn_with_state(state, require_session);

    Router::new()
        .route("/users/me", get(handle_me).route_layer(strict.clone()))
        .route(
            "/users/:id",
            put(handle_update)
                .route_layer(strict)
                .delete(handle_delete),
        )
}

async fn handle_me(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<PublicUser>, AppError> {
    let id = claims.id;
    let user = state.run_blocking(move |auth| auth.profile(id)).await?;
    Ok(Json(user))
}

async fn handle_update(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    id: Result<Path<UserId>, PathRejection>,
    payload: Result<Json<UpdateRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, AppError> {
    let Path(id) = id?;
    let Json(request) = payload?;
    let actor = claims.principal();
    state
        .run_blocking(move |auth| auth.update(&actor, id, request))
        .await?;

    Ok(Json(MessageResponse {
        message: "User updated successfully",
    }))
}

// TODO: gate behind `require_session` and `Principal::may_manage`; deletion is unauthenticated.
async fn handle_delete(
    State(state): State<AppState>,
    id: Result<Path<UserId>, PathRejection>,
) -> Result<Json<MessageResponse>, AppError> {
    let Path(id) = id?;
    state.run_blocking(move |auth| auth.delete(id)).await?;

    Ok(Json(MessageResponse {
        message: "User deleted successfully",
    }))
}
