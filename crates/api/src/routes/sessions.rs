//! Route definitions for the `/sessions` resource.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::sessions;
use crate::state::AppState;

/// Routes mounted at `/sessions`.
///
/// ```text
/// GET    /{id}          -> get_session
/// POST   /{id}/join     -> join_session
/// POST   /{id}/leave    -> leave_session
/// POST   /{id}/end      -> end_session
/// POST   /{id}/cancel   -> cancel_session
/// POST   /{id}/holds    -> place_hold
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/{id}", get(sessions::get_session))
        .route("/{id}/join", post(sessions::join_session))
        .route("/{id}/leave", post(sessions::leave_session))
        .route("/{id}/end", post(sessions::end_session))
        .route("/{id}/cancel", post(sessions::cancel_session))
        .route("/{id}/holds", post(sessions::place_hold))
}
