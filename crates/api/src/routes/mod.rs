pub mod health;
pub mod hosts;
pub mod notifications;
pub mod sessions;

use axum::routing::get;
use axum::Router;

use crate::state::AppState;
use crate::ws;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /ws                                       WebSocket (?user_id=)
///
/// /hosts/{host_id}/availability             set on-demand flag (PUT)
/// /hosts/{host_id}/booking                  current booking phase
/// /hosts/{host_id}/booking-requests         request a booking (POST)
/// /hosts/{host_id}/booking-requests/respond accept or decline (POST)
///
/// /sessions/{id}                            get
/// /sessions/{id}/join                       report join (POST)
/// /sessions/{id}/leave                      report leave (POST)
/// /sessions/{id}/end                        end normally (POST)
/// /sessions/{id}/cancel                     withdraw (POST)
/// /sessions/{id}/holds                      place payment hold (POST)
///
/// /notifications                            list own notifications
/// /notifications/{id}/read                  mark read (POST)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/ws", get(ws::ws_handler))
        .nest("/hosts", hosts::router())
        .nest("/sessions", sessions::router())
        .nest("/notifications", notifications::router())
}
