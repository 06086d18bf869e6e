//! Route definitions for the `/hosts` resource (on-demand booking).

use axum::routing::{get, post, put};
use axum::Router;

use crate::handlers::hosts;
use crate::state::AppState;

/// Routes mounted at `/hosts`.
///
/// ```text
/// PUT    /{host_id}/availability             -> set_availability
/// GET    /{host_id}/booking                  -> get_booking_phase
/// POST   /{host_id}/booking-requests         -> request_booking
/// POST   /{host_id}/booking-requests/respond -> respond_to_booking
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/{host_id}/availability", put(hosts::set_availability))
        .route("/{host_id}/booking", get(hosts::get_booking_phase))
        .route("/{host_id}/booking-requests", post(hosts::request_booking))
        .route(
            "/{host_id}/booking-requests/respond",
            post(hosts::respond_to_booking),
        )
}
