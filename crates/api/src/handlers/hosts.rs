//! Handlers for the `/hosts` resource: on-demand availability and booking.
//!
//! Every handler is a thin wrapper over the [`Coordinator`]; the caller is
//! identified by [`Caller`].
//!
//! [`Coordinator`]: lessonline_lifecycle::Coordinator

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use lessonline_core::booking::{BookingPhase, BookingResponse, PendingRequest};
use lessonline_core::error::CoreError;
use lessonline_core::session::Session;
use lessonline_core::types::DbId;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::middleware::identity::Caller;
use crate::response::DataResponse;
use crate::state::AppState;

/// Request body for `PUT /hosts/{host_id}/availability`.
#[derive(Debug, Deserialize)]
pub struct SetAvailabilityRequest {
    pub enabled: bool,
}

/// Request body for `POST /hosts/{host_id}/booking-requests/respond`.
#[derive(Debug, Deserialize)]
pub struct RespondRequest {
    pub response: BookingResponse,
}

#[derive(Debug, Serialize)]
pub struct AvailabilityStatus {
    pub host_id: DbId,
    pub on_demand_enabled: bool,
}

/// Only the host may act on their own calendar.
fn ensure_host(caller: Caller, host_id: DbId) -> Result<(), AppError> {
    if caller.user_id != host_id {
        return Err(AppError::Core(CoreError::Unauthorized(
            "Only the host may perform this action".into(),
        )));
    }
    Ok(())
}

/// PUT /api/v1/hosts/{host_id}/availability
///
/// Switch on-demand availability. Enabling is refused (409) while the host
/// is in an accepted or active booking.
pub async fn set_availability(
    caller: Caller,
    State(state): State<AppState>,
    Path(host_id): Path<DbId>,
    Json(input): Json<SetAvailabilityRequest>,
) -> AppResult<Json<DataResponse<AvailabilityStatus>>> {
    ensure_host(caller, host_id)?;
    state.coordinator.set_availability(host_id, input.enabled).await?;

    Ok(Json(DataResponse {
        data: AvailabilityStatus {
            host_id,
            on_demand_enabled: input.enabled,
        },
    }))
}

/// GET /api/v1/hosts/{host_id}/booking
///
/// The host's current booking phase.
pub async fn get_booking_phase(
    caller: Caller,
    State(state): State<AppState>,
    Path(host_id): Path<DbId>,
) -> AppResult<Json<DataResponse<BookingPhase>>> {
    ensure_host(caller, host_id)?;
    let phase = state.coordinator.phase(host_id).await;
    Ok(Json(DataResponse { data: phase }))
}

/// POST /api/v1/hosts/{host_id}/booking-requests
///
/// Ask the host for an on-demand session. The caller is the requester.
/// Returns 201 with the pending request; the host has a bounded time to
/// answer.
pub async fn request_booking(
    caller: Caller,
    State(state): State<AppState>,
    Path(host_id): Path<DbId>,
) -> AppResult<(StatusCode, Json<DataResponse<PendingRequest>>)> {
    let pending = state
        .coordinator
        .request_booking(host_id, caller.user_id)
        .await?;

    tracing::info!(
        host_id,
        requester_id = caller.user_id,
        session_id = pending.session_id,
        "Booking requested"
    );

    Ok((StatusCode::CREATED, Json(DataResponse { data: pending })))
}

/// POST /api/v1/hosts/{host_id}/booking-requests/respond
///
/// Accept or decline the pending request. Returns the updated session, or
/// 409 if no request is pending.
pub async fn respond_to_booking(
    caller: Caller,
    State(state): State<AppState>,
    Path(host_id): Path<DbId>,
    Json(input): Json<RespondRequest>,
) -> AppResult<Json<DataResponse<Session>>> {
    ensure_host(caller, host_id)?;
    let session = state
        .coordinator
        .respond_to_booking(host_id, input.response)
        .await?;
    Ok(Json(DataResponse { data: session }))
}
