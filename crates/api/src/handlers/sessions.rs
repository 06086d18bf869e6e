//! Handlers for the `/sessions` resource.
//!
//! Presence signals, normal completion, party-initiated cancellation, and
//! payment hold placement. Authorization beyond "who is calling" lives in the
//! lifecycle components.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use lessonline_core::error::CoreError;
use lessonline_core::ports::require_session;
use lessonline_core::session::{PaymentHold, Session};
use lessonline_core::types::DbId;
use serde::Deserialize;

use crate::error::{AppError, AppResult};
use crate::middleware::identity::Caller;
use crate::response::DataResponse;
use crate::state::AppState;

/// Request body for `POST /sessions/{id}/holds`.
#[derive(Debug, Deserialize)]
pub struct PlaceHoldRequest {
    pub amount_cents: i64,
    pub payment_method: String,
}

/// GET /api/v1/sessions/{id}
///
/// Visible to the host, confirmed participants, and invitees who have not
/// declined.
pub async fn get_session(
    caller: Caller,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<Session>>> {
    let session = require_session(state.ports.sessions.as_ref(), id).await?;
    if !session.notification_recipients().contains(&caller.user_id) {
        return Err(AppError::Core(CoreError::Unauthorized(
            "Not a party to this session".into(),
        )));
    }
    Ok(Json(DataResponse { data: session }))
}

/// POST /api/v1/sessions/{id}/join
pub async fn join_session(
    caller: Caller,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<Session>>> {
    let session = state.coordinator.report_join(id, caller.user_id).await?;
    Ok(Json(DataResponse { data: session }))
}

/// POST /api/v1/sessions/{id}/leave
///
/// Leaving never cancels the session.
pub async fn leave_session(
    caller: Caller,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<Session>>> {
    let session = state.coordinator.report_leave(id, caller.user_id).await?;
    Ok(Json(DataResponse { data: session }))
}

/// POST /api/v1/sessions/{id}/end
///
/// Complete the session and capture the holds of participants who joined.
pub async fn end_session(
    caller: Caller,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<Session>>> {
    let session = state.coordinator.end_session(id, caller.user_id).await?;
    Ok(Json(DataResponse { data: session }))
}

/// POST /api/v1/sessions/{id}/cancel
///
/// Party-initiated cancellation. Returns 409 if the session already ended.
pub async fn cancel_session(
    caller: Caller,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<Session>>> {
    let session = state.coordinator.withdraw(id, caller.user_id).await?;
    Ok(Json(DataResponse { data: session }))
}

/// POST /api/v1/sessions/{id}/holds
///
/// Authorize a payment for the calling participant and attach the hold.
pub async fn place_hold(
    caller: Caller,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Json(input): Json<PlaceHoldRequest>,
) -> AppResult<(StatusCode, Json<DataResponse<PaymentHold>>)> {
    if input.payment_method.trim().is_empty() {
        return Err(AppError::BadRequest("payment_method must not be empty".into()));
    }

    let hold = lessonline_lifecycle::holds::place_hold(
        &state.ports,
        id,
        caller.user_id,
        input.amount_cents,
        input.payment_method.trim(),
    )
    .await?;

    Ok((StatusCode::CREATED, Json(DataResponse { data: hold })))
}
