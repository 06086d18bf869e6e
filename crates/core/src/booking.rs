//! Office-hours booking state machine.
//!
//! Each host has one [`BookingPhase`]. The coordinator in
//! `lessonline-lifecycle` holds it behind a per-host lock and consults the
//! transition helpers here before touching the session store.
//!
//! ```text
//! idle ──request──▶ request_pending ──accept──▶ accepted ──both joined──▶ active ──end──▶ idle
//!                     │   ▲                        │
//!                     │   └─request (supersede)     └─entry timeout──▶ idle (session cancelled)
//!                     └─decline / response timeout──▶ idle (session cancelled)
//! ```

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CoreError;
use crate::types::{DbId, Timestamp};

/// The two deadlines a host can have armed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimerKind {
    /// Host must accept or decline a pending request.
    Response,
    /// Requester must enter the call after acceptance.
    Entry,
}

/// A request waiting on the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingRequest {
    pub request_id: Uuid,
    pub session_id: DbId,
    pub requester_id: DbId,
    pub created_at: Timestamp,
    pub respond_by: Timestamp,
}

/// Per-host booking state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum BookingPhase {
    #[default]
    Idle,
    RequestPending(PendingRequest),
    Accepted {
        session_id: DbId,
        requester_id: DbId,
        enter_by: Timestamp,
    },
    Active {
        session_id: DbId,
        requester_id: DbId,
    },
}

impl BookingPhase {
    pub fn name(&self) -> &'static str {
        match self {
            BookingPhase::Idle => "idle",
            BookingPhase::RequestPending(_) => "request_pending",
            BookingPhase::Accepted { .. } => "accepted",
            BookingPhase::Active { .. } => "active",
        }
    }

    /// The session this phase is guarding, if any.
    pub fn session_id(&self) -> Option<DbId> {
        match self {
            BookingPhase::Idle => None,
            BookingPhase::RequestPending(req) => Some(req.session_id),
            BookingPhase::Accepted { session_id, .. } | BookingPhase::Active { session_id, .. } => {
                Some(*session_id)
            }
        }
    }

    pub fn guards(&self, session_id: DbId) -> bool {
        self.session_id() == Some(session_id)
    }

    /// Check whether a new request may be admitted.
    ///
    /// Returns the request it would supersede, if one is pending. A host in
    /// an accepted or active booking refuses new requests outright.
    pub fn admit_request(&self) -> Result<Option<&PendingRequest>, CoreError> {
        match self {
            BookingPhase::Idle => Ok(None),
            BookingPhase::RequestPending(previous) => Ok(Some(previous)),
            BookingPhase::Accepted { .. } | BookingPhase::Active { .. } => {
                Err(CoreError::Conflict(format!(
                    "host is busy with a booking ({})",
                    self.name()
                )))
            }
        }
    }

    /// The pending request a host response applies to.
    pub fn pending(&self) -> Result<&PendingRequest, CoreError> {
        match self {
            BookingPhase::RequestPending(req) => Ok(req),
            other => Err(CoreError::InvalidTransition(format!(
                "no pending request to respond to (phase is {})",
                other.name()
            ))),
        }
    }

    /// Whether the host may switch on-demand availability on.
    pub fn allows_availability(&self) -> bool {
        matches!(self, BookingPhase::Idle | BookingPhase::RequestPending(_))
    }
}

/// The host's answer to a pending request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingResponse {
    Accept,
    Decline,
}
