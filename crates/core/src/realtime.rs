//! Realtime events pushed to connected clients.
//!
//! Serialized as JSON objects tagged by `"type"`; every variant carries the
//! identifiers a client needs to correlate it with what is on screen.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::session::CancellationReason;
use crate::types::{DbId, Timestamp};

/// What the recipient's interface should do after a cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NextAction {
    /// Leave the call and land on the generic retry surface.
    Retry,
    /// Stay in the waiting room; a new request can arrive.
    KeepWaiting,
    /// Clear the session from view.
    Dismiss,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum RealtimeEvent {
    PresenceJoined {
        session_id: DbId,
        participant_id: DbId,
        display_name: String,
        joined_at: Timestamp,
    },
    PresenceLeft {
        session_id: DbId,
        participant_id: DbId,
        display_name: String,
        left_at: Timestamp,
    },
    SessionCancelled {
        session_id: DbId,
        cancelled_by: Option<DbId>,
        reason: CancellationReason,
        next: NextAction,
    },
    SessionEnded {
        session_id: DbId,
        ended_by: DbId,
    },
    BookingRequested {
        session_id: DbId,
        request_id: Uuid,
        requester_id: DbId,
        requester_name: String,
        respond_by: Timestamp,
    },
    BookingAccepted {
        session_id: DbId,
        host_id: DbId,
        enter_by: Timestamp,
    },
    AvailabilityChanged {
        host_id: DbId,
        on_demand: bool,
        reason: Option<String>,
    },
    WaitingRestored {
        host_id: DbId,
        cancelled_session_id: DbId,
    },
    Notification {
        notification_id: DbId,
        kind: String,
        title: String,
        message: String,
    },
}

impl RealtimeEvent {
    /// The `"type"` tag, for logging.
    pub fn name(&self) -> &'static str {
        match self {
            RealtimeEvent::PresenceJoined { .. } => "presence-joined",
            RealtimeEvent::PresenceLeft { .. } => "presence-left",
            RealtimeEvent::SessionCancelled { .. } => "session-cancelled",
            RealtimeEvent::SessionEnded { .. } => "session-ended",
            RealtimeEvent::BookingRequested { .. } => "booking-requested",
            RealtimeEvent::BookingAccepted { .. } => "booking-accepted",
            RealtimeEvent::AvailabilityChanged { .. } => "availability-changed",
            RealtimeEvent::WaitingRestored { .. } => "waiting-restored",
            RealtimeEvent::Notification { .. } => "notification",
        }
    }
}
