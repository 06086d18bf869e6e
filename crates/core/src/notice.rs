//! Human-readable notices sent through the notification fan-out.

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::session::{CancellationReason, Session};
use crate::types::{DbId, Timestamp};

define_str_enum! {
    /// Notification type stored alongside each record.
    NoticeKind {
        SessionCancelled = "session_cancelled",
        SessionEnded = "session_ended",
        BookingRequested = "booking_requested",
        BookingAccepted = "booking_accepted",
        BookingDeclined = "booking_declined",
        BookingTimedOut = "booking_timed_out",
        MissedRequest = "missed_request",
        AvailabilityDisabled = "availability_disabled",
        EntryTimeout = "entry_timeout",
    }
}

/// A notification about to be persisted for one recipient.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notice {
    pub recipient_id: DbId,
    pub kind: NoticeKind,
    pub title: String,
    pub message: String,
    pub metadata: serde_json::Value,
}

/// A persisted notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationRecord {
    pub id: DbId,
    pub recipient_id: DbId,
    pub kind: NoticeKind,
    pub title: String,
    pub message: String,
    pub metadata: serde_json::Value,
    pub is_read: bool,
    pub created_at: Timestamp,
}

const NOT_CHARGED: &str = "You were not charged.";

impl Notice {
    fn new(
        recipient_id: DbId,
        kind: NoticeKind,
        title: impl Into<String>,
        message: impl Into<String>,
        metadata: serde_json::Value,
    ) -> Self {
        Self {
            recipient_id,
            kind,
            title: title.into(),
            message: message.into(),
            metadata,
        }
    }

    /// Cancellation notice for one member of a scheduled session.
    pub fn session_cancelled(session: &Session, recipient_id: DbId, reason: CancellationReason) -> Self {
        let why = match reason {
            CancellationReason::MinimumNotMet => format!(
                "\"{}\" was cancelled because fewer than {} participants confirmed.",
                session.title, session.min_participants
            ),
            CancellationReason::Declined => format!("\"{}\" was declined by the host.", session.title),
            CancellationReason::RequestTimeout => format!(
                "\"{}\" timed out before the host responded.",
                session.title
            ),
            CancellationReason::EntryTimeout => format!(
                "\"{}\" was cancelled because the call was not joined in time.",
                session.title
            ),
            CancellationReason::Superseded => format!(
                "\"{}\" was replaced by a newer request.",
                session.title
            ),
            CancellationReason::Withdrawn => format!("\"{}\" was cancelled.", session.title),
        };
        let message = if reason.waives_charge() {
            format!("{why} {NOT_CHARGED}")
        } else {
            why
        };
        Self::new(
            recipient_id,
            NoticeKind::SessionCancelled,
            "Session cancelled",
            message,
            json!({
                "session_id": session.id,
                "reason": reason,
                "starts_at": session.starts_at,
            }),
        )
    }

    /// To the requester: the host declined.
    pub fn booking_declined(session_id: DbId, requester_id: DbId, host_name: &str) -> Self {
        Self::new(
            requester_id,
            NoticeKind::BookingDeclined,
            "Request declined",
            format!("{host_name} is not available right now. {NOT_CHARGED}"),
            json!({ "session_id": session_id }),
        )
    }

    /// To the requester: the host never answered.
    pub fn booking_timed_out(session_id: DbId, requester_id: DbId, host_name: &str) -> Self {
        Self::new(
            requester_id,
            NoticeKind::BookingTimedOut,
            "Request timed out",
            format!("{host_name} did not respond in time. {NOT_CHARGED} Please try again later."),
            json!({ "session_id": session_id }),
        )
    }

    /// To the host: a request expired without an answer.
    pub fn missed_request(session_id: DbId, host_id: DbId, requester_name: &str) -> Self {
        Self::new(
            host_id,
            NoticeKind::MissedRequest,
            "You missed a request",
            format!(
                "You missed a session request from {requester_name}. Office hours were turned off; re-enable them when you are ready."
            ),
            json!({ "session_id": session_id }),
        )
    }

    /// To the host: availability was switched off after a decline.
    pub fn availability_disabled(host_id: DbId) -> Self {
        Self::new(
            host_id,
            NoticeKind::AvailabilityDisabled,
            "Office hours turned off",
            "Your office hours were turned off after you declined a request. Turn them back on when you are ready.",
            json!({}),
        )
    }

    pub fn booking_requested(session_id: DbId, host_id: DbId, requester_name: &str) -> Self {
        Self::new(
            host_id,
            NoticeKind::BookingRequested,
            "New session request",
            format!("{requester_name} would like to start a session now."),
            json!({ "session_id": session_id }),
        )
    }

    /// To the requester: the host is ready and waiting.
    pub fn booking_accepted(session_id: DbId, requester_id: DbId, host_name: &str, enter_by: Timestamp) -> Self {
        Self::new(
            requester_id,
            NoticeKind::BookingAccepted,
            "Your host is ready",
            format!("{host_name} accepted your request. Join the call now."),
            json!({ "session_id": session_id, "enter_by": enter_by }),
        )
    }

    /// To the host: the requester never entered the call.
    pub fn entry_timeout(session_id: DbId, host_id: DbId, requester_name: &str) -> Self {
        Self::new(
            host_id,
            NoticeKind::EntryTimeout,
            "Participant did not join",
            format!(
                "{requester_name} did not join in time and the session was cancelled. You can keep waiting for a new request."
            ),
            json!({ "session_id": session_id }),
        )
    }

    pub fn session_ended(session: &Session, recipient_id: DbId) -> Self {
        Self::new(
            recipient_id,
            NoticeKind::SessionEnded,
            "Session ended",
            format!("\"{}\" has ended.", session.title),
            json!({ "session_id": session.id }),
        )
    }
}
