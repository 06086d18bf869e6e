//! Collaborator interfaces.
//!
//! The lifecycle components never talk to Postgres, the payment provider, or
//! WebSocket connections directly. They are handed implementations of these
//! traits: `lessonline-db` and `lessonline-payments` provide the production
//! ones, `lessonline-lifecycle::memory` provides in-memory ones for tests.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::notice::{Notice, NotificationRecord};
use crate::realtime::RealtimeEvent;
use crate::session::{NewSession, PaymentHold, Session, SessionStatus};
use crate::types::{DbId, Timestamp};

// ---------------------------------------------------------------------------
// Session store
// ---------------------------------------------------------------------------

/// Filter for [`SessionStore::find`]. Unset fields do not constrain.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionFilter {
    #[serde(default)]
    pub statuses: Vec<SessionStatus>,
    /// Inclusive lower bound on `starts_at`.
    pub starts_from: Option<Timestamp>,
    /// Exclusive upper bound on `starts_at`.
    pub starts_before: Option<Timestamp>,
    /// Inclusive upper bound on `ends_at`.
    pub ended_by: Option<Timestamp>,
    pub enforce_minimum: Option<bool>,
    /// Only sessions with an `authorized` hold whose participant never
    /// joined. Attended authorizations alone do not qualify.
    #[serde(default)]
    pub with_releasable_hold: bool,
    pub limit: Option<i64>,
}

impl SessionFilter {
    /// Evaluate the filter against one session, for stores that cannot push
    /// it down into a query.
    pub fn matches(&self, session: &Session) -> bool {
        (self.statuses.is_empty() || self.statuses.contains(&session.status))
            && self.starts_from.map_or(true, |from| session.starts_at >= from)
            && self.starts_before.map_or(true, |to| session.starts_at < to)
            && self.ended_by.map_or(true, |by| session.ends_at <= by)
            && self
                .enforce_minimum
                .map_or(true, |flag| session.enforce_minimum == flag)
            && (!self.with_releasable_hold || session.has_releasable_hold())
    }
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn fetch(&self, id: DbId) -> Result<Option<Session>, CoreError>;

    /// Sessions matching `filter`, ordered by `starts_at`.
    async fn find(&self, filter: &SessionFilter) -> Result<Vec<Session>, CoreError>;

    async fn insert(&self, new: &NewSession) -> Result<Session, CoreError>;

    /// Conditionally write the session's dirty fields.
    ///
    /// Succeeds only if the stored version equals `session.version`; on
    /// success the version is bumped and the dirty set cleared. A lost race
    /// yields [`CoreError::StaleVersion`]. An update with nothing dirty is a
    /// no-op.
    async fn update(&self, session: &mut Session) -> Result<(), CoreError>;
}

/// Convenience for callers that need the session to exist.
pub async fn require_session(store: &dyn SessionStore, id: DbId) -> Result<Session, CoreError> {
    store.fetch(id).await?.ok_or(CoreError::NotFound {
        entity: "session",
        id,
    })
}

// ---------------------------------------------------------------------------
// Host calendar
// ---------------------------------------------------------------------------

#[async_trait]
pub trait AvailabilityStore: Send + Sync {
    /// Remove the host's `session` block referencing `session_id`. Returns
    /// whether a block was removed.
    async fn remove_session_block(&self, host_id: DbId, session_id: DbId) -> Result<bool, CoreError>;

    async fn on_demand_enabled(&self, host_id: DbId) -> Result<bool, CoreError>;

    async fn set_on_demand(&self, host_id: DbId, enabled: bool) -> Result<(), CoreError>;
}

// ---------------------------------------------------------------------------
// Payments
// ---------------------------------------------------------------------------

/// Typed failure reported by the payment gateway.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GatewayError {
    /// The hold can no longer be acted on (already captured, expired, ...).
    #[error("hold in invalid state: {0}")]
    InvalidState(String),

    /// Temporary failure; the same call may succeed later.
    #[error("transient gateway failure: {0}")]
    Transient(String),
}

impl From<GatewayError> for CoreError {
    fn from(err: GatewayError) -> Self {
        CoreError::Gateway(err.to_string())
    }
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Place an authorization and return its opaque reference.
    async fn authorize(&self, amount_cents: i64, method: &str) -> Result<String, GatewayError>;

    async fn cancel(&self, reference: &str) -> Result<(), GatewayError>;

    async fn capture(&self, reference: &str) -> Result<(), GatewayError>;
}

/// The parallel payment ledger a hold's terminal state is mirrored into.
#[async_trait]
pub trait PaymentLedger: Send + Sync {
    async fn mirror_hold(&self, session_id: DbId, hold: &PaymentHold) -> Result<(), CoreError>;
}

// ---------------------------------------------------------------------------
// Notifications and realtime push
// ---------------------------------------------------------------------------

#[async_trait]
pub trait NotificationStore: Send + Sync {
    async fn persist(&self, notice: &Notice) -> Result<NotificationRecord, CoreError>;
}

/// Persisted notification plus best-effort realtime push.
#[async_trait]
pub trait NotificationFanout: Send + Sync {
    /// Persist `notice` and, if the recipient is connected, push it.
    async fn notify(&self, notice: &Notice) -> Result<NotificationRecord, CoreError>;

    /// Fire-and-forget push. Returns whether a live connection took it.
    async fn push_if_connected(&self, recipient_id: DbId, event: &RealtimeEvent) -> bool;
}

/// One outbound channel of a live connection.
pub trait PushSink: Send + Sync {
    /// Queue `event` for delivery. Returns `false` when the channel is closed.
    fn push(&self, event: &RealtimeEvent) -> bool;
}

/// The live connections of one user.
#[derive(Clone)]
pub struct ConnectionHandle {
    pub user_id: DbId,
    pub sinks: Vec<Arc<dyn PushSink>>,
}

impl ConnectionHandle {
    /// Push to every sink; true if at least one accepted the event.
    pub fn push(&self, event: &RealtimeEvent) -> bool {
        self.sinks
            .iter()
            .fold(false, |delivered, sink| sink.push(event) || delivered)
    }
}

impl std::fmt::Debug for ConnectionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionHandle")
            .field("user_id", &self.user_id)
            .field("sinks", &self.sinks.len())
            .finish()
    }
}

/// Lookup of live realtime connections by user.
#[async_trait]
pub trait ConnectionRegistry: Send + Sync {
    async fn connection_for(&self, user_id: DbId) -> Option<ConnectionHandle>;
}

// ---------------------------------------------------------------------------
// Users
// ---------------------------------------------------------------------------

#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// The name shown to other parties; falls back to a generic label.
    async fn display_name(&self, user_id: DbId) -> Result<String, CoreError>;
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use chrono::{Duration, TimeZone, Utc};

    use super::*;
    use crate::session::SessionKind;

    fn session() -> Session {
        let start = Utc.with_ymd_and_hms(2026, 4, 1, 9, 0, 0).unwrap();
        let new = NewSession {
            kind: SessionKind::Scheduled,
            host_id: 1,
            title: "Piano".into(),
            starts_at: start,
            ends_at: start + Duration::hours(1),
            capacity: 2,
            min_participants: 1,
            enforce_minimum: true,
            invitees: vec![2],
        };
        Session::from_new(5, &new, start - Duration::days(1))
    }

    #[test]
    fn empty_filter_matches_everything() {
        assert!(SessionFilter::default().matches(&session()));
    }

    #[test]
    fn start_bounds_are_half_open() {
        let s = session();
        let filter = SessionFilter {
            starts_from: Some(s.starts_at),
            starts_before: Some(s.starts_at + Duration::minutes(1)),
            ..Default::default()
        };
        assert!(filter.matches(&s));

        let filter = SessionFilter {
            starts_before: Some(s.starts_at),
            ..Default::default()
        };
        assert!(!filter.matches(&s));
    }

    #[test]
    fn releasable_hold_filter() {
        let mut s = session();
        let filter = SessionFilter {
            statuses: vec![SessionStatus::Scheduled],
            with_releasable_hold: true,
            ..Default::default()
        };
        assert!(!filter.matches(&s));

        s.respond_to_invitation(2, true).unwrap();
        s.confirm(2).unwrap();
        s.attach_hold(PaymentHold::authorized(2, 900, "auth".into()))
            .unwrap();
        assert!(filter.matches(&s));
    }

    #[test]
    fn attended_authorization_is_not_releasable() {
        let mut s = session();
        s.respond_to_invitation(2, true).unwrap();
        s.confirm(2).unwrap();
        s.attach_hold(PaymentHold::authorized(2, 900, "auth".into()))
            .unwrap();
        s.record_join(2, s.starts_at).unwrap();
        s.mark_attended(2);

        let filter = SessionFilter {
            with_releasable_hold: true,
            ..Default::default()
        };
        assert!(!filter.matches(&s));
    }

    struct CountingSink {
        open: bool,
        pushed: AtomicUsize,
    }

    impl PushSink for CountingSink {
        fn push(&self, _event: &RealtimeEvent) -> bool {
            self.pushed.fetch_add(1, Ordering::SeqCst);
            self.open
        }
    }

    #[test]
    fn handle_pushes_to_every_sink() {
        let closed = Arc::new(CountingSink {
            open: false,
            pushed: AtomicUsize::new(0),
        });
        let open = Arc::new(CountingSink {
            open: true,
            pushed: AtomicUsize::new(0),
        });
        let handle = ConnectionHandle {
            user_id: 3,
            sinks: vec![closed.clone(), open.clone()],
        };
        let event = RealtimeEvent::SessionEnded {
            session_id: 1,
            ended_by: 1,
        };
        assert!(handle.push(&event));
        assert_eq!(closed.pushed.load(Ordering::SeqCst), 1);
        assert_eq!(open.pushed.load(Ordering::SeqCst), 1);
    }
}
