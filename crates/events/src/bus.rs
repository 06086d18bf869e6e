//! In-process event bus backed by a `tokio::sync::broadcast` channel.
//!
//! [`EventBus`] is the publish/subscribe hub for [`LifecycleEvent`]s. The
//! lifecycle components publish after every committed transition; the audit
//! writer and any other observers subscribe. It is shared via
//! `Arc<EventBus>`.

use chrono::{DateTime, Utc};
use lessonline_core::types::DbId;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Dot-separated lifecycle event names.
pub mod names {
    pub const SESSION_STARTED: &str = "session.started";
    pub const SESSION_COMPLETED: &str = "session.completed";
    pub const SESSION_CANCELLED: &str = "session.cancelled";
    pub const BOOKING_REQUESTED: &str = "booking.requested";
    pub const BOOKING_ACCEPTED: &str = "booking.accepted";
    pub const HOLD_AUTHORIZED: &str = "hold.authorized";
    pub const HOLD_CAPTURED: &str = "hold.captured";
    pub const HOLD_RELEASED: &str = "hold.released";
    pub const HOLD_ERRORED: &str = "hold.errored";
}

// ---------------------------------------------------------------------------
// LifecycleEvent
// ---------------------------------------------------------------------------

/// A committed lifecycle transition.
///
/// Constructed via [`LifecycleEvent::new`] and enriched with
/// [`for_session`](LifecycleEvent::for_session),
/// [`with_actor`](LifecycleEvent::with_actor), and
/// [`with_payload`](LifecycleEvent::with_payload).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LifecycleEvent {
    /// One of [`names`], e.g. `"session.cancelled"`.
    pub event_type: String,

    pub session_id: Option<DbId>,

    /// The user whose action caused the transition; `None` for sweeps and
    /// timer expiry.
    pub actor_user_id: Option<DbId>,

    pub payload: serde_json::Value,

    pub timestamp: DateTime<Utc>,
}

impl LifecycleEvent {
    pub fn new(event_type: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            session_id: None,
            actor_user_id: None,
            payload: serde_json::Value::Object(Default::default()),
            timestamp: Utc::now(),
        }
    }

    pub fn for_session(mut self, session_id: DbId) -> Self {
        self.session_id = Some(session_id);
        self
    }

    pub fn with_actor(mut self, user_id: Option<DbId>) -> Self {
        self.actor_user_id = user_id;
        self
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 1024;

/// In-process fan-out event bus.
///
/// Wraps a [`broadcast::Sender`] so that any number of subscribers can
/// independently receive every published [`LifecycleEvent`].
pub struct EventBus {
    sender: broadcast::Sender<LifecycleEvent>,
}

impl EventBus {
    /// Create a bus with a specific channel capacity.
    ///
    /// When the buffer is full, the oldest un-consumed messages are dropped
    /// and slow receivers will observe a `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all current subscribers. Dropped silently when
    /// nobody is subscribed.
    pub fn publish(&self, event: LifecycleEvent) {
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LifecycleEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
