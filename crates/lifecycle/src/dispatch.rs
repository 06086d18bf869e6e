//! Phase two of every transition: tell people about it.
//!
//! Components first commit the state change to the session store, then fill
//! an [`Outbox`] and dispatch it. Dispatch is best-effort: a failed
//! notification is logged and never rolls the committed state back, and one
//! failed recipient does not stop the others.
//!
//! Realtime pushes and notices are dispatched separately so the coordinator
//! can send pushes while still holding the host lock (preserving per-session
//! order) and deliver the slower persisted notices after releasing it.

use lessonline_core::notice::Notice;
use lessonline_core::ports::NotificationFanout;
use lessonline_core::realtime::RealtimeEvent;
use lessonline_core::types::DbId;
use lessonline_events::{EventBus, LifecycleEvent};

#[derive(Debug, Default)]
pub struct Outbox {
    events: Vec<LifecycleEvent>,
    pushes: Vec<(DbId, RealtimeEvent)>,
    notices: Vec<Notice>,
}

/// Counts from one dispatch, for logging and tests.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DispatchSummary {
    pub pushed: usize,
    pub offline: usize,
    pub notified: usize,
    pub failed: usize,
}

impl Outbox {
    pub fn event(&mut self, event: LifecycleEvent) {
        self.events.push(event);
    }

    pub fn push(&mut self, recipient_id: DbId, event: RealtimeEvent) {
        self.pushes.push((recipient_id, event));
    }

    pub fn notice(&mut self, notice: Notice) {
        self.notices.push(notice);
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty() && self.pushes.is_empty() && self.notices.is_empty()
    }

    /// Publish lifecycle events and send realtime pushes, in insertion order.
    pub async fn flush_realtime(
        &mut self,
        bus: &EventBus,
        fanout: &dyn NotificationFanout,
        summary: &mut DispatchSummary,
    ) {
        for event in self.events.drain(..) {
            bus.publish(event);
        }
        for (recipient_id, event) in self.pushes.drain(..) {
            if fanout.push_if_connected(recipient_id, &event).await {
                summary.pushed += 1;
            } else {
                summary.offline += 1;
            }
        }
    }

    /// Persist and deliver notices, one recipient at a time.
    pub async fn deliver_notices(&mut self, fanout: &dyn NotificationFanout, summary: &mut DispatchSummary) {
        for notice in self.notices.drain(..) {
            match fanout.notify(&notice).await {
                Ok(_) => summary.notified += 1,
                Err(e) => {
                    summary.failed += 1;
                    tracing::error!(
                        error = %e,
                        recipient_id = notice.recipient_id,
                        kind = %notice.kind,
                        "Failed to deliver notice"
                    );
                }
            }
        }
    }

    /// Everything, in one go.
    pub async fn dispatch(mut self, bus: &EventBus, fanout: &dyn NotificationFanout) -> DispatchSummary {
        let mut summary = DispatchSummary::default();
        self.flush_realtime(bus, fanout, &mut summary).await;
        self.deliver_notices(fanout, &mut summary).await;
        summary
    }
}
