use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use lessonline_core::error::CoreError;
use lessonline_core::notice::{Notice, NotificationRecord};
use lessonline_core::ports::{ConnectionHandle, ConnectionRegistry, NotificationStore, PushSink};
use lessonline_core::realtime::RealtimeEvent;
use lessonline_core::types::DbId;

use super::lock;

// ---------------------------------------------------------------------------
// Notifications
// ---------------------------------------------------------------------------

#[derive(Default)]
struct NoticeLog {
    records: Vec<NotificationRecord>,
    failing_recipients: HashSet<DbId>,
}

#[derive(Default)]
pub struct MemoryNotificationStore {
    inner: Mutex<NoticeLog>,
}

impl MemoryNotificationStore {
    pub fn fail_for(&self, recipient_id: DbId) {
        lock(&self.inner).failing_recipients.insert(recipient_id);
    }

    pub fn all(&self) -> Vec<NotificationRecord> {
        lock(&self.inner).records.clone()
    }

    pub fn for_recipient(&self, recipient_id: DbId) -> Vec<NotificationRecord> {
        lock(&self.inner)
            .records
            .iter()
            .filter(|r| r.recipient_id == recipient_id)
            .cloned()
            .collect()
    }

    pub fn mark_read(&self, id: DbId, recipient_id: DbId) -> bool {
        let mut inner = lock(&self.inner);
        match inner
            .records
            .iter_mut()
            .find(|r| r.id == id && r.recipient_id == recipient_id && !r.is_read)
        {
            Some(record) => {
                record.is_read = true;
                true
            }
            None => false,
        }
    }
}

#[async_trait]
impl NotificationStore for MemoryNotificationStore {
    async fn persist(&self, notice: &Notice) -> Result<NotificationRecord, CoreError> {
        let mut inner = lock(&self.inner);
        if inner.failing_recipients.contains(&notice.recipient_id) {
            return Err(CoreError::Storage(format!(
                "cannot store notification for {}",
                notice.recipient_id
            )));
        }
        let record = NotificationRecord {
            id: inner.records.len() as DbId + 1,
            recipient_id: notice.recipient_id,
            kind: notice.kind,
            title: notice.title.clone(),
            message: notice.message.clone(),
            metadata: notice.metadata.clone(),
            is_read: false,
            created_at: Utc::now(),
        };
        inner.records.push(record.clone());
        Ok(record)
    }
}

// ---------------------------------------------------------------------------
// Connections
// ---------------------------------------------------------------------------

/// A connection that keeps every event pushed to it.
#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<RealtimeEvent>>,
}

impl RecordingSink {
    pub fn events(&self) -> Vec<RealtimeEvent> {
        lock(&self.events).clone()
    }

    /// Event type tags, in order.
    pub fn names(&self) -> Vec<&'static str> {
        lock(&self.events).iter().map(RealtimeEvent::name).collect()
    }

    pub fn clear(&self) {
        lock(&self.events).clear();
    }
}

impl PushSink for RecordingSink {
    fn push(&self, event: &RealtimeEvent) -> bool {
        lock(&self.events).push(event.clone());
        true
    }
}

#[derive(Default)]
pub struct MemoryRegistry {
    connected: Mutex<HashMap<DbId, Arc<RecordingSink>>>,
}

impl MemoryRegistry {
    /// Connect `user_id`, returning the sink that receives their pushes.
    pub fn connect(&self, user_id: DbId) -> Arc<RecordingSink> {
        lock(&self.connected)
            .entry(user_id)
            .or_default()
            .clone()
    }

    pub fn disconnect(&self, user_id: DbId) {
        lock(&self.connected).remove(&user_id);
    }
}

#[async_trait]
impl ConnectionRegistry for MemoryRegistry {
    async fn connection_for(&self, user_id: DbId) -> Option<ConnectionHandle> {
        let sink = lock(&self.connected).get(&user_id).cloned()?;
        Some(ConnectionHandle {
            user_id,
            sinks: vec![sink as Arc<dyn PushSink>],
        })
    }
}
