//! Notification fan-out: persist a notice, then push it to the recipient if
//! they are connected.
//!
//! Push is best-effort. A recipient without a live connection is a normal
//! branch, not an error; they will see the persisted record next time they
//! load their notifications.

use std::sync::Arc;

use async_trait::async_trait;
use lessonline_core::error::CoreError;
use lessonline_core::notice::{Notice, NotificationRecord};
use lessonline_core::ports::{ConnectionRegistry, NotificationFanout, NotificationStore};
use lessonline_core::realtime::RealtimeEvent;
use lessonline_core::types::DbId;

/// [`NotificationFanout`] over a notification store and a connection registry.
#[derive(Clone)]
pub struct Notifier {
    store: Arc<dyn NotificationStore>,
    registry: Arc<dyn ConnectionRegistry>,
}

impl Notifier {
    pub fn new(store: Arc<dyn NotificationStore>, registry: Arc<dyn ConnectionRegistry>) -> Self {
        Self { store, registry }
    }
}

#[async_trait]
impl NotificationFanout for Notifier {
    async fn notify(&self, notice: &Notice) -> Result<NotificationRecord, CoreError> {
        let record = self.store.persist(notice).await?;

        let event = RealtimeEvent::Notification {
            notification_id: record.id,
            kind: record.kind.to_string(),
            title: record.title.clone(),
            message: record.message.clone(),
        };
        self.push_if_connected(record.recipient_id, &event).await;

        Ok(record)
    }

    async fn push_if_connected(&self, recipient_id: DbId, event: &RealtimeEvent) -> bool {
        let Some(handle) = self.registry.connection_for(recipient_id).await else {
            tracing::debug!(recipient_id, event = event.name(), "Recipient not connected, push skipped");
            return false;
        };
        let delivered = handle.push(event);
        if !delivered {
            tracing::debug!(recipient_id, event = event.name(), "Push channel closed");
        }
        delivered
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use chrono::Utc;
    use lessonline_core::ports::{ConnectionHandle, PushSink};

    use super::*;

    #[derive(Default)]
    struct VecStore {
        records: Mutex<Vec<NotificationRecord>>,
    }

    #[async_trait]
    impl NotificationStore for VecStore {
        async fn persist(&self, notice: &Notice) -> Result<NotificationRecord, CoreError> {
            let mut records = self.records.lock().unwrap();
            let record = NotificationRecord {
                id: records.len() as DbId + 1,
                recipient_id: notice.recipient_id,
                kind: notice.kind,
                title: notice.title.clone(),
                message: notice.message.clone(),
                metadata: notice.metadata.clone(),
                is_read: false,
                created_at: Utc::now(),
            };
            records.push(record.clone());
            Ok(record)
        }
    }

    struct FailingStore;

    #[async_trait]
    impl NotificationStore for FailingStore {
        async fn persist(&self, _notice: &Notice) -> Result<NotificationRecord, CoreError> {
            Err(CoreError::Storage("connection refused".into()))
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        events: Mutex<Vec<RealtimeEvent>>,
    }

    impl PushSink for RecordingSink {
        fn push(&self, event: &RealtimeEvent) -> bool {
            self.events.lock().unwrap().push(event.clone());
            true
        }
    }

    #[derive(Default)]
    struct MapRegistry {
        sinks: HashMap<DbId, Arc<RecordingSink>>,
    }

    #[async_trait]
    impl ConnectionRegistry for MapRegistry {
        async fn connection_for(&self, user_id: DbId) -> Option<ConnectionHandle> {
            self.sinks.get(&user_id).map(|sink| ConnectionHandle {
                user_id,
                sinks: vec![sink.clone() as Arc<dyn PushSink>],
            })
        }
    }

    fn notifier_with(connected: &[DbId]) -> (Notifier, Arc<VecStore>, MapRegistry) {
        let store = Arc::new(VecStore::default());
        let mut registry = MapRegistry::default();
        for &id in connected {
            registry.sinks.insert(id, Arc::new(RecordingSink::default()));
        }
        let shared = MapRegistry {
            sinks: registry.sinks.clone(),
        };
        (Notifier::new(store.clone(), Arc::new(shared)), store, registry)
    }

    #[tokio::test]
    async fn connected_recipient_gets_persisted_and_pushed() {
        let (notifier, store, registry) = notifier_with(&[1]);
        let record = notifier
            .notify(&Notice::availability_disabled(1))
            .await
            .unwrap();

        assert_eq!(store.records.lock().unwrap().len(), 1);
        let pushed = registry.sinks[&1].events.lock().unwrap().clone();
        assert_eq!(pushed.len(), 1);
        assert!(matches!(
            &pushed[0],
            RealtimeEvent::Notification { notification_id, .. } if *notification_id == record.id
        ));
    }

    #[tokio::test]
    async fn offline_recipient_is_only_persisted() {
        let (notifier, store, _registry) = notifier_with(&[]);
        notifier
            .notify(&Notice::availability_disabled(1))
            .await
            .unwrap();
        assert_eq!(store.records.lock().unwrap().len(), 1);

        let event = RealtimeEvent::SessionEnded {
            session_id: 3,
            ended_by: 1,
        };
        assert!(!notifier.push_if_connected(1, &event).await);
    }

    #[tokio::test]
    async fn store_failure_skips_push() {
        let registry = MapRegistry {
            sinks: HashMap::from([(1, Arc::new(RecordingSink::default()))]),
        };
        let sink = registry.sinks[&1].clone();
        let notifier = Notifier::new(Arc::new(FailingStore), Arc::new(registry));

        assert!(notifier.notify(&Notice::availability_disabled(1)).await.is_err());
        assert!(sink.events.lock().unwrap().is_empty());
    }
}
