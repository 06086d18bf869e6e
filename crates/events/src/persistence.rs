//! Durable audit trail of lifecycle events.
//!
//! [`EventPersistence`] subscribes to the [`EventBus`](crate::bus::EventBus)
//! and writes every received [`LifecycleEvent`] to `session_events`. It runs
//! as a long-lived background task and exits when the bus is dropped.

use lessonline_core::types::DbId;
use lessonline_db::repositories::SessionEventRepo;
use lessonline_db::DbPool;
use tokio::sync::broadcast;

use crate::bus::LifecycleEvent;

/// Background service that persists lifecycle events.
pub struct EventPersistence;

impl EventPersistence {
    /// Run the persistence loop until the channel closes.
    pub async fn run(pool: DbPool, mut receiver: broadcast::Receiver<LifecycleEvent>) {
        loop {
            match receiver.recv().await {
                Ok(event) => {
                    if let Err(e) = Self::persist(&pool, &event).await {
                        tracing::error!(
                            error = %e,
                            event_type = %event.event_type,
                            session_id = ?event.session_id,
                            "Failed to persist lifecycle event"
                        );
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(
                        skipped = n,
                        "Event persistence lagged, some events were not persisted"
                    );
                }
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::info!("Event bus closed, persistence shutting down");
                    break;
                }
            }
        }
    }

    async fn persist(pool: &DbPool, event: &LifecycleEvent) -> Result<DbId, sqlx::Error> {
        SessionEventRepo::insert(
            pool,
            &event.event_type,
            event.session_id,
            event.actor_user_id,
            &event.payload,
        )
        .await
    }
}
