//! Background tasks and scheduled jobs.
//!
//! [`spawn_all`] starts the Viability Scheduler, the Payment Reclaimer, and
//! the audit writer for lifecycle events. Every task stops when the shared
//! [`CancellationToken`] is cancelled.

use std::time::Duration;

use lessonline_db::DbPool;
use lessonline_events::EventPersistence;
use lessonline_lifecycle::{LifecycleConfig, PaymentReclaimer, Ports, ViabilitySweeper};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Handles of the spawned background tasks.
pub struct BackgroundTasks {
    handles: Vec<(&'static str, JoinHandle<()>)>,
}

/// Spawn every background task.
pub fn spawn_all(
    pool: DbPool,
    ports: &Ports,
    config: &LifecycleConfig,
    cancel: CancellationToken,
) -> BackgroundTasks {
    let sweeper = ViabilitySweeper::new(ports.clone(), config.viability.clone());
    let viability = tokio::spawn(sweeper.run(cancel.clone()));

    let reclaimer = PaymentReclaimer::new(ports.clone(), config.reclaim.clone());
    let reclaim = tokio::spawn(reclaimer.run(cancel.clone()));

    // The bus outlives the server (every `Ports` clone holds it), so the
    // audit writer is stopped by the token rather than by the channel closing.
    let receiver = ports.events.subscribe();
    let persistence = tokio::spawn(async move {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Event persistence stopping");
            }
            _ = EventPersistence::run(pool, receiver) => {}
        }
    });

    tracing::info!("Background tasks started (viability, reclaimer, event persistence)");

    BackgroundTasks {
        handles: vec![
            ("viability", viability),
            ("reclaimer", reclaim),
            ("event_persistence", persistence),
        ],
    }
}

impl BackgroundTasks {
    /// Wait for every task to finish, giving each at most `timeout`.
    ///
    /// Call after cancelling the token passed to [`spawn_all`].
    pub async fn join(self, timeout: Duration) {
        for (name, handle) in self.handles {
            match tokio::time::timeout(timeout, handle).await {
                Ok(Ok(())) => tracing::info!(task = name, "Background task stopped"),
                Ok(Err(e)) => tracing::error!(task = name, error = %e, "Background task failed"),
                Err(_) => tracing::warn!(task = name, "Background task did not stop in time"),
            }
        }
    }
}
