//! Periodic liveness check of realtime connections.
//!
//! Each beat pings every socket and forgets connections whose writer task is
//! gone, including clients that vanished without a Close frame.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::ws::manager::WsManager;

pub const HEARTBEAT_PERIOD: Duration = Duration::from_secs(30);

/// Spawn the heartbeat loop. It stops when `cancel` fires.
pub fn start_heartbeat(
    ws_manager: Arc<WsManager>,
    period: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut beats = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        beats.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = beats.tick() => {}
            }
            let tally = ws_manager.ping_and_prune().await;
            if tally.dropped > 0 {
                tracing::info!(alive = tally.alive, dropped = tally.dropped, "Dropped dead WebSocket connections");
            } else {
                tracing::trace!(alive = tally.alive, "WebSocket heartbeat");
            }
        }
        tracing::debug!("WebSocket heartbeat stopped");
    })
}
