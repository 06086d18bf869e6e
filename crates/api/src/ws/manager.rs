use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Bytes;
use axum::extract::ws::Message;
use lessonline_core::ports::{ConnectionHandle, ConnectionRegistry, PushSink};
use lessonline_core::realtime::RealtimeEvent;
use lessonline_core::types::{DbId, Timestamp};
use tokio::sync::{mpsc, RwLock};

/// Channel sender half for pushing messages to a WebSocket connection.
pub type WsSender = mpsc::UnboundedSender<Message>;

/// Result of one heartbeat pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PingTally {
    pub alive: usize,
    pub dropped: usize,
}

/// Metadata for a single WebSocket connection.
pub struct WsConnection {
    pub user_id: DbId,
    /// Channel sender for outbound messages to this connection.
    pub sender: WsSender,
    pub connected_at: Timestamp,
}

/// Manages all active WebSocket connections.
///
/// Thread-safe via interior `RwLock`; wrapped in `Arc` and shared across
/// the application.
pub struct WsManager {
    connections: RwLock<HashMap<String, WsConnection>>,
}

impl WsManager {
    pub fn new() -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
        }
    }

    /// Register a new connection.
    ///
    /// Returns the receiver half of the message channel so the caller can
    /// forward messages to the WebSocket sink.
    pub async fn add(&self, conn_id: String, user_id: DbId) -> mpsc::UnboundedReceiver<Message> {
        let (tx, rx) = mpsc::unbounded_channel();
        let conn = WsConnection {
            user_id,
            sender: tx,
            connected_at: chrono::Utc::now(),
        };
        self.connections.write().await.insert(conn_id, conn);
        rx
    }

    pub async fn remove(&self, conn_id: &str) {
        self.connections.write().await.remove(conn_id);
    }

    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }

    /// Send a Close frame to every connection, then clear the map.
    pub async fn shutdown_all(&self) {
        let mut conns = self.connections.write().await;
        let count = conns.len();
        for conn in conns.values() {
            let _ = conn.sender.send(Message::Close(None));
        }
        conns.clear();
        tracing::info!(count, "Closed all WebSocket connections");
    }

    /// Ping every connection and drop the ones whose channel is closed.
    pub async fn ping_and_prune(&self) -> PingTally {
        let mut conns = self.connections.write().await;
        let before = conns.len();
        conns.retain(|conn_id, conn| {
            let open = conn.sender.send(Message::Ping(Bytes::new())).is_ok();
            if !open {
                tracing::debug!(conn_id = %conn_id, user_id = conn.user_id, "Forgetting closed WebSocket connection");
            }
            open
        });
        PingTally {
            alive: conns.len(),
            dropped: before - conns.len(),
        }
    }
}

impl Default for WsManager {
    fn default() -> Self {
        Self::new()
    }
}

fn encode(event: &RealtimeEvent) -> Option<Message> {
    match serde_json::to_string(event) {
        Ok(text) => Some(Message::Text(text.into())),
        Err(e) => {
            tracing::error!(error = %e, event = event.name(), "Failed to encode realtime event");
            None
        }
    }
}

/// One connection seen as a push target.
struct ChannelSink {
    conn_id: String,
    sender: WsSender,
}

impl PushSink for ChannelSink {
    fn push(&self, event: &RealtimeEvent) -> bool {
        let Some(frame) = encode(event) else {
            return false;
        };
        let sent = self.sender.send(frame).is_ok();
        if !sent {
            tracing::debug!(conn_id = %self.conn_id, "WebSocket channel closed");
        }
        sent
    }
}

#[async_trait]
impl ConnectionRegistry for WsManager {
    async fn connection_for(&self, user_id: DbId) -> Option<ConnectionHandle> {
        let conns = self.connections.read().await;
        let sinks: Vec<Arc<dyn PushSink>> = conns
            .iter()
            .filter(|(_, conn)| conn.user_id == user_id)
            .map(|(id, conn)| {
                Arc::new(ChannelSink {
                    conn_id: id.clone(),
                    sender: conn.sender.clone(),
                }) as Arc<dyn PushSink>
            })
            .collect();
        if sinks.is_empty() {
            return None;
        }
        Some(ConnectionHandle { user_id, sinks })
    }
}
