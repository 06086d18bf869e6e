use std::sync::Arc;

use lessonline_lifecycle::{Coordinator, Ports};

use crate::config::ServerConfig;
use crate::ws::WsManager;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable: everything inside is behind `Arc` or already `Clone`.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool, used directly by the notification inbox.
    pub pool: lessonline_db::DbPool,
    pub config: Arc<ServerConfig>,
    /// WebSocket connections; also the coordinator's connection registry.
    pub ws_manager: Arc<WsManager>,
    /// Collaborators shared with the lifecycle components.
    pub ports: Ports,
    pub coordinator: Coordinator,
}
