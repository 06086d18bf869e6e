//! WebSocket infrastructure for realtime pushes.
//!
//! Provides the connection registry the lifecycle pushes through, the
//! heartbeat, and the HTTP upgrade handler.

mod handler;
mod heartbeat;
pub mod manager;

pub use handler::ws_handler;
pub use heartbeat::{start_heartbeat, HEARTBEAT_PERIOD};
pub use manager::{PingTally, WsManager};
