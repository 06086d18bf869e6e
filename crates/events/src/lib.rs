//! Event plumbing for the session lifecycle.
//!
//! - [`bus`]: in-process broadcast of [`LifecycleEvent`](bus::LifecycleEvent)s.
//! - [`persistence`]: writes every bus event to the `session_events` audit table.
//! - [`fanout`]: the notification fan-out (persist, then push if connected).

pub mod bus;
pub mod fanout;
pub mod persistence;

pub use bus::{EventBus, LifecycleEvent};
pub use fanout::Notifier;
pub use persistence::EventPersistence;
