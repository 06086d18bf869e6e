//! The session lifecycle components.
//!
//! - [`ViabilitySweeper`]: cancels under-enrolled sessions shortly before
//!   they start.
//! - [`PaymentReclaimer`]: releases authorization holds of participants who
//!   never joined a finished session.
//! - [`Coordinator`]: the per-host booking state machine plus join/leave
//!   presence.
//!
//! Every component talks to the outside world through [`Ports`]. Persisted
//! state is always committed before anything is sent to users; see
//! [`dispatch::Outbox`].

pub mod commit;
pub mod config;
pub mod coordinator;
pub mod dispatch;
pub mod holds;
pub mod memory;
pub mod ports;
pub mod reclaimer;
pub mod ticker;
pub mod viability;

pub use config::{CoordinatorConfig, LifecycleConfig, ReclaimConfig, ViabilityConfig};
pub use coordinator::Coordinator;
pub use ports::Ports;
pub use reclaimer::{PaymentReclaimer, ReclaimReport};
pub use viability::{SweepReport, ViabilitySweeper};
