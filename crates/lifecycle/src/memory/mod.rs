//! In-memory implementations of every port.
//!
//! Used by the test suites of this crate and of `lessonline-api`, and handy
//! for running the lifecycle without Postgres or a payment provider. Each
//! adapter records what it was asked to do and can be told to fail.

mod gateway;
mod realtime;
mod store;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use lessonline_events::{EventBus, Notifier};

pub use gateway::{GatewayCall, MemoryGateway, MemoryLedger};
pub use realtime::{MemoryNotificationStore, MemoryRegistry, RecordingSink};
pub use store::{MemoryAvailability, MemorySessionStore, MemoryUsers};

use crate::ports::Ports;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A full set of in-memory collaborators.
#[derive(Clone, Default)]
pub struct InMemory {
    pub sessions: Arc<MemorySessionStore>,
    pub availability: Arc<MemoryAvailability>,
    pub gateway: Arc<MemoryGateway>,
    pub ledger: Arc<MemoryLedger>,
    pub notifications: Arc<MemoryNotificationStore>,
    pub registry: Arc<MemoryRegistry>,
    pub users: Arc<MemoryUsers>,
    pub events: Arc<EventBus>,
}

impl InMemory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ports wired to these adapters, with the real [`Notifier`] doing the
    /// fan-out.
    pub fn ports(&self) -> Ports {
        Ports {
            sessions: self.sessions.clone(),
            availability: self.availability.clone(),
            gateway: self.gateway.clone(),
            ledger: self.ledger.clone(),
            fanout: Arc::new(Notifier::new(
                self.notifications.clone(),
                self.registry.clone(),
            )),
            users: self.users.clone(),
            events: self.events.clone(),
        }
    }
}
