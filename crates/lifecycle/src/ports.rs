use std::sync::Arc;

use lessonline_core::ports::{
    AvailabilityStore, NotificationFanout, PaymentGateway, PaymentLedger, SessionStore,
    UserDirectory,
};
use lessonline_events::EventBus;

/// The collaborators shared by all lifecycle components.
#[derive(Clone)]
pub struct Ports {
    pub sessions: Arc<dyn SessionStore>,
    pub availability: Arc<dyn AvailabilityStore>,
    pub gateway: Arc<dyn PaymentGateway>,
    pub ledger: Arc<dyn PaymentLedger>,
    pub fanout: Arc<dyn NotificationFanout>,
    pub users: Arc<dyn UserDirectory>,
    pub events: Arc<EventBus>,
}
