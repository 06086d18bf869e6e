pub mod availability_repo;
pub mod notification_repo;
pub mod payment_ledger_repo;
pub mod session_event_repo;
pub mod session_repo;
pub mod user_repo;

pub use availability_repo::AvailabilityRepo;
pub use notification_repo::NotificationRepo;
pub use payment_ledger_repo::PaymentLedgerRepo;
pub use session_event_repo::SessionEventRepo;
pub use session_repo::SessionRepo;
pub use user_repo::UserRepo;
