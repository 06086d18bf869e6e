pub mod availability;
pub mod ledger;
pub mod notification;
pub mod session;
pub mod session_event;
