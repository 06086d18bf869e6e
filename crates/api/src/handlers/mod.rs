pub mod hosts;
pub mod notifications;
pub mod sessions;
