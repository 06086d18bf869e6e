//! HTTP client for the payment provider.
//!
//! [`HttpPaymentGateway`] implements
//! [`PaymentGateway`](lessonline_core::ports::PaymentGateway) and reduces every
//! provider response to success, [`GatewayError::InvalidState`], or
//! [`GatewayError::Transient`].
//!
//! [`GatewayError::InvalidState`]: lessonline_core::ports::GatewayError::InvalidState
//! [`GatewayError::Transient`]: lessonline_core::ports::GatewayError::Transient

pub mod client;
pub mod config;

pub use client::HttpPaymentGateway;
pub use config::GatewayConfig;
