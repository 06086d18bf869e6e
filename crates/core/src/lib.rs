//! Session lifecycle domain logic.
//!
//! This crate holds the pure rules of the lesson platform: the session data
//! model and its invariants, the viability and reclamation decisions, the
//! on-demand booking state machine, notice texts, and the realtime event
//! envelope. It has no database or network dependencies; external
//! collaborators are reached through the async traits in [`ports`].

#[macro_use]
mod macros;

pub mod booking;
pub mod error;
pub mod notice;
pub mod ports;
pub mod realtime;
pub mod reclaim;
pub mod session;
pub mod types;
pub mod viability;
