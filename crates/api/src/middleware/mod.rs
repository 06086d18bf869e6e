//! Request extractors shared by the handlers.
//!
//! - [`identity::Caller`] -- The user on whose behalf a request is made.

pub mod identity;
