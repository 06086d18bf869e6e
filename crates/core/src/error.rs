use crate::types::DbId;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: DbId },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    /// The requested transition is not allowed from the current state.
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    /// A conditional update lost the race against a concurrent writer.
    #[error("Stale version: {entity} with id {id} was modified concurrently")]
    StaleVersion { entity: &'static str, id: DbId },

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Payment gateway error: {0}")]
    Gateway(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Internal error: {0}")]
    Internal(String),
}
