//! Host calendar row models.

use lessonline_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// Block kind for a host's booked session.
pub const SESSION_BLOCK: &str = "session";

/// A row from the `availability_blocks` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct AvailabilityBlock {
    pub id: DbId,
    pub host_id: DbId,
    pub kind: String,
    pub session_id: Option<DbId>,
    pub starts_at: Timestamp,
    pub ends_at: Timestamp,
    pub created_at: Timestamp,
}

/// A row from the `host_availability` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct HostAvailability {
    pub host_id: DbId,
    pub on_demand_enabled: bool,
    pub updated_at: Timestamp,
}
