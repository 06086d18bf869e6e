//! Payment ledger row model.

use lessonline_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

/// A row from the `payment_ledger` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct LedgerEntry {
    pub session_id: DbId,
    pub hold_id: Uuid,
    pub participant_id: DbId,
    pub amount_cents: i64,
    pub status: String,
    pub attendance: String,
    pub updated_at: Timestamp,
}
