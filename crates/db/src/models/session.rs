//! Row model for the `sessions` table.
//!
//! Embedded sub-records live in JSONB columns and decode straight into the
//! domain types through [`sqlx::types::Json`].

use std::collections::{BTreeMap, BTreeSet};

use lessonline_core::error::CoreError;
use lessonline_core::session::{
    Cancellation, DirtyFields, Invitation, PaymentHold, PresenceRecord, Session,
};
use lessonline_core::types::{DbId, Timestamp};
use sqlx::types::Json;
use sqlx::FromRow;

/// A row from the `sessions` table.
#[derive(Debug, Clone, FromRow)]
pub struct SessionRow {
    pub id: DbId,
    pub kind: String,
    pub host_id: DbId,
    pub title: String,
    pub starts_at: Timestamp,
    pub ends_at: Timestamp,
    pub capacity: i32,
    pub min_participants: i32,
    pub enforce_minimum: bool,
    pub status: String,
    pub cancelled_at: Option<Timestamp>,
    pub cancellation_reason: Option<String>,
    pub cancelled_by: Option<DbId>,
    pub invitations: Json<Vec<Invitation>>,
    pub confirmed: Json<BTreeSet<DbId>>,
    pub payment_holds: Json<Vec<PaymentHold>>,
    pub presence: Json<BTreeMap<DbId, PresenceRecord>>,
    pub version: i64,
}

impl TryFrom<SessionRow> for Session {
    type Error = CoreError;

    fn try_from(row: SessionRow) -> Result<Self, Self::Error> {
        let cancellation = match (row.cancelled_at, row.cancellation_reason) {
            (Some(at), Some(reason)) => Some(Cancellation {
                at,
                reason: reason.parse()?,
                by: row.cancelled_by,
            }),
            (None, None) => None,
            _ => {
                return Err(CoreError::Storage(format!(
                    "session {} has partial cancellation metadata",
                    row.id
                )))
            }
        };

        Ok(Session {
            id: row.id,
            kind: row.kind.parse()?,
            host_id: row.host_id,
            title: row.title,
            starts_at: row.starts_at,
            ends_at: row.ends_at,
            capacity: row.capacity,
            min_participants: row.min_participants,
            enforce_minimum: row.enforce_minimum,
            status: row.status.parse()?,
            cancellation,
            invitations: row.invitations.0,
            confirmed: row.confirmed.0,
            payment_holds: row.payment_holds.0,
            presence: row.presence.0,
            version: row.version,
            dirty: DirtyFields::default(),
        })
    }
}
