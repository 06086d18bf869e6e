//! Notification row model.

use lessonline_core::error::CoreError;
use lessonline_core::notice::NotificationRecord;
use lessonline_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `notifications` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Notification {
    pub id: DbId,
    pub user_id: DbId,
    pub kind: String,
    pub title: String,
    pub message: String,
    pub metadata: serde_json::Value,
    pub is_read: bool,
    pub read_at: Option<Timestamp>,
    pub created_at: Timestamp,
}

impl TryFrom<Notification> for NotificationRecord {
    type Error = CoreError;

    fn try_from(row: Notification) -> Result<Self, Self::Error> {
        Ok(NotificationRecord {
            id: row.id,
            recipient_id: row.user_id,
            kind: row.kind.parse()?,
            title: row.title,
            message: row.message,
            metadata: row.metadata,
            is_read: row.is_read,
            created_at: row.created_at,
        })
    }
}
