//! Repository for the `session_events` audit table.

use lessonline_core::types::DbId;
use sqlx::PgPool;

use crate::models::session_event::SessionEvent;

const COLUMNS: &str = "id, event_type, session_id, actor_user_id, payload, created_at";

/// Append-only audit trail of lifecycle transitions.
pub struct SessionEventRepo;

impl SessionEventRepo {
    /// Insert a new event row, returning the generated ID.
    pub async fn insert(
        pool: &PgPool,
        event_type: &str,
        session_id: Option<DbId>,
        actor_user_id: Option<DbId>,
        payload: &serde_json::Value,
    ) -> Result<DbId, sqlx::Error> {
        sqlx::query_scalar(
            "INSERT INTO session_events (event_type, session_id, actor_user_id, payload) \
             VALUES ($1, $2, $3, $4) \
             RETURNING id",
        )
        .bind(event_type)
        .bind(session_id)
        .bind(actor_user_id)
        .bind(payload)
        .fetch_one(pool)
        .await
    }

    /// Events for one session, oldest first.
    pub async fn list_for_session(
        pool: &PgPool,
        session_id: DbId,
    ) -> Result<Vec<SessionEvent>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM session_events \
             WHERE session_id = $1 ORDER BY created_at, id"
        );
        sqlx::query_as::<_, SessionEvent>(&query)
            .bind(session_id)
            .fetch_all(pool)
            .await
    }
}
