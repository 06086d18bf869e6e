//! Repository for the `sessions` table.

use lessonline_core::ports::SessionFilter;
use lessonline_core::session::{Attendance, HoldStatus, Session, SessionField};
use lessonline_core::types::DbId;
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, QueryBuilder};

use crate::models::session::SessionRow;

/// Column list for `sessions` queries.
const COLUMNS: &str = "id, kind, host_id, title, starts_at, ends_at, capacity, \
    min_participants, enforce_minimum, status, cancelled_at, cancellation_reason, \
    cancelled_by, invitations, confirmed, payment_holds, presence, version";

/// Provides conditional reads and writes of session records.
pub struct SessionRepo;

impl SessionRepo {
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<SessionRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM sessions WHERE id = $1");
        sqlx::query_as::<_, SessionRow>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Sessions matching `filter`, ordered by start time.
    pub async fn find(pool: &PgPool, filter: &SessionFilter) -> Result<Vec<SessionRow>, sqlx::Error> {
        let mut qb = QueryBuilder::<Postgres>::new(format!("SELECT {COLUMNS} FROM sessions WHERE TRUE"));

        if !filter.statuses.is_empty() {
            let statuses: Vec<String> = filter.statuses.iter().map(|s| s.to_string()).collect();
            qb.push(" AND status = ANY(").push_bind(statuses).push(")");
        }
        if let Some(from) = filter.starts_from {
            qb.push(" AND starts_at >= ").push_bind(from);
        }
        if let Some(to) = filter.starts_before {
            qb.push(" AND starts_at < ").push_bind(to);
        }
        if let Some(by) = filter.ended_by {
            qb.push(" AND ends_at <= ").push_bind(by);
        }
        if let Some(flag) = filter.enforce_minimum {
            qb.push(" AND enforce_minimum = ").push_bind(flag);
        }
        if filter.with_releasable_hold {
            qb.push(" AND EXISTS (SELECT 1 FROM jsonb_array_elements(payment_holds) AS h WHERE h->>'status' = ")
                .push_bind(HoldStatus::Authorized.as_str())
                .push(" AND h->>'attendance' <> ")
                .push_bind(Attendance::Joined.as_str())
                .push(")");
        }
        qb.push(" ORDER BY starts_at, id");
        if let Some(limit) = filter.limit {
            qb.push(" LIMIT ").push_bind(limit);
        }

        qb.build_query_as::<SessionRow>().fetch_all(pool).await
    }

    /// Insert a session materialized by `Session::from_new`, ignoring its id
    /// and version.
    pub async fn insert(pool: &PgPool, session: &Session) -> Result<SessionRow, sqlx::Error> {
        let query = format!(
            "INSERT INTO sessions \
                (kind, host_id, title, starts_at, ends_at, capacity, min_participants, \
                 enforce_minimum, status, invitations, confirmed, payment_holds, presence) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, SessionRow>(&query)
            .bind(session.kind.as_str())
            .bind(session.host_id)
            .bind(&session.title)
            .bind(session.starts_at)
            .bind(session.ends_at)
            .bind(session.capacity)
            .bind(session.min_participants)
            .bind(session.enforce_minimum)
            .bind(session.status.as_str())
            .bind(Json(&session.invitations))
            .bind(Json(&session.confirmed))
            .bind(Json(&session.payment_holds))
            .bind(Json(&session.presence))
            .fetch_one(pool)
            .await
    }

    /// Write the session's dirty fields if the stored version still equals
    /// `session.version`.
    ///
    /// Returns `false` when the row was modified concurrently (or is gone).
    pub async fn update_dirty(pool: &PgPool, session: &Session) -> Result<bool, sqlx::Error> {
        if session.dirty.is_empty() {
            return Ok(true);
        }

        let mut qb = QueryBuilder::<Postgres>::new("UPDATE sessions SET ");
        {
            let mut set = qb.separated(", ");
            for field in session.dirty.iter() {
                match field {
                    SessionField::Status => {
                        set.push("status = ")
                            .push_bind_unseparated(session.status.as_str());
                    }
                    SessionField::Cancellation => {
                        let c = session.cancellation.as_ref();
                        set.push("cancelled_at = ")
                            .push_bind_unseparated(c.map(|c| c.at));
                        set.push("cancellation_reason = ")
                            .push_bind_unseparated(c.map(|c| c.reason.as_str()));
                        set.push("cancelled_by = ")
                            .push_bind_unseparated(c.and_then(|c| c.by));
                    }
                    SessionField::Invitations => {
                        set.push("invitations = ")
                            .push_bind_unseparated(Json(session.invitations.clone()));
                    }
                    SessionField::Confirmed => {
                        set.push("confirmed = ")
                            .push_bind_unseparated(Json(session.confirmed.clone()));
                    }
                    SessionField::PaymentHolds => {
                        set.push("payment_holds = ")
                            .push_bind_unseparated(Json(session.payment_holds.clone()));
                    }
                    SessionField::Presence => {
                        set.push("presence = ")
                            .push_bind_unseparated(Json(session.presence.clone()));
                    }
                }
            }
            set.push("version = version + 1");
            set.push("updated_at = NOW()");
        }
        qb.push(" WHERE id = ")
            .push_bind(session.id)
            .push(" AND version = ")
            .push_bind(session.version);

        let result = qb.build().execute(pool).await?;
        Ok(result.rows_affected() == 1)
    }
}
