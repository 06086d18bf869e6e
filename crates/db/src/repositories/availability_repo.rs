//! Repository for the host calendar tables.

use lessonline_core::types::{DbId, Timestamp};
use sqlx::PgPool;

use crate::models::availability::{AvailabilityBlock, SESSION_BLOCK};

const BLOCK_COLUMNS: &str = "id, host_id, kind, session_id, starts_at, ends_at, created_at";

/// Availability blocks and the on-demand flag.
pub struct AvailabilityRepo;

impl AvailabilityRepo {
    /// Create the `session` block that reserves a host's time for a session.
    pub async fn create_session_block(
        pool: &PgPool,
        host_id: DbId,
        session_id: DbId,
        starts_at: Timestamp,
        ends_at: Timestamp,
    ) -> Result<AvailabilityBlock, sqlx::Error> {
        let query = format!(
            "INSERT INTO availability_blocks (host_id, kind, session_id, starts_at, ends_at) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING {BLOCK_COLUMNS}"
        );
        sqlx::query_as::<_, AvailabilityBlock>(&query)
            .bind(host_id)
            .bind(SESSION_BLOCK)
            .bind(session_id)
            .bind(starts_at)
            .bind(ends_at)
            .fetch_one(pool)
            .await
    }

    pub async fn list_for_host(
        pool: &PgPool,
        host_id: DbId,
    ) -> Result<Vec<AvailabilityBlock>, sqlx::Error> {
        let query = format!(
            "SELECT {BLOCK_COLUMNS} FROM availability_blocks \
             WHERE host_id = $1 ORDER BY starts_at"
        );
        sqlx::query_as::<_, AvailabilityBlock>(&query)
            .bind(host_id)
            .fetch_all(pool)
            .await
    }

    /// Delete the host's `session` block for `session_id`.
    ///
    /// Returns `true` if a block was removed.
    pub async fn delete_session_block(
        pool: &PgPool,
        host_id: DbId,
        session_id: DbId,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "DELETE FROM availability_blocks \
             WHERE host_id = $1 AND kind = $2 AND session_id = $3",
        )
        .bind(host_id)
        .bind(SESSION_BLOCK)
        .bind(session_id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Whether the host has on-demand availability on. Hosts without a row
    /// are off.
    pub async fn on_demand_enabled(pool: &PgPool, host_id: DbId) -> Result<bool, sqlx::Error> {
        let enabled: Option<bool> = sqlx::query_scalar(
            "SELECT on_demand_enabled FROM host_availability WHERE host_id = $1",
        )
        .bind(host_id)
        .fetch_optional(pool)
        .await?;
        Ok(enabled.unwrap_or(false))
    }

    pub async fn set_on_demand(
        pool: &PgPool,
        host_id: DbId,
        enabled: bool,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO host_availability (host_id, on_demand_enabled) VALUES ($1, $2) \
             ON CONFLICT (host_id) DO UPDATE \
             SET on_demand_enabled = EXCLUDED.on_demand_enabled, updated_at = NOW()",
        )
        .bind(host_id)
        .bind(enabled)
        .execute(pool)
        .await?;
        Ok(())
    }
}
