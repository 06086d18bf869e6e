//! Repository for the `payment_ledger` table.

use lessonline_core::session::PaymentHold;
use lessonline_core::types::DbId;
use sqlx::PgPool;

use crate::models::ledger::LedgerEntry;

const COLUMNS: &str =
    "session_id, hold_id, participant_id, amount_cents, status, attendance, updated_at";

/// Mirrors payment-hold state into the ledger.
pub struct PaymentLedgerRepo;

impl PaymentLedgerRepo {
    /// Insert or overwrite the ledger entry for one hold.
    pub async fn upsert(
        pool: &PgPool,
        session_id: DbId,
        hold: &PaymentHold,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO payment_ledger \
                (session_id, hold_id, participant_id, amount_cents, status, attendance) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             ON CONFLICT (session_id, hold_id) DO UPDATE \
             SET status = EXCLUDED.status, attendance = EXCLUDED.attendance, updated_at = NOW()",
        )
        .bind(session_id)
        .bind(hold.id)
        .bind(hold.participant_id)
        .bind(hold.amount_cents)
        .bind(hold.status.as_str())
        .bind(hold.attendance.as_str())
        .execute(pool)
        .await?;
        Ok(())
    }

    pub async fn list_for_session(
        pool: &PgPool,
        session_id: DbId,
    ) -> Result<Vec<LedgerEntry>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM payment_ledger WHERE session_id = $1 ORDER BY participant_id"
        );
        sqlx::query_as::<_, LedgerEntry>(&query)
            .bind(session_id)
            .fetch_all(pool)
            .await
    }
}
