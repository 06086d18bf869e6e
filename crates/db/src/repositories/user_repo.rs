//! Read-only lookups on the `users` table.

use lessonline_core::types::DbId;
use sqlx::PgPool;

pub struct UserRepo;

impl UserRepo {
    pub async fn display_name(pool: &PgPool, user_id: DbId) -> Result<Option<String>, sqlx::Error> {
        sqlx::query_scalar("SELECT display_name FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(pool)
            .await
    }

    /// Create a user, returning its id. Used by seeding and tests.
    pub async fn create(pool: &PgPool, display_name: &str) -> Result<DbId, sqlx::Error> {
        sqlx::query_scalar("INSERT INTO users (display_name) VALUES ($1) RETURNING id")
            .bind(display_name)
            .fetch_one(pool)
            .await
    }
}
