//! Repository for the `users` table (concurrency counter only).

use sqlx::PgPool;

pub struct UserRepo;

impl UserRepo {
    /// Add `delta` to `concurrent_jobs` in a single statement, clamping at
    /// zero. Returns `false` if the user row does not exist.
    pub async fn adjust_concurrent_jobs(
        pool: &PgPool,
        user_id: &str,
        delta: i32,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE users \
             SET concurrent_jobs = GREATEST(concurrent_jobs + $2, 0), updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(user_id)
        .bind(delta)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn concurrent_jobs(pool: &PgPool, user_id: &str) -> Result<Option<i32>, sqlx::Error> {
        sqlx::query_scalar("SELECT concurrent_jobs FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(pool)
            .await
    }
}
