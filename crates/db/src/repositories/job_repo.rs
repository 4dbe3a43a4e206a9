//! Repository for the `jobs` table.
//!
//! Every write stamps `updated_at = NOW()` server-side and is guarded by the
//! set of statuses the record may legally move from.

use pdfpress_core::job::{ErrorMessageUpdate, JobStatus, JobUpdate};
use sqlx::PgPool;

use crate::models::job::JobRow;

/// Column list for `jobs` queries.
const COLUMNS: &str = "\
    id, status, progress, original_path, compressed_path, compression_mode, \
    original_size_bytes, compressed_size_bytes, error_message, \
    user_id, file_id, updated_at";

const ALL_STATUSES: [JobStatus; 4] = [
    JobStatus::Pending,
    JobStatus::Processing,
    JobStatus::Done,
    JobStatus::Failed,
];

/// Statuses a record may be in for a write carrying `next` to apply.
fn allowed_predecessors(next: JobStatus) -> Vec<String> {
    ALL_STATUSES
        .into_iter()
        .filter(|from| from.can_transition_to(next))
        .map(|from| from.as_str().to_string())
        .collect()
}

/// Provides read and partial-update operations for job records.
pub struct JobRepo;

impl JobRepo {
    pub async fn find_by_id(pool: &PgPool, job_id: &str) -> Result<Option<JobRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM jobs WHERE id = $1");
        sqlx::query_as::<_, JobRow>(&query)
            .bind(job_id)
            .fetch_optional(pool)
            .await
    }

    /// Take ownership of a pending job: `pending -> processing` at
    /// `progress`. Returns `false` when no pending row matched.
    pub async fn claim(pool: &PgPool, job_id: &str, progress: u8) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE jobs \
             SET status = 'processing', progress = $2, updated_at = NOW() \
             WHERE id = $1 AND status = 'pending'",
        )
        .bind(job_id)
        .bind(i16::from(progress))
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Apply a partial update. Returns `false` when no row matched, either
    /// because the job does not exist or because its current status does
    /// not allow the transition.
    pub async fn apply_update(
        pool: &PgPool,
        job_id: &str,
        update: &JobUpdate,
    ) -> Result<bool, sqlx::Error> {
        let (write_error, error_message) = match &update.error_message {
            ErrorMessageUpdate::Keep => (false, None),
            ErrorMessageUpdate::Clear => (true, None),
            ErrorMessageUpdate::Set(message) => (true, Some(message.as_str())),
        };

        let result = sqlx::query(
            "UPDATE jobs \
             SET status = $2, \
                 progress = COALESCE($3, progress), \
                 original_size_bytes = COALESCE($4, original_size_bytes), \
                 compressed_path = COALESCE($5, compressed_path), \
                 compressed_size_bytes = COALESCE($6, compressed_size_bytes), \
                 error_message = CASE WHEN $7 THEN $8 ELSE error_message END, \
                 updated_at = NOW() \
             WHERE id = $1 AND status = ANY($9)",
        )
        .bind(job_id)
        .bind(update.status.as_str())
        .bind(update.progress.map(i16::from))
        .bind(update.original_size_bytes.map(saturating_i64))
        .bind(update.compressed_path.as_deref())
        .bind(update.compressed_size_bytes.map(saturating_i64))
        .bind(write_error)
        .bind(error_message)
        .bind(allowed_predecessors(update.status))
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}

fn saturating_i64(bytes: u64) -> i64 {
    i64::try_from(bytes).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn done_only_follows_processing() {
        assert_eq!(allowed_predecessors(JobStatus::Done), vec!["processing"]);
    }

    #[test]
    fn failed_follows_pending_or_processing() {
        assert_eq!(
            allowed_predecessors(JobStatus::Failed),
            vec!["pending", "processing"]
        );
    }
}
