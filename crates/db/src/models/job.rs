//! Row model for the `jobs` table.

use chrono::{DateTime, Utc};
use pdfpress_core::job::{CompressionMode, JobRecord, JobStatus};
use pdfpress_core::ports::RecordError;
use sqlx::FromRow;

/// A row from the `jobs` table, column types as Postgres returns them.
#[derive(Debug, Clone, FromRow)]
pub struct JobRow {
    pub id: String,
    pub status: String,
    pub progress: i16,
    pub original_path: Option<String>,
    pub compressed_path: Option<String>,
    pub compression_mode: Option<String>,
    pub original_size_bytes: Option<i64>,
    pub compressed_size_bytes: Option<i64>,
    pub error_message: Option<String>,
    pub user_id: Option<String>,
    pub file_id: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<JobRow> for JobRecord {
    type Error = RecordError;

    fn try_from(row: JobRow) -> Result<Self, Self::Error> {
        let status: JobStatus = row
            .status
            .parse()
            .map_err(|e| RecordError::Malformed(format!("job {}: {e}", row.id)))?;
        let progress = u8::try_from(row.progress)
            .ok()
            .filter(|p| *p <= 100)
            .ok_or_else(|| {
                RecordError::Malformed(format!("job {}: progress {} out of range", row.id, row.progress))
            })?;

        Ok(JobRecord {
            job_id: row.id,
            status,
            progress,
            original_path: row.original_path,
            compressed_path: row.compressed_path,
            compression_mode: CompressionMode::from_preset(row.compression_mode.as_deref()),
            original_size_bytes: row.original_size_bytes.and_then(|b| u64::try_from(b).ok()),
            compressed_size_bytes: row.compressed_size_bytes.and_then(|b| u64::try_from(b).ok()),
            error_message: row.error_message,
            user_id: row.user_id,
            file_id: row.file_id,
            updated_at: Some(row.updated_at),
        })
    }
}
