//! [`JobRecordStore`] backed by Postgres.

use async_trait::async_trait;
use pdfpress_core::job::{JobRecord, JobUpdate, Milestone};
use pdfpress_core::ports::{JobRecordStore, RecordError};

use crate::repositories::{JobRepo, UserRepo};
use crate::DbPool;

#[derive(Clone)]
pub struct PgJobRecordStore {
    pool: DbPool,
}

impl PgJobRecordStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

fn query_error(err: sqlx::Error) -> RecordError {
    RecordError::Query(err.to_string())
}

#[async_trait]
impl JobRecordStore for PgJobRecordStore {
    async fn read(&self, job_id: &str) -> Result<JobRecord, RecordError> {
        let row = JobRepo::find_by_id(&self.pool, job_id)
            .await
            .map_err(query_error)?
            .ok_or_else(|| RecordError::NotFound(job_id.to_string()))?;
        JobRecord::try_from(row)
    }

    async fn claim(&self, job_id: &str) -> Result<bool, RecordError> {
        if JobRepo::claim(&self.pool, job_id, Milestone::Started.percent())
            .await
            .map_err(query_error)?
        {
            return Ok(true);
        }

        match JobRepo::find_by_id(&self.pool, job_id)
            .await
            .map_err(query_error)?
        {
            None => Err(RecordError::NotFound(job_id.to_string())),
            Some(_) => Ok(false),
        }
    }

    async fn update(&self, job_id: &str, update: &JobUpdate) -> Result<(), RecordError> {
        if JobRepo::apply_update(&self.pool, job_id, update)
            .await
            .map_err(query_error)?
        {
            return Ok(());
        }

        // Nothing matched: tell a missing job apart from a refused transition.
        match JobRepo::find_by_id(&self.pool, job_id)
            .await
            .map_err(query_error)?
        {
            None => Err(RecordError::NotFound(job_id.to_string())),
            Some(row) => Err(RecordError::InvalidTransition {
                job_id: job_id.to_string(),
                from: row
                    .status
                    .parse()
                    .map_err(|e| RecordError::Malformed(format!("job {job_id}: {e}")))?,
                to: update.status,
            }),
        }
    }

    async fn adjust_concurrency(&self, user_id: &str, delta: i32) -> Result<(), RecordError> {
        let found = UserRepo::adjust_concurrent_jobs(&self.pool, user_id, delta)
            .await
            .map_err(query_error)?;
        if !found {
            tracing::warn!(user_id, delta, "No user row for concurrency adjustment");
        }
        Ok(())
    }
}
