//! The per-user concurrency slot held by a committed run.
//!
//! Upstream increments `concurrentJobs` when it submits a job; the worker
//! owes exactly one matching decrement once it commits to processing. The
//! slot is the only place that decrement is issued.

use std::sync::Arc;

use pdfpress_core::job::JobUpdate;
use pdfpress_core::ports::JobRecordStore;

/// `errorMessage` written when a run is dropped before it could finish.
pub const INTERRUPTED_MESSAGE: &str = "Job was interrupted before completion";

/// Guard for one job's claim on its user's concurrency counter.
///
/// Call [`ConcurrencySlot::release`] on every normal exit. If the guard is
/// instead dropped while still held (the run future was cancelled, or a
/// panic escaped), `Drop` hands the compensation to the Tokio runtime: the
/// job is marked failed and the counter decremented in a background task.
pub struct ConcurrencySlot {
    records: Arc<dyn JobRecordStore>,
    job_id: String,
    user_id: String,
    held: bool,
}

impl ConcurrencySlot {
    pub fn acquire(
        records: Arc<dyn JobRecordStore>,
        job_id: impl Into<String>,
        user_id: impl Into<String>,
    ) -> Self {
        Self {
            records,
            job_id: job_id.into(),
            user_id: user_id.into(),
            held: true,
        }
    }

    /// Issue the decrement. Consumes the slot, so it cannot fire twice.
    ///
    /// The decrement runs as its own task: once spawned it completes even
    /// if this future is dropped mid-await, and `Drop` no longer fires.
    pub async fn release(mut self) {
        let records = Arc::clone(&self.records);
        let job_id = std::mem::take(&mut self.job_id);
        let user_id = std::mem::take(&mut self.user_id);

        let task = tokio::spawn(async move {
            decrement(records.as_ref(), &job_id, &user_id).await;
        });
        self.held = false;

        if let Err(e) = task.await {
            tracing::error!(error = %e, "Concurrency release task failed");
        }
    }
}

async fn decrement(records: &dyn JobRecordStore, job_id: &str, user_id: &str) {
    match records.adjust_concurrency(user_id, -1).await {
        Ok(()) => tracing::debug!(job_id, user_id, "Released concurrency slot"),
        Err(e) => tracing::error!(
            job_id,
            user_id,
            error = %e,
            "Failed to release concurrency slot",
        ),
    }
}

impl Drop for ConcurrencySlot {
    fn drop(&mut self) {
        if !self.held {
            return;
        }

        let records = Arc::clone(&self.records);
        let job_id = std::mem::take(&mut self.job_id);
        let user_id = std::mem::take(&mut self.user_id);

        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            tracing::error!(
                job_id = %job_id,
                user_id = %user_id,
                "Concurrency slot dropped outside a runtime; decrement lost",
            );
            return;
        };

        tracing::warn!(
            job_id = %job_id,
            user_id = %user_id,
            "Run abandoned while holding its slot",
        );
        handle.spawn(async move {
            if let Err(e) = records
                .update(&job_id, &JobUpdate::failed(INTERRUPTED_MESSAGE))
                .await
            {
                tracing::error!(
                    job_id = %job_id,
                    error = %e,
                    "Failed to mark abandoned job as failed",
                );
            }
            decrement(records.as_ref(), &job_id, &user_id).await;
        });
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use pdfpress_core::job::{JobRecord, JobStatus, Milestone};

    use super::*;
    use crate::testing::MemoryJobRecordStore;

    fn store_with_processing_job() -> Arc<MemoryJobRecordStore> {
        let store = Arc::new(MemoryJobRecordStore::new());
        store.insert(JobRecord::pending("job-1"));
        store
    }

    async fn wait_for_adjustments(store: &MemoryJobRecordStore, expected: usize) {
        for _ in 0..100 {
            if store.adjustments().len() >= expected {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    #[tokio::test]
    async fn release_decrements_once() {
        let store = store_with_processing_job();
        let slot = ConcurrencySlot::acquire(store.clone(), "job-1", "u1");
        slot.release().await;

        // Give any stray background task a chance to run.
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(store.adjustments(), vec![("u1".to_string(), -1)]);
    }

    #[tokio::test]
    async fn cancelled_release_still_decrements_exactly_once() {
        let store = store_with_processing_job();
        let slot = ConcurrencySlot::acquire(store.clone(), "job-1", "u1");

        // A zero deadline drops `release` at its first await.
        let _ = tokio::time::timeout(Duration::ZERO, slot.release()).await;
        wait_for_adjustments(&store, 1).await;
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(store.adjustments(), vec![("u1".to_string(), -1)]);
        assert!(store.writes().is_empty());
        assert_eq!(store.job("job-1").unwrap().status, JobStatus::Pending);
    }

    #[tokio::test]
    async fn dropping_a_held_slot_compensates_in_background() {
        let store = store_with_processing_job();
        store
            .update("job-1", &JobUpdate::processing(Milestone::Started))
            .await
            .unwrap();

        drop(ConcurrencySlot::acquire(store.clone(), "job-1", "u1"));
        wait_for_adjustments(&store, 1).await;

        assert_eq!(store.adjustments(), vec![("u1".to_string(), -1)]);
        let job = store.job("job-1").unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.error_message.as_deref(), Some(INTERRUPTED_MESSAGE));
    }
}
