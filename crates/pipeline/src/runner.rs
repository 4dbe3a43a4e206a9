//! The job state machine.
//!
//! ```text
//! read ──► terminal? ──yes──► AlreadyTerminal (no writes)
//!   │
//!   ├── missing fields ──► failed ("Invalid job data"), no slot
//!   │
//!   ├── claim lost (not pending) ──► AlreadyClaimed (no writes, no slot)
//!   │
//!   ▼  claimed pending -> processing 10, slot acquired (commitment point)
//! fetch ─► 25 ─► 50 + originalSizeBytes ─► tool
//!   ─► 75 ─► store ─► done 100
//!   │
//!   └─ any error or panic ─► failed (progress kept)
//!                              │
//!                              ▼
//!                        slot released (exactly once)
//! ```

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::FutureExt;
use pdfpress_core::job::{CompressionRequest, JobRecord, JobUpdate, Milestone};
use pdfpress_core::naming::compressed_artifact_path;
use pdfpress_core::ports::{ArtifactStore, CompressionTool, JobRecordStore, RecordError};

use crate::error::{PipelineError, INVALID_JOB_DATA};
use crate::slot::ConcurrencySlot;
use crate::staging::StagingArea;

/// Runtime knobs for [`JobPipeline`].
#[derive(Debug, Clone, Default)]
pub struct PipelineConfig {
    /// Parent directory for per-run staging areas. `None` uses the system
    /// temp directory.
    pub staging_root: Option<PathBuf>,
}

/// Result of a successful compression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedJob {
    pub job_id: String,
    pub compressed_path: String,
    pub original_size_bytes: u64,
    pub compressed_size_bytes: u64,
}

/// What [`JobPipeline::run`] did with a job.
#[derive(Debug, Clone, PartialEq)]
pub enum JobOutcome {
    /// The job was processed to `done` by this run.
    Completed(CompletedJob),
    /// The job had already reached `done` or `failed`; nothing was written.
    AlreadyTerminal(JobRecord),
    /// Another run moved the job out of `pending` first and owns it.
    AlreadyClaimed,
}

pub struct JobPipeline {
    records: Arc<dyn JobRecordStore>,
    artifacts: Arc<dyn ArtifactStore>,
    tool: Arc<dyn CompressionTool>,
    config: PipelineConfig,
}

impl JobPipeline {
    pub fn new(
        records: Arc<dyn JobRecordStore>,
        artifacts: Arc<dyn ArtifactStore>,
        tool: Arc<dyn CompressionTool>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            records,
            artifacts,
            tool,
            config,
        }
    }

    /// Process one job to completion.
    ///
    /// Errors other than `NotFound` and `InvalidJobData` have already been
    /// written to the job record as `failed` when this returns, and the
    /// user's concurrency slot has been released.
    #[tracing::instrument(skip(self), fields(user_id = tracing::field::Empty))]
    pub async fn run(&self, job_id: &str) -> Result<JobOutcome, PipelineError> {
        let record = match self.records.read(job_id).await {
            Ok(record) => record,
            Err(RecordError::NotFound(_)) => {
                return Err(PipelineError::NotFound(job_id.to_string()));
            }
            Err(e) => {
                return Err(PipelineError::Unexpected(format!(
                    "Failed to fetch job data: {e}"
                )));
            }
        };

        if record.status.is_terminal() {
            tracing::info!(status = %record.status, "Job already finished, skipping");
            return Ok(JobOutcome::AlreadyTerminal(record));
        }

        let request = match CompressionRequest::from_record(&record) {
            Ok(request) => request,
            Err(missing) => {
                tracing::warn!(error = %missing, "Rejecting incomplete job record");
                self.persist_failure(job_id, INVALID_JOB_DATA).await;
                return Err(PipelineError::InvalidJobData(missing));
            }
        };
        tracing::Span::current().record("user_id", request.user_id.as_str());

        // A failed claim write may still have landed, so it counts as
        // committed; only an observed non-pending status does not.
        let claim_error = match self.records.claim(job_id).await {
            Ok(true) => None,
            Ok(false) => {
                tracing::info!("Job already claimed by another run, skipping");
                return Ok(JobOutcome::AlreadyClaimed);
            }
            Err(e) => Some(e),
        };

        let slot = ConcurrencySlot::acquire(
            Arc::clone(&self.records),
            &request.job_id,
            &request.user_id,
        );

        let result = match claim_error {
            Some(e) => Err(PipelineError::Unexpected(format!(
                "Failed to update job record: {e}"
            ))),
            None => AssertUnwindSafe(self.process(&request))
                .catch_unwind()
                .await
                .unwrap_or_else(|payload| {
                    Err(PipelineError::Unexpected(panic_message(payload.as_ref())))
                }),
        };

        match &result {
            Ok(done) => tracing::info!(
                original_size_bytes = done.original_size_bytes,
                compressed_size_bytes = done.compressed_size_bytes,
                compressed_path = %done.compressed_path,
                "Compression job completed",
            ),
            Err(e) => {
                tracing::error!(error = %e, "Compression job failed");
                self.persist_failure(job_id, &e.job_message()).await;
            }
        }

        slot.release().await;
        result.map(JobOutcome::Completed)
    }

    /// Fetch, compress and store for a claimed run. Every `?` routes to the failure path
    /// in [`JobPipeline::run`].
    async fn process(&self, request: &CompressionRequest) -> Result<CompletedJob, PipelineError> {
        let job_id = request.job_id.as_str();
        let staging = StagingArea::create(self.config.staging_root.as_deref()).map_err(|e| {
            PipelineError::Unexpected(format!("Failed to create staging directory: {e}"))
        })?;
        let input = staging.original();
        let output = staging.compressed();

        tracing::debug!(path = %request.original_path, "Downloading original");
        self.artifacts
            .fetch(&request.original_path, &input)
            .await
            .map_err(PipelineError::FetchFailed)?;
        self.write(job_id, JobUpdate::processing(Milestone::Fetched))
            .await?;

        let original_size_bytes = file_size(&input).await?;
        self.write(
            job_id,
            JobUpdate::processing(Milestone::Compressing).with_original_size(original_size_bytes),
        )
        .await?;

        self.tool.compress(&input, &output, request.mode).await?;
        let compressed_size_bytes = match tokio::fs::metadata(&output).await {
            Ok(meta) if meta.len() > 0 => meta.len(),
            _ => {
                return Err(PipelineError::ToolFailed(
                    "tool reported success but produced no output".to_string(),
                ));
            }
        };

        self.write(job_id, JobUpdate::processing(Milestone::Storing))
            .await?;
        let compressed_path = compressed_artifact_path(&request.user_id, &request.file_id);
        tracing::debug!(path = %compressed_path, "Uploading compressed document");
        self.artifacts
            .store(&compressed_path, &output)
            .await
            .map_err(PipelineError::StoreFailed)?;

        self.write(
            job_id,
            JobUpdate::done(compressed_path.as_str(), compressed_size_bytes),
        )
        .await?;

        Ok(CompletedJob {
            job_id: job_id.to_string(),
            compressed_path,
            original_size_bytes,
            compressed_size_bytes,
        })
    }

    async fn write(&self, job_id: &str, update: JobUpdate) -> Result<(), PipelineError> {
        self.records.update(job_id, &update).await.map_err(|e| {
            PipelineError::Unexpected(format!("Failed to update job record: {e}"))
        })?;
        tracing::debug!(status = %update.status, progress = ?update.progress, "Job record updated");
        Ok(())
    }

    /// Write the terminal `failed` state. A failure here is logged only; the
    /// caller still returns the original cause.
    async fn persist_failure(&self, job_id: &str, message: &str) {
        if let Err(e) = self.records.update(job_id, &JobUpdate::failed(message)).await {
            tracing::error!(error = %e, "Failed to persist job failure");
        }
    }
}

async fn file_size(path: &Path) -> Result<u64, PipelineError> {
    tokio::fs::metadata(path)
        .await
        .map(|meta| meta.len())
        .map_err(|e| PipelineError::Unexpected(format!("Failed to stat staged file: {e}")))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    let detail = payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string());
    format!("worker panicked: {detail}")
}
