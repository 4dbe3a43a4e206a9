//! Collaborator interfaces driven by the compression pipeline.
//!
//! Each port is an object-safe async trait so adapters (S3, Postgres,
//! Ghostscript) and in-memory doubles can be injected as `Arc<dyn _>`.

use std::path::Path;

use async_trait::async_trait;

use crate::job::{CompressionMode, JobRecord, JobStatus, JobUpdate};

// ---------------------------------------------------------------------------
// Job records
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    #[error("job {0} not found")]
    NotFound(String),

    #[error("illegal status transition for job {job_id}: {from} -> {to}")]
    InvalidTransition {
        job_id: String,
        from: JobStatus,
        to: JobStatus,
    },

    #[error("malformed job record: {0}")]
    Malformed(String),

    #[error("record store query failed: {0}")]
    Query(String),
}

/// Structured job state plus the per-user concurrency counter.
#[async_trait]
pub trait JobRecordStore: Send + Sync {
    async fn read(&self, job_id: &str) -> Result<JobRecord, RecordError>;

    /// Move the job from `pending` to `processing` at the first milestone,
    /// in one compare-and-set.
    ///
    /// Returns `Ok(false)` when the job exists but is no longer `pending`,
    /// i.e. another run already owns it.
    async fn claim(&self, job_id: &str) -> Result<bool, RecordError>;

    /// Apply a partial write. The store stamps `updatedAt` itself.
    async fn update(&self, job_id: &str, update: &JobUpdate) -> Result<(), RecordError>;

    /// Atomically add `delta` to the user's `concurrentJobs` counter.
    async fn adjust_concurrency(&self, user_id: &str, delta: i32) -> Result<(), RecordError>;
}

// ---------------------------------------------------------------------------
// Artifacts
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
    #[error("artifact not found: {0}")]
    NotFound(String),

    #[error("download of {path} failed: {reason}")]
    Download { path: String, reason: String },

    #[error("upload to {path} failed: {reason}")]
    Upload { path: String, reason: String },

    #[error("invalid artifact path: {0}")]
    InvalidPath(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Named byte blobs in object storage.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Download `path` into the local file `dest`, returning its size.
    async fn fetch(&self, path: &str, dest: &Path) -> Result<u64, ArtifactError>;

    /// Upload the local file `src` to `path`, returning its size.
    async fn store(&self, path: &str, src: &Path) -> Result<u64, ArtifactError>;
}

// ---------------------------------------------------------------------------
// Compression tool
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("compression tool could not be started: {0}")]
    Spawn(std::io::Error),

    #[error("{tool} failed with exit code {}.\nStderr: {stderr}", exit_code_label(.exit_code))]
    Failed {
        tool: String,
        exit_code: Option<i32>,
        stderr: String,
    },

    #[error("compression tool timed out after {secs}s")]
    Timeout { secs: u64 },
}

fn exit_code_label(code: &Option<i32>) -> String {
    code.map_or_else(|| "none (terminated by signal)".to_string(), |c| c.to_string())
}

/// An external compressor invoked as a black box.
#[async_trait]
pub trait CompressionTool: Send + Sync {
    async fn compress(
        &self,
        input: &Path,
        output: &Path,
        mode: CompressionMode,
    ) -> Result<(), ToolError>;
}
