use pdfpress_core::job::MissingFields;
use pdfpress_core::ports::{ArtifactError, ToolError};

/// Persisted as the job's `errorMessage` when its record is unusable.
pub const INVALID_JOB_DATA: &str = "Invalid job data";

/// Why a pipeline run did not complete.
///
/// `NotFound` and `InvalidJobData` happen before the concurrency slot is
/// taken; every other variant is raised inside a committed run and has
/// already been persisted as a `failed` job by the time it is returned.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Job with ID {0} not found")]
    NotFound(String),

    #[error("Invalid job data: {0}")]
    InvalidJobData(MissingFields),

    #[error("Failed to fetch original document: {0}")]
    FetchFailed(ArtifactError),

    #[error("Compression failed: {0}")]
    ToolFailed(String),

    #[error("Compression timed out after {secs}s")]
    Timeout { secs: u64 },

    #[error("Failed to store compressed document: {0}")]
    StoreFailed(ArtifactError),

    #[error("Unexpected error: {0}")]
    Unexpected(String),
}

impl PipelineError {
    /// Text written to the job record's `errorMessage`.
    pub fn job_message(&self) -> String {
        match self {
            PipelineError::InvalidJobData(_) => INVALID_JOB_DATA.to_string(),
            other => other.to_string(),
        }
    }

    /// Whether the error was raised after the concurrency slot was taken.
    pub fn is_committed(&self) -> bool {
        !matches!(
            self,
            PipelineError::NotFound(_) | PipelineError::InvalidJobData(_)
        )
    }
}

impl From<ToolError> for PipelineError {
    fn from(err: ToolError) -> Self {
        match err {
            ToolError::Timeout { secs } => PipelineError::Timeout { secs },
            other => PipelineError::ToolFailed(other.to_string()),
        }
    }
}
