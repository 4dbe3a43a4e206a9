//! Job record model, lifecycle status and compression presets.
//!
//! The serialized shape of [`JobRecord`] (camelCase field names, lowercase
//! enum spellings) is shared with the upstream job-submission system and
//! must not drift.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// Lifecycle status of a compression job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Processing,
    Done,
    Failed,
}

impl JobStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Done => "done",
            JobStatus::Failed => "failed",
        }
    }

    /// `done` and `failed` are final; the pipeline never writes past them.
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Done | JobStatus::Failed)
    }

    /// Whether a write carrying `next` may follow a record in `self`.
    ///
    /// `processing -> processing` covers progress milestones.
    /// `pending -> failed` is only taken when the record itself is unusable.
    pub fn can_transition_to(self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::Pending, JobStatus::Processing)
                | (JobStatus::Pending, JobStatus::Failed)
                | (JobStatus::Processing, JobStatus::Processing)
                | (JobStatus::Processing, JobStatus::Done)
                | (JobStatus::Processing, JobStatus::Failed)
        )
    }
}

impl FromStr for JobStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(JobStatus::Pending),
            "processing" => Ok(JobStatus::Processing),
            "done" => Ok(JobStatus::Done),
            "failed" => Ok(JobStatus::Failed),
            other => Err(CoreError::Validation(format!(
                "Invalid job status '{other}'"
            ))),
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Compression preset
// ---------------------------------------------------------------------------

/// Quality/size tradeoff requested for a job.
///
/// Deserialization is lenient: a missing, null or unrecognised value maps
/// to [`CompressionMode::Balanced`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionMode {
    Low,
    #[default]
    Balanced,
    High,
}

impl CompressionMode {
    pub fn as_str(self) -> &'static str {
        match self {
            CompressionMode::Low => "low",
            CompressionMode::Balanced => "balanced",
            CompressionMode::High => "high",
        }
    }

    /// Resolve a stored preset name, falling back to `balanced`.
    pub fn from_preset(preset: Option<&str>) -> Self {
        preset.and_then(|p| p.parse().ok()).unwrap_or_default()
    }
}

impl FromStr for CompressionMode {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(CompressionMode::Low),
            "balanced" => Ok(CompressionMode::Balanced),
            "high" => Ok(CompressionMode::High),
            other => Err(CoreError::Validation(format!(
                "Unknown compression mode '{other}'. Must be one of: low, balanced, high"
            ))),
        }
    }
}

impl fmt::Display for CompressionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for CompressionMode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(CompressionMode::from_preset(raw.as_deref()))
    }
}

// ---------------------------------------------------------------------------
// Progress milestones
// ---------------------------------------------------------------------------

/// Fixed progress checkpoints written while a job is processed.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Milestone {
    Started = 10,
    Fetched = 25,
    Compressing = 50,
    Storing = 75,
    Done = 100,
}

impl Milestone {
    pub fn percent(self) -> u8 {
        self as u8
    }
}

// ---------------------------------------------------------------------------
// Record
// ---------------------------------------------------------------------------

/// A job document as persisted by the record store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRecord {
    pub job_id: String,
    pub status: JobStatus,
    #[serde(default)]
    pub progress: u8,
    pub original_path: Option<String>,
    pub compressed_path: Option<String>,
    #[serde(default)]
    pub compression_mode: CompressionMode,
    pub original_size_bytes: Option<u64>,
    pub compressed_size_bytes: Option<u64>,
    pub error_message: Option<String>,
    pub user_id: Option<String>,
    pub file_id: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl JobRecord {
    /// A freshly submitted record with no optional fields populated.
    pub fn pending(job_id: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
            status: JobStatus::Pending,
            progress: 0,
            original_path: None,
            compressed_path: None,
            compression_mode: CompressionMode::default(),
            original_size_bytes: None,
            compressed_size_bytes: None,
            error_message: None,
            user_id: None,
            file_id: None,
            updated_at: None,
        }
    }

    /// Merge a partial update into this record, stamping `updated_at`.
    pub fn apply(&mut self, update: &JobUpdate, now: DateTime<Utc>) {
        self.status = update.status;
        if let Some(progress) = update.progress {
            self.progress = progress;
        }
        if let Some(bytes) = update.original_size_bytes {
            self.original_size_bytes = Some(bytes);
        }
        if let Some(path) = &update.compressed_path {
            self.compressed_path = Some(path.clone());
        }
        if let Some(bytes) = update.compressed_size_bytes {
            self.compressed_size_bytes = Some(bytes);
        }
        match &update.error_message {
            ErrorMessageUpdate::Keep => {}
            ErrorMessageUpdate::Clear => self.error_message = None,
            ErrorMessageUpdate::Set(message) => self.error_message = Some(message.clone()),
        }
        self.updated_at = Some(now);
    }
}

/// The validated subset of a [`JobRecord`] needed to run a compression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompressionRequest {
    pub job_id: String,
    pub user_id: String,
    pub file_id: String,
    pub original_path: String,
    pub mode: CompressionMode,
}

/// Required record fields that were absent or empty.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("job record is missing required fields: {}", .0.join(", "))]
pub struct MissingFields(pub Vec<&'static str>);

impl CompressionRequest {
    pub fn from_record(record: &JobRecord) -> Result<Self, MissingFields> {
        fn present(value: &Option<String>) -> Option<&str> {
            value.as_deref().filter(|v| !v.trim().is_empty())
        }

        let original_path = present(&record.original_path);
        let file_id = present(&record.file_id);
        let user_id = present(&record.user_id);

        match (original_path, file_id, user_id) {
            (Some(original_path), Some(file_id), Some(user_id)) => Ok(Self {
                job_id: record.job_id.clone(),
                user_id: user_id.to_string(),
                file_id: file_id.to_string(),
                original_path: original_path.to_string(),
                mode: record.compression_mode,
            }),
            _ => {
                let missing = [
                    ("originalPath", original_path.is_none()),
                    ("fileId", file_id.is_none()),
                    ("userId", user_id.is_none()),
                ]
                .into_iter()
                .filter_map(|(name, absent)| absent.then_some(name))
                .collect();
                Err(MissingFields(missing))
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Partial updates
// ---------------------------------------------------------------------------

/// How a write treats the `errorMessage` field.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ErrorMessageUpdate {
    #[default]
    Keep,
    Clear,
    Set(String),
}

/// A partial job write. `status` is always written; everything else only
/// when present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobUpdate {
    pub status: JobStatus,
    pub progress: Option<u8>,
    pub original_size_bytes: Option<u64>,
    pub compressed_path: Option<String>,
    pub compressed_size_bytes: Option<u64>,
    pub error_message: ErrorMessageUpdate,
}

impl JobUpdate {
    fn status(status: JobStatus) -> Self {
        Self {
            status,
            progress: None,
            original_size_bytes: None,
            compressed_path: None,
            compressed_size_bytes: None,
            error_message: ErrorMessageUpdate::Keep,
        }
    }

    /// A `processing` write at the given milestone.
    pub fn processing(milestone: Milestone) -> Self {
        Self {
            progress: Some(milestone.percent()),
            ..Self::status(JobStatus::Processing)
        }
    }

    pub fn with_original_size(mut self, bytes: u64) -> Self {
        self.original_size_bytes = Some(bytes);
        self
    }

    /// The terminal success write.
    pub fn done(compressed_path: impl Into<String>, compressed_size_bytes: u64) -> Self {
        Self {
            progress: Some(Milestone::Done.percent()),
            compressed_path: Some(compressed_path.into()),
            compressed_size_bytes: Some(compressed_size_bytes),
            error_message: ErrorMessageUpdate::Clear,
            ..Self::status(JobStatus::Done)
        }
    }

    /// The terminal failure write. Progress is left at its last value.
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            error_message: ErrorMessageUpdate::Set(message.into()),
            ..Self::status(JobStatus::Failed)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_record() -> JobRecord {
        JobRecord {
            original_path: Some("uploads/u1/f1/original.pdf".into()),
            file_id: Some("f1".into()),
            user_id: Some("u1".into()),
            ..JobRecord::pending("job-1")
        }
    }

    #[test]
    fn status_round_trips_through_str() {
        for status in [
            JobStatus::Pending,
            JobStatus::Processing,
            JobStatus::Done,
            JobStatus::Failed,
        ] {
            assert_eq!(status.as_str().parse::<JobStatus>().unwrap(), status);
        }
        assert!("completed".parse::<JobStatus>().is_err());
    }

    #[test]
    fn status_never_regresses() {
        assert!(JobStatus::Pending.can_transition_to(JobStatus::Processing));
        assert!(JobStatus::Processing.can_transition_to(JobStatus::Done));
        assert!(!JobStatus::Done.can_transition_to(JobStatus::Processing));
        assert!(!JobStatus::Failed.can_transition_to(JobStatus::Done));
        assert!(!JobStatus::Pending.can_transition_to(JobStatus::Done));
        assert!(!JobStatus::Processing.can_transition_to(JobStatus::Pending));
    }

    #[test]
    fn unknown_mode_falls_back_to_balanced() {
        assert_eq!(CompressionMode::from_preset(Some("low")), CompressionMode::Low);
        assert_eq!(CompressionMode::from_preset(Some("ultra")), CompressionMode::Balanced);
        assert_eq!(CompressionMode::from_preset(None), CompressionMode::Balanced);
    }

    #[test]
    fn record_deserializes_from_upstream_shape() {
        let json = serde_json::json!({
            "jobId": "job-9",
            "status": "pending",
            "originalPath": "uploads/u/f/original.pdf",
            "compressionMode": "extreme",
            "userId": "u",
            "fileId": "f"
        });
        let record: JobRecord = serde_json::from_value(json).unwrap();
        assert_eq!(record.status, JobStatus::Pending);
        assert_eq!(record.progress, 0);
        assert_eq!(record.compression_mode, CompressionMode::Balanced);
        assert!(record.error_message.is_none());
    }

    #[test]
    fn record_serializes_with_camel_case_names() {
        let value = serde_json::to_value(valid_record()).unwrap();
        assert_eq!(value["originalPath"], "uploads/u1/f1/original.pdf");
        assert_eq!(value["compressionMode"], "balanced");
        assert_eq!(value["status"], "pending");
        assert!(value.get("errorMessage").is_some());
        assert!(value.get("compressedSizeBytes").is_some());
    }

    #[test]
    fn request_from_complete_record() {
        let request = CompressionRequest::from_record(&valid_record()).unwrap();
        assert_eq!(request.user_id, "u1");
        assert_eq!(request.mode, CompressionMode::Balanced);
    }

    #[test]
    fn request_reports_every_missing_field() {
        let record = JobRecord {
            user_id: Some("   ".into()),
            ..JobRecord::pending("job-2")
        };
        let missing = CompressionRequest::from_record(&record).unwrap_err();
        assert_eq!(missing.0, vec!["originalPath", "fileId", "userId"]);
        assert_eq!(
            missing.to_string(),
            "job record is missing required fields: originalPath, fileId, userId"
        );
    }

    #[test]
    fn done_update_clears_error_and_sets_result() {
        let mut record = valid_record();
        record.apply(&JobUpdate::processing(Milestone::Started), Utc::now());
        record.error_message = Some("stale".into());
        record.apply(&JobUpdate::done("uploads/u1/f1/compressed.pdf", 42), Utc::now());

        assert_eq!(record.status, JobStatus::Done);
        assert_eq!(record.progress, 100);
        assert_eq!(record.compressed_size_bytes, Some(42));
        assert!(record.error_message.is_none());
        assert!(record.updated_at.is_some());
    }

    #[test]
    fn failed_update_keeps_progress() {
        let mut record = valid_record();
        record.apply(
            &JobUpdate::processing(Milestone::Compressing).with_original_size(1024),
            Utc::now(),
        );
        record.apply(&JobUpdate::failed("boom"), Utc::now());

        assert_eq!(record.status, JobStatus::Failed);
        assert_eq!(record.progress, 50);
        assert_eq!(record.original_size_bytes, Some(1024));
        assert_eq!(record.error_message.as_deref(), Some("boom"));
        assert!(record.compressed_path.is_none());
    }
}
