//! In-memory collaborators for tests and local experiments.
//!
//! [`MemoryJobRecordStore`] keeps a log of every write and counter
//! adjustment so callers can assert on the exact sequence a run produced.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use pdfpress_core::job::{CompressionMode, JobRecord, JobStatus, JobUpdate, Milestone};
use pdfpress_core::ports::{
    ArtifactError, ArtifactStore, CompressionTool, JobRecordStore, RecordError, ToolError,
};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// ---------------------------------------------------------------------------
// Job records
// ---------------------------------------------------------------------------

#[derive(Default)]
struct RecordState {
    jobs: HashMap<String, JobRecord>,
    writes: Vec<(String, JobUpdate)>,
    adjustments: Vec<(String, i32)>,
    failing_status: Option<JobStatus>,
}

/// Job records held in a map, with status transitions enforced the same
/// way the Postgres store enforces them.
#[derive(Default)]
pub struct MemoryJobRecordStore {
    state: Mutex<RecordState>,
}

impl MemoryJobRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, record: JobRecord) {
        lock(&self.state)
            .jobs
            .insert(record.job_id.clone(), record);
    }

    pub fn job(&self, job_id: &str) -> Option<JobRecord> {
        lock(&self.state).jobs.get(job_id).cloned()
    }

    /// Every successful update, in order.
    pub fn writes(&self) -> Vec<(String, JobUpdate)> {
        lock(&self.state).writes.clone()
    }

    /// Progress values written for `job_id`, in order.
    pub fn progress_history(&self, job_id: &str) -> Vec<u8> {
        lock(&self.state)
            .writes
            .iter()
            .filter(|(id, _)| id == job_id)
            .filter_map(|(_, update)| update.progress)
            .collect()
    }

    pub fn adjustments(&self) -> Vec<(String, i32)> {
        lock(&self.state).adjustments.clone()
    }

    /// Net counter change issued for `user_id`.
    pub fn concurrency_delta(&self, user_id: &str) -> i32 {
        lock(&self.state)
            .adjustments
            .iter()
            .filter(|(id, _)| id == user_id)
            .map(|(_, delta)| delta)
            .sum()
    }

    /// Make every update that carries `status` fail with a query error.
    pub fn fail_updates_with_status(&self, status: JobStatus) {
        lock(&self.state).failing_status = Some(status);
    }
}

#[async_trait]
impl JobRecordStore for MemoryJobRecordStore {
    async fn read(&self, job_id: &str) -> Result<JobRecord, RecordError> {
        self.job(job_id)
            .ok_or_else(|| RecordError::NotFound(job_id.to_string()))
    }

    async fn claim(&self, job_id: &str) -> Result<bool, RecordError> {
        let mut state = lock(&self.state);
        if state.failing_status == Some(JobStatus::Processing) {
            return Err(RecordError::Query(
                "injected failure writing status processing".to_string(),
            ));
        }

        let record = state
            .jobs
            .get_mut(job_id)
            .ok_or_else(|| RecordError::NotFound(job_id.to_string()))?;
        if record.status != JobStatus::Pending {
            return Ok(false);
        }
        let update = JobUpdate::processing(Milestone::Started);
        record.apply(&update, Utc::now());
        state.writes.push((job_id.to_string(), update));
        Ok(true)
    }

    async fn update(&self, job_id: &str, update: &JobUpdate) -> Result<(), RecordError> {
        let mut state = lock(&self.state);
        if state.failing_status == Some(update.status) {
            return Err(RecordError::Query(format!(
                "injected failure writing status {}",
                update.status
            )));
        }

        let record = state
            .jobs
            .get_mut(job_id)
            .ok_or_else(|| RecordError::NotFound(job_id.to_string()))?;
        if !record.status.can_transition_to(update.status) {
            return Err(RecordError::InvalidTransition {
                job_id: job_id.to_string(),
                from: record.status,
                to: update.status,
            });
        }
        record.apply(update, Utc::now());
        state.writes.push((job_id.to_string(), update.clone()));
        Ok(())
    }

    async fn adjust_concurrency(&self, user_id: &str, delta: i32) -> Result<(), RecordError> {
        lock(&self.state)
            .adjustments
            .push((user_id.to_string(), delta));
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Artifacts
// ---------------------------------------------------------------------------

#[derive(Default)]
struct ArtifactState {
    objects: HashMap<String, Vec<u8>>,
    fail_fetch: bool,
    fail_store: bool,
}

/// Artifacts held as byte vectors keyed by path.
#[derive(Default)]
pub struct MemoryArtifactStore {
    state: Mutex<ArtifactState>,
}

impl MemoryArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&self, path: impl Into<String>, bytes: impl Into<Vec<u8>>) {
        lock(&self.state).objects.insert(path.into(), bytes.into());
    }

    pub fn get(&self, path: &str) -> Option<Vec<u8>> {
        lock(&self.state).objects.get(path).cloned()
    }

    pub fn fail_fetch(&self) {
        lock(&self.state).fail_fetch = true;
    }

    pub fn fail_store(&self) {
        lock(&self.state).fail_store = true;
    }
}

#[async_trait]
impl ArtifactStore for MemoryArtifactStore {
    async fn fetch(&self, path: &str, dest: &Path) -> Result<u64, ArtifactError> {
        let bytes = {
            let state = lock(&self.state);
            if state.fail_fetch {
                return Err(ArtifactError::Download {
                    path: path.to_string(),
                    reason: "connection reset by peer".to_string(),
                });
            }
            state
                .objects
                .get(path)
                .cloned()
                .ok_or_else(|| ArtifactError::NotFound(path.to_string()))?
        };
        tokio::fs::write(dest, &bytes).await?;
        Ok(bytes.len() as u64)
    }

    async fn store(&self, path: &str, src: &Path) -> Result<u64, ArtifactError> {
        if lock(&self.state).fail_store {
            return Err(ArtifactError::Upload {
                path: path.to_string(),
                reason: "bucket is read-only".to_string(),
            });
        }
        let bytes = tokio::fs::read(src).await?;
        let len = bytes.len() as u64;
        self.put(path, bytes);
        Ok(len)
    }
}

// ---------------------------------------------------------------------------
// Compression tool
// ---------------------------------------------------------------------------

/// What a [`ScriptedTool`] does when invoked.
#[derive(Debug, Clone)]
pub enum ToolBehavior {
    /// Write `output` to the output path and succeed.
    Succeed { output: Vec<u8> },
    /// Exit with the given code and stderr, writing nothing.
    Fail { exit_code: i32, stderr: String },
    /// Report a timeout after the given number of seconds.
    Timeout { secs: u64 },
    /// Succeed without producing an output file.
    NoOutput,
    /// Panic mid-run.
    Panic(&'static str),
    /// Never finish.
    Hang,
}

/// A compression tool whose result is fixed up front.
pub struct ScriptedTool {
    behavior: ToolBehavior,
    calls: Mutex<Vec<(PathBuf, PathBuf, CompressionMode)>>,
}

impl ScriptedTool {
    pub fn new(behavior: ToolBehavior) -> Self {
        Self {
            behavior,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Succeeds with a small PDF-looking payload.
    pub fn succeeding() -> Self {
        Self::new(ToolBehavior::Succeed {
            output: b"%PDF-1.4 compressed".to_vec(),
        })
    }

    /// `(input, output, mode)` for every invocation.
    pub fn calls(&self) -> Vec<(PathBuf, PathBuf, CompressionMode)> {
        lock(&self.calls).clone()
    }
}

#[async_trait]
impl CompressionTool for ScriptedTool {
    async fn compress(
        &self,
        input: &Path,
        output: &Path,
        mode: CompressionMode,
    ) -> Result<(), ToolError> {
        lock(&self.calls).push((input.to_path_buf(), output.to_path_buf(), mode));

        match &self.behavior {
            ToolBehavior::Succeed { output: bytes } => {
                tokio::fs::write(output, bytes)
                    .await
                    .map_err(ToolError::Spawn)?;
                Ok(())
            }
            ToolBehavior::Fail { exit_code, stderr } => Err(ToolError::Failed {
                tool: "scripted".to_string(),
                exit_code: Some(*exit_code),
                stderr: stderr.clone(),
            }),
            ToolBehavior::Timeout { secs } => Err(ToolError::Timeout { secs: *secs }),
            ToolBehavior::NoOutput => Ok(()),
            ToolBehavior::Panic(message) => panic!("{message}"),
            ToolBehavior::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(())
            }
        }
    }
}
