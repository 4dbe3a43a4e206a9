//! Handler for `POST /compress`.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use pdfpress_core::job::JobStatus;
use pdfpress_pipeline::JobOutcome;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::middleware::api_key::WorkerAuth;
use crate::state::AppState;

/// Request body for `POST /compress`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompressRequest {
    #[serde(default)]
    pub job_id: Option<String>,
}

/// Response body for a job that is (now) done.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompressResponse {
    pub status: &'static str,
    pub job_id: String,
}

impl CompressResponse {
    fn success(job_id: String) -> Self {
        Self {
            status: "success",
            job_id,
        }
    }
}

/// POST /compress
///
/// Runs the job to completion before responding. A job that already
/// finished is not processed again: `done` answers as a success, `failed`
/// as a conflict. So does a job another request is still processing.
pub async fn compress_job(
    _auth: WorkerAuth,
    State(state): State<AppState>,
    body: Result<Json<CompressRequest>, JsonRejection>,
) -> AppResult<Json<CompressResponse>> {
    let Json(request) = body.map_err(|rejection| AppError::BadRequest(rejection.body_text()))?;

    let job_id = request
        .job_id
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| AppError::BadRequest("Missing jobId".into()))?;

    tracing::info!(job_id = %job_id, "Compression requested");

    match state.pipeline.run(&job_id).await? {
        JobOutcome::Completed(_) => Ok(Json(CompressResponse::success(job_id))),
        JobOutcome::AlreadyTerminal(record) if record.status == JobStatus::Done => {
            Ok(Json(CompressResponse::success(job_id)))
        }
        JobOutcome::AlreadyTerminal(record) => Err(AppError::Conflict(format!(
            "Job {job_id} already {}: {}",
            record.status,
            record.error_message.as_deref().unwrap_or("no error recorded"),
        ))),
        JobOutcome::AlreadyClaimed => Err(AppError::Conflict(format!(
            "Job {job_id} is already being processed"
        ))),
    }
}
