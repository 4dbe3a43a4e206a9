use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use pdfpress_pipeline::PipelineError;
use serde_json::json;

/// Application-level error type for HTTP handlers.
///
/// Wraps [`PipelineError`] for job outcomes and adds HTTP-specific variants.
/// Implements [`IntoResponse`] to produce consistent JSON error responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A failed or rejected pipeline run.
    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    /// A bad request with a human-readable message.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Missing or wrong `x-api-key`.
    #[error("Unauthorized")]
    Unauthorized,

    /// The job is already in a state that cannot be processed again.
    #[error("Conflict: {0}")]
    Conflict(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Pipeline(err) => classify_pipeline_error(err),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            AppError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "UNAUTHORIZED",
                "Unauthorized".to_string(),
            ),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone()),
        };

        let body = json!({
            "error": message,
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}

/// Classify a pipeline error into an HTTP status, error code, and message.
///
/// Committed failures have already been written to the job record; the
/// response carries the same message so callers need not re-read it.
fn classify_pipeline_error(err: &PipelineError) -> (StatusCode, &'static str, String) {
    match err {
        PipelineError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND", err.to_string()),
        PipelineError::InvalidJobData(_) => (
            StatusCode::BAD_REQUEST,
            "INVALID_JOB_DATA",
            err.job_message(),
        ),
        other => {
            tracing::error!(error = %other, "Job processing failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "PROCESSING_FAILED",
                format!("Processing failed: {other}"),
            )
        }
    }
}
