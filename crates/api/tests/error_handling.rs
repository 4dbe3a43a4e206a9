//! Tests for `AppError` → HTTP response mapping.
//!
//! These call `IntoResponse` directly; no router is involved.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use http_body_util::BodyExt;
use pdfpress_api::error::AppError;
use pdfpress_core::job::MissingFields;
use pdfpress_core::ports::ArtifactError;
use pdfpress_pipeline::PipelineError;

/// Helper: convert an `AppError` into its status code and parsed JSON body.
async fn error_to_response(err: AppError) -> (StatusCode, serde_json::Value) {
    let response = err.into_response();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    (status, json)
}

#[tokio::test]
async fn not_found_returns_404() {
    let err = AppError::from(PipelineError::NotFound("job-9".into()));

    let (status, json) = error_to_response(err).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["code"], "NOT_FOUND");
    assert_eq!(json["error"], "Job with ID job-9 not found");
}

#[tokio::test]
async fn invalid_job_data_returns_400_with_fixed_message() {
    let err = AppError::from(PipelineError::InvalidJobData(MissingFields(vec![
        "originalPath",
        "userId",
    ])));

    let (status, json) = error_to_response(err).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "INVALID_JOB_DATA");
    assert_eq!(json["error"], "Invalid job data");
}

#[tokio::test]
async fn committed_failures_return_500_with_cause() {
    let cases = [
        PipelineError::FetchFailed(ArtifactError::NotFound("uploads/u/f/original.pdf".into())),
        PipelineError::ToolFailed("gs exploded".into()),
        PipelineError::Timeout { secs: 300 },
        PipelineError::StoreFailed(ArtifactError::InvalidPath("../x".into())),
        PipelineError::Unexpected("worker panicked: boom".into()),
    ];

    for err in cases {
        let expected = format!("Processing failed: {err}");
        let (status, json) = error_to_response(AppError::from(err)).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json["code"], "PROCESSING_FAILED");
        assert_eq!(json["error"], expected);
    }
}

#[tokio::test]
async fn unauthorized_returns_401() {
    let (status, json) = error_to_response(AppError::Unauthorized).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["error"], "Unauthorized");
    assert_eq!(json["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn bad_request_and_conflict_keep_their_message() {
    let (status, json) = error_to_response(AppError::BadRequest("Missing jobId".into())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "Missing jobId");

    let (status, json) = error_to_response(AppError::Conflict("already failed".into())).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["code"], "CONFLICT");
}
