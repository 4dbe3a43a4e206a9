//! Shared helpers for API integration tests.
//!
//! The router is the production one from `pdfpress_api::app::build_app`;
//! only the collaborators behind the pipeline are swapped for in-memory
//! doubles.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Method, Request};
use axum::response::Response;
use axum::Router;
use http_body_util::BodyExt;
use pdfpress_api::config::{ServerConfig, StorageBackend};
use pdfpress_api::state::AppState;
use pdfpress_core::job::{CompressionMode, JobRecord};
use pdfpress_pipeline::testing::{
    MemoryArtifactStore, MemoryJobRecordStore, ScriptedTool, ToolBehavior,
};
use pdfpress_pipeline::{JobPipeline, PipelineConfig};
use tempfile::TempDir;
use tower::ServiceExt;

pub const TEST_API_KEY: &str = "test-worker-key";

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        request_timeout_secs: 30,
        api_key: TEST_API_KEY.to_string(),
        database_url: "postgres://unused".to_string(),
        storage: StorageBackend::Local {
            root: PathBuf::from("./unused"),
        },
        ghostscript_bin: PathBuf::from("gs"),
        compression_timeout_secs: 300,
        staging_dir: None,
    }
}

pub struct TestApp {
    pub router: Router,
    pub records: Arc<MemoryJobRecordStore>,
    pub artifacts: Arc<MemoryArtifactStore>,
    pub tool: Arc<ScriptedTool>,
    pub staging: TempDir,
}

/// Build the full application router over in-memory collaborators.
pub fn build_test_app(behavior: ToolBehavior) -> TestApp {
    let records = Arc::new(MemoryJobRecordStore::new());
    let artifacts = Arc::new(MemoryArtifactStore::new());
    let tool = Arc::new(ScriptedTool::new(behavior));
    let staging = tempfile::tempdir().unwrap();

    let pipeline = JobPipeline::new(
        records.clone(),
        artifacts.clone(),
        tool.clone(),
        PipelineConfig {
            staging_root: Some(staging.path().to_path_buf()),
        },
    );

    let state = AppState {
        pipeline: Arc::new(pipeline),
        config: Arc::new(test_config()),
    };

    TestApp {
        router: pdfpress_api::app::build_app(state),
        records,
        artifacts,
        tool,
        staging,
    }
}

/// A test app whose tool always succeeds.
pub fn build_default_app() -> TestApp {
    build_test_app(ToolBehavior::Succeed {
        output: b"%PDF-1.4 compressed".to_vec(),
    })
}

impl TestApp {
    /// Seed a complete pending job with its original document.
    pub fn seed_job(&self, job_id: &str, user_id: &str, file_id: &str) {
        let original_path = format!("uploads/{user_id}/{file_id}/original.pdf");
        self.artifacts
            .put(original_path.clone(), b"%PDF-1.4 original document".to_vec());
        self.records.insert(JobRecord {
            original_path: Some(original_path),
            user_id: Some(user_id.to_string()),
            file_id: Some(file_id.to_string()),
            compression_mode: CompressionMode::Low,
            ..JobRecord::pending(job_id)
        });
    }
}

/// Send a GET request.
pub async fn get(app: Router, uri: &str) -> Response {
    let request = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    app.oneshot(request).await.unwrap()
}

/// POST a raw JSON body to `/compress`, with the given `x-api-key` if any.
pub async fn post_compress(app: Router, api_key: Option<&str>, body: &str) -> Response {
    let mut builder = Request::builder()
        .method(Method::POST)
        .uri("/compress")
        .header("content-type", "application/json");
    if let Some(key) = api_key {
        builder = builder.header("x-api-key", key);
    }
    app.oneshot(builder.body(Body::from(body.to_string())).unwrap())
        .await
        .unwrap()
}

/// POST `{"jobId": job_id}` with the correct key.
pub async fn compress(app: Router, job_id: &str) -> Response {
    let body = serde_json::json!({ "jobId": job_id }).to_string();
    post_compress(app, Some(TEST_API_KEY), &body).await
}

/// Collect a response body and parse it as JSON.
pub async fn body_json(response: Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
