use std::sync::Arc;

use pdfpress_pipeline::JobPipeline;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheap to clone; everything lives behind an `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// The compression state machine, wired to its collaborators.
    pub pipeline: Arc<JobPipeline>,
    /// Server configuration (read by the api-key extractor).
    pub config: Arc<ServerConfig>,
}
