use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use pdfpress_api::config::{ServerConfig, StorageBackend};
use pdfpress_api::state::AppState;
use pdfpress_cloud::{LocalArtifactStore, S3ArtifactStore};
use pdfpress_core::ports::ArtifactStore;
use pdfpress_db::PgJobRecordStore;
use pdfpress_pipeline::{GhostscriptTool, JobPipeline, PipelineConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_LOG_FILTER: &str = "pdfpress_api=debug,pdfpress_pipeline=debug,tower_http=debug";

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    init_tracing();

    // --- Configuration ---
    let config = ServerConfig::from_env().expect("Invalid configuration");
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    // --- Database ---
    let pool = pdfpress_db::create_pool(&config.database_url)
        .await
        .expect("Failed to connect to database");
    tracing::info!("Database connection pool created");

    pdfpress_db::health_check(&pool)
        .await
        .expect("Database health check failed");

    pdfpress_db::run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Database migrations applied");

    // --- Collaborators ---
    let artifacts: Arc<dyn ArtifactStore> = match &config.storage {
        StorageBackend::S3 {
            bucket,
            endpoint_url,
        } => {
            tracing::info!(bucket = %bucket, endpoint_url = ?endpoint_url, "Using S3 artifact store");
            Arc::new(S3ArtifactStore::from_env(bucket.clone(), endpoint_url.as_deref()).await)
        }
        StorageBackend::Local { root } => {
            tracing::info!(root = %root.display(), "Using local artifact store");
            Arc::new(LocalArtifactStore::new(root).expect("Failed to create local storage root"))
        }
    };

    let tool = GhostscriptTool::new(
        &config.ghostscript_bin,
        Duration::from_secs(config.compression_timeout_secs),
    );

    let pipeline = JobPipeline::new(
        Arc::new(PgJobRecordStore::new(pool)),
        artifacts,
        Arc::new(tool),
        PipelineConfig {
            staging_root: config.staging_dir.clone(),
        },
    );

    // --- App state ---
    let state = AppState {
        pipeline: Arc::new(pipeline),
        config: Arc::new(config.clone()),
    };
    let app = pdfpress_api::app::build_app(state);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    tracing::info!("Graceful shutdown complete");
}

/// Install the global subscriber. `LOG_FORMAT=json` switches to one JSON
/// object per line.
fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into());
    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// Wait for SIGINT or SIGTERM. In-flight jobs finish before the process
/// exits.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
