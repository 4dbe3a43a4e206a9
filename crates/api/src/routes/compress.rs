use axum::routing::post;
use axum::Router;

use crate::handlers::compress;
use crate::state::AppState;

/// Mount the job trigger.
///
/// ```text
/// POST /compress    run one job (requires x-api-key)
/// ```
pub fn router() -> Router<AppState> {
    Router::new().route("/compress", post(compress::compress_job))
}
