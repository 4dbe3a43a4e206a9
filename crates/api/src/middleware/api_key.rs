//! Shared-secret authentication for worker endpoints.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use sha2::{Digest, Sha256};

use crate::error::AppError;
use crate::state::AppState;

/// Header carrying the worker secret.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Proof that the request carried the configured worker secret.
///
/// Add it as the first handler parameter so the check runs before the body
/// is read:
///
/// ```ignore
/// async fn my_handler(_auth: WorkerAuth, State(state): State<AppState>) { .. }
/// ```
#[derive(Debug, Clone, Copy)]
pub struct WorkerAuth;

impl FromRequestParts<AppState> for WorkerAuth {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let presented = parts
            .headers
            .get(API_KEY_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                tracing::warn!("Request without x-api-key header rejected");
                AppError::Unauthorized
            })?;

        if !keys_match(presented, &state.config.api_key) {
            tracing::warn!("Request with invalid x-api-key rejected");
            return Err(AppError::Unauthorized);
        }

        Ok(WorkerAuth)
    }
}

/// Compare fixed-length digests so the comparison does not leak the
/// length of the configured key.
fn keys_match(presented: &str, expected: &str) -> bool {
    Sha256::digest(presented.as_bytes()) == Sha256::digest(expected.as_bytes())
}
