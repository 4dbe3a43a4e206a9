//! Request extractors that guard handlers.
//!
//! - [`api_key::WorkerAuth`] -- Requires the shared worker secret in `x-api-key`.

pub mod api_key;
