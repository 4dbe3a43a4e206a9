//! The compression job pipeline.
//!
//! [`JobPipeline::run`] drives a single job from `pending` to `done` or
//! `failed`, writing each progress milestone as it is reached and releasing
//! the user's concurrency slot exactly once however the run ends.

pub mod error;
pub mod ghostscript;
pub mod runner;
pub mod slot;
pub mod staging;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use error::PipelineError;
pub use ghostscript::GhostscriptTool;
pub use runner::{CompletedJob, JobOutcome, JobPipeline, PipelineConfig};
