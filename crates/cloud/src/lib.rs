//! Artifact store adapters: S3-compatible object storage and a local
//! directory tree for development.

mod local;
mod s3;

pub use local::LocalArtifactStore;
pub use s3::S3ArtifactStore;
