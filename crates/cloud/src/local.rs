//! Filesystem-backed artifact store rooted at a single directory.

use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use pdfpress_core::ports::{ArtifactError, ArtifactStore};

/// Stores each artifact key as a relative path under `root`.
#[derive(Debug, Clone)]
pub struct LocalArtifactStore {
    root: PathBuf,
}

impl LocalArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, ArtifactError> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a key to a path under the root. Keys must be relative and may
    /// only contain normal components.
    fn resolve(&self, key: &str) -> Result<PathBuf, ArtifactError> {
        let relative = Path::new(key);
        let well_formed = !key.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !well_formed {
            return Err(ArtifactError::InvalidPath(key.to_string()));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl ArtifactStore for LocalArtifactStore {
    async fn fetch(&self, path: &str, dest: &Path) -> Result<u64, ArtifactError> {
        let source = self.resolve(path)?;
        match tokio::fs::copy(&source, dest).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(ArtifactError::NotFound(path.to_string()))
            }
            Err(e) => Err(ArtifactError::Download {
                path: path.to_string(),
                reason: e.to_string(),
            }),
        }
    }

    async fn store(&self, path: &str, src: &Path) -> Result<u64, ArtifactError> {
        let target = self.resolve(path)?;
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let bytes = tokio::fs::copy(src, &target)
            .await
            .map_err(|e| ArtifactError::Upload {
                path: path.to_string(),
                reason: e.to_string(),
            })?;
        tracing::debug!(path, bytes, "Stored artifact on local disk");
        Ok(bytes)
    }
}
