//! Per-run scratch directory for the downloaded input and the tool output.

use std::io;
use std::path::{Path, PathBuf};

use pdfpress_core::naming::{STAGED_COMPRESSED, STAGED_ORIGINAL};
use tempfile::TempDir;

/// A uniquely named temporary directory, removed when dropped.
///
/// Each run owns its own area, so concurrent jobs never share local files.
#[derive(Debug)]
pub struct StagingArea {
    dir: TempDir,
}

impl StagingArea {
    /// Create a fresh area under `root`, or under the system temp dir.
    pub fn create(root: Option<&Path>) -> io::Result<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("pdfpress-");
        let dir = match root {
            Some(root) => {
                std::fs::create_dir_all(root)?;
                builder.tempdir_in(root)?
            }
            None => builder.tempdir()?,
        };
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn original(&self) -> PathBuf {
        self.dir.path().join(STAGED_ORIGINAL)
    }

    pub fn compressed(&self) -> PathBuf {
        self.dir.path().join(STAGED_COMPRESSED)
    }
}
