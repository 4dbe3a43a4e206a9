//! Storage key and staging filename conventions.

/// Filename of the downloaded input inside a job's staging directory.
pub const STAGED_ORIGINAL: &str = "original.pdf";

/// Filename of the tool output inside a job's staging directory.
pub const STAGED_COMPRESSED: &str = "compressed.pdf";

/// Destination key for a job's compressed artifact.
///
/// `file_id` is unique per job, so keys never collide between jobs.
pub fn compressed_artifact_path(user_id: &str, file_id: &str) -> String {
    format!("uploads/{user_id}/{file_id}/{STAGED_COMPRESSED}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compressed_path_layout() {
        assert_eq!(
            compressed_artifact_path("user-7", "file-3"),
            "uploads/user-7/file-3/compressed.pdf"
        );
    }

    #[test]
    fn distinct_files_never_share_a_key() {
        assert_ne!(
            compressed_artifact_path("u", "a"),
            compressed_artifact_path("u", "b")
        );
    }
}
