//! S3-compatible object storage via `aws-sdk-s3`.
//!
//! Also used for GCS through its S3 interoperability endpoint and for MinIO
//! in development, by setting a custom endpoint URL.

use std::path::Path;

use async_trait::async_trait;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use pdfpress_core::ports::{ArtifactError, ArtifactStore};
use tokio::io::AsyncWriteExt;

const PDF_CONTENT_TYPE: &str = "application/pdf";

pub struct S3ArtifactStore {
    client: Client,
    bucket: String,
}

impl S3ArtifactStore {
    pub fn new(client: Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }

    /// Build a client from the ambient AWS configuration (env vars, profile,
    /// instance metadata). A custom endpoint switches to path-style
    /// addressing, which most S3-compatible services expect.
    pub async fn from_env(bucket: impl Into<String>, endpoint_url: Option<&str>) -> Self {
        let shared = aws_config::load_from_env().await;
        let mut builder = aws_sdk_s3::config::Builder::from(&shared);
        if let Some(url) = endpoint_url {
            builder = builder.endpoint_url(url).force_path_style(true);
        }
        Self::new(Client::from_conf(builder.build()), bucket)
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }
}

#[async_trait]
impl ArtifactStore for S3ArtifactStore {
    async fn fetch(&self, path: &str, dest: &Path) -> Result<u64, ArtifactError> {
        tracing::debug!(bucket = %self.bucket, path, "Downloading artifact");

        let response = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(path)
            .send()
            .await
            .map_err(|e| {
                if e.as_service_error().is_some_and(|se| se.is_no_such_key()) {
                    ArtifactError::NotFound(path.to_string())
                } else {
                    ArtifactError::Download {
                        path: path.to_string(),
                        reason: DisplayErrorContext(&e).to_string(),
                    }
                }
            })?;

        let mut file = tokio::fs::File::create(dest).await?;
        let mut body = response.body.into_async_read();
        let bytes = tokio::io::copy(&mut body, &mut file)
            .await
            .map_err(|e| ArtifactError::Download {
                path: path.to_string(),
                reason: e.to_string(),
            })?;
        file.flush().await?;

        Ok(bytes)
    }

    async fn store(&self, path: &str, src: &Path) -> Result<u64, ArtifactError> {
        let bytes = tokio::fs::metadata(src).await?.len();
        let body = ByteStream::from_path(src)
            .await
            .map_err(|e| ArtifactError::Upload {
                path: path.to_string(),
                reason: e.to_string(),
            })?;

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(path)
            .content_type(PDF_CONTENT_TYPE)
            .body(body)
            .send()
            .await
            .map_err(|e| ArtifactError::Upload {
                path: path.to_string(),
                reason: DisplayErrorContext(&e).to_string(),
            })?;

        tracing::debug!(bucket = %self.bucket, path, bytes, "Uploaded artifact");
        Ok(bytes)
    }
}
