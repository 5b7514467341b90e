//! Submission uploader
//!
//! Sends collected metadata plus the PDF to the ingestion endpoint.

mod error;
mod http;

pub use error::{Ack, UploadError};
pub use http::HttpUploader;

use crate::intake::IntakeFields;
use async_trait::async_trait;
use std::sync::Arc;

/// Common interface for upload backends
#[async_trait]
pub trait Uploader: Send + Sync {
    /// Make exactly one upload attempt
    async fn upload(
        &self,
        fields: &IntakeFields,
        file_name: &str,
        content: Vec<u8>,
    ) -> Result<Ack, UploadError>;
}

#[async_trait]
impl<T: Uploader + ?Sized> Uploader for Arc<T> {
    async fn upload(
        &self,
        fields: &IntakeFields,
        file_name: &str,
        content: Vec<u8>,
    ) -> Result<Ack, UploadError> {
        (**self).upload(fields, file_name, content).await
    }
}

/// Logging wrapper for uploaders
pub struct LoggingUploader<U> {
    inner: U,
}

impl<U: Uploader> LoggingUploader<U> {
    pub fn new(inner: U) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<U: Uploader> Uploader for LoggingUploader<U> {
    async fn upload(
        &self,
        fields: &IntakeFields,
        file_name: &str,
        content: Vec<u8>,
    ) -> Result<Ack, UploadError> {
        let upload_id = uuid::Uuid::new_v4();
        let bytes = content.len();
        let start = std::time::Instant::now();
        let result = self.inner.upload(fields, file_name, content).await;
        let duration = start.elapsed();

        match &result {
            Ok(_) => {
                tracing::info!(
                    %upload_id,
                    batch = %fields.batch,
                    test_type = %fields.test_type,
                    file_name,
                    bytes,
                    duration_ms = %duration.as_millis(),
                    "Upload accepted"
                );
            }
            Err(e) => {
                tracing::error!(
                    %upload_id,
                    batch = %fields.batch,
                    test_type = %fields.test_type,
                    file_name,
                    bytes,
                    duration_ms = %duration.as_millis(),
                    kind = e.kind(),
                    status = ?e.status(),
                    error = %e,
                    "Upload failed"
                );
            }
        }

        result
    }
}
