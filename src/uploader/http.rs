//! Multipart HTTP uploader

use super::{Ack, UploadError, Uploader};
use crate::intake::IntakeFields;
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, StatusCode};
use std::time::Duration;

const API_KEY_HEADER: &str = "X-API-KEY";
const PDF_MIME: &str = "application/pdf";

/// Uploads to the ingestion endpoint with a single POST
pub struct HttpUploader {
    client: Client,
    endpoint: String,
    api_key: String,
}

impl HttpUploader {
    pub fn new(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            api_key: api_key.into(),
        })
    }

    fn build_form(
        fields: &IntakeFields,
        file_name: &str,
        content: Vec<u8>,
    ) -> Result<Form, UploadError> {
        let file = Part::bytes(content)
            .file_name(file_name.to_string())
            .mime_str(PDF_MIME)
            .map_err(|e| UploadError::network(format!("Invalid file part: {e}")))?;

        Ok(Form::new()
            .text("batch", fields.batch.clone())
            .text("test_type", fields.test_type.clone())
            .text("test_name", fields.test_name.clone())
            .part("file", file))
    }
}

#[async_trait]
impl Uploader for HttpUploader {
    async fn upload(
        &self,
        fields: &IntakeFields,
        file_name: &str,
        content: Vec<u8>,
    ) -> Result<Ack, UploadError> {
        let form = Self::build_form(fields, file_name, content)?;

        let response = self
            .client
            .post(&self.endpoint)
            .header(API_KEY_HEADER, &self.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    UploadError::network(format!("Request timeout: {e}"))
                } else if e.is_connect() {
                    UploadError::network(format!("Connection failed: {e}"))
                } else {
                    UploadError::network(format!("Request failed: {e}"))
                }
            })?;

        let status = response.status();
        if status == StatusCode::OK {
            return Ok(Ack::Success);
        }

        let body = response
            .text()
            .await
            .map_err(|e| UploadError::network(format!("Failed to read response: {e}")))?;

        Err(UploadError::rejected(
            status.as_u16(),
            rejection_message(status, &body),
        ))
    }
}

/// Message for a non-200 answer: the `error` field when the body is a JSON
/// object, the raw body otherwise.
pub fn rejection_message(status: StatusCode, body: &str) -> String {
    if let Ok(serde_json::Value::Object(value)) = serde_json::from_str(body) {
        return match value.get("error") {
            Some(serde_json::Value::String(message)) => message.clone(),
            Some(serde_json::Value::Null) | None => "Unknown error".to_string(),
            Some(other) => other.to_string(),
        };
    }

    let body = body.trim();
    if body.is_empty() {
        format!("HTTP {status}")
    } else {
        body.to_string()
    }
}
