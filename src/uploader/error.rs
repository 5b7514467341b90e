//! Upload error types

use thiserror::Error;

/// Positive acknowledgement from the ingestion endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ack {
    /// HTTP 200
    Success,
}

/// Why an upload did not go through. Displayed to the operator as is.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UploadError {
    /// Connection failure, timeout, unreadable response
    #[error("network error: {0}")]
    Network(String),
    /// Endpoint answered with something other than 200
    #[error("{message}")]
    Rejected { status: u16, message: String },
    /// The document could not be fetched from the chat transport
    #[error("could not download the document: {0}")]
    DocumentUnavailable(String),
}

impl UploadError {
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network(message.into())
    }

    pub fn rejected(status: u16, message: impl Into<String>) -> Self {
        Self::Rejected {
            status,
            message: message.into(),
        }
    }

    /// HTTP status of a rejection
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Rejected { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Short classification for log fields
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Network(_) => "network",
            Self::Rejected { .. } => "rejected",
            Self::DocumentUnavailable(_) => "document_unavailable",
        }
    }
}
