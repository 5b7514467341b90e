//! Events that drive the intake flow

use super::state::{ChatId, DocumentRef, OperatorId};
use crate::uploader::{Ack, UploadError};

/// Events that trigger state transitions
#[derive(Debug, Clone)]
pub enum Event {
    // Operator events
    Start,
    Cancel,
    Text { text: String },
    Document { document: DocumentRef },

    // Internal events
    UploadFinished { result: Result<Ack, UploadError> },
}

impl Event {
    pub fn text(text: impl Into<String>) -> Self {
        Event::Text { text: text.into() }
    }

    pub fn document(document: DocumentRef) -> Self {
        Event::Document { document }
    }

    /// Short name for log lines; never includes operator content
    pub fn kind(&self) -> &'static str {
        match self {
            Event::Start => "start",
            Event::Cancel => "cancel",
            Event::Text { .. } => "text",
            Event::Document { .. } => "document",
            Event::UploadFinished { .. } => "upload_finished",
        }
    }
}

/// An event as delivered by the transport, bound to its sender
#[derive(Debug, Clone)]
pub struct Inbound {
    pub operator: OperatorId,
    pub chat: ChatId,
    pub event: Event,
}

impl Inbound {
    pub fn new(operator: OperatorId, chat: ChatId, event: Event) -> Self {
        Self {
            operator,
            chat,
            event,
        }
    }
}
