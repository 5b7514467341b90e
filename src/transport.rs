//! Chat transport abstraction
//!
//! The engine only needs to send text and to fetch a previously announced
//! document; everything else about the chat platform stays behind this seam.

mod telegram;

pub use telegram::TelegramTransport;

use crate::intake::{ChatId, DocumentRef};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("HTTP error: {0}")]
    Http(String),
    #[error("API error: {0}")]
    Api(String),
}

/// Outbound side of the chat platform
#[async_trait]
pub trait Transport: Send + Sync {
    /// Deliver a text message to a chat
    async fn send_text(&self, chat: ChatId, text: &str) -> Result<(), TransportError>;

    /// Download the content behind a document handle
    async fn fetch_document(&self, document: &DocumentRef) -> Result<Vec<u8>, TransportError>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn send_text(&self, chat: ChatId, text: &str) -> Result<(), TransportError> {
        (**self).send_text(chat, text).await
    }

    async fn fetch_document(&self, document: &DocumentRef) -> Result<Vec<u8>, TransportError> {
        (**self).fetch_document(document).await
    }
}
