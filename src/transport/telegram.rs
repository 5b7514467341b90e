//! Telegram Bot API transport (long polling)

use super::{Transport, TransportError};
use crate::intake::{ChatId, DocumentRef, Event, Inbound, OperatorId};
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Seconds the server holds a `getUpdates` call open
const POLL_TIMEOUT_SECS: u64 = 30;
const POLL_ERROR_BACKOFF: Duration = Duration::from_secs(5);

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<TgMessage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TgMessage {
    #[serde(default)]
    pub from: Option<TgUser>,
    pub chat: TgChat,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub document: Option<TgDocument>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TgUser {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TgChat {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TgDocument {
    pub file_id: String,
    #[serde(default)]
    pub file_name: Option<String>,
    #[serde(default)]
    pub file_size: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct TgFile {
    #[serde(default)]
    file_path: Option<String>,
}

/// Map an update to an intake event. Updates the flow has no use for
/// (edits, stickers, unknown commands) yield `None`.
pub fn classify_update(update: &Update) -> Option<Inbound> {
    let message = update.message.as_ref()?;
    let operator = OperatorId(message.from.as_ref()?.id);
    let chat = ChatId(message.chat.id);

    let event = if let Some(document) = &message.document {
        Event::document(DocumentRef {
            file_name: document.file_name.clone(),
            file_id: document.file_id.clone(),
            size: document.file_size,
        })
    } else {
        let text = message.text.as_deref()?;
        if text.starts_with('/') {
            parse_command(text)?
        } else {
            Event::text(text)
        }
    };

    Some(Inbound::new(operator, chat, event))
}

fn parse_command(text: &str) -> Option<Event> {
    let command = text.split_whitespace().next()?;
    let command = command.split('@').next().unwrap_or(command);
    match command {
        "/start" => Some(Event::Start),
        "/cancel" => Some(Event::Cancel),
        _ => None,
    }
}

// ============================================================================
// Transport
// ============================================================================

pub struct TelegramTransport {
    client: Client,
    poll_client: Client,
    api_base: String,
    token: String,
}

impl TelegramTransport {
    pub fn new(api_base: &str, token: impl Into<String>) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(Duration::from_secs(60)).build()?;
        let poll_client = Client::builder()
            .timeout(Duration::from_secs(POLL_TIMEOUT_SECS + 15))
            .build()?;

        Ok(Self {
            client,
            poll_client,
            api_base: api_base.trim_end_matches('/').to_string(),
            token: token.into(),
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{method}", self.api_base, self.token)
    }

    fn file_url(&self, file_path: &str) -> String {
        format!("{}/file/bot{}/{file_path}", self.api_base, self.token)
    }

    /// Fetch the next batch of updates after `offset`
    pub async fn get_updates(&self, offset: i64) -> Result<Vec<Update>, TransportError> {
        let response = self
            .poll_client
            .get(self.method_url("getUpdates"))
            .query(&[
                ("offset", offset.to_string()),
                ("timeout", POLL_TIMEOUT_SECS.to_string()),
                ("allowed_updates", r#"["message"]"#.to_string()),
            ])
            .send()
            .await
            .map_err(http_error)?;

        read_result(response).await
    }

    /// Poll until cancelled, forwarding every usable update
    pub async fn run_polling(
        &self,
        tx: mpsc::UnboundedSender<Inbound>,
        cancel: CancellationToken,
    ) {
        tracing::info!("Telegram polling started");
        let mut offset = 0;

        loop {
            let updates = tokio::select! {
                () = cancel.cancelled() => break,
                result = self.get_updates(offset) => result,
            };

            match updates {
                Ok(updates) => {
                    for update in updates {
                        offset = offset.max(update.update_id + 1);
                        match classify_update(&update) {
                            Some(inbound) => {
                                if tx.send(inbound).is_err() {
                                    tracing::warn!("Dispatcher gone, stopping polling");
                                    return;
                                }
                            }
                            None => {
                                tracing::debug!(update_id = update.update_id, "Ignoring update");
                            }
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "getUpdates failed");
                    tokio::select! {
                        () = cancel.cancelled() => break,
                        () = tokio::time::sleep(POLL_ERROR_BACKOFF) => {}
                    }
                }
            }
        }

        tracing::info!("Telegram polling stopped");
    }
}

#[async_trait]
impl Transport for TelegramTransport {
    async fn send_text(&self, chat: ChatId, text: &str) -> Result<(), TransportError> {
        let response = self
            .client
            .post(self.method_url("sendMessage"))
            .json(&serde_json::json!({ "chat_id": chat.0, "text": text }))
            .send()
            .await
            .map_err(http_error)?;

        read_result::<serde_json::Value>(response).await.map(|_| ())
    }

    async fn fetch_document(&self, document: &DocumentRef) -> Result<Vec<u8>, TransportError> {
        let response = self
            .client
            .get(self.method_url("getFile"))
            .query(&[("file_id", document.file_id.as_str())])
            .send()
            .await
            .map_err(http_error)?;

        let file: TgFile = read_result(response).await?;
        let file_path = file
            .file_path
            .ok_or_else(|| TransportError::Api("file has no download path".to_string()))?;

        let response = self
            .client
            .get(self.file_url(&file_path))
            .send()
            .await
            .map_err(http_error)?;

        if !response.status().is_success() {
            return Err(TransportError::Api(format!(
                "file download returned HTTP {}",
                response.status()
            )));
        }

        let bytes = response.bytes().await.map_err(http_error)?;
        Ok(bytes.to_vec())
    }
}

/// Request URLs carry the bot token, so they are stripped from errors
#[allow(clippy::needless_pass_by_value)] // Used with map_err
fn http_error(e: reqwest::Error) -> TransportError {
    TransportError::Http(e.without_url().to_string())
}

async fn read_result<T: DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, TransportError> {
    let status = response.status();
    let body = response.text().await.map_err(http_error)?;

    let parsed: ApiResponse<T> = serde_json::from_str(&body)
        .map_err(|e| TransportError::Api(format!("HTTP {status}: unparseable body: {e}")))?;

    if !parsed.ok {
        return Err(TransportError::Api(
            parsed
                .description
                .unwrap_or_else(|| format!("HTTP {status}")),
        ));
    }

    parsed
        .result
        .ok_or_else(|| TransportError::Api("response without result".to_string()))
}
