use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::constants;
use crate::error::OperatorError;

/// HTTP client for the dummy message service.
///
/// Talks to `GET /messages`, `POST /message` and `DELETE /message` on a fixed
/// base URL. No TLS, no auth.
#[derive(Clone)]
pub struct MessageClient {
    http: reqwest::Client,
    base_url: String,
}

impl MessageClient {
    pub fn new(base_url: &str) -> Result<Self, OperatorError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(constants::defaults::HTTP_TIMEOUT_SECS))
            .build()?;
        Ok(Self::with_http(http, base_url))
    }

    /// Build a client on top of an existing `reqwest::Client` (shares its pool).
    pub fn with_http(http: reqwest::Client, base_url: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// List all stored messages: GET /messages.
    pub async fn list_messages(&self) -> Result<Vec<StoredMessage>, OperatorError> {
        let url = format!("{}/messages", self.base_url);
        debug!("List messages: {url}");
        let resp = self
            .http
            .get(&url)
            .send()
            .await?
            .error_for_status()
            .map_err(|e| OperatorError::MessageService(format!("GET /messages failed: {e}")))?;
        let body = resp.bytes().await?;
        let list: MessageList = serde_json::from_slice(&body)?;
        Ok(list.messages)
    }

    /// Find the first stored message whose content equals `content`.
    pub async fn observe(&self, content: &str) -> Result<Option<StoredMessage>, OperatorError> {
        let messages = self.list_messages().await?;
        Ok(find_by_content(messages, content))
    }

    /// Create a message: POST /message?content=...
    ///
    /// Returns the message as echoed by the service, including its id.
    pub async fn create(&self, content: &str) -> Result<StoredMessage, OperatorError> {
        let url = format!("{}/message", self.base_url);
        debug!(content, "Create message: {url}");
        let resp = self
            .http
            .post(&url)
            .query(&[("content", content)])
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .send()
            .await?
            .error_for_status()
            .map_err(|e| OperatorError::MessageService(format!("POST /message failed: {e}")))?;
        let body = resp.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }

    /// Delete a message by id: DELETE /message?id_=...
    ///
    /// The response body is only logged. A 404 means the message is already gone.
    pub async fn delete(&self, id: i64) -> Result<(), OperatorError> {
        let url = format!("{}/message", self.base_url);
        debug!(id, "Delete message: {url}");
        let resp = self
            .http
            .delete(&url)
            .query(&[("id_", id)])
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .send()
            .await?;
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            debug!(id, "Message already gone");
            return Ok(());
        }
        let resp = resp.error_for_status().map_err(|e| {
            OperatorError::MessageService(format!("DELETE /message id {id} failed: {e}"))
        })?;
        let body = resp.text().await?;
        debug!(id, response = %body, "Message deleted");
        Ok(())
    }
}

/// Linear scan for the first message carrying `content`.
pub fn find_by_content(messages: Vec<StoredMessage>, content: &str) -> Option<StoredMessage> {
    messages.into_iter().find(|m| m.content == content)
}

// --- Wire types ---

/// A message as stored by the service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredMessage {
    pub id: i64,
    pub content: String,
}

/// Response of GET /messages.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct MessageList {
    pub messages: Vec<StoredMessage>,
}
