//! Outgoing stream request.

// Rust guideline compliant 2026-02

use serde::Serialize;

use super::error::ConnectorError;

/// The single request sent once the stream transport is ready.
///
/// Serialized as `{"token"?, "message", "attachmentIds", "chatId"}`; the
/// token is omitted when absent and missing attachment ids encode as `null`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamRequest {
    /// Credential forwarded to the server, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    /// User message text.
    pub message: String,
    /// Ids of previously uploaded attachments, in display order.
    pub attachment_ids: Vec<Option<String>>,
    /// Conversation to continue; empty starts a new one.
    pub chat_id: String,
}

impl StreamRequest {
    /// Create a request for `message` in conversation `chat_id`.
    pub fn new(message: impl Into<String>, chat_id: impl Into<String>) -> Self {
        Self {
            token: None,
            message: message.into(),
            attachment_ids: Vec::new(),
            chat_id: chat_id.into(),
        }
    }

    /// Attach a credential.
    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token;
        self
    }

    /// Set the attachment ids.
    pub fn with_attachment_ids<I>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = Option<String>>,
    {
        self.attachment_ids = ids.into_iter().collect();
        self
    }

    /// Whether this request starts a new conversation.
    pub fn starts_new_session(&self) -> bool {
        self.chat_id.is_empty()
    }

    /// Serialize to the wire form.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectorError::Encoding`] if serialization fails.
    pub fn encode(&self) -> Result<String, ConnectorError> {
        serde_json::to_string(self).map_err(|e| ConnectorError::Encoding(e.to_string()))
    }
}
