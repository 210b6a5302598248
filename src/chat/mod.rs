//! Headless chat orchestration.
//!
//! A [`Conversation`] ties the REST collaborators and the stream connector
//! together: it uploads pending attachments, sends the message with the
//! current session id, and folds the streamed reply into a [`Transcript`].
//!
//! # Flow
//!
//! ```text
//! send(input, attachments)
//!   ├── upload temp_ attachments ──▶ ApiClient (failures skipped)
//!   ├── transcript: user message + empty streaming reply
//!   └── Connector::open ──▶ TranscriptListener
//!                             ├── session notice ─▶ session id
//!                             ├── text ───────────▶ reply content
//!                             ├── error ──────────▶ apology
//!                             └── close ──────────▶ reply done
//! ```

// Rust guideline compliant 2026-02

pub mod transcript;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use anyhow::{Context, Result};
use tokio::sync::mpsc;

use crate::config::Config;
use crate::constants::{
    CONNECT_FAILED_MESSAGE, DEFAULT_HISTORY_PAGE_SIZE, STREAM_ERROR_MESSAGE,
    TEMP_ATTACHMENT_PREFIX,
};
use crate::server::types::{Attachment, AttachmentSource};
use crate::server::ApiClient;
use crate::stream::{
    Connector, ConnectorError, Fragment, LiveStream, StreamEvent, StreamListener, StreamRequest,
};

pub use transcript::Transcript;

fn lock(transcript: &Mutex<Transcript>) -> MutexGuard<'_, Transcript> {
    // A panicking listener must not take the transcript down with it
    transcript.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Listener that folds a stream into the shared transcript.
///
/// Each event is applied to the transcript first and then echoed to the
/// optional observer, so an observer always sees the transcript already
/// updated.
#[derive(Debug)]
struct TranscriptListener {
    transcript: Arc<Mutex<Transcript>>,
    echo: Option<mpsc::UnboundedSender<StreamEvent>>,
}

impl TranscriptListener {
    fn echo(&self, event: StreamEvent) {
        if let Some(echo) = &self.echo {
            // The observer may have stopped listening; the transcript is
            // still kept up to date
            let _ = echo.send(event);
        }
    }
}

impl StreamListener for TranscriptListener {
    fn on_fragment(&mut self, fragment: Fragment) -> Result<()> {
        lock(&self.transcript).apply_fragment(fragment.clone());
        self.echo(StreamEvent::Fragment(fragment));
        Ok(())
    }

    fn on_close(&mut self) {
        lock(&self.transcript).finish_streaming();
        self.echo(StreamEvent::Closed);
    }

    fn on_error(&mut self, error: &ConnectorError) {
        log::error!("[chat] WebSocket error: {error}");
        lock(&self.transcript).fail_streaming(STREAM_ERROR_MESSAGE);
        self.echo(StreamEvent::Error(error.clone()));
    }
}

/// One conversation with the assistant.
#[derive(Debug)]
pub struct Conversation {
    connector: Connector,
    api: Option<ApiClient>,
    token: Option<String>,
    page_size: u32,
    transcript: Arc<Mutex<Transcript>>,
}

impl Conversation {
    /// Create a conversation. Without an API client, attachments cannot be
    /// uploaded and history cannot be loaded.
    pub fn new(connector: Connector, api: Option<ApiClient>) -> Self {
        Self {
            connector,
            api,
            token: None,
            page_size: DEFAULT_HISTORY_PAGE_SIZE,
            transcript: Arc::new(Mutex::new(Transcript::new())),
        }
    }

    /// Create a conversation from the loaded configuration.
    pub fn from_config(config: &Config) -> Self {
        let api = match ApiClient::from_config(config) {
            Ok(api) => Some(api),
            Err(e) => {
                log::debug!("[chat] No API client: {e:#}");
                None
            }
        };
        Self::new(Connector::from_config(config), api)
            .with_token(config.token.clone())
            .with_page_size(config.history_page_size)
    }

    /// Set the API token sent with every request.
    #[must_use]
    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token;
        self
    }

    /// Set the number of messages fetched per history page.
    #[must_use]
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    /// Snapshot of the transcript.
    pub fn transcript(&self) -> Transcript {
        lock(&self.transcript).clone()
    }

    /// Current server conversation id, empty before the first reply.
    pub fn session_id(&self) -> String {
        lock(&self.transcript).session_id().to_string()
    }

    /// Send `input` with `attachments` and stream the reply into the
    /// transcript.
    ///
    /// Attachments whose id starts with `temp_` are uploaded first (their
    /// `url` is the local path); uploads that fail are logged and left out
    /// of the request. Events are also forwarded to `echo` when given.
    ///
    /// Returns `Ok(None)` without doing anything when there is neither text
    /// nor an attachment.
    ///
    /// # Errors
    ///
    /// Returns the connector's error if the stream could not be opened. The
    /// transcript's reply then already holds the connection apology.
    pub async fn send(
        &self,
        input: &str,
        attachments: Vec<Attachment>,
        echo: Option<mpsc::UnboundedSender<StreamEvent>>,
    ) -> Result<Option<LiveStream>, ConnectorError> {
        if input.trim().is_empty() && attachments.is_empty() {
            return Ok(None);
        }

        let attachment_ids = self.upload_pending(&attachments).await;

        let chat_id = {
            let mut transcript = lock(&self.transcript);
            transcript.push_user(input, attachments);
            transcript.start_reply();
            transcript.session_id().to_string()
        };

        let request = StreamRequest::new(input, chat_id)
            .with_token(self.token.clone())
            .with_attachment_ids(attachment_ids.into_iter().map(Some));
        let listener = TranscriptListener {
            transcript: Arc::clone(&self.transcript),
            echo,
        };

        match self.connector.open(&request, listener).await {
            Ok(stream) => Ok(Some(stream)),
            Err(e) => {
                log::error!("[chat] Failed to connect to AI stream: {e}");
                lock(&self.transcript).fail_streaming(CONNECT_FAILED_MESSAGE);
                Err(e)
            }
        }
    }

    /// Upload local attachments and collect the ids to send.
    async fn upload_pending(&self, attachments: &[Attachment]) -> Vec<String> {
        let mut ids = Vec::with_capacity(attachments.len());

        for attachment in attachments {
            if !attachment.id.starts_with(TEMP_ATTACHMENT_PREFIX) {
                ids.push(attachment.id.clone());
                continue;
            }

            let Some(api) = &self.api else {
                log::error!(
                    "[chat] Failed to upload attachment {}: no server configured",
                    attachment.id
                );
                continue;
            };

            let source = AttachmentSource::Path {
                path: attachment.url.clone().into(),
                file_name: attachment.file_name.clone(),
            };
            match api.upload_attachment(self.token.as_deref(), &source).await {
                Ok(id) => ids.push(id),
                Err(e) => log::error!("[chat] Failed to upload attachment: {e:#}"),
            }
        }

        ids
    }

    /// Load the page of history older than the oldest loaded message.
    ///
    /// Returns `false` without a request once the server reported that no
    /// older history exists.
    ///
    /// # Errors
    ///
    /// Returns an error if no server is configured or the request fails.
    pub async fn load_more(&self) -> Result<bool> {
        let before = {
            let transcript = lock(&self.transcript);
            if !transcript.has_more() {
                return Ok(false);
            }
            transcript.oldest_id().map(str::to_string)
        };

        let api = self
            .api
            .as_ref()
            .context("cannot load history: server base URL is not configured")?;
        let page = api
            .recent_messages(self.token.as_deref(), before.as_deref(), self.page_size)
            .await
            .context("Failed to load messages")?;

        let mut transcript = lock(&self.transcript);
        transcript.prepend_history(page.messages);
        Ok(transcript.has_more())
    }

    /// Start over: forget the transcript and the session id.
    pub fn clear(&self) {
        lock(&self.transcript).clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::types::Role;

    fn unconfigured() -> Conversation {
        Conversation::new(Connector::new(None), None)
    }

    #[tokio::test]
    async fn test_blank_input_without_attachments_is_ignored() {
        let conversation = unconfigured();
        let result = conversation.send("   ", Vec::new(), None).await;
        assert!(matches!(result, Ok(None)));
        assert!(conversation.transcript().messages().is_empty());
    }

    #[tokio::test]
    async fn test_open_failure_leaves_connect_apology() {
        let conversation = unconfigured();
        let result = conversation.send("hi", Vec::new(), None).await;
        assert!(matches!(result, Err(ConnectorError::Configuration(_))));

        let transcript = conversation.transcript();
        assert_eq!(transcript.messages().len(), 2);
        assert_eq!(transcript.messages()[0].role, Role::User);
        let reply = transcript.last().unwrap();
        assert_eq!(reply.content, CONNECT_FAILED_MESSAGE);
        assert!(!reply.is_streaming);
    }

    #[tokio::test]
    async fn test_uploaded_attachments_pass_through() {
        let conversation = unconfigured();
        let attachments = vec![
            Attachment {
                id: "att_1".to_string(),
                url: "https://cdn/x.png".to_string(),
                mime_type: None,
                file_name: None,
            },
            Attachment {
                id: "temp_2".to_string(),
                url: "/tmp/y.png".to_string(),
                mime_type: None,
                file_name: None,
            },
        ];
        // No API client: the local file is skipped, the uploaded one kept
        assert_eq!(conversation.upload_pending(&attachments).await, vec!["att_1"]);
    }

    #[tokio::test]
    async fn test_load_more_requires_server() {
        assert!(unconfigured().load_more().await.is_err());
    }

    #[test]
    fn test_listener_folds_and_echoes() {
        let transcript = Arc::new(Mutex::new(Transcript::new()));
        lock(&transcript).start_reply();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut listener = TranscriptListener {
            transcript: Arc::clone(&transcript),
            echo: Some(tx),
        };

        listener
            .on_fragment(Fragment::SessionNotice("abc".to_string()))
            .unwrap();
        listener.on_fragment(Fragment::Text("Hi".to_string())).unwrap();
        listener.on_error(&ConnectorError::ServerReported("[error]".to_string()));
        listener.on_close();

        let transcript = lock(&transcript).clone();
        assert_eq!(transcript.session_id(), "abc");
        assert_eq!(transcript.last().unwrap().content, STREAM_ERROR_MESSAGE);
        assert!(!transcript.last().unwrap().is_streaming);

        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        assert_eq!(events.len(), 4);
        assert_eq!(events[3], StreamEvent::Closed);
    }
}
