//! In-memory transcript of one conversation.
//!
//! Stream fragments are folded into the newest assistant message; nothing
//! here touches the network.

// Rust guideline compliant 2026-02

use crate::server::types::{Attachment, ChatMessage, Role};
use crate::stream::Fragment;

/// Messages of the current conversation plus its paging state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transcript {
    messages: Vec<ChatMessage>,
    session_id: String,
    has_more: bool,
}

impl Default for Transcript {
    fn default() -> Self {
        Self {
            messages: Vec::new(),
            session_id: String::new(),
            has_more: true,
        }
    }
}

impl Transcript {
    /// Create an empty transcript with no session.
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages in chronological order.
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// Server conversation id, empty until the server assigns one.
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Whether older history may still exist on the server.
    pub fn has_more(&self) -> bool {
        self.has_more
    }

    /// Id of the oldest loaded message, used as the history cursor.
    pub fn oldest_id(&self) -> Option<&str> {
        self.messages.first().and_then(|m| m.id.as_deref())
    }

    /// The newest message, if any.
    pub fn last(&self) -> Option<&ChatMessage> {
        self.messages.last()
    }

    /// Append the user's message.
    pub fn push_user(&mut self, content: &str, attachments: Vec<Attachment>) {
        self.messages.push(ChatMessage {
            id: Some(message_id(0)),
            role: Role::User,
            content: content.to_string(),
            attachments,
            is_streaming: false,
        });
    }

    /// Append an empty assistant message that fragments will fill in.
    pub fn start_reply(&mut self) {
        self.messages.push(ChatMessage {
            id: Some(message_id(1)),
            role: Role::Assistant,
            content: String::new(),
            attachments: Vec::new(),
            is_streaming: true,
        });
    }

    /// Fold one stream fragment into the transcript.
    ///
    /// Session notices replace the conversation id. Text is appended to the
    /// last message only when that message is the assistant's.
    pub fn apply_fragment(&mut self, fragment: Fragment) {
        match fragment {
            Fragment::SessionNotice(id) => {
                log::debug!("[chat] Session id is now {id}");
                self.session_id = id;
            }
            Fragment::Text(text) => {
                if let Some(reply) = self.reply_mut() {
                    reply.content.push_str(&text);
                }
            }
        }
    }

    /// Mark the in-flight reply as complete.
    pub fn finish_streaming(&mut self) {
        if let Some(reply) = self.reply_mut() {
            reply.is_streaming = false;
        }
    }

    /// Replace the in-flight reply with `apology` and mark it complete.
    pub fn fail_streaming(&mut self, apology: &str) {
        if let Some(reply) = self.reply_mut() {
            reply.content = apology.to_string();
            reply.is_streaming = false;
        }
    }

    /// Put an older page of history in front of the loaded messages.
    ///
    /// An empty page means the server has nothing older.
    pub fn prepend_history(&mut self, page: Vec<ChatMessage>) {
        if page.is_empty() {
            self.has_more = false;
            return;
        }
        self.messages.splice(0..0, page);
    }

    /// Forget all messages and the session id.
    pub fn clear(&mut self) {
        self.messages.clear();
        self.session_id.clear();
    }

    fn reply_mut(&mut self) -> Option<&mut ChatMessage> {
        self.messages
            .last_mut()
            .filter(|m| m.role == Role::Assistant)
    }
}

fn message_id(offset: i64) -> String {
    format!("msg_{}", chrono::Utc::now().timestamp_millis() + offset)
}
