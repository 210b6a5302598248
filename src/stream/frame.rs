//! Inbound frame classification.
//!
//! The server speaks an ad-hoc convention on top of plain WebSocket
//! messages:
//!
//! - any text containing [`ERROR_MARKER`] reports a server-side failure,
//! - the exact text [`COMPLETION_SENTINEL`] ends the stream,
//! - a JSON object with a [`SESSION_ID_FIELD`] announces the conversation id,
//! - everything else is assistant output to display verbatim.
//!
//! All of that knowledge lives here so the connection lifecycle never looks
//! at payload contents.

// Rust guideline compliant 2026-02

use serde_json::Value;

/// Exact text of the end-of-stream marker.
pub const COMPLETION_SENTINEL: &str = "[complete]";

/// Substring marking an in-band server error.
pub const ERROR_MARKER: &str = "[error]";

/// JSON field carrying the server-assigned conversation id.
pub const SESSION_ID_FIELD: &str = "current_session_id";

/// One message as delivered by the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InboundPayload<'a> {
    /// UTF-8 text frame.
    Text(&'a str),
    /// Binary frame.
    Binary(&'a [u8]),
}

/// Classification of one inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundFrame {
    /// Server-assigned identifier for the conversation.
    SessionIdNotice(String),
    /// Terminal marker; nothing follows.
    CompletionSentinel,
    /// Server-reported failure, raw frame text.
    ErrorNotice(String),
    /// Assistant output.
    TextFragment(String),
}

/// Classify one inbound message. Total: every input maps to a frame.
pub fn classify(payload: InboundPayload<'_>) -> InboundFrame {
    let text = match payload {
        InboundPayload::Text(text) => text,
        InboundPayload::Binary(data) => {
            return InboundFrame::TextFragment(String::from_utf8_lossy(data).into_owned());
        }
    };

    if text.contains(ERROR_MARKER) {
        return InboundFrame::ErrorNotice(text.to_string());
    }

    if text == COMPLETION_SENTINEL {
        return InboundFrame::CompletionSentinel;
    }

    match serde_json::from_str::<Value>(text) {
        Ok(value) => match session_id(&value) {
            Some(id) => InboundFrame::SessionIdNotice(id),
            // Structured payloads without a session id are shown re-encoded
            None => InboundFrame::TextFragment(value.to_string()),
        },
        Err(_) => InboundFrame::TextFragment(text.to_string()),
    }
}

/// Extract a usable session id.
///
/// Any value except `null`, `false`, `""` and `0` counts. Non-string ids are
/// stringified: `true` becomes `"true"`, containers their compact JSON, and
/// integral numbers drop a trailing `.0`.
fn session_id(value: &Value) -> Option<String> {
    match value.get(SESSION_ID_FIELD)? {
        Value::Null | Value::Bool(false) => None,
        Value::Bool(true) => Some("true".to_string()),
        Value::String(id) if id.is_empty() => None,
        Value::String(id) => Some(id.clone()),
        Value::Number(n) => number_id(n),
        other @ (Value::Array(_) | Value::Object(_)) => Some(other.to_string()),
    }
}

fn number_id(n: &serde_json::Number) -> Option<String> {
    if n.is_i64() || n.is_u64() {
        return (n.as_f64() != Some(0.0)).then(|| n.to_string());
    }
    let f = n.as_f64()?;
    if f == 0.0 {
        return None;
    }
    // 1e21 is where integral floats switch to exponent notation
    if f.fract() == 0.0 && f.abs() < 1e21 {
        return Some(format!("{f:.0}"));
    }
    Some(n.to_string())
}
