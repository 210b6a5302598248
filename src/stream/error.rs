//! Error taxonomy for the streaming session connector.

// Rust guideline compliant 2026-02

use std::time::Duration;

/// Transport ready state at the moment an error was observed.
///
/// Mirrors the four states a WebSocket reports and is only used to make
/// transport errors readable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadyState {
    /// Handshake not yet complete.
    Connecting,
    /// Handshake complete, frames flowing.
    Open,
    /// A close frame has been sent or received.
    Closing,
    /// The connection is gone.
    Closed,
}

impl ReadyState {
    fn describe_failure(self) -> &'static str {
        match self {
            Self::Connecting => {
                "Failed to establish WebSocket connection. Check if the server is accessible."
            }
            Self::Open => "WebSocket connection error occurred during communication.",
            Self::Closing => "WebSocket connection error while closing.",
            Self::Closed => "WebSocket connection closed unexpectedly.",
        }
    }
}

impl std::fmt::Display for ReadyState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Connecting => "CONNECTING",
            Self::Open => "OPEN",
            Self::Closing => "CLOSING",
            Self::Closed => "CLOSED",
        };
        f.write_str(name)
    }
}

/// Errors produced by a streaming session.
///
/// `Configuration` and `Encoding` only ever reject [`Connector::open`](super::Connector::open);
/// the rest may additionally reach the listener's `on_error`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectorError {
    /// Required endpoint configuration is missing.
    Configuration(String),
    /// The outgoing request could not be serialized.
    Encoding(String),
    /// The transport did not become ready within the window.
    Timeout(Duration),
    /// The transport became ready but the request could not be transmitted.
    Send(String),
    /// The server reported a failure in-band.
    ServerReported(String),
    /// The underlying transport failed.
    Transport {
        /// Ready state when the failure was observed.
        state: ReadyState,
        /// Lower-level error text, for logs.
        detail: String,
    },
    /// The transport closed with a non-clean code we did not ask for.
    AbnormalClose {
        /// WebSocket close code.
        code: u16,
        /// Close reason sent by the peer (may be empty).
        reason: String,
    },
}

impl std::fmt::Display for ConnectorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Configuration(msg) => write!(f, "Configuration error: {msg}"),
            Self::Encoding(msg) => write!(f, "Message preparation failed: {msg}"),
            Self::Timeout(_) => write!(f, "WebSocket connection timeout"),
            Self::Send(msg) => write!(f, "Send failed: {msg}"),
            Self::ServerReported(raw) => write!(f, "Server error: {raw}"),
            Self::Transport { state, .. } => f.write_str(state.describe_failure()),
            Self::AbnormalClose { code, reason } => {
                let reason = if reason.is_empty() { "no reason" } else { reason };
                write!(f, "WebSocket closed abnormally ({code}): {reason}")
            }
        }
    }
}

impl std::error::Error for ConnectorError {}
