//! Application-wide constants for chat-stream.
//!
//! This module centralizes magic numbers, wire paths and user-facing
//! strings. Constants are grouped by domain.
//!
//! # Categories
//!
//! - **Timeouts**: Network and operation timeouts
//! - **Endpoints**: Paths appended to the configured base URL
//! - **Close codes**: WebSocket close codes the connector sends
//! - **Transcript**: Substitute messages shown on failure

// Rust guideline compliant 2026-02

use std::time::Duration;

// ============================================================================
// Timeouts
// ============================================================================

/// Window for the stream transport to become ready.
///
/// If the WebSocket handshake has not completed within this window the
/// pending connection is abandoned and `open` fails with a timeout.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(15);

/// How long to wait for the peer's close frame after we sent ours.
pub const CLOSE_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);

/// HTTP client request timeout for API calls.
///
/// Applies to attachment uploads and history requests.
pub const HTTP_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

// ============================================================================
// Endpoints
// ============================================================================

/// Prefix of every REST and WebSocket endpoint.
pub const API_PREFIX: &str = "/api/v1/";

/// Streaming message endpoint, relative to [`API_PREFIX`].
pub const STREAM_PATH: &str = "ws/messages";

/// Attachment upload endpoint, relative to [`API_PREFIX`].
pub const UPLOAD_PATH: &str = "attachments/upload";

/// History endpoint, relative to [`API_PREFIX`].
pub const MESSAGES_PATH: &str = "messages";

/// Default number of messages per history page.
pub const DEFAULT_HISTORY_PAGE_SIZE: u32 = 20;

// ============================================================================
// Close codes
// ============================================================================

/// Clean shutdown.
pub const CLOSE_NORMAL: u16 = 1000;

/// Shutdown because of an error on either side.
pub const CLOSE_INTERNAL_ERROR: u16 = 1011;

// ============================================================================
// Transcript
// ============================================================================

/// Shown in place of the assistant reply when the stream reports an error.
pub const STREAM_ERROR_MESSAGE: &str =
    "Sorry, an error occurred while connecting to the AI service.";

/// Shown in place of the assistant reply when the stream could not be opened.
pub const CONNECT_FAILED_MESSAGE: &str = "Sorry, failed to connect to the AI service.";

/// Prefix marking an attachment that only exists locally and must be
/// uploaded before its id can be sent.
pub const TEMP_ATTACHMENT_PREFIX: &str = "temp_";
