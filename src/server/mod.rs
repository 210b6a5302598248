//! Server communication module for chat-stream.
//!
//! REST collaborators of the streaming connector:
//!
//! - HTTP client for uploads and history (`ApiClient`)
//! - Request/response data types (`ChatMessage`, `MessagePage`, ...)
//! - Failure reasons from error bodies (`extract_error_message`)
//!
//! # Modules
//!
//! - [`client`] - HTTP client for the chat server API
//! - [`types`] - Request/response data types
//! - [`detail`] - Error body parsing

// Rust guideline compliant 2026-02

pub mod client;
pub mod detail;
pub mod types;

pub use client::ApiClient;
pub use detail::extract_error_message;
pub use types::{mime_info, Attachment, AttachmentSource, ChatMessage, MessagePage, Role};
