//! chat-stream - streaming chat client.
//!
//! This crate talks to a chat assistant server: one WebSocket session per
//! message for the streamed reply, plus REST calls for attachment upload and
//! history paging.
//!
//! # Architecture
//!
//! - **Stream** - per-message session connector (open, send once, relay
//!   fragments, settle once)
//! - **Server** - REST adapter for uploads and history
//! - **Chat** - headless conversation state fed by the stream
//!
//! # Modules
//!
//! - [`stream`] - WebSocket session connector and frame classification
//! - [`server`] - HTTP client for the chat server API
//! - [`chat`] - Transcript and conversation orchestration
//! - [`config`] - Configuration loading/saving
//! - [`ws`] - Thin WebSocket transport wrapper

pub mod chat;
pub mod config;
pub mod constants;
pub mod server;
pub mod stream;
pub mod ws;

// Re-export commonly used types
pub use chat::{Conversation, Transcript};
pub use config::Config;
pub use server::ApiClient;
pub use stream::{
    Callbacks, Connector, ConnectorError, Fragment, LiveStream, StreamEvent, StreamListener,
    StreamRequest,
};
