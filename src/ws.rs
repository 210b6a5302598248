//! WebSocket transport for the stream connector.
//!
//! Wraps `tokio-tungstenite` so the connector only sees what it acts on:
//! data frames and the peer's close. Pings are answered by tungstenite and
//! never surface here.
//!
//! [`connect`] performs the handshake (TLS included for `wss://`) and
//! returns independent ([`WsWriter`], [`WsReader`]) halves for use in
//! `tokio::select!` loops.

// Rust guideline compliant 2026-02

use anyhow::{Context, Result};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::error::ProtocolError;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::{self, Message};

/// Close code reported when a close frame carries no status.
pub const CLOSE_NO_STATUS: u16 = 1005;

/// Close code reported when the connection dropped without a close frame.
pub const CLOSE_ABNORMAL: u16 = 1006;

type Socket = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

/// A frame the connector has to act on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Received {
    /// Text frame.
    Text(String),
    /// Binary frame.
    Binary(Vec<u8>),
    /// The peer closed. `code` is [`CLOSE_NO_STATUS`] when it sent none.
    Close {
        /// Close code.
        code: u16,
        /// Close reason, possibly empty.
        reason: String,
    },
}

/// Outgoing half of a connection.
#[derive(Debug)]
pub struct WsWriter {
    sink: SplitSink<Socket, Message>,
}

impl WsWriter {
    /// Send one text frame.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection can no longer be written to.
    pub async fn send_text(&mut self, text: &str) -> Result<()> {
        self.sink
            .send(Message::Text(text.to_owned()))
            .await
            .context("failed to send text frame")
    }

    /// Start the close handshake with `code` and `reason`.
    ///
    /// The peer's answering close arrives on the reader as
    /// [`Received::Close`].
    ///
    /// # Errors
    ///
    /// Returns an error if the close frame cannot be written.
    pub async fn send_close(&mut self, code: u16, reason: &str) -> Result<()> {
        let frame = CloseFrame {
            code: CloseCode::from(code),
            reason: reason.to_owned().into(),
        };
        self.sink
            .send(Message::Close(Some(frame)))
            .await
            .with_context(|| format!("failed to send close frame ({code})"))
    }

    /// Flush our side of the close handshake and shut the sink.
    ///
    /// # Errors
    ///
    /// Returns an error if the final flush fails.
    pub async fn shutdown(&mut self) -> Result<()> {
        self.sink.close().await.context("failed to shut down socket")
    }
}

/// Incoming half of a connection.
#[derive(Debug)]
pub struct WsReader {
    stream: SplitStream<Socket>,
}

impl WsReader {
    /// Next frame to act on.
    ///
    /// `None` means the connection is gone without a close frame, which
    /// callers treat as close code [`CLOSE_ABNORMAL`].
    pub async fn recv(&mut self) -> Option<Result<Received>> {
        while let Some(item) = self.stream.next().await {
            let message = match item {
                Ok(message) => message,
                Err(e) if peer_vanished(&e) => return None,
                Err(e) => return Some(Err(anyhow::anyhow!("WebSocket read error: {e}"))),
            };
            match message {
                Message::Text(text) => return Some(Ok(Received::Text(text))),
                Message::Binary(data) => return Some(Ok(Received::Binary(data))),
                Message::Close(frame) => return Some(Ok(close_of(frame))),
                Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => {}
            }
        }
        None
    }
}

/// Errors that just mean the peer is no longer there.
fn peer_vanished(error: &tungstenite::Error) -> bool {
    matches!(
        error,
        tungstenite::Error::ConnectionClosed
            | tungstenite::Error::AlreadyClosed
            | tungstenite::Error::Protocol(ProtocolError::ResetWithoutClosingHandshake)
    )
}

fn close_of(frame: Option<CloseFrame<'_>>) -> Received {
    match frame {
        Some(frame) => Received::Close {
            code: frame.code.into(),
            reason: frame.reason.into_owned(),
        },
        None => Received::Close {
            code: CLOSE_NO_STATUS,
            reason: String::new(),
        },
    }
}

/// Open a WebSocket to `url`.
///
/// # Errors
///
/// Returns an error if the URL is not a WebSocket URL or the handshake
/// fails.
pub async fn connect(url: &str) -> Result<(WsWriter, WsReader)> {
    let request = url
        .into_client_request()
        .with_context(|| format!("invalid WebSocket URL: {url}"))?;

    let (socket, _response) = tokio_tungstenite::connect_async(request)
        .await
        .context("WebSocket handshake failed")?;
    let (sink, stream) = socket.split();

    Ok((WsWriter { sink }, WsReader { stream }))
}

/// Rewrite an `http://`/`https://` URL to `ws://`/`wss://`.
///
/// Only the scheme prefix changes; anything else is returned as is.
#[must_use]
pub fn http_to_ws_scheme(url: &str) -> String {
    if let Some(rest) = url.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = url.strip_prefix("http://") {
        format!("ws://{rest}")
    } else {
        url.to_owned()
    }
}
