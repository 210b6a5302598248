//! Streaming session connector.
//!
//! Opens one WebSocket to the assistant, sends one [`StreamRequest`], and
//! relays the reply to a [`StreamListener`] until the server signals the
//! end of the stream.
//!
//! # Architecture
//!
//! ```text
//! Connector::open ──spawn──▶ driver task (owns socket + Session)
//!       │                        │
//!       │◀── one-shot outcome ───┤ ready + sent │ failure
//!       │                        │
//!       ▼                        ├── Fragment ──▶ listener.on_fragment
//!   LiveStream ── close() ──────▶├── failure ───▶ listener.on_error
//!                                └── end ───────▶ listener.on_close (once)
//! ```
//!
//! All events of a session are handled by its driver task in transport
//! order, so the listener never sees fragments out of order or concurrently.
//! Lifecycle rules live in [`session`]; payload conventions live in
//! [`frame`].
//!
//! # Usage
//!
//! ```ignore
//! let connector = Connector::from_config(&config);
//! let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
//! let stream = connector.open(&StreamRequest::new("hi", ""), tx).await?;
//! while let Some(event) = rx.recv().await {
//!     // StreamEvent::Fragment / Error / Closed
//! }
//! stream.wait().await;
//! ```

// Rust guideline compliant 2026-02

pub mod error;
pub mod frame;
pub mod listener;
pub mod request;
pub(crate) mod session;

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::config::Config;
use crate::constants::{CLOSE_HANDSHAKE_TIMEOUT, CONNECT_TIMEOUT};
use crate::ws::{self, Received, WsWriter, CLOSE_ABNORMAL};

pub use error::{ConnectorError, ReadyState};
pub use frame::{classify, InboundFrame, InboundPayload};
pub use listener::{Callbacks, Fragment, StreamEvent, StreamListener};
pub use request::StreamRequest;
pub use session::SessionState;

use session::{Directive, Session};

/// Opens streaming sessions against one endpoint.
#[derive(Debug, Clone)]
pub struct Connector {
    endpoint: Option<String>,
    connect_timeout: Duration,
}

impl Connector {
    /// Create a connector for a WebSocket endpoint (`ws://` or `wss://`).
    ///
    /// `None` is accepted so that a missing configuration surfaces as
    /// [`ConnectorError::Configuration`] from [`open`](Self::open).
    pub fn new(endpoint: Option<String>) -> Self {
        Self {
            endpoint,
            connect_timeout: CONNECT_TIMEOUT,
        }
    }

    /// Create a connector from the loaded configuration.
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.stream_url()).with_connect_timeout(config.connect_timeout())
    }

    /// Override the readiness window.
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Endpoint this connector dials, if configured.
    pub fn endpoint(&self) -> Option<&str> {
        self.endpoint.as_deref()
    }

    /// Open a session, send `request`, and stream the reply into `listener`.
    ///
    /// Resolves once the request has been sent (`Ok`) or the session failed
    /// before that point (`Err`). It resolves exactly once; failures after
    /// that reach only the listener.
    ///
    /// # Errors
    ///
    /// - [`ConnectorError::Configuration`] if no endpoint is configured,
    /// - [`ConnectorError::Encoding`] if the request cannot be serialized,
    /// - [`ConnectorError::Timeout`] if the transport is not ready in time,
    /// - [`ConnectorError::Send`], [`ConnectorError::Transport`] or
    ///   [`ConnectorError::AbnormalClose`] if the handshake or send fails.
    ///
    /// The first two are returned without opening a transport or calling the
    /// listener.
    pub async fn open<L: StreamListener>(
        &self,
        request: &StreamRequest,
        listener: L,
    ) -> Result<LiveStream, ConnectorError> {
        let Some(url) = self.endpoint.clone() else {
            log::error!("[stream] Configuration error: no stream endpoint");
            return Err(ConnectorError::Configuration(
                "stream endpoint is not configured (set CHAT_STREAM_BASE_URL)".to_string(),
            ));
        };

        let payload = request.encode().inspect_err(|e| {
            log::error!("[stream] {e}");
        })?;

        let (session, outcome) = Session::new(payload, self.connect_timeout, listener);
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(drive(url, session, command_rx));

        match outcome.await {
            Ok(Ok(())) => Ok(LiveStream {
                commands: command_tx,
                task,
            }),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(ConnectorError::Transport {
                state: ReadyState::Closed,
                detail: "session task ended without an outcome".to_string(),
            }),
        }
    }
}

/// Command from the [`LiveStream`] handle to its driver task.
#[derive(Debug)]
enum StreamCommand {
    /// Close the stream normally.
    Close,
}

/// Handle to a session whose request has been sent.
///
/// Dropping the handle does not stop the stream; the listener keeps
/// receiving events until the session ends.
#[derive(Debug)]
pub struct LiveStream {
    commands: mpsc::UnboundedSender<StreamCommand>,
    task: JoinHandle<()>,
}

impl LiveStream {
    /// Ask for a normal close. Returns `false` if the session already ended.
    pub fn close(&self) -> bool {
        self.commands.send(StreamCommand::Close).is_ok()
    }

    /// Whether the session has ended.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the session to end (after the listener's `on_close`).
    pub async fn wait(self) {
        if let Err(e) = self.task.await {
            log::error!("[stream] Session task failed: {e}");
        }
    }
}

/// Drive one session from connect to close.
///
/// The guard retires the session on every exit path, including task
/// cancellation, so `on_close` always fires exactly once.
async fn drive<L: StreamListener>(
    url: String,
    session: Session<L>,
    commands: mpsc::UnboundedReceiver<StreamCommand>,
) {
    let mut session = scopeguard::guard(session, |mut session| session.finish());
    let mut commands = Some(commands);

    log::info!("[stream] Connecting to {url}");

    // The connect timer lives only as long as this select
    let (mut writer, mut reader) = tokio::select! {
        result = ws::connect(&url) => match result {
            Ok(pair) => pair,
            Err(e) => {
                session.on_transport_error(&format!("{e:#}"));
                return;
            }
        },
        () = tokio::time::sleep(session.connect_timeout()) => {
            // Dropping the connect future abandons the handshake
            session.on_timeout();
            return;
        }
    };

    let mut close_deadline: Option<Instant> = None;

    let directive = session.on_open();
    if !perform(&mut *session, &mut writer, directive, &mut close_deadline).await {
        return;
    }

    loop {
        let deadline = close_deadline;
        tokio::select! {
            frame = reader.recv() => match frame {
                Some(Ok(Received::Text(text))) => {
                    let directive = session.on_message(InboundPayload::Text(&text));
                    if !perform(&mut *session, &mut writer, directive, &mut close_deadline).await {
                        return;
                    }
                }
                Some(Ok(Received::Binary(data))) => {
                    let directive = session.on_message(InboundPayload::Binary(&data));
                    if !perform(&mut *session, &mut writer, directive, &mut close_deadline).await {
                        return;
                    }
                }
                Some(Ok(Received::Close { code, reason })) => {
                    // Flush our close reply before reporting
                    if let Err(e) = writer.shutdown().await {
                        log::debug!("[stream] Close reply not flushed: {e:#}");
                    }
                    session.on_close(code, &reason);
                    return;
                }
                Some(Err(e)) => {
                    let directive = session.on_transport_error(&format!("{e:#}"));
                    perform(&mut *session, &mut writer, directive, &mut close_deadline).await;
                    session.on_close(CLOSE_ABNORMAL, "transport error");
                    return;
                }
                None => {
                    session.on_close(CLOSE_ABNORMAL, "stream ended");
                    return;
                }
            },
            command = next_command(&mut commands) => match command {
                Some(StreamCommand::Close) => {
                    let directive = session.request_close();
                    if !perform(&mut *session, &mut writer, directive, &mut close_deadline).await {
                        return;
                    }
                }
                None => {
                    log::debug!("[stream] Stream handle dropped, continuing until close");
                    commands = None;
                }
            },
            () = wait_until(deadline) => {
                log::warn!(
                    "[stream] Peer did not answer our close within {}s (state {:?})",
                    CLOSE_HANDSHAKE_TIMEOUT.as_secs(),
                    session.state()
                );
                session.on_close(CLOSE_ABNORMAL, "close handshake timed out");
                return;
            }
        }
    }
}

/// Carry out `directive` and any follow-up it produces.
///
/// Returns `false` when the transport must be dropped right away.
async fn perform<L: StreamListener>(
    session: &mut Session<L>,
    writer: &mut WsWriter,
    mut directive: Directive,
    close_deadline: &mut Option<Instant>,
) -> bool {
    loop {
        match directive {
            Directive::None => return true,
            Directive::Abort => return false,
            Directive::Send(payload) => {
                let result = writer
                    .send_text(&payload)
                    .await
                    .map_err(|e| format!("{e:#}"));
                directive = session.on_sent(result);
            }
            Directive::Close { code, reason } => {
                if close_deadline.is_none() {
                    if let Err(e) = writer.send_close(code, reason).await {
                        log::debug!("[stream] Close frame not sent: {e:#}");
                    }
                    *close_deadline = Some(Instant::now() + CLOSE_HANDSHAKE_TIMEOUT);
                }
                return true;
            }
        }
    }
}

async fn next_command(
    commands: &mut Option<mpsc::UnboundedReceiver<StreamCommand>>,
) -> Option<StreamCommand> {
    match commands {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
