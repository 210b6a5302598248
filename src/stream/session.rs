//! Per-session state machine.
//!
//! [`Session`] is sans-IO: the driver task in [`super`] feeds it transport
//! events one at a time and carries out the [`Directive`] each event
//! returns. Keeping the lifecycle here, apart from the socket, lets every
//! transition be exercised without a network.
//!
//! ```text
//! Connecting ──timeout──────────────────────────────▶ Failed
//! Connecting ──ready──▶ AwaitingSend ──send fail────▶ Failed
//!                       AwaitingSend ──send ok──▶ Streaming
//! Streaming ──sentinel──▶ ClosingRequested ──close──▶ Closed
//! Streaming ──error notice | transport error | abnormal close──▶ Failed
//! ```

// Rust guideline compliant 2026-02

use std::time::Duration;

use tokio::sync::oneshot;

use super::error::{ConnectorError, ReadyState};
use super::frame::{classify, InboundFrame, InboundPayload};
use super::listener::{Fragment, StreamListener};
use crate::constants::{CLOSE_INTERNAL_ERROR, CLOSE_NORMAL};
use crate::ws::CLOSE_ABNORMAL;

/// Lifecycle state of one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Transport handshake in progress, timeout armed.
    Connecting,
    /// Transport ready, request not yet sent.
    AwaitingSend,
    /// Request sent, fragments flowing.
    Streaming,
    /// We asked the transport to close and wait for it to do so.
    ClosingRequested,
    /// Closed cleanly. Terminal.
    Closed,
    /// Ended by a failure. Terminal.
    Failed,
}

impl SessionState {
    /// Whether no further transitions are possible.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Closed | Self::Failed)
    }

    fn ready_state(self) -> ReadyState {
        match self {
            Self::Connecting => ReadyState::Connecting,
            Self::AwaitingSend | Self::Streaming => ReadyState::Open,
            Self::ClosingRequested => ReadyState::Closing,
            Self::Closed | Self::Failed => ReadyState::Closed,
        }
    }
}

/// Result of the open handshake.
pub(crate) type Outcome = Result<(), ConnectorError>;

/// Write-once cell for the open outcome. Writes after the first are no-ops.
#[derive(Debug)]
pub(crate) struct OutcomeCell {
    tx: Option<oneshot::Sender<Outcome>>,
}

impl OutcomeCell {
    pub(crate) fn new() -> (Self, oneshot::Receiver<Outcome>) {
        let (tx, rx) = oneshot::channel();
        (Self { tx: Some(tx) }, rx)
    }

    /// Settle the outcome. Returns `false` if it had already been settled.
    pub(crate) fn settle(&mut self, outcome: Outcome) -> bool {
        match self.tx.take() {
            Some(tx) => {
                // The opener may have given up waiting; nothing to do then.
                let _ = tx.send(outcome);
                true
            }
            None => false,
        }
    }

    pub(crate) fn is_settled(&self) -> bool {
        self.tx.is_none()
    }
}

/// What the driver must do to the transport after an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Directive {
    /// Nothing to do.
    None,
    /// Transmit the serialized request.
    Send(String),
    /// Send a close frame and wait for the peer's close.
    Close {
        /// Close code.
        code: u16,
        /// Close reason.
        reason: &'static str,
    },
    /// Drop the transport without a close handshake.
    Abort,
}

/// One request/response exchange.
pub(crate) struct Session<L> {
    state: SessionState,
    outcome: OutcomeCell,
    payload: Option<String>,
    connect_timeout: Duration,
    close_requested_by_client: bool,
    close_notified: bool,
    listener: L,
}

impl<L> std::fmt::Debug for Session<L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("state", &self.state)
            .field("settled", &self.outcome.is_settled())
            .field("close_requested_by_client", &self.close_requested_by_client)
            .field("close_notified", &self.close_notified)
            .finish_non_exhaustive()
    }
}

impl<L: StreamListener> Session<L> {
    /// Create a session in `Connecting` that will send `payload` once ready.
    pub(crate) fn new(
        payload: String,
        connect_timeout: Duration,
        listener: L,
    ) -> (Self, oneshot::Receiver<Outcome>) {
        let (outcome, rx) = OutcomeCell::new();
        let session = Self {
            state: SessionState::Connecting,
            outcome,
            payload: Some(payload),
            connect_timeout,
            close_requested_by_client: false,
            close_notified: false,
            listener,
        };
        (session, rx)
    }

    pub(crate) fn state(&self) -> SessionState {
        self.state
    }

    pub(crate) fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    /// The connect window elapsed.
    pub(crate) fn on_timeout(&mut self) -> Directive {
        if self.state != SessionState::Connecting || self.outcome.is_settled() {
            return Directive::None;
        }
        log::error!(
            "[stream] Connection timeout after {}ms",
            self.connect_timeout.as_millis()
        );
        self.state = SessionState::Failed;
        self.outcome
            .settle(Err(ConnectorError::Timeout(self.connect_timeout)));
        Directive::Abort
    }

    /// The transport signalled readiness.
    pub(crate) fn on_open(&mut self) -> Directive {
        if self.state != SessionState::Connecting || self.outcome.is_settled() {
            log::debug!("[stream] Ignoring late open in state {:?}", self.state);
            return Directive::Abort;
        }
        match self.payload.take() {
            Some(payload) => {
                self.state = SessionState::AwaitingSend;
                Directive::Send(payload)
            }
            None => Directive::Abort,
        }
    }

    /// The request send finished.
    pub(crate) fn on_sent(&mut self, result: Result<(), String>) -> Directive {
        if self.state != SessionState::AwaitingSend {
            return Directive::None;
        }
        match result {
            Ok(()) => {
                log::debug!("[stream] Request sent, streaming");
                self.state = SessionState::Streaming;
                self.outcome.settle(Ok(()));
                Directive::None
            }
            Err(detail) => {
                log::error!("[stream] Send error: {detail}");
                self.state = SessionState::Failed;
                self.report(ConnectorError::Send(detail));
                Directive::Close {
                    code: CLOSE_INTERNAL_ERROR,
                    reason: "client-error",
                }
            }
        }
    }

    /// An inbound message arrived.
    pub(crate) fn on_message(&mut self, payload: InboundPayload<'_>) -> Directive {
        if self.state != SessionState::Streaming {
            log::debug!("[stream] Dropping frame received in state {:?}", self.state);
            return Directive::None;
        }

        match classify(payload) {
            InboundFrame::ErrorNotice(raw) => {
                log::error!("[stream] Server error detected: {raw}");
                self.state = SessionState::Failed;
                self.report(ConnectorError::ServerReported(raw));
                Directive::Close {
                    code: CLOSE_INTERNAL_ERROR,
                    reason: "server-error",
                }
            }
            InboundFrame::CompletionSentinel => {
                self.close_requested_by_client = true;
                self.state = SessionState::ClosingRequested;
                Directive::Close {
                    code: CLOSE_NORMAL,
                    reason: "complete",
                }
            }
            InboundFrame::SessionIdNotice(id) => {
                self.deliver(Fragment::SessionNotice(id));
                Directive::None
            }
            InboundFrame::TextFragment(text) => {
                self.deliver(Fragment::Text(text));
                Directive::None
            }
        }
    }

    /// The caller asked to end the stream.
    pub(crate) fn request_close(&mut self) -> Directive {
        if self.state != SessionState::Streaming {
            return Directive::None;
        }
        self.close_requested_by_client = true;
        self.state = SessionState::ClosingRequested;
        Directive::Close {
            code: CLOSE_NORMAL,
            reason: "client-close",
        }
    }

    /// The transport reported a failure.
    pub(crate) fn on_transport_error(&mut self, detail: &str) -> Directive {
        if self.state.is_terminal() {
            log::debug!("[stream] Ignoring transport error after termination: {detail}");
            return Directive::None;
        }
        let ready_state = self.state.ready_state();
        log::error!("[stream] Socket error in state {ready_state}: {detail}");
        self.state = SessionState::Failed;
        self.report(ConnectorError::Transport {
            state: ready_state,
            detail: detail.to_string(),
        });
        Directive::Close {
            code: CLOSE_INTERNAL_ERROR,
            reason: "client-error",
        }
    }

    /// The transport closed. Fires `on_close` exactly once over the session.
    pub(crate) fn on_close(&mut self, code: u16, reason: &str) {
        if self.close_notified {
            return;
        }

        // Some stacks report 1006 for a close we initiated ourselves
        let clean = code == CLOSE_NORMAL || (code == CLOSE_ABNORMAL && self.close_requested_by_client);

        if !clean && !self.close_requested_by_client && self.state != SessionState::Failed {
            log::warn!("[stream] Closed abnormally ({code}): {reason}");
            self.state = SessionState::Failed;
            self.report(ConnectorError::AbnormalClose {
                code,
                reason: reason.to_string(),
            });
        } else {
            log::debug!("[stream] Closed ({code}) in state {:?}", self.state);
        }

        self.finish();
    }

    /// Retire the session: enter a terminal state and fire `on_close` once.
    ///
    /// Safe to call repeatedly; the driver's guard calls it on every exit.
    pub(crate) fn finish(&mut self) {
        if self.close_notified {
            return;
        }
        self.close_notified = true;
        if !self.state.is_terminal() {
            self.state = SessionState::Closed;
        }
        if !self.outcome.is_settled() {
            self.outcome.settle(Err(ConnectorError::Transport {
                state: ReadyState::Closed,
                detail: "session ended before the transport was ready".to_string(),
            }));
        }
        self.listener.on_close();
    }

    /// Report a failure to the listener and, if still pending, to the opener.
    fn report(&mut self, error: ConnectorError) {
        self.listener.on_error(&error);
        self.outcome.settle(Err(error));
    }

    fn deliver(&mut self, fragment: Fragment) {
        if let Err(e) = self.listener.on_fragment(fragment) {
            // Keep the stream alive; one bad fragment is not a session failure
            log::warn!("[stream] Fragment handler failed: {e:#}");
        }
    }
}
