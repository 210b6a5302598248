//! Listener funnel for stream events.
//!
//! The connector reports everything after the initial handshake through a
//! [`StreamListener`]. Two ready-made adapters exist: [`Callbacks`] for
//! closure-based callers and `mpsc::UnboundedSender<StreamEvent>` for callers
//! that prefer to consume events from a channel.

// Rust guideline compliant 2026-02

use anyhow::{anyhow, Result};
use tokio::sync::mpsc;

use super::error::ConnectorError;

/// A routed, visible-or-tagged piece of stream output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fragment {
    /// Server-assigned conversation id. Never part of the visible reply.
    SessionNotice(String),
    /// Assistant output, to be appended in arrival order.
    Text(String),
}

impl Fragment {
    /// Visible text carried by this fragment, if any.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::SessionNotice(_) => None,
        }
    }
}

/// Receives fragments, errors and the final close of one stream.
///
/// All calls for a session come from a single task, in transport order.
/// `on_close` is called exactly once per session, after any error report.
pub trait StreamListener: Send + 'static {
    /// A fragment arrived.
    ///
    /// Returning an error does not end the stream; it is logged and the
    /// next frame is processed normally.
    fn on_fragment(&mut self, fragment: Fragment) -> Result<()>;

    /// The stream is over.
    fn on_close(&mut self);

    /// The stream failed.
    fn on_error(&mut self, error: &ConnectorError);
}

/// Event form of the listener calls, for channel-based consumers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// See [`StreamListener::on_fragment`].
    Fragment(Fragment),
    /// See [`StreamListener::on_error`].
    Error(ConnectorError),
    /// See [`StreamListener::on_close`]. Always the last event.
    Closed,
}

impl StreamListener for mpsc::UnboundedSender<StreamEvent> {
    fn on_fragment(&mut self, fragment: Fragment) -> Result<()> {
        self.send(StreamEvent::Fragment(fragment))
            .map_err(|e| anyhow!("stream event receiver dropped: {e}"))
    }

    fn on_close(&mut self) {
        let _ = self.send(StreamEvent::Closed);
    }

    fn on_error(&mut self, error: &ConnectorError) {
        let _ = self.send(StreamEvent::Error(error.clone()));
    }
}

type FragmentFn = Box<dyn FnMut(Fragment) -> Result<()> + Send>;
type CloseFn = Box<dyn FnMut() + Send>;
type ErrorFn = Box<dyn FnMut(&ConnectorError) + Send>;

/// Closure-based listener.
///
/// ```ignore
/// let listener = Callbacks::new(|fragment| {
///     print!("{}", fragment.as_text().unwrap_or_default());
///     Ok(())
/// })
/// .with_close(|| println!())
/// .with_error(|e| eprintln!("{e}"));
/// ```
pub struct Callbacks {
    fragment: FragmentFn,
    close: Option<CloseFn>,
    error: Option<ErrorFn>,
}

impl Callbacks {
    /// Create callbacks with a fragment handler; close and error default to no-ops.
    pub fn new<F>(on_fragment: F) -> Self
    where
        F: FnMut(Fragment) -> Result<()> + Send + 'static,
    {
        Self {
            fragment: Box::new(on_fragment),
            close: None,
            error: None,
        }
    }

    /// Set the close handler.
    #[must_use]
    pub fn with_close<F>(mut self, on_close: F) -> Self
    where
        F: FnMut() + Send + 'static,
    {
        self.close = Some(Box::new(on_close));
        self
    }

    /// Set the error handler.
    #[must_use]
    pub fn with_error<F>(mut self, on_error: F) -> Self
    where
        F: FnMut(&ConnectorError) + Send + 'static,
    {
        self.error = Some(Box::new(on_error));
        self
    }
}

impl std::fmt::Debug for Callbacks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Callbacks")
            .field("on_close", &self.close.is_some())
            .field("on_error", &self.error.is_some())
            .finish_non_exhaustive()
    }
}

impl StreamListener for Callbacks {
    fn on_fragment(&mut self, fragment: Fragment) -> Result<()> {
        (self.fragment)(fragment)
    }

    fn on_close(&mut self) {
        if let Some(close) = self.close.as_mut() {
            close();
        }
    }

    fn on_error(&mut self, error: &ConnectorError) {
        if let Some(on_error) = self.error.as_mut() {
            on_error(error);
        }
    }
}
