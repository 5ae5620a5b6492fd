//! Observer hooks for session lifecycle events.
//!
//! Logging is optional: a session created without an observer uses
//! [`NoopObserver`]. [`LoggingObserver`] forwards every event to `tracing`,
//! and [`CollectingObserver`] records events for inspection.
//!
//! # Example
//!
//! ```ignore
//! use mailpost_smtp::{Session, SessionConfig, SessionObserver};
//!
//! struct Counter(usize);
//!
//! impl SessionObserver for Counter {
//!     fn on_message_sent(&mut self, _bytes: usize) {
//!         self.0 += 1;
//!     }
//! }
//! ```

use crate::error::SessionError;
use crate::types::Address;
use std::sync::{Arc, Mutex, PoisonError};

/// Callbacks for each stage of a session.
///
/// All methods have empty default implementations.
pub trait SessionObserver: Send {
    /// Transport is established and the server greeted the client.
    fn on_connected(&mut self, host: &str, port: u16) {
        let _ = (host, port);
    }

    /// Credentials were accepted.
    fn on_authenticated(&mut self, username: &str) {
        let _ = username;
    }

    /// NOOP before a transaction succeeded.
    fn on_connection_checked(&mut self) {}

    /// `MAIL FROM` was accepted.
    fn on_sender_accepted(&mut self, from: &Address) {
        let _ = from;
    }

    /// `RCPT TO` was accepted.
    fn on_recipient_accepted(&mut self, to: &Address) {
        let _ = to;
    }

    /// The server accepted the message data.
    fn on_message_sent(&mut self, bytes: usize) {
        let _ = bytes;
    }

    /// The session was closed.
    fn on_closed(&mut self) {}

    /// An operation failed.
    fn on_failed(&mut self, error: &SessionError) {
        let _ = error;
    }
}

/// Observer that ignores every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl SessionObserver for NoopObserver {}

/// Observer that logs every event with `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingObserver;

impl SessionObserver for LoggingObserver {
    fn on_connected(&mut self, host: &str, port: u16) {
        tracing::info!(host, port, "Connected to SMTP server");
    }

    fn on_authenticated(&mut self, username: &str) {
        tracing::info!(username, "Authenticated");
    }

    fn on_connection_checked(&mut self) {
        tracing::debug!("Connection check passed");
    }

    fn on_sender_accepted(&mut self, from: &Address) {
        tracing::debug!(%from, "Sender accepted");
    }

    fn on_recipient_accepted(&mut self, to: &Address) {
        tracing::debug!(%to, "Recipient accepted");
    }

    fn on_message_sent(&mut self, bytes: usize) {
        tracing::info!(bytes, "Message accepted by server");
    }

    fn on_closed(&mut self) {
        tracing::info!("Session closed");
    }

    fn on_failed(&mut self, error: &SessionError) {
        tracing::warn!(%error, "Session operation failed");
    }
}

/// Event recorded by [`CollectingObserver`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// Connected to host and port.
    Connected(String, u16),
    /// Authenticated as username.
    Authenticated(String),
    /// NOOP succeeded.
    ConnectionChecked,
    /// Sender accepted.
    SenderAccepted(String),
    /// Recipient accepted.
    RecipientAccepted(String),
    /// Message of the given size accepted.
    MessageSent(usize),
    /// Session closed.
    Closed,
    /// Operation failed, with the error text.
    Failed(String),
}

/// Observer that records events into a shared list.
///
/// Clones share the same list, so one clone can be handed to the session
/// while another is kept for inspection.
#[derive(Debug, Default, Clone)]
pub struct CollectingObserver {
    events: Arc<Mutex<Vec<SessionEvent>>>,
}

impl CollectingObserver {
    /// Creates an empty collector.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of the recorded events.
    #[must_use]
    pub fn events(&self) -> Vec<SessionEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn push(&self, event: SessionEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }
}

impl SessionObserver for CollectingObserver {
    fn on_connected(&mut self, host: &str, port: u16) {
        self.push(SessionEvent::Connected(host.to_string(), port));
    }

    fn on_authenticated(&mut self, username: &str) {
        self.push(SessionEvent::Authenticated(username.to_string()));
    }

    fn on_connection_checked(&mut self) {
        self.push(SessionEvent::ConnectionChecked);
    }

    fn on_sender_accepted(&mut self, from: &Address) {
        self.push(SessionEvent::SenderAccepted(from.to_string()));
    }

    fn on_recipient_accepted(&mut self, to: &Address) {
        self.push(SessionEvent::RecipientAccepted(to.to_string()));
    }

    fn on_message_sent(&mut self, bytes: usize) {
        self.push(SessionEvent::MessageSent(bytes));
    }

    fn on_closed(&mut self) {
        self.push(SessionEvent::Closed);
    }

    fn on_failed(&mut self, error: &SessionError) {
        self.push(SessionEvent::Failed(error.to_string()));
    }
}
