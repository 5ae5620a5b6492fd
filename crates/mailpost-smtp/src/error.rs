//! Error types for SMTP operations.

use std::io;
use std::time::Duration;

use crate::types::{ReplyCode, Severity};

/// Result type alias for SMTP operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Wire-level SMTP error types.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// TLS error.
    #[error("TLS error: {0}")]
    Tls(#[from] rustls::Error),

    /// Server returned error response.
    #[error("SMTP error {code}: {message}")]
    SmtpError {
        /// Reply code (e.g., 550).
        code: u16,
        /// Error message from server.
        message: String,
    },

    /// Protocol error (unexpected response).
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Server closed the connection.
    #[error("Connection closed by server")]
    ConnectionClosed,

    /// Invalid email address.
    #[error("Invalid email address: {0}")]
    InvalidAddress(String),

    /// Feature not supported by server.
    #[error("Server does not support {0}")]
    NotSupported(String),
}

impl Error {
    /// Creates an SMTP error from a reply code and message.
    #[must_use]
    pub fn smtp_error(code: u16, message: impl Into<String>) -> Self {
        Self::SmtpError {
            code,
            message: message.into(),
        }
    }

    /// Severity of the server reply, if the error carries one.
    #[must_use]
    pub const fn severity(&self) -> Option<Severity> {
        match self {
            Self::SmtpError { code, .. } => Some(ReplyCode::new(*code).severity()),
            _ => None,
        }
    }

    /// Returns true if the server answered 5xx.
    #[must_use]
    pub const fn is_permanent(&self) -> bool {
        matches!(self.severity(), Some(Severity::Permanent))
    }

    /// Returns true if the server answered 4xx.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self.severity(), Some(Severity::Transient))
    }

    /// Returns true if the server answered with a reply code.
    ///
    /// Such errors leave the connection itself intact.
    #[must_use]
    pub const fn is_reply(&self) -> bool {
        matches!(self, Self::SmtpError { .. })
    }
}

/// Stage of an SMTP transaction, used to classify failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// TCP connect, TLS handshake, greeting, EHLO or STARTTLS.
    Connect,
    /// AUTH exchange.
    Auth,
    /// NOOP connectivity check.
    Check,
    /// MAIL FROM.
    MailFrom,
    /// RCPT TO.
    RcptTo,
    /// DATA command and message body.
    Data,
    /// QUIT.
    Quit,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Connect => "connect",
            Self::Auth => "AUTH",
            Self::Check => "NOOP",
            Self::MailFrom => "MAIL FROM",
            Self::RcptTo => "RCPT TO",
            Self::Data => "DATA",
            Self::Quit => "QUIT",
        };
        f.write_str(name)
    }
}

/// Session-level failure, classified by what went wrong.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Secure transport could not be established.
    #[error("Connection failed: {0}")]
    Connection(#[source] Error),

    /// Credentials were rejected.
    #[error("Authentication failed: {0}")]
    Auth(#[source] Error),

    /// Server rejected the sender or recipient address, or it was malformed.
    #[error("Address rejected at {stage}: {source}")]
    Recipient {
        /// Command that was rejected.
        stage: Stage,
        /// Underlying error.
        #[source]
        source: Error,
    },

    /// Connection-level failure during a transaction.
    #[error("Transport failure at {stage}: {source}")]
    Transport {
        /// Command that failed.
        stage: Stage,
        /// Underlying error.
        #[source]
        source: Error,
    },

    /// Operation did not complete within its deadline.
    #[error("{stage} timed out after {elapsed:?}")]
    Timeout {
        /// Stage that was running when the deadline passed.
        stage: Stage,
        /// Deadline that was exceeded.
        elapsed: Duration,
    },

    /// Message exceeds the size the server advertised.
    #[error("Message of {size} bytes exceeds server limit of {limit} bytes")]
    MessageTooLarge {
        /// Message size.
        size: usize,
        /// Server limit.
        limit: usize,
    },

    /// Terminating the session failed. The session is closed regardless.
    #[error("Failed to close session: {0}")]
    Close(#[source] Error),

    /// Session failed earlier or was closed and cannot be used.
    #[error("Session is not usable: {0}")]
    Unusable(&'static str),
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use super::*;

    #[test]
    fn reply_errors_carry_severity() {
        let busy = Error::smtp_error(451, "try again later");
        assert!(busy.is_transient());
        assert!(!busy.is_permanent());
        assert!(busy.is_reply());

        let closed = Error::ConnectionClosed;
        assert_eq!(closed.severity(), None);
        assert!(!closed.is_reply());
    }

    #[test]
    fn stage_names_match_commands() {
        assert_eq!(Stage::RcptTo.to_string(), "RCPT TO");
        assert_eq!(Stage::Check.to_string(), "NOOP");

        let err = SessionError::Timeout {
            stage: Stage::Data,
            elapsed: Duration::from_secs(60),
        };
        assert_eq!(err.to_string(), "DATA timed out after 60s");
    }
}
