//! Error types for the sender.

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use mailpost_smtp::{SessionError, Stage};

/// Errors returned by [`Sender`](crate::Sender) operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Secure transport could not be established.
    #[error("Connection failed: {0}")]
    Connection(#[source] mailpost_smtp::Error),

    /// Credentials were rejected.
    #[error("Authentication failed: {0}")]
    Auth(#[source] mailpost_smtp::Error),

    /// An attachment path could not be opened.
    #[error("Attachment not found: {}", path.display())]
    AttachmentNotFound {
        /// Path that was requested.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// An attachment could not be read to the end.
    #[error("Failed to encode attachment {}", path.display())]
    AttachmentEncoding {
        /// Path of the attachment.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// The message could not be built for another reason.
    #[error("Invalid message: {0}")]
    Message(#[source] mailpost_mime::Error),

    /// The background task building the message did not complete.
    #[error("Message build task failed: {0}")]
    BuildTask(#[from] tokio::task::JoinError),

    /// Sender or recipient address was malformed or rejected by the server.
    #[error("Address rejected at {stage}: {source}")]
    Recipient {
        /// Command that was rejected.
        stage: Stage,
        /// Underlying error.
        #[source]
        source: mailpost_smtp::Error,
    },

    /// Connection-level failure during transmission.
    #[error("Transport failure at {stage}: {source}")]
    Transport {
        /// Command that failed.
        stage: Stage,
        /// Underlying error.
        #[source]
        source: mailpost_smtp::Error,
    },

    /// Operation did not finish within its deadline.
    #[error("{stage} timed out after {elapsed:?}")]
    Timeout {
        /// Stage that was running.
        stage: Stage,
        /// Deadline that was exceeded.
        elapsed: Duration,
    },

    /// Message exceeds the server's size limit.
    #[error("Message of {size} bytes exceeds server limit of {limit} bytes")]
    MessageTooLarge {
        /// Message size.
        size: usize,
        /// Server limit.
        limit: usize,
    },

    /// Terminating the session failed. The session is closed regardless.
    #[error("Failed to close session: {0}")]
    Close(#[source] mailpost_smtp::Error),

    /// The session failed earlier or was closed; open a new sender.
    #[error("Session is not usable: {0}")]
    SessionUnusable(&'static str),

    /// Configuration is missing or invalid.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Returns true if the error happened while building the message,
    /// before any SMTP command was sent.
    #[must_use]
    pub const fn is_build_error(&self) -> bool {
        matches!(
            self,
            Self::AttachmentNotFound { .. }
                | Self::AttachmentEncoding { .. }
                | Self::Message(_)
                | Self::BuildTask(_)
        )
    }

    /// Returns true if the sender can no longer be used after this error.
    #[must_use]
    pub const fn invalidates_session(&self) -> bool {
        match self {
            Self::Recipient { source, .. } => source.is_reply(),
            Self::Connection(_)
            | Self::Auth(_)
            | Self::Transport { .. }
            | Self::Timeout { .. }
            | Self::Close(_)
            | Self::SessionUnusable(_) => true,
            _ => false,
        }
    }
}

impl From<mailpost_mime::Error> for Error {
    fn from(err: mailpost_mime::Error) -> Self {
        match err {
            mailpost_mime::Error::AttachmentNotFound { path, source } => {
                Self::AttachmentNotFound { path, source }
            }
            mailpost_mime::Error::AttachmentEncoding { path, source } => {
                Self::AttachmentEncoding { path, source }
            }
            other => Self::Message(other),
        }
    }
}

impl From<SessionError> for Error {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::Connection(source) => Self::Connection(source),
            SessionError::Auth(source) => Self::Auth(source),
            SessionError::Recipient { stage, source } => Self::Recipient { stage, source },
            SessionError::Transport { stage, source } => Self::Transport { stage, source },
            SessionError::Timeout { stage, elapsed } => Self::Timeout { stage, elapsed },
            SessionError::MessageTooLarge { size, limit } => Self::MessageTooLarge { size, limit },
            SessionError::Close(source) => Self::Close(source),
            SessionError::Unusable(reason) => Self::SessionUnusable(reason),
        }
    }
}

/// Result type alias using the sender's [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use super::*;

    #[test]
    fn test_attachment_errors_keep_their_kind() {
        let err: Error = mailpost_mime::Error::AttachmentNotFound {
            path: PathBuf::from("missing.pdf"),
            source: io::Error::from(io::ErrorKind::NotFound),
        }
        .into();
        assert!(matches!(err, Error::AttachmentNotFound { .. }));
        assert!(err.is_build_error());
        assert!(!err.invalidates_session());
        assert_eq!(err.to_string(), "Attachment not found: missing.pdf");

        let err: Error = mailpost_mime::Error::MissingHeader("To".into()).into();
        assert!(matches!(err, Error::Message(_)));
        assert!(err.is_build_error());
    }

    #[test]
    fn test_session_errors_map_one_to_one() {
        let err: Error = SessionError::Recipient {
            stage: Stage::RcptTo,
            source: mailpost_smtp::Error::smtp_error(550, "unknown user"),
        }
        .into();
        assert!(matches!(err, Error::Recipient { stage: Stage::RcptTo, .. }));
        assert!(err.invalidates_session());

        let err: Error = SessionError::Recipient {
            stage: Stage::RcptTo,
            source: mailpost_smtp::Error::InvalidAddress("bad".into()),
        }
        .into();
        assert!(!err.invalidates_session());

        let err: Error = SessionError::Unusable("session is closed").into();
        assert!(matches!(err, Error::SessionUnusable(_)));
        assert!(!err.is_build_error());

        let err: Error = SessionError::MessageTooLarge { size: 10, limit: 5 }.into();
        assert!(!err.invalidates_session());
    }
}
