//! Error types for MIME operations.

use std::io;
use std::path::PathBuf;
use std::string::FromUtf8Error;

/// Result type alias for MIME operations.
pub type Result<T> = std::result::Result<T, Error>;

/// MIME error types.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Attachment path could not be opened for reading.
    #[error("Attachment not found: {}: {source}", path.display())]
    AttachmentNotFound {
        /// Path supplied by the caller.
        path: PathBuf,
        /// Underlying open error.
        source: io::Error,
    },

    /// Attachment could not be read to completion while encoding.
    #[error("Failed to encode attachment {}: {source}", path.display())]
    AttachmentEncoding {
        /// Path supplied by the caller.
        path: PathBuf,
        /// Underlying read error.
        source: io::Error,
    },

    /// Invalid content type.
    #[error("Invalid content type: {0}")]
    InvalidContentType(String),

    /// Invalid encoding.
    #[error("Invalid encoding: {0}")]
    InvalidEncoding(String),

    /// Base64 decode error.
    #[error("Base64 decode error: {0}")]
    Base64Decode(#[from] base64::DecodeError),

    /// UTF-8 decode error.
    #[error("UTF-8 decode error: {0}")]
    Utf8Decode(#[from] FromUtf8Error),

    /// Missing boundary in multipart message.
    #[error("Missing boundary in multipart message")]
    MissingBoundary,

    /// Invalid multipart structure.
    #[error("Invalid multipart structure: {0}")]
    InvalidMultipart(String),

    /// Missing required header.
    #[error("Missing required header: {0}")]
    MissingHeader(String),

    /// Parse error.
    #[error("Parse error: {0}")]
    Parse(String),
}

impl Error {
    /// Returns true if the error comes from a local attachment file.
    #[must_use]
    pub const fn is_attachment_error(&self) -> bool {
        matches!(
            self,
            Self::AttachmentNotFound { .. } | Self::AttachmentEncoding { .. }
        )
    }
}
