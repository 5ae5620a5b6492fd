//! # mailpost
//!
//! Send plain-text email with file attachments over one authenticated SMTP
//! session.
//!
//! The [`Sender`] trait is the whole public contract: `send` builds a
//! `multipart/mixed` message with [`mailpost_mime`] and transmits it with
//! [`mailpost_smtp`], `close` ends the session. [`SmtpSender`] keeps its
//! session between sends and serializes concurrent callers.
//!
//! ## Quick Start
//!
//! ```ignore
//! use mailpost::{Sender, SmtpConfig, SmtpSender};
//!
//! let config = SmtpConfig::from_env()?;
//! let sender = SmtpSender::connect(&config).await?;
//!
//! sender
//!     .send("a@b.com", "Report", "See attached.", &["report.pdf".into()])
//!     .await?;
//! sender.close().await?;
//! ```
//!
//! ## Failures
//!
//! Attachment problems are reported before any SMTP command is sent
//! ([`Error::is_build_error`]). After a failed transaction the session is not
//! reused; every later call returns [`Error::SessionUnusable`] and the caller
//! opens a new sender.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod config;
mod error;
mod sender;

pub use config::{Security, SmtpConfig, SmtpConfigBuilder};
pub use error::{Error, Result};
pub use mailpost_smtp::{
    CollectingObserver, LoggingObserver, NoopObserver, SessionEvent, SessionObserver,
    SessionStatus, Stage,
};
pub use sender::{Sender, SmtpSender};
