//! # mailpost-smtp
//!
//! SMTP client library (RFC 5321) for submitting prepared messages over an
//! authenticated connection.
//!
//! ## Features
//!
//! - **Type-state connection management**: Compile-time enforcement of valid
//!   SMTP state transitions
//! - **Session**: one authenticated connection reused across transactions,
//!   with deadlines and explicit invalidation after a failed transaction
//! - **TLS support**: Both implicit TLS (port 465) and STARTTLS
//! - **Extensions**: SIZE and 8BITMIME are honored when advertised
//! - **Observer hooks**: optional callbacks for each session stage
//!
//! ## Quick Start
//!
//! ```ignore
//! use mailpost_smtp::{Session, SessionConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), mailpost_smtp::SessionError> {
//!     let config = SessionConfig::new("smtp.example.com", 465)
//!         .credentials("user@example.com", "password");
//!
//!     let mut session = Session::open(config).await?;
//!     session
//!         .transmit("recipient@example.com", b"Subject: Test\r\n\r\nHello, World!\r\n")
//!         .await?;
//!     session.close().await
//! }
//! ```
//!
//! ## Connection States
//!
//! The client uses the type-state pattern to enforce valid SMTP operations:
//!
//! ```text
//! ┌──────────────┐
//! │  Connected   │ ─── auth_plain() ───→ Authenticated
//! └──────────────┘                            │
//!                                             └─── mail_from() ───→ MailTransaction
//!                                                  ───→ RecipientAdded ───→ Data
//!                                                  ─── send_message() ───→ Authenticated
//! ```
//!
//! ## Modules
//!
//! - [`command`]: SMTP command builders and DATA framing
//! - [`connection`]: Connection management and type-state client
//! - [`parser`]: Reply parser
//! - [`types`]: Core SMTP types (addresses, extensions, replies)

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod command;
mod config;
pub mod connection;
mod error;
mod observer;
pub mod parser;
mod session;
pub mod types;

pub use config::{Security, SessionConfig};
pub use connection::{
    Authenticated, Client, Connected, Data, MailTransaction, RecipientAdded, ServerInfo,
    SmtpConnection,
};
pub use error::{Error, Result, SessionError, Stage};
pub use observer::{
    CollectingObserver, LoggingObserver, NoopObserver, SessionEvent, SessionObserver,
};
pub use session::{Session, SessionStatus};
pub use types::{Address, AuthMechanism, Extension, Reply, ReplyCode, Severity};
