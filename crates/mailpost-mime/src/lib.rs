//! # mailpost-mime
//!
//! MIME `multipart/mixed` generation and parsing for outgoing email.
//!
//! ## Features
//!
//! - **Attachment resolution**: file name and MIME type from a path, with a
//!   static extension table and an `application/octet-stream` fallback
//! - **Message building**: text body first, then attachments in order, each
//!   Base64-encoded while streaming from disk
//! - **Parsing**: split a multipart document back into its parts for
//!   verification or inspection
//! - **Encoding/Decoding**: Base64, Quoted-Printable, RFC 2047 header words
//!
//! ## Quick Start
//!
//! ```ignore
//! use mailpost_mime::{MessageBuilder, ParsedMessage};
//!
//! let raw = MessageBuilder::new()
//!     .from("sender@example.com")
//!     .to("recipient@example.com")
//!     .subject("Report")
//!     .text_body("Please find the report attached.")
//!     .attach("report.pdf")
//!     .build()?;
//!
//! let parsed = ParsedMessage::parse(&raw)?;
//! assert_eq!(parsed.parts.len(), 2);
//! ```
//!
//! Boundaries come from a caller-supplied random source when
//! [`MessageBuilder::build_with_rng`] is used, which keeps output
//! reproducible in tests.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod attachment;
mod builder;
mod content_type;
mod error;
mod header;
mod message;

pub mod encoding;

pub use attachment::{Attachment, DEFAULT_MIME_TYPE, mime_type_for_path, resolve};
pub use builder::{BOUNDARY_PREFIX, MessageBuilder, generate_boundary};
pub use content_type::ContentType;
pub use error::{Error, Result};
pub use header::Headers;
pub use message::{ParsedMessage, Part, TransferEncoding};
