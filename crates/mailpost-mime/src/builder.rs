//! Multipart message builder.
//!
//! Produces a `multipart/mixed` document with the text body as the first part
//! and one Base64 part per attachment, in the order they were added.

use crate::attachment::resolve;
use crate::content_type::ContentType;
use crate::encoding::encode_rfc2047;
use crate::error::{Error, Result};
use crate::header::Headers;
use crate::message::{Part, TransferEncoding};
use chrono::{DateTime, Utc};
use rand::Rng;
use rand::distributions::Alphanumeric;
use std::path::PathBuf;

/// Prefix of every generated boundary. `=_` never occurs in Base64 output.
pub const BOUNDARY_PREFIX: &str = "=_mailpost_";

/// Random characters appended to [`BOUNDARY_PREFIX`].
const BOUNDARY_RANDOM_LEN: usize = 32;

/// Generates a boundary token from the given random source.
#[must_use]
pub fn generate_boundary<R: Rng + ?Sized>(rng: &mut R) -> String {
    let token: String = (0..BOUNDARY_RANDOM_LEN)
        .map(|_| char::from(rng.sample(Alphanumeric)))
        .collect();
    format!("{BOUNDARY_PREFIX}{token}")
}

/// Builder for an outgoing multipart message.
///
/// Attachments are stored as paths and only opened during [`build`](Self::build),
/// one at a time.
#[derive(Debug, Clone, Default)]
pub struct MessageBuilder {
    from: Option<String>,
    to: Option<String>,
    subject: String,
    body: String,
    attachments: Vec<PathBuf>,
    date: Option<DateTime<Utc>>,
}

impl MessageBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the `From` address.
    #[must_use]
    pub fn from(mut self, from: impl Into<String>) -> Self {
        self.from = Some(from.into());
        self
    }

    /// Sets the `To` address.
    #[must_use]
    pub fn to(mut self, to: impl Into<String>) -> Self {
        self.to = Some(to.into());
        self
    }

    /// Sets the subject.
    #[must_use]
    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = subject.into();
        self
    }

    /// Sets the plain-text body.
    #[must_use]
    pub fn text_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    /// Appends an attachment path.
    #[must_use]
    pub fn attach(mut self, path: impl Into<PathBuf>) -> Self {
        self.attachments.push(path.into());
        self
    }

    /// Appends several attachment paths, keeping their order.
    #[must_use]
    pub fn attach_all<I, P>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.attachments.extend(paths.into_iter().map(Into::into));
        self
    }

    /// Fixes the `Date` header instead of using the current time.
    #[must_use]
    pub const fn date(mut self, date: DateTime<Utc>) -> Self {
        self.date = Some(date);
        self
    }

    /// Returns the attachment paths in order.
    #[must_use]
    pub fn attachment_paths(&self) -> &[PathBuf] {
        &self.attachments
    }

    /// Builds the message using a thread-local random source for the boundary.
    ///
    /// # Errors
    ///
    /// See [`build_with_rng`](Self::build_with_rng).
    pub fn build(&self) -> Result<Vec<u8>> {
        self.build_with_rng(&mut rand::thread_rng())
    }

    /// Builds the message, drawing the boundary from `rng`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingHeader`] if `From` or `To` is unset,
    /// [`Error::AttachmentNotFound`] if an attachment cannot be opened, and
    /// [`Error::AttachmentEncoding`] if one cannot be read to the end. No
    /// partial output is returned.
    pub fn build_with_rng<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<Vec<u8>> {
        let from = self
            .from
            .as_deref()
            .ok_or_else(|| Error::MissingHeader("From".to_string()))?;
        let to = self
            .to
            .as_deref()
            .ok_or_else(|| Error::MissingHeader("To".to_string()))?;

        let boundary = generate_boundary(rng);

        let mut parts = Vec::with_capacity(self.attachments.len() + 1);
        parts.push(self.text_part());
        for path in &self.attachments {
            parts.push(resolve(path)?.into_part()?);
        }

        let date = self.date.unwrap_or_else(Utc::now);
        let mut headers = Headers::new();
        headers.add("From", single_line(from));
        headers.add("To", single_line(to));
        headers.add("Subject", encode_rfc2047(&self.subject, "utf-8"));
        headers.add("Date", date.to_rfc2822());
        headers.add("MIME-Version", "1.0");
        headers.add(
            "Content-Type",
            ContentType::multipart_mixed(boundary.as_str()).to_string(),
        );

        let mut out = Vec::with_capacity(
            parts.iter().map(|p| p.body.len() + 256).sum::<usize>() + 512,
        );
        out.extend_from_slice(headers.to_string().as_bytes());
        out.extend_from_slice(b"\r\n");

        for part in &parts {
            out.extend_from_slice(b"--");
            out.extend_from_slice(boundary.as_bytes());
            out.extend_from_slice(b"\r\n");
            out.extend_from_slice(part.headers.to_string().as_bytes());
            out.extend_from_slice(b"\r\n");
            out.extend_from_slice(&part.body);
            out.extend_from_slice(b"\r\n");
        }

        out.extend_from_slice(b"--");
        out.extend_from_slice(boundary.as_bytes());
        out.extend_from_slice(b"--\r\n");

        tracing::debug!(
            parts = parts.len(),
            bytes = out.len(),
            "Built multipart message"
        );

        Ok(out)
    }

    fn text_part(&self) -> Part {
        let mut headers = Headers::new();
        headers.add("Content-Type", ContentType::text_plain().to_string());
        headers.add(
            "Content-Transfer-Encoding",
            TransferEncoding::SevenBit.to_string(),
        );
        Part::new(headers, self.body.clone().into_bytes())
    }
}

/// Replaces line breaks so a value cannot start a new header.
fn single_line(value: &str) -> String {
    value.replace(['\r', '\n'], " ")
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;
    use crate::message::ParsedMessage;
    use chrono::TimeZone;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn fixed_date() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 15, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_boundary_shape() {
        let mut rng = StdRng::seed_from_u64(7);
        let boundary = generate_boundary(&mut rng);
        assert!(boundary.starts_with(BOUNDARY_PREFIX));
        assert_eq!(boundary.len(), BOUNDARY_PREFIX.len() + BOUNDARY_RANDOM_LEN);
        assert_ne!(boundary, generate_boundary(&mut rng));
    }

    #[test]
    fn test_build_is_deterministic_with_seeded_rng() {
        let builder = MessageBuilder::new()
            .from("me@example.com")
            .to("a@b.com")
            .subject("Hi")
            .text_body("Hello")
            .date(fixed_date());

        let first = builder.build_with_rng(&mut StdRng::seed_from_u64(1)).unwrap();
        let second = builder.build_with_rng(&mut StdRng::seed_from_u64(1)).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_build_header_order_and_layout() {
        let mut rng = StdRng::seed_from_u64(42);
        let boundary = generate_boundary(&mut StdRng::seed_from_u64(42));
        let raw = MessageBuilder::new()
            .from("me@example.com")
            .to("a@b.com")
            .subject("Hi")
            .text_body("Hello")
            .date(fixed_date())
            .build_with_rng(&mut rng)
            .unwrap();

        let expected = format!(
            "From: me@example.com\r\n\
             To: a@b.com\r\n\
             Subject: Hi\r\n\
             Date: Fri, 15 Mar 2024 12:00:00 +0000\r\n\
             MIME-Version: 1.0\r\n\
             Content-Type: multipart/mixed; boundary=\"{boundary}\"\r\n\
             \r\n\
             --{boundary}\r\n\
             Content-Type: text/plain; charset=UTF-8\r\n\
             Content-Transfer-Encoding: 7bit\r\n\
             \r\n\
             Hello\r\n\
             --{boundary}--\r\n"
        );
        assert_eq!(String::from_utf8(raw).unwrap(), expected);
    }

    #[test]
    fn test_zero_attachments_has_no_disposition() {
        let raw = MessageBuilder::new()
            .from("me@example.com")
            .to("a@b.com")
            .text_body("Hello")
            .build()
            .unwrap();

        let parsed = ParsedMessage::parse(&raw).unwrap();
        assert_eq!(parsed.parts.len(), 1);
        assert!(!String::from_utf8_lossy(&raw).contains("Content-Disposition"));
    }

    #[test]
    fn test_missing_attachment_fails() {
        let err = MessageBuilder::new()
            .from("me@example.com")
            .to("a@b.com")
            .attach("/no/such/file.txt")
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::AttachmentNotFound { .. }));
    }

    #[test]
    fn test_missing_recipient_fails() {
        let err = MessageBuilder::new().from("me@example.com").build().unwrap_err();
        assert!(matches!(err, Error::MissingHeader(h) if h == "To"));
    }

    #[test]
    fn test_non_ascii_subject_is_encoded() {
        let raw = MessageBuilder::new()
            .from("me@example.com")
            .to("a@b.com")
            .subject("Привет")
            .build()
            .unwrap();

        let text = String::from_utf8(raw.clone()).unwrap();
        assert!(text.contains("Subject: =?utf-8?B?"));
        assert_eq!(
            ParsedMessage::parse(&raw).unwrap().subject().as_deref(),
            Some("Привет")
        );
    }

    #[test]
    fn test_long_subject_is_folded() {
        let subject = "Ежемесячный отчёт: продажи, расходы и планы на следующий квартал";
        let raw = MessageBuilder::new()
            .from("me@example.com")
            .to("a@b.com")
            .subject(subject)
            .build()
            .unwrap();

        let text = String::from_utf8(raw.clone()).unwrap();
        assert!(text.contains("?=\r\n =?utf-8?B?"));
        assert_eq!(
            ParsedMessage::parse(&raw).unwrap().subject().as_deref(),
            Some(subject)
        );
    }

    #[test]
    fn test_header_values_cannot_inject_lines() {
        let raw = MessageBuilder::new()
            .from("me@example.com")
            .to("a@b.com\r\nBcc: evil@example.com")
            .build()
            .unwrap();
        let parsed = ParsedMessage::parse(&raw).unwrap();
        assert!(parsed.headers.get("Bcc").is_none());
    }
}
