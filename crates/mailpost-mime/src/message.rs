//! MIME message structure and parsing.

use crate::content_type::ContentType;
use crate::encoding::{decode_base64, decode_quoted_printable, decode_rfc2047};
use crate::error::{Error, Result};
use crate::header::Headers;
use std::fmt;

/// Transfer encoding types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferEncoding {
    /// 7-bit ASCII.
    SevenBit,
    /// 8-bit binary.
    EightBit,
    /// Base64 encoding.
    Base64,
    /// Quoted-Printable encoding.
    QuotedPrintable,
    /// Binary (no encoding).
    Binary,
}

impl TransferEncoding {
    /// Parses transfer encoding from string.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "8bit" => Self::EightBit,
            "base64" => Self::Base64,
            "quoted-printable" => Self::QuotedPrintable,
            "binary" => Self::Binary,
            _ => Self::SevenBit,
        }
    }
}

impl fmt::Display for TransferEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SevenBit => write!(f, "7bit"),
            Self::EightBit => write!(f, "8bit"),
            Self::Base64 => write!(f, "base64"),
            Self::QuotedPrintable => write!(f, "quoted-printable"),
            Self::Binary => write!(f, "binary"),
        }
    }
}

/// MIME message part: ordered headers plus a payload in its transfer encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Part {
    /// Part headers.
    pub headers: Headers,
    /// Part body as it appears on the wire.
    pub body: Vec<u8>,
}

impl Part {
    /// Creates a new part.
    #[must_use]
    pub const fn new(headers: Headers, body: Vec<u8>) -> Self {
        Self { headers, body }
    }

    /// Gets the content type, defaulting to `text/plain`.
    ///
    /// # Errors
    ///
    /// Returns an error if content type header is invalid.
    pub fn content_type(&self) -> Result<ContentType> {
        self.headers
            .get("content-type")
            .map_or_else(|| Ok(ContentType::text_plain()), ContentType::parse)
    }

    /// Gets the transfer encoding.
    #[must_use]
    pub fn transfer_encoding(&self) -> TransferEncoding {
        self.headers
            .get("content-transfer-encoding")
            .map_or(TransferEncoding::SevenBit, TransferEncoding::parse)
    }

    /// Returns true if the part is marked as an attachment.
    #[must_use]
    pub fn is_attachment(&self) -> bool {
        self.headers
            .get("content-disposition")
            .is_some_and(|d| d.trim_start().to_lowercase().starts_with("attachment"))
    }

    /// Returns the attachment file name.
    ///
    /// Taken from the `filename` parameter of `Content-Disposition`, or the
    /// `name` parameter of `Content-Type`.
    #[must_use]
    pub fn filename(&self) -> Option<String> {
        let from_disposition = self.headers.get("content-disposition").and_then(|d| {
            ContentType::parse(&format!("x/x; {d}"))
                .ok()
                .and_then(|ct| ct.parameter("filename").map(str::to_string))
        });

        from_disposition.or_else(|| {
            self.content_type()
                .ok()
                .and_then(|ct| ct.parameter("name").map(str::to_string))
        })
    }

    /// Decodes the body according to the transfer encoding.
    ///
    /// # Errors
    ///
    /// Returns an error if decoding fails.
    pub fn decode_body(&self) -> Result<Vec<u8>> {
        decode_payload(&self.body, self.transfer_encoding())
    }

    /// Gets the decoded body as a string.
    ///
    /// # Errors
    ///
    /// Returns an error if decoding or UTF-8 conversion fails.
    pub fn body_text(&self) -> Result<String> {
        String::from_utf8(self.decode_body()?).map_err(Into::into)
    }

    /// Parses a part from its raw bytes (headers, blank line, body).
    #[must_use]
    pub fn parse(raw: &[u8]) -> Self {
        let (header_bytes, body) = split_header_body(raw);
        let headers = Headers::parse(&String::from_utf8_lossy(header_bytes));
        Self::new(headers, body.to_vec())
    }
}

/// A parsed MIME message.
#[derive(Debug, Clone)]
pub struct ParsedMessage {
    /// Message headers.
    pub headers: Headers,
    /// Message parts (empty for single-part messages).
    pub parts: Vec<Part>,
    /// Body for single-part messages.
    pub body: Option<Vec<u8>>,
}

impl ParsedMessage {
    /// Parses a raw message.
    ///
    /// Multipart bodies are split on their boundary; nested multiparts are
    /// kept as opaque parts.
    ///
    /// # Errors
    ///
    /// Returns an error if the content type is invalid, the boundary is
    /// missing, or the multipart structure is not terminated.
    pub fn parse(raw: &[u8]) -> Result<Self> {
        let (header_bytes, body) = split_header_body(raw);
        let headers = Headers::parse(&String::from_utf8_lossy(header_bytes));

        let content_type = headers
            .get("content-type")
            .map(ContentType::parse)
            .transpose()?;

        match content_type {
            Some(ct) if ct.is_multipart() => {
                let boundary = ct.boundary().ok_or(Error::MissingBoundary)?;
                let parts = split_multipart(body, boundary)?
                    .into_iter()
                    .map(Part::parse)
                    .collect();
                Ok(Self {
                    headers,
                    parts,
                    body: None,
                })
            }
            _ => Ok(Self {
                headers,
                parts: Vec::new(),
                body: Some(body.to_vec()),
            }),
        }
    }

    /// Gets the content type, defaulting to `text/plain`.
    ///
    /// # Errors
    ///
    /// Returns an error if content type header is invalid.
    pub fn content_type(&self) -> Result<ContentType> {
        self.headers
            .get("content-type")
            .map_or_else(|| Ok(ContentType::text_plain()), ContentType::parse)
    }

    /// Gets the From header.
    #[must_use]
    pub fn from(&self) -> Option<&str> {
        self.headers.get("from")
    }

    /// Gets the To header.
    #[must_use]
    pub fn to(&self) -> Option<&str> {
        self.headers.get("to")
    }

    /// Gets the Subject header, decoding RFC 2047 encoded words.
    #[must_use]
    pub fn subject(&self) -> Option<String> {
        self.headers
            .get("subject")
            .map(|s| decode_rfc2047(s).unwrap_or_else(|_| s.to_string()))
    }

    /// Gets the Date header.
    #[must_use]
    pub fn date(&self) -> Option<&str> {
        self.headers.get("date")
    }

    /// Finds the first text/plain part and returns its decoded text.
    ///
    /// For single-part messages the body itself is decoded.
    ///
    /// # Errors
    ///
    /// Returns an error if no text part is found or decoding fails.
    pub fn text_body(&self) -> Result<String> {
        if let Some(body) = &self.body {
            let encoding = self
                .headers
                .get("content-transfer-encoding")
                .map_or(TransferEncoding::SevenBit, TransferEncoding::parse);
            return String::from_utf8(decode_payload(body, encoding)?).map_err(Into::into);
        }

        for part in &self.parts {
            let ct = part.content_type()?;
            if ct.essence() == "text/plain" && !part.is_attachment() {
                return part.body_text();
            }
        }

        Err(Error::Parse("No text/plain part found".to_string()))
    }

    /// Returns the parts marked as attachments, in document order.
    pub fn attachments(&self) -> impl Iterator<Item = &Part> {
        self.parts.iter().filter(|p| p.is_attachment())
    }
}

fn decode_payload(body: &[u8], encoding: TransferEncoding) -> Result<Vec<u8>> {
    match encoding {
        TransferEncoding::Base64 => decode_base64(&String::from_utf8_lossy(body)),
        TransferEncoding::QuotedPrintable => {
            decode_quoted_printable(&String::from_utf8_lossy(body))
        }
        _ => Ok(body.to_vec()),
    }
}

/// Splits raw bytes at the first blank line into header block and body.
fn split_header_body(raw: &[u8]) -> (&[u8], &[u8]) {
    if raw.starts_with(b"\r\n") {
        return (&[][..], &raw[2..]);
    }
    if raw.starts_with(b"\n") {
        return (&[][..], &raw[1..]);
    }

    let crlf = find(raw, b"\r\n\r\n", 0).map(|i| (i, i + 4));
    let lf = find(raw, b"\n\n", 0).map(|i| (i, i + 2));

    let split = match (crlf, lf) {
        (Some(a), Some(b)) => Some(if a.0 <= b.0 { a } else { b }),
        (a, b) => a.or(b),
    };

    split.map_or((raw, &[][..]), |(head_end, body_start)| {
        (&raw[..head_end], &raw[body_start..])
    })
}

/// Splits a multipart body into the raw bytes of each part.
fn split_multipart<'a>(body: &'a [u8], boundary: &str) -> Result<Vec<&'a [u8]>> {
    let delimiter = format!("--{boundary}");
    let delimiter = delimiter.as_bytes();

    let mut pos = find_delimiter(body, delimiter, 0).ok_or_else(|| {
        Error::InvalidMultipart("No boundary delimiter in body".to_string())
    })?;
    let mut parts = Vec::new();

    loop {
        let after = pos + delimiter.len();
        if body[after..].starts_with(b"--") {
            break;
        }

        let content_start = find(body, b"\n", after)
            .map(|i| i + 1)
            .ok_or_else(|| Error::InvalidMultipart("Truncated delimiter line".to_string()))?;

        let next = find_delimiter(body, delimiter, content_start).ok_or_else(|| {
            Error::InvalidMultipart("Missing closing delimiter".to_string())
        })?;

        // The line break before a delimiter belongs to the delimiter.
        let mut end = next;
        if end > content_start && body[end - 1] == b'\n' {
            end -= 1;
            if end > content_start && body[end - 1] == b'\r' {
                end -= 1;
            }
        }

        parts.push(&body[content_start..end]);
        pos = next;
    }

    Ok(parts)
}

/// Finds a delimiter that starts a line.
fn find_delimiter(body: &[u8], delimiter: &[u8], from: usize) -> Option<usize> {
    let mut start = from;
    while let Some(i) = find(body, delimiter, start) {
        if i == 0 || body[i - 1] == b'\n' {
            return Some(i);
        }
        start = i + 1;
    }
    None
}

fn find(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    if from > haystack.len() || needle.is_empty() {
        return None;
    }
    haystack[from..]
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|i| i + from)
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

    const MULTIPART: &[u8] = b"From: a@example.com\r\n\
To: b@example.com\r\n\
Subject: =?utf-8?B?SMOpbGxv?=\r\n\
MIME-Version: 1.0\r\n\
Content-Type: multipart/mixed; boundary=\"XYZ\"\r\n\
\r\n\
--XYZ\r\n\
Content-Type: text/plain; charset=UTF-8\r\n\
Content-Transfer-Encoding: 7bit\r\n\
\r\n\
Body text\r\n\
--XYZ\r\n\
Content-Disposition: attachment; filename=\"a.bin\"\r\n\
Content-Type: application/octet-stream; name=\"a.bin\"\r\n\
Content-Transfer-Encoding: base64\r\n\
\r\n\
AAEC\r\n\
--XYZ--\r\n";

    #[test]
    fn test_transfer_encoding_parse() {
        assert_eq!(TransferEncoding::parse("7bit"), TransferEncoding::SevenBit);
        assert_eq!(TransferEncoding::parse(" BASE64 "), TransferEncoding::Base64);
        assert_eq!(
            TransferEncoding::parse("quoted-printable"),
            TransferEncoding::QuotedPrintable
        );
        assert_eq!(TransferEncoding::Base64.to_string(), "base64");
    }

    #[test]
    fn test_parse_multipart() {
        let message = ParsedMessage::parse(MULTIPART).unwrap();
        assert_eq!(message.from(), Some("a@example.com"));
        assert_eq!(message.to(), Some("b@example.com"));
        assert_eq!(message.subject().as_deref(), Some("Héllo"));
        assert_eq!(message.parts.len(), 2);
        assert_eq!(message.text_body().unwrap(), "Body text");

        let attachments: Vec<&Part> = message.attachments().collect();
        assert_eq!(attachments.len(), 1);
        assert_eq!(attachments[0].filename().as_deref(), Some("a.bin"));
        assert_eq!(attachments[0].decode_body().unwrap(), vec![0, 1, 2]);
    }

    #[test]
    fn test_parse_single_part() {
        let raw = b"Subject: Plain\r\nContent-Type: text/plain\r\n\r\nJust text";
        let message = ParsedMessage::parse(raw).unwrap();
        assert!(message.parts.is_empty());
        assert_eq!(message.text_body().unwrap(), "Just text");
    }

    #[test]
    fn test_parse_missing_boundary_parameter() {
        let raw = b"Content-Type: multipart/mixed\r\n\r\n--x\r\n\r\nbody\r\n--x--\r\n";
        assert!(matches!(
            ParsedMessage::parse(raw),
            Err(Error::MissingBoundary)
        ));
    }

    #[test]
    fn test_parse_unterminated_multipart() {
        let raw = b"Content-Type: multipart/mixed; boundary=x\r\n\r\n--x\r\n\r\nbody\r\n";
        assert!(matches!(
            ParsedMessage::parse(raw),
            Err(Error::InvalidMultipart(_))
        ));
    }

    #[test]
    fn test_delimiter_must_start_line() {
        let raw = b"Content-Type: multipart/mixed; boundary=x\r\n\r\n--x\r\n\r\nnot --x here\r\n--x--\r\n";
        let message = ParsedMessage::parse(raw).unwrap();
        assert_eq!(message.parts.len(), 1);
        assert_eq!(message.parts[0].body, b"not --x here");
    }

    #[test]
    fn test_part_filename_falls_back_to_name() {
        let mut headers = Headers::new();
        headers.add("Content-Type", "image/png; name=\"pic.png\"");
        let part = Part::new(headers, Vec::new());
        assert_eq!(part.filename().as_deref(), Some("pic.png"));
        assert!(!part.is_attachment());
    }
}
