//! MIME encoding and decoding utilities.
//!
//! Supports Base64 (whole-buffer and streaming, line-wrapped per RFC 2045),
//! Quoted-Printable decoding, and RFC 2047 header encoding.

use crate::error::{Error, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use std::io::{self, Read, Write};

/// Maximum length of an encoded Base64 line, excluding CRLF.
pub const BASE64_LINE_LENGTH: usize = 76;

/// Number of input bytes that encode to exactly one full Base64 line.
const BASE64_LINE_INPUT: usize = BASE64_LINE_LENGTH / 4 * 3;

/// Lines encoded per read from a streaming source.
const LINES_PER_CHUNK: usize = 64;

/// Encodes data as Base64 on a single line.
#[must_use]
pub fn encode_base64(data: &[u8]) -> String {
    STANDARD.encode(data)
}

/// Encodes data as Base64 wrapped into CRLF-separated 76-character lines.
///
/// The result has no trailing line break.
#[must_use]
pub fn encode_base64_lines(data: &[u8]) -> String {
    let mut out = Vec::with_capacity(data.len() * 4 / 3 + data.len() / BASE64_LINE_INPUT * 2 + 4);
    let mut first_line = true;
    // Writing into a Vec cannot fail.
    let _ = write_base64_lines(data, &mut out, &mut first_line);
    String::from_utf8_lossy(&out).into_owned()
}

/// Streams `reader` to `out` as wrapped Base64, returning the number of input
/// bytes consumed.
///
/// Input is buffered in multiples of one line's worth of bytes, so only the
/// final line may be short or padded. No trailing line break is written.
///
/// # Errors
///
/// Returns the first read or write error; `Interrupted` reads are retried.
pub fn encode_base64_stream<R: Read, W: Write>(mut reader: R, out: &mut W) -> io::Result<u64> {
    let mut buf = vec![0u8; BASE64_LINE_INPUT * LINES_PER_CHUNK];
    let mut filled = 0;
    let mut total = 0u64;
    let mut first_line = true;

    loop {
        let n = match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        filled += n;
        total += n as u64;

        if filled == buf.len() {
            write_base64_lines(&buf, out, &mut first_line)?;
            filled = 0;
        }
    }

    if filled > 0 {
        write_base64_lines(&buf[..filled], out, &mut first_line)?;
    }

    Ok(total)
}

fn write_base64_lines<W: Write>(data: &[u8], out: &mut W, first_line: &mut bool) -> io::Result<()> {
    for chunk in data.chunks(BASE64_LINE_INPUT) {
        if !*first_line {
            out.write_all(b"\r\n")?;
        }
        *first_line = false;
        out.write_all(STANDARD.encode(chunk).as_bytes())?;
    }
    Ok(())
}

/// Decodes Base64 data, ignoring embedded whitespace and line breaks.
///
/// # Errors
///
/// Returns an error if the input is not valid Base64.
pub fn decode_base64(data: &str) -> Result<Vec<u8>> {
    let cleaned: String = data.chars().filter(|c| !c.is_whitespace()).collect();
    STANDARD.decode(cleaned).map_err(Into::into)
}

/// Decodes Quoted-Printable text (RFC 2045).
///
/// # Errors
///
/// Returns an error if the input contains invalid escape sequences.
pub fn decode_quoted_printable(text: &str) -> Result<Vec<u8>> {
    let bytes = text.as_bytes();
    let mut result = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] != b'=' {
            result.push(bytes[i]);
            i += 1;
            continue;
        }

        // Soft line break
        match bytes.get(i + 1..) {
            Some([b'\r', b'\n', ..]) => {
                i += 3;
                continue;
            }
            Some([b'\n', ..]) => {
                i += 2;
                continue;
            }
            _ => {}
        }

        let hex = bytes
            .get(i + 1..i + 3)
            .ok_or_else(|| Error::InvalidEncoding("Incomplete escape sequence".to_string()))?;
        let hex = std::str::from_utf8(hex)
            .map_err(|_| Error::InvalidEncoding("Non-ASCII escape sequence".to_string()))?;
        let byte = u8::from_str_radix(hex, 16)
            .map_err(|e| Error::InvalidEncoding(format!("Invalid hex: {e}")))?;
        result.push(byte);
        i += 3;
    }

    Ok(result)
}

/// Longest encoded-word RFC 2047 allows, delimiters included.
const MAX_ENCODED_WORD: usize = 75;

/// Encodes a header value using RFC 2047 encoding when it is not plain ASCII.
///
/// Format: `=?charset?B?encoded-text?=`. Long values are split on character
/// boundaries into several encoded-words of at most 75 characters, folded
/// onto continuation lines.
#[must_use]
pub fn encode_rfc2047(text: &str, charset: &str) -> String {
    if text
        .chars()
        .all(|c| c.is_ascii() && !c.is_ascii_control() && c != '=' && c != '?')
    {
        return text.to_string();
    }

    // `=?` + charset + `?B?` + `?=`
    let overhead = charset.len() + 7;
    let chunk_limit = MAX_ENCODED_WORD.saturating_sub(overhead) / 4 * 3;

    let mut chunks = Vec::new();
    let mut start = 0;
    for (index, c) in text.char_indices() {
        if index > start && index + c.len_utf8() - start > chunk_limit {
            chunks.push(&text[start..index]);
            start = index;
        }
    }
    chunks.push(&text[start..]);

    chunks
        .into_iter()
        .map(|chunk| format!("=?{charset}?B?{}?=", encode_base64(chunk.as_bytes())))
        .collect::<Vec<_>>()
        .join("\r\n ")
}

/// Decodes an RFC 2047 encoded header value.
///
/// Adjacent encoded-words are joined without the whitespace between them.
/// Values without encoded-words are returned as-is.
///
/// # Errors
///
/// Returns an error if an encoded word is malformed.
pub fn decode_rfc2047(text: &str) -> Result<String> {
    if !text.contains("=?") {
        return Ok(text.to_string());
    }

    let mut decoded = String::new();
    let mut pending = Vec::new();
    for token in text.split_whitespace() {
        if let Some(bytes) = decode_encoded_word(token)? {
            if pending.is_empty() && !decoded.is_empty() {
                decoded.push(' ');
            }
            pending.extend_from_slice(&bytes);
        } else {
            decoded.push_str(&String::from_utf8(std::mem::take(&mut pending))?);
            if !decoded.is_empty() {
                decoded.push(' ');
            }
            decoded.push_str(token);
        }
    }
    decoded.push_str(&String::from_utf8(pending)?);

    Ok(decoded)
}

/// Decodes one `=?charset?encoding?text?=` token, or returns `None` for plain text.
fn decode_encoded_word(token: &str) -> Result<Option<Vec<u8>>> {
    let Some(inner) = token
        .strip_prefix("=?")
        .and_then(|rest| rest.strip_suffix("?="))
    else {
        return Ok(None);
    };

    let parts: Vec<&str> = inner.split('?').collect();
    if parts.len() != 3 {
        return Err(Error::InvalidEncoding(
            "Invalid RFC 2047 format".to_string(),
        ));
    }

    let encoding = parts[1].to_uppercase();
    let encoded_text = parts[2];

    let bytes = match encoding.as_str() {
        "B" => decode_base64(encoded_text)?,
        "Q" => decode_quoted_printable(&encoded_text.replace('_', " "))?,
        _ => {
            return Err(Error::InvalidEncoding(format!(
                "Unknown encoding: {encoding}"
            )));
        }
    };

    Ok(Some(bytes))
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
    use std::io::Cursor;

    /// Reader that hands out at most `step` bytes per call.
    struct Trickle<'a> {
        data: &'a [u8],
        step: usize,
    }

    impl Read for Trickle<'_> {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let n = self.step.min(buf.len()).min(self.data.len());
            buf[..n].copy_from_slice(&self.data[..n]);
            self.data = &self.data[n..];
            Ok(n)
        }
    }

    struct FailingReader;

    impl Read for FailingReader {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::other("disk on fire"))
        }
    }

    #[test]
    fn test_base64_encode_decode() {
        let encoded = encode_base64(b"Hello, World!");
        assert_eq!(encoded, "SGVsbG8sIFdvcmxkIQ==");
        assert_eq!(decode_base64(&encoded).unwrap(), b"Hello, World!");
    }

    #[test]
    fn test_base64_lines_wrap_at_76() {
        let data = vec![0xAB; 200];
        let encoded = encode_base64_lines(&data);
        let lines: Vec<&str> = encoded.split("\r\n").collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[..3].iter().all(|l| l.len() == BASE64_LINE_LENGTH));
        assert!(!encoded.ends_with("\r\n"));
        assert_eq!(decode_base64(&encoded).unwrap(), data);
    }

    #[test]
    fn test_base64_stream_matches_buffered() {
        let data: Vec<u8> = (0..10_000u32).map(|i| (i % 251) as u8).collect();
        let mut out = Vec::new();
        let consumed = encode_base64_stream(Trickle { data: &data, step: 1000 }, &mut out).unwrap();
        assert_eq!(consumed, 10_000);
        assert_eq!(String::from_utf8(out).unwrap(), encode_base64_lines(&data));
    }

    #[test]
    fn test_base64_stream_empty() {
        let mut out = Vec::new();
        let consumed = encode_base64_stream(Cursor::new(Vec::new()), &mut out).unwrap();
        assert_eq!(consumed, 0);
        assert!(out.is_empty());
    }

    #[test]
    fn test_base64_stream_propagates_read_error() {
        let mut out = Vec::new();
        let err = encode_base64_stream(FailingReader, &mut out).unwrap_err();
        assert_eq!(err.to_string(), "disk on fire");
    }

    #[test]
    fn test_quoted_printable_decode() {
        assert_eq!(decode_quoted_printable("Hello, World!").unwrap(), b"Hello, World!");
        assert_eq!(
            decode_quoted_printable("H=C3=A9llo").unwrap(),
            "Héllo".as_bytes()
        );
        assert_eq!(decode_quoted_printable("Hello=\r\nWorld").unwrap(), b"HelloWorld");
        assert!(decode_quoted_printable("bad=4").is_err());
    }

    #[test]
    fn test_rfc2047_encode() {
        assert_eq!(encode_rfc2047("Hello", "utf-8"), "Hello");

        let encoded = encode_rfc2047("Привет", "utf-8");
        assert!(encoded.starts_with("=?utf-8?B?"));
        assert!(encoded.ends_with("?="));
        assert_eq!(decode_rfc2047(&encoded).unwrap(), "Привет");
    }

    #[test]
    fn test_rfc2047_decode() {
        assert_eq!(decode_rfc2047("Hello").unwrap(), "Hello");
        assert_eq!(decode_rfc2047("=?utf-8?B?SMOpbGxv?=").unwrap(), "Héllo");
        assert_eq!(decode_rfc2047("=?utf-8?Q?H=C3=A9llo?=").unwrap(), "Héllo");
        assert!(decode_rfc2047("=?utf-8?X?abc?=").is_err());
    }

    #[test]
    fn test_rfc2047_long_value_is_folded() {
        let subject = "Отчёт за квартал: продажи, расходы и прогноз на следующий год";
        let encoded = encode_rfc2047(subject, "utf-8");

        let words: Vec<&str> = encoded.split("\r\n ").collect();
        assert!(words.len() > 1);
        for word in &words {
            assert!(word.len() <= MAX_ENCODED_WORD, "{word} is too long");
            assert!(word.starts_with("=?utf-8?B?") && word.ends_with("?="));
        }
        assert_eq!(decode_rfc2047(&encoded).unwrap(), subject);
        assert_eq!(decode_rfc2047(&encoded.replace("\r\n", "")).unwrap(), subject);
    }

    #[test]
    fn test_rfc2047_decode_mixed_text() {
        assert_eq!(
            decode_rfc2047("Re: =?utf-8?B?SMOp?= =?utf-8?B?bGxv?= again").unwrap(),
            "Re: Héllo again"
        );
    }
}
