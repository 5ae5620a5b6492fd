//! SMTP reply parser.

use crate::error::{Error, Result};
use crate::types::{Reply, ReplyCode};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

/// Upper bound on the number of lines in one reply.
const MAX_REPLY_LINES: usize = 256;

/// Parses an SMTP reply from response lines.
///
/// SMTP replies can be single-line or multi-line:
/// - Single: `250 OK\r\n`
/// - Multi: `250-First line\r\n250-Second line\r\n250 Last line\r\n`
///
/// # Errors
///
/// Returns an error if the reply is malformed or the lines disagree on the code.
pub fn parse_reply(lines: &[String]) -> Result<Reply> {
    let Some(first) = lines.first() else {
        return Err(Error::Protocol("Empty reply".into()));
    };

    let code = reply_code(first)?;

    let mut message = Vec::with_capacity(lines.len());
    for line in lines {
        if reply_code(line)? != code {
            return Err(Error::Protocol(format!(
                "Reply code changed mid-reply: {line}"
            )));
        }
        message.push(line.get(4..).unwrap_or_default().to_string());
    }

    Ok(Reply::new(code, message))
}

fn reply_code(line: &str) -> Result<ReplyCode> {
    let digits = line
        .get(..3)
        .filter(|d| d.bytes().all(|b| b.is_ascii_digit()))
        .ok_or_else(|| Error::Protocol(format!("Invalid reply line: {line}")))?;

    if line
        .as_bytes()
        .get(3)
        .is_some_and(|sep| !matches!(sep, b' ' | b'-'))
    {
        return Err(Error::Protocol(format!("Malformed reply line: {line}")));
    }

    digits
        .parse::<u16>()
        .map(ReplyCode::new)
        .map_err(|_| Error::Protocol(format!("Invalid reply code: {digits}")))
}

/// Checks if a line is the last line of a multi-line reply.
///
/// Continuation lines use `-` after the code; the last line uses ` ` or
/// carries the bare code.
#[must_use]
pub fn is_last_reply_line(line: &str) -> bool {
    match line.as_bytes().get(3) {
        Some(sep) => *sep == b' ',
        None => line.len() == 3,
    }
}

/// Reads one complete reply from a buffered reader.
///
/// # Errors
///
/// Returns [`Error::ConnectionClosed`] if the stream ends before the last
/// line of the reply, or a parse error if the reply is malformed.
pub async fn read_reply<R>(reader: &mut R) -> Result<Reply>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = Vec::new();
    let mut buf = String::new();

    loop {
        buf.clear();
        if reader.read_line(&mut buf).await? == 0 {
            return Err(Error::ConnectionClosed);
        }

        let line = buf.trim_end_matches(['\r', '\n']);
        if line.is_empty() {
            continue;
        }

        let is_last = is_last_reply_line(line);
        lines.push(line.to_string());

        if is_last {
            break;
        }
        if lines.len() >= MAX_REPLY_LINES {
            return Err(Error::Protocol("Reply has too many lines".into()));
        }
    }

    let reply = parse_reply(&lines)?;
    tracing::debug!(code = reply.code.as_u16(), "SMTP <");
    Ok(reply)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use super::*;
    use tokio::io::BufReader;
    use tokio_test::io::Builder;

    #[test]
    fn test_parse_single_line_reply() {
        let lines = vec!["250 OK".to_string()];
        let reply = parse_reply(&lines).unwrap();
        assert_eq!(reply.code.as_u16(), 250);
        assert_eq!(reply.message, vec!["OK"]);
        assert!(reply.is_success());
    }

    #[test]
    fn test_parse_multi_line_reply() {
        let lines = vec![
            "250-First line".to_string(),
            "250-Second line".to_string(),
            "250 Last line".to_string(),
        ];
        let reply = parse_reply(&lines).unwrap();
        assert_eq!(reply.code.as_u16(), 250);
        assert_eq!(
            reply.message,
            vec!["First line", "Second line", "Last line"]
        );
    }

    #[test]
    fn test_parse_bare_code() {
        let reply = parse_reply(&["354".to_string()]).unwrap();
        assert_eq!(reply.code.as_u16(), 354);
        assert_eq!(reply.message, vec![""]);
    }

    #[test]
    fn test_is_last_reply_line() {
        assert!(is_last_reply_line("250 OK"));
        assert!(is_last_reply_line("250"));
        assert!(!is_last_reply_line("250-Continuing"));
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse_reply(&[]).is_err());
        assert!(parse_reply(&["25".to_string()]).is_err());
        assert!(parse_reply(&["ABC OK".to_string()]).is_err());
        assert!(parse_reply(&["250xOK".to_string()]).is_err());
        assert!(parse_reply(&["250-a".to_string(), "550 b".to_string()]).is_err());
    }

    #[tokio::test]
    async fn test_read_reply_multi_line() {
        let mock = Builder::new()
            .read(b"250-mail.example.com\r\n250-SIZE 1000\r\n")
            .read(b"250 8BITMIME\r\n")
            .build();
        let mut reader = BufReader::new(mock);

        let reply = read_reply(&mut reader).await.unwrap();
        assert_eq!(reply.code.as_u16(), 250);
        assert_eq!(reply.message, vec!["mail.example.com", "SIZE 1000", "8BITMIME"]);
    }

    #[tokio::test]
    async fn test_read_reply_consecutive() {
        let mock = Builder::new().read(b"220 ready\r\n250 OK\r\n").build();
        let mut reader = BufReader::new(mock);

        assert_eq!(read_reply(&mut reader).await.unwrap().code.as_u16(), 220);
        assert_eq!(read_reply(&mut reader).await.unwrap().code.as_u16(), 250);
    }

    #[tokio::test]
    async fn test_read_reply_eof_is_connection_closed() {
        let mock = Builder::new().read(b"250-partial\r\n").build();
        let mut reader = BufReader::new(mock);

        let err = read_reply(&mut reader).await.unwrap_err();
        assert!(matches!(err, Error::ConnectionClosed));
    }
}
