//! Server replies and their codes.

use crate::error::Error;

/// First digit of a reply code (RFC 5321 section 4.2.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// 2xx: the command was accepted.
    Completed,
    /// 3xx: the server waits for more input.
    Intermediate,
    /// 4xx: temporary failure, the command may succeed later.
    Transient,
    /// 5xx: the command will not succeed as sent.
    Permanent,
    /// Outside the ranges above.
    Unknown,
}

/// Three-digit SMTP reply code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ReplyCode(u16);

impl ReplyCode {
    /// `220` greeting.
    pub const SERVICE_READY: Self = Self(220);
    /// `221` reply to QUIT.
    pub const CLOSING: Self = Self(221);
    /// `250` action completed.
    pub const OK: Self = Self(250);
    /// `354` go ahead with the message.
    pub const START_DATA: Self = Self(354);
    /// `421` server is shutting the connection down.
    pub const SERVICE_UNAVAILABLE: Self = Self(421);
    /// `535` credentials rejected.
    pub const AUTH_FAILED: Self = Self(535);
    /// `550` mailbox unavailable.
    pub const MAILBOX_UNAVAILABLE: Self = Self(550);

    /// Wraps a numeric code.
    #[must_use]
    pub const fn new(code: u16) -> Self {
        Self(code)
    }

    /// Returns the numeric code.
    #[must_use]
    pub const fn as_u16(self) -> u16 {
        self.0
    }

    /// Classifies the code by its first digit.
    #[must_use]
    pub const fn severity(self) -> Severity {
        match self.0 / 100 {
            2 => Severity::Completed,
            3 => Severity::Intermediate,
            4 => Severity::Transient,
            5 => Severity::Permanent,
            _ => Severity::Unknown,
        }
    }

    /// Returns true for 2xx codes.
    #[must_use]
    pub const fn is_success(self) -> bool {
        matches!(self.severity(), Severity::Completed)
    }
}

impl std::fmt::Display for ReplyCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Complete, possibly multiline, server reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    /// Reply code shared by all lines.
    pub code: ReplyCode,
    /// Text after the code, one entry per line.
    pub message: Vec<String>,
}

impl Reply {
    /// Creates a reply.
    #[must_use]
    #[allow(clippy::missing_const_for_fn)]
    pub fn new(code: ReplyCode, message: Vec<String>) -> Self {
        Self { code, message }
    }

    /// Returns true for 2xx replies.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.code.is_success()
    }

    /// Joins the reply lines with `\n`.
    #[must_use]
    pub fn message_text(&self) -> String {
        self.message.join("\n")
    }

    /// Turns an unexpected reply into [`Error::SmtpError`].
    #[must_use]
    pub fn into_error(self) -> Error {
        let message = self.message_text();
        Error::smtp_error(self.code.as_u16(), message)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use super::*;

    #[test]
    fn severity_follows_first_digit() {
        assert_eq!(ReplyCode::OK.severity(), Severity::Completed);
        assert_eq!(ReplyCode::START_DATA.severity(), Severity::Intermediate);
        assert_eq!(ReplyCode::SERVICE_UNAVAILABLE.severity(), Severity::Transient);
        assert_eq!(ReplyCode::AUTH_FAILED.severity(), Severity::Permanent);
        assert_eq!(ReplyCode::new(199).severity(), Severity::Unknown);
        assert_eq!(ReplyCode::new(600).severity(), Severity::Unknown);

        assert!(ReplyCode::CLOSING.is_success());
        assert!(!ReplyCode::START_DATA.is_success());
    }

    #[test]
    fn display_and_ordering() {
        assert_eq!(ReplyCode::OK.to_string(), "250");
        assert!(ReplyCode::OK < ReplyCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn message_text_joins_lines() {
        let reply = Reply::new(
            ReplyCode::SERVICE_READY,
            vec!["smtp.example.com ESMTP".to_string(), "Ready".to_string()],
        );
        assert_eq!(reply.message_text(), "smtp.example.com ESMTP\nReady");
        assert_eq!(Reply::new(ReplyCode::OK, vec![]).message_text(), "");
    }

    #[test]
    fn into_error_keeps_code() {
        let reply = Reply::new(
            ReplyCode::MAILBOX_UNAVAILABLE,
            vec!["No such user".to_string()],
        );
        let err = reply.into_error();
        assert!(err.is_permanent());
        assert_eq!(err.to_string(), "SMTP error 550: No such user");
    }
}
