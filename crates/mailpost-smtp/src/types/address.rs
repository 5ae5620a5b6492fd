//! Envelope address type.

use crate::error::{Error, Result};

/// Email address used in `MAIL FROM` and `RCPT TO`.
///
/// Only the envelope form is accepted: no display name, no angle brackets,
/// no whitespace. Anything that could break out of the command line is
/// rejected before it reaches the wire.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Address(String);

impl Address {
    /// Creates a new address from a string.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidAddress`] if the address is malformed.
    pub fn new(addr: impl Into<String>) -> Result<Self> {
        let addr = addr.into();
        Self::validate(&addr)?;
        Ok(Self(addr))
    }

    /// Creates an envelope sender from a login name.
    ///
    /// Submission servers accept logins such as `mailer` as the reverse
    /// path, so only characters that would break the command line are
    /// rejected and `@` is not required.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidAddress`] if the login is empty or contains
    /// whitespace, control characters or angle brackets.
    pub fn sender(login: impl Into<String>) -> Result<Self> {
        let login = login.into();
        Self::check_characters(&login)?;
        Ok(Self(login))
    }

    /// Returns the address as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the domain part.
    #[must_use]
    pub fn domain(&self) -> &str {
        self.0.rsplit_once('@').map_or("", |(_, domain)| domain)
    }

    fn check_characters(addr: &str) -> Result<()> {
        if addr.is_empty() {
            return Err(Error::InvalidAddress("address cannot be empty".into()));
        }

        if let Some(c) = addr
            .chars()
            .find(|c| c.is_whitespace() || c.is_control() || matches!(c, '<' | '>'))
        {
            return Err(Error::InvalidAddress(format!(
                "{addr:?} contains forbidden character {c:?}"
            )));
        }

        Ok(())
    }

    fn validate(addr: &str) -> Result<()> {
        Self::check_characters(addr)?;

        let Some((local, domain)) = addr.rsplit_once('@') else {
            return Err(Error::InvalidAddress(format!("{addr:?} is missing '@'")));
        };

        if local.is_empty() || domain.is_empty() {
            return Err(Error::InvalidAddress(format!(
                "{addr:?} has an empty local or domain part"
            )));
        }

        if domain.contains('@') || (!local.starts_with('"') && local.contains('@')) {
            return Err(Error::InvalidAddress(format!(
                "{addr:?} must have exactly one '@'"
            )));
        }

        Ok(())
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_address() {
        let addr = Address::new("user@example.com").unwrap();
        assert_eq!(addr.as_str(), "user@example.com");
        assert_eq!(addr.domain(), "example.com");
        assert_eq!(addr.to_string(), "user@example.com");
    }

    #[test]
    fn test_invalid_address_no_at() {
        assert!(Address::new("userexample.com").is_err());
    }

    #[test]
    fn test_invalid_address_empty() {
        assert!(Address::new("").is_err());
    }

    #[test]
    fn test_invalid_address_empty_parts() {
        assert!(Address::new("@example.com").is_err());
        assert!(Address::new("user@").is_err());
    }

    #[test]
    fn test_invalid_address_two_at() {
        assert!(Address::new("a@b@example.com").is_err());
    }

    #[test]
    fn test_rejects_command_injection() {
        let err = Address::new("a@b.com>\r\nRCPT TO:<evil@x.com").unwrap_err();
        assert!(matches!(err, Error::InvalidAddress(_)));
        assert!(Address::new("John <john@example.com>").is_err());
        assert!(Address::new("user name@example.com").is_err());
    }

    #[test]
    fn test_sender_accepts_bare_login() {
        let addr = Address::sender("mailer").unwrap();
        assert_eq!(addr.as_str(), "mailer");
        assert_eq!(addr.domain(), "");
        assert_eq!(Address::sender("user@example.com").unwrap().domain(), "example.com");
    }

    #[test]
    fn test_sender_rejects_command_injection() {
        assert!(Address::sender("").is_err());
        assert!(Address::sender("mailer>\r\nRSET").is_err());
        assert!(Address::sender("mail er").is_err());
        assert!(Address::sender("<mailer>").is_err());
    }
}
