//! Session configuration types.

use std::fmt;
use std::time::Duration;

/// Connection security mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Security {
    /// No encryption (port 25). **Only for local testing.**
    None,
    /// Start with plaintext, upgrade with STARTTLS (port 587).
    StartTls,
    /// TLS from the start (port 465). **Recommended.**
    #[default]
    Tls,
}

impl Security {
    /// Returns the default port for this security mode.
    #[must_use]
    pub const fn default_port(self) -> u16 {
        match self {
            Self::None => 25,
            Self::StartTls => 587,
            Self::Tls => 465,
        }
    }
}

/// Configuration for an SMTP session.
#[derive(Clone)]
pub struct SessionConfig {
    /// Server hostname.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Username for authentication, also used as the envelope sender.
    pub username: String,
    /// Password for authentication.
    pub password: String,
    /// Security mode.
    pub security: Security,
    /// Deadline for connecting, the TLS handshake and authentication.
    pub connect_timeout: Duration,
    /// Deadline for one complete transaction or for QUIT.
    pub command_timeout: Duration,
    /// Name announced in EHLO.
    pub client_hostname: String,
}

impl SessionConfig {
    /// Creates a configuration using implicit TLS on port 465.
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            username: String::new(),
            password: String::new(),
            security: Security::Tls,
            connect_timeout: Duration::from_secs(30),
            command_timeout: Duration::from_secs(60),
            client_hostname: "localhost".to_string(),
        }
    }

    /// Sets the credentials.
    #[must_use]
    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = username.into();
        self.password = password.into();
        self
    }

    /// Sets the security mode.
    #[must_use]
    pub const fn security(mut self, security: Security) -> Self {
        self.security = security;
        self
    }

    /// Sets the connection timeout.
    #[must_use]
    pub const fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the command timeout.
    #[must_use]
    pub const fn command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    /// Sets the name announced in EHLO.
    #[must_use]
    pub fn client_hostname(mut self, hostname: impl Into<String>) -> Self {
        self.client_hostname = hostname.into();
        self
    }
}

impl fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("security", &self.security)
            .field("connect_timeout", &self.connect_timeout)
            .field("command_timeout", &self.command_timeout)
            .field("client_hostname", &self.client_hostname)
            .finish()
    }
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

    #[test]
    fn test_default_ports() {
        assert_eq!(Security::None.default_port(), 25);
        assert_eq!(Security::StartTls.default_port(), 587);
        assert_eq!(Security::Tls.default_port(), 465);
        assert_eq!(Security::default(), Security::Tls);
    }

    #[test]
    fn test_config_builder() {
        let config = SessionConfig::new("smtp.example.com", 587)
            .credentials("user@example.com", "secret")
            .security(Security::StartTls)
            .connect_timeout(Duration::from_secs(5))
            .command_timeout(Duration::from_secs(10))
            .client_hostname("client.example.com");

        assert_eq!(config.host, "smtp.example.com");
        assert_eq!(config.port, 587);
        assert_eq!(config.username, "user@example.com");
        assert_eq!(config.security, Security::StartTls);
        assert_eq!(config.connect_timeout, Duration::from_secs(5));
        assert_eq!(config.command_timeout, Duration::from_secs(10));
        assert_eq!(config.client_hostname, "client.example.com");
    }

    #[test]
    fn test_debug_redacts_password() {
        let config = SessionConfig::new("smtp.example.com", 465).credentials("user", "hunter2");
        let debug = format!("{config:?}");
        assert!(debug.contains("user"));
        assert!(!debug.contains("hunter2"));
    }
}
