//! SMTP configuration for the sender.
//!
//! Values come from the environment ([`SmtpConfig::from_env`]), a JSON file
//! ([`SmtpConfig::load`]) or the builder. All three produce the same type,
//! which converts into the session configuration of `mailpost-smtp`.

use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use mailpost_smtp::SessionConfig;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Environment variable holding the server hostname.
pub const ENV_HOST: &str = "SMTP_HOST";
/// Environment variable holding the server port.
pub const ENV_PORT: &str = "SMTP_PORT";
/// Environment variable holding the login name.
pub const ENV_USERNAME: &str = "SMTP_USERNAME";
/// Environment variable holding the password.
pub const ENV_PASSWORD: &str = "SMTP_PASSWORD";
/// Optional environment variable selecting `tls`, `starttls` or `none`.
pub const ENV_SECURITY: &str = "SMTP_SECURITY";
/// Optional environment variable overriding both timeouts, in seconds.
pub const ENV_TIMEOUT_SECS: &str = "SMTP_TIMEOUT_SECS";

const fn default_connect_timeout_secs() -> u64 {
    30
}

const fn default_command_timeout_secs() -> u64 {
    60
}

const fn at_least_one(secs: u64) -> u64 {
    if secs == 0 { 1 } else { secs }
}

fn default_client_hostname() -> String {
    "localhost".to_string()
}

/// Security/encryption mode for the SMTP connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Security {
    /// No encryption (not recommended).
    None,
    /// Implicit TLS (connect directly with TLS).
    #[default]
    Tls,
    /// STARTTLS upgrade after plaintext connect.
    StartTls,
}

impl Security {
    /// Get default port for the security mode.
    #[must_use]
    pub const fn default_port(self) -> u16 {
        match self {
            Self::None => 25,
            Self::StartTls => 587,
            Self::Tls => 465,
        }
    }

    /// Get display name for the security mode.
    #[must_use]
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::None => "None (insecure)",
            Self::Tls => "SSL/TLS",
            Self::StartTls => "STARTTLS",
        }
    }
}

impl FromStr for Security {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" | "plain" => Ok(Self::None),
            "tls" | "ssl" => Ok(Self::Tls),
            "starttls" => Ok(Self::StartTls),
            other => Err(Error::Config(format!(
                "unknown security mode {other:?}, expected tls, starttls or none"
            ))),
        }
    }
}

impl From<Security> for mailpost_smtp::Security {
    fn from(security: Security) -> Self {
        match security {
            Security::None => Self::None,
            Security::Tls => Self::Tls,
            Security::StartTls => Self::StartTls,
        }
    }
}

/// SMTP server configuration.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SmtpConfig {
    /// Server hostname.
    pub host: String,
    /// Server port (default: 465 for TLS, 587 for STARTTLS).
    pub port: u16,
    /// Security mode.
    #[serde(default)]
    pub security: Security,
    /// Username for authentication, also the sender address.
    pub username: String,
    /// Password for authentication.
    pub password: String,
    /// Deadline for connecting and authenticating.
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// Deadline for each transaction.
    #[serde(default = "default_command_timeout_secs")]
    pub command_timeout_secs: u64,
    /// Name announced in EHLO.
    #[serde(default = "default_client_hostname")]
    pub client_hostname: String,
}

impl SmtpConfig {
    /// Creates a configuration builder.
    #[must_use]
    pub fn builder(host: impl Into<String>) -> SmtpConfigBuilder {
        SmtpConfigBuilder::new(host)
    }

    /// Reads the configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if a required variable is missing or a
    /// value cannot be parsed.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads the configuration through an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Same as [`SmtpConfig::from_env`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| {
            lookup(key)
                .filter(|value| !value.trim().is_empty())
                .ok_or_else(|| Error::Config(format!("{key} is not set")))
        };

        let host = required(ENV_HOST)?;
        let port = parse_var::<u16>(ENV_PORT, &required(ENV_PORT)?)?;
        let username = required(ENV_USERNAME)?;
        let password = required(ENV_PASSWORD)?;

        let mut builder = Self::builder(host)
            .port(port)
            .credentials(username, password);

        if let Some(security) = lookup(ENV_SECURITY) {
            builder = builder.security(security.parse()?);
        }
        if let Some(secs) = lookup(ENV_TIMEOUT_SECS) {
            let secs = parse_var::<u64>(ENV_TIMEOUT_SECS, &secs)?;
            builder = builder
                .connect_timeout(Duration::from_secs(secs))
                .command_timeout(Duration::from_secs(secs));
        }

        Ok(builder.build())
    }

    /// Loads the configuration from a JSON file.
    ///
    /// # Errors
    ///
    /// Timeouts below one second are raised to one second, as in the builder.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the file cannot be read or parsed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {e}", path.display())))?;
        let mut config: Self = serde_json::from_str(&content)
            .map_err(|e| Error::Config(format!("invalid config {}: {e}", path.display())))?;
        config.connect_timeout_secs = config.connect_timeout_secs.max(1);
        config.command_timeout_secs = config.command_timeout_secs.max(1);
        Ok(config)
    }

    /// Returns the connect deadline, never shorter than one second.
    #[must_use]
    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_secs(at_least_one(self.connect_timeout_secs))
    }

    /// Returns the per-transaction deadline, never shorter than one second.
    #[must_use]
    pub const fn command_timeout(&self) -> Duration {
        Duration::from_secs(at_least_one(self.command_timeout_secs))
    }

    /// Converts into the session configuration.
    #[must_use]
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig::new(self.host.clone(), self.port)
            .credentials(self.username.clone(), self.password.clone())
            .security(self.security.into())
            .connect_timeout(self.connect_timeout())
            .command_timeout(self.command_timeout())
            .client_hostname(self.client_hostname.clone())
    }
}

fn parse_var<T: FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::Config(format!("{key} has invalid value {value:?}")))
}

impl fmt::Debug for SmtpConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SmtpConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("security", &self.security)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .field("command_timeout_secs", &self.command_timeout_secs)
            .field("client_hostname", &self.client_hostname)
            .finish()
    }
}

/// Builder for [`SmtpConfig`].
#[derive(Debug, Clone)]
pub struct SmtpConfigBuilder {
    host: String,
    port: Option<u16>,
    security: Security,
    username: String,
    password: String,
    connect_timeout: Duration,
    command_timeout: Duration,
    client_hostname: String,
}

impl SmtpConfigBuilder {
    /// Creates a new builder with the given hostname.
    #[must_use]
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: None,
            security: Security::Tls,
            username: String::new(),
            password: String::new(),
            connect_timeout: Duration::from_secs(default_connect_timeout_secs()),
            command_timeout: Duration::from_secs(default_command_timeout_secs()),
            client_hostname: default_client_hostname(),
        }
    }

    /// Sets the port.
    #[must_use]
    pub const fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Sets the security mode.
    #[must_use]
    pub const fn security(mut self, security: Security) -> Self {
        self.security = security;
        self
    }

    /// Sets the credentials.
    #[must_use]
    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = username.into();
        self.password = password.into();
        self
    }

    /// Sets the connection timeout.
    #[must_use]
    pub const fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the per-transaction timeout.
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

    /// Builds the configuration.
    ///
    /// Without an explicit port, the default port of the security mode is used.
    /// Timeouts are kept at whole-second precision.
    #[must_use]
    pub fn build(self) -> SmtpConfig {
        SmtpConfig {
            host: self.host,
            port: self.port.unwrap_or_else(|| self.security.default_port()),
            security: self.security,
            username: self.username,
            password: self.password,
            connect_timeout_secs: self.connect_timeout.as_secs().max(1),
            command_timeout_secs: self.command_timeout.as_secs().max(1),
            client_hostname: self.client_hostname,
        }
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
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    const REQUIRED: &[(&str, &str)] = &[
        (ENV_HOST, "smtp.example.com"),
        (ENV_PORT, "465"),
        (ENV_USERNAME, "user@example.com"),
        (ENV_PASSWORD, "secret"),
    ];

    #[test]
    fn test_default_ports() {
        assert_eq!(Security::None.default_port(), 25);
        assert_eq!(Security::StartTls.default_port(), 587);
        assert_eq!(Security::Tls.default_port(), 465);
    }

    #[test]
    fn test_from_lookup_required_only() {
        let config = SmtpConfig::from_lookup(lookup(REQUIRED)).unwrap();
        assert_eq!(config.host, "smtp.example.com");
        assert_eq!(config.port, 465);
        assert_eq!(config.security, Security::Tls);
        assert_eq!(config.username, "user@example.com");
        assert_eq!(config.password, "secret");
        assert_eq!(config.connect_timeout(), Duration::from_secs(30));
        assert_eq!(config.command_timeout(), Duration::from_secs(60));
    }

    #[test]
    fn test_from_lookup_optional_values() {
        let mut vars = REQUIRED.to_vec();
        vars.push((ENV_SECURITY, "STARTTLS"));
        vars.push((ENV_TIMEOUT_SECS, "5"));

        let config = SmtpConfig::from_lookup(lookup(&vars)).unwrap();
        assert_eq!(config.security, Security::StartTls);
        assert_eq!(config.connect_timeout_secs, 5);
        assert_eq!(config.command_timeout_secs, 5);
    }

    #[test]
    fn test_from_lookup_missing_and_invalid() {
        let err = SmtpConfig::from_lookup(lookup(&REQUIRED[1..])).unwrap_err();
        assert!(matches!(err, Error::Config(ref msg) if msg.contains(ENV_HOST)));

        let mut vars = REQUIRED.to_vec();
        vars[1] = (ENV_PORT, "not-a-port");
        let err = SmtpConfig::from_lookup(lookup(&vars)).unwrap_err();
        assert!(matches!(err, Error::Config(ref msg) if msg.contains(ENV_PORT)));

        let mut vars = REQUIRED.to_vec();
        vars.push((ENV_SECURITY, "carrier-pigeon"));
        assert!(SmtpConfig::from_lookup(lookup(&vars)).is_err());
    }

    #[test]
    fn test_builder_default_port() {
        let config = SmtpConfig::builder("smtp.example.com")
            .security(Security::StartTls)
            .credentials("user", "pass")
            .build();
        assert_eq!(config.port, 587);
    }

    #[test]
    fn test_serde_defaults_and_names() {
        let json = r#"{
            "host": "smtp.example.com",
            "port": 587,
            "security": "starttls",
            "username": "user@example.com",
            "password": "secret"
        }"#;
        let config: SmtpConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.security, Security::StartTls);
        assert_eq!(config.command_timeout_secs, 60);
        assert_eq!(config.client_hostname, "localhost");

        let round: SmtpConfig =
            serde_json::from_str(&serde_json::to_string(&config).unwrap()).unwrap();
        assert_eq!(round, config);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("smtp.json");
        std::fs::write(
            &path,
            r#"{"host":"mx.test","port":25,"security":"none","username":"a@mx.test","password":"pw"}"#,
        )
        .unwrap();

        let config = SmtpConfig::load(&path).unwrap();
        assert_eq!(config.security, Security::None);
        assert_eq!(config.port, 25);

        assert!(SmtpConfig::load(dir.path().join("missing.json")).is_err());
    }

    #[test]
    fn test_load_raises_zero_timeouts() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("smtp.json");
        std::fs::write(
            &path,
            r#"{"host":"mx.test","port":587,"username":"a@mx.test","password":"pw","connect_timeout_secs":0,"command_timeout_secs":0}"#,
        )
        .unwrap();

        let config = SmtpConfig::load(&path).unwrap();
        assert_eq!(config.connect_timeout_secs, 1);
        assert_eq!(config.command_timeout_secs, 1);

        let session = config.session_config();
        assert_eq!(session.connect_timeout, Duration::from_secs(1));
        assert_eq!(session.command_timeout, Duration::from_secs(1));
    }

    #[test]
    fn test_zero_timeout_fields_read_as_one_second() {
        let mut config = SmtpConfig::builder("mx.test").build();
        config.connect_timeout_secs = 0;
        config.command_timeout_secs = 0;
        assert_eq!(config.connect_timeout(), Duration::from_secs(1));
        assert_eq!(config.command_timeout(), Duration::from_secs(1));
    }

    #[test]
    fn test_debug_redacts_password() {
        let config = SmtpConfig::from_lookup(lookup(REQUIRED)).unwrap();
        let debug = format!("{config:?}");
        assert!(!debug.contains("secret"));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    fn test_session_config_conversion() {
        let config = SmtpConfig::builder("smtp.example.com")
            .security(Security::None)
            .credentials("user", "pass")
            .command_timeout(Duration::from_secs(9))
            .build();
        let session = config.session_config();
        assert_eq!(session.port, 25);
        assert_eq!(session.security, mailpost_smtp::Security::None);
        assert_eq!(session.command_timeout, Duration::from_secs(9));
    }
}
