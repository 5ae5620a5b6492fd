//! Capability lines from the EHLO reply.

/// One capability advertised after EHLO.
///
/// Only the capabilities a session acts on get their own variant; every
/// other line is kept verbatim in [`Extension::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Extension {
    /// `STARTTLS`
    StartTls,
    /// `AUTH` with the recognised mechanisms in advertised order.
    Auth(Vec<AuthMechanism>),
    /// `SIZE`, with the limit when the server gives one.
    Size(Option<usize>),
    /// `8BITMIME`
    EightBitMime,
    /// Any other capability line.
    Other(String),
}

impl Extension {
    /// Parses one capability line. Keywords are case-insensitive.
    #[must_use]
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        let (keyword, params) = line
            .split_once(char::is_whitespace)
            .unwrap_or((line, ""));

        match keyword.to_ascii_uppercase().as_str() {
            "STARTTLS" => Self::StartTls,
            "8BITMIME" => Self::EightBitMime,
            "SIZE" => Self::Size(params.trim().parse().ok()),
            "AUTH" => Self::Auth(
                params
                    .split_whitespace()
                    .filter_map(AuthMechanism::parse)
                    .collect(),
            ),
            _ => Self::Other(line.to_string()),
        }
    }
}

/// SASL mechanism named in an `AUTH` capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthMechanism {
    /// `PLAIN`, the mechanism sessions authenticate with.
    Plain,
    /// `LOGIN`, recognised but never used.
    Login,
}

impl AuthMechanism {
    /// Matches a mechanism name, ignoring case.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        if name.eq_ignore_ascii_case("PLAIN") {
            Some(Self::Plain)
        } else if name.eq_ignore_ascii_case("LOGIN") {
            Some(Self::Login)
        } else {
            None
        }
    }

    /// Name as written in the `AUTH` command.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Plain => "PLAIN",
            Self::Login => "LOGIN",
        }
    }
}
