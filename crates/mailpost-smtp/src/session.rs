//! Authenticated SMTP session with explicit failure states.
//!
//! `Session` wraps the type-state [`Client`] and keeps it between
//! transactions. Every operation runs under a deadline from
//! [`SessionConfig`]. Once a transaction has started talking to the server,
//! any failure leaves the session in the `Failed` state: the connection is
//! dropped and later calls return [`SessionError::Unusable`]. The session
//! never reconnects on its own.
//!
//! ## Example
//!
//! ```ignore
//! use mailpost_smtp::{Session, SessionConfig};
//!
//! let config = SessionConfig::new("smtp.example.com", 465)
//!     .credentials("user@example.com", "password");
//!
//! let mut session = Session::open(config).await?;
//! session.transmit("recipient@example.com", &raw_message).await?;
//! session.close().await?;
//! ```

use std::fmt;

use crate::command::BodyType;
use crate::config::{Security, SessionConfig};
use crate::connection::{
    Authenticated, Client, Connected, ServerInfo, SmtpConnection, connect, connect_tls,
};
use crate::error::{Error, SessionError, Stage};
use crate::observer::{NoopObserver, SessionObserver};
use crate::types::{Address, AuthMechanism};

/// Externally visible state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    /// Ready for the next transaction.
    Authenticated,
    /// A previous operation failed; the connection is gone.
    Failed,
    /// The session was closed.
    Closed,
}

enum SessionState {
    Authenticated(Client<Authenticated>),
    Failed,
    Closed,
}

/// Sender and recipient for one transaction, with `MAIL FROM` parameters.
struct Envelope {
    from: Address,
    to: Address,
    body: Option<BodyType>,
    size: Option<usize>,
}

/// Authenticated SMTP session.
pub struct Session {
    config: SessionConfig,
    state: SessionState,
    observer: Box<dyn SessionObserver>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("host", &self.config.host)
            .field("port", &self.config.port)
            .field("username", &self.config.username)
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Connects, secures the transport and authenticates.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Connection`] if the transport cannot be
    /// established, [`SessionError::Auth`] if the credentials are rejected and
    /// [`SessionError::Timeout`] if `connect_timeout` passes first.
    pub async fn open(config: SessionConfig) -> Result<Self, SessionError> {
        Self::open_with_observer(config, Box::new(NoopObserver)).await
    }

    /// Like [`Session::open`], reporting progress to `observer`.
    ///
    /// # Errors
    ///
    /// Same as [`Session::open`].
    pub async fn open_with_observer(
        config: SessionConfig,
        mut observer: Box<dyn SessionObserver>,
    ) -> Result<Self, SessionError> {
        let deadline = config.connect_timeout;
        let mut stage = Stage::Connect;

        let outcome =
            tokio::time::timeout(deadline, establish(&config, &mut stage, observer.as_mut()))
                .await;

        let result = match outcome {
            Ok(result) => result,
            Err(_) => Err(SessionError::Timeout {
                stage,
                elapsed: deadline,
            }),
        };

        match result {
            Ok(client) => {
                tracing::info!(
                    host = %config.host,
                    port = config.port,
                    username = %config.username,
                    "SMTP session opened"
                );
                Ok(Self {
                    config,
                    state: SessionState::Authenticated(client),
                    observer,
                })
            }
            Err(error) => {
                tracing::warn!(host = %config.host, port = config.port, %error, "Failed to open SMTP session");
                observer.on_failed(&error);
                Err(error)
            }
        }
    }

    /// Returns the current status.
    #[must_use]
    pub const fn status(&self) -> SessionStatus {
        match self.state {
            SessionState::Authenticated(_) => SessionStatus::Authenticated,
            SessionState::Failed => SessionStatus::Failed,
            SessionState::Closed => SessionStatus::Closed,
        }
    }

    /// Returns true if the session can run another transaction.
    #[must_use]
    pub const fn is_usable(&self) -> bool {
        matches!(self.state, SessionState::Authenticated(_))
    }

    /// Returns the server capabilities while the session is usable.
    #[must_use]
    pub fn server_info(&self) -> Option<&ServerInfo> {
        match &self.state {
            SessionState::Authenticated(client) => Some(client.server_info()),
            _ => None,
        }
    }

    /// Returns the configuration the session was opened with.
    #[must_use]
    pub const fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Runs one transaction: NOOP, `MAIL FROM`, `RCPT TO`, DATA and the message.
    ///
    /// The envelope sender is the authenticated username, which need not
    /// contain `@`.
    ///
    /// # Errors
    ///
    /// - [`SessionError::Unusable`] if the session failed earlier or was closed
    /// - [`SessionError::Recipient`] if an address is malformed or rejected
    /// - [`SessionError::MessageTooLarge`] if the server's SIZE limit is exceeded
    /// - [`SessionError::Transport`] on connection-level failures
    /// - [`SessionError::Timeout`] if `command_timeout` passes first
    ///
    /// Malformed addresses and oversized messages are detected before any
    /// command is sent and leave the session usable. Every other error moves
    /// the session to [`SessionStatus::Failed`].
    pub async fn transmit(&mut self, to: &str, message: &[u8]) -> Result<(), SessionError> {
        let envelope = self.prepare(to, message)?;

        let SessionState::Authenticated(client) =
            std::mem::replace(&mut self.state, SessionState::Failed)
        else {
            return Err(SessionError::Unusable("session is not authenticated"));
        };

        let deadline = self.config.command_timeout;
        let mut stage = Stage::Check;

        let outcome = tokio::time::timeout(
            deadline,
            run_transaction(
                client,
                &envelope,
                message,
                &mut stage,
                self.observer.as_mut(),
            ),
        )
        .await;

        let error = match outcome {
            Ok(Ok(client)) => {
                self.state = SessionState::Authenticated(client);
                self.observer.on_message_sent(message.len());
                tracing::info!(to = %envelope.to, bytes = message.len(), "Message transmitted");
                return Ok(());
            }
            Ok(Err(error)) => error,
            Err(_) => SessionError::Timeout {
                stage,
                elapsed: deadline,
            },
        };

        tracing::warn!(to = %envelope.to, %error, "Transaction failed, session invalidated");
        self.observer.on_failed(&error);
        Err(error)
    }

    /// Validates addresses and size against the server before any command is sent.
    fn prepare(&self, to: &str, message: &[u8]) -> Result<Envelope, SessionError> {
        let info = match &self.state {
            SessionState::Authenticated(client) => client.server_info(),
            SessionState::Failed => {
                return Err(SessionError::Unusable("a previous operation failed"));
            }
            SessionState::Closed => return Err(SessionError::Unusable("session is closed")),
        };

        let from = Address::sender(self.config.username.as_str()).map_err(|source| {
            SessionError::Recipient {
                stage: Stage::MailFrom,
                source,
            }
        })?;
        let to = Address::new(to).map_err(|source| SessionError::Recipient {
            stage: Stage::RcptTo,
            source,
        })?;

        if let Some(limit) = info
            .max_message_size()
            .filter(|&limit| message.len() > limit)
        {
            return Err(SessionError::MessageTooLarge {
                size: message.len(),
                limit,
            });
        }

        let body = info.supports_8bitmime().then(|| {
            if message.is_ascii() {
                BodyType::SevenBit
            } else {
                BodyType::EightBitMime
            }
        });
        let size = info.supports_size().then_some(message.len());

        Ok(Envelope {
            from,
            to,
            body,
            size,
        })
    }

    /// Sends QUIT and releases the connection.
    ///
    /// The session is closed afterwards whatever the outcome. Closing a
    /// session that already failed or was closed does nothing.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Close`] if QUIT fails and
    /// [`SessionError::Timeout`] if the server does not answer in time.
    pub async fn close(&mut self) -> Result<(), SessionError> {
        let SessionState::Authenticated(client) =
            std::mem::replace(&mut self.state, SessionState::Closed)
        else {
            return Ok(());
        };

        let deadline = self.config.command_timeout;
        let result = match tokio::time::timeout(deadline, client.quit()).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(source)) => Err(SessionError::Close(source)),
            Err(_) => Err(SessionError::Timeout {
                stage: Stage::Quit,
                elapsed: deadline,
            }),
        };

        self.observer.on_closed();
        match &result {
            Ok(()) => tracing::info!(host = %self.config.host, "SMTP session closed"),
            Err(error) => {
                tracing::warn!(host = %self.config.host, %error, "SMTP session closed uncleanly");
                self.observer.on_failed(error);
            }
        }
        result
    }
}

/// Connects and authenticates, recording the current stage for timeout reports.
async fn establish(
    config: &SessionConfig,
    stage: &mut Stage,
    observer: &mut dyn SessionObserver,
) -> Result<Client<Authenticated>, SessionError> {
    *stage = Stage::Connect;
    let client = connect_client(config)
        .await
        .map_err(SessionError::Connection)?;
    observer.on_connected(&config.host, config.port);

    *stage = Stage::Auth;
    let info = client.server_info();
    if info.offers_auth() && !info.auth_mechanisms().contains(&AuthMechanism::Plain) {
        return Err(SessionError::Auth(Error::NotSupported("AUTH PLAIN".into())));
    }

    let client = client
        .auth_plain(&config.username, &config.password)
        .await
        .map_err(SessionError::Auth)?;
    observer.on_authenticated(&config.username);

    Ok(client)
}

async fn connect_client(config: &SessionConfig) -> Result<Client<Connected>, Error> {
    let host = config.host.as_str();
    let client = match config.security {
        Security::Tls => {
            let stream = connect_tls(host, config.port).await?;
            Client::from_stream(stream)
                .await?
                .ehlo(&config.client_hostname)
                .await?
        }
        Security::StartTls => {
            let stream = connect(host, config.port).await?;
            Client::from_stream(stream)
                .await?
                .ehlo(&config.client_hostname)
                .await?
                .starttls(host, &config.client_hostname)
                .await?
        }
        Security::None => {
            let stream = connect(host, config.port).await?;
            Client::from_stream(stream)
                .await?
                .ehlo(&config.client_hostname)
                .await?
        }
    };
    Ok(client)
}

/// Reply rejections of an address are recipient errors, anything else is transport.
fn classify(stage: Stage, source: Error) -> SessionError {
    if source.is_reply() {
        SessionError::Recipient { stage, source }
    } else {
        SessionError::Transport { stage, source }
    }
}

async fn run_transaction(
    mut client: Client<Authenticated>,
    envelope: &Envelope,
    message: &[u8],
    stage: &mut Stage,
    observer: &mut dyn SessionObserver,
) -> Result<Client<Authenticated>, SessionError> {
    *stage = Stage::Check;
    client
        .noop()
        .await
        .map_err(|source| SessionError::Transport {
            stage: Stage::Check,
            source,
        })?;
    observer.on_connection_checked();

    *stage = Stage::MailFrom;
    let client = client
        .mail_from(envelope.from.clone(), envelope.body, envelope.size)
        .await
        .map_err(|source| classify(Stage::MailFrom, source))?;
    observer.on_sender_accepted(&envelope.from);

    *stage = Stage::RcptTo;
    let client = client
        .rcpt_to(envelope.to.clone())
        .await
        .map_err(|source| classify(Stage::RcptTo, source))?;
    observer.on_recipient_accepted(&envelope.to);

    *stage = Stage::Data;
    let transport = |source| SessionError::Transport {
        stage: Stage::Data,
        source,
    };
    let client = client.data().await.map_err(transport)?;
    client.send_message(message).await.map_err(transport)
}
