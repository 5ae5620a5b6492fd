//! Sender façade.
//!
//! [`SmtpSender`] owns one authenticated [`Session`] and turns each
//! [`Sender::send`] call into a freshly built MIME message followed by one SMTP
//! transaction. Sends on the same sender are serialized by a mutex around the
//! session; messages are built before the lock is taken.

use std::future::Future;
use std::path::PathBuf;

use mailpost_mime::MessageBuilder;
use mailpost_smtp::{LoggingObserver, Session, SessionObserver, SessionStatus};
use tokio::sync::Mutex;

use crate::config::SmtpConfig;
use crate::error::Result;

/// Contract used by everything that sends mail.
pub trait Sender: Send + Sync {
    /// Sends a plain-text message with the given attachments to `to`.
    ///
    /// Attachments are read and encoded before any SMTP command is issued.
    fn send(
        &self,
        to: &str,
        subject: &str,
        body: &str,
        attachments: &[PathBuf],
    ) -> impl Future<Output = Result<()>> + Send;

    /// Terminates the underlying session.
    fn close(&self) -> impl Future<Output = Result<()>> + Send;
}

/// [`Sender`] backed by one authenticated SMTP session.
#[derive(Debug)]
pub struct SmtpSender {
    from: String,
    session: Mutex<Session>,
}

impl SmtpSender {
    /// Opens a session using `config`, logging session events through `tracing`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Connection`](crate::Error::Connection),
    /// [`Error::Auth`](crate::Error::Auth) or
    /// [`Error::Timeout`](crate::Error::Timeout) if the session cannot be opened.
    pub async fn connect(config: &SmtpConfig) -> Result<Self> {
        Self::with_observer(config, LoggingObserver).await
    }

    /// Opens a session that reports its progress to `observer`.
    ///
    /// # Errors
    ///
    /// Same as [`SmtpSender::connect`].
    pub async fn with_observer(
        config: &SmtpConfig,
        observer: impl SessionObserver + 'static,
    ) -> Result<Self> {
        let session =
            Session::open_with_observer(config.session_config(), Box::new(observer)).await?;
        Ok(Self {
            from: config.username.clone(),
            session: Mutex::new(session),
        })
    }

    /// Returns the address used in `From` and `MAIL FROM`.
    #[must_use]
    pub fn from_address(&self) -> &str {
        &self.from
    }

    /// Returns the session status, waiting for a running send to finish.
    pub async fn status(&self) -> SessionStatus {
        self.session.lock().await.status()
    }
}

impl Sender for SmtpSender {
    async fn send(
        &self,
        to: &str,
        subject: &str,
        body: &str,
        attachments: &[PathBuf],
    ) -> Result<()> {
        let builder = MessageBuilder::new()
            .from(self.from.as_str())
            .to(to)
            .subject(subject)
            .text_body(body)
            .attach_all(attachments.iter().cloned());

        // File reads and Base64 encoding block.
        let message = tokio::task::spawn_blocking(move || builder.build()).await??;

        tracing::debug!(
            to,
            attachments = attachments.len(),
            bytes = message.len(),
            "Message built"
        );

        self.session.lock().await.transmit(to, &message).await?;
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.session.lock().await.close().await?;
        Ok(())
    }
}
