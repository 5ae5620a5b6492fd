//! Low-level SMTP stream handling.

use crate::error::{Error, Result};
use crate::parser;
use crate::types::Reply;
use rustls::pki_types::ServerName;
use std::sync::Arc;
use tokio::io::{AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio_rustls::{
    TlsConnector,
    rustls::{ClientConfig, RootCertStore},
};

/// SMTP stream (TCP or TLS).
#[derive(Debug)]
pub enum SmtpStream {
    /// Plain TCP connection.
    Tcp(BufReader<TcpStream>),
    /// TLS-encrypted connection.
    Tls(Box<BufReader<tokio_rustls::client::TlsStream<TcpStream>>>),
}

impl SmtpStream {
    /// Returns true if the stream is encrypted.
    #[must_use]
    pub const fn is_tls(&self) -> bool {
        matches!(self, Self::Tls(_))
    }

    /// Reads one complete reply from the stream.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConnectionClosed`] on EOF, or an I/O or parse error.
    pub async fn read_reply(&mut self) -> Result<Reply> {
        match self {
            Self::Tcp(reader) => parser::read_reply(reader).await,
            Self::Tls(reader) => parser::read_reply(&mut **reader).await,
        }
    }

    /// Writes data to the stream and flushes it.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub async fn write_all(&mut self, data: &[u8]) -> Result<()> {
        match self {
            Self::Tcp(reader) => {
                reader.get_mut().write_all(data).await?;
                reader.get_mut().flush().await?;
            }
            Self::Tls(reader) => {
                reader.get_mut().write_all(data).await?;
                reader.get_mut().flush().await?;
            }
        }
        Ok(())
    }

    /// Upgrades a TCP stream to TLS.
    ///
    /// # Errors
    ///
    /// Returns an error if the stream is already encrypted or the handshake fails.
    pub async fn upgrade_to_tls(self, hostname: &str) -> Result<Self> {
        let tcp_stream = match self {
            Self::Tcp(reader) => {
                if !reader.buffer().is_empty() {
                    return Err(Error::Protocol(
                        "Server sent data before the TLS handshake".into(),
                    ));
                }
                reader.into_inner()
            }
            Self::Tls(_) => return Err(Error::Protocol("Already using TLS".into())),
        };

        let tls_stream = create_tls_connector()
            .connect(server_name(hostname)?, tcp_stream)
            .await?;
        Ok(Self::Tls(Box::new(BufReader::new(tls_stream))))
    }
}

/// Connects to an SMTP server over plain TCP.
///
/// # Errors
///
/// Returns an error if the connection fails.
pub async fn connect(hostname: &str, port: u16) -> Result<SmtpStream> {
    let stream = TcpStream::connect((hostname, port)).await?;
    tracing::debug!(hostname, port, "TCP connection established");
    Ok(SmtpStream::Tcp(BufReader::new(stream)))
}

/// Connects to an SMTP server over TLS (implicit TLS on port 465).
///
/// # Errors
///
/// Returns an error if the connection or TLS handshake fails.
pub async fn connect_tls(hostname: &str, port: u16) -> Result<SmtpStream> {
    let name = server_name(hostname)?;
    let tcp_stream = TcpStream::connect((hostname, port)).await?;
    let tls_stream = create_tls_connector().connect(name, tcp_stream).await?;
    tracing::debug!(hostname, port, "TLS connection established");
    Ok(SmtpStream::Tls(Box::new(BufReader::new(tls_stream))))
}

fn server_name(hostname: &str) -> Result<ServerName<'static>> {
    ServerName::try_from(hostname.to_string())
        .map_err(|_| Error::Protocol(format!("Invalid hostname: {hostname}")))
}

/// Creates a TLS connector trusting the bundled web PKI roots.
fn create_tls_connector() -> TlsConnector {
    let root_store = RootCertStore {
        roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
    };

    let config = ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth();

    TlsConnector::from(Arc::new(config))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[test]
    fn test_server_name_rejects_garbage() {
        assert!(server_name("smtp.example.com").is_ok());
        assert!(server_name("not a host").is_err());
    }

    #[tokio::test]
    async fn test_plain_stream_reads_and_writes() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            socket.write_all(b"220 hello\r\n").await.unwrap();
            let mut buf = [0u8; 6];
            tokio::io::AsyncReadExt::read_exact(&mut socket, &mut buf)
                .await
                .unwrap();
            buf
        });

        let mut stream = connect("127.0.0.1", port).await.unwrap();
        assert!(!stream.is_tls());
        assert_eq!(stream.read_reply().await.unwrap().code.as_u16(), 220);
        stream.write_all(b"NOOP\r\n").await.unwrap();

        assert_eq!(&server.await.unwrap(), b"NOOP\r\n");
        assert!(matches!(
            stream.read_reply().await.unwrap_err(),
            Error::ConnectionClosed
        ));
    }
}
