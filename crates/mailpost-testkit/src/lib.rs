//! # mailpost-testkit
//!
//! In-process SMTP server for the integration tests of the mailpost crates.
//!
//! The server speaks just enough ESMTP for a submission client: EHLO with a
//! configurable capability list, AUTH PLAIN against one set of credentials,
//! NOOP, MAIL, RCPT, DATA, RSET and QUIT. Every command line and every
//! received message is recorded.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::missing_panics_doc)]
#![forbid(unsafe_code)]

use base64::Engine;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};

/// Login accepted unless [`Behavior::credentials`] overrides it.
pub const USERNAME: &str = "sender@example.com";
/// Password accepted unless [`Behavior::credentials`] overrides it.
pub const PASSWORD: &str = "correct-horse";

/// How the server reacts to the client.
#[derive(Debug, Clone, Default)]
pub struct Behavior {
    /// Recipients answered with 550.
    pub rejected_recipients: Vec<String>,
    /// Advertised SIZE limit.
    pub size_limit: Option<usize>,
    /// Advertise 8BITMIME.
    pub eight_bit: bool,
    /// Command verb after which the server stops answering.
    pub stall_on: Option<&'static str>,
    /// Command verb answered with 421 followed by a disconnect.
    pub drop_on: Option<&'static str>,
    /// Login and password to accept instead of [`USERNAME`] and [`PASSWORD`].
    pub credentials: Option<(&'static str, &'static str)>,
}

impl Behavior {
    fn login(&self) -> (&'static str, &'static str) {
        self.credentials.unwrap_or((USERNAME, PASSWORD))
    }
}

/// Everything the server saw.
#[derive(Debug, Default)]
pub struct Recorded {
    /// Command lines in arrival order, AUTH payload included.
    pub commands: Vec<String>,
    /// Message bodies with dot-stuffing removed.
    pub messages: Vec<Vec<u8>>,
    /// Number of accepted connections.
    pub connections: usize,
}

/// Handle on a running mock server.
pub struct MockServer {
    /// Listening address on the loopback interface.
    pub addr: SocketAddr,
    recorded: Arc<Mutex<Recorded>>,
}

impl MockServer {
    /// Starts a server with the default behavior.
    pub async fn start() -> Self {
        Self::with_behavior(Behavior::default()).await
    }

    /// Starts a server that accepts connections until the test ends.
    pub async fn with_behavior(behavior: Behavior) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let recorded = Arc::new(Mutex::new(Recorded::default()));

        let shared = Arc::clone(&recorded);
        tokio::spawn(async move {
            while let Ok((socket, _)) = listener.accept().await {
                shared.lock().unwrap().connections += 1;
                tokio::spawn(serve(socket, behavior.clone(), Arc::clone(&shared)));
            }
        });

        Self { addr, recorded }
    }

    /// Listening port.
    #[must_use]
    pub const fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Recorded command lines.
    #[must_use]
    pub fn commands(&self) -> Vec<String> {
        self.recorded.lock().unwrap().commands.clone()
    }

    /// Command verbs, without arguments.
    #[must_use]
    pub fn verbs(&self) -> Vec<String> {
        self.commands().iter().map(|c| verb(c)).collect()
    }

    /// Received message bodies.
    #[must_use]
    pub fn messages(&self) -> Vec<Vec<u8>> {
        self.recorded.lock().unwrap().messages.clone()
    }

    /// Number of accepted connections.
    #[must_use]
    pub fn connections(&self) -> usize {
        self.recorded.lock().unwrap().connections
    }
}

fn verb(line: &str) -> String {
    line.split([' ', ':'])
        .next()
        .unwrap_or_default()
        .to_ascii_uppercase()
}

async fn serve(socket: TcpStream, behavior: Behavior, recorded: Arc<Mutex<Recorded>>) {
    let (read, mut write) = socket.into_split();
    let mut reader = BufReader::new(read);

    if write.write_all(b"220 mock.test ESMTP ready\r\n").await.is_err() {
        return;
    }

    let mut line = String::new();
    loop {
        line.clear();
        match reader.read_line(&mut line).await {
            Ok(0) | Err(_) => return,
            Ok(_) => {}
        }
        let command = line.trim_end_matches(['\r', '\n']).to_string();
        recorded.lock().unwrap().commands.push(command.clone());

        let name = verb(&command);
        if behavior.stall_on.is_some_and(|s| s == name) {
            std::future::pending::<()>().await;
        }
        if behavior.drop_on.is_some_and(|s| s == name) {
            let _ = write.write_all(b"421 4.3.2 shutting down\r\n").await;
            return;
        }

        let reply = match name.as_str() {
            "EHLO" => ehlo_reply(&behavior),
            "AUTH" => auth_reply(&command, behavior.login()),
            "MAIL" | "NOOP" | "RSET" => "250 2.0.0 OK\r\n".to_string(),
            "RCPT" => {
                let rejected = behavior
                    .rejected_recipients
                    .iter()
                    .any(|r| command.contains(&format!("<{r}>")));
                if rejected {
                    "550 5.1.1 No such user\r\n".to_string()
                } else {
                    "250 2.1.5 OK\r\n".to_string()
                }
            }
            "DATA" => {
                if write.write_all(b"354 End data with <CR><LF>.<CR><LF>\r\n").await.is_err() {
                    return;
                }
                let Some(message) = read_data(&mut reader).await else {
                    return;
                };
                recorded.lock().unwrap().messages.push(message);
                "250 2.0.0 Queued\r\n".to_string()
            }
            "QUIT" => {
                let _ = write.write_all(b"221 2.0.0 Bye\r\n").await;
                return;
            }
            _ => "502 5.5.2 Command not recognized\r\n".to_string(),
        };

        if write.write_all(reply.as_bytes()).await.is_err() {
            return;
        }
    }
}

fn ehlo_reply(behavior: &Behavior) -> String {
    let mut lines = vec!["mock.test".to_string(), "AUTH PLAIN LOGIN".to_string()];
    if let Some(limit) = behavior.size_limit {
        lines.push(format!("SIZE {limit}"));
    }
    if behavior.eight_bit {
        lines.push("8BITMIME".to_string());
    }
    lines.push("PIPELINING".to_string());

    let last = lines.len() - 1;
    lines
        .iter()
        .enumerate()
        .map(|(i, l)| format!("250{}{l}\r\n", if i == last { ' ' } else { '-' }))
        .collect()
}

fn auth_reply(command: &str, (username, password): (&str, &str)) -> String {
    let expected = format!("\0{username}\0{password}");
    let ok = command
        .strip_prefix("AUTH PLAIN ")
        .and_then(|b64| base64::engine::general_purpose::STANDARD.decode(b64).ok())
        .is_some_and(|decoded| decoded == expected.as_bytes());

    if ok {
        "235 2.7.0 Authentication successful\r\n".to_string()
    } else {
        "535 5.7.8 Authentication credentials invalid\r\n".to_string()
    }
}

/// Reads message lines up to the lone `.`, undoing dot-stuffing.
async fn read_data<R>(reader: &mut R) -> Option<Vec<u8>>
where
    R: tokio::io::AsyncBufRead + Unpin,
{
    let mut message = Vec::new();
    let mut line = Vec::new();
    loop {
        line.clear();
        if reader.read_until(b'\n', &mut line).await.ok()? == 0 {
            return None;
        }
        if line == b".\r\n" {
            return Some(message);
        }
        let content = line.strip_prefix(b".").unwrap_or(&line[..]);
        message.extend_from_slice(content);
    }
}
