//! `mailpost` - send one email with attachments from the command line.
//!
//! ```text
//! mailpost [--config smtp.json] <to> <subject> <body> [attachment...]
//! ```
//!
//! Without `--config`, settings come from `SMTP_*` environment variables,
//! optionally loaded from a `.env` file.

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

use std::path::PathBuf;

use anyhow::{Context, bail};
use mailpost::{Sender, SmtpConfig, SmtpSender};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const USAGE: &str = "usage: mailpost [--config smtp.json] <to> <subject> <body> [attachment...]";

/// Parsed command line.
struct Args {
    config: Option<PathBuf>,
    to: String,
    subject: String,
    body: String,
    attachments: Vec<PathBuf>,
}

impl Args {
    fn parse(mut args: impl Iterator<Item = String>) -> anyhow::Result<Self> {
        let mut config = None;
        let mut positional = Vec::new();

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "-c" | "--config" => {
                    let path = args.next().context("--config needs a file path")?;
                    config = Some(PathBuf::from(path));
                }
                "-h" | "--help" => bail!(USAGE),
                _ => positional.push(arg),
            }
        }

        let mut positional = positional.into_iter();
        let (Some(to), Some(subject), Some(body)) =
            (positional.next(), positional.next(), positional.next())
        else {
            bail!(USAGE);
        };

        Ok(Self {
            config,
            to,
            subject,
            body,
            attachments: positional.map(PathBuf::from).collect(),
        })
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse(std::env::args().skip(1))?;

    let config = match &args.config {
        Some(path) => SmtpConfig::load(path)?,
        None => SmtpConfig::from_env().context("reading SMTP settings from the environment")?,
    };

    info!(host = %config.host, port = config.port, security = config.security.display_name(), "Connecting");
    let sender = SmtpSender::connect(&config)
        .await
        .with_context(|| format!("opening SMTP session to {}:{}", config.host, config.port))?;

    let sent = sender
        .send(&args.to, &args.subject, &args.body, &args.attachments)
        .await;

    if let Err(error) = sender.close().await {
        warn!(%error, "Session did not close cleanly");
    }

    sent.with_context(|| format!("sending to {}", args.to))?;
    info!(to = %args.to, attachments = args.attachments.len(), "Message sent");
    Ok(())
}
