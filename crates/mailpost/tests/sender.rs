//! End-to-end tests for `SmtpSender` against an in-process SMTP server.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::path::PathBuf;
use std::sync::Arc;

use mailpost::{
    CollectingObserver, Error, Security, Sender, SessionEvent, SessionStatus, SmtpConfig,
    SmtpSender, Stage,
};
use mailpost_mime::ParsedMessage;
use mailpost_testkit::{Behavior, MockServer, PASSWORD, USERNAME};

fn config(server: &MockServer) -> SmtpConfig {
    SmtpConfig::builder("127.0.0.1")
        .port(server.port())
        .security(Security::None)
        .credentials(USERNAME, PASSWORD)
        .client_hostname("client.test")
        .build()
}

#[tokio::test]
async fn send_without_attachments_is_single_text_part() {
    let server = MockServer::start().await;
    let sender = SmtpSender::connect(&config(&server)).await.unwrap();

    sender.send("a@b.com", "Hi", "Hello", &[]).await.unwrap();

    assert_eq!(
        server.verbs(),
        vec!["EHLO", "AUTH", "NOOP", "MAIL", "RCPT", "DATA"]
    );

    let messages = server.messages();
    assert_eq!(messages.len(), 1);
    let raw = String::from_utf8(messages[0].clone()).unwrap();
    assert!(!raw.contains("Content-Disposition"));

    let parsed = ParsedMessage::parse(&messages[0]).unwrap();
    assert_eq!(parsed.parts.len(), 1);
    assert_eq!(parsed.from(), Some(USERNAME));
    assert_eq!(parsed.to(), Some("a@b.com"));
    assert_eq!(parsed.subject().as_deref(), Some("Hi"));
    assert_eq!(parsed.text_body().unwrap(), "Hello");

    sender.close().await.unwrap();
    assert_eq!(server.verbs().last().map(String::as_str), Some("QUIT"));
}

#[tokio::test]
async fn attachments_arrive_in_order_and_intact() {
    let dir = tempfile::tempdir().unwrap();
    let notes = dir.path().join("notes.txt");
    let data = dir.path().join("data.bin");
    std::fs::write(&notes, "line one\nline two\n").unwrap();
    let bytes: Vec<u8> = (0..=255).collect();
    std::fs::write(&data, &bytes).unwrap();

    let server = MockServer::start().await;
    let sender = SmtpSender::connect(&config(&server)).await.unwrap();

    sender
        .send(
            "a@b.com",
            "Files",
            "Two files attached.",
            &[notes.clone(), data.clone()],
        )
        .await
        .unwrap();

    let parsed = ParsedMessage::parse(&server.messages()[0]).unwrap();
    assert_eq!(parsed.parts.len(), 3);
    assert_eq!(parsed.text_body().unwrap(), "Two files attached.");

    let attachments: Vec<_> = parsed.attachments().collect();
    assert_eq!(attachments.len(), 2);
    assert_eq!(attachments[0].filename().as_deref(), Some("notes.txt"));
    assert_eq!(
        attachments[0].decode_body().unwrap(),
        b"line one\nline two\n".to_vec()
    );
    assert_eq!(attachments[1].filename().as_deref(), Some("data.bin"));
    assert_eq!(attachments[1].decode_body().unwrap(), bytes);
}

#[tokio::test]
async fn missing_attachment_sends_no_commands() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("missing.pdf");

    let server = MockServer::start().await;
    let sender = SmtpSender::connect(&config(&server)).await.unwrap();

    let err = sender
        .send("a@b.com", "Hi", "Hello", &[missing.clone()])
        .await
        .unwrap_err();

    assert!(
        matches!(&err, Error::AttachmentNotFound { path, .. } if *path == missing),
        "got {err:?}"
    );
    assert!(err.is_build_error());
    assert!(!err.invalidates_session());

    // Only the session setup reached the server
    assert_eq!(server.verbs(), vec!["EHLO", "AUTH"]);
    assert_eq!(sender.status().await, SessionStatus::Authenticated);

    sender.send("a@b.com", "Hi", "Hello", &[]).await.unwrap();
}

#[tokio::test]
async fn unreadable_attachment_sends_no_commands() {
    let dir = tempfile::tempdir().unwrap();
    let folder = dir.path().to_path_buf();

    let server = MockServer::start().await;
    let sender = SmtpSender::connect(&config(&server)).await.unwrap();

    // Opening a directory succeeds, reading it does not
    let err = sender
        .send("a@b.com", "Hi", "Hello", &[folder.clone()])
        .await
        .unwrap_err();

    assert!(
        matches!(&err, Error::AttachmentEncoding { path, .. } if *path == folder),
        "got {err:?}"
    );
    assert!(err.is_build_error());
    assert!(!err.invalidates_session());
    assert_eq!(server.verbs(), vec!["EHLO", "AUTH"]);
    assert_eq!(sender.status().await, SessionStatus::Authenticated);
}

#[tokio::test]
async fn invalid_password_is_auth_error() {
    let server = MockServer::start().await;
    let mut config = config(&server);
    config.password = "wrong".into();

    let err = SmtpSender::connect(&config).await.unwrap_err();
    assert!(matches!(err, Error::Auth(_)), "got {err:?}");
    assert!(err.invalidates_session());
}

#[tokio::test]
async fn concurrent_sends_do_not_interleave() {
    let server = MockServer::start().await;
    let sender = Arc::new(SmtpSender::connect(&config(&server)).await.unwrap());

    let recipients: Vec<String> = (0..4).map(|i| format!("user{i}@example.com")).collect();
    let handles: Vec<_> = recipients
        .iter()
        .cloned()
        .map(|to| {
            let sender = Arc::clone(&sender);
            tokio::spawn(async move {
                let body = format!("Hello {to}");
                sender.send(&to, "Hi", &body, &[]).await
            })
        })
        .collect();

    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let verbs = server.verbs();
    assert_eq!(&verbs[..2], ["EHLO", "AUTH"]);
    for transaction in verbs[2..].chunks(4) {
        assert_eq!(transaction, ["NOOP", "MAIL", "RCPT", "DATA"]);
    }

    // Each message follows its own RCPT
    let rcpts: Vec<String> = server
        .commands()
        .into_iter()
        .filter(|c| c.starts_with("RCPT"))
        .collect();
    let messages = server.messages();
    assert_eq!(messages.len(), recipients.len());
    for (rcpt, raw) in rcpts.iter().zip(&messages) {
        let parsed = ParsedMessage::parse(raw).unwrap();
        let to = parsed.to().unwrap();
        assert_eq!(rcpt, &format!("RCPT TO:<{to}>"));
        assert_eq!(parsed.text_body().unwrap(), format!("Hello {to}"));
    }
    assert_eq!(server.connections(), 1);
}

#[tokio::test]
async fn send_after_close_is_unusable() {
    let server = MockServer::start().await;
    let sender = SmtpSender::connect(&config(&server)).await.unwrap();

    sender.close().await.unwrap();
    sender.close().await.unwrap();

    let err = sender.send("a@b.com", "Hi", "Hello", &[]).await.unwrap_err();
    assert!(matches!(err, Error::SessionUnusable(_)), "got {err:?}");
    assert_eq!(sender.status().await, SessionStatus::Closed);
}

#[tokio::test]
async fn rejected_recipient_requires_new_sender() {
    let server = MockServer::with_behavior(Behavior {
        rejected_recipients: vec!["ghost@example.com".into()],
        ..Behavior::default()
    })
    .await;
    let sender = SmtpSender::connect(&config(&server)).await.unwrap();

    let err = sender
        .send("ghost@example.com", "Hi", "Hello", &[])
        .await
        .unwrap_err();
    assert!(
        matches!(
            err,
            Error::Recipient {
                stage: Stage::RcptTo,
                ..
            }
        ),
        "got {err:?}"
    );
    assert!(err.invalidates_session());
    assert_eq!(sender.status().await, SessionStatus::Failed);

    let err = sender.send("a@b.com", "Hi", "Hello", &[]).await.unwrap_err();
    assert!(matches!(err, Error::SessionUnusable(_)));

    let fresh = SmtpSender::connect(&config(&server)).await.unwrap();
    fresh.send("a@b.com", "Hi", "Hello", &[]).await.unwrap();
    assert_eq!(server.connections(), 2);
}

#[tokio::test]
async fn stalled_server_times_out() {
    let server = MockServer::with_behavior(Behavior {
        stall_on: Some("DATA"),
        ..Behavior::default()
    })
    .await;
    let mut config = config(&server);
    config.command_timeout_secs = 1;
    let sender = SmtpSender::connect(&config).await.unwrap();

    let err = sender.send("a@b.com", "Hi", "Hello", &[]).await.unwrap_err();
    assert!(
        matches!(
            err,
            Error::Timeout {
                stage: Stage::Data,
                ..
            }
        ),
        "got {err:?}"
    );
    assert_eq!(sender.status().await, SessionStatus::Failed);
}

#[tokio::test]
async fn observer_sees_each_stage() {
    let server = MockServer::start().await;
    let observer = CollectingObserver::new();
    let sender = SmtpSender::with_observer(&config(&server), observer.clone())
        .await
        .unwrap();

    sender
        .send("a@b.com", "Hi", "Hello", &Vec::<PathBuf>::new())
        .await
        .unwrap();
    sender.close().await.unwrap();

    let events = observer.events();
    assert_eq!(
        events.first(),
        Some(&SessionEvent::Connected("127.0.0.1".into(), server.port()))
    );
    assert!(events.contains(&SessionEvent::RecipientAccepted("a@b.com".into())));
    assert!(
        events
            .iter()
            .any(|e| matches!(e, SessionEvent::MessageSent(bytes) if *bytes > 0))
    );
    assert_eq!(events.last(), Some(&SessionEvent::Closed));
}
