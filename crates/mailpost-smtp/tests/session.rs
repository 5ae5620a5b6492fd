//! Integration tests for the SMTP session against an in-process server.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::time::Duration;

use mailpost_smtp::{
    CollectingObserver, Security, Session, SessionConfig, SessionError, SessionEvent,
    SessionStatus, Stage,
};
use mailpost_testkit::{Behavior, MockServer, PASSWORD, USERNAME};

const MESSAGE: &[u8] = b"Subject: hi\r\n\r\nHello\r\n.leading dot\r\n";

fn config(server: &MockServer) -> SessionConfig {
    SessionConfig::new("127.0.0.1", server.port())
        .credentials(USERNAME, PASSWORD)
        .security(Security::None)
        .client_hostname("client.test")
}

#[tokio::test]
async fn transmit_runs_full_transaction() {
    let server = MockServer::start().await;
    let observer = CollectingObserver::new();

    let mut session = Session::open_with_observer(config(&server), Box::new(observer.clone()))
        .await
        .unwrap();
    assert_eq!(session.status(), SessionStatus::Authenticated);

    session.transmit("a@b.com", MESSAGE).await.unwrap();
    session.close().await.unwrap();
    assert_eq!(session.status(), SessionStatus::Closed);

    assert_eq!(
        server.verbs(),
        vec!["EHLO", "AUTH", "NOOP", "MAIL", "RCPT", "DATA", "QUIT"]
    );
    let commands = server.commands();
    assert_eq!(commands[0], "EHLO client.test");
    assert_eq!(commands[3], format!("MAIL FROM:<{USERNAME}>"));
    assert_eq!(commands[4], "RCPT TO:<a@b.com>");
    assert_eq!(server.messages(), vec![MESSAGE.to_vec()]);

    assert_eq!(
        observer.events(),
        vec![
            SessionEvent::Connected("127.0.0.1".into(), server.port()),
            SessionEvent::Authenticated(USERNAME.into()),
            SessionEvent::ConnectionChecked,
            SessionEvent::SenderAccepted(USERNAME.into()),
            SessionEvent::RecipientAccepted("a@b.com".into()),
            SessionEvent::MessageSent(MESSAGE.len()),
            SessionEvent::Closed,
        ]
    );
}

#[tokio::test]
async fn session_is_reused_across_transactions() {
    let server = MockServer::start().await;
    let mut session = Session::open(config(&server)).await.unwrap();

    session.transmit("one@example.com", b"first\r\n").await.unwrap();
    session.transmit("two@example.com", b"second\r\n").await.unwrap();

    assert_eq!(server.connections(), 1);
    assert_eq!(
        server.messages(),
        vec![b"first\r\n".to_vec(), b"second\r\n".to_vec()]
    );
    assert!(session.is_usable());
}

#[tokio::test]
async fn login_without_domain_is_envelope_sender() {
    let server = MockServer::with_behavior(Behavior {
        credentials: Some(("mailer", PASSWORD)),
        ..Behavior::default()
    })
    .await;
    let config = config(&server).credentials("mailer", PASSWORD);
    let mut session = Session::open(config).await.unwrap();

    session.transmit("a@b.com", MESSAGE).await.unwrap();

    assert_eq!(
        server.verbs(),
        vec!["EHLO", "AUTH", "NOOP", "MAIL", "RCPT", "DATA"]
    );
    assert_eq!(server.commands()[3], "MAIL FROM:<mailer>");
    assert_eq!(server.messages(), vec![MESSAGE.to_vec()]);
    assert!(session.is_usable());
}

#[tokio::test]
async fn invalid_password_is_auth_error() {
    let server = MockServer::start().await;
    let observer = CollectingObserver::new();
    let config = config(&server).credentials(USERNAME, "wrong");

    let err = Session::open_with_observer(config, Box::new(observer.clone()))
        .await
        .unwrap_err();

    assert!(matches!(err, SessionError::Auth(_)), "got {err:?}");
    assert!(matches!(
        observer.events().last(),
        Some(SessionEvent::Failed(_))
    ));
    assert_eq!(server.verbs(), vec!["EHLO", "AUTH"]);
}

#[tokio::test]
async fn refused_connection_is_connection_error() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let config = SessionConfig::new("127.0.0.1", port)
        .credentials(USERNAME, PASSWORD)
        .security(Security::None);

    let err = Session::open(config).await.unwrap_err();
    assert!(matches!(err, SessionError::Connection(_)), "got {err:?}");
}

#[tokio::test]
async fn rejected_recipient_invalidates_session() {
    let server = MockServer::with_behavior(Behavior {
        rejected_recipients: vec!["nobody@example.com".into()],
        ..Behavior::default()
    })
    .await;
    let mut session = Session::open(config(&server)).await.unwrap();

    let err = session
        .transmit("nobody@example.com", MESSAGE)
        .await
        .unwrap_err();
    assert!(
        matches!(
            err,
            SessionError::Recipient {
                stage: Stage::RcptTo,
                ..
            }
        ),
        "got {err:?}"
    );
    assert_eq!(session.status(), SessionStatus::Failed);

    let err = session.transmit("a@b.com", MESSAGE).await.unwrap_err();
    assert!(matches!(err, SessionError::Unusable(_)));

    // Nothing was sent after the rejection
    assert_eq!(server.verbs().last().map(String::as_str), Some("RCPT"));
    assert!(server.messages().is_empty());

    // Closing a failed session is a no-op
    session.close().await.unwrap();
    assert_eq!(session.status(), SessionStatus::Closed);
}

#[tokio::test]
async fn malformed_recipient_keeps_session_usable() {
    let server = MockServer::start().await;
    let mut session = Session::open(config(&server)).await.unwrap();

    let err = session
        .transmit("not-an-address", MESSAGE)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        SessionError::Recipient {
            stage: Stage::RcptTo,
            ..
        }
    ));
    assert!(session.is_usable());
    assert_eq!(server.verbs(), vec!["EHLO", "AUTH"]);

    session.transmit("a@b.com", MESSAGE).await.unwrap();
}

#[tokio::test]
async fn dropped_connection_is_transport_error() {
    let server = MockServer::with_behavior(Behavior {
        drop_on: Some("NOOP"),
        ..Behavior::default()
    })
    .await;
    let mut session = Session::open(config(&server)).await.unwrap();

    let err = session.transmit("a@b.com", MESSAGE).await.unwrap_err();
    assert!(
        matches!(
            err,
            SessionError::Transport {
                stage: Stage::Check,
                ..
            }
        ),
        "got {err:?}"
    );
    assert_eq!(session.status(), SessionStatus::Failed);
    assert!(!server.verbs().contains(&"MAIL".to_string()));
}

#[tokio::test]
async fn oversized_message_is_refused_before_mail_from() {
    let server = MockServer::with_behavior(Behavior {
        size_limit: Some(16),
        ..Behavior::default()
    })
    .await;
    let mut session = Session::open(config(&server)).await.unwrap();
    assert_eq!(
        session.server_info().and_then(|i| i.max_message_size()),
        Some(16)
    );

    let err = session.transmit("a@b.com", &[b'x'; 64]).await.unwrap_err();
    assert!(matches!(
        err,
        SessionError::MessageTooLarge {
            size: 64,
            limit: 16
        }
    ));
    assert!(session.is_usable());

    session.transmit("a@b.com", b"small\r\n").await.unwrap();
    assert!(
        server
            .commands()
            .contains(&format!("MAIL FROM:<{USERNAME}> SIZE=7"))
    );
}

#[tokio::test]
async fn eight_bit_body_is_declared() {
    let server = MockServer::with_behavior(Behavior {
        eight_bit: true,
        ..Behavior::default()
    })
    .await;
    let mut session = Session::open(config(&server)).await.unwrap();

    session.transmit("a@b.com", b"plain\r\n").await.unwrap();
    session
        .transmit("a@b.com", "Grüße\r\n".as_bytes())
        .await
        .unwrap();

    let mails: Vec<String> = server
        .commands()
        .into_iter()
        .filter(|c| c.starts_with("MAIL"))
        .collect();
    assert_eq!(
        mails,
        vec![
            format!("MAIL FROM:<{USERNAME}> BODY=7BIT"),
            format!("MAIL FROM:<{USERNAME}> BODY=8BITMIME"),
        ]
    );
    assert_eq!(server.messages()[1], "Grüße\r\n".as_bytes());
}

#[tokio::test]
async fn stalled_data_phase_times_out() {
    let server = MockServer::with_behavior(Behavior {
        stall_on: Some("DATA"),
        ..Behavior::default()
    })
    .await;
    let config = config(&server).command_timeout(Duration::from_millis(300));
    let mut session = Session::open(config).await.unwrap();

    let err = session.transmit("a@b.com", MESSAGE).await.unwrap_err();
    assert!(
        matches!(
            err,
            SessionError::Timeout {
                stage: Stage::Data,
                ..
            }
        ),
        "got {err:?}"
    );
    assert_eq!(session.status(), SessionStatus::Failed);
}

#[tokio::test]
async fn stalled_greeting_exchange_times_out() {
    let server = MockServer::with_behavior(Behavior {
        stall_on: Some("EHLO"),
        ..Behavior::default()
    })
    .await;
    let config = config(&server).connect_timeout(Duration::from_millis(300));

    let err = Session::open(config).await.unwrap_err();
    assert!(
        matches!(
            err,
            SessionError::Timeout {
                stage: Stage::Connect,
                ..
            }
        ),
        "got {err:?}"
    );
}

#[tokio::test]
async fn transmit_after_close_is_unusable() {
    let server = MockServer::start().await;
    let mut session = Session::open(config(&server)).await.unwrap();

    session.close().await.unwrap();
    session.close().await.unwrap();

    let err = session.transmit("a@b.com", MESSAGE).await.unwrap_err();
    assert!(matches!(err, SessionError::Unusable(_)));
    assert_eq!(server.verbs().iter().filter(|v| *v == "QUIT").count(), 1);
}
