//! Sending through a `Transport`.

use std::sync::Mutex;

use mailwright::{Email, Error, MimeMessage, Session, Transport};

/// Records every delivery instead of opening a connection.
#[derive(Debug, Default)]
struct RecordingTransport {
    sent: Mutex<Vec<(String, Vec<u8>)>>,
    fail: bool,
}

impl Transport for RecordingTransport {
    async fn send(&self, session: &Session, message: &MimeMessage) -> mailwright_smtp::Result<()> {
        if self.fail {
            return Err(mailwright_smtp::Error::smtp_error(550, "mailbox unavailable"));
        }
        self.sent
            .lock()
            .unwrap()
            .push((session.host.clone(), message.to_bytes()));
        Ok(())
    }
}

fn email() -> Email {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();

    let mut email = Email::new();
    email.set_host_name("smtp.example.com");
    email.set_from("a@dev.com").unwrap();
    email.add_to("b@x.edu").unwrap();
    email.set_subject("Hello").set_content("Hi there", "text/plain");
    email
}

#[tokio::test]
async fn test_send_delivers_once() {
    let transport = RecordingTransport::default();
    let mut email = email();

    email.send(&transport).await.unwrap();
    let err = email.send(&transport).await.unwrap_err();
    assert!(matches!(err, Error::IllegalState(_)));

    let sent = transport.sent.lock().unwrap();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, "smtp.example.com");
    let text = String::from_utf8(sent[0].1.clone()).unwrap();
    assert!(text.contains("Subject: Hello\r\n"));
    assert!(text.ends_with("Hi there\r\n"));
}

#[tokio::test]
async fn test_send_reports_transport_failure() {
    let transport = RecordingTransport {
        fail: true,
        ..RecordingTransport::default()
    };
    let mut email = email();

    let err = email.send(&transport).await.unwrap_err();
    match err {
        Error::Transport(inner) => assert!(inner.is_permanent()),
        other => panic!("Expected transport error, got {other:?}"),
    }
    assert!(email.message().is_some());
}

#[tokio::test]
async fn test_send_without_host_fails_before_transport() {
    let transport = RecordingTransport::default();
    let mut email = Email::new();
    email.set_from("a@dev.com").unwrap();
    email.add_to("b@x.edu").unwrap();

    let err = email.send(&transport).await.unwrap_err();
    assert!(matches!(err, Error::Session(_)));
    assert!(transport.sent.lock().unwrap().is_empty());
}
