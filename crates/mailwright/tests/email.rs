//! Builder and session-resolution behavior of `Email`.

use std::sync::Arc;
use std::time::Duration;

use mailwright::{Email, Error, MessageState, RecipientType, Security, Session, SessionSettings};

fn email() -> Email {
    let mut email = Email::new();
    email.set_host_name("smtp.example.com");
    email
}

#[test]
fn test_add_bcc_empty_batch_fails() {
    let mut email = email();
    let err = email.add_bcc_many(Vec::<&str>::new()).unwrap_err();
    assert!(matches!(err, Error::InvalidAddress(_)));

    email.add_bcc("someone@example.com").unwrap();
    let err = email.add_bcc_many(Vec::<&str>::new()).unwrap_err();
    assert!(matches!(err, Error::InvalidAddress(_)));
    assert_eq!(email.bcc().len(), 1);
}

#[test]
#[should_panic(expected = "empty")]
fn test_add_header_without_name_panics() {
    email().add_header("", "value");
}

#[test]
#[should_panic(expected = "empty")]
fn test_add_header_without_value_panics() {
    email().add_header("key", "");
}

#[test]
fn test_build_twice_is_illegal() {
    let mut email = email();
    email.set_from("a@dev.com").unwrap();
    email.add_to("b@x.edu").unwrap();

    email.build_message().unwrap();
    assert_eq!(email.state(), MessageState::Built);
    assert!(matches!(email.build_message().unwrap_err(), Error::IllegalState(_)));
}

#[test]
fn test_build_without_sender_or_recipient() {
    let mut email = email();
    assert!(matches!(email.build_message().unwrap_err(), Error::IncompleteMessage(_)));
    assert_eq!(email.state(), MessageState::Unbuilt);

    email.set_from("a@dev.com").unwrap();
    assert!(matches!(email.build_message().unwrap_err(), Error::IncompleteMessage(_)));
}

#[test]
fn test_build_minimal_message() {
    let mut email = email();
    email.set_from("a@dev.com").unwrap();
    email.add_to("b@x.edu").unwrap();

    let message = email.build_message().unwrap();
    assert_eq!(message.from().unwrap().address.as_str(), "a@dev.com");
    assert_eq!(message.all_recipients().len(), 1);
    assert_eq!(message.charset(), None);
}

#[test]
fn test_build_with_every_recipient_kind() {
    let mut email = email();
    email.set_from("a@dev.com").unwrap();
    email.add_to("to@x.edu").unwrap();
    email.add_cc("cc@x.edu").unwrap();
    email.add_bcc("bcc@x.edu").unwrap();
    email.add_header("key", "value");

    let message = email.build_message().unwrap();
    assert_eq!(message.recipients(RecipientType::To).len(), 1);
    assert_eq!(message.recipients(RecipientType::Cc).len(), 1);
    assert_eq!(message.recipients(RecipientType::Bcc).len(), 1);
    assert_eq!(message.all_recipients().len(), 3);
    assert_eq!(message.header("key"), Some("value"));
}

#[test]
fn test_content_does_not_replace_recipients() {
    let mut email = email();
    email.set_from("a@dev.com").unwrap();
    email.set_content("body", "text/plain");
    assert!(matches!(email.build_message().unwrap_err(), Error::IncompleteMessage(_)));
}

#[test]
fn test_serialized_message_hides_bcc() {
    let mut email = email();
    email.set_from_with_name("a@dev.com", "Dev Team").unwrap();
    email.add_to("to@x.edu").unwrap();
    email.add_bcc("hidden@x.edu").unwrap();
    email.set_subject("Report").set_content("<b>done</b>", "text/html");

    let text = String::from_utf8(email.build_message().unwrap().to_bytes()).unwrap();
    assert!(text.contains("From: Dev Team <a@dev.com>\r\n"));
    assert!(text.contains("Content-Type: text/html\r\n"));
    assert!(!text.contains("hidden@x.edu"));
    assert!(!text.to_ascii_lowercase().contains("\r\nbcc:"));
}

#[test]
fn test_session_without_host() {
    let mut email = Email::new();
    assert!(matches!(email.mail_session().unwrap_err(), Error::Session(_)));
}

#[test]
fn test_supplied_session_is_returned_unchanged() {
    let supplied = Arc::new(
        Session::builder("relay.example.com")
            .port(2525)
            .security(Security::StartTls)
            .build(),
    );

    let mut email = email();
    email.set_smtp_port(25);
    email.set_mail_session(Arc::clone(&supplied));
    email.set_ssl_on_connect(true).set_host_name("ignored.example.com");

    assert_eq!(email.host_name(), Some("relay.example.com"));
    let session = email.mail_session().unwrap();
    assert!(Arc::ptr_eq(&session, &supplied));
    assert_eq!(session.port, 2525);
}

#[test]
fn test_supplied_session_replaces_cached_one() {
    let mut email = email();
    let resolved = email.mail_session().unwrap();
    assert_eq!(resolved.host, "smtp.example.com");

    let supplied = Arc::new(Session::new("relay.example.com"));
    email.set_mail_session(Arc::clone(&supplied));
    assert!(Arc::ptr_eq(&email.mail_session().unwrap(), &supplied));
}

#[test]
fn test_session_from_settings() {
    let settings = SessionSettings::from_json(
        r#"{
            "host_name": "smtp.example.com",
            "ssl_on_connect": true,
            "connect_timeout": 10,
            "check_server_identity": true,
            "pop_before_smtp": {
                "host": "pop.example.com",
                "protocol": "pop3s",
                "username": "jdoe",
                "password": "secret"
            }
        }"#,
    )
    .unwrap();

    let mut email = Email::with_settings(settings);
    let session = email.mail_session().unwrap();
    assert_eq!(session.security, Security::Tls);
    assert_eq!(session.port, 465);
    assert_eq!(session.connect_timeout, Duration::from_secs(10));
    assert!(session.check_server_identity);

    let pop = session.pop_before_smtp.as_ref().unwrap();
    assert_eq!(pop.port(), 995);
    assert_eq!(pop.username, "jdoe");
}
