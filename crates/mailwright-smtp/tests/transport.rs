//! Integration tests for the SMTP transport.
//!
//! A scripted server on a loopback socket stands in for the SMTP and POP3
//! servers, so the full send path runs without external services.

use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use mailwright_mime::{ContentType, Mailbox, MimeMessage, RecipientType};
use mailwright_smtp::{
    Address, Authenticator, Error, PopBeforeSmtp, Security, Session, SmtpTransport, Transport,
};

/// What the scripted SMTP server saw.
#[derive(Debug, Default)]
struct Transcript {
    commands: Vec<String>,
    data: String,
}

/// Starts an SMTP server that accepts one session. `ehlo` is the list of
/// extension lines it advertises.
async fn smtp_server(ehlo: &'static [&'static str]) -> (u16, JoinHandle<Transcript>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let handle = tokio::spawn(async move {
        let (socket, _) = listener.accept().await.unwrap();
        let (read, mut write) = socket.into_split();
        let mut reader = BufReader::new(read);
        let mut transcript = Transcript::default();

        write.write_all(b"220 test.local ESMTP\r\n").await.unwrap();

        loop {
            let mut line = String::new();
            if reader.read_line(&mut line).await.unwrap() == 0 {
                break;
            }
            let line = line.trim_end().to_string();
            transcript.commands.push(line.clone());

            let reply = if line.starts_with("EHLO") {
                ehlo_reply(ehlo)
            } else if line.starts_with("AUTH") {
                "235 2.7.0 Accepted\r\n".to_string()
            } else if line.starts_with("DATA") {
                write.write_all(b"354 End data with <CR><LF>.<CR><LF>\r\n").await.unwrap();
                loop {
                    let mut data_line = String::new();
                    reader.read_line(&mut data_line).await.unwrap();
                    if data_line == ".\r\n" {
                        break;
                    }
                    transcript.data.push_str(&data_line);
                }
                "250 2.0.0 Queued\r\n".to_string()
            } else if line.starts_with("QUIT") {
                write.write_all(b"221 Bye\r\n").await.unwrap();
                break;
            } else {
                "250 OK\r\n".to_string()
            };
            write.write_all(reply.as_bytes()).await.unwrap();
        }

        transcript
    });

    (port, handle)
}

fn ehlo_reply(extensions: &[&str]) -> String {
    let mut lines = vec!["test.local"];
    lines.extend_from_slice(extensions);
    let last = lines.len() - 1;
    lines
        .iter()
        .enumerate()
        .map(|(i, line)| {
            let separator = if i == last { ' ' } else { '-' };
            format!("250{separator}{line}\r\n")
        })
        .collect()
}

/// Starts a POP3 server that accepts one login and records the commands.
async fn pop_server() -> (u16, JoinHandle<Vec<String>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let handle = tokio::spawn(async move {
        let (socket, _) = listener.accept().await.unwrap();
        let (read, mut write) = socket.into_split();
        let mut reader = BufReader::new(read);
        let mut commands = Vec::new();

        write.write_all(b"+OK POP3 ready\r\n").await.unwrap();
        loop {
            let mut line = String::new();
            if reader.read_line(&mut line).await.unwrap() == 0 {
                break;
            }
            let line = line.trim_end().to_string();
            let quit = line == "QUIT";
            commands.push(line);
            write.write_all(b"+OK\r\n").await.unwrap();
            if quit {
                break;
            }
        }
        commands
    });

    (port, handle)
}

fn message() -> MimeMessage {
    let mut message = MimeMessage::new();
    message.set_from(Mailbox::with_name("Sender", "sender@example.com").unwrap());
    message.add_recipients(RecipientType::To, [Mailbox::new("to@example.com").unwrap()]);
    message.add_recipients(RecipientType::Cc, [Mailbox::new("cc@example.com").unwrap()]);
    message.add_recipients(RecipientType::Bcc, [Mailbox::new("bcc@example.com").unwrap()]);
    message.set_subject("Integration");
    message.set_body(".leading dot\nsecond line", ContentType::text_plain());
    message
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("mailwright_smtp=debug")
        .with_test_writer()
        .try_init();
}

fn session(port: u16) -> mailwright_smtp::SessionBuilder {
    Session::builder("127.0.0.1")
        .port(port)
        .connect_timeout(Duration::from_secs(5))
        .read_timeout(Duration::from_secs(5))
}

#[tokio::test]
async fn test_send_plain() {
    init_tracing();
    let (port, server) = smtp_server(&["8BITMIME", "SIZE 1000000"]).await;

    SmtpTransport::new()
        .send(&session(port).build(), &message())
        .await
        .unwrap();

    let transcript = server.await.unwrap();
    assert_eq!(
        transcript.commands,
        vec![
            "EHLO localhost",
            "MAIL FROM:<sender@example.com>",
            "RCPT TO:<to@example.com>",
            "RCPT TO:<cc@example.com>",
            "RCPT TO:<bcc@example.com>",
            "DATA",
            "QUIT",
        ]
    );
    assert!(transcript.data.contains("Subject: Integration\r\n"));
    assert!(transcript.data.contains("\r\n..leading dot\r\nsecond line\r\n"));
    assert!(!transcript.data.contains("bcc@example.com"));
}

#[tokio::test]
async fn test_send_with_bounce_address_and_auth() {
    let (port, server) = smtp_server(&["AUTH PLAIN LOGIN"]).await;

    let session = session(port)
        .ehlo_name("client.example.com")
        .bounce_address(Some(Address::new("bounces@example.com").unwrap()))
        .authenticator(Some(Authenticator::plain("user", "pass")))
        .build();
    SmtpTransport::new().send(&session, &message()).await.unwrap();

    let transcript = server.await.unwrap();
    assert_eq!(transcript.commands[0], "EHLO client.example.com");
    assert!(transcript.commands[1].starts_with("AUTH PLAIN "));
    assert_eq!(transcript.commands[2], "MAIL FROM:<bounces@example.com>");
}

#[tokio::test]
async fn test_starttls_required_but_not_offered() {
    let (port, server) = smtp_server(&[]).await;

    let session = session(port)
        .security(Security::StartTls)
        .starttls_required(true)
        .build();
    let err = SmtpTransport::new().send(&session, &message()).await.unwrap_err();
    assert!(matches!(err, Error::NotSupported(ref what) if what == "STARTTLS"));

    server.abort();
}

#[tokio::test]
async fn test_starttls_optional_falls_back_to_plaintext() {
    let (port, server) = smtp_server(&[]).await;

    let session = session(port).security(Security::StartTls).build();
    SmtpTransport::new().send(&session, &message()).await.unwrap();

    let transcript = server.await.unwrap();
    assert!(!transcript.commands.iter().any(|c| c == "STARTTLS"));
}

#[tokio::test]
async fn test_pop_before_smtp() {
    init_tracing();
    let (pop_port, pop) = pop_server().await;
    let (smtp_port, smtp) = smtp_server(&[]).await;

    let mut descriptor = PopBeforeSmtp::new(Some("127.0.0.1".into()), "jdoe", "secret");
    descriptor.port = Some(pop_port);
    let session = session(smtp_port).pop_before_smtp(Some(descriptor)).build();

    SmtpTransport::new().send(&session, &message()).await.unwrap();

    assert_eq!(pop.await.unwrap(), vec!["USER jdoe", "PASS secret", "QUIT"]);
    assert_eq!(smtp.await.unwrap().commands.last().map(String::as_str), Some("QUIT"));
}

#[tokio::test]
async fn test_pop_before_smtp_without_host_fails_before_smtp() {
    let session = Session::builder("127.0.0.1")
        .port(1)
        .pop_before_smtp(Some(PopBeforeSmtp::new(None, "jdoe", "secret")))
        .build();

    let err = SmtpTransport::new().send(&session, &message()).await.unwrap_err();
    assert!(matches!(err, Error::PreAuth(_)));
}
