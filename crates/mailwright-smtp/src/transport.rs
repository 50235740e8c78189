//! Message delivery.

use crate::connection::{Client, Connected, connect_plain, connect_tls};
use crate::error::{Error, Result};
use crate::pop3;
use crate::session::{Security, Session};
use crate::types::Extension;
use mailwright_mime::{Address, MimeMessage};
use std::future::Future;
use tokio::io::{AsyncRead, AsyncWrite};

/// Something that can deliver a built message using a resolved session.
pub trait Transport {
    /// Delivers `message` once, as configured by `session`.
    fn send(
        &self,
        session: &Session,
        message: &MimeMessage,
    ) -> impl Future<Output = Result<()>> + Send;
}

/// Envelope sender and recipients of a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    /// `MAIL FROM` address.
    pub from: Address,
    /// `RCPT TO` addresses in To, Cc, Bcc order.
    pub recipients: Vec<Address>,
}

impl Envelope {
    /// Derives the envelope: the session's bounce address (or the message
    /// sender) and every To, Cc and Bcc recipient.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidSession`] if there is no sender or no recipient.
    pub fn new(session: &Session, message: &MimeMessage) -> Result<Self> {
        let from = session
            .bounce_address
            .clone()
            .or_else(|| message.from().map(|m| m.address.clone()))
            .ok_or_else(|| Error::InvalidSession("message has no sender".into()))?;

        let recipients: Vec<Address> = message
            .all_recipients()
            .into_iter()
            .map(|m| m.address.clone())
            .collect();
        if recipients.is_empty() {
            return Err(Error::InvalidSession("message has no recipients".into()));
        }

        Ok(Self { from, recipients })
    }

    fn is_internationalized(&self) -> bool {
        self.from.is_internationalized()
            || self.recipients.iter().any(Address::is_internationalized)
    }
}

/// SMTP delivery over TCP, STARTTLS or implicit TLS.
#[derive(Debug, Clone, Copy, Default)]
pub struct SmtpTransport;

impl SmtpTransport {
    /// Creates a new SMTP transport.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Transport for SmtpTransport {
    async fn send(&self, session: &Session, message: &MimeMessage) -> Result<()> {
        let envelope = Envelope::new(session, message)?;

        if let Some(pop) = &session.pop_before_smtp {
            pop3::login(pop, session).await?;
        }

        let stream = match session.security {
            Security::Tls => {
                connect_tls(
                    &session.host,
                    session.port,
                    session.connect_timeout,
                    session.check_server_identity,
                )
                .await?
            }
            Security::None | Security::StartTls => {
                connect_plain(&session.host, session.port, session.connect_timeout).await?
            }
        };

        let mut client = Client::from_stream(stream, session.read_timeout)
            .await?
            .ehlo(&session.ehlo_name)
            .await?;

        if session.security == Security::StartTls {
            if client.server_info().supports_starttls() {
                client = client
                    .starttls(
                        &session.host,
                        &session.ehlo_name,
                        session.check_server_identity,
                    )
                    .await?;
            } else if session.starttls_required {
                return Err(Error::NotSupported("STARTTLS".into()));
            } else {
                tracing::warn!(host = %session.host, "Server does not offer STARTTLS, continuing without TLS");
            }
        }

        deliver(client, session, &envelope, &message.to_bytes()).await?;
        tracing::info!(
            host = %session.host,
            recipients = envelope.recipients.len(),
            "Message sent"
        );
        Ok(())
    }
}

/// Runs authentication and one mail transaction on a greeted client, then
/// quits.
///
/// # Errors
///
/// Returns the first error the server or the connection reports.
pub async fn deliver<S: AsyncRead + AsyncWrite + Unpin>(
    client: Client<S, Connected>,
    session: &Session,
    envelope: &Envelope,
    data: &[u8],
) -> Result<()> {
    let info = client.server_info();
    if info
        .max_message_size()
        .is_some_and(|limit| limit > 0 && data.len() > limit)
    {
        return Err(Error::MessageTooLarge(data.len()));
    }

    let smtp_utf8 = envelope.is_internationalized();
    if smtp_utf8 && !info.supports(&Extension::SmtpUtf8) {
        return Err(Error::NotSupported("SMTPUTF8".into()));
    }
    let body = (!data.is_ascii() && info.supports(&Extension::EightBitMime)).then_some("8BITMIME");

    let from = envelope.from.clone();
    let transaction = match &session.authenticator {
        Some(auth) => {
            client
                .authenticate(auth)
                .await?
                .mail_from(from, body, smtp_utf8)
                .await?
        }
        None => client.mail_from(from, body, smtp_utf8).await?,
    };

    let (first, rest) = envelope
        .recipients
        .split_first()
        .ok_or_else(|| Error::InvalidSession("message has no recipients".into()))?;
    let mut client = transaction.rcpt_to(first.clone()).await?;
    for recipient in rest {
        client = client.rcpt_to(recipient.clone()).await?;
    }

    client.data().await?.send_message(data).await?.quit().await
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;
    use crate::session::Authenticator;
    use mailwright_mime::{ContentType, Mailbox, RecipientType};
    use std::time::Duration;
    use tokio_test::io::Builder;

    const TIMEOUT: Duration = Duration::from_secs(5);

    fn message() -> MimeMessage {
        let mut message = MimeMessage::new();
        message.set_from(Mailbox::new("sender@example.com").unwrap());
        message.add_recipients(RecipientType::To, [Mailbox::new("to@example.com").unwrap()]);
        message.add_recipients(RecipientType::Bcc, [Mailbox::new("bcc@example.com").unwrap()]);
        message.set_body("Hi", ContentType::text_plain());
        message
    }

    #[test]
    fn test_envelope_uses_sender() {
        let envelope = Envelope::new(&Session::new("localhost"), &message()).unwrap();
        assert_eq!(envelope.from.as_str(), "sender@example.com");
        let recipients: Vec<&str> = envelope.recipients.iter().map(Address::as_str).collect();
        assert_eq!(recipients, vec!["to@example.com", "bcc@example.com"]);
    }

    #[test]
    fn test_envelope_prefers_bounce_address() {
        let session = Session::builder("localhost")
            .bounce_address(Some(Address::new("bounces@example.com").unwrap()))
            .build();
        let envelope = Envelope::new(&session, &message()).unwrap();
        assert_eq!(envelope.from.as_str(), "bounces@example.com");
    }

    #[test]
    fn test_envelope_requires_recipients() {
        let mut message = MimeMessage::new();
        message.set_from(Mailbox::new("sender@example.com").unwrap());
        let err = Envelope::new(&Session::new("localhost"), &message).unwrap_err();
        assert!(matches!(err, Error::InvalidSession(_)));
    }

    #[tokio::test]
    async fn test_deliver_with_auth() {
        let session = Session::builder("localhost")
            .authenticator(Some(Authenticator::plain("user", "pass")))
            .build();
        let envelope = Envelope::new(&session, &message()).unwrap();

        let mock = Builder::new()
            .read(b"220 ready\r\n")
            .write(b"EHLO localhost\r\n")
            .read(b"250-hi\r\n250 AUTH PLAIN\r\n")
            .write(b"AUTH PLAIN AHVzZXIAcGFzcw==\r\n")
            .read(b"235 OK\r\n")
            .write(b"MAIL FROM:<sender@example.com>\r\n")
            .read(b"250 OK\r\n")
            .write(b"RCPT TO:<to@example.com>\r\n")
            .read(b"250 OK\r\n")
            .write(b"RCPT TO:<bcc@example.com>\r\n")
            .read(b"250 OK\r\n")
            .write(b"DATA\r\n")
            .read(b"354 Go ahead\r\n")
            .write(b"body\r\n.\r\n")
            .read(b"250 Queued\r\n")
            .write(b"QUIT\r\n")
            .read(b"221 Bye\r\n")
            .build();

        let client = Client::from_stream(mock, TIMEOUT)
            .await
            .unwrap()
            .ehlo("localhost")
            .await
            .unwrap();
        deliver(client, &session, &envelope, b"body\r\n").await.unwrap();
    }

    #[tokio::test]
    async fn test_deliver_rejects_oversized_message() {
        let session = Session::new("localhost");
        let envelope = Envelope::new(&session, &message()).unwrap();

        let mock = Builder::new()
            .read(b"220 ready\r\n")
            .write(b"EHLO localhost\r\n")
            .read(b"250-hi\r\n250 SIZE 4\r\n")
            .build();

        let client = Client::from_stream(mock, TIMEOUT)
            .await
            .unwrap()
            .ehlo("localhost")
            .await
            .unwrap();
        let err = deliver(client, &session, &envelope, b"too large").await.unwrap_err();
        assert!(matches!(err, Error::MessageTooLarge(9)));
    }
}
