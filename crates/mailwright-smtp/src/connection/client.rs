//! Type-state SMTP client.

use super::{MailStream, ServerInfo};
use crate::command::Command;
use crate::error::{Error, Result};
use crate::parser::{is_last_reply_line, parse_reply};
use crate::session::Authenticator;
use crate::types::{Extension, Reply, ReplyCode};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use mailwright_mime::Address;
use std::collections::HashSet;
use std::marker::PhantomData;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};

/// Type-state marker for connected state.
#[derive(Debug)]
pub struct Connected;

/// Type-state marker for authenticated state.
#[derive(Debug)]
pub struct Authenticated;

/// Type-state marker for mail transaction started.
#[derive(Debug)]
pub struct MailTransaction;

/// Type-state marker for recipient added.
#[derive(Debug)]
pub struct RecipientAdded;

/// Type-state marker for data mode.
#[derive(Debug)]
pub struct Data;

/// SMTP client with type-state pattern.
///
/// Generic over the underlying stream so the protocol can run over TCP, TLS
/// or an in-memory mock.
#[derive(Debug)]
pub struct Client<S, State> {
    reader: BufReader<S>,
    server_info: ServerInfo,
    read_timeout: Duration,
    _state: PhantomData<State>,
}

impl<S, State> Client<S, State> {
    /// Returns the server information.
    pub const fn server_info(&self) -> &ServerInfo {
        &self.server_info
    }

    fn into_state<Next>(self) -> Client<S, Next> {
        Client {
            reader: self.reader,
            server_info: self.server_info,
            read_timeout: self.read_timeout,
            _state: PhantomData,
        }
    }
}

impl<S: AsyncRead + AsyncWrite + Unpin> Client<S, Connected> {
    /// Creates a client from a stream and reads the server greeting.
    ///
    /// # Errors
    ///
    /// Returns an error if reading the greeting fails or if the server returns an error.
    pub async fn from_stream(stream: S, read_timeout: Duration) -> Result<Self> {
        let mut client = Self {
            reader: BufReader::new(stream),
            server_info: ServerInfo::default(),
            read_timeout,
            _state: PhantomData,
        };

        let greeting = client.read_reply().await?.expect_code(ReplyCode::SERVICE_READY)?;
        client.server_info.hostname = greeting
            .message
            .first()
            .and_then(|msg| msg.split_whitespace().next())
            .unwrap_or("unknown")
            .to_string();
        tracing::debug!(server = %client.server_info.hostname, "SMTP greeting received");

        Ok(client)
    }

    /// Sends EHLO and discovers server capabilities.
    ///
    /// # Errors
    ///
    /// Returns an error if the EHLO command fails.
    pub async fn ehlo(mut self, client_hostname: &str) -> Result<Self> {
        let reply = self
            .send_command(&Command::Ehlo {
                hostname: client_hostname.to_string(),
            })
            .await?
            .expect_success()?;

        // First line echoes the server name, the rest are extensions
        self.server_info.extensions = reply
            .message
            .iter()
            .skip(1)
            .map(|line| Extension::parse(line))
            .collect::<HashSet<_>>();
        Ok(self)
    }

    /// Authenticates with the given credentials.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotSupported`] if the server does not advertise the
    /// mechanism, or an SMTP error if the server rejects the credentials.
    pub async fn authenticate(mut self, auth: &Authenticator) -> Result<Client<S, Authenticated>> {
        let mechanism = auth.mechanism();
        if !self.server_info.auth_mechanisms().contains(&mechanism) {
            return Err(Error::NotSupported(format!("AUTH {}", mechanism.as_str())));
        }

        let reply = match auth {
            Authenticator::Plain { username, password } => {
                let response = STANDARD.encode(format!("\0{username}\0{password}"));
                self.send_command(&Command::Auth {
                    mechanism,
                    initial_response: Some(response),
                })
                .await?
            }
            Authenticator::Login { username, password } => {
                self.send_command(&Command::Auth {
                    mechanism,
                    initial_response: None,
                })
                .await?
                .expect_code(ReplyCode::AUTH_CONTINUE)?;
                self.send_command(&Command::AuthResponse(STANDARD.encode(username)))
                    .await?
                    .expect_code(ReplyCode::AUTH_CONTINUE)?;
                self.send_command(&Command::AuthResponse(STANDARD.encode(password)))
                    .await?
            }
            Authenticator::XOAuth2 {
                username,
                access_token,
            } => {
                let response =
                    STANDARD.encode(format!("user={username}\x01auth=Bearer {access_token}\x01\x01"));
                let reply = self
                    .send_command(&Command::Auth {
                        mechanism,
                        initial_response: Some(response),
                    })
                    .await?;
                if reply.code == ReplyCode::AUTH_CONTINUE {
                    // Error details arrive as a challenge; an empty answer
                    // makes the server send the final failure reply.
                    self.send_command(&Command::AuthResponse(String::new()))
                        .await?
                } else {
                    reply
                }
            }
        };

        reply.expect_code(ReplyCode::AUTH_SUCCEEDED)?;
        tracing::debug!(mechanism = mechanism.as_str(), "Authenticated");
        Ok(self.into_state())
    }

    /// Starts a mail transaction without authentication (if server allows).
    ///
    /// # Errors
    ///
    /// Returns an error if the MAIL FROM command fails.
    pub async fn mail_from(
        self,
        from: Address,
        body: Option<&'static str>,
        smtp_utf8: bool,
    ) -> Result<Client<S, MailTransaction>> {
        self.start_mail(from, body, smtp_utf8).await
    }
}

impl Client<MailStream, Connected> {
    /// Upgrades the connection to TLS using STARTTLS and repeats EHLO.
    ///
    /// # Errors
    ///
    /// Returns an error if STARTTLS is not supported or if the upgrade fails.
    pub async fn starttls(
        mut self,
        host: &str,
        client_hostname: &str,
        check_server_identity: bool,
    ) -> Result<Self> {
        if !self.server_info.supports_starttls() {
            return Err(Error::NotSupported("STARTTLS".into()));
        }

        self.send_command(&Command::StartTls)
            .await?
            .expect_code(ReplyCode::SERVICE_READY)?;

        let stream = self
            .reader
            .into_inner()
            .upgrade_to_tls(host, check_server_identity)
            .await?;
        tracing::debug!(%host, "Connection upgraded to TLS");

        let client = Self {
            reader: BufReader::new(stream),
            server_info: ServerInfo {
                hostname: self.server_info.hostname,
                extensions: HashSet::new(),
            },
            read_timeout: self.read_timeout,
            _state: PhantomData,
        };
        client.ehlo(client_hostname).await
    }
}

impl<S: AsyncRead + AsyncWrite + Unpin> Client<S, Authenticated> {
    /// Starts a mail transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if the MAIL FROM command fails.
    pub async fn mail_from(
        self,
        from: Address,
        body: Option<&'static str>,
        smtp_utf8: bool,
    ) -> Result<Client<S, MailTransaction>> {
        self.start_mail(from, body, smtp_utf8).await
    }
}

impl<S: AsyncRead + AsyncWrite + Unpin> Client<S, MailTransaction> {
    /// Adds the first recipient to the transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if the RCPT TO command fails.
    pub async fn rcpt_to(mut self, to: Address) -> Result<Client<S, RecipientAdded>> {
        self.send_command(&Command::RcptTo { to })
            .await?
            .expect_success()?;
        Ok(self.into_state())
    }
}

impl<S: AsyncRead + AsyncWrite + Unpin> Client<S, RecipientAdded> {
    /// Adds another recipient to the transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if the RCPT TO command fails.
    pub async fn rcpt_to(mut self, to: Address) -> Result<Self> {
        self.send_command(&Command::RcptTo { to })
            .await?
            .expect_success()?;
        Ok(self)
    }

    /// Begins sending message data.
    ///
    /// # Errors
    ///
    /// Returns an error if the DATA command fails.
    pub async fn data(mut self) -> Result<Client<S, Data>> {
        self.send_command(&Command::Data)
            .await?
            .expect_code(ReplyCode::START_DATA)?;
        Ok(self.into_state())
    }
}

impl<S: AsyncRead + AsyncWrite + Unpin> Client<S, Data> {
    /// Sends the message content and completes the transaction.
    ///
    /// Line endings are normalized to CRLF, lines starting with `.` are
    /// dot-stuffed and the terminating `.` line is added.
    ///
    /// # Errors
    ///
    /// Returns an error if sending the message fails or server rejects it.
    pub async fn send_message(mut self, message: &[u8]) -> Result<Client<S, Connected>> {
        self.write_all(&dot_stuff(message)).await?;
        self.read_reply().await?.expect_success()?;
        Ok(self.into_state())
    }
}

// Common implementation for all states
impl<S: AsyncRead + AsyncWrite + Unpin, State> Client<S, State> {
    async fn start_mail(
        mut self,
        from: Address,
        body: Option<&'static str>,
        smtp_utf8: bool,
    ) -> Result<Client<S, MailTransaction>> {
        self.send_command(&Command::MailFrom {
            from,
            body,
            smtp_utf8,
        })
        .await?
        .expect_success()?;
        Ok(self.into_state())
    }

    async fn send_command(&mut self, cmd: &Command) -> Result<Reply> {
        tracing::debug!(command = %cmd.log_line(), "SMTP >");
        self.write_all(&cmd.serialize()).await?;
        self.read_reply().await
    }

    async fn write_all(&mut self, data: &[u8]) -> Result<()> {
        let stream = self.reader.get_mut();
        stream.write_all(data).await?;
        stream.flush().await?;
        Ok(())
    }

    async fn read_line(&mut self) -> Result<String> {
        let mut line = String::new();
        let read = tokio::time::timeout(self.read_timeout, self.reader.read_line(&mut line))
            .await
            .map_err(|_| Error::Timeout("waiting for server reply".into()))??;
        if read == 0 {
            return Err(Error::Protocol("Connection closed by server".into()));
        }
        Ok(line.trim_end_matches(['\r', '\n']).to_string())
    }

    async fn read_reply(&mut self) -> Result<Reply> {
        let mut lines = Vec::new();
        loop {
            let line = self.read_line().await?;
            if line.is_empty() {
                continue;
            }

            let is_last = is_last_reply_line(&line);
            lines.push(line);

            if is_last {
                break;
            }
        }

        let reply = parse_reply(&lines)?;
        tracing::debug!(code = reply.code.as_u16(), "SMTP <");
        Ok(reply)
    }

    /// Sends QUIT and closes the connection (available in any state).
    ///
    /// # Errors
    ///
    /// Returns an error if the QUIT command fails.
    pub async fn quit(mut self) -> Result<()> {
        let reply = self.send_command(&Command::Quit).await?;
        if !reply.is_success() {
            return Err(reply.into_error());
        }
        Ok(())
    }
}

/// Prepares message bytes for the DATA phase: CRLF line endings, leading
/// dots doubled, terminated by `.` on a line of its own.
#[must_use]
pub fn dot_stuff(message: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(message.len() + message.len() / 64 + 5);

    let body = message.strip_suffix(b"\n").unwrap_or(message);
    let body = body.strip_suffix(b"\r").unwrap_or(body);
    if !body.is_empty() {
        for line in body.split(|&b| b == b'\n') {
            let line = line.strip_suffix(b"\r").unwrap_or(line);
            if line.first() == Some(&b'.') {
                out.push(b'.');
            }
            out.extend_from_slice(line);
            out.extend_from_slice(b"\r\n");
        }
    }

    out.extend_from_slice(b".\r\n");
    out
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
    use crate::types::AuthMechanism;
    use tokio_test::io::Builder;

    const TIMEOUT: Duration = Duration::from_secs(5);

    fn addr(s: &str) -> Address {
        Address::new(s).unwrap()
    }

    #[test]
    fn test_dot_stuff() {
        assert_eq!(dot_stuff(b"Hello\n.hidden\r\nend\r\n"), b"Hello\r\n..hidden\r\nend\r\n.\r\n");
        assert_eq!(dot_stuff(b""), b".\r\n");
        assert_eq!(dot_stuff(b"."), b"..\r\n.\r\n");
    }

    #[tokio::test]
    async fn test_greeting_and_ehlo() {
        let mock = Builder::new()
            .read(b"220 smtp.example.com ESMTP ready\r\n")
            .write(b"EHLO client.example.com\r\n")
            .read(b"250-smtp.example.com\r\n250-STARTTLS\r\n250-AUTH PLAIN LOGIN\r\n250 SIZE 1000\r\n")
            .build();

        let client = Client::from_stream(mock, TIMEOUT).await.unwrap();
        assert_eq!(client.server_info().hostname, "smtp.example.com");

        let client = client.ehlo("client.example.com").await.unwrap();
        let info = client.server_info();
        assert!(info.supports_starttls());
        assert_eq!(info.max_message_size(), Some(1000));
        assert_eq!(
            info.auth_mechanisms(),
            vec![AuthMechanism::Plain, AuthMechanism::Login]
        );
    }

    #[tokio::test]
    async fn test_rejecting_greeting() {
        let mock = Builder::new().read(b"554 No service\r\n").build();
        let err = Client::from_stream(mock, TIMEOUT).await.unwrap_err();
        assert!(matches!(err, Error::SmtpError { code: 554, .. }));
    }

    #[tokio::test]
    async fn test_connection_closed() {
        let mock = Builder::new().build();
        let err = Client::from_stream(mock, TIMEOUT).await.unwrap_err();
        assert!(matches!(err, Error::Protocol(_)));
    }

    #[tokio::test]
    async fn test_auth_login() {
        let mock = Builder::new()
            .read(b"220 ready\r\n")
            .write(b"EHLO localhost\r\n")
            .read(b"250-hi\r\n250 AUTH LOGIN\r\n")
            .write(b"AUTH LOGIN\r\n")
            .read(b"334 VXNlcm5hbWU6\r\n")
            .write(b"dXNlcg==\r\n")
            .read(b"334 UGFzc3dvcmQ6\r\n")
            .write(b"cGFzcw==\r\n")
            .read(b"235 2.7.0 Authentication successful\r\n")
            .build();

        let client = Client::from_stream(mock, TIMEOUT)
            .await
            .unwrap()
            .ehlo("localhost")
            .await
            .unwrap();
        assert!(client.authenticate(&Authenticator::login("user", "pass")).await.is_ok());
    }

    #[tokio::test]
    async fn test_auth_plain_rejected() {
        let mock = Builder::new()
            .read(b"220 ready\r\n")
            .write(b"EHLO localhost\r\n")
            .read(b"250-hi\r\n250 AUTH PLAIN\r\n")
            .write(b"AUTH PLAIN AHVzZXIAcGFzcw==\r\n")
            .read(b"535 5.7.8 Bad credentials\r\n")
            .build();

        let client = Client::from_stream(mock, TIMEOUT)
            .await
            .unwrap()
            .ehlo("localhost")
            .await
            .unwrap();
        let err = client
            .authenticate(&Authenticator::plain("user", "pass"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::SmtpError { code: 535, .. }));
    }

    #[tokio::test]
    async fn test_auth_mechanism_not_offered() {
        let mock = Builder::new()
            .read(b"220 ready\r\n")
            .write(b"EHLO localhost\r\n")
            .read(b"250 hi\r\n")
            .build();

        let client = Client::from_stream(mock, TIMEOUT)
            .await
            .unwrap()
            .ehlo("localhost")
            .await
            .unwrap();
        let err = client
            .authenticate(&Authenticator::xoauth2("user", "token"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotSupported(_)));
    }

    #[tokio::test]
    async fn test_full_transaction() {
        let mock = Builder::new()
            .read(b"220 ready\r\n")
            .write(b"EHLO localhost\r\n")
            .read(b"250 hi\r\n")
            .write(b"MAIL FROM:<a@example.com>\r\n")
            .read(b"250 OK\r\n")
            .write(b"RCPT TO:<b@example.com>\r\n")
            .read(b"250 OK\r\n")
            .write(b"RCPT TO:<c@example.com>\r\n")
            .read(b"250 OK\r\n")
            .write(b"DATA\r\n")
            .read(b"354 Go ahead\r\n")
            .write(b"Subject: x\r\n\r\n..dot\r\n.\r\n")
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
        let client = client
            .mail_from(addr("a@example.com"), None, false)
            .await
            .unwrap()
            .rcpt_to(addr("b@example.com"))
            .await
            .unwrap()
            .rcpt_to(addr("c@example.com"))
            .await
            .unwrap()
            .data()
            .await
            .unwrap()
            .send_message(b"Subject: x\r\n\r\n.dot\r\n")
            .await
            .unwrap();
        client.quit().await.unwrap();
    }

    #[tokio::test]
    async fn test_rejected_recipient() {
        let mock = Builder::new()
            .read(b"220 ready\r\n")
            .write(b"EHLO localhost\r\n")
            .read(b"250 hi\r\n")
            .write(b"MAIL FROM:<a@example.com>\r\n")
            .read(b"250 OK\r\n")
            .write(b"RCPT TO:<nobody@example.com>\r\n")
            .read(b"550 5.1.1 No such user\r\n")
            .build();

        let client = Client::from_stream(mock, TIMEOUT)
            .await
            .unwrap()
            .ehlo("localhost")
            .await
            .unwrap()
            .mail_from(addr("a@example.com"), None, false)
            .await
            .unwrap();
        let err = client.rcpt_to(addr("nobody@example.com")).await.unwrap_err();
        assert!(err.is_permanent());
    }

    #[tokio::test]
    async fn test_read_timeout() {
        let mock = Builder::new().wait(Duration::from_secs(1)).build();
        let err = Client::from_stream(mock, Duration::from_millis(10))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Timeout(_)));
    }
}
