//! POP-before-SMTP login.
//!
//! Some servers only relay mail for clients that recently logged into the
//! POP3 mailbox from the same address. The login is a plain `USER`/`PASS`
//! exchange followed by `QUIT`; no mail is retrieved.

use crate::connection::{connect_plain, connect_tls};
use crate::error::{Error, Result};
use crate::session::{PopBeforeSmtp, PopProtocol, Session};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};

/// Runs the POP3 login described by `pop`, using the session's timeouts and
/// certificate policy.
///
/// # Errors
///
/// Returns [`Error::PreAuth`] if no host is configured, the credentials
/// contain line breaks, or the server rejects the login, and I/O or timeout
/// errors from the connection.
pub async fn login(pop: &PopBeforeSmtp, session: &Session) -> Result<()> {
    check_credentials(&pop.username, &pop.password)?;
    let host = pop
        .host
        .as_deref()
        .filter(|h| !h.trim().is_empty())
        .ok_or_else(|| Error::PreAuth("no POP3 host configured".into()))?;
    let port = pop.port();
    tracing::debug!(%host, port, user = %pop.username, "POP-before-SMTP login");

    let stream = match pop.protocol {
        PopProtocol::Pop3 => connect_plain(host, port, session.connect_timeout).await?,
        PopProtocol::Pop3s => {
            connect_tls(
                host,
                port,
                session.connect_timeout,
                session.check_server_identity,
            )
            .await?
        }
    };

    login_over(stream, &pop.username, &pop.password, session.read_timeout).await
}

/// Runs the login exchange over an established stream.
///
/// # Errors
///
/// Returns [`Error::PreAuth`] on credentials containing line breaks, a
/// `-ERR` reply or an unexpected response.
pub async fn login_over<S: AsyncRead + AsyncWrite + Unpin>(
    stream: S,
    username: &str,
    password: &str,
    read_timeout: Duration,
) -> Result<()> {
    check_credentials(username, password)?;
    let mut client = PopClient {
        reader: BufReader::new(stream),
        read_timeout,
    };

    client.read_status().await?;
    client.command(&format!("USER {username}"), "USER").await?;
    client.command(&format!("PASS {password}"), "PASS").await?;
    client.command("QUIT", "QUIT").await?;
    tracing::debug!(user = %username, "POP-before-SMTP login succeeded");
    Ok(())
}

/// `USER` and `PASS` are single protocol lines.
fn check_credentials(username: &str, password: &str) -> Result<()> {
    if [username, password]
        .iter()
        .any(|value| value.contains(['\r', '\n']))
    {
        return Err(Error::PreAuth("credentials must not contain line breaks".into()));
    }
    Ok(())
}

struct PopClient<S> {
    reader: BufReader<S>,
    read_timeout: Duration,
}

impl<S: AsyncRead + AsyncWrite + Unpin> PopClient<S> {
    /// Sends a command; `label` is what gets logged and reported.
    async fn command(&mut self, line: &str, label: &str) -> Result<()> {
        tracing::debug!(command = label, "POP3 >");
        let stream = self.reader.get_mut();
        stream.write_all(format!("{line}\r\n").as_bytes()).await?;
        stream.flush().await?;
        self.read_status()
            .await
            .map_err(|e| match e {
                Error::PreAuth(msg) => Error::PreAuth(format!("{label} rejected: {msg}")),
                other => other,
            })
    }

    async fn read_status(&mut self) -> Result<()> {
        let mut line = String::new();
        let read = tokio::time::timeout(self.read_timeout, self.reader.read_line(&mut line))
            .await
            .map_err(|_| Error::Timeout("waiting for POP3 reply".into()))??;
        if read == 0 {
            return Err(Error::PreAuth("connection closed by server".into()));
        }

        let line = line.trim_end();
        if line.starts_with("+OK") {
            Ok(())
        } else if let Some(reason) = line.strip_prefix("-ERR") {
            Err(Error::PreAuth(reason.trim().to_string()))
        } else {
            Err(Error::PreAuth(format!("unexpected reply: {line}")))
        }
    }
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
    use tokio_test::io::Builder;

    const TIMEOUT: Duration = Duration::from_secs(5);

    #[tokio::test]
    async fn test_login_succeeds() {
        let mock = Builder::new()
            .read(b"+OK POP3 ready\r\n")
            .write(b"USER jdoe\r\n")
            .read(b"+OK\r\n")
            .write(b"PASS secret\r\n")
            .read(b"+OK maildrop locked\r\n")
            .write(b"QUIT\r\n")
            .read(b"+OK bye\r\n")
            .build();

        login_over(mock, "jdoe", "secret", TIMEOUT).await.unwrap();
    }

    #[tokio::test]
    async fn test_wrong_password() {
        let mock = Builder::new()
            .read(b"+OK POP3 ready\r\n")
            .write(b"USER jdoe\r\n")
            .read(b"+OK\r\n")
            .write(b"PASS wrong\r\n")
            .read(b"-ERR invalid password\r\n")
            .build();

        let err = login_over(mock, "jdoe", "wrong", TIMEOUT).await.unwrap_err();
        match err {
            Error::PreAuth(msg) => assert_eq!(msg, "PASS rejected: invalid password"),
            other => panic!("Expected PreAuth error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unexpected_greeting() {
        let mock = Builder::new().read(b"* OK IMAP4rev1\r\n").build();
        let err = login_over(mock, "jdoe", "secret", TIMEOUT).await.unwrap_err();
        assert!(matches!(err, Error::PreAuth(_)));
    }

    #[tokio::test]
    async fn test_line_break_in_credentials_is_rejected() {
        let mock = Builder::new().build();
        let err = login_over(mock, "jdoe\r\nDELE 1", "secret", TIMEOUT)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::PreAuth(_)));

        let mock = Builder::new().build();
        let err = login_over(mock, "jdoe", "secret\nQUIT", TIMEOUT)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::PreAuth(_)));
    }

    #[tokio::test]
    async fn test_line_break_rejected_before_connecting() {
        let session = Session::new("smtp.example.com");
        let pop = PopBeforeSmtp::new(Some("pop.invalid".into()), "jdoe", "se\r\ncret");
        let err = login(&pop, &session).await.unwrap_err();
        match err {
            Error::PreAuth(msg) => assert_eq!(msg, "credentials must not contain line breaks"),
            other => panic!("Expected PreAuth error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_missing_host() {
        let session = Session::new("smtp.example.com");
        let pop = PopBeforeSmtp::new(None, "jdoe", "secret");
        let err = login(&pop, &session).await.unwrap_err();
        assert!(matches!(err, Error::PreAuth(_)));
    }
}
