//! Resolved session configuration handed to a transport.

use crate::types::AuthMechanism;
use mailwright_mime::Address;
use std::fmt;
use std::time::Duration;

/// Default connect and read timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Host name announced in EHLO when none is configured.
pub const DEFAULT_EHLO_NAME: &str = "localhost";

/// Connection security mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Security {
    /// No encryption (port 25).
    #[default]
    None,
    /// Start with plaintext, upgrade with STARTTLS (port 587).
    StartTls,
    /// TLS from the start (port 465).
    Tls,
}

impl Security {
    /// Derives the security mode from the two TLS switches. Implicit TLS
    /// wins when both are enabled.
    #[must_use]
    pub const fn resolve(ssl_on_connect: bool, start_tls: bool) -> Self {
        if ssl_on_connect {
            Self::Tls
        } else if start_tls {
            Self::StartTls
        } else {
            Self::None
        }
    }

    /// Returns the default port for this security mode.
    #[must_use]
    pub const fn default_port(self) -> u16 {
        match self {
            Self::None => 25,
            Self::StartTls => 587,
            Self::Tls => 465,
        }
    }
}

/// SASL credentials used after EHLO.
#[derive(Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(
    feature = "serde",
    serde(tag = "mechanism", rename_all = "lowercase")
)]
pub enum Authenticator {
    /// AUTH PLAIN.
    Plain {
        /// Authentication identity.
        username: String,
        /// Password.
        password: String,
    },
    /// AUTH LOGIN.
    Login {
        /// Authentication identity.
        username: String,
        /// Password.
        password: String,
    },
    /// AUTH XOAUTH2 with a bearer token.
    XOAuth2 {
        /// Account name.
        username: String,
        /// `OAuth2` access token.
        access_token: String,
    },
}

impl Authenticator {
    /// Creates PLAIN credentials.
    #[must_use]
    pub fn plain(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self::Plain {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Creates LOGIN credentials.
    #[must_use]
    pub fn login(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self::Login {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Creates XOAUTH2 credentials.
    #[must_use]
    pub fn xoauth2(username: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self::XOAuth2 {
            username: username.into(),
            access_token: access_token.into(),
        }
    }

    /// Returns the SASL mechanism.
    #[must_use]
    pub const fn mechanism(&self) -> AuthMechanism {
        match self {
            Self::Plain { .. } => AuthMechanism::Plain,
            Self::Login { .. } => AuthMechanism::Login,
            Self::XOAuth2 { .. } => AuthMechanism::XOAuth2,
        }
    }

    /// Returns the user name.
    #[must_use]
    pub fn username(&self) -> &str {
        match self {
            Self::Plain { username, .. }
            | Self::Login { username, .. }
            | Self::XOAuth2 { username, .. } => username,
        }
    }
}

// Secrets stay out of logs.
impl fmt::Debug for Authenticator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Authenticator")
            .field("mechanism", &self.mechanism())
            .field("username", &self.username())
            .finish_non_exhaustive()
    }
}

/// POP3 variant used for POP-before-SMTP.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum PopProtocol {
    /// Plain POP3 (port 110).
    #[default]
    Pop3,
    /// POP3 over implicit TLS (port 995).
    Pop3s,
}

impl PopProtocol {
    /// Returns the default port for this protocol.
    #[must_use]
    pub const fn default_port(self) -> u16 {
        match self {
            Self::Pop3 => 110,
            Self::Pop3s => 995,
        }
    }
}

/// POP-before-SMTP login performed before the SMTP connection is opened.
#[derive(Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PopBeforeSmtp {
    /// Protocol variant.
    #[cfg_attr(feature = "serde", serde(default))]
    pub protocol: PopProtocol,
    /// POP server host. A missing host fails the login when it runs.
    pub host: Option<String>,
    /// POP server port; the protocol default when unset.
    #[cfg_attr(feature = "serde", serde(default))]
    pub port: Option<u16>,
    /// POP user name.
    pub username: String,
    /// POP password.
    pub password: String,
}

impl PopBeforeSmtp {
    /// Creates a plain POP3 descriptor on the default port.
    #[must_use]
    pub fn new(
        host: Option<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            protocol: PopProtocol::Pop3,
            host,
            port: None,
            username: username.into(),
            password: password.into(),
        }
    }

    /// Returns the port to connect to.
    #[must_use]
    pub fn port(&self) -> u16 {
        self.port.unwrap_or_else(|| self.protocol.default_port())
    }
}

impl fmt::Debug for PopBeforeSmtp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PopBeforeSmtp")
            .field("protocol", &self.protocol)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

/// Resolved SMTP session configuration.
///
/// Built once and shared (usually behind an `Arc`); transports only read it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// SMTP server hostname.
    pub host: String,
    /// SMTP server port.
    pub port: u16,
    /// Security mode.
    pub security: Security,
    /// Fail instead of continuing in plaintext when STARTTLS is not offered.
    pub starttls_required: bool,
    /// Verify that the certificate matches the host name.
    pub check_server_identity: bool,
    /// Connection timeout.
    pub connect_timeout: Duration,
    /// Timeout for every server reply.
    pub read_timeout: Duration,
    /// Name announced in EHLO.
    pub ehlo_name: String,
    /// Envelope sender overriding the message sender.
    pub bounce_address: Option<Address>,
    /// Credentials, if the server requires authentication.
    pub authenticator: Option<Authenticator>,
    /// POP-before-SMTP login, if configured.
    pub pop_before_smtp: Option<PopBeforeSmtp>,
}

impl Session {
    /// Creates a plaintext session on port 25.
    #[must_use]
    pub fn new(host: impl Into<String>) -> Self {
        SessionBuilder::new(host).build()
    }

    /// Creates a session builder.
    #[must_use]
    pub fn builder(host: impl Into<String>) -> SessionBuilder {
        SessionBuilder::new(host)
    }
}

/// Builder for [`Session`].
#[derive(Debug, Clone)]
pub struct SessionBuilder {
    host: String,
    port: Option<u16>,
    security: Security,
    starttls_required: bool,
    check_server_identity: bool,
    connect_timeout: Duration,
    read_timeout: Duration,
    ehlo_name: Option<String>,
    bounce_address: Option<Address>,
    authenticator: Option<Authenticator>,
    pop_before_smtp: Option<PopBeforeSmtp>,
}

impl SessionBuilder {
    /// Creates a new builder with the given hostname.
    #[must_use]
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: None,
            security: Security::None,
            starttls_required: false,
            check_server_identity: false,
            connect_timeout: DEFAULT_TIMEOUT,
            read_timeout: DEFAULT_TIMEOUT,
            ehlo_name: None,
            bounce_address: None,
            authenticator: None,
            pop_before_smtp: None,
        }
    }

    /// Sets the port.
    #[must_use]
    pub const fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Sets the port when one is given; otherwise the security default applies.
    #[must_use]
    pub const fn port_opt(mut self, port: Option<u16>) -> Self {
        self.port = port;
        self
    }

    /// Sets the security mode.
    #[must_use]
    pub const fn security(mut self, security: Security) -> Self {
        self.security = security;
        self
    }

    /// Requires STARTTLS to be offered by the server.
    #[must_use]
    pub const fn starttls_required(mut self, required: bool) -> Self {
        self.starttls_required = required;
        self
    }

    /// Enables host-name verification of the server certificate.
    #[must_use]
    pub const fn check_server_identity(mut self, check: bool) -> Self {
        self.check_server_identity = check;
        self
    }

    /// Sets the connection timeout.
    #[must_use]
    pub const fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the read timeout.
    #[must_use]
    pub const fn read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Sets the name announced in EHLO.
    #[must_use]
    pub fn ehlo_name(mut self, name: impl Into<String>) -> Self {
        self.ehlo_name = Some(name.into());
        self
    }

    /// Sets the envelope sender.
    #[must_use]
    pub fn bounce_address(mut self, address: Option<Address>) -> Self {
        self.bounce_address = address;
        self
    }

    /// Sets the credentials.
    #[must_use]
    pub fn authenticator(mut self, authenticator: Option<Authenticator>) -> Self {
        self.authenticator = authenticator;
        self
    }

    /// Sets the POP-before-SMTP login.
    #[must_use]
    pub fn pop_before_smtp(mut self, pop: Option<PopBeforeSmtp>) -> Self {
        self.pop_before_smtp = pop;
        self
    }

    /// Builds the session.
    #[must_use]
    pub fn build(self) -> Session {
        Session {
            host: self.host,
            port: self.port.unwrap_or_else(|| self.security.default_port()),
            security: self.security,
            starttls_required: self.starttls_required,
            check_server_identity: self.check_server_identity,
            connect_timeout: self.connect_timeout,
            read_timeout: self.read_timeout,
            ehlo_name: self
                .ehlo_name
                .unwrap_or_else(|| DEFAULT_EHLO_NAME.to_string()),
            bounce_address: self.bounce_address,
            authenticator: self.authenticator,
            pop_before_smtp: self.pop_before_smtp,
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

    #[test]
    fn test_default_ports() {
        assert_eq!(Security::None.default_port(), 25);
        assert_eq!(Security::StartTls.default_port(), 587);
        assert_eq!(Security::Tls.default_port(), 465);
        assert_eq!(PopProtocol::Pop3.default_port(), 110);
        assert_eq!(PopProtocol::Pop3s.default_port(), 995);
    }

    #[test]
    fn test_security_resolve() {
        assert_eq!(Security::resolve(false, false), Security::None);
        assert_eq!(Security::resolve(false, true), Security::StartTls);
        assert_eq!(Security::resolve(true, false), Security::Tls);
        assert_eq!(Security::resolve(true, true), Security::Tls);
    }

    #[test]
    fn test_session_defaults() {
        let session = Session::new("smtp.example.com");
        assert_eq!(session.host, "smtp.example.com");
        assert_eq!(session.port, 25);
        assert_eq!(session.security, Security::None);
        assert!(!session.check_server_identity);
        assert_eq!(session.connect_timeout, DEFAULT_TIMEOUT);
        assert_eq!(session.read_timeout, DEFAULT_TIMEOUT);
        assert_eq!(session.ehlo_name, "localhost");
    }

    #[test]
    fn test_session_builder() {
        let session = Session::builder("smtp.example.com")
            .security(Security::StartTls)
            .starttls_required(true)
            .read_timeout(Duration::from_secs(5))
            .authenticator(Some(Authenticator::plain("user", "secret")))
            .build();

        assert_eq!(session.port, 587);
        assert!(session.starttls_required);
        assert_eq!(session.read_timeout, Duration::from_secs(5));
        assert_eq!(
            session.authenticator.as_ref().map(Authenticator::mechanism),
            Some(AuthMechanism::Plain)
        );
    }

    #[test]
    fn test_explicit_port_wins() {
        let session = Session::builder("smtp.example.com")
            .security(Security::Tls)
            .port(2465)
            .build();
        assert_eq!(session.port, 2465);
    }

    #[test]
    fn test_debug_hides_secrets() {
        let auth = Authenticator::login("user", "hunter2");
        let pop = PopBeforeSmtp::new(Some("pop.example.com".into()), "user", "hunter2");
        assert!(!format!("{auth:?}").contains("hunter2"));
        assert!(!format!("{pop:?}").contains("hunter2"));
        assert_eq!(pop.port(), 110);
    }
}
