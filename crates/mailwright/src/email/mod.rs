//! The message builder.

mod build;
mod content;

pub use content::{Content, resolve_content_type};

use crate::error::{Error, Result};
use crate::session::{PreAuthCheck, SessionResolver, SessionSettings, pop_before_smtp};
use chrono::{DateTime, Utc};
use mailwright_mime::{Headers, Mailbox, MimeMessage, Multipart, validate_name};
use mailwright_smtp::{Address, Authenticator, Session};
use std::sync::Arc;
use std::time::Duration;

/// Whether an [`Email`] has been built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MessageState {
    /// Still accumulating.
    #[default]
    Unbuilt,
    /// Built; no further builds are allowed.
    Built,
}

/// An email under construction.
///
/// Recipients, headers and content accumulate through the setters, then
/// [`build_message`](Self::build_message) turns them into a [`MimeMessage`]
/// exactly once. The session is resolved lazily from the session settings
/// unless one is supplied with [`set_mail_session`](Self::set_mail_session).
///
/// An `Email` is not synchronized; share it across threads only behind a
/// lock.
#[derive(Debug, Clone, Default)]
pub struct Email {
    from: Option<Mailbox>,
    to: Vec<Mailbox>,
    cc: Vec<Mailbox>,
    bcc: Vec<Mailbox>,
    reply_to: Vec<Mailbox>,
    subject: Option<String>,
    sent_date: Option<DateTime<Utc>>,
    headers: Headers,
    content: Content,
    content_type: Option<String>,
    charset: Option<String>,
    require_content: bool,
    session: SessionResolver,
    message: Option<MimeMessage>,
}

#[derive(Debug, Clone, Copy)]
enum List {
    To,
    Cc,
    Bcc,
    ReplyTo,
}

impl Email {
    /// Creates an empty email.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty email whose session is derived from `settings`.
    #[must_use]
    pub fn with_settings(settings: SessionSettings) -> Self {
        Self {
            session: SessionResolver::with_settings(settings),
            ..Self::default()
        }
    }

    /// Returns whether the message has been built.
    #[must_use]
    pub const fn state(&self) -> MessageState {
        if self.message.is_some() {
            MessageState::Built
        } else {
            MessageState::Unbuilt
        }
    }

    // === Sender ===

    /// Sets the sender. Accepts `user@host` or `Name <user@host>`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidAddress`] if the address does not parse.
    pub fn set_from(&mut self, address: &str) -> Result<&mut Self> {
        self.from = Some(Mailbox::parse(address)?);
        Ok(self)
    }

    /// Sets the sender with a display name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidAddress`] if the address does not parse.
    pub fn set_from_with_name(&mut self, address: &str, name: &str) -> Result<&mut Self> {
        self.from = Some(Mailbox::with_name(name, address)?);
        Ok(self)
    }

    /// Returns the sender.
    #[must_use]
    pub const fn from(&self) -> Option<&Mailbox> {
        self.from.as_ref()
    }

    // === Recipients ===

    /// Adds a `To` recipient.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidAddress`] if the address does not parse.
    pub fn add_to(&mut self, address: &str) -> Result<&mut Self> {
        let mailbox = Mailbox::parse(address)?;
        Ok(self.push(List::To, mailbox))
    }

    /// Adds a `To` recipient with a display name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidAddress`] if the address does not parse.
    pub fn add_to_with_name(&mut self, address: &str, name: &str) -> Result<&mut Self> {
        let mailbox = Mailbox::with_name(name, address)?;
        Ok(self.push(List::To, mailbox))
    }

    /// Adds every address in `addresses` as a `To` recipient, in order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidAddress`] if `addresses` is empty or one of
    /// them does not parse. Addresses before the bad one stay added.
    pub fn add_to_many<I, S>(&mut self, addresses: I) -> Result<&mut Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.add_many(List::To, addresses)
    }

    /// Adds a parsed `To` recipient.
    pub fn add_to_mailbox(&mut self, mailbox: Mailbox) -> &mut Self {
        self.push(List::To, mailbox)
    }

    /// Replaces the `To` list.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidAddress`] if `mailboxes` is empty.
    pub fn set_to(&mut self, mailboxes: impl IntoIterator<Item = Mailbox>) -> Result<&mut Self> {
        self.set(List::To, mailboxes)
    }

    /// Returns the `To` recipients.
    #[must_use]
    pub fn to(&self) -> &[Mailbox] {
        &self.to
    }

    /// Adds a `Cc` recipient.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidAddress`] if the address does not parse.
    pub fn add_cc(&mut self, address: &str) -> Result<&mut Self> {
        let mailbox = Mailbox::parse(address)?;
        Ok(self.push(List::Cc, mailbox))
    }

    /// Adds a `Cc` recipient with a display name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidAddress`] if the address does not parse.
    pub fn add_cc_with_name(&mut self, address: &str, name: &str) -> Result<&mut Self> {
        let mailbox = Mailbox::with_name(name, address)?;
        Ok(self.push(List::Cc, mailbox))
    }

    /// Adds every address in `addresses` as a `Cc` recipient, in order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidAddress`] if `addresses` is empty or one of
    /// them does not parse. Addresses before the bad one stay added.
    pub fn add_cc_many<I, S>(&mut self, addresses: I) -> Result<&mut Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.add_many(List::Cc, addresses)
    }

    /// Adds a parsed `Cc` recipient.
    pub fn add_cc_mailbox(&mut self, mailbox: Mailbox) -> &mut Self {
        self.push(List::Cc, mailbox)
    }

    /// Replaces the `Cc` list.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidAddress`] if `mailboxes` is empty.
    pub fn set_cc(&mut self, mailboxes: impl IntoIterator<Item = Mailbox>) -> Result<&mut Self> {
        self.set(List::Cc, mailboxes)
    }

    /// Returns the `Cc` recipients.
    #[must_use]
    pub fn cc(&self) -> &[Mailbox] {
        &self.cc
    }

    /// Adds a `Bcc` recipient.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidAddress`] if the address does not parse.
    pub fn add_bcc(&mut self, address: &str) -> Result<&mut Self> {
        let mailbox = Mailbox::parse(address)?;
        Ok(self.push(List::Bcc, mailbox))
    }

    /// Adds a `Bcc` recipient with a display name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidAddress`] if the address does not parse.
    pub fn add_bcc_with_name(&mut self, address: &str, name: &str) -> Result<&mut Self> {
        let mailbox = Mailbox::with_name(name, address)?;
        Ok(self.push(List::Bcc, mailbox))
    }

    /// Adds every address in `addresses` as a `Bcc` recipient, in order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidAddress`] if `addresses` is empty or one of
    /// them does not parse. Addresses before the bad one stay added.
    pub fn add_bcc_many<I, S>(&mut self, addresses: I) -> Result<&mut Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.add_many(List::Bcc, addresses)
    }

    /// Adds a parsed `Bcc` recipient.
    pub fn add_bcc_mailbox(&mut self, mailbox: Mailbox) -> &mut Self {
        self.push(List::Bcc, mailbox)
    }

    /// Replaces the `Bcc` list.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidAddress`] if `mailboxes` is empty.
    pub fn set_bcc(&mut self, mailboxes: impl IntoIterator<Item = Mailbox>) -> Result<&mut Self> {
        self.set(List::Bcc, mailboxes)
    }

    /// Returns the `Bcc` recipients.
    #[must_use]
    pub fn bcc(&self) -> &[Mailbox] {
        &self.bcc
    }

    /// Adds a `Reply-To` address.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidAddress`] if the address does not parse.
    pub fn add_reply_to(&mut self, address: &str) -> Result<&mut Self> {
        let mailbox = Mailbox::parse(address)?;
        Ok(self.push(List::ReplyTo, mailbox))
    }

    /// Adds a `Reply-To` address with a display name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidAddress`] if the address does not parse.
    pub fn add_reply_to_with_name(&mut self, address: &str, name: &str) -> Result<&mut Self> {
        let mailbox = Mailbox::with_name(name, address)?;
        Ok(self.push(List::ReplyTo, mailbox))
    }

    /// Adds every address in `addresses` as a `Reply-To` address, in order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidAddress`] if `addresses` is empty or one of
    /// them does not parse. Addresses before the bad one stay added.
    pub fn add_reply_to_many<I, S>(&mut self, addresses: I) -> Result<&mut Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.add_many(List::ReplyTo, addresses)
    }

    /// Adds a parsed `Reply-To` address.
    pub fn add_reply_to_mailbox(&mut self, mailbox: Mailbox) -> &mut Self {
        self.push(List::ReplyTo, mailbox)
    }

    /// Replaces the `Reply-To` list.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidAddress`] if `mailboxes` is empty.
    pub fn set_reply_to(
        &mut self,
        mailboxes: impl IntoIterator<Item = Mailbox>,
    ) -> Result<&mut Self> {
        self.set(List::ReplyTo, mailboxes)
    }

    /// Returns the `Reply-To` addresses.
    #[must_use]
    pub fn reply_to(&self) -> &[Mailbox] {
        &self.reply_to
    }

    fn list_mut(&mut self, list: List) -> &mut Vec<Mailbox> {
        match list {
            List::To => &mut self.to,
            List::Cc => &mut self.cc,
            List::Bcc => &mut self.bcc,
            List::ReplyTo => &mut self.reply_to,
        }
    }

    fn push(&mut self, list: List, mailbox: Mailbox) -> &mut Self {
        self.list_mut(list).push(mailbox);
        self
    }

    fn add_many<I, S>(&mut self, list: List, addresses: I) -> Result<&mut Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut addresses = addresses.into_iter().peekable();
        if addresses.peek().is_none() {
            return Err(Error::InvalidAddress("address list provided was empty".into()));
        }
        for address in addresses {
            let mailbox = Mailbox::parse(address.as_ref())?;
            self.list_mut(list).push(mailbox);
        }
        Ok(self)
    }

    fn set(&mut self, list: List, mailboxes: impl IntoIterator<Item = Mailbox>) -> Result<&mut Self> {
        let mailboxes: Vec<Mailbox> = mailboxes.into_iter().collect();
        if mailboxes.is_empty() {
            return Err(Error::InvalidAddress("address list provided was empty".into()));
        }
        *self.list_mut(list) = mailboxes;
        Ok(self)
    }

    // === Headers ===

    /// Adds a header, replacing an existing one with the same name.
    ///
    /// Headers naming a field the message writes itself (Date, From, To, Cc,
    /// Reply-To, Subject, Bcc, MIME-Version, Content-*) are kept here but
    /// not serialized.
    ///
    /// # Panics
    ///
    /// Panics if `name` is empty or not a valid header name, or if `value`
    /// is empty.
    pub fn add_header(&mut self, name: &str, value: &str) -> &mut Self {
        check_header(name, value);
        self.headers.set(name, value);
        self
    }

    /// Replaces all headers.
    ///
    /// # Panics
    ///
    /// Panics under the same conditions as [`add_header`](Self::add_header).
    pub fn set_headers<I, N, V>(&mut self, headers: I) -> &mut Self
    where
        I: IntoIterator<Item = (N, V)>,
        N: AsRef<str>,
        V: AsRef<str>,
    {
        let mut replacement = Headers::new();
        for (name, value) in headers {
            check_header(name.as_ref(), value.as_ref());
            replacement.set(name.as_ref(), value.as_ref());
        }
        self.headers = replacement;
        self
    }

    /// Returns the accumulated headers.
    #[must_use]
    pub const fn headers(&self) -> &Headers {
        &self.headers
    }

    // === Subject, date, charset ===

    /// Sets the subject.
    pub fn set_subject(&mut self, subject: impl Into<String>) -> &mut Self {
        self.subject = Some(subject.into());
        self
    }

    /// Returns the subject.
    #[must_use]
    pub fn subject(&self) -> Option<&str> {
        self.subject.as_deref()
    }

    /// Sets the sent date. The build time is used when unset.
    pub const fn set_sent_date(&mut self, date: DateTime<Utc>) -> &mut Self {
        self.sent_date = Some(date);
        self
    }

    /// Returns the explicit sent date.
    #[must_use]
    pub const fn sent_date(&self) -> Option<DateTime<Utc>> {
        self.sent_date
    }

    /// Sets the charset label applied to text content.
    ///
    /// Content is not transcoded. The body bytes are sent as given, so text
    /// set from a `&str` stays UTF-8 whatever this label says.
    pub fn set_charset(&mut self, charset: impl Into<String>) -> &mut Self {
        self.charset = Some(charset.into());
        self
    }

    /// Returns the charset, if one was set.
    #[must_use]
    pub fn charset(&self) -> Option<&str> {
        self.charset.as_deref()
    }

    // === Content ===

    /// Sets a single-part body with an explicit MIME type such as
    /// `text/html; charset=utf-8`.
    pub fn set_content(&mut self, body: impl Into<Vec<u8>>, mime_type: impl Into<String>) -> &mut Self {
        self.content = Content::Plain {
            body: body.into(),
            mime_type: mime_type.into(),
        };
        self.content_type = None;
        self
    }

    /// Sets a structured body. Its type is `multipart/<subtype>` unless
    /// overridden with [`update_content_type`](Self::update_content_type).
    pub fn set_multipart(&mut self, multipart: Multipart) -> &mut Self {
        self.content = Content::Multipart(multipart);
        self.content_type = None;
        self
    }

    /// Overrides the content type of the current content.
    pub fn update_content_type(&mut self, content_type: impl Into<String>) -> &mut Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Returns the content.
    #[must_use]
    pub const fn content(&self) -> &Content {
        &self.content
    }

    /// Returns the explicit content type override.
    #[must_use]
    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    /// When set, building without content (and without an explicit content
    /// type) fails instead of sending an empty `text/plain` body.
    pub const fn require_content(&mut self, required: bool) -> &mut Self {
        self.require_content = required;
        self
    }

    // === Session ===

    /// Returns the session settings.
    #[must_use]
    pub const fn session_settings(&self) -> &SessionSettings {
        self.session.settings()
    }

    /// Sets the SMTP host name.
    pub fn set_host_name(&mut self, host: impl Into<String>) -> &mut Self {
        let host = host.into();
        self.session.update("host_name", |s| s.host_name = Some(host));
        self
    }

    /// Returns the SMTP host: the supplied session's, else the configured one.
    #[must_use]
    pub fn host_name(&self) -> Option<&str> {
        self.session.host_name()
    }

    /// Sets the SMTP port.
    pub fn set_smtp_port(&mut self, port: u16) -> &mut Self {
        self.session.update("smtp_port", |s| s.smtp_port = Some(port));
        self
    }

    /// Sets the socket connection timeout.
    pub fn set_socket_connection_timeout(&mut self, timeout: Duration) -> &mut Self {
        self.session
            .update("connect_timeout", |s| s.connect_timeout = timeout);
        self
    }

    /// Sets the socket read timeout.
    pub fn set_socket_timeout(&mut self, timeout: Duration) -> &mut Self {
        self.session.update("read_timeout", |s| s.read_timeout = timeout);
        self
    }

    /// Connects with implicit TLS.
    pub fn set_ssl_on_connect(&mut self, enabled: bool) -> &mut Self {
        self.session
            .update("ssl_on_connect", |s| s.ssl_on_connect = enabled);
        self
    }

    /// Upgrades with STARTTLS when offered.
    pub fn set_start_tls_enabled(&mut self, enabled: bool) -> &mut Self {
        self.session
            .update("start_tls_enabled", |s| s.start_tls_enabled = enabled);
        self
    }

    /// Fails the send when STARTTLS is not offered.
    pub fn set_start_tls_required(&mut self, required: bool) -> &mut Self {
        self.session
            .update("start_tls_required", |s| s.start_tls_required = required);
        self
    }

    /// Verifies the certificate against the host name during TLS.
    pub fn set_check_server_identity(&mut self, check: bool) -> &mut Self {
        self.session
            .update("check_server_identity", |s| s.check_server_identity = check);
        self
    }

    /// Sets the name announced in EHLO.
    pub fn set_ehlo_name(&mut self, name: impl Into<String>) -> &mut Self {
        let name = name.into();
        self.session.update("ehlo_name", |s| s.ehlo_name = Some(name));
        self
    }

    /// Sets the envelope sender used instead of the `From` address.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidAddress`] if the address does not parse.
    pub fn set_bounce_address(&mut self, address: &str) -> Result<&mut Self> {
        let address = Address::new(address)?;
        self.session
            .update("bounce_address", |s| s.bounce_address = Some(address));
        Ok(self)
    }

    /// Sets the SMTP credentials.
    pub fn set_authenticator(&mut self, authenticator: Authenticator) -> &mut Self {
        self.session
            .update("authenticator", |s| s.authenticator = Some(authenticator));
        self
    }

    /// Configures POP-before-SMTP. A disabled descriptor clears it.
    pub fn set_pop_before_smtp(
        &mut self,
        enabled: bool,
        host: Option<&str>,
        username: &str,
        password: &str,
    ) -> &mut Self {
        let pop = pop_before_smtp(enabled, host, username, password);
        self.session.update("pop_before_smtp", |s| s.pop_before_smtp = pop);
        self
    }

    /// Chooses when a POP-before-SMTP descriptor without a host is rejected.
    pub fn set_pre_auth_check(&mut self, check: PreAuthCheck) -> &mut Self {
        self.session
            .update("pre_auth_check", |s| s.pre_auth_check = check);
        self
    }

    /// Uses `session` as is. It takes precedence over every session
    /// setting, set before or after.
    pub fn set_mail_session(&mut self, session: Arc<Session>) -> &mut Self {
        self.session.set_session(session);
        self
    }

    /// Returns the mail session, resolving and caching it on first use.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Session`] if no session was supplied and no host
    /// name is configured.
    pub fn mail_session(&mut self) -> Result<Arc<Session>> {
        self.session.resolve()
    }
}

fn check_header(name: &str, value: &str) {
    if let Err(e) = validate_name(name) {
        panic!("{e}");
    }
    assert!(!value.is_empty(), "value can not be empty for header {name}");
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
    fn test_add_single_recipients() {
        let mut email = Email::new();
        email
            .add_to("a@example.com")
            .unwrap()
            .add_to_with_name("b@example.com", "Bee")
            .unwrap()
            .add_cc("Cee <c@example.com>")
            .unwrap();

        assert_eq!(email.to().len(), 2);
        assert_eq!(email.to()[1].name.as_deref(), Some("Bee"));
        assert_eq!(email.cc()[0].name.as_deref(), Some("Cee"));
        assert_eq!(email.cc()[0].address.as_str(), "c@example.com");
    }

    #[test]
    fn test_invalid_address() {
        let mut email = Email::new();
        assert!(matches!(email.add_to("not-an-address").unwrap_err(), Error::InvalidAddress(_)));
        assert!(matches!(email.set_from("").unwrap_err(), Error::InvalidAddress(_)));
        assert!(email.to().is_empty());
    }

    #[test]
    fn test_batch_keeps_order() {
        let mut email = Email::new();
        email.add_cc("first@example.com").unwrap();
        email
            .add_cc_many(["second@example.com", "third@example.com"])
            .unwrap();
        let cc: Vec<&str> = email.cc().iter().map(|m| m.address.as_str()).collect();
        assert_eq!(cc, vec!["first@example.com", "second@example.com", "third@example.com"]);
    }

    #[test]
    fn test_empty_batch_fails() {
        let mut email = Email::new();
        let err = email.add_bcc_many(Vec::<String>::new()).unwrap_err();
        assert!(matches!(err, Error::InvalidAddress(_)));
    }

    #[test]
    fn test_batch_stops_at_first_bad_address() {
        let mut email = Email::new();
        let err = email
            .add_to_many(["ok@example.com", "bad", "never@example.com"])
            .unwrap_err();
        assert!(matches!(err, Error::InvalidAddress(_)));
        assert_eq!(email.to().len(), 1);
        assert_eq!(email.to()[0].address.as_str(), "ok@example.com");
    }

    #[test]
    fn test_set_list() {
        let mut email = Email::new();
        email.add_reply_to("old@example.com").unwrap();
        email
            .set_reply_to([Mailbox::new("new@example.com").unwrap()])
            .unwrap();
        assert_eq!(email.reply_to().len(), 1);
        assert_eq!(email.reply_to()[0].address.as_str(), "new@example.com");

        assert!(matches!(email.set_to(Vec::new()).unwrap_err(), Error::InvalidAddress(_)));
    }

    #[test]
    fn test_add_mailbox() {
        let mut email = Email::new();
        email
            .add_bcc_mailbox(Mailbox::new("x@example.com").unwrap())
            .add_bcc_mailbox(Mailbox::new("x@example.com").unwrap());
        assert_eq!(email.bcc().len(), 2);
    }

    #[test]
    fn test_add_header_overwrites() {
        let mut email = Email::new();
        email.add_header("X-Mailer", "one").add_header("x-mailer", "two");
        assert_eq!(email.headers().len(), 1);
        assert_eq!(email.headers().get("X-Mailer"), Some("two"));
    }

    #[test]
    #[should_panic(expected = "empty")]
    fn test_add_header_empty_name_panics() {
        Email::new().add_header("", "value");
    }

    #[test]
    #[should_panic(expected = "empty")]
    fn test_add_header_empty_value_panics() {
        Email::new().add_header("X-Key", "");
    }

    #[test]
    #[should_panic(expected = "invalid characters")]
    fn test_add_header_bad_name_panics() {
        Email::new().add_header("Bad Name", "value");
    }

    #[test]
    fn test_set_headers_replaces() {
        let mut email = Email::new();
        email.add_header("X-Old", "1");
        email.set_headers([("X-New", "2"), ("X-Other", "3")]);
        assert!(email.headers().get("X-Old").is_none());
        assert_eq!(email.headers().len(), 2);
    }

    #[test]
    fn test_content_resets_override() {
        let mut email = Email::new();
        email.set_content("<p>hi</p>", "text/html");
        email.update_content_type("text/plain");
        assert_eq!(email.content_type(), Some("text/plain"));

        email.set_multipart(Multipart::mixed());
        assert_eq!(email.content_type(), None);
        assert!(matches!(email.content(), Content::Multipart(_)));
    }

    #[test]
    fn test_session_setters() {
        let mut email = Email::new();
        email
            .set_host_name("smtp.example.com")
            .set_smtp_port(2525)
            .set_start_tls_enabled(true)
            .set_socket_timeout(Duration::from_secs(5));
        email.set_bounce_address("bounce@example.com").unwrap();

        let settings = email.session_settings();
        assert_eq!(settings.host_name.as_deref(), Some("smtp.example.com"));
        assert_eq!(settings.smtp_port, Some(2525));
        assert!(settings.start_tls_enabled);
        assert_eq!(settings.read_timeout, Duration::from_secs(5));
        assert_eq!(email.host_name(), Some("smtp.example.com"));

        assert!(matches!(email.set_bounce_address("nope").unwrap_err(), Error::InvalidAddress(_)));
    }

    #[test]
    fn test_lazy_resolution_honors_late_changes() {
        let mut email = Email::new();
        email.set_host_name("first.example.com");
        email.set_host_name("second.example.com").set_ssl_on_connect(true);

        let session = email.mail_session().unwrap();
        assert_eq!(session.host, "second.example.com");
        assert_eq!(session.port, 465);
    }

    #[test]
    fn test_pop_before_smtp_setter() {
        let mut email = Email::new();
        email.set_pop_before_smtp(true, Some("pop.example.com"), "user", "pass");
        let pop = email.session_settings().pop_before_smtp.clone().unwrap();
        assert_eq!(pop.host.as_deref(), Some("pop.example.com"));
        assert_eq!(pop.port(), 110);

        email.set_pop_before_smtp(false, None, "", "");
        assert!(email.session_settings().pop_before_smtp.is_none());
    }
}
