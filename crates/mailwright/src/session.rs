//! Session settings and lazy session resolution.
//!
//! An [`Email`](crate::Email) either carries a pre-built [`Session`] or the
//! discrete settings to derive one. Resolution happens the first time a
//! session is needed and the result is cached.

use crate::error::{Error, Result};
use mailwright_smtp::{
    Address, Authenticator, DEFAULT_TIMEOUT, PopBeforeSmtp, PopProtocol, Security, Session,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// When an enabled POP-before-SMTP descriptor without a host is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PreAuthCheck {
    /// Record the descriptor; the transport fails when it runs the login.
    #[default]
    Deferred,
    /// Fail session resolution.
    AtResolution,
}

/// Discrete settings a session is derived from.
///
/// Durations are (de)serialized as whole seconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    /// SMTP server host name.
    pub host_name: Option<String>,
    /// SMTP port; the security mode's default when unset.
    pub smtp_port: Option<u16>,
    /// Connect with implicit TLS.
    pub ssl_on_connect: bool,
    /// Upgrade with STARTTLS when the server offers it.
    pub start_tls_enabled: bool,
    /// Fail when the server does not offer STARTTLS.
    pub start_tls_required: bool,
    /// Verify that the server certificate matches the host name.
    pub check_server_identity: bool,
    /// Socket connection timeout.
    #[serde(with = "duration_secs")]
    pub connect_timeout: Duration,
    /// Socket read timeout.
    #[serde(with = "duration_secs")]
    pub read_timeout: Duration,
    /// Name announced in EHLO.
    pub ehlo_name: Option<String>,
    /// Envelope sender used instead of the `From` address.
    pub bounce_address: Option<Address>,
    /// SMTP credentials.
    pub authenticator: Option<Authenticator>,
    /// POP-before-SMTP login.
    pub pop_before_smtp: Option<PopBeforeSmtp>,
    /// Handling of a POP-before-SMTP descriptor without a host.
    pub pre_auth_check: PreAuthCheck,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            host_name: None,
            smtp_port: None,
            ssl_on_connect: false,
            start_tls_enabled: false,
            start_tls_required: false,
            check_server_identity: false,
            connect_timeout: DEFAULT_TIMEOUT,
            read_timeout: DEFAULT_TIMEOUT,
            ehlo_name: None,
            bounce_address: None,
            authenticator: None,
            pop_before_smtp: None,
            pre_auth_check: PreAuthCheck::Deferred,
        }
    }
}

impl SessionSettings {
    /// Loads settings from JSON. Missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Serde`] if the JSON is malformed.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Serializes the settings to pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Serde`] if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Returns the security mode implied by the TLS flags.
    ///
    /// A required STARTTLS implies an enabled one.
    #[must_use]
    pub const fn security(&self) -> Security {
        Security::resolve(
            self.ssl_on_connect,
            self.start_tls_enabled || self.start_tls_required,
        )
    }

    /// Derives a session from these settings.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Session`] if no host name is configured, or if a
    /// POP-before-SMTP descriptor has no host and the check is
    /// [`PreAuthCheck::AtResolution`].
    pub fn resolve(&self) -> Result<Session> {
        let host = self
            .host_name
            .as_deref()
            .map(str::trim)
            .filter(|h| !h.is_empty())
            .ok_or_else(|| Error::Session("no host name configured".into()))?;

        if self.pre_auth_check == PreAuthCheck::AtResolution
            && self
                .pop_before_smtp
                .as_ref()
                .is_some_and(|pop| pop.host.as_deref().is_none_or(|h| h.trim().is_empty()))
        {
            return Err(Error::Session(
                "POP-before-SMTP is enabled but no POP host is configured".into(),
            ));
        }

        let security = self.security();
        let mut builder = Session::builder(host)
            .port(resolve_port(self.smtp_port, security))
            .security(security)
            .starttls_required(self.start_tls_required)
            .check_server_identity(self.check_server_identity)
            .connect_timeout(self.connect_timeout)
            .read_timeout(self.read_timeout)
            .bounce_address(self.bounce_address.clone())
            .authenticator(self.authenticator.clone())
            .pop_before_smtp(self.pop_before_smtp.clone());
        if let Some(name) = &self.ehlo_name {
            builder = builder.ehlo_name(name.clone());
        }

        let session = builder.build();
        tracing::debug!(
            host = %session.host,
            port = session.port,
            security = ?session.security,
            authenticating = session.authenticator.is_some(),
            pop_before_smtp = session.pop_before_smtp.is_some(),
            "Resolved mail session"
        );
        Ok(session)
    }
}

/// Returns the explicit port, or the default port for `security`.
#[must_use]
pub const fn resolve_port(explicit: Option<u16>, security: Security) -> u16 {
    match explicit {
        Some(port) => port,
        None => security.default_port(),
    }
}

/// Builds a POP-before-SMTP descriptor, or `None` when disabled.
///
/// The host is kept as given; an empty host is treated as missing.
#[must_use]
pub fn pop_before_smtp(
    enabled: bool,
    host: Option<&str>,
    username: &str,
    password: &str,
) -> Option<PopBeforeSmtp> {
    enabled.then(|| PopBeforeSmtp {
        protocol: PopProtocol::Pop3,
        host: host.filter(|h| !h.trim().is_empty()).map(str::to_string),
        port: None,
        username: username.to_string(),
        password: password.to_string(),
    })
}

/// Holds the settings and the cached session of one [`Email`](crate::Email).
#[derive(Debug, Clone, Default)]
pub(crate) struct SessionResolver {
    settings: SessionSettings,
    session: Option<Arc<Session>>,
    supplied: bool,
}

impl SessionResolver {
    pub(crate) fn with_settings(settings: SessionSettings) -> Self {
        Self {
            settings,
            session: None,
            supplied: false,
        }
    }

    pub(crate) const fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    /// Changes a setting. Once a session exists the change cannot affect it.
    pub(crate) fn update(&mut self, field: &'static str, change: impl FnOnce(&mut SessionSettings)) {
        if self.session.is_some() {
            tracing::warn!(field, "Mail session already resolved, setting will not be used");
        }
        change(&mut self.settings);
    }

    /// Returns the supplied or cached session, resolving it on first use.
    pub(crate) fn resolve(&mut self) -> Result<Arc<Session>> {
        if let Some(session) = &self.session {
            return Ok(Arc::clone(session));
        }
        let session = Arc::new(self.settings.resolve()?);
        self.session = Some(Arc::clone(&session));
        Ok(session)
    }

    pub(crate) fn set_session(&mut self, session: Arc<Session>) {
        tracing::debug!(host = %session.host, "Using supplied mail session");
        self.session = Some(session);
        self.supplied = true;
    }

    /// The supplied session's host, else the configured one.
    pub(crate) fn host_name(&self) -> Option<&str> {
        match &self.session {
            Some(session) if self.supplied => Some(session.host.as_str()),
            _ => self.settings.host_name.as_deref(),
        }
    }
}

/// Serde helpers for durations stored as whole seconds.
mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    #[allow(clippy::trivially_copy_pass_by_ref)] // Required by serde with= signature
    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        u64::deserialize(deserializer).map(Duration::from_secs)
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

    fn settings(host: &str) -> SessionSettings {
        SessionSettings {
            host_name: Some(host.to_string()),
            ..SessionSettings::default()
        }
    }

    #[test]
    fn test_resolve_port() {
        assert_eq!(resolve_port(None, Security::None), 25);
        assert_eq!(resolve_port(None, Security::StartTls), 587);
        assert_eq!(resolve_port(None, Security::Tls), 465);
        assert_eq!(resolve_port(Some(2525), Security::Tls), 2525);
    }

    #[test]
    fn test_security_flags() {
        let mut s = settings("smtp.example.com");
        assert_eq!(s.security(), Security::None);

        s.start_tls_required = true;
        assert_eq!(s.security(), Security::StartTls);

        s.ssl_on_connect = true;
        assert_eq!(s.security(), Security::Tls);
    }

    #[test]
    fn test_resolve_defaults() {
        let session = settings("smtp.example.com").resolve().unwrap();
        assert_eq!(session.host, "smtp.example.com");
        assert_eq!(session.port, 25);
        assert_eq!(session.security, Security::None);
        assert_eq!(session.connect_timeout, DEFAULT_TIMEOUT);
        assert_eq!(session.read_timeout, DEFAULT_TIMEOUT);
        assert!(!session.check_server_identity);
        assert!(session.authenticator.is_none());
    }

    #[test]
    fn test_resolve_requires_host() {
        let err = SessionSettings::default().resolve().unwrap_err();
        assert!(matches!(err, Error::Session(_)));

        let err = settings("   ").resolve().unwrap_err();
        assert!(matches!(err, Error::Session(_)));
    }

    #[test]
    fn test_resolve_tls_port() {
        let mut s = settings("smtp.example.com");
        s.ssl_on_connect = true;
        s.start_tls_enabled = true;
        let session = s.resolve().unwrap();
        assert_eq!(session.security, Security::Tls);
        assert_eq!(session.port, 465);
    }

    #[test]
    fn test_pop_descriptor_disabled() {
        assert!(pop_before_smtp(false, Some("pop.example.com"), "u", "p").is_none());
        let pop = pop_before_smtp(true, Some(""), "u", "p").unwrap();
        assert!(pop.host.is_none());
    }

    #[test]
    fn test_missing_pop_host_deferred() {
        let mut s = settings("smtp.example.com");
        s.pop_before_smtp = pop_before_smtp(true, None, "u", "p");
        let session = s.resolve().unwrap();
        assert!(session.pop_before_smtp.unwrap().host.is_none());
    }

    #[test]
    fn test_missing_pop_host_at_resolution() {
        let mut s = settings("smtp.example.com");
        s.pop_before_smtp = pop_before_smtp(true, None, "u", "p");
        s.pre_auth_check = PreAuthCheck::AtResolution;
        assert!(matches!(s.resolve().unwrap_err(), Error::Session(_)));

        s.pop_before_smtp = pop_before_smtp(true, Some("pop.example.com"), "u", "p");
        assert!(s.resolve().is_ok());
    }

    #[test]
    fn test_from_json() {
        let json = r#"{
            "host_name": "smtp.example.com",
            "start_tls_enabled": true,
            "read_timeout": 30,
            "bounce_address": "bounces@example.com",
            "authenticator": {"mechanism": "login", "username": "u", "password": "p"}
        }"#;
        let s = SessionSettings::from_json(json).unwrap();
        assert_eq!(s.read_timeout, Duration::from_secs(30));
        assert_eq!(s.connect_timeout, DEFAULT_TIMEOUT);
        assert_eq!(s.security(), Security::StartTls);
        assert_eq!(s.bounce_address.as_ref().unwrap().as_str(), "bounces@example.com");
        assert_eq!(s.authenticator, Some(Authenticator::login("u", "p")));

        let back = SessionSettings::from_json(&s.to_json().unwrap()).unwrap();
        assert_eq!(back, s);
    }

    #[test]
    fn test_from_json_rejects_bad_address() {
        let err = SessionSettings::from_json(r#"{"bounce_address": "not an address"}"#).unwrap_err();
        assert!(matches!(err, Error::Serde(_)));
    }

    #[test]
    fn test_resolver_caches() {
        let mut resolver = SessionResolver::with_settings(settings("smtp.example.com"));
        let first = resolver.resolve().unwrap();
        resolver.update("smtp_port", |s| s.smtp_port = Some(2525));
        let second = resolver.resolve().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(second.port, 25);
    }

    #[test]
    fn test_supplied_session_wins() {
        let mut resolver = SessionResolver::default();
        assert_eq!(resolver.host_name(), None);

        let supplied = Arc::new(Session::new("relay.example.com"));
        resolver.set_session(Arc::clone(&supplied));
        assert_eq!(resolver.host_name(), Some("relay.example.com"));
        assert!(Arc::ptr_eq(&resolver.resolve().unwrap(), &supplied));
    }

    #[test]
    fn test_supplied_host_outranks_later_setting() {
        let mut resolver = SessionResolver::with_settings(settings("smtp.example.com"));
        resolver.set_session(Arc::new(Session::new("relay.example.com")));
        resolver.update("host_name", |s| s.host_name = Some("ignored.example.com".into()));
        assert_eq!(resolver.host_name(), Some("relay.example.com"));
    }

    #[test]
    fn test_resolved_session_reports_configured_host() {
        let mut resolver = SessionResolver::with_settings(settings("smtp.example.com"));
        resolver.resolve().unwrap();
        assert_eq!(resolver.host_name(), Some("smtp.example.com"));
    }
}
