//! Building and sending.

use super::{Content, Email, resolve_content_type};
use crate::error::{Error, Result};
use chrono::Utc;
use mailwright_mime::{MimeMessage, RecipientType, generate_message_id};
use mailwright_smtp::Transport;

impl Email {
    /// Builds the message. This can only succeed once per `Email`.
    ///
    /// The session is resolved first, then the sender, recipients, subject,
    /// sent date, headers, content and charset are applied. A failed build
    /// leaves the email unbuilt.
    ///
    /// # Errors
    ///
    /// * [`Error::IllegalState`] if the message was already built.
    /// * [`Error::Session`] if no session can be resolved.
    /// * [`Error::IncompleteMessage`] if there is no sender, no recipient,
    ///   or no content while content is required.
    /// * [`Error::InvalidContent`] if the content type is unusable.
    pub fn build_message(&mut self) -> Result<&MimeMessage> {
        if self.message.is_some() {
            tracing::error!("Attempted to build a message that was already built");
            return Err(Error::IllegalState("the message has already been built".into()));
        }

        let session = self.mail_session()?;

        let from = self
            .from
            .clone()
            .ok_or_else(|| Error::IncompleteMessage("from address required".into()))?;
        if self.to.is_empty() && self.cc.is_empty() && self.bcc.is_empty() {
            return Err(Error::IncompleteMessage(
                "at least one receiver address required".into(),
            ));
        }

        let mut message = MimeMessage::new();
        message.set_message_id(generate_message_id(from.address.domain()));
        message.set_from(from);
        message.add_recipients(RecipientType::To, self.to.iter().cloned());
        message.add_recipients(RecipientType::Cc, self.cc.iter().cloned());
        message.add_recipients(RecipientType::Bcc, self.bcc.iter().cloned());
        if !self.reply_to.is_empty() {
            message.set_reply_to(self.reply_to.clone());
        }
        if let Some(subject) = &self.subject {
            message.set_subject(subject.clone());
        }
        message.set_sent_date(self.sent_date.unwrap_or_else(Utc::now));

        for (name, value) in self.headers.iter() {
            message.set_header(name, value);
        }

        self.apply_content(&mut message)?;

        if let Some(charset) = &self.charset {
            message.set_charset(charset.clone());
        }

        tracing::debug!(
            host = %session.host,
            recipients = message.all_recipients().len(),
            content_type = ?message.content_type().map(ToString::to_string),
            "Built message"
        );
        Ok(&*self.message.insert(message))
    }

    fn apply_content(&self, message: &mut MimeMessage) -> Result<()> {
        if self.content.is_absent() && self.require_content && self.content_type.is_none() {
            return Err(Error::IncompleteMessage(
                "text/plain or other content required".into(),
            ));
        }

        let content_type = resolve_content_type(&self.content, self.content_type.as_deref())?;
        match &self.content {
            Content::Absent => message.set_body(Vec::new(), content_type),
            Content::Plain { body, .. } => message.set_body(body.clone(), content_type),
            Content::Multipart(multipart) => message.set_multipart(multipart.clone(), content_type),
        }
        Ok(())
    }

    /// Returns the built message.
    #[must_use]
    pub const fn message(&self) -> Option<&MimeMessage> {
        self.message.as_ref()
    }

    /// Consumes the email and returns the built message.
    #[must_use]
    pub fn into_message(self) -> Option<MimeMessage> {
        self.message
    }

    /// Builds the message and delivers it once with `transport`.
    ///
    /// # Errors
    ///
    /// Returns the errors of [`build_message`](Self::build_message), so a
    /// second call fails with [`Error::IllegalState`], and
    /// [`Error::Transport`] if delivery fails.
    pub async fn send<T: Transport + Sync>(&mut self, transport: &T) -> Result<()> {
        let session = self.mail_session()?;
        let message = self.build_message()?;
        transport.send(&session, message).await?;
        Ok(())
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
    use crate::session::PreAuthCheck;
    use chrono::TimeZone;
    use mailwright_mime::{Body, Multipart, Part};

    fn sample() -> Email {
        let mut email = Email::new();
        email.set_host_name("smtp.example.com");
        email.set_from("a@dev.com").unwrap();
        email.add_to("b@x.edu").unwrap();
        email
    }

    #[test]
    fn test_build_minimal() {
        let mut email = sample();
        let message = email.build_message().unwrap();

        assert_eq!(message.from().unwrap().address.as_str(), "a@dev.com");
        assert_eq!(message.all_recipients().len(), 1);
        assert_eq!(message.charset(), None);
        assert!(message.sent_date().is_some());
        assert!(message.message_id().unwrap().ends_with("@dev.com>"));
    }

    #[test]
    fn test_build_twice_fails() {
        let mut email = sample();
        email.build_message().unwrap();
        assert!(matches!(email.build_message().unwrap_err(), Error::IllegalState(_)));
        assert!(email.message().is_some());
    }

    #[test]
    fn test_failed_build_can_be_retried() {
        let mut email = Email::new();
        email.set_host_name("smtp.example.com");
        email.set_from("a@dev.com").unwrap();
        assert!(matches!(email.build_message().unwrap_err(), Error::IncompleteMessage(_)));

        email.add_cc("c@x.edu").unwrap();
        assert!(email.build_message().is_ok());
    }

    #[test]
    fn test_session_checked_before_addresses() {
        let mut email = Email::new();
        assert!(matches!(email.build_message().unwrap_err(), Error::Session(_)));
    }

    #[test]
    fn test_missing_sender() {
        let mut email = Email::new();
        email.set_host_name("smtp.example.com");
        email.add_to("b@x.edu").unwrap();
        assert!(matches!(email.build_message().unwrap_err(), Error::IncompleteMessage(_)));
    }

    #[test]
    fn test_explicit_sent_date() {
        let date = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let mut email = sample();
        email.set_sent_date(date);
        assert_eq!(email.build_message().unwrap().sent_date(), Some(date));
    }

    #[test]
    fn test_charset_applied() {
        let mut email = sample();
        email.set_charset("iso-8859-1").set_content("caf\u{e9}", "text/plain");
        let message = email.build_message().unwrap();
        assert_eq!(message.charset(), Some("iso-8859-1"));
    }

    #[test]
    fn test_absent_content_is_empty_text() {
        let mut email = sample();
        let message = email.build_message().unwrap();
        match message.body().unwrap() {
            Body::Single { content_type, data } => {
                assert_eq!(content_type.essence(), "text/plain");
                assert!(data.is_empty());
            }
            Body::Multipart { .. } => panic!("Expected single part body"),
        }
    }

    #[test]
    fn test_required_content() {
        let mut email = sample();
        email.require_content(true);
        assert!(matches!(email.build_message().unwrap_err(), Error::IncompleteMessage(_)));

        email.update_content_type("text/html");
        let message = email.build_message().unwrap();
        assert_eq!(message.content_type().unwrap().essence(), "text/html");
    }

    #[test]
    fn test_invalid_content() {
        let mut email = sample();
        email.set_content("x", "multipart/mixed");
        assert!(matches!(email.build_message().unwrap_err(), Error::InvalidContent(_)));
        assert!(email.message().is_none());
    }

    #[test]
    fn test_multipart_content() {
        let multipart = Multipart::alternative()
            .with_part(Part::text("plain"))
            .with_part(Part::html("<p>html</p>"));
        let boundary = multipart.boundary().to_string();

        let mut email = sample();
        email.set_multipart(multipart);
        let message = email.build_message().unwrap();
        let content_type = message.content_type().unwrap();
        assert_eq!(content_type.essence(), "multipart/alternative");
        assert_eq!(content_type.boundary(), Some(boundary.as_str()));
    }

    #[test]
    fn test_multipart_with_override() {
        let mut email = sample();
        email
            .set_multipart(Multipart::mixed().with_part(Part::text("x")))
            .update_content_type("multipart/related");
        let message = email.build_message().unwrap();
        assert_eq!(message.content_type().unwrap().essence(), "multipart/related");
    }

    #[test]
    fn test_headers_and_reply_to() {
        let mut email = sample();
        email.add_header("X-Priority", "1");
        email.add_reply_to("replies@dev.com").unwrap();
        let message = email.build_message().unwrap();
        assert_eq!(message.header("x-priority"), Some("1"));
        assert_eq!(message.reply_to().len(), 1);
    }

    #[test]
    fn test_header_cannot_override_recipients() {
        let mut email = sample();
        email.add_header("To", "intruder@evil.com");
        let text = email.build_message().unwrap().to_string();
        assert!(text.contains("To: b@x.edu\r\n"));
        assert!(!text.contains("intruder@evil.com"));
    }

    #[test]
    fn test_deferred_pop_check_builds() {
        let mut email = sample();
        email.set_pop_before_smtp(true, None, "user", "pass");
        assert!(email.build_message().is_ok());

        let mut email = sample();
        email
            .set_pop_before_smtp(true, None, "user", "pass")
            .set_pre_auth_check(PreAuthCheck::AtResolution);
        assert!(matches!(email.build_message().unwrap_err(), Error::Session(_)));
    }

    #[test]
    fn test_into_message() {
        let mut email = sample();
        assert!(email.clone().into_message().is_none());
        email.build_message().unwrap();
        assert!(email.into_message().is_some());
    }
}
