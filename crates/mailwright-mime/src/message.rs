//! The transport-ready MIME message.

use crate::address::Mailbox;
use crate::content_type::ContentType;
use crate::encoding::{encode_rfc2047, needs_rfc2047};
use crate::header::{Headers, format_header};
use crate::multipart::{Multipart, TransferEncoding};
use chrono::{DateTime, Utc};
use std::fmt;
use uuid::Uuid;

/// Header fields the message writes itself; caller headers with these names
/// are not serialized.
const MANAGED_HEADERS: [&str; 10] = [
    "date",
    "from",
    "reply-to",
    "to",
    "cc",
    "subject",
    "content-type",
    "content-transfer-encoding",
    "mime-version",
    "bcc",
];

/// Recipient category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecipientType {
    /// Primary recipients.
    To,
    /// Carbon copy.
    Cc,
    /// Blind carbon copy (never written to the headers).
    Bcc,
}

impl RecipientType {
    /// Returns the header name for this category.
    #[must_use]
    pub const fn header_name(self) -> &'static str {
        match self {
            Self::To => "To",
            Self::Cc => "Cc",
            Self::Bcc => "Bcc",
        }
    }
}

/// Message body with its resolved content type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Body {
    /// Single-part body.
    Single {
        /// Content type of the body.
        content_type: ContentType,
        /// Raw body data.
        data: Vec<u8>,
    },
    /// Structured multipart body.
    Multipart {
        /// Content type of the body; always carries the multipart's boundary.
        content_type: ContentType,
        /// The parts.
        multipart: Multipart,
    },
}

impl Body {
    /// Returns the content type of the body.
    #[must_use]
    pub const fn content_type(&self) -> &ContentType {
        match self {
            Self::Single { content_type, .. } | Self::Multipart { content_type, .. } => {
                content_type
            }
        }
    }
}

/// Transport-ready MIME message.
///
/// Populated field by field and serialized with [`MimeMessage::to_bytes`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MimeMessage {
    from: Option<Mailbox>,
    reply_to: Vec<Mailbox>,
    to: Vec<Mailbox>,
    cc: Vec<Mailbox>,
    bcc: Vec<Mailbox>,
    subject: Option<String>,
    sent_date: Option<DateTime<Utc>>,
    message_id: Option<String>,
    headers: Headers,
    body: Option<Body>,
    charset: Option<String>,
}

impl MimeMessage {
    /// Creates an empty message.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the sender.
    pub fn set_from(&mut self, from: Mailbox) {
        self.from = Some(from);
    }

    /// Returns the sender.
    #[must_use]
    pub const fn from(&self) -> Option<&Mailbox> {
        self.from.as_ref()
    }

    /// Appends recipients of the given category.
    pub fn add_recipients(&mut self, kind: RecipientType, recipients: impl IntoIterator<Item = Mailbox>) {
        self.list_mut(kind).extend(recipients);
    }

    /// Returns the recipients of the given category.
    #[must_use]
    pub fn recipients(&self, kind: RecipientType) -> &[Mailbox] {
        match kind {
            RecipientType::To => &self.to,
            RecipientType::Cc => &self.cc,
            RecipientType::Bcc => &self.bcc,
        }
    }

    /// Returns every recipient in To, Cc, Bcc order.
    #[must_use]
    pub fn all_recipients(&self) -> Vec<&Mailbox> {
        self.to.iter().chain(&self.cc).chain(&self.bcc).collect()
    }

    /// Sets the Reply-To list.
    pub fn set_reply_to(&mut self, reply_to: Vec<Mailbox>) {
        self.reply_to = reply_to;
    }

    /// Returns the Reply-To list.
    #[must_use]
    pub fn reply_to(&self) -> &[Mailbox] {
        &self.reply_to
    }

    /// Sets the subject.
    pub fn set_subject(&mut self, subject: impl Into<String>) {
        self.subject = Some(subject.into());
    }

    /// Returns the subject.
    #[must_use]
    pub fn subject(&self) -> Option<&str> {
        self.subject.as_deref()
    }

    /// Sets the sent date.
    pub const fn set_sent_date(&mut self, date: DateTime<Utc>) {
        self.sent_date = Some(date);
    }

    /// Returns the sent date.
    #[must_use]
    pub const fn sent_date(&self) -> Option<DateTime<Utc>> {
        self.sent_date
    }

    /// Sets the Message-ID (including angle brackets).
    pub fn set_message_id(&mut self, message_id: impl Into<String>) {
        self.message_id = Some(message_id.into());
    }

    /// Returns the Message-ID.
    #[must_use]
    pub fn message_id(&self) -> Option<&str> {
        self.message_id.as_deref()
    }

    /// Sets an additional header, replacing an existing one with the same name.
    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.headers.set(name, value);
    }

    /// Returns an additional header value.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    /// Returns the additional headers.
    #[must_use]
    pub const fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Sets a single-part body with the given content type.
    pub fn set_body(&mut self, data: impl Into<Vec<u8>>, content_type: ContentType) {
        self.body = Some(Body::Single {
            content_type,
            data: data.into(),
        });
    }

    /// Sets a multipart body with the given content type. The multipart's
    /// boundary is added to the content type.
    pub fn set_multipart(&mut self, multipart: Multipart, content_type: ContentType) {
        let content_type = content_type.with_parameter("boundary", multipart.boundary());
        self.body = Some(Body::Multipart {
            content_type,
            multipart,
        });
    }

    /// Returns the body.
    #[must_use]
    pub const fn body(&self) -> Option<&Body> {
        self.body.as_ref()
    }

    /// Returns the content type of the body.
    #[must_use]
    pub fn content_type(&self) -> Option<&ContentType> {
        self.body.as_ref().map(Body::content_type)
    }

    /// Sets the charset label written on text bodies.
    ///
    /// The label is not a transcoding: body bytes are written as given, so
    /// they must already be in this charset.
    pub fn set_charset(&mut self, charset: impl Into<String>) {
        self.charset = Some(charset.into());
    }

    /// Returns the charset, if one was set.
    #[must_use]
    pub fn charset(&self) -> Option<&str> {
        self.charset.as_deref()
    }

    /// Serializes the message into RFC 5322 bytes with CRLF line endings.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        self.to_string().into_bytes()
    }

    fn list_mut(&mut self, kind: RecipientType) -> &mut Vec<Mailbox> {
        match kind {
            RecipientType::To => &mut self.to,
            RecipientType::Cc => &mut self.cc,
            RecipientType::Bcc => &mut self.bcc,
        }
    }

    fn envelope_headers(&self) -> Headers {
        let mut fields = Headers::new();

        let date = self.sent_date.unwrap_or_else(Utc::now);
        fields.set("Date", date.to_rfc2822());
        if let Some(from) = &self.from {
            fields.set("From", from.to_header_value());
        }
        if !self.reply_to.is_empty() {
            fields.set("Reply-To", join_mailboxes(&self.reply_to));
        }
        for kind in [RecipientType::To, RecipientType::Cc] {
            let list = self.recipients(kind);
            if !list.is_empty() {
                fields.set(kind.header_name(), join_mailboxes(list));
            }
        }
        if let Some(subject) = &self.subject {
            fields.set("Subject", encode_rfc2047(subject, "utf-8"));
        }
        if let Some(message_id) = &self.message_id {
            fields.set("Message-ID", message_id.clone());
        }
        fields.set("MIME-Version", "1.0");

        for (name, value) in self.headers.iter() {
            if MANAGED_HEADERS.iter().any(|m| m.eq_ignore_ascii_case(name)) {
                tracing::debug!(header = name, "Skipping header managed by the message");
                continue;
            }
            let value = if needs_rfc2047(value) {
                encode_rfc2047(value, "utf-8")
            } else {
                value.to_string()
            };
            fields.set(name, value);
        }

        fields
    }

    /// Content type written for a single-part body: the message charset is
    /// applied to text bodies, and UTF-8 text without any charset is
    /// labelled so the bytes stay readable.
    fn single_part_content_type(&self, content_type: &ContentType, data: &[u8]) -> ContentType {
        let mut content_type = content_type.clone();
        if content_type.is_text() && content_type.charset().is_none() {
            if let Some(charset) = &self.charset {
                content_type.set_parameter("charset", charset.clone());
            } else if !data.is_ascii() && std::str::from_utf8(data).is_ok() {
                content_type.set_parameter("charset", "utf-8");
            }
        }
        content_type
    }
}

fn join_mailboxes(list: &[Mailbox]) -> String {
    list.iter()
        .map(Mailbox::to_header_value)
        .collect::<Vec<_>>()
        .join(", ")
}

impl fmt::Display for MimeMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.envelope_headers().to_string())?;

        match &self.body {
            Some(Body::Single { content_type, data }) => {
                let content_type = self.single_part_content_type(content_type, data);
                let encoding = TransferEncoding::choose(&content_type, data);
                f.write_str(&format_header("Content-Type", &content_type.to_string()))?;
                f.write_str(&format_header(
                    "Content-Transfer-Encoding",
                    &encoding.to_string(),
                ))?;
                f.write_str("\r\n")?;
                f.write_str(&encoding.encode(data))?;
                f.write_str("\r\n")
            }
            Some(Body::Multipart {
                content_type,
                multipart,
            }) => {
                f.write_str(&format_header("Content-Type", &content_type.to_string()))?;
                f.write_str("\r\n")?;
                let mut body = String::new();
                multipart.write_body(&mut body);
                f.write_str(&body)
            }
            None => f.write_str("\r\n"),
        }
    }
}

/// Returns a random 32 digit hex token for boundaries and Message-IDs.
pub(crate) fn unique_token() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Generates a Message-ID (`<token@domain>`) for the given domain.
#[must_use]
pub fn generate_message_id(domain: &str) -> String {
    format!("<{}@{domain}>", unique_token())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use super::*;
    use crate::multipart::Part;
    use chrono::TimeZone;

    fn mailbox(addr: &str) -> Mailbox {
        Mailbox::new(addr).unwrap()
    }

    fn simple_message() -> MimeMessage {
        let mut message = MimeMessage::new();
        message.set_from(Mailbox::with_name("Sender", "sender@example.com").unwrap());
        message.add_recipients(RecipientType::To, [mailbox("to@example.com")]);
        message.set_subject("Test");
        message.set_sent_date(Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap());
        message
    }

    #[test]
    fn test_recipients_by_category() {
        let mut message = MimeMessage::new();
        message.add_recipients(RecipientType::To, [mailbox("a@example.com")]);
        message.add_recipients(RecipientType::Cc, [mailbox("b@example.com")]);
        message.add_recipients(RecipientType::Bcc, [mailbox("c@example.com")]);

        assert_eq!(message.recipients(RecipientType::To).len(), 1);
        assert_eq!(message.recipients(RecipientType::Cc).len(), 1);
        assert_eq!(message.recipients(RecipientType::Bcc).len(), 1);

        let all: Vec<&str> = message
            .all_recipients()
            .iter()
            .map(|m| m.address.as_str())
            .collect();
        assert_eq!(all, vec!["a@example.com", "b@example.com", "c@example.com"]);
    }

    #[test]
    fn test_single_part_serialization() {
        let mut message = simple_message();
        message.set_body("Hello, World!", ContentType::text_plain());

        let text = message.to_string();
        assert!(text.starts_with("Date: Tue, 2 Jan 2024 03:04:05 +0000\r\n"));
        assert!(text.contains("From: Sender <sender@example.com>\r\n"));
        assert!(text.contains("To: to@example.com\r\n"));
        assert!(text.contains("Subject: Test\r\n"));
        assert!(text.contains("MIME-Version: 1.0\r\n"));
        assert!(text.contains("Content-Type: text/plain\r\n"));
        assert!(text.contains("Content-Transfer-Encoding: 7bit\r\n"));
        assert!(text.ends_with("\r\n\r\nHello, World!\r\n"));
    }

    #[test]
    fn test_charset_applied_to_text_body() {
        let mut message = simple_message();
        message.set_body("Hi", ContentType::text_plain());
        message.set_charset("ISO-8859-1");

        assert_eq!(message.charset(), Some("ISO-8859-1"));
        assert!(message.to_string().contains("Content-Type: text/plain; charset=ISO-8859-1\r\n"));
    }

    #[test]
    fn test_utf8_body_without_charset_is_labelled_on_the_wire() {
        let mut message = simple_message();
        message.set_body("Grüße", ContentType::text_plain());

        assert_eq!(message.charset(), None);
        let text = message.to_string();
        assert!(text.contains("Content-Type: text/plain; charset=utf-8\r\n"));
        assert!(text.contains("Content-Transfer-Encoding: quoted-printable\r\n"));
    }

    #[test]
    fn test_bcc_is_never_written() {
        let mut message = simple_message();
        message.add_recipients(RecipientType::Bcc, [mailbox("hidden@example.com")]);
        message.set_header("Bcc", "hidden@example.com");

        let text = message.to_string();
        assert!(!text.contains("Bcc:"));
        assert!(!text.contains("hidden@example.com"));
    }

    #[test]
    fn test_custom_headers_follow_standard_fields() {
        let mut message = simple_message();
        message.set_header("X-Mailer", "mailwright");
        message.set_header("Content-Type", "text/evil");
        message.set_body("x", ContentType::text_plain());

        let text = message.to_string();
        let mime = text.find("MIME-Version").unwrap();
        let mailer = text.find("X-Mailer: mailwright").unwrap();
        assert!(mailer > mime);
        assert!(!text.contains("text/evil"));
    }

    #[test]
    fn test_custom_header_cannot_replace_managed_field() {
        let mut message = simple_message();
        message.set_header("Subject", "Overridden");
        message.set_header("to", "intruder@example.com");
        message.set_header("Date", "yesterday");
        message.set_header("From", "spoof@example.com");

        let text = message.to_string();
        assert!(text.contains("Subject: Test\r\n"));
        assert_eq!(text.matches("Subject:").count(), 1);
        assert!(text.contains("To: to@example.com\r\n"));
        assert!(!text.contains("intruder@example.com"));
        assert!(!text.contains("yesterday"));
        assert!(!text.contains("spoof@example.com"));
    }

    #[test]
    fn test_custom_message_id_replaces_generated() {
        let mut message = simple_message();
        message.set_message_id(generate_message_id("example.com"));
        message.set_header("Message-ID", "<fixed@example.com>");

        let text = message.to_string();
        assert!(text.contains("Message-ID: <fixed@example.com>\r\n"));
        assert_eq!(text.matches("Message-ID:").count(), 1);
    }

    #[test]
    fn test_charset_is_a_label_only() {
        let mut message = simple_message();
        message.set_body("caf\u{e9}", ContentType::text_plain());
        message.set_charset("ISO-8859-1");

        let text = message.to_string();
        assert!(text.contains("charset=ISO-8859-1"));
        // UTF-8 bytes of é, unchanged
        assert!(text.contains("caf=C3=A9"));
    }

    #[test]
    fn test_non_ascii_subject_is_encoded() {
        let mut message = simple_message();
        message.set_subject("Héllo");
        assert!(message.to_string().contains("Subject: =?utf-8?B?SMOpbGxv?=\r\n"));
    }

    #[test]
    fn test_multipart_serialization() {
        let multipart = Multipart::mixed()
            .with_part(Part::text("one"))
            .with_part(Part::text("two"));
        let boundary = multipart.boundary().to_string();

        let mut message = simple_message();
        message.set_multipart(multipart, ContentType::multipart("form"));

        let ct = message.content_type().unwrap();
        assert_eq!(ct.essence(), "multipart/form");
        assert_eq!(ct.boundary(), Some(boundary.as_str()));

        let text = message.to_string();
        assert!(text.contains("Content-Type: multipart/form;"));
        assert!(text.contains(&format!("--{boundary}\r\n")));
        assert!(text.ends_with(&format!("--{boundary}--\r\n")));
    }

    #[test]
    fn test_message_id() {
        let id = generate_message_id("example.com");
        assert!(id.starts_with('<'));
        assert!(id.ends_with("@example.com>"));
        assert_ne!(id, generate_message_id("example.com"));

        let token = &id[1..id.len() - "@example.com>".len()];
        assert_eq!(token.len(), 32);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
