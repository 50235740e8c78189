//! Multipart bodies and their parts.

use crate::content_type::ContentType;
use crate::encoding::{
    encode_base64_wrapped, encode_quoted_printable, encode_rfc2047, is_seven_bit_safe,
};
use crate::header::{Headers, format_header};
use crate::message::unique_token;
use std::fmt;

/// Transfer encoding applied to a body when it is serialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferEncoding {
    /// 7-bit ASCII, sent as is.
    SevenBit,
    /// Quoted-Printable encoding.
    QuotedPrintable,
    /// Base64 encoding.
    Base64,
}

impl TransferEncoding {
    /// Picks the encoding for a body: `7bit` when the data is short-line
    /// ASCII, Quoted-Printable for other text, Base64 for everything else.
    #[must_use]
    pub fn choose(content_type: &ContentType, data: &[u8]) -> Self {
        if is_seven_bit_safe(data) {
            Self::SevenBit
        } else if content_type.is_text() {
            Self::QuotedPrintable
        } else {
            Self::Base64
        }
    }

    /// Encodes data with this transfer encoding. Line endings are CRLF.
    #[must_use]
    pub fn encode(self, data: &[u8]) -> String {
        match self {
            Self::SevenBit => {
                let text = String::from_utf8_lossy(data);
                text.split('\n')
                    .map(|line| line.strip_suffix('\r').unwrap_or(line))
                    .collect::<Vec<_>>()
                    .join("\r\n")
            }
            Self::QuotedPrintable => encode_quoted_printable(data),
            Self::Base64 => encode_base64_wrapped(data),
        }
    }
}

impl fmt::Display for TransferEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SevenBit => write!(f, "7bit"),
            Self::QuotedPrintable => write!(f, "quoted-printable"),
            Self::Base64 => write!(f, "base64"),
        }
    }
}

/// Body of a part: raw data or a nested multipart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PartBody {
    /// Leaf data, transfer encoded on output.
    Data(Vec<u8>),
    /// Nested multipart (e.g. `multipart/alternative` inside `multipart/mixed`).
    Nested(Multipart),
}

/// MIME message part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Part {
    /// Part content type.
    pub content_type: ContentType,
    /// Additional part headers (e.g. `Content-Disposition`).
    pub headers: Headers,
    /// Part body.
    pub body: PartBody,
}

impl Part {
    /// Creates a new leaf part.
    #[must_use]
    pub fn new(content_type: ContentType, body: impl Into<Vec<u8>>) -> Self {
        Self {
            content_type,
            headers: Headers::new(),
            body: PartBody::Data(body.into()),
        }
    }

    /// Creates a `text/plain; charset=utf-8` part.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self::new(
            ContentType::text_plain().with_parameter("charset", "utf-8"),
            text.into(),
        )
    }

    /// Creates a `text/html; charset=utf-8` part.
    #[must_use]
    pub fn html(html: impl Into<String>) -> Self {
        Self::new(
            ContentType::text_html().with_parameter("charset", "utf-8"),
            html.into(),
        )
    }

    /// Creates an attachment part with a `Content-Disposition` filename.
    #[must_use]
    pub fn attachment(
        filename: &str,
        content_type: ContentType,
        data: impl Into<Vec<u8>>,
    ) -> Self {
        let mut part = Self::new(content_type, data);
        let filename = encode_rfc2047(filename, "utf-8").replace('"', "\\\"");
        part.headers.set(
            "Content-Disposition",
            format!("attachment; filename=\"{filename}\""),
        );
        part
    }

    /// Wraps a multipart so it can be nested inside another one.
    #[must_use]
    pub fn nested(multipart: Multipart) -> Self {
        Self {
            content_type: multipart.content_type(),
            headers: Headers::new(),
            body: PartBody::Nested(multipart),
        }
    }

    /// Adds a header to the part.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.set(name, value);
        self
    }

    fn write_to(&self, out: &mut String) {
        match &self.body {
            PartBody::Data(data) => {
                let encoding = TransferEncoding::choose(&self.content_type, data);
                out.push_str(&format_header("Content-Type", &self.content_type.to_string()));
                out.push_str(&format_header(
                    "Content-Transfer-Encoding",
                    &encoding.to_string(),
                ));
                out.push_str(&self.headers.to_string());
                out.push_str("\r\n");
                out.push_str(&encoding.encode(data));
            }
            PartBody::Nested(multipart) => {
                out.push_str(&format_header(
                    "Content-Type",
                    &multipart.content_type().to_string(),
                ));
                out.push_str(&self.headers.to_string());
                out.push_str("\r\n");
                multipart.write_body(out);
            }
        }
    }
}

/// Structured multipart body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Multipart {
    sub_type: String,
    boundary: String,
    parts: Vec<Part>,
}

impl Multipart {
    /// Creates an empty multipart body with the given subtype and a freshly
    /// generated boundary.
    #[must_use]
    pub fn new(sub_type: impl Into<String>) -> Self {
        Self {
            sub_type: sub_type.into().to_lowercase(),
            boundary: format!("----=_Part_{}", unique_token()),
            parts: Vec::new(),
        }
    }

    /// Creates an empty `multipart/mixed` body.
    #[must_use]
    pub fn mixed() -> Self {
        Self::new("mixed")
    }

    /// Creates an empty `multipart/alternative` body.
    #[must_use]
    pub fn alternative() -> Self {
        Self::new("alternative")
    }

    /// Creates an empty `multipart/related` body.
    #[must_use]
    pub fn related() -> Self {
        Self::new("related")
    }

    /// Appends a part.
    #[must_use]
    pub fn with_part(mut self, part: Part) -> Self {
        self.parts.push(part);
        self
    }

    /// Appends a part.
    pub fn add_part(&mut self, part: Part) {
        self.parts.push(part);
    }

    /// Returns the multipart subtype (e.g. `mixed`).
    #[must_use]
    pub fn sub_type(&self) -> &str {
        &self.sub_type
    }

    /// Returns the boundary delimiter.
    #[must_use]
    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    /// Returns the parts in order.
    #[must_use]
    pub fn parts(&self) -> &[Part] {
        &self.parts
    }

    /// Returns the content type implied by this body:
    /// `multipart/<subtype>; boundary=...`.
    #[must_use]
    pub fn content_type(&self) -> ContentType {
        ContentType::multipart(self.sub_type.clone()).with_parameter("boundary", &self.boundary)
    }

    /// Writes the preamble, every part and the closing delimiter.
    pub(crate) fn write_body(&self, out: &mut String) {
        out.push_str("This is a multi-part message in MIME format.\r\n");
        for part in &self.parts {
            out.push_str("\r\n--");
            out.push_str(&self.boundary);
            out.push_str("\r\n");
            part.write_to(out);
        }
        out.push_str("\r\n--");
        out.push_str(&self.boundary);
        out.push_str("--\r\n");
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use super::*;

    #[test]
    fn test_transfer_encoding_choose() {
        let text = ContentType::text_plain();
        let binary = ContentType::new("application", "octet-stream");

        assert_eq!(TransferEncoding::choose(&text, b"hello"), TransferEncoding::SevenBit);
        assert_eq!(
            TransferEncoding::choose(&text, "héllo".as_bytes()),
            TransferEncoding::QuotedPrintable
        );
        assert_eq!(
            TransferEncoding::choose(&binary, &[0xFF, 0x00]),
            TransferEncoding::Base64
        );
    }

    #[test]
    fn test_seven_bit_normalizes_line_endings() {
        assert_eq!(TransferEncoding::SevenBit.encode(b"a\nb\r\nc"), "a\r\nb\r\nc");
    }

    #[test]
    fn test_multipart_boundaries_are_unique() {
        let first = Multipart::mixed();
        let second = Multipart::mixed();
        assert_ne!(first.boundary(), second.boundary());
    }

    #[test]
    fn test_multipart_content_type() {
        let multipart = Multipart::alternative();
        let ct = multipart.content_type();
        assert_eq!(ct.essence(), "multipart/alternative");
        assert_eq!(ct.boundary(), Some(multipart.boundary()));
    }

    #[test]
    fn test_multipart_write_body() {
        let multipart = Multipart::mixed()
            .with_part(Part::text("Hello"))
            .with_part(Part::attachment(
                "data.bin",
                ContentType::new("application", "octet-stream"),
                vec![0_u8, 1, 2],
            ));

        let mut out = String::new();
        multipart.write_body(&mut out);

        let delimiter = format!("--{}\r\n", multipart.boundary());
        assert_eq!(out.matches(&delimiter).count(), 2);
        assert!(out.ends_with(&format!("--{}--\r\n", multipart.boundary())));
        assert!(out.contains("Content-Type: text/plain; charset=utf-8\r\n"));
        assert!(out.contains("Content-Disposition: attachment; filename=\"data.bin\"\r\n"));
        assert!(out.contains("Content-Transfer-Encoding: base64\r\n"));
        assert!(out.contains("\r\n\r\nAAEC"));
    }

    #[test]
    fn test_nested_multipart() {
        let alternative = Multipart::alternative()
            .with_part(Part::text("plain"))
            .with_part(Part::html("<p>html</p>"));
        let inner_boundary = alternative.boundary().to_string();
        let mixed = Multipart::mixed().with_part(Part::nested(alternative));

        let mut out = String::new();
        mixed.write_body(&mut out);

        assert!(out.contains("Content-Type: multipart/alternative;"));
        assert!(out.contains(&format!("--{inner_boundary}\r\n")));
        assert!(out.contains(&format!("--{inner_boundary}--\r\n")));
    }

    #[test]
    fn test_nested_content_type_is_folded() {
        let alternative = Multipart::alternative().with_part(Part::text("plain"));
        let inner_boundary = alternative.boundary().to_string();
        let mixed = Multipart::mixed().with_part(Part::nested(alternative));

        let mut out = String::new();
        mixed.write_body(&mut out);

        let start = out.find("Content-Type: multipart/alternative;").unwrap();
        let end = start + out[start..].find("\r\n\r\n").unwrap();
        let header = &out[start..end];
        for line in header.split("\r\n") {
            assert!(line.len() <= 78, "line too long: {line}");
        }
        assert!(header.contains("\r\n "));

        let unfolded = header.replace("\r\n ", " ");
        assert!(unfolded.contains(&format!("boundary=\"{inner_boundary}\"")));
    }

    #[test]
    fn test_boundary_token_is_random_hex() {
        let multipart = Multipart::mixed();
        let token = multipart.boundary().strip_prefix("----=_Part_").unwrap();
        assert_eq!(token.len(), 32);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
