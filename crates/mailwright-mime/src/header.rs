//! MIME header handling.

use crate::error::{Error, Result};
use std::fmt;

/// Preferred maximum header line length (RFC 5322, section 2.1.1).
const FOLD_WIDTH: usize = 78;

/// Ordered collection of email headers.
///
/// Lookup is case-insensitive; iteration and serialization follow insertion
/// order. Setting an existing name replaces its value in place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    entries: Vec<(String, String)>,
}

impl Headers {
    /// Creates a new empty header collection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a header value, replacing any existing value with the same name.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self
            .entries
            .iter_mut()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(&name))
        {
            Some((_, existing)) => *existing = value,
            None => self.entries.push((name, value)),
        }
    }

    /// Gets the value for a header.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Returns true if the header is present.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Removes a header, returning its value.
    pub fn remove(&mut self, name: &str) -> Option<String> {
        let index = self
            .entries
            .iter()
            .position(|(existing, _)| existing.eq_ignore_ascii_case(name))?;
        Some(self.entries.remove(index).1)
    }

    /// Returns the number of headers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if there are no headers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns an iterator over all headers in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }
}

impl<N: Into<String>, V: Into<String>> FromIterator<(N, V)> for Headers {
    fn from_iter<I: IntoIterator<Item = (N, V)>>(iter: I) -> Self {
        let mut headers = Self::new();
        for (name, value) in iter {
            headers.set(name, value);
        }
        headers
    }
}

/// Validates a header field name (RFC 5322 `ftext`: printable ASCII except
/// colon).
///
/// # Errors
///
/// Returns [`Error::InvalidHeader`] if the name is empty or contains an
/// invalid character.
pub fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::InvalidHeader("Header name cannot be empty".into()));
    }
    if name.bytes().all(|b| (33..=126).contains(&b) && b != b':') {
        Ok(())
    } else {
        Err(Error::InvalidHeader(format!(
            "Header name contains invalid characters: {name:?}"
        )))
    }
}

/// Formats `Name: value` as one or more CRLF terminated lines.
///
/// Line breaks inside the value are flattened to spaces, runs of spaces
/// collapse, and the line is folded at whitespace once it grows past 78
/// characters.
#[must_use]
pub fn format_header(name: &str, value: &str) -> String {
    let flattened: String = value
        .chars()
        .map(|c| if c == '\r' || c == '\n' { ' ' } else { c })
        .collect();

    let mut output = String::with_capacity(name.len() + flattened.len() + 4);
    output.push_str(name);
    output.push(':');
    let mut line_length = output.len();

    for word in flattened.split(' ').filter(|w| !w.is_empty()) {
        if line_length + 1 + word.len() > FOLD_WIDTH && line_length > name.len() + 1 {
            output.push_str("\r\n");
            line_length = 0;
        }
        output.push(' ');
        output.push_str(word);
        line_length += 1 + word.len();
    }

    output.push_str("\r\n");
    output
}

impl fmt::Display for Headers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, value) in &self.entries {
            f.write_str(&format_header(name, value))?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use super::*;

    #[test]
    fn test_headers_new() {
        let headers = Headers::new();
        assert!(headers.is_empty());
    }

    #[test]
    fn test_headers_set_get() {
        let mut headers = Headers::new();
        headers.set("Content-Type", "text/plain");
        assert_eq!(headers.get("Content-Type"), Some("text/plain"));
        assert_eq!(headers.get("content-type"), Some("text/plain")); // Case insensitive
    }

    #[test]
    fn test_headers_set_overwrites_in_place() {
        let mut headers = Headers::new();
        headers.set("X-First", "1");
        headers.set("X-Second", "2");
        headers.set("x-first", "3");

        assert_eq!(headers.len(), 2);
        let names: Vec<&str> = headers.iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["X-First", "X-Second"]);
        assert_eq!(headers.get("X-First"), Some("3"));
    }

    #[test]
    fn test_headers_remove() {
        let mut headers = Headers::new();
        headers.set("Subject", "Test");
        assert_eq!(headers.remove("subject").as_deref(), Some("Test"));
        assert!(headers.get("Subject").is_none());
        assert!(headers.remove("Subject").is_none());
    }

    #[test]
    fn test_headers_from_iter() {
        let headers: Headers = vec![("A", "1"), ("B", "2")].into_iter().collect();
        assert_eq!(headers.len(), 2);
        assert!(headers.contains("b"));
    }

    #[test]
    fn test_validate_name() {
        assert!(validate_name("X-Mailer").is_ok());
        assert!(validate_name("").is_err());
        assert!(validate_name("Bad Name").is_err());
        assert!(validate_name("Bad:Name").is_err());
        assert!(validate_name("Bädname").is_err());
    }

    #[test]
    fn test_format_header_short() {
        assert_eq!(format_header("Subject", "Hello"), "Subject: Hello\r\n");
    }

    #[test]
    fn test_format_header_flattens_line_breaks() {
        assert_eq!(
            format_header("Subject", "Hello\r\nBcc: victim@example.com"),
            "Subject: Hello Bcc: victim@example.com\r\n"
        );
    }

    #[test]
    fn test_format_header_folds_long_values() {
        let value = "word ".repeat(40);
        let formatted = format_header("X-Long", &value);
        for line in formatted.trim_end().split("\r\n") {
            assert!(line.len() <= 78);
        }
        assert!(formatted.contains("\r\n word"));
    }

    #[test]
    fn test_headers_display() {
        let mut headers = Headers::new();
        headers.set("From", "sender@example.com");
        headers.set("To", "recipient@example.com");

        assert_eq!(
            headers.to_string(),
            "From: sender@example.com\r\nTo: recipient@example.com\r\n"
        );
    }
}
