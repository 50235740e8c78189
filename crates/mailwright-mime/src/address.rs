//! Email address types.
//!
//! [`Address`] is a validated `local@domain` endpoint and [`Mailbox`] pairs it
//! with an optional display name. Both accept internationalized (non-ASCII)
//! local parts and domains.

use crate::encoding::encode_rfc2047;
use crate::error::{Error, Result};
use std::fmt;
use std::str::FromStr;

/// Maximum length of a complete address in octets (RFC 5321, section 4.5.3.1.3).
const MAX_ADDRESS_LENGTH: usize = 254;

/// Maximum length of the local part in octets.
const MAX_LOCAL_LENGTH: usize = 64;

/// Maximum length of a single domain label in octets.
const MAX_LABEL_LENGTH: usize = 63;

/// Characters allowed in a dot-atom besides alphanumerics (RFC 5322 `atext`).
const ATEXT_SPECIALS: &str = "!#$%&'*+-/=?^_`{|}~";

/// Characters that force a display name to be quoted.
const DISPLAY_NAME_SPECIALS: &str = "()<>[]:;@\\,.\"";

/// Email address (`local@domain`).
///
/// The domain is stored lower-cased; the local part is kept as written.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Address(String);

impl Address {
    /// Creates a new address from a string.
    ///
    /// Surrounding whitespace is ignored.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidAddress`] if the address is not syntactically valid.
    pub fn new(addr: impl Into<String>) -> Result<Self> {
        let addr = addr.into();
        let (local, domain) = Self::validate(addr.trim())?;
        Ok(Self(format!("{local}@{}", normalize_domain(domain))))
    }

    /// Returns the address as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the local part (before the last `@`).
    #[must_use]
    pub fn local_part(&self) -> &str {
        self.0.rsplit_once('@').map_or("", |(local, _)| local)
    }

    /// Returns the domain part (after the last `@`).
    #[must_use]
    pub fn domain(&self) -> &str {
        self.0.rsplit_once('@').map_or("", |(_, domain)| domain)
    }

    /// Returns true if the address contains non-ASCII characters.
    #[must_use]
    pub fn is_internationalized(&self) -> bool {
        !self.0.is_ascii()
    }

    fn validate(addr: &str) -> Result<(&str, &str)> {
        if addr.is_empty() {
            return Err(Error::InvalidAddress("Address cannot be empty".into()));
        }

        if addr.len() > MAX_ADDRESS_LENGTH {
            return Err(Error::InvalidAddress(format!(
                "Address exceeds {MAX_ADDRESS_LENGTH} octets"
            )));
        }

        let (local, domain) = addr
            .rsplit_once('@')
            .ok_or_else(|| Error::InvalidAddress(format!("Address must contain @: {addr}")))?;

        if local.is_empty() || domain.is_empty() {
            return Err(Error::InvalidAddress(format!(
                "Local and domain parts cannot be empty: {addr}"
            )));
        }

        validate_local_part(local).map_err(|reason| {
            Error::InvalidAddress(format!("{reason} in local part of {addr}"))
        })?;
        validate_domain(domain)
            .map_err(|reason| Error::InvalidAddress(format!("{reason} in domain of {addr}")))?;

        Ok((local, domain))
    }
}

fn validate_local_part(local: &str) -> std::result::Result<(), &'static str> {
    if local.len() > MAX_LOCAL_LENGTH {
        return Err("Too many octets");
    }

    if local.len() >= 2 && local.starts_with('"') && local.ends_with('"') {
        return validate_quoted_string(&local[1..local.len() - 1]);
    }

    validate_dot_atom(local)
}

fn validate_quoted_string(inner: &str) -> std::result::Result<(), &'static str> {
    let mut chars = inner.chars();
    while let Some(ch) = chars.next() {
        match ch {
            '\\' => {
                if chars.next().is_none() {
                    return Err("Dangling escape");
                }
            }
            '"' => return Err("Unescaped quote"),
            '\r' | '\n' => return Err("Line break"),
            _ => {}
        }
    }
    Ok(())
}

fn validate_dot_atom(atom: &str) -> std::result::Result<(), &'static str> {
    if atom.starts_with('.') || atom.ends_with('.') {
        return Err("Leading or trailing dot");
    }
    if atom.contains("..") {
        return Err("Consecutive dots");
    }
    if atom.chars().all(is_atext_or_dot) {
        Ok(())
    } else {
        Err("Invalid character")
    }
}

fn is_atext_or_dot(ch: char) -> bool {
    ch == '.' || ch.is_ascii_alphanumeric() || ATEXT_SPECIALS.contains(ch) || !ch.is_ascii()
}

fn validate_domain(domain: &str) -> std::result::Result<(), &'static str> {
    if domain.starts_with('[') {
        let literal = domain
            .strip_prefix('[')
            .and_then(|d| d.strip_suffix(']'))
            .ok_or("Unterminated domain literal")?;
        if literal.is_empty() {
            return Err("Empty domain literal");
        }
        let valid = literal
            .chars()
            .all(|c| c.is_ascii_graphic() && !matches!(c, '[' | ']' | '\\'));
        return if valid {
            Ok(())
        } else {
            Err("Invalid character in domain literal")
        };
    }

    for label in domain.split('.') {
        if label.is_empty() {
            return Err("Empty label");
        }
        if label.len() > MAX_LABEL_LENGTH {
            return Err("Label too long");
        }
        if label.starts_with('-') || label.ends_with('-') {
            return Err("Label starts or ends with hyphen");
        }
        if !label
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || !c.is_ascii())
        {
            return Err("Invalid character");
        }
    }

    Ok(())
}

fn normalize_domain(domain: &str) -> String {
    if domain.starts_with('[') {
        domain.to_string()
    } else {
        domain.to_lowercase()
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Address {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

/// Mailbox (optional display name + address).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Mailbox {
    /// Display name (optional).
    pub name: Option<String>,
    /// Email address.
    pub address: Address,
}

impl Mailbox {
    /// Creates a new mailbox with just an address.
    ///
    /// # Errors
    ///
    /// Returns an error if the address is invalid.
    pub fn new(address: impl Into<String>) -> Result<Self> {
        Ok(Self {
            name: None,
            address: Address::new(address)?,
        })
    }

    /// Creates a new mailbox with a display name and address.
    ///
    /// A blank name is treated as no name.
    ///
    /// # Errors
    ///
    /// Returns an error if the address is invalid.
    pub fn with_name(name: impl Into<String>, address: impl Into<String>) -> Result<Self> {
        let name = name.into();
        let name = name.trim();
        Ok(Self {
            name: (!name.is_empty()).then(|| name.to_string()),
            address: Address::new(address)?,
        })
    }

    /// Parses either a bare address or `Display Name <local@domain>`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidAddress`] if the text is not a valid mailbox.
    pub fn parse(text: &str) -> Result<Self> {
        let text = text.trim();
        let Some(open) = text.rfind('<') else {
            return Self::new(text);
        };

        let inner = text[open + 1..]
            .strip_suffix('>')
            .ok_or_else(|| Error::InvalidAddress(format!("Unterminated angle address: {text}")))?;
        let name = unquote_display_name(text[..open].trim());

        Self::with_name(name, inner)
    }

    /// Formats the mailbox for a header field, RFC 2047 encoding the display
    /// name when it contains non-ASCII text.
    #[must_use]
    pub fn to_header_value(&self) -> String {
        match &self.name {
            Some(name) if !name.is_ascii() => {
                format!("{} <{}>", encode_rfc2047(name, "utf-8"), self.address)
            }
            Some(name) => format!("{} <{}>", quote_display_name(name), self.address),
            None => self.address.to_string(),
        }
    }
}

fn unquote_display_name(name: &str) -> String {
    let Some(inner) = name.strip_prefix('"').and_then(|n| n.strip_suffix('"')) else {
        return name.to_string();
    };

    let mut result = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(ch) = chars.next() {
        if ch == '\\' {
            if let Some(escaped) = chars.next() {
                result.push(escaped);
            }
        } else {
            result.push(ch);
        }
    }
    result
}

fn quote_display_name(name: &str) -> String {
    if name.contains(|c: char| DISPLAY_NAME_SPECIALS.contains(c)) {
        let escaped = name.replace('\\', "\\\\").replace('"', "\\\"");
        format!("\"{escaped}\"")
    } else {
        name.to_string()
    }
}

impl fmt::Display for Mailbox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{} <{}>", quote_display_name(name), self.address),
            None => write!(f, "{}", self.address),
        }
    }
}

impl FromStr for Mailbox {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl From<Address> for Mailbox {
    fn from(address: Address) -> Self {
        Self {
            name: None,
            address,
        }
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for Address {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for Address {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let text = <String as serde::Deserialize>::deserialize(deserializer)?;
        Self::new(text).map_err(serde::de::Error::custom)
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for Mailbox {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for Mailbox {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let text = <String as serde::Deserialize>::deserialize(deserializer)?;
        Self::parse(&text).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_address() {
        let addr = Address::new("user@example.com").unwrap();
        assert_eq!(addr.as_str(), "user@example.com");
        assert_eq!(addr.local_part(), "user");
        assert_eq!(addr.domain(), "example.com");
    }

    #[test]
    fn test_domain_is_lowercased() {
        let addr = Address::new("  John.Doe@Example.COM ").unwrap();
        assert_eq!(addr.as_str(), "John.Doe@example.com");
    }

    #[test]
    fn test_invalid_address_no_at() {
        assert!(Address::new("userexample.com").is_err());
    }

    #[test]
    fn test_invalid_address_empty() {
        assert!(Address::new("").is_err());
        assert!(Address::new("   ").is_err());
    }

    #[test]
    fn test_invalid_address_empty_local() {
        assert!(Address::new("@example.com").is_err());
    }

    #[test]
    fn test_invalid_address_empty_domain() {
        assert!(Address::new("user@").is_err());
    }

    #[test]
    fn test_invalid_address_whitespace() {
        assert!(Address::new("us er@example.com").is_err());
    }

    #[test]
    fn test_invalid_address_dots() {
        assert!(Address::new(".user@example.com").is_err());
        assert!(Address::new("a..b@example.com").is_err());
        assert!(Address::new("user@example..com").is_err());
    }

    #[test]
    fn test_invalid_address_hyphen_label() {
        assert!(Address::new("user@-example.com").is_err());
    }

    #[test]
    fn test_local_part_too_long() {
        let local = "a".repeat(65);
        assert!(Address::new(format!("{local}@example.com")).is_err());
    }

    #[test]
    fn test_quoted_local_part() {
        let addr = Address::new("\"john doe\"@example.com").unwrap();
        assert_eq!(addr.local_part(), "\"john doe\"");
    }

    #[test]
    fn test_domain_literal() {
        let addr = Address::new("postmaster@[192.168.0.1]").unwrap();
        assert_eq!(addr.domain(), "[192.168.0.1]");
    }

    #[test]
    fn test_internationalized_address() {
        let addr = Address::new("josé@exämple.de").unwrap();
        assert!(addr.is_internationalized());
    }

    #[test]
    fn test_mailbox_new() {
        let mailbox = Mailbox::new("user@example.com").unwrap();
        assert_eq!(mailbox.address.as_str(), "user@example.com");
        assert!(mailbox.name.is_none());
    }

    #[test]
    fn test_mailbox_with_name() {
        let mailbox = Mailbox::with_name("John Doe", "john@example.com").unwrap();
        assert_eq!(mailbox.name.as_deref(), Some("John Doe"));
        assert_eq!(mailbox.address.as_str(), "john@example.com");
    }

    #[test]
    fn test_mailbox_with_blank_name() {
        let mailbox = Mailbox::with_name("  ", "john@example.com").unwrap();
        assert!(mailbox.name.is_none());
    }

    #[test]
    fn test_mailbox_parse_angle_form() {
        let mailbox = Mailbox::parse("\"Doe, John\" <john@example.com>").unwrap();
        assert_eq!(mailbox.name.as_deref(), Some("Doe, John"));
        assert_eq!(mailbox.address.as_str(), "john@example.com");

        let bare = Mailbox::parse("<john@example.com>").unwrap();
        assert!(bare.name.is_none());
    }

    #[test]
    fn test_mailbox_parse_unterminated() {
        assert!(Mailbox::parse("John <john@example.com").is_err());
    }

    #[test]
    fn test_mailbox_display_quotes_specials() {
        let mailbox = Mailbox::with_name("Doe, John", "john@example.com").unwrap();
        assert_eq!(mailbox.to_string(), "\"Doe, John\" <john@example.com>");
    }

    #[test]
    fn test_mailbox_header_value_encodes_non_ascii() {
        let mailbox = Mailbox::with_name("Jösé", "jose@example.com").unwrap();
        let value = mailbox.to_header_value();
        assert!(value.starts_with("=?utf-8?B?"));
        assert!(value.ends_with("<jose@example.com>"));
    }
}
