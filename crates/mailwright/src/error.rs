//! Error types for message building and session resolution.

use thiserror::Error;

/// Errors that can occur while composing or sending an email.
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed address, or an empty batch where addresses were required.
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    /// The operation is not allowed in the current state.
    #[error("Illegal state: {0}")]
    IllegalState(String),

    /// A required part of the message is missing.
    #[error("Incomplete message: {0}")]
    IncompleteMessage(String),

    /// Unsupported or contradictory content and content type.
    #[error("Invalid content: {0}")]
    InvalidContent(String),

    /// No usable session could be resolved.
    #[error("Session error: {0}")]
    Session(String),

    /// Session settings could not be (de)serialized.
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// Delivery failed.
    #[error("Transport error: {0}")]
    Transport(#[from] mailwright_smtp::Error),
}

impl From<mailwright_mime::Error> for Error {
    fn from(err: mailwright_mime::Error) -> Self {
        match err {
            mailwright_mime::Error::InvalidAddress(msg) => Self::InvalidAddress(msg),
            mailwright_mime::Error::InvalidContentType(msg)
            | mailwright_mime::Error::InvalidHeader(msg) => Self::InvalidContent(msg),
        }
    }
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

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
    fn test_mime_errors_map_to_kinds() {
        let err: Error = mailwright_mime::Error::InvalidAddress("no @".into()).into();
        assert!(matches!(err, Error::InvalidAddress(ref m) if m == "no @"));

        let err: Error = mailwright_mime::Error::InvalidContentType("bad".into()).into();
        assert!(matches!(err, Error::InvalidContent(_)));
    }

    #[test]
    fn test_display() {
        let err = Error::Session("no host name configured".into());
        assert_eq!(err.to_string(), "Session error: no host name configured");
    }
}
