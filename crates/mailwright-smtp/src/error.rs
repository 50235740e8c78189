//! Error types for SMTP operations.

use std::io;

/// Result type alias for SMTP operations.
pub type Result<T> = std::result::Result<T, Error>;

/// SMTP error types.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// TLS error.
    #[error("TLS error: {0}")]
    Tls(#[from] rustls::Error),

    /// Invalid DNS name for TLS.
    #[error("Invalid DNS name: {0}")]
    InvalidDnsName(#[from] rustls::pki_types::InvalidDnsNameError),

    /// Server returned error response.
    #[error("SMTP error {code}: {message}")]
    SmtpError {
        /// Reply code (e.g., 550).
        code: u16,
        /// Error message from server.
        message: String,
    },

    /// Protocol error (unexpected or malformed response).
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// A connect or read did not complete in time.
    #[error("Timed out while {0}")]
    Timeout(String),

    /// POP-before-SMTP login failed.
    #[error("POP-before-SMTP failed: {0}")]
    PreAuth(String),

    /// Session or message cannot be sent as configured.
    #[error("Invalid session: {0}")]
    InvalidSession(String),

    /// Message exceeds the size the server accepts.
    #[error("Message exceeds size limit: {0} bytes")]
    MessageTooLarge(usize),

    /// Feature not supported by server.
    #[error("Server does not support {0}")]
    NotSupported(String),
}

impl Error {
    /// Creates an SMTP error from a reply code and message.
    #[must_use]
    pub fn smtp_error(code: u16, message: impl Into<String>) -> Self {
        Self::SmtpError {
            code,
            message: message.into(),
        }
    }

    /// Returns true if this is a permanent error (5xx).
    #[must_use]
    pub const fn is_permanent(&self) -> bool {
        matches!(self, Self::SmtpError { code, .. } if *code >= 500 && *code < 600)
    }

    /// Returns true if this is a transient error (4xx).
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::SmtpError { code, .. } if *code >= 400 && *code < 500)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        assert!(Error::smtp_error(550, "No such user").is_permanent());
        assert!(Error::smtp_error(451, "Try later").is_transient());
        assert!(!Error::Protocol("bad".into()).is_permanent());
    }

    #[test]
    fn test_error_display() {
        let err = Error::smtp_error(535, "Authentication failed");
        assert_eq!(err.to_string(), "SMTP error 535: Authentication failed");
        assert_eq!(
            Error::Timeout("reading reply".into()).to_string(),
            "Timed out while reading reply"
        );
    }
}
