//! # mailwright
//!
//! Email composition with one-shot message building and lazy SMTP session
//! resolution.
//!
//! An [`Email`] accumulates a sender, recipients, headers and content, then
//! [`Email::build_message`] produces an immutable [`MimeMessage`] exactly
//! once. The SMTP [`Session`] is derived from [`SessionSettings`] the first
//! time it is needed, unless a pre-built one is supplied.
//!
//! ## Features
//!
//! - To, Cc, Bcc and Reply-To lists with single, named and batch appends
//! - Plain and multipart content with content-type defaulting
//! - Session settings loadable from JSON
//! - Implicit TLS, STARTTLS and POP-before-SMTP configuration
//! - Delivery through any [`Transport`], with [`SmtpTransport`] built in
//!
//! ## Quick Start
//!
//! ```
//! use mailwright::Email;
//!
//! # fn main() -> mailwright::Result<()> {
//! let mut email = Email::new();
//! email
//!     .set_host_name("smtp.example.com")
//!     .set_start_tls_enabled(true);
//! email.set_from_with_name("alice@example.com", "Alice")?;
//! email.add_to("bob@example.com")?;
//! email.add_bcc_many(["audit@example.com", "archive@example.com"])?;
//! email.set_subject("Hello").set_content("Hi Bob!", "text/plain");
//!
//! let message = email.build_message()?;
//! assert_eq!(message.all_recipients().len(), 3);
//! assert!(email.build_message().is_err());
//!
//! let session = email.mail_session()?;
//! assert_eq!(session.port, 587);
//! # Ok(())
//! # }
//! ```
//!
//! Sending needs a runtime:
//!
//! ```ignore
//! use mailwright::{Authenticator, Email, SmtpTransport};
//!
//! let mut email = Email::new();
//! email.set_host_name("smtp.example.com").set_ssl_on_connect(true);
//! email.set_authenticator(Authenticator::plain("alice@example.com", "password"));
//! email.set_from("alice@example.com")?;
//! email.add_to("bob@example.com")?;
//! email.send(&SmtpTransport::new()).await?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod email;
mod error;
mod session;

pub use email::{Content, Email, MessageState, resolve_content_type};
pub use error::{Error, Result};
pub use session::{PreAuthCheck, SessionSettings, pop_before_smtp, resolve_port};

pub use mailwright_mime::{ContentType, Mailbox, MimeMessage, Multipart, Part, RecipientType};
pub use mailwright_smtp::{
    Authenticator, PopBeforeSmtp, PopProtocol, Security, Session, SmtpTransport, Transport,
};
