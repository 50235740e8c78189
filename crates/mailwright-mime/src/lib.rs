//! # mailwright-mime
//!
//! Address parsing and MIME message generation for email.
//!
//! ## Features
//!
//! - **Addresses**: RFC 5322 address validation, display names, IDN domains
//! - **Message generation**: Transport-ready RFC 5322 / MIME messages
//! - **Encoding**: Base64, Quoted-Printable, RFC 2047 header encoding
//! - **Content types**: Parsing and formatting with parameters
//! - **Multipart**: Mixed, alternative, related and nested bodies
//!
//! ## Quick Start
//!
//! ### Parsing Addresses
//!
//! ```
//! use mailwright_mime::Mailbox;
//!
//! let mailbox = Mailbox::parse("Jane Doe <jane@Example.COM>")?;
//! assert_eq!(mailbox.name.as_deref(), Some("Jane Doe"));
//! assert_eq!(mailbox.address.as_str(), "jane@example.com");
//! # Ok::<(), mailwright_mime::Error>(())
//! ```
//!
//! ### Building Messages
//!
//! ```
//! use mailwright_mime::{ContentType, Mailbox, MimeMessage, RecipientType};
//!
//! let mut message = MimeMessage::new();
//! message.set_from(Mailbox::new("sender@example.com")?);
//! message.add_recipients(RecipientType::To, [Mailbox::new("recipient@example.com")?]);
//! message.set_subject("Test Message");
//! message.set_body("Hello, World!", ContentType::text_plain());
//!
//! let bytes = message.to_bytes();
//! assert!(bytes.starts_with(b"Date: "));
//! # Ok::<(), mailwright_mime::Error>(())
//! ```
//!
//! ### Multipart Messages
//!
//! ```
//! use mailwright_mime::{ContentType, MimeMessage, Multipart, Part};
//!
//! let body = Multipart::alternative()
//!     .with_part(Part::text("Plain text version"))
//!     .with_part(Part::html("<h1>HTML version</h1>"));
//!
//! let mut message = MimeMessage::new();
//! let content_type = body.content_type();
//! message.set_multipart(body, content_type);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod address;
mod content_type;
mod error;
mod header;
mod message;
mod multipart;

pub mod encoding;

pub use address::{Address, Mailbox};
pub use content_type::ContentType;
pub use error::{Error, Result};
pub use header::{Headers, format_header, validate_name};
pub use message::{Body, MimeMessage, RecipientType, generate_message_id};
pub use multipart::{Multipart, Part, PartBody, TransferEncoding};
