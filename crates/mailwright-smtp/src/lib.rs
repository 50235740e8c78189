//! # mailwright-smtp
//!
//! SMTP delivery for messages built with `mailwright-mime`.
//!
//! ## Features
//!
//! - **Session configuration**: Host, port, TLS mode, timeouts, credentials
//! - **Type-state connection management**: Compile-time enforcement of valid
//!   SMTP state transitions
//! - **TLS support**: Both implicit TLS (port 465) and STARTTLS (port 587)
//! - **Authentication**: PLAIN, LOGIN, XOAUTH2
//! - **POP-before-SMTP**: POP3 login before the SMTP connection is opened
//!
//! ## Quick Start
//!
//! ```ignore
//! use mailwright_smtp::{Authenticator, Security, Session, SmtpTransport, Transport};
//!
//! let session = Session::builder("smtp.example.com")
//!     .security(Security::StartTls)
//!     .authenticator(Some(Authenticator::plain("user@example.com", "password")))
//!     .build();
//!
//! SmtpTransport::new().send(&session, &message).await?;
//! ```
//!
//! ## Connection States
//!
//! ```text
//! ┌──────────────┐
//! │  Connected   │ ─── authenticate() ───→ Authenticated
//! └──────────────┘
//!        │
//!        └─── mail_from() ───→ MailTransaction ───→ RecipientAdded ───→ Data
//! ```
//!
//! ## Modules
//!
//! - [`command`]: SMTP command builders
//! - [`connection`]: Streams, TLS and the type-state client
//! - [`parser`]: Reply parser
//! - [`pop3`]: POP-before-SMTP login
//! - [`types`]: Replies, extensions and SASL mechanisms

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod command;
pub mod connection;
mod error;
pub mod parser;
pub mod pop3;
mod session;
mod transport;
pub mod types;

pub use connection::{
    Authenticated, Client, Connected, Data, MailStream, MailTransaction, RecipientAdded,
    ServerInfo,
};
pub use error::{Error, Result};
pub use mailwright_mime::{Address, Mailbox};
pub use session::{
    Authenticator, DEFAULT_EHLO_NAME, DEFAULT_TIMEOUT, PopBeforeSmtp, PopProtocol, Security,
    Session, SessionBuilder,
};
pub use transport::{Envelope, SmtpTransport, Transport, deliver};
pub use types::{AuthMechanism, Extension, Reply, ReplyCode};
