//! This crate lets you run an IMAP session against a mail server, as defined by [RFC
//! 3501](https://tools.ietf.org/html/rfc3501).
//!
//! It covers the part of a mail client that sits directly on the socket: picking and
//! establishing the transport (plaintext, TLS, or `STARTTLS`), sending tagged commands and
//! folding the server's answers into a single [`Response`], negotiating a login mechanism, and
//! discovering the server's capabilities and namespaces. Anything above that, such as fetching
//! and rendering messages, is left to the caller, which drives the server through
//! [`Client::execute`].
//!
//! Connections are made with [`ClientBuilder`]:
//!
//! ```no_run
//! # use imap_session::ClientBuilder;
//! # fn main() -> Result<(), imap_session::Error> {
//! let mut client = ClientBuilder::new("imap.example.com", 143)
//!     .protocol("imap/tls")
//!     .connect()?;
//!
//! client.login("alice", "secret")?;
//!
//! for ns in client.namespaces(["#shared"])? {
//!     println!("{} namespace {:?} ({:?})", ns.kind(), ns.name(), ns.delimiter());
//! }
//!
//! let response = client.execute("SELECT INBOX")?;
//! for line in response.lines() {
//!     println!("{}", line);
//! }
//!
//! client.logout()?;
//! # Ok(())
//! # }
//! ```
//!
//! Wire traffic is logged with [`tracing`] at `TRACE` level, with secrets redacted.
//!
//! ## Opting out of `native_tls`
//!
//! For situations where using openssl becomes problematic, you can disable the
//! default feature which provides integration with the `native_tls` crate. One major
//! reason you might want to do this is cross-compiling. To opt out of native_tls, add
//! this to your Cargo.toml file:
//!
//! ```toml
//! [dependencies.imap-session]
//! version = "<some version>"
//! default-features = false
//! ```
//!
//! Enable the `rustls-tls` feature to use `rustls` instead. Without either, only plaintext
//! connections can be made.

mod parse;
mod types;
mod utils;

pub mod authenticator;
pub mod client;
mod client_builder;
mod conn;
pub mod error;
mod registry;
pub mod sasl;

pub use crate::authenticator::{Authenticator, Exchange, Mechanism};
pub use crate::client::Client;
pub use crate::client_builder::{ClientBuilder, ConnectionMode, TlsKind, CONNECT_TIMEOUT};
pub use crate::conn::{Connection, ImapConnection};
pub use crate::error::{Error, Result};
pub use crate::registry::{Registry, ServerKey};
pub use types::*;

#[cfg(test)]
mod mock_stream;
