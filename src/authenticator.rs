//! Pluggable SASL response computation for challenge-response mechanisms.

use std::fmt;
use std::sync::Arc;

use crate::error::Result;

/// The login mechanisms the client knows how to drive, in the order they are preferred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mechanism {
    /// `AUTHENTICATE CRAM-MD5` ([RFC 2195](https://tools.ietf.org/html/rfc2195)).
    CramMd5,
    /// `AUTHENTICATE DIGEST-MD5` ([RFC 2831](https://tools.ietf.org/html/rfc2831)).
    DigestMd5,
    /// `AUTHENTICATE PLAIN` ([RFC 4616](https://tools.ietf.org/html/rfc4616)).
    Plain,
    /// The `LOGIN` command, with the password sent as a literal.
    Login,
}

impl Mechanism {
    /// The SASL name of the mechanism as used on the wire.
    pub fn name(&self) -> &'static str {
        match self {
            Mechanism::CramMd5 => "CRAM-MD5",
            Mechanism::DigestMd5 => "DIGEST-MD5",
            Mechanism::Plain => "PLAIN",
            Mechanism::Login => "LOGIN",
        }
    }

    /// Whether the mechanism needs an [`Authenticator`] to answer server challenges.
    pub fn is_challenge_response(&self) -> bool {
        matches!(self, Mechanism::CramMd5 | Mechanism::DigestMd5)
    }
}

impl fmt::Display for Mechanism {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Everything an [`Authenticator`] gets to compute one response.
#[derive(Debug, Clone, Copy)]
pub struct Exchange<'a> {
    /// The mechanism being negotiated.
    pub mechanism: Mechanism,
    /// Authentication identity.
    pub username: &'a str,
    /// Secret.
    pub password: &'a str,
    /// The decoded server challenge.
    pub challenge: &'a [u8],
    /// Server host name, used by DIGEST-MD5 to build the `digest-uri`.
    pub host: &'a str,
    /// Service name, always `"imap"`.
    pub service: &'a str,
}

/// Computes the answer to one CRAM-MD5 or DIGEST-MD5 challenge.
///
/// The client decodes the server's base64 challenge into [`Exchange::challenge`], calls
/// [`process`](Authenticator::process), and base64-encodes the returned bytes before sending them
/// as a continuation line. An error aborts the `AUTHENTICATE` exchange.
pub trait Authenticator {
    /// Compute the raw (not yet base64-encoded) response to a challenge.
    fn process(&self, exchange: &Exchange<'_>) -> Result<Vec<u8>>;
}

impl<A: Authenticator + ?Sized> Authenticator for Box<A> {
    fn process(&self, exchange: &Exchange<'_>) -> Result<Vec<u8>> {
        (**self).process(exchange)
    }
}

impl<A: Authenticator + ?Sized> Authenticator for Arc<A> {
    fn process(&self, exchange: &Exchange<'_>) -> Result<Vec<u8>> {
        (**self).process(exchange)
    }
}
