//! IMAP error types.

use std::error::Error as StdError;
use std::fmt;
use std::io::Error as IoError;
use std::result;

use bufstream::IntoInnerError as BufError;

use crate::authenticator::Mechanism;
use crate::types::{Response, Status};

/// A convenience wrapper around `Result` for `imap_session::Error`.
pub type Result<T> = result::Result<T, Error>;

/// A set of errors that can occur in the IMAP client
#[derive(Debug)]
#[non_exhaustive]
pub enum Error {
    /// An `io::Error` that occurred while trying to read or write to a network stream.
    Io(IoError),
    /// The TCP connection to the server could not be opened.
    Connect {
        /// The `host:port` we tried to reach.
        addr: String,
        /// The operating system's reason.
        source: IoError,
    },
    /// The requested transport is not available in this build (for example SSL without a TLS
    /// backend compiled in).
    Configuration(String),
    /// An error from the `native_tls` library while managing the socket.
    #[cfg(feature = "native-tls")]
    Tls(native_tls::Error),
    /// The TLS handshake failed.
    TlsHandshake(String),
    /// `STARTTLS` was accepted but the connection could not be upgraded.
    Secure(Box<Error>),
    /// A `NO` response from the IMAP server.
    No(Response),
    /// A `BAD` response from the IMAP server.
    Bad(Response),
    /// The server said `BYE`; the connection is no longer usable.
    Bye(Response),
    /// The connection was terminated unexpectedly, or has already been closed.
    ConnectionLost,
    /// Error parsing a server response.
    Parse(ParseError),
    /// Error validating input data
    Validate(ValidateError),
    /// Authentication could not be completed.
    Auth(AuthError),
}

impl Error {
    /// The server status carried by this error, if it originated from a server response.
    pub fn status(&self) -> Option<&Status> {
        match self {
            Error::No(r) | Error::Bad(r) | Error::Bye(r) => Some(r.status()),
            Error::Parse(ParseError::UnknownResponse(r)) => Some(r.status()),
            _ => None,
        }
    }

    /// The server response carried by this error, if any.
    pub fn response(&self) -> Option<&Response> {
        match self {
            Error::No(r) | Error::Bad(r) | Error::Bye(r) => Some(r),
            Error::Parse(ParseError::UnknownResponse(r)) => Some(r),
            _ => None,
        }
    }
}

impl From<IoError> for Error {
    fn from(err: IoError) -> Error {
        Error::Io(err)
    }
}

impl<T> From<BufError<T>> for Error {
    fn from(err: BufError<T>) -> Error {
        Error::Io(err.into())
    }
}

#[cfg(feature = "native-tls")]
impl From<native_tls::Error> for Error {
    fn from(err: native_tls::Error) -> Error {
        Error::Tls(err)
    }
}

impl From<AuthError> for Error {
    fn from(err: AuthError) -> Error {
        Error::Auth(err)
    }
}

impl From<ParseError> for Error {
    fn from(err: ParseError) -> Error {
        Error::Parse(err)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Error::Io(ref e) => fmt::Display::fmt(e, f),
            Error::Connect {
                ref addr,
                ref source,
            } => write!(f, "Error connecting to IMAP server {}: {}", addr, source),
            Error::Configuration(ref msg) => f.write_str(msg),
            #[cfg(feature = "native-tls")]
            Error::Tls(ref e) => fmt::Display::fmt(e, f),
            Error::TlsHandshake(ref e) => write!(f, "TLS handshake failed: {}", e),
            Error::Secure(ref e) => write!(
                f,
                "Could not open secure connection to the IMAP server: {}",
                e
            ),
            Error::No(ref r) => write!(
                f,
                "Could not complete request. Reason Given: {}",
                r.message()
            ),
            Error::Bad(ref r) => write!(
                f,
                "Bad or malformed request. Server Responded: {}",
                r.message()
            ),
            Error::Bye(ref r) => write!(
                f,
                "IMAP Server closed the connection. Server Responded: {}",
                r.message()
            ),
            Error::ConnectionLost => f.write_str("Connection lost"),
            Error::Parse(ref e) => fmt::Display::fmt(e, f),
            Error::Validate(ref e) => fmt::Display::fmt(e, f),
            Error::Auth(ref e) => fmt::Display::fmt(e, f),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match *self {
            Error::Io(ref e) => Some(e),
            Error::Connect { ref source, .. } => Some(source),
            #[cfg(feature = "native-tls")]
            Error::Tls(ref e) => Some(e),
            Error::Secure(ref e) => Some(&**e),
            Error::Parse(ref e) => Some(e),
            Error::Validate(ref e) => Some(e),
            Error::Auth(ref e) => Some(e),
            _ => None,
        }
    }
}

/// An error parsing a server response.
#[derive(Debug)]
#[non_exhaustive]
pub enum ParseError {
    /// The response unit ended on a status we do not know, or on a tagged line whose tag is not
    /// the one we are waiting for.
    UnknownResponse(Response),
    /// The server greeting could not be understood.
    Greeting(String),
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            ParseError::UnknownResponse(ref r) => write!(
                f,
                "Unknown IMAP response from the server. Server Responded: {}",
                r.message()
            ),
            ParseError::Greeting(ref line) => write!(f, "Unable to parse greeting: {}", line),
        }
    }
}

impl StdError for ParseError {}

/// Why a login attempt failed.
#[derive(Debug)]
#[non_exhaustive]
pub enum AuthError {
    /// Neither the server nor the client offer a mechanism we can use.
    NoMechanism,
    /// The server rejected the credentials (`NO`).
    Credentials(String),
    /// The server rejected the request (`BAD` or anything else).
    BadRequest(String),
    /// The server answered an authentication step with something we did not expect.
    UnexpectedResponse(&'static str),
    /// A challenge-response mechanism was selected but no authenticator is configured.
    NoAuthenticator(Mechanism),
    /// The authenticator could not compute a response.
    Sasl(String),
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            AuthError::NoMechanism => {
                f.write_str("No supported IMAP authentication method could be found.")
            }
            AuthError::Credentials(ref msg) => {
                write!(f, "Bad login name or password. ({})", msg)
            }
            AuthError::BadRequest(ref msg) => write!(f, "Bad request: {}", msg),
            AuthError::UnexpectedResponse(step) => {
                write!(f, "Unexpected response from server to {}.", step)
            }
            AuthError::NoAuthenticator(mech) => {
                write!(f, "{} requires a SASL authenticator to be configured.", mech)
            }
            AuthError::Sasl(ref msg) => write!(f, "SASL exchange failed: {}", msg),
        }
    }
}

impl StdError for AuthError {}

/// An invalid character was found in an input string.
#[derive(Debug)]
pub struct ValidateError(pub char);

impl fmt::Display for ValidateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // print character in debug form because invalid ones are often whitespaces
        write!(f, "Invalid character in input: {:?}", self.0)
    }
}

impl StdError for ValidateError {}
