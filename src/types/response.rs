use std::fmt;

/// Which kind of server line concluded a logical response unit.
///
/// From [section 2.2.2 of RFC 3501](https://tools.ietf.org/html/rfc3501#section-2.2.2):
///
/// Data transmitted by the server to the client and status responses that do not indicate command
/// completion are prefixed with the token `"*"`, and are called untagged responses.
///
/// The client command continuation request response indicates that the server is ready to accept
/// the continuation of a command from the client.  It is prefixed with the token `"+"`.
///
/// A tagged response indicates the completion (success or failure) of the client command whose
/// tag it echoes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResponseKind {
    /// A tagged completion result.
    Tagged,
    /// Untagged server data, folded together with the status that ended it.
    Untagged,
    /// A `+` continuation request; the command that provoked it is still in flight.
    Continuation,
}

/// The status token of a response.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Status {
    /// `OK`. Also used for untagged data lines and continuation requests.
    Ok,
    /// `NO`: the command was understood but failed.
    No,
    /// `BAD`: the command was not understood.
    Bad,
    /// `PREAUTH`: the connection is already authenticated.
    PreAuth,
    /// `BYE`: the server is about to close the connection.
    Bye,
    /// Anything else. An empty token means the line carried a tag we were not waiting for.
    Unknown(String),
}

impl Status {
    /// Recognize a status keyword. Returns `None` for anything that is not one of the five
    /// RFC 3501 status responses.
    pub(crate) fn keyword(token: &str) -> Option<Status> {
        let status = match token.to_ascii_uppercase().as_str() {
            "OK" => Status::Ok,
            "NO" => Status::No,
            "BAD" => Status::Bad,
            "PREAUTH" => Status::PreAuth,
            "BYE" => Status::Bye,
            _ => return None,
        };
        Some(status)
    }

    pub(crate) fn from_token(token: &str) -> Status {
        Status::keyword(token).unwrap_or_else(|| Status::Unknown(token.to_string()))
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Status::Ok => f.write_str("OK"),
            Status::No => f.write_str("NO"),
            Status::Bad => f.write_str("BAD"),
            Status::PreAuth => f.write_str("PREAUTH"),
            Status::Bye => f.write_str("BYE"),
            Status::Unknown(ref s) => f.write_str(s),
        }
    }
}

/// One logical response unit as returned by [`Client::execute`](crate::client::Client::execute).
///
/// Untagged data lines the server sends ahead of the concluding line are folded into `message`,
/// one per line, so a `CAPABILITY` or `LIST` result is available as text without a separate
/// parser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub(crate) kind: ResponseKind,
    pub(crate) status: Status,
    pub(crate) tag: Option<String>,
    pub(crate) message: String,
}

impl Response {
    pub(crate) fn new<S: Into<String>>(kind: ResponseKind, status: Status, message: S) -> Self {
        Response {
            kind,
            status,
            tag: None,
            message: message.into(),
        }
    }

    pub(crate) fn with_tag<S: Into<String>>(mut self, tag: S) -> Self {
        self.tag = Some(tag.into());
        self
    }

    /// The kind of line this unit was built from.
    pub fn kind(&self) -> ResponseKind {
        self.kind
    }

    /// The status that concluded the unit.
    pub fn status(&self) -> &Status {
        &self.status
    }

    /// The tag of the concluding tagged line, if there was one.
    pub fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }

    /// Free text of the response. Folded untagged data is separated by `\n`.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Iterate over the folded lines of the message.
    pub fn lines(&self) -> std::str::Lines<'_> {
        self.message.lines()
    }

    /// True if the server is waiting for more input for the same command.
    pub fn is_continuation(&self) -> bool {
        self.kind == ResponseKind::Continuation
    }
}
