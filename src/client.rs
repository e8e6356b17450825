use std::fmt;
use std::io::{BufRead, Read, Write};

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use bufstream::BufStream;
use tracing::{debug, error, trace, warn};

use super::authenticator::{Authenticator, Exchange, Mechanism};
use super::error::{AuthError, Error, ParseError, Result, ValidateError};
use super::parse::{fold, parse_capabilities, parse_line, parse_list, parse_list_delimiter,
                   parse_namespaces};
use super::sasl::Md5Authenticator;
use super::types::*;
use super::utils::escape_html;

static TAG_PREFIX: &str = "A";
const INITIAL_TAG: u32 = 0;
const CR: u8 = 0x0d;
const LF: u8 = 0x0a;

/// Some servers answer `NO` to commands that did succeed, with this text in the message.
const NO_NOT_FATAL: &str = "command resulted in";
const SASL_SERVICE: &str = "imap";

macro_rules! quote {
    ($x:expr) => {
        format!("\"{}\"", $x.replace(r"\", r"\\").replace("\"", "\\\""))
    };
}

fn validate_str(value: &str) -> Result<String> {
    let quoted = quote!(value);
    if quoted.contains('\n') {
        return Err(Error::Validate(ValidateError('\n')));
    }
    if quoted.contains('\r') {
        return Err(Error::Validate(ValidateError('\r')));
    }
    Ok(quoted)
}

/// An IMAP session over a single stream.
///
/// The client is strictly half-duplex: one command is in flight at a time. A command is tagged
/// `A001`, `A002`, ... unless the server has answered the previous one with a continuation
/// request, in which case the next [`execute`](Client::execute) sends its text untagged as the
/// continuation data.
///
/// Dropping a `Client` that is still connected sends `LOGOUT` and closes the stream; failures
/// while doing so are ignored.
pub struct Client<T: Read + Write> {
    stream: Option<BufStream<T>>,
    tag: u32,
    current_tag: Option<String>,
    bye: Option<Response>,
    secure: bool,
    host: String,
    authenticator: Option<Box<dyn Authenticator + Send>>,
    capabilities: Option<Capabilities>,
    namespaces: Option<Namespaces>,
}

impl<T: Read + Write> fmt::Debug for Client<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("host", &self.host)
            .field("tag", &self.tag)
            .field("current_tag", &self.current_tag)
            .field("secure", &self.secure)
            .field("closed", &self.stream.is_none())
            .finish()
    }
}

impl<T: Read + Write> Client<T> {
    /// Creates a new client with the underlying stream.
    ///
    /// The stream is assumed to be unencrypted and the server greeting not yet read; use
    /// [`ClientBuilder`](crate::ClientBuilder) to get both handled.
    pub fn new(stream: T) -> Client<T> {
        Client {
            stream: Some(BufStream::new(stream)),
            tag: INITIAL_TAG,
            current_tag: None,
            bye: None,
            secure: false,
            host: String::new(),
            authenticator: Some(Box::new(Md5Authenticator)),
            capabilities: None,
            namespaces: None,
        }
    }

    /// Record the server host name. DIGEST-MD5 needs it.
    pub fn set_host<S: Into<String>>(&mut self, host: S) {
        self.host = host.into();
    }

    /// Mark the stream as encrypted. Encrypted sessions skip the CRAM-MD5 and DIGEST-MD5
    /// mechanisms.
    pub fn set_secure(&mut self, secure: bool) {
        self.secure = secure;
    }

    /// Replace the authenticator used for CRAM-MD5 and DIGEST-MD5.
    pub fn set_authenticator<A: Authenticator + Send + 'static>(&mut self, authenticator: A) {
        self.authenticator = Some(Box::new(authenticator));
    }

    /// Remove the authenticator. CRAM-MD5 and DIGEST-MD5 attempts will then fail and be skipped.
    pub fn clear_authenticator(&mut self) {
        self.authenticator = None;
    }

    /// Whether the stream is encrypted.
    pub fn is_secure(&self) -> bool {
        self.secure
    }

    /// Whether the connection has been closed, by `LOGOUT`, by the server saying `BYE`, or by the
    /// stream reaching end-of-file.
    pub fn is_closed(&self) -> bool {
        self.stream.is_none()
    }

    /// The server host name given to [`set_host`](Client::set_host).
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Runs any command passed to it and returns the folded response.
    ///
    /// `NO` responses whose text contains `command resulted in` are logged and treated as
    /// success. Every other `NO`, `BAD` or `BYE`, and any status we do not recognize, is returned
    /// as an error carrying the server's response; the command slot is free again afterwards. A
    /// `BYE` also closes the connection.
    pub fn execute(&mut self, command: &str) -> Result<Response> {
        self.run(command, false)
    }

    /// Like [`execute`](Client::execute), but keeps the line out of the logs.
    fn execute_secret(&mut self, command: &str) -> Result<Response> {
        self.run(command, true)
    }

    fn run(&mut self, command: &str, secret: bool) -> Result<Response> {
        if self.stream.is_none() {
            return Err(Error::ConnectionLost);
        }

        let line = match self.current_tag {
            Some(_) => command.to_string(),
            None => {
                let tag = self.next_tag();
                let line = format!("{} {}", tag, command);
                self.current_tag = Some(tag);
                line
            }
        };

        let outcome = self
            .write_line(line.as_bytes(), secret)
            .and_then(|_| self.read_response())
            .and_then(check);

        match outcome {
            Ok(ref r) if r.is_continuation() => {}
            _ => self.current_tag = None,
        }
        if self.bye.is_some() || matches!(outcome, Err(Error::Bye(_) | Error::ConnectionLost)) {
            self.close();
        }
        outcome
    }

    /// Read one logical response unit: any number of untagged lines followed by the line that
    /// concludes them.
    fn read_response(&mut self) -> Result<Response> {
        let mut preamble = Vec::new();
        loop {
            let line = match self.readline() {
                Err(Error::ConnectionLost) => {
                    return Err(match self.bye.take() {
                        Some(bye) => Error::Bye(bye),
                        None => Error::ConnectionLost,
                    })
                }
                other => other?,
            };

            let response = parse_line(&line, self.current_tag.as_deref());
            if response.kind() != ResponseKind::Untagged {
                return Ok(fold(preamble, response));
            }
            if *response.status() == Status::Bye {
                self.bye = Some(response.clone());
            }
            preamble.push(response);
        }
    }

    /// Read and discard the server greeting. A `BYE` greeting closes the connection.
    pub(crate) fn read_greeting(&mut self) -> Result<()> {
        let line = self.readline()?;
        let greeting = parse_line(&line, None);
        match greeting.kind() {
            ResponseKind::Untagged if *greeting.status() == Status::Bye => {
                self.close();
                Err(Error::Bye(greeting))
            }
            ResponseKind::Untagged => Ok(()),
            _ => Err(Error::Parse(ParseError::Greeting(line.trim_end().to_string()))),
        }
    }

    fn readline(&mut self) -> Result<String> {
        let stream = self.stream.as_mut().ok_or(Error::ConnectionLost)?;
        let mut into = Vec::new();
        let read = stream.read_until(LF, &mut into)?;
        if read == 0 {
            return Err(Error::ConnectionLost);
        }

        let line = String::from_utf8_lossy(&into).into_owned();
        trace!("S: {}", line.trim_end());
        Ok(line)
    }

    fn next_tag(&mut self) -> String {
        self.tag += 1;
        format!("{}{:03}", TAG_PREFIX, self.tag)
    }

    fn write_line(&mut self, buf: &[u8], secret: bool) -> Result<()> {
        let stream = self.stream.as_mut().ok_or(Error::ConnectionLost)?;
        stream.write_all(buf)?;
        stream.write_all(&[CR, LF])?;
        stream.flush()?;
        if secret {
            trace!("C: <redacted>");
        } else {
            trace!("C: {}", String::from_utf8_lossy(buf));
        }
        Ok(())
    }

    fn close(&mut self) {
        if self.stream.take().is_some() {
            debug!(host = %self.host, "connection closed");
        }
        self.current_tag = None;
    }

    /// Give up the client and return the raw stream.
    pub(crate) fn into_inner(mut self) -> Result<T> {
        let stream = self.stream.take().ok_or(Error::ConnectionLost)?;
        Ok(stream.into_inner()?)
    }

    /// Issue `STARTTLS` and hand the raw stream to `handshake` to be wrapped in TLS.
    ///
    /// The returned client continues the tag sequence and is marked secure. Its capability cache
    /// starts empty because servers may advertise different capabilities once TLS is active. If
    /// the server refuses `STARTTLS` its error is returned as is; a failed handshake is reported
    /// as [`Error::Secure`].
    pub fn starttls<F, U>(mut self, handshake: F) -> Result<Client<U>>
    where
        F: FnOnce(T) -> Result<U>,
        U: Read + Write,
    {
        self.execute("STARTTLS")?;

        let tag = self.tag;
        let host = std::mem::take(&mut self.host);
        let authenticator = self.authenticator.take();
        let raw = self.into_inner()?;
        let tls = handshake(raw).map_err(|e| Error::Secure(Box::new(e)))?;

        let mut client = Client::new(tls);
        client.tag = tag;
        client.host = host;
        client.authenticator = authenticator;
        client.secure = true;
        Ok(client)
    }

    /// Logout informs the server that the client is done with the connection, then closes it.
    ///
    /// Calling it on a closed client does nothing.
    pub fn logout(&mut self) -> Result<()> {
        if self.stream.is_none() {
            return Ok(());
        }
        // a command is waiting for continuation data; LOGOUT would be taken as that data
        let result = if self.current_tag.is_some() {
            Ok(())
        } else {
            match self.execute("LOGOUT") {
                Ok(_) | Err(Error::Bye(_)) | Err(Error::ConnectionLost) => Ok(()),
                Err(e) => Err(e),
            }
        };
        self.close();
        result
    }

    /// The server's capabilities, fetched with `CAPABILITY` on first use and cached for the
    /// lifetime of the connection.
    ///
    /// A failing `CAPABILITY` command is logged and leaves an empty set behind; it is not retried.
    pub fn capabilities(&mut self) -> &Capabilities {
        if self.capabilities.is_none() {
            let caps = match self.execute("CAPABILITY") {
                Ok(r) => parse_capabilities(r.message()),
                Err(e) => {
                    warn!(error = %e, "could not fetch server capabilities");
                    Capabilities::default()
                }
            };
            self.capabilities = Some(caps);
        }
        self.capabilities.get_or_insert_with(Capabilities::default)
    }

    /// Look up a single capability. `None` if the server does not advertise it.
    pub fn query_capability(&mut self, name: &str) -> Option<&Capability> {
        self.capabilities().get(name)
    }

    /// Whether the server advertises `name`.
    pub fn has_capability(&mut self, name: &str) -> bool {
        self.capabilities().has(name)
    }

    /// The login mechanisms [`login`](Client::login) will try, in order.
    ///
    /// CRAM-MD5 and DIGEST-MD5 keep the password off an unencrypted wire, so they are only
    /// considered when the stream is not already encrypted. `LOGIN` comes last and is left out
    /// when the server advertises `LOGINDISABLED`.
    pub fn auth_mechanisms(&mut self) -> Vec<Mechanism> {
        let secure = self.secure;
        let caps = self.capabilities();

        let mut mechanisms = Vec::new();
        if !secure {
            if caps.has_value("AUTH", "CRAM-MD5") {
                mechanisms.push(Mechanism::CramMd5);
            }
            if caps.has_value("AUTH", "DIGEST-MD5") {
                mechanisms.push(Mechanism::DigestMd5);
            }
        }
        if caps.has_value("AUTH", "PLAIN") {
            mechanisms.push(Mechanism::Plain);
        }
        if !caps.has("LOGINDISABLED") {
            mechanisms.push(Mechanism::Login);
        }
        mechanisms
    }

    /// Log in to the IMAP server, trying each of [`auth_mechanisms`](Client::auth_mechanisms)
    /// until one succeeds.
    ///
    /// Failed attempts are logged. If they all fail, the error of the last one is returned.
    pub fn login(&mut self, username: &str, password: &str) -> Result<()> {
        let mechanisms = self.auth_mechanisms();
        debug!(?mechanisms, "negotiating authentication");

        let mut last = Error::Auth(AuthError::NoMechanism);
        for mechanism in mechanisms {
            match self.authenticate(mechanism, username, password) {
                Ok(()) => {
                    debug!(%mechanism, "authenticated");
                    return Ok(());
                }
                Err(e) => {
                    warn!(%mechanism, error = %e, "authentication attempt failed");
                    last = e;
                }
            }
            if self.is_closed() {
                break;
            }
        }
        Err(last)
    }

    /// Authenticate with one specific mechanism.
    pub fn authenticate(
        &mut self,
        mechanism: Mechanism,
        username: &str,
        password: &str,
    ) -> Result<()> {
        let outcome = match mechanism {
            m if m.is_challenge_response() => self.authenticate_challenge(m, username, password),
            Mechanism::Plain => self.authenticate_plain(username, password),
            _ => self.authenticate_login(username, password),
        };

        let response = match outcome {
            Ok(r) => r,
            Err(Error::No(r)) => return Err(AuthError::Credentials(describe(&r)).into()),
            Err(Error::Bad(r)) => return Err(AuthError::BadRequest(describe(&r)).into()),
            Err(e) => return Err(e),
        };
        match *response.status() {
            Status::Ok => Ok(()),
            Status::No => Err(AuthError::Credentials(describe(&response)).into()),
            _ => Err(AuthError::BadRequest(describe(&response)).into()),
        }
    }

    fn authenticate_challenge(
        &mut self,
        mechanism: Mechanism,
        username: &str,
        password: &str,
    ) -> Result<Response> {
        if self.authenticator.is_none() {
            return Err(AuthError::NoAuthenticator(mechanism).into());
        }

        let challenge = self.execute(&format!("AUTHENTICATE {}", mechanism))?;
        if !challenge.is_continuation() {
            return Err(AuthError::UnexpectedResponse("AUTHENTICATE command").into());
        }
        let answer = match self.answer(mechanism, &challenge, username, password) {
            Ok(answer) => answer,
            Err(e) => {
                self.abort_authentication();
                return Err(e);
            }
        };
        let reply = self.execute_secret(&BASE64.encode(answer))?;
        if mechanism == Mechanism::CramMd5 {
            return Ok(reply);
        }

        let rspauth = BASE64.decode(reply.message().trim()).unwrap_or_default();
        if !String::from_utf8_lossy(&rspauth).contains("rspauth=") {
            self.abort_authentication();
            return Err(AuthError::UnexpectedResponse("Digest-MD5 response").into());
        }
        self.execute("")
    }

    fn answer(
        &self,
        mechanism: Mechanism,
        challenge: &Response,
        username: &str,
        password: &str,
    ) -> Result<Vec<u8>> {
        let data = BASE64
            .decode(challenge.message().trim())
            .map_err(|e| AuthError::Sasl(format!("invalid challenge: {}", e)))?;
        let authenticator = self
            .authenticator
            .as_ref()
            .ok_or(AuthError::NoAuthenticator(mechanism))?;
        authenticator.process(&Exchange {
            mechanism,
            username,
            password,
            challenge: &data,
            host: &self.host,
            service: SASL_SERVICE,
        })
    }

    /// Cancel an `AUTHENTICATE` exchange the server is still waiting on
    /// ([RFC 3501 section 6.2.2](https://tools.ietf.org/html/rfc3501#section-6.2.2)).
    fn abort_authentication(&mut self) {
        if self.current_tag.is_some() {
            // the server answers BAD; that is the expected outcome
            let _ = self.execute("*");
        }
    }

    fn authenticate_login(&mut self, username: &str, password: &str) -> Result<Response> {
        // the password goes out as a literal so it needs no quoting
        let read = self.execute(&format!(
            "LOGIN {} {{{}}}",
            validate_str(username)?,
            password.len()
        ))?;
        if read.is_continuation() {
            self.execute_secret(password)
        } else {
            Ok(read)
        }
    }

    fn authenticate_plain(&mut self, username: &str, password: &str) -> Result<Response> {
        let auth = BASE64.encode(format!("{}\0{}\0{}", username, username, password));
        if self.has_capability("SASL-IR") {
            // https://tools.ietf.org/html/rfc4959
            return self.execute_secret(&format!("AUTHENTICATE PLAIN {}", auth));
        }
        match self.execute("AUTHENTICATE PLAIN") {
            Ok(read) if read.is_continuation() => self.execute_secret(&auth),
            _ => Err(AuthError::UnexpectedResponse("AUTHENTICATE command").into()),
        }
    }

    /// The namespace table ([RFC 2342](https://tools.ietf.org/html/rfc2342)), discovered on first
    /// use and cached for the lifetime of the connection.
    ///
    /// Namespaces the server advertises with `NAMESPACE` come first. Each prefix in `additional`
    /// that is not already known is probed with `LIST "" "<prefix>"` and, if the server lists it,
    /// added as a hidden shared namespace. Blank prefixes, and prefixes containing CR or LF, are
    /// skipped. If that leaves the table
    /// empty, a single personal namespace is inferred from the delimiter in the answer to
    /// `LIST "" ""`.
    ///
    /// Failing commands are logged and returned; nothing is cached in that case.
    pub fn namespaces<I, S>(&mut self, additional: I) -> Result<&Namespaces>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        if self.namespaces.is_none() {
            let table = self.discover_namespaces(additional).map_err(|e| {
                error!(error = %e, "namespace discovery failed");
                e
            })?;
            self.namespaces = Some(table);
        }
        Ok(&*self.namespaces.get_or_insert_with(Namespaces::default))
    }

    fn discover_namespaces<I, S>(&mut self, additional: I) -> Result<Namespaces>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut table = Namespaces::default();

        if self.has_capability("NAMESPACE") {
            let read = self.execute("NAMESPACE")?;
            if read.kind() == ResponseKind::Untagged {
                for ns in parse_namespaces(read.message()) {
                    table.insert(ns);
                }
            }
        }

        for prefix in additional {
            let prefix = prefix.as_ref().trim();
            if prefix.is_empty() || table.contains(prefix) {
                continue;
            }
            let quoted = match validate_str(prefix) {
                Ok(quoted) => quoted,
                Err(e) => {
                    warn!(prefix, error = %e, "skipping namespace prefix");
                    continue;
                }
            };
            let read = self.execute(&format!("LIST \"\" {}", quoted))?;
            if read.kind() != ResponseKind::Untagged {
                continue;
            }
            if let Some((delimiter, name)) = parse_list(read.message()) {
                if name == prefix {
                    table.insert(Namespace {
                        name,
                        delimiter,
                        kind: NamespaceKind::Shared,
                        hidden: true,
                    });
                }
            }
        }

        if table.is_empty() {
            let read = self.execute("LIST \"\" \"\"")?;
            table.insert(Namespace {
                name: String::new(),
                delimiter: parse_list_delimiter(read.message()),
                kind: NamespaceKind::Personal,
                hidden: false,
            });
        }
        Ok(table)
    }

    /// Whether the server's `SEARCH` accepts `charset`.
    ///
    /// Selects `INBOX` and runs a throwaway `SEARCH CHARSET <charset> TEXT "charsettest" 1`.
    /// A charset that is empty or contains whitespace or `"` cannot be sent as an atom; it gets
    /// `false` without anything being sent to the server.
    pub fn search_charset(&mut self, charset: &str) -> bool {
        if charset.is_empty() || charset.contains(|c: char| c.is_whitespace() || c == '"') {
            return false;
        }
        self.execute("SELECT INBOX")
            .and_then(|_| {
                self.execute(&format!(
                    "SEARCH CHARSET {} TEXT \"charsettest\" 1",
                    charset
                ))
            })
            .is_ok()
    }
}

impl<T: Read + Write> Drop for Client<T> {
    fn drop(&mut self) {
        // we don't want to panic here if we can't log out
        let _ = self.logout();
    }
}

/// Classify a response unit by its status.
fn check(response: Response) -> Result<Response> {
    match *response.status() {
        Status::Ok => Ok(response),
        Status::No if response.message().contains(NO_NOT_FATAL) => {
            warn!(text = response.message(), "ignoring non-fatal NO response");
            Ok(response)
        }
        Status::No => Err(Error::No(response)),
        Status::Bad => Err(Error::Bad(response)),
        Status::Bye => Err(Error::Bye(response)),
        _ => Err(Error::Parse(ParseError::UnknownResponse(response))),
    }
}

fn describe(response: &Response) -> String {
    if response.message().is_empty() {
        "No message returned.".to_string()
    } else {
        escape_html(response.message())
    }
}
