use std::io::{self, ErrorKind};
use std::net::{TcpStream, ToSocketAddrs};
use std::sync::Arc;
use std::time::Duration;

#[cfg(feature = "native-tls")]
use native_tls::TlsConnector;
#[cfg(feature = "rustls-tls")]
use rustls_connector::RustlsConnector;
use tracing::debug;

use crate::authenticator::Authenticator;
use crate::client::Client;
use crate::conn::Connection;
use crate::error::{Error, Result};
use crate::sasl::Md5Authenticator;

/// How long to wait for the TCP connection to be established.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// How the connection to the server is secured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionMode {
    /// No encryption.
    Plaintext,
    /// TLS from the first byte, usually on port 993.
    Tls,
    /// Connect in plaintext, then upgrade with `STARTTLS`.
    StartTls,
}

impl ConnectionMode {
    /// Resolve a slash-delimited protocol specifier such as `"imap/ssl"` or `"imap/tls"`.
    ///
    /// A `tls` token asks for `STARTTLS`; `ssl` (without `tls`) asks for TLS from the start.
    /// Anything else is plaintext.
    pub fn from_protocol(protocol: &str) -> ConnectionMode {
        let protocol = protocol.to_ascii_lowercase();
        let tokens: Vec<&str> = protocol.split('/').map(str::trim).collect();
        if tokens.contains(&"tls") {
            ConnectionMode::StartTls
        } else if tokens.contains(&"ssl") {
            ConnectionMode::Tls
        } else {
            ConnectionMode::Plaintext
        }
    }

    /// Whether this mode needs a TLS backend.
    pub fn is_encrypted(&self) -> bool {
        !matches!(self, ConnectionMode::Plaintext)
    }
}

/// The TLS library used by [`ClientBuilder::connect`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TlsKind {
    /// `native-tls`, available with the `native-tls` feature.
    Native,
    /// `rustls`, available with the `rustls-tls` feature.
    Rust,
}

impl TlsKind {
    /// Whether support for this backend was compiled in.
    pub fn is_available(&self) -> bool {
        match self {
            TlsKind::Native => cfg!(feature = "native-tls"),
            TlsKind::Rust => cfg!(feature = "rustls-tls"),
        }
    }
}

impl Default for TlsKind {
    fn default() -> Self {
        if cfg!(feature = "native-tls") || !cfg!(feature = "rustls-tls") {
            TlsKind::Native
        } else {
            TlsKind::Rust
        }
    }
}

/// A convenience builder for [`Client`] structs over the supported transports.
///
/// The transport is picked from a protocol specifier, the way mail applications usually store
/// it:
/// ```no_run
/// # use imap_session::ClientBuilder;
/// # fn main() -> Result<(), imap_session::Error> {
/// let client = ClientBuilder::new("imap.example.com", 143)
///     .protocol("imap/tls")
///     .connect()?;
/// # Ok(())
/// # }
/// ```
///
/// Every `connect` opens a new connection, reads the server greeting and, for
/// [`ConnectionMode::StartTls`], upgrades it before returning.
pub struct ClientBuilder<D>
where
    D: AsRef<str>,
{
    domain: D,
    port: u16,
    mode: ConnectionMode,
    tls_kind: TlsKind,
    authenticator: Option<Arc<dyn Authenticator + Send + Sync>>,
}

impl<D> ClientBuilder<D>
where
    D: AsRef<str>,
{
    /// Make a new `ClientBuilder` using the given domain and port.
    pub fn new(domain: D, port: u16) -> Self {
        ClientBuilder {
            domain,
            port,
            mode: ConnectionMode::Plaintext,
            tls_kind: TlsKind::default(),
            authenticator: Some(Arc::new(Md5Authenticator)),
        }
    }

    /// Pick the connection mode from a protocol specifier, see
    /// [`ConnectionMode::from_protocol`].
    pub fn protocol(&mut self, protocol: &str) -> &mut Self {
        self.mode = ConnectionMode::from_protocol(protocol);
        self
    }

    /// Set the connection mode.
    pub fn mode(&mut self, mode: ConnectionMode) -> &mut Self {
        self.mode = mode;
        self
    }

    /// Use `STARTTLS` for this connection.
    pub fn starttls(&mut self) -> &mut Self {
        self.mode(ConnectionMode::StartTls)
    }

    /// Choose the TLS library used by [`connect`](Self::connect).
    pub fn tls_kind(&mut self, kind: TlsKind) -> &mut Self {
        self.tls_kind = kind;
        self
    }

    /// Answer CRAM-MD5 and DIGEST-MD5 challenges with `authenticator` instead of the built-in
    /// [`Md5Authenticator`].
    pub fn authenticator<A>(&mut self, authenticator: A) -> &mut Self
    where
        A: Authenticator + Send + Sync + 'static,
    {
        self.authenticator = Some(Arc::new(authenticator));
        self
    }

    /// Build clients that cannot answer challenges. CRAM-MD5 and DIGEST-MD5 are then skipped
    /// during login.
    pub fn without_authenticator(&mut self) -> &mut Self {
        self.authenticator = None;
        self
    }

    /// The configured connection mode.
    pub fn connection_mode(&self) -> ConnectionMode {
        self.mode
    }

    /// Return a new [`Client`] using the configured mode and TLS library.
    ///
    /// Fails with [`Error::Configuration`] before touching the network if the mode needs TLS and
    /// the chosen library is not compiled in.
    pub fn connect(&mut self) -> Result<Client<Connection>> {
        let kind = self.tls_kind;
        if self.mode.is_encrypted() && !kind.is_available() {
            return Err(Error::Configuration(format!(
                "{:?} connections need TLS support, but the {:?} TLS backend is not compiled in",
                self.mode, kind
            )));
        }
        self.establish(|domain, tcp| tls_handshake(kind, domain, tcp))
    }

    /// Make a [`Client`] using a custom TLS initialization. This function is intended
    /// to be used if your TLS setup requires custom work such as adding private CAs
    /// or other specific TLS parameters.
    ///
    /// The `handshake` argument should accept two parameters:
    ///
    /// - domain: [`&str`]
    /// - tcp: [`TcpStream`]
    ///
    /// and yield a `Result<C>`. It should only perform TLS initialization over the given `tcp`
    /// socket and return the encrypted stream. In [`ConnectionMode::StartTls`] the socket has
    /// already completed the `STARTTLS` exchange; in [`ConnectionMode::Plaintext`] `handshake`
    /// is not called.
    ///
    /// ```no_run
    /// # use imap_session::{ClientBuilder, ConnectionMode};
    /// # use native_tls::TlsConnector;
    /// # fn main() -> Result<(), imap_session::Error> {
    /// let client = ClientBuilder::new("imap.example.com", 993)
    ///     .mode(ConnectionMode::Tls)
    ///     .connect_with(|domain, tcp| {
    ///         let ssl_conn = TlsConnector::builder()
    ///             .danger_accept_invalid_certs(true)
    ///             .build()?;
    ///         Ok(ssl_conn.connect(domain, tcp).map_err(|e| {
    ///             imap_session::Error::TlsHandshake(e.to_string())
    ///         })?)
    ///     })?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn connect_with<F, C>(&mut self, handshake: F) -> Result<Client<Connection>>
    where
        F: FnOnce(&str, TcpStream) -> Result<C>,
        C: std::io::Read + std::io::Write + Send + 'static,
    {
        self.establish(|domain, tcp| handshake(domain, tcp).map(|s| Box::new(s) as Connection))
    }

    fn establish<F>(&mut self, handshake: F) -> Result<Client<Connection>>
    where
        F: FnOnce(&str, TcpStream) -> Result<Connection>,
    {
        let domain = self.domain.as_ref();
        debug!(host = domain, port = self.port, mode = ?self.mode, "connecting");
        let tcp = open(domain, self.port)?;

        let mut client = match self.mode {
            ConnectionMode::Plaintext => {
                let mut client = Client::new(Box::new(tcp) as Connection);
                client.read_greeting()?;
                client
            }
            ConnectionMode::Tls => {
                let mut client = Client::new(handshake(domain, tcp)?);
                client.set_secure(true);
                client.read_greeting()?;
                client
            }
            ConnectionMode::StartTls => {
                let mut client = Client::new(tcp);
                client.read_greeting()?;
                client.starttls(|tcp| handshake(domain, tcp))?
            }
        };

        client.set_host(domain);
        match self.authenticator {
            Some(ref authenticator) => client.set_authenticator(Arc::clone(authenticator)),
            None => client.clear_authenticator(),
        }
        debug!(host = domain, secure = client.is_secure(), "connected");
        Ok(client)
    }
}

/// Resolve `domain` and try each address in turn, giving each [`CONNECT_TIMEOUT`].
fn open(domain: &str, port: u16) -> Result<TcpStream> {
    let addr = format!("{}:{}", domain, port);
    let addrs = match (domain, port).to_socket_addrs() {
        Ok(addrs) => addrs,
        Err(source) => return Err(Error::Connect { addr, source }),
    };

    let mut last = io::Error::new(ErrorKind::NotFound, "host did not resolve to any address");
    for sock in addrs {
        match TcpStream::connect_timeout(&sock, CONNECT_TIMEOUT) {
            Ok(tcp) => return Ok(tcp),
            Err(e) => {
                debug!(address = %sock, error = %e, "could not connect");
                last = e;
            }
        }
    }
    Err(Error::Connect { addr, source: last })
}

#[allow(unused_variables)]
fn tls_handshake(kind: TlsKind, domain: &str, tcp: TcpStream) -> Result<Connection> {
    match kind {
        #[cfg(feature = "native-tls")]
        TlsKind::Native => {
            let ssl_conn = TlsConnector::builder().build()?;
            let tls = ssl_conn
                .connect(domain, tcp)
                .map_err(|e| Error::TlsHandshake(e.to_string()))?;
            Ok(Box::new(tls))
        }
        #[cfg(feature = "rustls-tls")]
        TlsKind::Rust => {
            let ssl_conn = RustlsConnector::new_with_native_certs()?;
            let tls = ssl_conn
                .connect(domain, tcp)
                .map_err(|e| Error::TlsHandshake(e.to_string()))?;
            Ok(Box::new(tls))
        }
        #[allow(unreachable_patterns)]
        other => Err(Error::Configuration(format!(
            "the {:?} TLS backend is not compiled in",
            other
        ))),
    }
}
