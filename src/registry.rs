//! Reuse of one [`Client`] per server within an application session.

use std::collections::hash_map::{Entry, HashMap};
use std::io::{Read, Write};

use tracing::{debug, warn};

use crate::client::Client;
use crate::client_builder::ClientBuilder;
use crate::conn::Connection;
use crate::error::Result;

/// Identifies a server connection: two lookups with equal keys share a client.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ServerKey {
    /// Server host name.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Protocol specifier, e.g. `"imap/tls"`.
    pub protocol: String,
}

impl ServerKey {
    /// Build a key.
    pub fn new<H: Into<String>, P: Into<String>>(host: H, port: u16, protocol: P) -> Self {
        ServerKey {
            host: host.into(),
            port,
            protocol: protocol.into(),
        }
    }
}

/// Open connections, keyed by server.
///
/// A registry is owned by whatever holds the application session and passed to the code that
/// needs a connection. Clients that have been closed (by logout or by the server) are replaced on
/// the next lookup.
#[derive(Debug)]
pub struct Registry<T: Read + Write> {
    clients: HashMap<ServerKey, Client<T>>,
}

impl<T: Read + Write> Default for Registry<T> {
    fn default() -> Self {
        Registry {
            clients: HashMap::new(),
        }
    }
}

impl<T: Read + Write> Registry<T> {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// The client registered for `key`, created with `connect` if there is none or the
    /// registered one is closed.
    pub fn get_or_connect_with<F>(&mut self, key: ServerKey, connect: F) -> Result<&mut Client<T>>
    where
        F: FnOnce(&ServerKey) -> Result<Client<T>>,
    {
        match self.clients.entry(key) {
            Entry::Occupied(mut entry) => {
                if entry.get().is_closed() {
                    debug!(key = ?entry.key(), "replacing closed connection");
                    let client = connect(entry.key())?;
                    entry.insert(client);
                }
                Ok(entry.into_mut())
            }
            Entry::Vacant(entry) => {
                debug!(key = ?entry.key(), "opening connection");
                let client = connect(entry.key())?;
                Ok(entry.insert(client))
            }
        }
    }

    /// The client registered for `key`, if it is still open.
    pub fn get(&mut self, key: &ServerKey) -> Option<&mut Client<T>> {
        self.clients.get_mut(key).filter(|c| !c.is_closed())
    }

    /// Take a client out of the registry without closing it.
    pub fn remove(&mut self, key: &ServerKey) -> Option<Client<T>> {
        self.clients.remove(key)
    }

    /// Log out of every registered server and empty the registry.
    pub fn logout_all(&mut self) {
        for (key, mut client) in self.clients.drain() {
            if let Err(e) = client.logout() {
                warn!(?key, error = %e, "logout failed");
            }
        }
    }

    /// Number of registered clients, open or not.
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    /// True if no client is registered.
    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

impl Registry<Connection> {
    /// The client registered for `key`, connecting with a [`ClientBuilder`] configured from the
    /// key when needed.
    pub fn get_or_connect(&mut self, key: ServerKey) -> Result<&mut Client<Connection>> {
        self.get_or_connect_with(key, |key| {
            ClientBuilder::new(key.host.as_str(), key.port)
                .protocol(&key.protocol)
                .connect()
        })
    }
}
