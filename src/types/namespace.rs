use std::fmt;
use std::slice::Iter;

/// The three namespace classes of [RFC 2342](https://tools.ietf.org/html/rfc2342#section-5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NamespaceKind {
    /// The user's own mailboxes.
    Personal,
    /// Other users' mailboxes.
    Other,
    /// Mailboxes shared between users.
    Shared,
}

impl fmt::Display for NamespaceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NamespaceKind::Personal => f.write_str("personal"),
            NamespaceKind::Other => f.write_str("other"),
            NamespaceKind::Shared => f.write_str("shared"),
        }
    }
}

/// A mailbox name prefix and the hierarchy delimiter used below it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Namespace {
    pub(crate) name: String,
    pub(crate) delimiter: String,
    pub(crate) kind: NamespaceKind,
    pub(crate) hidden: bool,
}

impl Namespace {
    /// The prefix, e.g. `"INBOX."` or `""`.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The hierarchy delimiter. Empty when the server reported `NIL`.
    pub fn delimiter(&self) -> &str {
        &self.delimiter
    }

    /// Which namespace class this prefix belongs to.
    pub fn kind(&self) -> NamespaceKind {
        self.kind
    }

    /// True for prefixes that were configured by the caller and confirmed with a `LIST` probe
    /// rather than advertised by the server.
    pub fn hidden(&self) -> bool {
        self.hidden
    }
}

/// The namespace table of a connection, keyed by prefix, in discovery order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Namespaces(pub(crate) Vec<Namespace>);

impl Namespaces {
    /// Add a namespace unless its prefix is already known. Returns whether it was added.
    pub(crate) fn insert(&mut self, ns: Namespace) -> bool {
        if self.contains(&ns.name) {
            return false;
        }
        self.0.push(ns);
        true
    }

    /// Look up a namespace by prefix.
    pub fn get(&self, prefix: &str) -> Option<&Namespace> {
        self.0.iter().find(|ns| ns.name == prefix)
    }

    /// Whether a prefix is known.
    pub fn contains(&self, prefix: &str) -> bool {
        self.get(prefix).is_some()
    }

    /// Iterate over the known namespaces.
    pub fn iter(&self) -> Iter<'_, Namespace> {
        self.0.iter()
    }

    /// Number of known namespaces.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True if nothing was discovered.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<'a> IntoIterator for &'a Namespaces {
    type Item = &'a Namespace;
    type IntoIter = Iter<'a, Namespace>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
