use std::collections::hash_map::Iter;
use std::collections::HashMap;

/// A single advertised capability.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Capability {
    /// A plain atom such as `IDLE` or `LOGINDISABLED`.
    Atom,
    /// A parameterized capability such as `AUTH=PLAIN`, with every value seen for the name, in the
    /// order the server listed them.
    Values(Vec<String>),
}

impl Capability {
    /// The values of a parameterized capability. Empty for atoms.
    pub fn values(&self) -> &[String] {
        match self {
            Capability::Atom => &[],
            Capability::Values(v) => v,
        }
    }
}

/// From [section 7.2.1 of RFC 3501](https://tools.ietf.org/html/rfc3501#section-7.2.1).
///
/// A list of capabilities that the server supports.
///
/// A capability name which begins with `AUTH=` indicates that the server supports that particular
/// authentication mechanism; those are grouped here under the name `AUTH`.
///
/// The `LOGINDISABLED` capability indicates that the `LOGIN` command is disabled, and that the
/// server will respond with a `NO` response to any attempt to use the `LOGIN` command even if the
/// user name and password are valid.  An IMAP client MUST NOT issue the `LOGIN` command if the
/// server advertises the `LOGINDISABLED` capability.
///
/// Names are stored upper-cased; lookups are case-insensitive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Capabilities(pub(crate) HashMap<String, Capability>);

impl Capabilities {
    /// Record one capability token as it appears on the wire (`NAME` or `NAME=VALUE`).
    pub(crate) fn insert_token(&mut self, token: &str) {
        match token.split_once('=') {
            Some((name, value)) => {
                let entry = self
                    .0
                    .entry(name.to_ascii_uppercase())
                    .or_insert_with(|| Capability::Values(Vec::new()));
                match entry {
                    Capability::Values(values) => values.push(value.to_ascii_uppercase()),
                    atom => *atom = Capability::Values(vec![value.to_ascii_uppercase()]),
                }
            }
            None => {
                self.0
                    .entry(token.to_ascii_uppercase())
                    .or_insert(Capability::Atom);
            }
        }
    }

    /// Look up a capability by name.
    pub fn get(&self, name: &str) -> Option<&Capability> {
        self.0.get(&name.to_ascii_uppercase())
    }

    /// Check if the server has the given capability.
    pub fn has(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Check if a parameterized capability lists `value`, e.g. `has_value("AUTH", "PLAIN")`.
    pub fn has_value(&self, name: &str, value: &str) -> bool {
        self.get(name)
            .map(|c| c.values().iter().any(|v| v.eq_ignore_ascii_case(value)))
            .unwrap_or(false)
    }

    /// Iterate over all the server's capabilities
    pub fn iter(&self) -> Iter<'_, String, Capability> {
        self.0.iter()
    }

    /// Returns how many distinct capability names the server has.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if the server purports to have no capabilities.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn atoms_and_values() {
        let mut caps = Capabilities::default();
        for t in ["IDLE", "AUTH=PLAIN", "auth=cram-md5", "SASL-IR"] {
            caps.insert_token(t);
        }
        assert_eq!(caps.len(), 3);
        assert_eq!(caps.get("idle"), Some(&Capability::Atom));
        assert_eq!(
            caps.get("AUTH").map(Capability::values),
            Some(&["PLAIN".to_string(), "CRAM-MD5".to_string()][..])
        );
        assert!(caps.has_value("AUTH", "cram-md5"));
        assert!(!caps.has_value("SASL-IR", "x"));
    }

    #[test]
    fn value_replaces_atom() {
        let mut caps = Capabilities::default();
        caps.insert_token("COMPRESS");
        caps.insert_token("COMPRESS=DEFLATE");
        assert!(caps.has_value("COMPRESS", "DEFLATE"));
    }
}
