//! This module contains types used throughout the IMAP protocol.

mod capabilities;
pub use self::capabilities::{Capabilities, Capability};

mod namespace;
pub use self::namespace::{Namespace, NamespaceKind, Namespaces};

mod response;
pub use self::response::{Response, ResponseKind, Status};
