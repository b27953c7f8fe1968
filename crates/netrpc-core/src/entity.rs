//! Capability model for objects exposed over RPC.
//!
//! A live object declares which capabilities it implements directly. A
//! capability may embed others (a `Channel` is also a `Server`, which is
//! also an `Identifier` and a `Namer`); the [`TypeTable`](crate::types::TypeTable)
//! resolves the embedding graph into an [`EntityType`](crate::types::EntityType).

use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Closed set of capabilities an object may implement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Capability {
    Identifier,
    Namer,
    Lister,
    Service,
    Session,
    Server,
    Channel,
    MessageHeader,
    Message,
    Member,
    Author,
}

impl Capability {
    /// Every declared capability, in declaration order.
    pub const ALL: [Capability; 11] = [
        Capability::Identifier,
        Capability::Namer,
        Capability::Lister,
        Capability::Service,
        Capability::Session,
        Capability::Server,
        Capability::Channel,
        Capability::MessageHeader,
        Capability::Message,
        Capability::Member,
        Capability::Author,
    ];

    /// Capabilities directly embedded by this one.
    pub fn embeds(&self) -> &'static [Capability] {
        match self {
            Capability::Identifier | Capability::Namer | Capability::Lister => &[],
            Capability::Service => &[Capability::Identifier, Capability::Namer],
            Capability::Session => &[Capability::Identifier, Capability::Namer],
            Capability::Server => &[Capability::Identifier, Capability::Namer],
            Capability::Channel => &[Capability::Server],
            Capability::MessageHeader => &[Capability::Identifier],
            Capability::Message => &[Capability::MessageHeader],
            Capability::Member => &[Capability::Identifier, Capability::Namer],
            Capability::Author => &[Capability::Namer],
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::Identifier => "Identifier",
            Capability::Namer => "Namer",
            Capability::Lister => "Lister",
            Capability::Service => "Service",
            Capability::Session => "Session",
            Capability::Server => "Server",
            Capability::Channel => "Channel",
            Capability::MessageHeader => "MessageHeader",
            Capability::Message => "Message",
            Capability::Member => "Member",
            Capability::Author => "Author",
        }
    }
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An object living inside a service that exposes a stable local identifier.
///
/// Services themselves are entities too; they declare [`Capability::Service`].
pub trait Entity: Send + Sync {
    /// Opaque identifier, unique within the owning service and entity type.
    fn id(&self) -> &str;

    /// Capabilities implemented directly by this object.
    fn capabilities(&self) -> &[Capability];

    fn as_namer(&self) -> Option<&dyn Namer> {
        None
    }

    fn as_lister(&self) -> Option<&dyn Lister> {
        None
    }
}

/// Capability: has a human-readable name.
pub trait Namer: Send + Sync {
    fn name(&self) -> String;
}

/// Capability: enumerates child entities.
pub trait Lister: Send + Sync {
    fn list(&self) -> Vec<Arc<dyn Entity>>;
}

impl std::fmt::Debug for dyn Entity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Entity")
            .field("id", &self.id())
            .field("capabilities", &self.capabilities())
            .finish()
    }
}
