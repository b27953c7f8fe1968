//! Entity type table.
//!
//! [`EntityType`] is the closed set of tags an [`EntityId`] may carry. Every
//! tag corresponds to a capability that (transitively) embeds
//! [`Capability::Identifier`]. The [`TypeTable`] resolves a live object to
//! its tag by walking the embedding graph once at startup and then matching
//! against a declared precedence order.

use crate::entity::{Capability, Entity};
use crate::entity_id::EntityId;
use crate::error::NetRpcError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::str::FromStr;

/// Closed set of entity type tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EntityType {
    Service,
    Session,
    Server,
    Channel,
    MessageHeader,
    Message,
    Member,
}

impl EntityType {
    /// Resolution order used by [`TypeTable::query_type`]. More specific
    /// types come before the types they embed.
    pub const PRECEDENCE: [EntityType; 7] = [
        EntityType::Service,
        EntityType::Session,
        EntityType::Channel,
        EntityType::Server,
        EntityType::Message,
        EntityType::MessageHeader,
        EntityType::Member,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Service => "Service",
            EntityType::Session => "Session",
            EntityType::Server => "Server",
            EntityType::Channel => "Channel",
            EntityType::MessageHeader => "MessageHeader",
            EntityType::Message => "Message",
            EntityType::Member => "Member",
        }
    }

    /// The capability an object must implement to carry this tag.
    pub fn capability(&self) -> Capability {
        match self {
            EntityType::Service => Capability::Service,
            EntityType::Session => Capability::Session,
            EntityType::Server => Capability::Server,
            EntityType::Channel => Capability::Channel,
            EntityType::MessageHeader => Capability::MessageHeader,
            EntityType::Message => Capability::Message,
            EntityType::Member => Capability::Member,
        }
    }

    /// Membership test against the closed table.
    pub fn is_valid(tag: &str) -> bool {
        tag.parse::<EntityType>().is_ok()
    }
}

impl FromStr for EntityType {
    type Err = NetRpcError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EntityType::PRECEDENCE
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| NetRpcError::UnknownType { tag: s.to_string() })
    }
}

impl std::fmt::Display for EntityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Capability-to-tag resolution table, built once at startup.
#[derive(Debug, Clone)]
pub struct TypeTable {
    /// Transitive embedding closure of every declared capability.
    closures: HashMap<Capability, BTreeSet<Capability>>,
    precedence: Vec<EntityType>,
}

impl TypeTable {
    /// Build the table with the default precedence order.
    pub fn new() -> Self {
        Self::with_precedence(EntityType::PRECEDENCE.to_vec())
    }

    /// Build the table with an explicit precedence order. Types missing from
    /// `precedence` are never returned by [`query_type`](Self::query_type).
    pub fn with_precedence(precedence: Vec<EntityType>) -> Self {
        let mut closures = HashMap::with_capacity(Capability::ALL.len());
        for cap in Capability::ALL {
            closure_of(cap, &mut closures);
        }

        Self {
            closures,
            precedence,
        }
    }

    /// Check whether an object declaring `declared` implements `cap`, directly
    /// or through embedding.
    pub fn implements(&self, declared: &[Capability], cap: Capability) -> bool {
        declared.iter().any(|d| {
            self.closures
                .get(d)
                .map(|closure| closure.contains(&cap))
                .unwrap_or(*d == cap)
        })
    }

    /// Resolve the entity type of a live object: the first tag in precedence
    /// order whose capability the object implements. `None` if no tag matches.
    pub fn query_type(&self, entity: &dyn Entity) -> Option<EntityType> {
        let declared = entity.capabilities();
        self.precedence
            .iter()
            .copied()
            .find(|t| self.implements(declared, t.capability()))
    }

    /// Derive the global ID of a live object owned by `service_id`.
    ///
    /// Returns `None` if the object has no entity type or the service ID is
    /// not a valid namespace.
    pub fn entity_id(&self, service_id: &str, entity: &dyn Entity) -> Option<EntityId> {
        let entity_type = self.query_type(entity)?;
        EntityId::derive(service_id, entity_type, entity.id()).ok()
    }
}

impl Default for TypeTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Memoized transitive closure over the embedding graph.
fn closure_of(
    cap: Capability,
    memo: &mut HashMap<Capability, BTreeSet<Capability>>,
) -> BTreeSet<Capability> {
    if let Some(done) = memo.get(&cap) {
        return done.clone();
    }

    let mut closure = BTreeSet::from([cap]);
    for embedded in cap.embeds() {
        closure.extend(closure_of(*embedded, memo));
    }

    memo.insert(cap, closure.clone());
    closure
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Stub {
        id: &'static str,
        caps: &'static [Capability],
    }

    impl Entity for Stub {
        fn id(&self) -> &str {
            self.id
        }

        fn capabilities(&self) -> &[Capability] {
            self.caps
        }
    }

    #[test]
    fn test_every_tag_embeds_identifier() {
        let table = TypeTable::new();
        for t in EntityType::PRECEDENCE {
            assert!(
                table.implements(&[t.capability()], Capability::Identifier),
                "{} does not embed Identifier",
                t
            );
        }
    }

    #[test]
    fn test_tag_roundtrip() {
        for t in EntityType::PRECEDENCE {
            assert_eq!(t.as_str().parse::<EntityType>().unwrap(), t);
            assert!(EntityType::is_valid(t.as_str()));
        }
        assert!(!EntityType::is_valid("Identifier"));
        assert!(!EntityType::is_valid("channel"));
        assert!(matches!(
            "Bogus".parse::<EntityType>(),
            Err(NetRpcError::UnknownType { tag }) if tag == "Bogus"
        ));
    }

    #[test]
    fn test_deep_embedding_resolves() {
        let table = TypeTable::new();
        // Channel -> Server -> Identifier/Namer
        assert!(table.implements(&[Capability::Channel], Capability::Namer));
        assert!(table.implements(&[Capability::Channel], Capability::Server));
        // Message -> MessageHeader -> Identifier
        assert!(table.implements(&[Capability::Message], Capability::Identifier));
        assert!(!table.implements(&[Capability::Author], Capability::Identifier));
    }

    #[test]
    fn test_query_type_takes_first_match_in_precedence() {
        let table = TypeTable::new();
        let channel = Stub {
            id: "#general",
            caps: &[Capability::Channel],
        };
        // A channel is also a server; the more specific tag wins.
        assert_eq!(table.query_type(&channel), Some(EntityType::Channel));

        let message = Stub {
            id: "m1",
            caps: &[Capability::Message, Capability::Author],
        };
        assert_eq!(table.query_type(&message), Some(EntityType::Message));
    }

    #[test]
    fn test_query_type_respects_custom_precedence() {
        let table = TypeTable::with_precedence(vec![EntityType::Server, EntityType::Channel]);
        let channel = Stub {
            id: "#general",
            caps: &[Capability::Channel],
        };
        assert_eq!(table.query_type(&channel), Some(EntityType::Server));
    }

    #[test]
    fn test_query_type_untyped_object() {
        let table = TypeTable::new();
        let author = Stub {
            id: "nick",
            caps: &[Capability::Author, Capability::Lister],
        };
        assert_eq!(table.query_type(&author), None);
        assert!(table.entity_id("irc", &author).is_none());
    }

    #[test]
    fn test_entity_id_derivation() {
        let table = TypeTable::new();
        let member = Stub {
            id: "alice",
            caps: &[Capability::Member],
        };
        let id = table.entity_id("irc", &member).unwrap();
        assert_eq!(id.to_string(), "irc/Member/alice");
        assert!(table.entity_id("bad/service", &member).is_none());
    }
}
