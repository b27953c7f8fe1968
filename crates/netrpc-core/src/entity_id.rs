//! Global entity addressing.
//!
//! Every object reachable over RPC is addressed by an [`EntityId`], encoded on
//! the wire as `service/type/id`. Decoding splits into at most three parts, so
//! the local ID may itself contain `/`. The JSON form uses the fixed keys
//! `id`, `t` and `s`.

use crate::error::{NetRpcError, Result};
use crate::types::EntityType;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Service-scoped global identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityId {
    /// Local ID. Ignored on resolution when `entity_type` is `Service`.
    #[serde(rename = "id", default)]
    pub id: String,
    #[serde(rename = "t")]
    pub entity_type: EntityType,
    #[serde(rename = "s")]
    pub service: String,
}

impl EntityId {
    /// Build an ID, validating the service namespace.
    pub fn derive(
        service: impl Into<String>,
        entity_type: EntityType,
        id: impl Into<String>,
    ) -> Result<Self> {
        let service = service.into();
        validate_service_id(&service)?;

        Ok(Self {
            id: id.into(),
            entity_type,
            service,
        })
    }

    /// ID addressing the service object itself.
    pub fn service(service: impl Into<String>) -> Result<Self> {
        Self::derive(service, EntityType::Service, "")
    }

    pub fn is_service(&self) -> bool {
        self.entity_type == EntityType::Service
    }

    /// Encode as `service/type/id`.
    pub fn encode(&self) -> String {
        self.to_string()
    }

    /// Decode from `service/type/id`.
    pub fn decode(s: &str) -> Result<Self> {
        s.parse()
    }
}

/// Service IDs name a namespace and must not contain `/`.
pub fn validate_service_id(id: &str) -> Result<()> {
    if id.contains('/') {
        return Err(NetRpcError::InvalidService { id: id.to_string() });
    }
    Ok(())
}

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.service, self.entity_type, self.id)
    }
}

impl FromStr for EntityId {
    type Err = NetRpcError;

    fn from_str(s: &str) -> Result<Self> {
        let mut parts = s.splitn(3, '/');
        let (Some(service), Some(tag), Some(id)) = (parts.next(), parts.next(), parts.next())
        else {
            return Err(NetRpcError::Malformed { id: s.to_string() });
        };

        Ok(Self {
            id: id.to_string(),
            entity_type: tag.parse()?,
            service: service.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_rejects_slash_in_service() {
        let err = EntityId::derive("a/b", EntityType::Channel, "x").unwrap_err();
        assert!(matches!(err, NetRpcError::InvalidService { id } if id == "a/b"));
    }

    #[test]
    fn test_encode_decode_preserves_every_tag() {
        for t in EntityType::PRECEDENCE {
            for local in ["", "#general", "a/b", "nested/path/id"] {
                let id = EntityId::derive("irc", t, local).unwrap();
                let decoded = EntityId::decode(&id.encode()).unwrap();
                assert_eq!(decoded, id, "roundtrip failed for {}", id);
            }
        }
    }

    #[test]
    fn test_decode_local_id_with_slash() {
        let id = EntityId::decode("irc/Channel/a/b").unwrap();
        assert_eq!(id.service, "irc");
        assert_eq!(id.entity_type, EntityType::Channel);
        assert_eq!(id.id, "a/b");
    }

    #[test]
    fn test_decode_malformed() {
        for bad in ["", "irc", "irc/Channel"] {
            assert!(
                matches!(EntityId::decode(bad), Err(NetRpcError::Malformed { .. })),
                "{:?} should be malformed",
                bad
            );
        }
    }

    #[test]
    fn test_decode_unknown_type() {
        let err = EntityId::decode("irc/Bogus/1").unwrap_err();
        assert!(matches!(err, NetRpcError::UnknownType { tag } if tag == "Bogus"));
    }

    #[test]
    fn test_decode_service_with_empty_id() {
        let id = EntityId::decode("irc/Service/").unwrap();
        assert!(id.is_service());
        assert_eq!(id, EntityId::service("irc").unwrap());
    }

    #[test]
    fn test_json_uses_fixed_keys() {
        let id = EntityId::derive("irc", EntityType::Channel, "#general").unwrap();
        let json = serde_json::to_value(&id).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"id": "#general", "t": "Channel", "s": "irc"})
        );

        let parsed: EntityId = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn test_json_rejects_unknown_type() {
        let result: std::result::Result<EntityId, _> =
            serde_json::from_value(serde_json::json!({"id": "1", "t": "Bogus", "s": "irc"}));
        assert!(result.is_err());
    }

    #[test]
    fn test_json_service_id_may_omit_local_id() {
        let parsed: EntityId =
            serde_json::from_value(serde_json::json!({"t": "Service", "s": "irc"})).unwrap();
        assert!(parsed.is_service());
        assert_eq!(parsed.id, "");
    }
}
