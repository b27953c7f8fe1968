//! Live entity registry.
//!
//! Maps [`EntityId`]s to live objects, scoped per service and per entity
//! type. One reader/writer lock guards the whole registry: lookups share the
//! read lock, mutations take the write lock. Every operation is a bounded
//! in-memory map operation; nothing blocks on I/O under the lock.
//!
//! Policy on duplicates: registering a service ID twice is rejected, storing
//! an entity under an existing `(type, id)` overwrites it.

use crate::entity::Entity;
use crate::entity_id::{validate_service_id, EntityId};
use crate::error::{NetRpcError, Result};
use crate::types::{EntityType, TypeTable};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info};

/// A registered service and the entities handed out under it.
struct ServiceEntry {
    service: Arc<dyn Entity>,
    entities: HashMap<EntityType, HashMap<String, Arc<dyn Entity>>>,
}

impl ServiceEntry {
    fn new(service: Arc<dyn Entity>) -> Self {
        Self {
            service,
            entities: HashMap::new(),
        }
    }
}

#[derive(Default)]
struct RegistryState {
    /// Service IDs in registration order.
    order: Vec<String>,
    services: HashMap<String, ServiceEntry>,
}

/// Concurrent registry of services and their entities.
///
/// Owned by the application root and shared by reference (usually behind an
/// `Arc`) with the RPC dispatcher.
pub struct Registry {
    types: TypeTable,
    state: RwLock<RegistryState>,
}

impl Registry {
    /// Create an empty registry with the default type table.
    pub fn new() -> Self {
        Self::with_types(TypeTable::new())
    }

    /// Create an empty registry resolving entity types with `types`.
    pub fn with_types(types: TypeTable) -> Self {
        Self {
            types,
            state: RwLock::new(RegistryState::default()),
        }
    }

    // Map operations cannot leave the state half-applied, so a poisoned lock
    // is still consistent.
    fn read(&self) -> RwLockReadGuard<'_, RegistryState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, RegistryState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    // ========================================
    // Services
    // ========================================

    /// Register a service under its own ID.
    ///
    /// Must happen before any lookup targeting the service.
    pub fn register(&self, service: Arc<dyn Entity>) -> Result<()> {
        let id = service.id().to_string();
        validate_service_id(&id)?;

        let mut state = self.write();
        if state.services.contains_key(&id) {
            return Err(NetRpcError::AlreadyRegistered { id });
        }

        state.order.push(id.clone());
        state.services.insert(id.clone(), ServiceEntry::new(service));
        drop(state);

        info!("Registered service: {}", id);
        Ok(())
    }

    /// Snapshot of registered service IDs, in registration order.
    pub fn service_ids(&self) -> Vec<String> {
        self.read().order.clone()
    }

    /// Check whether a service is registered.
    pub fn contains_service(&self, service_id: &str) -> bool {
        self.read().services.contains_key(service_id)
    }

    // ========================================
    // Entities
    // ========================================

    /// Store `entity` under the service `service_id`.
    ///
    /// Does nothing (and returns `None`) if the object resolves to the
    /// `Service` tag, has no entity type, or the service is unregistered.
    /// Otherwise upserts it and returns its global ID.
    pub fn put_entity(&self, service_id: &str, entity: Arc<dyn Entity>) -> Option<EntityId> {
        let entity_type = self.types.query_type(entity.as_ref())?;
        if entity_type == EntityType::Service {
            return None;
        }

        let local_id = entity.id().to_string();

        let mut state = self.write();
        let entry = state.services.get_mut(service_id)?;
        entry
            .entities
            .entry(entity_type)
            .or_default()
            .insert(local_id.clone(), entity);
        drop(state);

        debug!("Stored {}/{}/{}", service_id, entity_type, local_id);

        Some(EntityId {
            id: local_id,
            entity_type,
            service: service_id.to_string(),
        })
    }

    /// Resolve an ID to its live object.
    ///
    /// A `Service` ID resolves to the service itself regardless of its local
    /// ID. Any miss returns `None`.
    pub fn entity(&self, id: &EntityId) -> Option<Arc<dyn Entity>> {
        let state = self.read();
        let entry = state.services.get(&id.service)?;

        if id.is_service() {
            return Some(entry.service.clone());
        }

        entry
            .entities
            .get(&id.entity_type)
            .and_then(|by_id| by_id.get(&id.id))
            .cloned()
    }

    /// Remove the entity addressed by `id`. Returns whether anything was
    /// removed; `Service` IDs and unknown services are left alone.
    pub fn free_entity(&self, id: &EntityId) -> bool {
        if id.is_service() {
            return false;
        }

        let mut state = self.write();
        let removed = state
            .services
            .get_mut(&id.service)
            .and_then(|entry| entry.entities.get_mut(&id.entity_type))
            .and_then(|by_id| by_id.remove(&id.id))
            .is_some();
        drop(state);

        if removed {
            debug!("Freed {}", id);
        }
        removed
    }

    /// Number of entities stored under a service, across all types.
    pub fn entity_count(&self, service_id: &str) -> usize {
        self.read()
            .services
            .get(service_id)
            .map(|entry| entry.entities.values().map(HashMap::len).sum())
            .unwrap_or(0)
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}
