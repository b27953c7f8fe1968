//! Per-entity handlers.
//!
//! Each handler resolves its `id` argument through the registry and forwards
//! to the capability the method names. A lookup miss, or an entity lacking
//! that capability, answers `null` rather than an error.

use super::require_entity_param;
use crate::server::AppState;
use netrpc_core::EntityId;
use serde_json::Value;
use tracing::debug;

pub async fn id(state: &AppState, params: &Value) -> netrpc_core::Result<Value> {
    let entity_id = require_entity_param(params)?;
    Ok(state
        .registry
        .entity(&entity_id)
        .map(|entity| Value::String(entity.id().to_string()))
        .unwrap_or(Value::Null))
}

pub async fn name(state: &AppState, params: &Value) -> netrpc_core::Result<Value> {
    let entity_id = require_entity_param(params)?;
    Ok(state
        .registry
        .entity(&entity_id)
        .and_then(|entity| entity.as_namer().map(|namer| Value::String(namer.name())))
        .unwrap_or(Value::Null))
}

/// List the children of a `Lister` entity, storing each typed child in the
/// registry under the same service so later calls can address it.
pub async fn list(state: &AppState, params: &Value) -> netrpc_core::Result<Value> {
    let entity_id = require_entity_param(params)?;
    let Some(entity) = state.registry.entity(&entity_id) else {
        return Ok(Value::Null);
    };
    let Some(lister) = entity.as_lister() else {
        return Ok(Value::Null);
    };

    let children: Vec<EntityId> = lister
        .list()
        .into_iter()
        .filter_map(|child| {
            let child_id = child.id().to_string();
            let stored = state.registry.put_entity(&entity_id.service, child);
            if stored.is_none() {
                debug!("Skipping untyped child {} of {}", child_id, entity_id);
            }
            stored
        })
        .collect();

    Ok(serde_json::to_value(children)?)
}

pub async fn free(state: &AppState, params: &Value) -> netrpc_core::Result<Value> {
    let entity_id = require_entity_param(params)?;
    Ok(Value::Bool(state.registry.free_entity(&entity_id)))
}
