//! JSON-RPC request handlers, split by domain.

mod entity;
mod query;

use crate::server::AppState;
use netrpc_core::rpc::methods;
use netrpc_core::{EntityId, NetRpcError};
use serde_json::Value;
use tracing::warn;

// ============================================================================
// Parameter extraction helpers
// ============================================================================

/// Extract the addressed entity.
///
/// Accepted shapes:
/// - `{"id": "service/type/id"}`
/// - `{"id": {"id": ..., "t": ..., "s": ...}}`
/// - the bare `EntityId` object or encoded string as the params themselves
pub(crate) fn require_entity_param(params: &Value) -> netrpc_core::Result<EntityId> {
    let raw = if params.is_string() || params.get("t").is_some() {
        params
    } else {
        params.get("id").ok_or_else(|| NetRpcError::InvalidParams {
            message: "Missing required parameter: id".to_string(),
        })?
    };

    match raw {
        Value::String(encoded) => encoded.parse(),
        Value::Object(_) => {
            serde_json::from_value(raw.clone()).map_err(|e| NetRpcError::InvalidParams {
                message: format!("Invalid entity ID: {}", e),
            })
        }
        _ => Err(NetRpcError::InvalidParams {
            message: "Entity ID must be a string or an object".to_string(),
        }),
    }
}

// ============================================================================
// Method dispatcher
// ============================================================================

/// Dispatch a method call to the appropriate domain handler.
pub(crate) async fn dispatch_method(
    state: &AppState,
    method: &str,
    params: &Value,
) -> netrpc_core::Result<Value> {
    match method {
        // Query
        methods::SERVICES => query::services(state, params).await,

        // Entities
        methods::ENTITY_ID => entity::id(state, params).await,
        methods::ENTITY_NAME => entity::name(state, params).await,
        methods::ENTITY_LIST => entity::list(state, params).await,
        methods::ENTITY_FREE => entity::free(state, params).await,

        // Unknown method
        _ => {
            warn!("Method not found: {}", method);
            Err(NetRpcError::MethodNotFound {
                method: method.to_string(),
            })
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
