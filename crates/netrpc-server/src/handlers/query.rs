//! Registry query handlers.

use crate::server::AppState;
use serde_json::Value;

pub async fn services(state: &AppState, _params: &Value) -> netrpc_core::Result<Value> {
    Ok(serde_json::to_value(state.registry.service_ids())?)
}
