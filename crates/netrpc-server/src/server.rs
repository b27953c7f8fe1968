//! RPC server façade over the entity registry.

use crate::handlers::dispatch_method;
use async_trait::async_trait;
use netrpc_core::{stdio, Registry, RpcDispatch, RpcServer};
use serde_json::Value;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncWrite, BufReader};
use tracing::{error, info};

/// Application state shared across handlers.
pub struct AppState {
    /// Live services and the entities handed out under them
    pub registry: Arc<Registry>,
}

impl AppState {
    pub fn new(registry: Arc<Registry>) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl RpcDispatch for AppState {
    async fn dispatch(&self, method: &str, params: Value) -> netrpc_core::Result<Value> {
        dispatch_method(self, method, &params).await
    }
}

/// Serve `registry` over an already-constructed stream pair until the peer
/// closes it.
pub async fn serve_with<R, W>(registry: Arc<Registry>, reader: R, writer: W) -> anyhow::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let state = Arc::new(AppState::new(registry));
    RpcServer::serve(reader, writer, state).await?;
    Ok(())
}

/// Serve `registry` over the process stdio.
///
/// Takes stdin/stdout for the duration of the session; everything else in
/// the process sees the discard device until the session ends. The stdio
/// pair is returned on every exit path, including unwinding.
pub async fn serve_stdio(registry: Arc<Registry>) -> anyhow::Result<()> {
    let mut channel = stdio::take()?;
    let (input, output) = channel.async_halves()?;

    info!(
        "Serving {} service(s) over stdio",
        registry.service_ids().len()
    );

    let result = serve_with(registry, BufReader::new(input), output).await;
    if let Err(e) = &result {
        error!("stdio session failed: {}", e);
    }

    channel.close()?;
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use netrpc_core::rpc::methods;
    use netrpc_core::{Capability, Entity, EntityId, EntityType, Lister, Namer, NetRpcError};
    use serde_json::json;

    struct Room(&'static str);

    impl Entity for Room {
        fn id(&self) -> &str {
            self.0
        }

        fn capabilities(&self) -> &[Capability] {
            &[Capability::Channel]
        }

        fn as_namer(&self) -> Option<&dyn Namer> {
            Some(self)
        }
    }

    impl Namer for Room {
        fn name(&self) -> String {
            self.0.trim_start_matches('#').to_string()
        }
    }

    struct Chat;

    impl Entity for Chat {
        fn id(&self) -> &str {
            "chat"
        }

        fn capabilities(&self) -> &[Capability] {
            &[Capability::Service, Capability::Lister]
        }

        fn as_lister(&self) -> Option<&dyn Lister> {
            Some(self)
        }
    }

    impl Lister for Chat {
        fn list(&self) -> Vec<Arc<dyn Entity>> {
            vec![Arc::new(Room("#lobby")), Arc::new(Room("#dev"))]
        }
    }

    fn state() -> AppState {
        let registry = Arc::new(Registry::new());
        registry.register(Arc::new(Chat)).unwrap();
        AppState::new(registry)
    }

    #[tokio::test]
    async fn test_dispatch_services() {
        let state = state();
        let result = state.dispatch(methods::SERVICES, json!({})).await.unwrap();
        assert_eq!(result, json!(["chat"]));
    }

    #[tokio::test]
    async fn test_dispatch_list_stores_children() {
        let state = state();
        let service = EntityId::service("chat").unwrap();

        let result = state
            .dispatch(methods::ENTITY_LIST, json!({ "id": service }))
            .await
            .unwrap();
        let children: Vec<EntityId> = serde_json::from_value(result).unwrap();
        assert_eq!(children.len(), 2);
        assert!(children.iter().all(|c| c.entity_type == EntityType::Channel));
        assert_eq!(state.registry.entity_count("chat"), 2);

        let name = state
            .dispatch(methods::ENTITY_NAME, json!({ "id": "chat/Channel/#dev" }))
            .await
            .unwrap();
        assert_eq!(name, json!("dev"));
    }

    #[tokio::test]
    async fn test_dispatch_misses_are_null() {
        let state = state();

        let result = state
            .dispatch(methods::ENTITY_ID, json!({ "id": "chat/Channel/#nowhere" }))
            .await
            .unwrap();
        assert!(result.is_null());

        // Service has no Namer
        let result = state
            .dispatch(methods::ENTITY_NAME, json!({ "id": "chat/Service/" }))
            .await
            .unwrap();
        assert!(result.is_null());

        // Rooms are not listable
        state.registry.put_entity("chat", Arc::new(Room("#lobby")));
        let result = state
            .dispatch(methods::ENTITY_LIST, json!({ "id": "chat/Channel/#lobby" }))
            .await
            .unwrap();
        assert!(result.is_null());
    }

    #[tokio::test]
    async fn test_dispatch_free() {
        let state = state();
        state.registry.put_entity("chat", Arc::new(Room("#lobby")));

        let params = json!({ "id": "chat/Channel/#lobby" });
        assert_eq!(
            state.dispatch(methods::ENTITY_FREE, params.clone()).await.unwrap(),
            json!(true)
        );
        assert_eq!(
            state.dispatch(methods::ENTITY_FREE, params.clone()).await.unwrap(),
            json!(false)
        );
        assert!(state
            .dispatch(methods::ENTITY_ID, params)
            .await
            .unwrap()
            .is_null());
    }

    #[tokio::test]
    async fn test_dispatch_unknown_method() {
        let state = state();
        let err = state.dispatch("netrpc/bogus", json!({})).await.unwrap_err();
        assert!(matches!(err, NetRpcError::MethodNotFound { .. }));
        assert_eq!(err.to_rpc_error_code(), -32601);
    }
}
