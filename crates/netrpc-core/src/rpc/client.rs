//! JSON-RPC client for talking to a netrpc plugin.
//!
//! Works over any stream pair; [`RpcClient::spawn`] launches a plugin binary
//! and talks to it over the child's stdin/stdout.
//!
//! # Thread Safety
//!
//! The client uses a tokio `Mutex` to serialize access to the stream pair,
//! so one request is on the wire at a time.

use super::protocol::{methods, read_message, write_message, RpcRequest, RpcResponse};
use crate::entity_id::EntityId;
use crate::{NetRpcError, Result};
use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::io::{AsyncBufRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tracing::{debug, warn};

type BoxedReader = Box<dyn AsyncBufRead + Send + Unpin>;
type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

struct ClientIo {
    reader: BoxedReader,
    writer: BoxedWriter,
}

/// JSON-RPC client bound to one peer.
pub struct RpcClient {
    io: Mutex<ClientIo>,
    next_id: AtomicU64,
    child: Option<Child>,
}

impl RpcClient {
    /// Create a client over an existing stream pair.
    pub fn new<R, W>(reader: R, writer: W) -> Self
    where
        R: AsyncBufRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        Self {
            io: Mutex::new(ClientIo {
                reader: Box::new(reader),
                writer: Box::new(writer),
            }),
            next_id: AtomicU64::new(1),
            child: None,
        }
    }

    /// Launch a plugin binary and connect to it over its stdio.
    ///
    /// The child's stderr is inherited so its logs stay visible. The child is
    /// killed if the client is dropped without [`shutdown`](Self::shutdown).
    pub fn spawn(program: &Path) -> Result<Self> {
        Self::spawn_with_args(program, std::iter::empty::<&str>())
    }

    /// Like [`spawn`](Self::spawn), passing extra command-line arguments.
    pub fn spawn_with_args<I, S>(program: &Path, args: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<std::ffi::OsStr>,
    {
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| NetRpcError::Io {
                message: format!("Failed to spawn plugin {}: {}", program.display(), e),
                source: Some(e),
            })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| NetRpcError::Other("plugin stdin not captured".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| NetRpcError::Other("plugin stdout not captured".to_string()))?;

        debug!("Spawned plugin {}", program.display());

        let mut client = Self::new(BufReader::new(stdout), stdin);
        client.child = Some(child);
        Ok(client)
    }

    /// Call a method and wait for its result.
    ///
    /// A JSON-RPC error response becomes [`NetRpcError::Rpc`]; a closed
    /// stream becomes [`NetRpcError::ConnectionLost`].
    pub async fn call(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> Result<serde_json::Value> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = RpcRequest::new(method, params, id);
        let request_bytes = serde_json::to_vec(&request)?;

        let mut io = self.io.lock().await;

        write_message(&mut io.writer, &request_bytes)
            .await
            .map_err(|_| NetRpcError::ConnectionLost)?;

        let expected = serde_json::Value::Number(id.into());
        loop {
            let frame = read_message(&mut io.reader)
                .await
                .map_err(|_| NetRpcError::ConnectionLost)?
                .ok_or(NetRpcError::ConnectionLost)?;

            let response: RpcResponse =
                serde_json::from_slice(&frame).map_err(|e| NetRpcError::Json {
                    message: format!("Failed to parse RPC response: {}", e),
                    source: Some(e),
                })?;

            if response.id.as_ref() != Some(&expected) {
                warn!("Discarding RPC response with unexpected id {:?}", response.id);
                continue;
            }

            return response.into_result();
        }
    }

    /// Send a notification; no response is read.
    pub async fn notify(&self, method: &str, params: serde_json::Value) -> Result<()> {
        let bytes = serde_json::to_vec(&RpcRequest::notification(method, params))?;
        let mut io = self.io.lock().await;
        write_message(&mut io.writer, &bytes)
            .await
            .map_err(|_| NetRpcError::ConnectionLost)
    }

    // ========================================
    // netrpc methods
    // ========================================

    /// List the service IDs the peer has registered.
    pub async fn services(&self) -> Result<Vec<String>> {
        let value = self.call(methods::SERVICES, serde_json::json!({})).await?;
        Ok(serde_json::from_value(value)?)
    }

    /// Local ID of an entity, or `None` if the peer does not know it.
    pub async fn entity_id(&self, id: &EntityId) -> Result<Option<String>> {
        let value = self.call(methods::ENTITY_ID, serde_json::json!({ "id": id })).await?;
        Ok(serde_json::from_value(value)?)
    }

    /// Name of an entity, or `None` if unknown or unnamed.
    pub async fn entity_name(&self, id: &EntityId) -> Result<Option<String>> {
        let value = self.call(methods::ENTITY_NAME, serde_json::json!({ "id": id })).await?;
        Ok(serde_json::from_value(value)?)
    }

    /// Children of a listable entity, or `None` if unknown or not listable.
    pub async fn list(&self, id: &EntityId) -> Result<Option<Vec<EntityId>>> {
        let value = self.call(methods::ENTITY_LIST, serde_json::json!({ "id": id })).await?;
        Ok(serde_json::from_value(value)?)
    }

    /// Release an entity on the peer. Returns whether it was held.
    pub async fn free(&self, id: &EntityId) -> Result<bool> {
        let value = self.call(methods::ENTITY_FREE, serde_json::json!({ "id": id })).await?;
        Ok(value.as_bool().unwrap_or(false))
    }

    /// Close the peer's input and wait for a spawned plugin to exit.
    ///
    /// Returns `None` when the client was not created by [`spawn`](Self::spawn).
    pub async fn shutdown(self) -> Result<Option<ExitStatus>> {
        let Self { io, child, .. } = self;
        let mut io = io.into_inner();
        io.writer.shutdown().await?;
        drop(io);

        match child {
            Some(mut child) => Ok(Some(child.wait().await?)),
            None => Ok(None),
        }
    }
}
