//! JSON-RPC 2.0 message types and framing.
//!
//! Messages are newline-delimited UTF-8 JSON:
//!
//! ```text
//! {"jsonrpc":"2.0","method":"netrpc/query.Services","params":{},"id":1}\n
//! ```
//!
//! A request without an `id` is a notification and gets no response.

use crate::config::RpcConfig;
use crate::{NetRpcError, Result};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Method names served by the netrpc façade.
pub mod methods {
    /// `struct{} -> [serviceID]`
    pub const SERVICES: &str = "netrpc/query.Services";
    /// `{id} -> string | null`
    pub const ENTITY_ID: &str = "netrpc/entity.ID";
    /// `{id} -> string | null`
    pub const ENTITY_NAME: &str = "netrpc/entity.Name";
    /// `{id} -> [EntityId] | null`
    pub const ENTITY_LIST: &str = "netrpc/entity.List";
    /// `{id} -> bool`
    pub const ENTITY_FREE: &str = "netrpc/entity.Free";
}

/// JSON-RPC 2.0 request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcRequest {
    pub jsonrpc: String,
    pub method: String,
    #[serde(default)]
    pub params: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<serde_json::Value>,
}

impl RpcRequest {
    /// Create a new JSON-RPC 2.0 request.
    pub fn new(method: impl Into<String>, params: serde_json::Value, id: u64) -> Self {
        Self {
            jsonrpc: RpcConfig::JSONRPC_VERSION.to_string(),
            method: method.into(),
            params: Some(params),
            id: Some(serde_json::Value::Number(id.into())),
        }
    }

    /// Create a notification (no response expected).
    pub fn notification(method: impl Into<String>, params: serde_json::Value) -> Self {
        Self {
            jsonrpc: RpcConfig::JSONRPC_VERSION.to_string(),
            method: method.into(),
            params: Some(params),
            id: None,
        }
    }

    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }
}

/// JSON-RPC 2.0 response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcResponse {
    pub jsonrpc: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
    pub id: Option<serde_json::Value>,
}

impl RpcResponse {
    /// Create a success response.
    pub fn success(id: Option<serde_json::Value>, result: serde_json::Value) -> Self {
        Self {
            jsonrpc: RpcConfig::JSONRPC_VERSION.to_string(),
            result: Some(result),
            error: None,
            id,
        }
    }

    /// Create an error response.
    pub fn error(id: Option<serde_json::Value>, code: i32, message: String) -> Self {
        Self {
            jsonrpc: RpcConfig::JSONRPC_VERSION.to_string(),
            result: None,
            error: Some(RpcError {
                code,
                message,
                data: None,
            }),
            id,
        }
    }

    /// Unwrap into the result value. A `null` or missing result is `Null`.
    pub fn into_result(self) -> Result<serde_json::Value> {
        match self.error {
            Some(err) => Err(NetRpcError::Rpc {
                code: err.code,
                message: err.message,
            }),
            None => Ok(self.result.unwrap_or(serde_json::Value::Null)),
        }
    }
}

/// JSON-RPC 2.0 error object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

/// Read one newline-delimited message.
///
/// Blank lines are skipped. Returns `None` on clean EOF. A message longer
/// than [`RpcConfig::MAX_MESSAGE_SIZE`] is an error; the stream cannot be
/// resynchronized after it.
pub async fn read_message<R: AsyncBufRead + Unpin>(reader: &mut R) -> Result<Option<Vec<u8>>> {
    loop {
        let mut buf = Vec::new();
        let limit = RpcConfig::MAX_MESSAGE_SIZE as u64 + 1;
        let n = (&mut *reader).take(limit).read_until(b'\n', &mut buf).await?;
        if n == 0 {
            return Ok(None);
        }

        let terminated = buf.last() == Some(&b'\n');
        if terminated {
            buf.pop();
            if buf.last() == Some(&b'\r') {
                buf.pop();
            }
        }

        if buf.len() > RpcConfig::MAX_MESSAGE_SIZE {
            return Err(NetRpcError::MessageTooLarge {
                size: buf.len(),
                max: RpcConfig::MAX_MESSAGE_SIZE,
            });
        }

        if buf.iter().all(u8::is_ascii_whitespace) {
            continue;
        }

        return Ok(Some(buf));
    }
}

/// Write one message followed by a newline.
pub async fn write_message<W: AsyncWrite + Unpin>(writer: &mut W, payload: &[u8]) -> Result<()> {
    writer.write_all(payload).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await?;
    Ok(())
}
