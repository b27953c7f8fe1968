//! JSON-RPC serve loop over an injected stream pair.
//!
//! The loop reads newline-delimited requests, dispatches each on its own task
//! (at most [`RpcConfig::MAX_CONCURRENT_REQUESTS`] in flight), and funnels
//! responses through a single writer task so messages never interleave.
//!
//! The loop ends on EOF (after in-flight requests finish) or on a transport
//! error on either side, which is returned to the caller. Requests still in
//! flight when the transport fails are abandoned.

use super::protocol::{read_message, write_message, RpcRequest, RpcResponse};
use crate::config::RpcConfig;
use crate::{NetRpcError, Result};
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, Semaphore};
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, error, info, warn};

/// Trait for dispatching JSON-RPC method calls.
#[async_trait::async_trait]
pub trait RpcDispatch: Send + Sync + 'static {
    /// Dispatch a method call and return its result.
    async fn dispatch(&self, method: &str, params: serde_json::Value) -> Result<serde_json::Value>;
}

/// JSON-RPC server bound to one stream pair.
pub struct RpcServer;

impl RpcServer {
    /// Serve requests from `reader`, writing responses to `writer`, until
    /// the peer closes the stream.
    pub async fn serve<R, W, D>(mut reader: R, writer: W, dispatch: Arc<D>) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin + Send + 'static,
        D: RpcDispatch,
    {
        let (tx, rx) = mpsc::channel::<Vec<u8>>(RpcConfig::OUTBOUND_QUEUE_DEPTH);
        let mut writer_task = tokio::spawn(Self::write_loop(writer, rx));
        let mut writer_outcome = None;
        let limiter = Arc::new(Semaphore::new(RpcConfig::MAX_CONCURRENT_REQUESTS));
        let mut in_flight = JoinSet::new();

        info!("RPC session started");

        let read_result = loop {
            // The loop holds a sender, so the writer only finishes on failure.
            let read = tokio::select! {
                biased;
                joined = &mut writer_task => {
                    writer_outcome = Some(Self::writer_result(joined));
                    break Ok(());
                }
                read = read_message(&mut reader) => read,
            };
            let frame = match read {
                Ok(Some(frame)) => frame,
                Ok(None) => break Ok(()),
                Err(e) => break Err(e),
            };

            // Reap finished handlers so the set does not grow unbounded.
            while in_flight.try_join_next().is_some() {}

            let permit = match limiter.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => break Err(NetRpcError::Other("request limiter closed".to_string())),
            };

            let dispatch = dispatch.clone();
            let tx = tx.clone();
            in_flight.spawn(async move {
                let _permit = permit;
                let Some(response) = Self::process_message(&frame, dispatch.as_ref()).await else {
                    return;
                };
                match serde_json::to_vec(&response) {
                    Ok(bytes) => {
                        // The writer only goes away after a write failure,
                        // which the serve loop already reports.
                        let _ = tx.send(bytes).await;
                    }
                    Err(e) => error!("Failed to encode RPC response: {}", e),
                }
            });
        };

        let transport_failed = match (&read_result, &writer_outcome) {
            (Err(e), _) | (_, Some(Err(e))) => e.is_fatal_transport(),
            _ => false,
        };
        if transport_failed {
            if !in_flight.is_empty() {
                warn!("Abandoning {} in-flight RPC request(s)", in_flight.len());
            }
            in_flight.shutdown().await;
        } else {
            while in_flight.join_next().await.is_some() {}
        }
        drop(tx);

        let write_result = match writer_outcome {
            Some(result) => result,
            None => Self::writer_result(writer_task.await),
        };

        match (&read_result, &write_result) {
            (Ok(()), Ok(())) => info!("RPC session ended"),
            (Err(e), _) | (_, Err(e)) => warn!("RPC session ended with error: {}", e),
        }

        read_result.and(write_result)
    }

    fn writer_result(joined: std::result::Result<Result<()>, JoinError>) -> Result<()> {
        joined.unwrap_or_else(|e| Err(NetRpcError::Other(format!("RPC writer task failed: {}", e))))
    }

    async fn write_loop<W: AsyncWrite + Unpin>(
        mut writer: W,
        mut rx: mpsc::Receiver<Vec<u8>>,
    ) -> Result<()> {
        while let Some(bytes) = rx.recv().await {
            write_message(&mut writer, &bytes).await?;
        }
        writer.shutdown().await?;
        Ok(())
    }

    /// Decode one message and dispatch it. Returns `None` for notifications.
    pub(crate) async fn process_message<D: RpcDispatch + ?Sized>(
        frame: &[u8],
        dispatch: &D,
    ) -> Option<RpcResponse> {
        let value: serde_json::Value = match serde_json::from_slice(frame) {
            Ok(value) => value,
            Err(e) => {
                return Some(RpcResponse::error(None, -32700, format!("Parse error: {}", e)));
            }
        };

        // Well-formed JSON that is not a request object (batches included).
        let id = value.get("id").filter(|id| !id.is_null()).cloned();
        let request: RpcRequest = match serde_json::from_value(value) {
            Ok(req) => req,
            Err(e) => {
                return Some(RpcResponse::error(id, -32600, format!("Invalid Request: {}", e)));
            }
        };

        if request.jsonrpc != RpcConfig::JSONRPC_VERSION {
            return Some(RpcResponse::error(
                request.id,
                -32600,
                "Invalid Request: expected jsonrpc 2.0".to_string(),
            ));
        }

        debug!("RPC call: {}", request.method);

        let params = request
            .params
            .unwrap_or(serde_json::Value::Object(Default::default()));
        let result = dispatch.dispatch(&request.method, params).await;

        let Some(id) = request.id else {
            if let Err(e) = result {
                warn!("RPC notification {} failed: {}", request.method, e);
            }
            return None;
        };

        Some(match result {
            Ok(value) => RpcResponse::success(Some(id), value),
            Err(e) => {
                debug!("RPC error for {}: {}", request.method, e);
                RpcResponse::error(Some(id), e.to_rpc_error_code(), e.to_string())
            }
        })
    }
}
