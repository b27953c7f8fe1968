//! JSON-RPC transport for netrpc.
//!
//! Newline-delimited JSON-RPC 2.0 over any async stream pair, typically the
//! process stdio taken with [`crate::stdio::take`].
//!
//! # Architecture
//!
//! - **Server**: reads requests, dispatches them concurrently through [`RpcDispatch`]
//! - **Client**: issues calls to a peer, optionally spawning it as a child process
//! - **Protocol**: shared message types and framing used by both

pub mod client;
pub mod protocol;
pub mod server;

pub use client::RpcClient;
pub use protocol::{methods, RpcError, RpcRequest, RpcResponse};
pub use server::{RpcDispatch, RpcServer};
