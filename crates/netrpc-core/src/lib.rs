//! netrpc Core - entity addressing, registry and stdio transport.
//!
//! This crate lets an external process query and manipulate the services
//! living inside a host process. Every object is addressed by a flat
//! [`EntityId`] (`service/type/id`), resolved through a concurrent
//! [`Registry`], and RPC traffic travels over the process's own stdin/stdout
//! taken with [`stdio::take`].
//!
//! # Example
//!
//! ```rust,ignore
//! use netrpc_core::{Registry, RpcServer};
//! use std::sync::Arc;
//!
//! let registry = Arc::new(Registry::new());
//! registry.register(my_service)?;
//!
//! let mut channel = netrpc_core::stdio::take()?;
//! let (input, output) = channel.async_halves()?;
//! RpcServer::serve(tokio::io::BufReader::new(input), output, dispatcher).await?;
//! channel.close()?;
//! ```

pub mod config;
pub mod entity;
pub mod entity_id;
pub mod error;
pub mod plugins;
pub mod registry;
pub mod rpc;
pub mod stdio;
pub mod types;

// Re-export commonly used types
pub use config::{AppConfig, RpcConfig};
pub use entity::{Capability, Entity, Lister, Namer};
pub use entity_id::EntityId;
pub use error::{NetRpcError, Result};
pub use plugins::PluginEntry;
pub use registry::Registry;
pub use rpc::{RpcClient, RpcDispatch, RpcServer};
pub use stdio::StdioChannel;
pub use types::{EntityType, TypeTable};
