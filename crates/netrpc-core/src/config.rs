//! Centralized configuration for netrpc.
//!
//! This module provides configuration constants for the application layout
//! and the JSON-RPC transport.

/// Application-level configuration.
pub struct AppConfig;

impl AppConfig {
    pub const APP_NAME: &'static str = "netrpc";
    pub const PLUGINS_DIR_NAME: &'static str = "plugins";
}

/// Configuration for the JSON-RPC transport.
pub struct RpcConfig;

impl RpcConfig {
    pub const JSONRPC_VERSION: &'static str = "2.0";
    pub const MAX_MESSAGE_SIZE: usize = 4 * 1024 * 1024; // 4MB
    pub const MAX_CONCURRENT_REQUESTS: usize = 64;
    pub const OUTBOUND_QUEUE_DEPTH: usize = 128;
}
