//! Error types for netrpc.
//!
//! Identifier, registry and stdio errors are local and recoverable by the
//! caller. Transport errors (`Io`, `MessageTooLarge`, `ConnectionLost`) end the
//! serve loop that produced them.

use thiserror::Error;

/// Main error type for netrpc.
#[derive(Debug, Error)]
pub enum NetRpcError {
    // Identifier errors
    #[error("Malformed entity ID {id:?}: expected service/type/id")]
    Malformed { id: String },

    #[error("Unknown entity type: {tag}")]
    UnknownType { tag: String },

    #[error("Invalid service ID {id:?}: must not contain '/'")]
    InvalidService { id: String },

    // Registry errors
    #[error("Service already registered: {id}")]
    AlreadyRegistered { id: String },

    // Stdio channel errors
    #[error("stdio is taken elsewhere")]
    AlreadyTaken,

    #[error("stdio channel is already closed")]
    AlreadyClosed,

    #[error("Discard device unavailable: {message}")]
    DeviceUnavailable { message: String },

    // RPC errors
    #[error("Invalid params: {message}")]
    InvalidParams { message: String },

    #[error("Method not found: {method}")]
    MethodNotFound { method: String },

    #[error("RPC message size {size} exceeds maximum {max}")]
    MessageTooLarge { size: usize, max: usize },

    #[error("Connection to peer lost")]
    ConnectionLost,

    #[error("Remote error {code}: {message}")]
    Rpc { code: i32, message: String },

    // Wrapped errors
    #[error("IO error: {message}")]
    Io {
        message: String,
        #[source]
        source: Option<std::io::Error>,
    },

    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    #[error("{0}")]
    Other(String),
}

/// Result type alias for netrpc operations.
pub type Result<T> = std::result::Result<T, NetRpcError>;

impl From<std::io::Error> for NetRpcError {
    fn from(err: std::io::Error) -> Self {
        NetRpcError::Io {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl From<serde_json::Error> for NetRpcError {
    fn from(err: serde_json::Error) -> Self {
        NetRpcError::Json {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl From<NetRpcError> for std::io::Error {
    fn from(err: NetRpcError) -> Self {
        match err {
            NetRpcError::Io {
                source: Some(source),
                ..
            } => source,
            NetRpcError::AlreadyClosed => {
                std::io::Error::new(std::io::ErrorKind::BrokenPipe, err)
            }
            other => std::io::Error::other(other),
        }
    }
}

impl NetRpcError {
    /// Convert to a JSON-RPC error code.
    ///
    /// Standard JSON-RPC error codes:
    /// - -32700: Parse error
    /// - -32600: Invalid Request
    /// - -32601: Method not found
    /// - -32602: Invalid params
    /// - -32603: Internal error
    ///
    /// Application codes:
    /// - -32001: Malformed or unknown entity ID
    /// - -32002: Invalid or duplicate service
    /// - -32003: stdio channel state violation
    pub fn to_rpc_error_code(&self) -> i32 {
        match self {
            NetRpcError::Json { .. } => -32700,
            NetRpcError::MethodNotFound { .. } => -32601,
            NetRpcError::InvalidParams { .. } => -32602,

            NetRpcError::Malformed { .. } | NetRpcError::UnknownType { .. } => -32001,

            NetRpcError::InvalidService { .. } | NetRpcError::AlreadyRegistered { .. } => -32002,

            NetRpcError::AlreadyTaken
            | NetRpcError::AlreadyClosed
            | NetRpcError::DeviceUnavailable { .. } => -32003,

            NetRpcError::Rpc { code, .. } => *code,

            _ => -32603,
        }
    }

    /// Check if this error ends a transport session.
    pub fn is_fatal_transport(&self) -> bool {
        matches!(
            self,
            NetRpcError::Io { .. } | NetRpcError::MessageTooLarge { .. } | NetRpcError::ConnectionLost
        )
    }
}
