//! Error types for the session core.
//!
//! Nothing here is ever thrown out of a transport or timer callback; callers
//! see these values through `Result` returns and rejected reply futures.

use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum TransportError {
    #[error("failed to open socket to '{url}': {reason}")]
    Connect { url: String, reason: String },

    #[error("socket write failed: {0}")]
    Send(String),
}

#[derive(Debug, Error)]
pub enum RouterError {
    #[error("request {request_id} timed out after {timeout_ms} ms")]
    Timeout { request_id: String, timeout_ms: u32 },

    #[error("socket is not open")]
    NotConnected,

    #[error("correlated payload must be a JSON object, got {0}")]
    InvalidPayload(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("request {request_id} failed with status '{status}'")]
    Remote {
        request_id: String,
        status: String,
        message: Option<String>,
    },

    #[error("request cancelled by session teardown")]
    Cancelled,
}

impl RouterError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, RouterError::Timeout { .. })
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GraphError {
    #[error("node type '{0}' is not in the current catalog")]
    UnknownNodeType(String),

    #[error("no pending connection to resolve")]
    NoPendingConnection,

    #[error("node '{0}' does not exist")]
    UnknownNode(String),

    #[error("node '{0}' already exists")]
    DuplicateNode(String),

    #[error("node type '{0}' has no input ports")]
    TargetHasNoInputs(String),

    #[error("an identical connection already exists ({0})")]
    DuplicateEdge(String),
}
