//! Error types for the canvas engine

use thiserror::Error;

use crate::types::NodeId;

/// Result type alias using EngineError
pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors that abort a run before or during scheduling
///
/// Per-node failures (missing prompt, executor errors, upstream failures)
/// are not errors at this level; they are recorded in the run report.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The executable subgraph contains a cycle
    #[error("Cycle detected between nodes: {}", nodes.join(", "))]
    CycleDetected { nodes: Vec<NodeId> },

    /// The requested run target does not exist
    #[error("Node not found: {0}")]
    NodeNotFound(NodeId),

    /// The requested run target is a passive reference node
    #[error("Node '{0}' is not executable")]
    NotExecutable(NodeId),

    /// Invalid engine configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl EngineError {
    /// Create a configuration error with a message
    pub fn config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }
}
