//! Connection validation for canvas graphs
//!
//! Decides whether a prospective edge may be added. This is the only gate
//! for graph mutation: the dependency graph builder assumes every edge it
//! sees has passed these checks.

use crate::handles::{output_handle, policy_for};
use crate::types::{GraphEdge, GraphNode, NodeKind};

/// Why a connection was rejected
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConnectionError {
    /// An endpoint references a node that is not in the graph
    #[error("Edge '{edge_id}' references unknown node '{node_id}'")]
    UnknownNode { edge_id: String, node_id: String },

    /// Source and target are the same node
    #[error("Node '{node_id}' cannot connect to itself")]
    SelfConnection { node_id: String },

    /// The target kind has no input handle with this name
    #[error("Node kind '{kind}' has no input handle '{handle}'")]
    UnknownHandle { kind: NodeKind, handle: String },

    /// The handle exists but not under the target's current reference mode
    #[error("Handle '{handle}' on node '{node_id}' is not available in the current reference mode")]
    InactiveHandle { node_id: String, handle: String },

    /// The source kind may not feed this handle
    #[error("A '{source_kind}' node cannot connect to '{handle}' on a '{target_kind}' node")]
    IncompatibleSource {
        source_kind: NodeKind,
        target_kind: NodeKind,
        handle: String,
    },

    /// The source kind has no output handle with this name
    #[error("Node kind '{kind}' has no output handle '{handle}'")]
    UnknownSourceHandle { kind: NodeKind, handle: String },

    /// The same connection already exists
    #[error("Connection already exists")]
    Duplicate,

    /// The handle is already at its connection limit
    #[error("Handle '{handle}' on node '{node_id}' accepts at most {max} connection(s)")]
    HandleFull {
        node_id: String,
        handle: String,
        max: usize,
    },
}

/// Whether `candidate` may be added to the graph
pub fn is_valid_connection(candidate: &GraphEdge, existing: &[GraphEdge], nodes: &[GraphNode]) -> bool {
    check_connection(candidate, existing, nodes).is_ok()
}

/// Validate a prospective edge, reporting the first rule it breaks
pub fn check_connection(
    candidate: &GraphEdge,
    existing: &[GraphEdge],
    nodes: &[GraphNode],
) -> Result<(), ConnectionError> {
    let find = |id: &str| nodes.iter().find(|n| n.id == id);

    let source = find(&candidate.source).ok_or_else(|| ConnectionError::UnknownNode {
        edge_id: candidate.id.clone(),
        node_id: candidate.source.clone(),
    })?;
    let target = find(&candidate.target).ok_or_else(|| ConnectionError::UnknownNode {
        edge_id: candidate.id.clone(),
        node_id: candidate.target.clone(),
    })?;

    if source.id == target.id {
        return Err(ConnectionError::SelfConnection {
            node_id: source.id.clone(),
        });
    }

    let policy = policy_for(target.kind(), &candidate.target_handle).ok_or_else(|| {
        ConnectionError::UnknownHandle {
            kind: target.kind(),
            handle: candidate.target_handle.clone(),
        }
    })?;

    if !policy.is_active(target.settings.reference_mode()) {
        return Err(ConnectionError::InactiveHandle {
            node_id: target.id.clone(),
            handle: candidate.target_handle.clone(),
        });
    }

    if !policy.accepts(source.kind()) {
        return Err(ConnectionError::IncompatibleSource {
            source_kind: source.kind(),
            target_kind: target.kind(),
            handle: candidate.target_handle.clone(),
        });
    }

    if candidate.source_handle != output_handle(source.kind()) {
        return Err(ConnectionError::UnknownSourceHandle {
            kind: source.kind(),
            handle: candidate.source_handle.clone(),
        });
    }

    if existing.iter().any(|e| e.same_connection(candidate)) {
        return Err(ConnectionError::Duplicate);
    }

    let connected = existing
        .iter()
        .filter(|e| e.target == candidate.target && e.target_handle == candidate.target_handle)
        .count();
    if connected >= policy.max_connections {
        return Err(ConnectionError::HandleFull {
            node_id: target.id.clone(),
            handle: candidate.target_handle.clone(),
            max: policy.max_connections,
        });
    }

    Ok(())
}
