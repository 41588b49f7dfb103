//! Graph storage seam
//!
//! The scheduler reads one snapshot of the graph at the start of a run and
//! writes node state back through `update_node`. Hosts back this with their
//! own canvas state; `InMemoryGraphStore` serves tests and headless use.

use parking_lot::RwLock;

use crate::output::NodeOutput;
use crate::state::ExecutionState;
use crate::types::{GraphEdge, GraphNode, NodeId, WorkflowGraph};
use crate::validation::ConnectionError;

/// A state change written back to a node
#[derive(Debug, Clone, PartialEq)]
pub enum NodeUpdate {
    /// Back to idle with no output
    Reset,
    /// Dispatched
    Running,
    /// Finished with an output
    Completed { output: NodeOutput },
    /// Finished with an error
    Failed { error: String },
    /// Partial text while still running
    Streaming { text: String },
}

impl NodeUpdate {
    /// Apply this update to a node
    pub fn apply(&self, node: &mut GraphNode) {
        match self {
            Self::Reset => {
                node.state = ExecutionState::idle();
                node.output = None;
            }
            Self::Running => {
                node.state = ExecutionState::running();
            }
            Self::Completed { output } => {
                node.state = ExecutionState::completed();
                node.output = Some(output.clone());
            }
            Self::Failed { error } => {
                node.state = ExecutionState::failed(error.clone());
                node.output = None;
            }
            Self::Streaming { text } => {
                node.output = Some(NodeOutput::text(text.clone()));
            }
        }
    }
}

/// Storage the scheduler reads graphs from and writes node state to
pub trait GraphStore: Send + Sync {
    /// A consistent copy of the current graph
    fn snapshot(&self) -> WorkflowGraph;

    /// Apply a state change to a node
    ///
    /// Updates for unknown nodes are ignored.
    fn update_node(&self, node_id: &str, update: NodeUpdate);
}

/// Graph store held in memory
#[derive(Debug, Default)]
pub struct InMemoryGraphStore {
    graph: RwLock<WorkflowGraph>,
}

impl InMemoryGraphStore {
    pub fn new(graph: WorkflowGraph) -> Self {
        Self {
            graph: RwLock::new(graph),
        }
    }

    /// Add an edge if the connection validator accepts it
    pub fn connect(&self, edge: GraphEdge) -> Result<(), ConnectionError> {
        self.graph.write().try_connect(edge)
    }

    /// Remove a node and its edges
    pub fn remove_node(&self, node_id: &str) -> Option<GraphNode> {
        self.graph.write().remove_node(node_id)
    }

    /// Copy of a single node
    pub fn node(&self, node_id: &str) -> Option<GraphNode> {
        self.graph.read().find_node(node_id).cloned()
    }

    /// Modify a node's settings or other fields in place
    pub fn edit_node<F>(&self, node_id: &str, edit: F) -> bool
    where
        F: FnOnce(&mut GraphNode),
    {
        match self.graph.write().find_node_mut(node_id) {
            Some(node) => {
                edit(node);
                true
            }
            None => false,
        }
    }

    /// Current output of every node that has one
    pub fn outputs(&self) -> Vec<(NodeId, NodeOutput)> {
        self.graph
            .read()
            .nodes
            .iter()
            .filter_map(|n| n.output.clone().map(|o| (n.id.clone(), o)))
            .collect()
    }
}

impl GraphStore for InMemoryGraphStore {
    fn snapshot(&self) -> WorkflowGraph {
        self.graph.read().clone()
    }

    fn update_node(&self, node_id: &str, update: NodeUpdate) {
        let mut graph = self.graph.write();
        match graph.find_node_mut(node_id) {
            Some(node) => update.apply(node),
            None => log::warn!("Ignoring update for unknown node '{}'", node_id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::WorkflowBuilder;
    use crate::state::ExecutionStatus;
    use crate::types::{ImageGeneratorSettings, NodeSettings, TextSettings};

    fn store() -> InMemoryGraphStore {
        InMemoryGraphStore::new(
            WorkflowBuilder::new()
                .add_node("t", NodeSettings::Text(TextSettings::default()))
                .add_node("g", NodeSettings::ImageGenerator(ImageGeneratorSettings::default()))
                .build(),
        )
    }

    #[test]
    fn test_update_lifecycle() {
        let store = store();

        store.update_node("g", NodeUpdate::Running);
        assert_eq!(store.node("g").unwrap().state.status, ExecutionStatus::Running);

        store.update_node(
            "g",
            NodeUpdate::Completed {
                output: NodeOutput::image("aGk=", "image/png"),
            },
        );
        assert!(store.node("g").unwrap().completed_output().is_some());

        store.update_node("g", NodeUpdate::Reset);
        let node = store.node("g").unwrap();
        assert_eq!(node.state, ExecutionState::idle());
        assert!(node.output.is_none());
    }

    #[test]
    fn test_streaming_keeps_running_state() {
        let store = store();
        store.update_node("t", NodeUpdate::Running);
        store.update_node(
            "t",
            NodeUpdate::Streaming {
                text: "A flu".to_string(),
            },
        );

        let node = store.node("t").unwrap();
        assert_eq!(node.state.status, ExecutionStatus::Running);
        assert_eq!(node.output.unwrap().as_text(), Some("A flu"));
        assert!(store.node("t").unwrap().completed_output().is_none());
    }

    #[test]
    fn test_failure_discards_partial_text() {
        let store = store();
        store.update_node("t", NodeUpdate::Running);
        store.update_node(
            "t",
            NodeUpdate::Streaming {
                text: "A flu".to_string(),
            },
        );
        store.update_node(
            "t",
            NodeUpdate::Failed {
                error: "stream broke".to_string(),
            },
        );

        let node = store.node("t").unwrap();
        assert_eq!(node.state, ExecutionState::failed("stream broke"));
        assert!(node.output.is_none());
        assert!(store.outputs().is_empty());
    }

    #[test]
    fn test_connect_is_validated() {
        let store = store();
        let edge = |id: &str, handle: &str| GraphEdge {
            id: id.to_string(),
            source: "t".to_string(),
            source_handle: "text".to_string(),
            target: "g".to_string(),
            target_handle: handle.to_string(),
        };

        store.connect(edge("e1", "prompt")).unwrap();
        assert!(store.connect(edge("e2", "prompt")).is_err());
        assert!(store.connect(edge("e3", "video-in")).is_err());
        assert_eq!(store.snapshot().edges.len(), 1);
    }

    #[test]
    fn test_unknown_node_update_ignored() {
        let store = store();
        store.update_node("missing", NodeUpdate::Running);
        assert!(!store.edit_node("missing", |_| {}));
        assert_eq!(store.snapshot().nodes.len(), 2);
    }
}
