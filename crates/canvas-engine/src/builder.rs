//! Fluent builder for workflow graphs
//!
//! Provides a compact API for constructing graphs programmatically,
//! mostly for hosts that assemble workflows outside the canvas and for tests.

use crate::output::NodeOutput;
use crate::state::ExecutionState;
use crate::types::{GraphEdge, GraphNode, NodeSettings, WorkflowGraph};
use crate::validation::{check_connection, ConnectionError};

/// Fluent builder for constructing workflow graphs
///
/// # Example
///
/// ```ignore
/// let graph = WorkflowBuilder::new()
///     .add_node("prompt", NodeSettings::Text(TextSettings { text: "A cat".into() }))
///     .add_node("gen", NodeSettings::ImageGenerator(Default::default()))
///     .add_edge("prompt", "text", "gen", "prompt")
///     .build();
/// ```
#[derive(Default)]
pub struct WorkflowBuilder {
    nodes: Vec<GraphNode>,
    edges: Vec<GraphEdge>,
    edge_counter: usize,
}

impl WorkflowBuilder {
    /// Create a new workflow builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an idle node to the graph
    pub fn add_node(mut self, id: impl Into<String>, settings: NodeSettings) -> Self {
        self.nodes.push(GraphNode::new(id, settings));
        self
    }

    /// Mark the most recently added node as completed with `output`
    ///
    /// Must be called immediately after `add_node`.
    pub fn with_output(mut self, output: NodeOutput) -> Self {
        if let Some(node) = self.nodes.last_mut() {
            node.state = ExecutionState::completed();
            node.output = Some(output);
        }
        self
    }

    /// Add an edge between two nodes (auto-generates edge ID)
    ///
    /// The edge is not validated; use [`WorkflowBuilder::connect`] for that.
    pub fn add_edge(
        mut self,
        source: impl Into<String>,
        source_handle: impl Into<String>,
        target: impl Into<String>,
        target_handle: impl Into<String>,
    ) -> Self {
        let edge = self.next_edge(source, source_handle, target, target_handle);
        self.edges.push(edge);
        self
    }

    /// Add an edge only if the connection validator accepts it
    pub fn connect(
        mut self,
        source: impl Into<String>,
        source_handle: impl Into<String>,
        target: impl Into<String>,
        target_handle: impl Into<String>,
    ) -> Result<Self, ConnectionError> {
        let edge = self.next_edge(source, source_handle, target, target_handle);
        check_connection(&edge, &self.edges, &self.nodes)?;
        self.edges.push(edge);
        Ok(self)
    }

    fn next_edge(
        &mut self,
        source: impl Into<String>,
        source_handle: impl Into<String>,
        target: impl Into<String>,
        target_handle: impl Into<String>,
    ) -> GraphEdge {
        self.edge_counter += 1;
        GraphEdge {
            id: format!("edge-{}", self.edge_counter),
            source: source.into(),
            source_handle: source_handle.into(),
            target: target.into(),
            target_handle: target_handle.into(),
        }
    }

    /// Build the graph
    pub fn build(self) -> WorkflowGraph {
        WorkflowGraph {
            nodes: self.nodes,
            edges: self.edges,
        }
    }
}
