//! Dependency graph over executable nodes
//!
//! Passive reference nodes feed data into the graph but are never
//! scheduled, so they are left out of the adjacency maps entirely.

use std::collections::{HashMap, HashSet, VecDeque};

use crate::error::{EngineError, Result};
use crate::types::{GraphEdge, GraphNode, NodeId};

/// Adjacency and ordering information for the executable subgraph
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    /// node -> executable nodes it feeds
    dependents: HashMap<NodeId, Vec<NodeId>>,
    /// node -> executable nodes it consumes
    dependencies: HashMap<NodeId, Vec<NodeId>>,
    /// Executable nodes with no executable dependency
    entry_points: Vec<NodeId>,
    /// Topological order of all executable nodes
    execution_order: Vec<NodeId>,
}

impl DependencyGraph {
    /// Build the dependency graph from a node/edge set
    ///
    /// Edges are expected to have passed connection validation; edges
    /// touching unknown or passive nodes are ignored. Returns
    /// `EngineError::CycleDetected` if the executable subgraph is not a DAG.
    pub fn build(nodes: &[GraphNode], edges: &[GraphEdge]) -> Result<Self> {
        let executable: Vec<&NodeId> = nodes
            .iter()
            .filter(|n| n.is_executable())
            .map(|n| &n.id)
            .collect();
        let executable_set: HashSet<&str> = executable.iter().map(|id| id.as_str()).collect();

        let mut dependents: HashMap<NodeId, Vec<NodeId>> = HashMap::new();
        let mut dependencies: HashMap<NodeId, Vec<NodeId>> = HashMap::new();
        for id in &executable {
            dependents.insert((*id).clone(), Vec::new());
            dependencies.insert((*id).clone(), Vec::new());
        }

        for edge in edges {
            if !executable_set.contains(edge.source.as_str())
                || !executable_set.contains(edge.target.as_str())
            {
                continue;
            }
            if let Some(deps) = dependencies.get_mut(&edge.target) {
                if !deps.contains(&edge.source) {
                    deps.push(edge.source.clone());
                }
            }
            if let Some(outs) = dependents.get_mut(&edge.source) {
                if !outs.contains(&edge.target) {
                    outs.push(edge.target.clone());
                }
            }
        }

        let entry_points: Vec<NodeId> = executable
            .iter()
            .filter(|id| dependencies.get(id.as_str()).map_or(true, |d| d.is_empty()))
            .map(|id| (*id).clone())
            .collect();

        let execution_order = topological_order(&executable, &dependencies, &dependents)?;

        log::debug!(
            "Built dependency graph: {} executable nodes, {} entry points",
            executable.len(),
            entry_points.len()
        );

        Ok(Self {
            dependents,
            dependencies,
            entry_points,
            execution_order,
        })
    }

    /// Executable nodes that consume `node_id`'s output
    pub fn dependents(&self, node_id: &str) -> &[NodeId] {
        self.dependents.get(node_id).map(|v| v.as_slice()).unwrap_or(&[])
    }

    /// Executable nodes whose output `node_id` consumes
    pub fn dependencies(&self, node_id: &str) -> &[NodeId] {
        self.dependencies.get(node_id).map(|v| v.as_slice()).unwrap_or(&[])
    }

    /// Executable nodes with no executable dependency
    pub fn entry_points(&self) -> &[NodeId] {
        &self.entry_points
    }

    /// Topological order of the executable nodes
    ///
    /// Only suitable for display and deterministic iteration; scheduling
    /// decisions go through `dependencies`/`dependents`.
    pub fn execution_order(&self) -> &[NodeId] {
        &self.execution_order
    }

    /// Whether `node_id` is an executable node of this graph
    pub fn contains(&self, node_id: &str) -> bool {
        self.dependencies.contains_key(node_id)
    }

    /// Number of executable nodes
    pub fn len(&self) -> usize {
        self.execution_order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.execution_order.is_empty()
    }
}

/// Kahn's algorithm, ties broken by discovery order
fn topological_order(
    nodes: &[&NodeId],
    dependencies: &HashMap<NodeId, Vec<NodeId>>,
    dependents: &HashMap<NodeId, Vec<NodeId>>,
) -> Result<Vec<NodeId>> {
    let mut in_degree: HashMap<&str, usize> = nodes
        .iter()
        .map(|id| (id.as_str(), dependencies.get(id.as_str()).map_or(0, |d| d.len())))
        .collect();

    let mut queue: VecDeque<&str> = nodes
        .iter()
        .map(|id| id.as_str())
        .filter(|id| in_degree.get(id).copied() == Some(0))
        .collect();

    let mut order = Vec::with_capacity(nodes.len());
    while let Some(node_id) = queue.pop_front() {
        order.push(node_id.to_string());
        for next in dependents.get(node_id).into_iter().flatten() {
            if let Some(degree) = in_degree.get_mut(next.as_str()) {
                *degree -= 1;
                if *degree == 0 {
                    queue.push_back(next.as_str());
                }
            }
        }
    }

    if order.len() < nodes.len() {
        let remaining: Vec<NodeId> = nodes
            .iter()
            .filter(|id| in_degree.get(id.as_str()).copied().unwrap_or(0) > 0)
            .map(|id| (*id).clone())
            .collect();
        return Err(EngineError::CycleDetected { nodes: remaining });
    }

    Ok(order)
}
