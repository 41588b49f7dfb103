//! Run scope resolution
//!
//! Breadth-first walks over the dependency graph: upstream to find what a
//! targeted run needs, downstream to find what a re-run invalidates.

use std::collections::{HashSet, VecDeque};

use crate::graph::DependencyGraph;
use crate::types::NodeId;

/// The target and every executable ancestor of it
///
/// Returns an empty set if the target is not part of the graph.
pub fn upstream_scope(graph: &DependencyGraph, target: &str) -> HashSet<NodeId> {
    walk(graph, [target], DependencyGraph::dependencies)
}

/// The seeds and every executable descendant of them
///
/// Seeds that are not part of the graph are ignored.
pub fn downstream_scope<'a>(
    graph: &DependencyGraph,
    seeds: impl IntoIterator<Item = &'a str>,
) -> HashSet<NodeId> {
    walk(graph, seeds, DependencyGraph::dependents)
}

fn walk<'a, F>(
    graph: &DependencyGraph,
    seeds: impl IntoIterator<Item = &'a str>,
    next: F,
) -> HashSet<NodeId>
where
    F: for<'g> Fn(&'g DependencyGraph, &str) -> &'g [NodeId],
{
    let mut visited: HashSet<NodeId> = HashSet::new();
    let mut queue: VecDeque<NodeId> = VecDeque::new();

    for seed in seeds {
        if graph.contains(seed) && visited.insert(seed.to_string()) {
            queue.push_back(seed.to_string());
        }
    }

    while let Some(node_id) = queue.pop_front() {
        for neighbor in next(graph, &node_id) {
            if visited.insert(neighbor.clone()) {
                queue.push_back(neighbor.clone());
            }
        }
    }

    visited
}
