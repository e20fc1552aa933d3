//! Integration test suite for the Dijkstra collector
//!
//! This crate provides integration tests that verify the graph, the
//! collector and the simulation driver work together across component
//! boundaries.

use core_types::NodeId;
use memory_manager::Graph;
use std::collections::BTreeSet;

/// Re-export components for test convenience
pub mod components {
    pub use core_types;
    pub use gc_cli;
    pub use memory_manager;
}

/// Nodes reachable from the mutator roots 1 and 2, roots included.
///
/// Reads snapshots one node at a time, so the result is only exact while no
/// other thread mutates the part of the graph being walked.
pub fn reachable_from_roots(graph: &Graph) -> BTreeSet<NodeId> {
    let mut seen = BTreeSet::new();
    let mut stack = vec![NodeId::new(1), NodeId::new(2)];
    while let Some(id) = stack.pop() {
        if id.is_nil() || !seen.insert(id) {
            continue;
        }
        if let Ok(node) = graph.get(id) {
            stack.push(node.left);
            stack.push(node.right);
        }
    }
    seen
}
