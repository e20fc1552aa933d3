//! Mutator handle.
//!
//! A [`Mutator`] is what an application thread holds: the shared graph plus,
//! optionally, a handle to the background collector it can lean on when the
//! free list runs dry.

use crate::concurrent_gc::CollectorHandle;
use crate::graph::Graph;
use core_types::{GcError, GcResult, NodeId, Side};
use std::sync::Arc;
use std::time::Duration;

/// Default bound on the out-of-memory wait.
pub const DEFAULT_OOM_WAIT: Duration = Duration::from_millis(100);

/// One mutator thread's view of the graph.
#[derive(Clone)]
pub struct Mutator {
    graph: Arc<Graph>,
    collector: Option<CollectorHandle>,
    oom_wait: Duration,
}

impl Mutator {
    /// A mutator with no collector to fall back on.
    pub fn new(graph: Arc<Graph>) -> Self {
        Mutator {
            graph,
            collector: None,
            oom_wait: DEFAULT_OOM_WAIT,
        }
    }

    /// A mutator that asks `collector` for a cycle when memory runs out.
    pub fn with_collector(collector: CollectorHandle, oom_wait: Duration) -> Self {
        Mutator {
            graph: collector.graph().clone(),
            collector: Some(collector),
            oom_wait,
        }
    }

    /// The shared graph.
    pub fn graph(&self) -> &Arc<Graph> {
        &self.graph
    }

    /// See [`Graph::set_child`].
    pub fn set_child(&self, parent: NodeId, side: Side, child: NodeId) -> GcResult<()> {
        self.graph.set_child(parent, side, child)
    }

    /// See [`Graph::allocate_child`].
    pub fn allocate_child(&self, parent: NodeId, side: Side) -> GcResult<NodeId> {
        self.graph.allocate_child(parent, side)
    }

    /// See [`Graph::shade`].
    pub fn shade(&self, id: NodeId) -> GcResult<bool> {
        self.graph.shade(id)
    }

    /// Like [`allocate_child`](Self::allocate_child), but on `OutOfMemory`
    /// requests a collection, waits for it and retries once.
    ///
    /// Without a background collector the error is returned unchanged.
    pub fn allocate_child_or_collect(&self, parent: NodeId, side: Side) -> GcResult<NodeId> {
        match self.graph.allocate_child(parent, side) {
            Err(GcError::OutOfMemory) => {}
            result => return result,
        }

        let Some(collector) = &self.collector else {
            return Err(GcError::OutOfMemory);
        };

        tracing::warn!(
            %parent,
            wait_ms = self.oom_wait.as_millis() as u64,
            "free list exhausted, waiting for a collection"
        );
        if !collector.request_and_wait(self.oom_wait) {
            tracing::debug!("no collection completed within the wait bound");
        }
        self.graph.allocate_child(parent, side)
    }
}
