//! Mutator-side pointer writes and the Dijkstra insertion barrier.
//!
//! Every child-slot write from a mutator goes through [`Graph::set_child`] or
//! [`Graph::allocate_child`]. Both run under the free-list lock, the same
//! lock the collector holds while it shades a grey node's children and turns
//! it black, so the barrier's color check and the pointer store form one
//! step from the collector's point of view:
//!
//! - **Marking**: a new child of a black parent is shaded before the slot is
//!   written, so a black node never points at a white one.
//! - **Reclaiming**: a white node the reclaim pass has not reached yet was
//!   unmarked at quiescence and is about to be released; linking it is
//!   refused with `NotReachable`.
//! - **Idle**: no barrier.

use crate::arena::Node;
use crate::free_list::FreeListGuard;
use crate::graph::{Graph, FREE_ROOT};
use core_types::{Color, GcError, GcPhase, GcResult, NodeId, Side};

impl Graph {
    /// Rewrites one child slot of a live node.
    ///
    /// `child` may be `NIL` to clear the slot. Fails with `NotReachable` if
    /// the parent or the child is not part of the live graph, with
    /// `ReservedNode` if the parent is `NIL` or the free-list root (or the
    /// child is the free-list root), and with `OutOfRange` for ids outside the
    /// arena.
    ///
    /// # Examples
    ///
    /// ```
    /// use memory_manager::Graph;
    /// use core_types::{NodeId, Side};
    ///
    /// let graph = Graph::new(8).unwrap();
    /// let node = graph.allocate().unwrap();
    /// graph.set_child(NodeId::new(1), Side::Left, node).unwrap();
    /// assert_eq!(graph.get(NodeId::new(1)).unwrap().left, node);
    /// ```
    pub fn set_child(&self, parent: NodeId, side: Side, child: NodeId) -> GcResult<()> {
        self.check_mutable(parent)?;
        self.arena().check(child)?;
        if child == FREE_ROOT {
            return Err(GcError::ReservedNode(child));
        }

        let guard = self.lock();
        self.link(parent, side, child, &guard)
    }

    /// Allocates a node and links it into `parent`'s `side` slot in one step.
    ///
    /// Fails with `NotReachable` if the parent is not live (nothing is
    /// allocated in that case) and with `OutOfMemory` if the free list is
    /// empty.
    pub fn allocate_child(&self, parent: NodeId, side: Side) -> GcResult<NodeId> {
        self.check_mutable(parent)?;

        let (id, live) = {
            let guard = self.lock();
            self.check_live(self.node(parent), &guard)?;
            let id = self.pop_free(&guard)?;
            self.link(parent, side, id, &guard)?;
            (id, self.live_count())
        };
        self.telemetry().live_nodes(live);
        tracing::trace!(%parent, %side, %id, "allocated child");
        Ok(id)
    }

    /// Moves a node from WHITE to GREY.
    ///
    /// Returns true if the node was white; GREY and BLACK nodes are left
    /// unchanged.
    pub fn shade(&self, id: NodeId) -> GcResult<bool> {
        let node = self.arena().get(id)?;
        let _guard = self.lock();
        Ok(self.shade_node(node))
    }

    /// Applies the insertion barrier for a pointer from `parent` to `child`.
    ///
    /// Must run before the pointer store, with the free-list lock held.
    pub(crate) fn write_barrier(&self, parent: &Node, child: NodeId) {
        if child.is_nil() {
            return;
        }
        if self.phase() == GcPhase::Marking && parent.color() == Color::Black {
            let shaded = self.shade_node(self.node(child));
            if shaded {
                tracing::trace!(parent = %parent.id(), %child, "write barrier shaded child");
            }
        }
    }

    fn link(
        &self,
        parent: NodeId,
        side: Side,
        child: NodeId,
        guard: &FreeListGuard<'_>,
    ) -> GcResult<()> {
        let parent = self.node(parent);
        self.check_live(parent, guard)?;
        if !child.is_nil() {
            self.check_live(self.node(child), guard)?;
        }

        self.write_barrier(parent, child);
        parent.set_child(side, child);
        Ok(())
    }

    fn check_live(&self, node: &Node, guard: &FreeListGuard<'_>) -> GcResult<()> {
        if !node.is_reachable() || self.is_condemned(node, guard) {
            return Err(GcError::NotReachable(node.id()));
        }
        Ok(())
    }

    fn check_mutable(&self, parent: NodeId) -> GcResult<()> {
        self.arena().check(parent)?;
        if parent.is_nil() || parent == FREE_ROOT {
            return Err(GcError::ReservedNode(parent));
        }
        Ok(())
    }
}
