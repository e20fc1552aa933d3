//! Free-list allocator over the node arena.
//!
//! Unused nodes form a singly-linked chain through their `right` slot,
//! starting at the free-list root and terminated by `NIL`. The chain head is
//! the only resource shared by every actor, so it is guarded by one narrow
//! lock. The same lock is borrowed by the write barrier and by the
//! collector's grey-to-black step; whoever holds it only performs O(1)
//! pointer and color updates.

use crate::arena::{Arena, Node};
use core_types::{NodeId, Side};
use parking_lot::{Mutex, MutexGuard};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Proof that the free-list lock is held.
pub type FreeListGuard<'a> = MutexGuard<'a, ()>;

/// Head of the free chain plus its lock and length.
pub struct FreeList {
    root: NodeId,
    lock: Mutex<()>,
    free: AtomicUsize,
}

impl FreeList {
    pub(crate) fn new(root: NodeId, free: usize) -> Self {
        FreeList {
            root,
            lock: Mutex::new(()),
            free: AtomicUsize::new(free),
        }
    }

    /// The sentinel node whose `right` slot heads the chain.
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Number of nodes currently on the chain.
    pub fn len(&self) -> usize {
        self.free.load(Ordering::Acquire)
    }

    /// Returns true if the chain holds no nodes.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Acquires the narrow critical section.
    pub fn lock(&self) -> FreeListGuard<'_> {
        self.lock.lock()
    }

    /// Pops the first free node.
    ///
    /// `before_link(head, next)` runs just before `head.right` is rewritten to
    /// `next`, giving the caller a chance to apply the write barrier. The
    /// popped node's slots are left untouched.
    pub(crate) fn pop<F>(
        &self,
        arena: &Arena,
        _guard: &FreeListGuard<'_>,
        before_link: F,
    ) -> Option<NodeId>
    where
        F: FnOnce(&Node, NodeId),
    {
        let head = arena.node(self.root);
        let first = head.child(Side::Right);
        if first.is_nil() {
            return None;
        }

        let next = arena.node(first).child(Side::Right);
        before_link(head, next);
        head.set_child(Side::Right, next);
        self.free.fetch_sub(1, Ordering::AcqRel);
        Some(first)
    }

    /// Pushes `node` onto the front of the chain and marks it not reachable.
    ///
    /// `before_link(head, node)` runs just before the head starts pointing at
    /// the pushed node.
    pub(crate) fn push<F>(
        &self,
        arena: &Arena,
        node: &Node,
        _guard: &FreeListGuard<'_>,
        before_link: F,
    ) where
        F: FnOnce(&Node, NodeId),
    {
        let head = arena.node(self.root);
        node.set_child(Side::Left, NodeId::NIL);
        node.set_child(Side::Right, head.child(Side::Right));
        node.set_reachable(false);
        before_link(head, node.id());
        head.set_child(Side::Right, node.id());
        self.free.fetch_add(1, Ordering::AcqRel);
    }

    /// Walks the chain and returns its members in order.
    ///
    /// Stops after `arena.capacity()` hops so a corrupted, cyclic chain
    /// cannot hang the caller.
    pub(crate) fn walk(&self, arena: &Arena, _guard: &FreeListGuard<'_>) -> Vec<NodeId> {
        let mut ids = Vec::new();
        let mut cursor = arena.node(self.root).child(Side::Right);
        while !cursor.is_nil() && ids.len() <= arena.capacity() {
            ids.push(cursor);
            cursor = arena.node(cursor).child(Side::Right);
        }
        ids
    }
}
