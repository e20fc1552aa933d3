//! Fixed-capacity node storage.
//!
//! The arena is carved once at construction and never grows or shrinks.
//! Every field of a [`Node`] is atomic so the collector can read child slots
//! and recolor nodes while mutators run; the setters are crate-private and
//! only reachable through the free list, the write barrier and the collector.

use core_types::{Color, GcError, GcResult, NodeId, Side};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering};

/// Atomic color tag for thread-safe marking.
///
/// Mirrors [`Color`] as a `u8` so that shading can be a single
/// compare-and-exchange.
#[repr(transparent)]
pub struct AtomicColor(AtomicU8);

impl AtomicColor {
    /// Creates a new atomic color with the given initial value.
    pub fn new(color: Color) -> Self {
        AtomicColor(AtomicU8::new(color as u8))
    }

    /// Loads the current color with the specified memory ordering.
    pub fn load(&self, ordering: Ordering) -> Color {
        Self::decode(self.0.load(ordering))
    }

    /// Stores a color with the specified memory ordering.
    pub fn store(&self, color: Color, ordering: Ordering) {
        self.0.store(color as u8, ordering);
    }

    /// Swaps in a new color, returning the previous one.
    pub fn swap(&self, color: Color, ordering: Ordering) -> Color {
        Self::decode(self.0.swap(color as u8, ordering))
    }

    /// Atomically compares and exchanges the color.
    ///
    /// Returns Ok(old) if the exchange succeeded, Err(actual) if it failed.
    pub fn compare_exchange(
        &self,
        current: Color,
        new: Color,
        success: Ordering,
        failure: Ordering,
    ) -> Result<Color, Color> {
        self.0
            .compare_exchange(current as u8, new as u8, success, failure)
            .map(Self::decode)
            .map_err(Self::decode)
    }

    fn decode(raw: u8) -> Color {
        match Color::from_u8(raw) {
            Some(color) => color,
            None => unreachable!("corrupt color tag {raw}"),
        }
    }
}

/// A fixed-size binary tree node.
pub struct Node {
    id: NodeId,
    left: AtomicUsize,
    right: AtomicUsize,
    color: AtomicColor,
    reachable: AtomicBool,
}

impl Node {
    pub(crate) fn new(
        id: NodeId,
        left: NodeId,
        right: NodeId,
        color: Color,
        reachable: bool,
    ) -> Self {
        Node {
            id,
            left: AtomicUsize::new(left.index()),
            right: AtomicUsize::new(right.index()),
            color: AtomicColor::new(color),
            reachable: AtomicBool::new(reachable),
        }
    }

    /// Returns this node's id.
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Reads one child slot.
    pub fn child(&self, side: Side) -> NodeId {
        let slot = match side {
            Side::Left => &self.left,
            Side::Right => &self.right,
        };
        NodeId::new(slot.load(Ordering::Acquire))
    }

    /// Reads both child slots, left first.
    pub fn children(&self) -> (NodeId, NodeId) {
        (self.child(Side::Left), self.child(Side::Right))
    }

    /// Returns the current color tag.
    pub fn color(&self) -> Color {
        self.color.load(Ordering::Acquire)
    }

    /// Returns true if the node is live, false if it sits on the free list.
    pub fn is_reachable(&self) -> bool {
        self.reachable.load(Ordering::Acquire)
    }

    /// Copies the node's current state.
    pub fn snapshot(&self) -> NodeSnapshot {
        NodeSnapshot {
            id: self.id,
            left: self.child(Side::Left),
            right: self.child(Side::Right),
            color: self.color(),
            reachable: self.is_reachable(),
        }
    }

    pub(crate) fn set_child(&self, side: Side, child: NodeId) {
        let slot = match side {
            Side::Left => &self.left,
            Side::Right => &self.right,
        };
        slot.store(child.index(), Ordering::Release);
    }

    pub(crate) fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::Release);
    }

    pub(crate) fn color_cell(&self) -> &AtomicColor {
        &self.color
    }
}

impl std::fmt::Debug for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Debug::fmt(&self.snapshot(), f)
    }
}

/// Point-in-time copy of a node's fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct NodeSnapshot {
    /// Node identity
    pub id: NodeId,
    /// Left child (`NIL` if empty)
    pub left: NodeId,
    /// Right child (`NIL` if empty); the free-list link for free nodes
    pub right: NodeId,
    /// Color tag at the time of the snapshot
    pub color: Color,
    /// Live (true) or on the free list (false)
    pub reachable: bool,
}

impl NodeSnapshot {
    /// Returns the child in the given slot.
    pub fn child(&self, side: Side) -> NodeId {
        match side {
            Side::Left => self.left,
            Side::Right => self.right,
        }
    }
}

/// Preallocated, indexable store of nodes.
pub struct Arena {
    nodes: Box<[Node]>,
}

impl Arena {
    pub(crate) fn from_nodes(nodes: Vec<Node>) -> Self {
        debug_assert!(nodes.iter().enumerate().all(|(i, n)| n.id.index() == i));
        Arena {
            nodes: nodes.into_boxed_slice(),
        }
    }

    /// Returns the number of nodes, `NIL` included.
    pub fn capacity(&self) -> usize {
        self.nodes.len()
    }

    /// Bounds-checked access to a node.
    pub fn get(&self, id: NodeId) -> GcResult<&Node> {
        self.nodes.get(id.index()).ok_or(GcError::OutOfRange {
            id,
            capacity: self.nodes.len(),
        })
    }

    /// Fails with `OutOfRange` unless `id` names an arena node.
    pub fn check(&self, id: NodeId) -> GcResult<()> {
        self.get(id).map(|_| ())
    }

    /// Iterates all nodes in index order.
    pub fn iter(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter()
    }

    /// Unchecked-by-result access for ids read out of the arena itself.
    ///
    /// An out-of-range id here means a child slot was corrupted, which is
    /// fatal.
    pub(crate) fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }
}
