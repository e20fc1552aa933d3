//! Node identity and child-slot addressing.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable index of a node inside the arena.
///
/// Identifiers are plain indices; they never own the node they name. Index 0
/// is reserved for the shared `NIL` sentinel.
///
/// # Examples
///
/// ```
/// use core_types::NodeId;
///
/// let id = NodeId::from(7usize);
/// assert_eq!(id.index(), 7);
/// assert_eq!(id.to_string(), "7");
/// assert!(!id.is_nil());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(usize);

impl NodeId {
    /// The `NIL` sentinel. Its children point to itself.
    pub const NIL: NodeId = NodeId(0);

    /// Creates an identifier from an arena index.
    pub const fn new(index: usize) -> Self {
        NodeId(index)
    }

    /// Returns the arena index of this node.
    pub const fn index(self) -> usize {
        self.0
    }

    /// Returns true if this is the `NIL` sentinel.
    pub const fn is_nil(self) -> bool {
        self.0 == 0
    }
}

impl From<usize> for NodeId {
    fn from(index: usize) -> Self {
        NodeId(index)
    }
}

impl From<NodeId> for usize {
    fn from(id: NodeId) -> Self {
        id.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One of the two child slots of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    /// The left child slot
    Left,
    /// The right child slot; also the link field of the free list
    Right,
}

impl Side {
    /// Both sides, left first.
    pub const BOTH: [Side; 2] = [Side::Left, Side::Right];

    /// Returns the opposite slot.
    pub fn other(self) -> Side {
        match self {
            Side::Left => Side::Right,
            Side::Right => Side::Left,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Left => write!(f, "left"),
            Side::Right => write!(f, "right"),
        }
    }
}
