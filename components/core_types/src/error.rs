//! Collector error types.
//!
//! `OutOfRange`, `InvalidCapacity` and `InvariantViolation` point at a caller
//! or implementation bug. `OutOfMemory` and `NotReachable` are recoverable by
//! the mutator.

use crate::NodeId;
use thiserror::Error;

/// Errors reported by the arena, the allocator and the mutator interface.
///
/// # Examples
///
/// ```
/// use core_types::{GcError, NodeId};
///
/// let err = GcError::NotReachable(NodeId::new(9));
/// assert!(err.is_recoverable());
/// assert!(!GcError::InvalidCapacity(2).is_recoverable());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GcError {
    /// A node id at or beyond the arena capacity
    #[error("node {id} is out of range for an arena of {capacity} nodes")]
    OutOfRange {
        /// The offending id
        id: NodeId,
        /// Arena capacity
        capacity: usize,
    },

    /// The free list is exhausted
    #[error("out of memory: the free list is empty")]
    OutOfMemory,

    /// The node is on the free list (collected or never allocated)
    #[error("node {0} is not part of the live graph")]
    NotReachable(NodeId),

    /// The arena is too small to hold `NIL` and the three roots
    #[error("invalid capacity {0}: an arena needs at least 4 nodes")]
    InvalidCapacity(usize),

    /// `release` precondition failed (node is a root or not white)
    #[error("node {id} cannot be released: {reason}")]
    NotReleasable {
        /// The node passed to `release`
        id: NodeId,
        /// Which precondition failed
        reason: &'static str,
    },

    /// `NIL` or the free-list root used where a mutator node is required
    #[error("node {0} is reserved and cannot be rewritten by a mutator")]
    ReservedNode(NodeId),

    /// A structural invariant was found broken by the checker
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    /// A second collector was attached to a graph that already has one
    #[error("graph already has a collector attached")]
    CollectorAttached,

    /// The background collector thread could not be started
    #[error("failed to spawn collector thread: {0}")]
    Spawn(String),
}

impl GcError {
    /// Returns true if the mutator can retry or recover from this error.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, GcError::OutOfMemory | GcError::NotReachable(_))
    }
}

/// Result alias used across the collector components.
pub type GcResult<T> = Result<T, GcError>;
