//! The shared node graph: arena, roots, free list and collector state.
//!
//! Layout of a freshly built graph of capacity `N`:
//!
//! ```text
//! 0      NIL (children point to itself, permanently black)
//! 1, 2   mutator roots
//! 3      free-list root; its right chain enumerates the free nodes
//! 4..N   free nodes, linked 3 -> 4 -> 5 -> ... -> N-1 -> NIL
//! ```
//!
//! The free-list root is also a marking root, so free nodes are traced along
//! with the live graph; `reachable` tells the two populations apart.

use crate::arena::{Arena, Node, NodeSnapshot};
use crate::free_list::{FreeList, FreeListGuard};
use crate::telemetry::{NullTelemetry, TelemetrySink};
use core_types::{Color, GcError, GcPhase, GcResult, NodeId, Side};
use crossbeam::atomic::AtomicCell;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

/// The mutator roots plus the free-list root, in marking order.
pub const ROOTS: [NodeId; 3] = [NodeId::new(1), NodeId::new(2), NodeId::new(3)];

/// The root whose right chain is the free list.
pub const FREE_ROOT: NodeId = NodeId::new(3);

/// Smallest arena that can hold `NIL` and the three roots.
pub const MIN_CAPACITY: usize = 4;

/// A fixed-capacity graph of binary-tree nodes shared by one collector and
/// any number of mutators.
///
/// # Examples
///
/// ```
/// use memory_manager::Graph;
/// use core_types::NodeId;
///
/// let graph = Graph::new(8).unwrap();
/// assert_eq!(graph.free_list_ids(), vec![4, 5, 6, 7].into_iter().map(NodeId::new).collect::<Vec<_>>());
/// assert_eq!(graph.allocate().unwrap(), NodeId::new(4));
/// assert_eq!(graph.allocate().unwrap(), NodeId::new(5));
/// ```
pub struct Graph {
    arena: Arena,
    free_list: FreeList,
    phase: AtomicCell<GcPhase>,
    /// Exact number of grey nodes; changed only through `shade_node`,
    /// `blacken_node` and `whiten_node`.
    grey: AtomicUsize,
    /// First arena index the reclaim pass has not visited yet.
    reclaim_cursor: AtomicUsize,
    /// Number of cycles started on this graph, by any collector.
    cycles_started: AtomicU64,
    collector_attached: AtomicBool,
    telemetry: Arc<dyn TelemetrySink>,
}

impl Graph {
    /// Builds a graph of `capacity` nodes with telemetry discarded.
    pub fn new(capacity: usize) -> GcResult<Self> {
        Self::with_telemetry(capacity, Arc::new(NullTelemetry))
    }

    /// Builds a graph of `capacity` nodes reporting to `telemetry`.
    ///
    /// Fails with `InvalidCapacity` if `capacity < 4`.
    pub fn with_telemetry(capacity: usize, telemetry: Arc<dyn TelemetrySink>) -> GcResult<Self> {
        if capacity < MIN_CAPACITY {
            return Err(GcError::InvalidCapacity(capacity));
        }

        let successor = |index: usize| {
            if index + 1 < capacity {
                NodeId::new(index + 1)
            } else {
                NodeId::NIL
            }
        };

        let mut nodes = Vec::with_capacity(capacity);
        nodes.push(Node::new(
            NodeId::NIL,
            NodeId::NIL,
            NodeId::NIL,
            Color::Black,
            true,
        ));
        for index in 1..capacity {
            let id = NodeId::new(index);
            let is_root = index < MIN_CAPACITY;
            let right = if is_root && id != FREE_ROOT {
                NodeId::NIL
            } else {
                successor(index)
            };
            nodes.push(Node::new(id, NodeId::NIL, right, Color::White, is_root));
        }

        tracing::debug!(capacity, free = capacity - MIN_CAPACITY, "graph created");

        Ok(Graph {
            arena: Arena::from_nodes(nodes),
            free_list: FreeList::new(FREE_ROOT, capacity - MIN_CAPACITY),
            phase: AtomicCell::new(GcPhase::Idle),
            grey: AtomicUsize::new(0),
            reclaim_cursor: AtomicUsize::new(capacity),
            cycles_started: AtomicU64::new(0),
            collector_attached: AtomicBool::new(false),
            telemetry,
        })
    }

    /// Returns the number of arena nodes, `NIL` included.
    pub fn capacity(&self) -> usize {
        self.arena.capacity()
    }

    /// Returns the root set; the last entry is the free-list root.
    pub fn roots(&self) -> &'static [NodeId] {
        &ROOTS
    }

    /// Returns true for the three roots.
    pub fn is_root(&self, id: NodeId) -> bool {
        ROOTS.contains(&id)
    }

    /// Returns a snapshot of the node; fails with `OutOfRange` if `id >= capacity`.
    pub fn get(&self, id: NodeId) -> GcResult<NodeSnapshot> {
        self.arena.get(id).map(Node::snapshot)
    }

    /// Read-only access to the arena.
    pub fn arena(&self) -> &Arena {
        &self.arena
    }

    /// Returns the phase of the current collection cycle.
    pub fn phase(&self) -> GcPhase {
        self.phase.load()
    }

    /// Returns the number of nodes on the free list.
    pub fn free_count(&self) -> usize {
        self.free_list.len()
    }

    /// Returns the number of live nodes, the roots included and `NIL` excluded.
    pub fn live_count(&self) -> usize {
        self.capacity() - 1 - self.free_count()
    }

    /// Returns true if at least `required` nodes can be allocated right now.
    pub fn ensure_free(&self, required: usize) -> bool {
        self.free_count() >= required
    }

    /// Returns the number of the most recently started collection cycle.
    pub fn cycles_started(&self) -> u64 {
        self.cycles_started.load(Ordering::Acquire)
    }

    /// Returns the current number of grey nodes.
    pub fn grey_count(&self) -> usize {
        self.grey.load(Ordering::Acquire)
    }

    /// Pops a node off the free list.
    ///
    /// The node comes back live, with `NIL` children and colored white; while
    /// a cycle is in progress it is shaded right away so the running cycle
    /// cannot reclaim it before the mutator links it in. A node returned here
    /// is not referenced by anything: it must be attached before the next
    /// quiescence or it is garbage again. Prefer
    /// [`allocate_child`](Graph::allocate_child), which attaches atomically.
    ///
    /// Fails with `OutOfMemory` when the free list is empty.
    pub fn allocate(&self) -> GcResult<NodeId> {
        let (id, live) = {
            let guard = self.free_list.lock();
            let id = self.pop_free(&guard)?;
            (id, self.live_count())
        };
        self.telemetry.live_nodes(live);
        Ok(id)
    }

    /// Pushes a live, white, non-root node onto the free list.
    ///
    /// Fails with `NotReleasable` for `NIL`, a root or a node that is not
    /// white, and with `NotReachable` if the node is already free.
    pub fn release(&self, id: NodeId) -> GcResult<()> {
        self.arena.check(id)?;
        if id.is_nil() {
            return Err(GcError::NotReleasable {
                id,
                reason: "node is NIL",
            });
        }
        if self.is_root(id) {
            return Err(GcError::NotReleasable {
                id,
                reason: "node is a root",
            });
        }

        let live = {
            let guard = self.free_list.lock();
            let node = self.arena.node(id);
            if !node.is_reachable() {
                return Err(GcError::NotReachable(id));
            }
            if node.color() != Color::White {
                return Err(GcError::NotReleasable {
                    id,
                    reason: "node is not white",
                });
            }
            self.free_list.push(&self.arena, node, &guard, |head, pushed| {
                self.write_barrier(head, pushed)
            });
            self.live_count()
        };
        self.telemetry.live_nodes(live);
        Ok(())
    }

    /// Lists the free chain in allocation order.
    ///
    /// Holds the free-list lock for the whole walk; meant for diagnostics.
    pub fn free_list_ids(&self) -> Vec<NodeId> {
        let guard = self.free_list.lock();
        self.free_list.walk(&self.arena, &guard)
    }

    /// Returns true if `id` is currently on the free chain.
    pub fn is_on_free_list(&self, id: NodeId) -> bool {
        self.free_list_ids().contains(&id)
    }

    /// Returns every edge from a black node to a white node.
    ///
    /// Empty at the end of every sweep; `NIL` children are ignored.
    pub fn black_to_white_edges(&self) -> Vec<(NodeId, NodeId)> {
        let _guard = self.free_list.lock();
        let mut edges = Vec::new();
        for node in self.arena.iter().skip(1) {
            if node.color() != Color::Black {
                continue;
            }
            for side in Side::BOTH {
                let child = node.child(side);
                if !child.is_nil() && self.arena.node(child).color() == Color::White {
                    edges.push((node.id(), child));
                }
            }
        }
        edges
    }

    /// Verifies the structural invariants of the graph.
    ///
    /// Checks arena closure, the shape of `NIL`, free-list exclusivity (every
    /// node is live xor on the chain), the free counter, and that no live
    /// node points at a free node. Garbage still waiting for the running
    /// reclaim pass is exempt from the last check. Holds the free-list lock for a full arena
    /// walk, so call it at quiet points rather than on a hot path.
    pub fn check_invariants(&self) -> GcResult<()> {
        let guard = self.free_list.lock();
        let capacity = self.capacity();
        let violation = |msg: String| Err(GcError::InvariantViolation(msg));

        let nil = self.arena.node(NodeId::NIL);
        if nil.children() != (NodeId::NIL, NodeId::NIL) || nil.color() != Color::Black {
            return violation(format!("NIL was modified: {:?}", nil.snapshot()));
        }

        for node in self.arena.iter() {
            for side in Side::BOTH {
                let child = node.child(side);
                if child.index() >= capacity {
                    return violation(format!(
                        "node {} {side} child {child} escapes the arena",
                        node.id()
                    ));
                }
            }
        }

        let chain = self.free_list.walk(&self.arena, &guard);
        if chain.len() > capacity {
            return violation("free list is cyclic".to_string());
        }
        if chain.len() != self.free_list.len() {
            return violation(format!(
                "free counter says {} but the chain holds {}",
                self.free_list.len(),
                chain.len()
            ));
        }

        let mut on_chain = vec![false; capacity];
        for id in &chain {
            if on_chain[id.index()] {
                return violation(format!("node {id} appears twice on the free list"));
            }
            on_chain[id.index()] = true;
        }

        for node in self.arena.iter().skip(1) {
            let id = node.id();
            let reachable = node.is_reachable();
            if reachable == on_chain[id.index()] {
                return violation(format!(
                    "node {id} has reachable={reachable} but on_free_list={}",
                    on_chain[id.index()]
                ));
            }
            // condemned nodes may already point at reclaimed garbage
            if !reachable || id == FREE_ROOT || self.is_condemned(node, &guard) {
                continue;
            }
            for side in Side::BOTH {
                let child = node.child(side);
                if !child.is_nil() && !self.arena.node(child).is_reachable() {
                    return violation(format!(
                        "live node {id} {side} child {child} is on the free list"
                    ));
                }
            }
        }

        Ok(())
    }

    /// Claims the single collector slot of this graph.
    pub(crate) fn attach_collector(&self) -> GcResult<()> {
        if self.collector_attached.swap(true, Ordering::AcqRel) {
            return Err(GcError::CollectorAttached);
        }
        Ok(())
    }

    pub(crate) fn detach_collector(&self) {
        self.collector_attached.store(false, Ordering::Release);
    }

    pub(crate) fn lock(&self) -> FreeListGuard<'_> {
        self.free_list.lock()
    }

    pub(crate) fn node(&self, id: NodeId) -> &Node {
        self.arena.node(id)
    }

    pub(crate) fn telemetry(&self) -> &dyn TelemetrySink {
        self.telemetry.as_ref()
    }

    pub(crate) fn set_phase(&self, phase: GcPhase, _guard: &FreeListGuard<'_>) {
        self.phase.store(phase);
    }

    /// Numbers a new cycle and enters the marking phase.
    pub(crate) fn begin_cycle(&self, guard: &FreeListGuard<'_>) -> u64 {
        self.set_phase(GcPhase::Marking, guard);
        self.cycles_started.fetch_add(1, Ordering::AcqRel) + 1
    }

    pub(crate) fn set_reclaim_cursor(&self, index: usize, _guard: &FreeListGuard<'_>) {
        self.reclaim_cursor.store(index, Ordering::Release);
    }

    /// Drops the marks of an unfinished cycle and returns the graph to idle.
    ///
    /// Every node except `NIL` goes back to white, so the next cycle marks
    /// from scratch. Unreclaimed garbage simply waits for that cycle.
    pub(crate) fn abandon_cycle(&self, guard: &FreeListGuard<'_>) {
        if !self.phase().is_active() {
            return;
        }
        for node in self.arena.iter() {
            self.whiten_node(node);
        }
        self.set_reclaim_cursor(self.capacity(), guard);
        self.set_phase(GcPhase::Idle, guard);
        tracing::debug!(cycle = self.cycles_started(), "collection cycle abandoned");
    }

    /// WHITE -> GREY. Returns true if this call did the transition.
    pub(crate) fn shade_node(&self, node: &Node) -> bool {
        let shaded = node
            .color_cell()
            .compare_exchange(Color::White, Color::Grey, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if shaded {
            self.grey.fetch_add(1, Ordering::AcqRel);
        }
        shaded
    }

    /// GREY -> BLACK. Returns true if this call did the transition.
    pub(crate) fn blacken_node(&self, node: &Node) -> bool {
        let blackened = node
            .color_cell()
            .compare_exchange(Color::Grey, Color::Black, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if blackened {
            self.grey.fetch_sub(1, Ordering::AcqRel);
        }
        blackened
    }

    /// Resets a node to WHITE. `NIL` stays black.
    pub(crate) fn whiten_node(&self, node: &Node) {
        if node.id().is_nil() {
            return;
        }
        if node.color_cell().swap(Color::White, Ordering::AcqRel) == Color::Grey {
            self.grey.fetch_sub(1, Ordering::AcqRel);
        }
    }

    /// True for a white node the running reclaim pass has yet to visit: it
    /// was unmarked at quiescence and is about to be released.
    pub(crate) fn is_condemned(&self, node: &Node, _guard: &FreeListGuard<'_>) -> bool {
        self.phase() == GcPhase::Reclaiming
            && node.id().index() >= self.reclaim_cursor.load(Ordering::Acquire)
            && node.color() == Color::White
    }

    /// Pops a free node and prepares it for the mutator.
    pub(crate) fn pop_free(&self, guard: &FreeListGuard<'_>) -> GcResult<NodeId> {
        let id = self
            .free_list
            .pop(&self.arena, guard, |head, next| self.write_barrier(head, next))
            .ok_or(GcError::OutOfMemory)?;

        let node = self.arena.node(id);
        node.set_child(Side::Left, NodeId::NIL);
        node.set_child(Side::Right, NodeId::NIL);
        node.set_reachable(true);
        self.whiten_node(node);
        self.protect_fresh(node, guard);
        Ok(id)
    }

    /// Keeps a freshly allocated node out of the cycle in progress.
    fn protect_fresh(&self, node: &Node, guard: &FreeListGuard<'_>) {
        match self.phase() {
            GcPhase::Idle => {}
            GcPhase::Marking => {
                self.shade_node(node);
            }
            GcPhase::Reclaiming => {
                if self.is_condemned(node, guard) {
                    self.shade_node(node);
                }
            }
        }
    }

    /// Releases a node found white during the reclaim pass.
    pub(crate) fn reclaim_node(&self, node: &Node, guard: &FreeListGuard<'_>) {
        self.free_list.push(&self.arena, node, guard, |_, _| {});
    }
}
