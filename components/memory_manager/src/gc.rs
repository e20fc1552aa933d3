//! On-the-fly tri-color mark-and-sweep collector.
//!
//! One collection cycle has three steps:
//!
//! 1. **Root marking**: roots 1, 2 and 3 are shaded grey.
//! 2. **Sweep**: the arena is scanned round-robin. A grey node has both
//!    children shaded and is turned black under the free-list lock, and the
//!    "consecutive clean" counter is reset to the arena size. Any other node
//!    decrements the counter. When the counter reaches zero a whole pass saw
//!    no grey node. Mutators can shade nodes behind the cursor while the pass
//!    runs, so quiescence is only declared if the exact grey count, read
//!    under the lock, is also zero; otherwise the scan keeps circling.
//! 3. **Reclaim**: a linear pass over the arena. White live non-root nodes
//!    are pushed onto the free list; every other node is reset to white for
//!    the next cycle.
//!
//! The collector is driven either one bounded [`step`](Collector::step) at a
//! time (incremental mode) or one full [`run_cycle`](Collector::run_cycle) at
//! a time by the background thread in [`concurrent_gc`](crate::concurrent_gc).

use crate::graph::Graph;
use core_types::{Color, GcPhase, GcResult, NodeId};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Position of the collector inside the current cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CycleState {
    Idle,
    Sweeping { cursor: usize, clean: usize },
    Reclaiming { cursor: usize },
}

/// Summary of one completed cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// 1-based cycle number, counted per graph
    pub cycle: u64,
    /// Grey nodes turned black during the sweep
    pub blackened: usize,
    /// Nodes pushed onto the free list during reclaim
    pub reclaimed: usize,
    /// Full wrap-arounds of the sweep cursor
    pub passes: usize,
    /// Wall time from root marking to the end of reclaim
    pub duration: Duration,
}

/// Statistics accumulated over the collector's lifetime.
#[derive(Debug, Default, Clone)]
pub struct CollectorStats {
    /// Number of completed cycles
    pub cycles: u64,
    /// Total nodes turned black
    pub nodes_blackened: usize,
    /// Total nodes reclaimed onto the free list
    pub nodes_reclaimed: usize,
    /// Total sweep wrap-arounds
    pub arena_passes: usize,
    /// Total wall time spent in completed cycles
    pub total_cycle_time: Duration,
    /// Longest single cycle
    pub max_cycle_time: Duration,
}

/// The single collector of a [`Graph`].
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use memory_manager::{Collector, Graph};
///
/// let graph = Arc::new(Graph::new(8).unwrap());
/// let garbage = graph.allocate().unwrap();
///
/// let mut collector = Collector::new(graph.clone()).unwrap();
/// let report = collector.run_cycle();
/// assert_eq!(report.reclaimed, 1);
/// assert!(graph.is_on_free_list(garbage));
/// ```
pub struct Collector {
    graph: Arc<Graph>,
    state: CycleState,
    current: CycleReport,
    started: Option<Instant>,
    stats: CollectorStats,
}

impl Collector {
    /// Attaches a collector to `graph`.
    ///
    /// Fails with `CollectorAttached` if the graph already has one. Marks
    /// left behind by an unfinished cycle are cleared first.
    pub fn new(graph: Arc<Graph>) -> GcResult<Self> {
        graph.attach_collector()?;
        {
            let guard = graph.lock();
            graph.abandon_cycle(&guard);
        }
        Ok(Collector {
            graph,
            state: CycleState::Idle,
            current: CycleReport::default(),
            started: None,
            stats: CollectorStats::default(),
        })
    }

    /// Returns the graph this collector works on.
    pub fn graph(&self) -> &Arc<Graph> {
        &self.graph
    }

    /// Returns the phase of the current cycle.
    pub fn phase(&self) -> GcPhase {
        self.graph.phase()
    }

    /// Returns the lifetime statistics.
    pub fn stats(&self) -> &CollectorStats {
        &self.stats
    }

    /// Starts a cycle by shading the roots. No-op if a cycle is running.
    pub fn mark_roots(&mut self) {
        if self.state != CycleState::Idle {
            return;
        }

        let cycle = {
            let guard = self.graph.lock();
            for &root in self.graph.roots() {
                self.graph.shade_node(self.graph.node(root));
            }
            self.graph.begin_cycle(&guard)
        };

        self.current = CycleReport {
            cycle,
            ..CycleReport::default()
        };
        self.started = Some(Instant::now());
        self.state = CycleState::Sweeping {
            cursor: 0,
            clean: self.graph.capacity(),
        };
        tracing::debug!(cycle, "collection cycle started");
    }

    /// Advances the cycle by at most `budget` node visits.
    ///
    /// Starts a new cycle when idle. Returns the report once the cycle in
    /// progress completes; the next call starts a fresh cycle.
    pub fn step(&mut self, budget: usize) -> Option<CycleReport> {
        let capacity = self.graph.capacity();
        let mut remaining = budget;

        while remaining > 0 {
            match self.state {
                CycleState::Idle => self.mark_roots(),
                CycleState::Sweeping { cursor, clean } => {
                    remaining -= 1;
                    self.state = if clean == 0 {
                        self.try_quiesce(cursor)
                    } else {
                        self.sweep_visit(cursor, clean)
                    };
                }
                CycleState::Reclaiming { cursor } if cursor >= capacity => {
                    return Some(self.finish_cycle());
                }
                CycleState::Reclaiming { cursor } => {
                    remaining -= 1;
                    self.reclaim_visit(cursor);
                    self.state = CycleState::Reclaiming { cursor: cursor + 1 };
                }
            }
        }

        None
    }

    /// Runs the sweep to quiescence, starting a cycle if idle.
    ///
    /// Returns with the graph in the reclaim phase, before any node has been
    /// released. Does nothing if the cycle is already reclaiming.
    pub fn sweep(&mut self) {
        self.mark_roots();
        while let CycleState::Sweeping { cursor, clean } = self.state {
            self.state = if clean == 0 {
                self.try_quiesce(cursor)
            } else {
                self.sweep_visit(cursor, clean)
            };
        }
    }

    /// Finishes the current cycle, sweeping first if needed.
    pub fn reclaim(&mut self) -> CycleReport {
        self.sweep();
        loop {
            if let Some(report) = self.step(usize::MAX) {
                return report;
            }
        }
    }

    /// Runs one full cycle (or the rest of the one in progress).
    ///
    /// A cycle cannot be interrupted: reclaim only ever acts on a quiescent
    /// mark state.
    pub fn run_cycle(&mut self) -> CycleReport {
        self.reclaim()
    }

    fn sweep_visit(&mut self, cursor: usize, clean: usize) -> CycleState {
        let capacity = self.graph.capacity();
        let node = self.graph.node(NodeId::new(cursor));

        let clean = if node.color() == Color::Grey {
            let _guard = self.graph.lock();
            let (left, right) = node.children();
            self.graph.shade_node(self.graph.node(left));
            self.graph.shade_node(self.graph.node(right));
            if self.graph.blacken_node(node) {
                self.current.blackened += 1;
                tracing::trace!(node = cursor, "blackened");
            }
            capacity
        } else {
            clean - 1
        };

        let next = (cursor + 1) % capacity;
        if next == 0 {
            self.current.passes += 1;
        }
        CycleState::Sweeping {
            cursor: next,
            clean,
        }
    }

    fn try_quiesce(&mut self, cursor: usize) -> CycleState {
        let guard = self.graph.lock();
        if self.graph.grey_count() > 0 {
            return CycleState::Sweeping {
                cursor,
                clean: self.graph.capacity(),
            };
        }

        self.graph.set_reclaim_cursor(1, &guard);
        self.graph.set_phase(GcPhase::Reclaiming, &guard);
        tracing::debug!(
            cycle = self.current.cycle,
            blackened = self.current.blackened,
            passes = self.current.passes,
            "sweep reached quiescence"
        );
        CycleState::Reclaiming { cursor: 1 }
    }

    fn reclaim_visit(&mut self, index: usize) {
        let id = NodeId::new(index);
        let node = self.graph.node(id);

        let live = {
            let guard = self.graph.lock();
            self.graph.set_reclaim_cursor(index + 1, &guard);
            let garbage =
                node.color() == Color::White && node.is_reachable() && !self.graph.is_root(id);
            if garbage {
                self.graph.reclaim_node(node, &guard);
                Some(self.graph.live_count())
            } else {
                self.graph.whiten_node(node);
                None
            }
        };

        if let Some(live) = live {
            self.current.reclaimed += 1;
            self.graph.telemetry().live_nodes(live);
            tracing::trace!(node = index, "reclaimed");
        }
    }

    fn finish_cycle(&mut self) -> CycleReport {
        {
            let guard = self.graph.lock();
            self.graph.set_reclaim_cursor(self.graph.capacity(), &guard);
            self.graph.set_phase(GcPhase::Idle, &guard);
        }

        let mut report = std::mem::take(&mut self.current);
        report.duration = self.started.take().map(|t| t.elapsed()).unwrap_or_default();
        self.state = CycleState::Idle;

        self.stats.cycles += 1;
        self.stats.nodes_blackened += report.blackened;
        self.stats.nodes_reclaimed += report.reclaimed;
        self.stats.arena_passes += report.passes;
        self.stats.total_cycle_time += report.duration;
        self.stats.max_cycle_time = self.stats.max_cycle_time.max(report.duration);

        self.graph.telemetry().pass_complete(report.cycle);
        tracing::debug!(
            cycle = report.cycle,
            reclaimed = report.reclaimed,
            free = self.graph.free_count(),
            elapsed_us = report.duration.as_micros() as u64,
            "collection cycle complete"
        );
        report
    }
}

impl Drop for Collector {
    fn drop(&mut self) {
        if self.state != CycleState::Idle {
            let guard = self.graph.lock();
            self.graph.abandon_cycle(&guard);
        }
        self.graph.detach_collector();
    }
}
