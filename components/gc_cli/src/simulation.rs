//! Randomized mutator workload driving the collector.
//!
//! Every mutator operation starts with a random walk from root 1 or 2 down a
//! few child slots, then does one of:
//!
//! - allocate a node into the slot it ended on,
//! - clear that slot (the subtree becomes garbage unless shared),
//! - relink the slot to the end of a second random walk,
//! - shade the node it ended on.
//!
//! Walks read plain snapshots, so in concurrent mode a walk can end on a
//! node another mutator has just dropped; the graph rejects such writes with
//! `NotReachable` and the simulation counts them.

use crate::config::{Mode, SimulationConfig};
use crate::error::{CliError, CliResult};
use core_types::{GcError, GcResult, NodeId, Side};
use memory_manager::{
    Collector, ConcurrentCollector, Graph, LogTelemetry, Mutator, NullTelemetry, TelemetrySink,
};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use std::fmt;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::Instant;

/// Roots the mutators hang their data from.
const MUTATOR_ROOTS: [NodeId; 2] = [NodeId::new(1), NodeId::new(2)];

/// Longest random walk, in child hops.
const MAX_WALK: usize = 8;

/// One kind of mutator operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// Allocate a node into a slot
    Allocate,
    /// Clear a slot
    Detach,
    /// Point a slot at another reachable node
    Relink,
    /// Shade a node
    Shade,
}

impl Operation {
    fn choose(rng: &mut impl Rng) -> Self {
        match rng.random_range(0..100) {
            0..=39 => Operation::Allocate,
            40..=59 => Operation::Detach,
            60..=89 => Operation::Relink,
            _ => Operation::Shade,
        }
    }
}

/// Operation counters of one or more mutators.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct MutatorStats {
    /// Operations attempted
    pub operations: usize,
    /// Successful allocations
    pub allocations: usize,
    /// Successful slot clears
    pub detaches: usize,
    /// Successful relinks
    pub relinks: usize,
    /// Successful shade calls
    pub shades: usize,
    /// Allocations that found the free list empty
    pub out_of_memory: usize,
    /// Writes rejected because a node was no longer live
    pub rejected: usize,
}

impl MutatorStats {
    /// Counts one finished operation. Errors other than `OutOfMemory` and
    /// `NotReachable` are bugs and are passed back.
    pub fn record(&mut self, op: Operation, result: GcResult<()>) -> GcResult<()> {
        self.operations += 1;
        match result {
            Ok(()) => match op {
                Operation::Allocate => self.allocations += 1,
                Operation::Detach => self.detaches += 1,
                Operation::Relink => self.relinks += 1,
                Operation::Shade => self.shades += 1,
            },
            Err(GcError::OutOfMemory) => self.out_of_memory += 1,
            Err(GcError::NotReachable(_)) => self.rejected += 1,
            Err(err) => return Err(err),
        }
        Ok(())
    }

    /// Adds another mutator's counters to these.
    pub fn merge(&mut self, other: &MutatorStats) {
        self.operations += other.operations;
        self.allocations += other.allocations;
        self.detaches += other.detaches;
        self.relinks += other.relinks;
        self.shades += other.shades;
        self.out_of_memory += other.out_of_memory;
        self.rejected += other.rejected;
    }
}

/// Outcome of a whole run.
#[derive(Debug, Clone, Serialize)]
pub struct SimulationReport {
    /// Scheduling mode used
    pub mode: Mode,
    /// Arena size
    pub capacity: usize,
    /// Mutators that ran
    pub mutators: usize,
    /// Seed of the first mutator
    pub seed: u64,
    /// Combined mutator counters
    pub stats: MutatorStats,
    /// Collection cycles completed
    pub cycles: u64,
    /// Nodes returned to the free list by the collector
    pub nodes_reclaimed: usize,
    /// Synchronous collections forced by an empty free list (incremental mode)
    pub stop_the_world: usize,
    /// Live nodes at the end, roots included
    pub live_nodes: usize,
    /// Free nodes at the end
    pub free_nodes: usize,
    /// Wall time of the run
    pub elapsed_ms: u64,
}

impl fmt::Display for SimulationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} run: {} nodes, {} mutator(s), seed {}",
            self.mode, self.capacity, self.mutators, self.seed
        )?;
        writeln!(
            f,
            "  operations: {} (alloc {}, detach {}, relink {}, shade {})",
            self.stats.operations,
            self.stats.allocations,
            self.stats.detaches,
            self.stats.relinks,
            self.stats.shades
        )?;
        writeln!(
            f,
            "  failed:     {} out of memory, {} rejected",
            self.stats.out_of_memory, self.stats.rejected
        )?;
        writeln!(
            f,
            "  collector:  {} cycles, {} reclaimed, {} stop-the-world",
            self.cycles, self.nodes_reclaimed, self.stop_the_world
        )?;
        write!(
            f,
            "  heap:       {} live, {} free, {} ms",
            self.live_nodes, self.free_nodes, self.elapsed_ms
        )
    }
}

/// Runs one simulation and verifies the graph afterwards.
pub fn run(config: &SimulationConfig) -> CliResult<SimulationReport> {
    config.validate()?;
    let telemetry = open_telemetry(config.log_dir.as_deref())?;
    let graph = Arc::new(Graph::with_telemetry(config.capacity, telemetry.clone())?);

    tracing::info!(
        mode = %config.mode,
        capacity = config.capacity,
        mutators = config.mutators,
        operations = config.operations,
        seed = config.seed,
        "simulation started"
    );
    let started = Instant::now();

    let (stats, collector, stop_the_world, mutators) = match config.mode {
        Mode::Concurrent => {
            let (stats, collector) = run_concurrent(config, &graph)?;
            (stats, collector, 0, config.mutators)
        }
        Mode::Incremental => {
            let (stats, collector, forced) = run_incremental(config, &graph)?;
            (stats, collector, forced, 1)
        }
    };

    let elapsed = started.elapsed();
    telemetry.flush();
    graph.check_invariants()?;

    let report = SimulationReport {
        mode: config.mode,
        capacity: config.capacity,
        mutators,
        seed: config.seed,
        stats,
        cycles: collector.stats().cycles,
        nodes_reclaimed: collector.stats().nodes_reclaimed,
        stop_the_world,
        live_nodes: graph.live_count(),
        free_nodes: graph.free_count(),
        elapsed_ms: elapsed.as_millis() as u64,
    };
    tracing::info!(
        cycles = report.cycles,
        reclaimed = report.nodes_reclaimed,
        live = report.live_nodes,
        "simulation finished"
    );
    Ok(report)
}

fn open_telemetry(dir: Option<&Path>) -> CliResult<Arc<dyn TelemetrySink>> {
    let Some(dir) = dir else {
        return Ok(Arc::new(NullTelemetry));
    };
    fs::create_dir_all(dir).map_err(|err| CliError::io(dir, err))?;
    let sink = LogTelemetry::create(dir).map_err(|err| CliError::io(dir, err))?;
    tracing::debug!(dir = %dir.display(), "writing telemetry logs");
    Ok(Arc::new(sink))
}

fn run_concurrent(
    config: &SimulationConfig,
    graph: &Arc<Graph>,
) -> CliResult<(MutatorStats, Collector)> {
    let collector = Collector::new(graph.clone())?;
    let background = ConcurrentCollector::spawn(collector, config.collector.clone())?;
    let handle = background.handle();
    let operations = config.operations;

    let stats = thread::scope(|scope| -> CliResult<MutatorStats> {
        let mut workers = Vec::with_capacity(config.mutators);
        for index in 0..config.mutators {
            let mutator = Mutator::with_collector(handle.clone(), config.collector.oom_wait());
            let seed = config.seed.wrapping_add(index as u64);
            let worker = thread::Builder::new()
                .name(format!("mutator-{index}"))
                .spawn_scoped(scope, move || run_mutator(&mutator, seed, operations))
                .map_err(|err| GcError::Spawn(err.to_string()))?;
            workers.push(worker);
        }

        let mut total = MutatorStats::default();
        for worker in workers {
            match worker.join() {
                Ok(stats) => total.merge(&stats?),
                Err(panic) => std::panic::resume_unwind(panic),
            }
        }
        Ok(total)
    })?;

    Ok((stats, background.stop()))
}

fn run_mutator(mutator: &Mutator, seed: u64, operations: usize) -> GcResult<MutatorStats> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut stats = MutatorStats::default();
    for _ in 0..operations {
        let attempt = Attempt::run(mutator, &mut rng);
        stats.record(attempt.op, attempt.result)?;
    }
    tracing::debug!(
        seed,
        allocations = stats.allocations,
        rejected = stats.rejected,
        out_of_memory = stats.out_of_memory,
        "mutator finished"
    );
    Ok(stats)
}

fn run_incremental(
    config: &SimulationConfig,
    graph: &Arc<Graph>,
) -> CliResult<(MutatorStats, Collector, usize)> {
    let mut collector = Collector::new(graph.clone())?;
    let mutator = Mutator::new(graph.clone());
    let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
    let mut stats = MutatorStats::default();
    let mut forced = 0;

    for _ in 0..config.operations {
        let mut attempt = Attempt::run(&mutator, &mut rng);
        if attempt.op == Operation::Allocate && attempt.result == Err(GcError::OutOfMemory) {
            stop_the_world(&mut collector);
            forced += 1;
            attempt.result = mutator
                .allocate_child(attempt.parent, attempt.side)
                .map(drop);
        }
        stats.record(attempt.op, attempt.result)?;
        collector.step(config.collector.step_budget);
    }

    if collector.phase().is_active() {
        collector.run_cycle();
    }
    Ok((stats, collector, forced))
}

/// Finishes the cycle in progress plus one full cycle, so everything that is
/// garbage right now ends up on the free list.
fn stop_the_world(collector: &mut Collector) {
    tracing::debug!(
        free = collector.graph().free_count(),
        "free list exhausted, collecting synchronously"
    );
    if collector.phase().is_active() {
        collector.run_cycle();
    }
    collector.run_cycle();
}

/// One mutator operation and where it was applied.
struct Attempt {
    op: Operation,
    parent: NodeId,
    side: Side,
    result: GcResult<()>,
}

impl Attempt {
    fn run(mutator: &Mutator, rng: &mut ChaCha8Rng) -> Self {
        let graph = mutator.graph();
        let (parent, side) = walk(graph, rng);
        let op = Operation::choose(rng);
        let result = match op {
            Operation::Allocate => mutator.allocate_child_or_collect(parent, side).map(drop),
            Operation::Detach => mutator.set_child(parent, side, NodeId::NIL),
            Operation::Relink => {
                let (target, _) = walk(graph, rng);
                mutator.set_child(parent, side, target)
            }
            Operation::Shade => mutator.shade(parent).map(drop),
        };
        Attempt {
            op,
            parent,
            side,
            result,
        }
    }
}

fn random_side(rng: &mut impl Rng) -> Side {
    if rng.random_bool(0.5) {
        Side::Left
    } else {
        Side::Right
    }
}

/// Walks down from a random mutator root and returns the last node reached
/// together with the slot the walk would have followed next.
fn walk(graph: &Graph, rng: &mut impl Rng) -> (NodeId, Side) {
    let mut node = MUTATOR_ROOTS[rng.random_range(0..MUTATOR_ROOTS.len())];
    let mut side = random_side(rng);
    for _ in 0..rng.random_range(0..MAX_WALK) {
        let Ok(snapshot) = graph.get(node) else {
            break;
        };
        let child = snapshot.child(side);
        if child.is_nil() {
            break;
        }
        node = child;
        side = random_side(rng);
    }
    (node, side)
}
