//! Concurrent Mutator Integration Tests
//!
//! Several mutator threads churn private subtrees while the background
//! collector runs. Each thread only writes below its own anchor node, so it
//! can check after every operation that nothing it still references has been
//! put back on the free list.

use core_types::{GcError, NodeId, Side};
use memory_manager::{
    Collector, CollectorConfig, ConcurrentCollector, Graph, Mutator, RecordingTelemetry,
};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

const ROOT: NodeId = NodeId::new(1);

/// Builds a right-leaning spine of `count` anchors under root 1.
fn anchors(graph: &Graph, count: usize) -> Vec<NodeId> {
    let mut anchors = Vec::with_capacity(count);
    let mut parent = ROOT;
    let mut side = Side::Left;
    for _ in 0..count {
        let anchor = graph.allocate_child(parent, side).unwrap();
        anchors.push(anchor);
        parent = anchor;
        side = Side::Right;
    }
    anchors
}

/// Follows left slots from `anchor`, returning the chain below it.
fn chain_below(graph: &Graph, anchor: NodeId) -> Vec<NodeId> {
    let mut chain = Vec::new();
    let mut cursor = graph.get(anchor).unwrap().left;
    while !cursor.is_nil() {
        chain.push(cursor);
        cursor = graph.get(cursor).unwrap().left;
    }
    chain
}

/// Appends fresh nodes to the anchor's chain and periodically cuts it,
/// checking the chain it still holds after every step.
///
/// Nodes are only ever linked where they are allocated; moving a node the
/// thread merely remembers would leave it unrooted for a moment.
fn churn(mutator: &Mutator, anchor: NodeId, rounds: usize) -> usize {
    let graph = mutator.graph();
    let mut allocated = 0;
    for round in 0..rounds {
        let chain = chain_below(graph, anchor);
        if round % 7 == 6 {
            if let Some(&keep) = chain.get(1) {
                mutator.set_child(keep, Side::Left, NodeId::NIL).unwrap();
            }
        } else {
            let tail = chain.last().copied().unwrap_or(anchor);
            match mutator.allocate_child_or_collect(tail, Side::Left) {
                Ok(_) => allocated += 1,
                Err(GcError::OutOfMemory) => {}
                Err(err) => panic!("unexpected error {err}"),
            }
        }

        for id in chain_below(graph, anchor) {
            assert!(
                graph.get(id).unwrap().reachable,
                "node {id} under anchor {anchor} was freed while referenced"
            );
        }
    }
    allocated
}

#[test]
fn test_mutators_with_background_collector() {
    let graph = Arc::new(Graph::new(256).unwrap());
    let anchors = anchors(&graph, 4);
    let collector = Collector::new(graph.clone()).unwrap();
    let background = ConcurrentCollector::spawn(collector, CollectorConfig::default()).unwrap();

    let allocated: usize = thread::scope(|scope| {
        let workers: Vec<_> = anchors
            .iter()
            .map(|&anchor| {
                let mutator = Mutator::with_collector(background.handle(), Duration::from_secs(5));
                scope.spawn(move || churn(&mutator, anchor, 500))
            })
            .collect();
        workers.into_iter().map(|w| w.join().unwrap()).sum()
    });
    assert!(allocated > 0);

    let mut collector = background.stop();
    collector.run_cycle();
    collector.run_cycle();

    // after two quiet cycles only the anchors and their chains remain
    let mut live = 3 + anchors.len();
    for &anchor in &anchors {
        live += chain_below(&graph, anchor).len();
    }
    assert_eq!(graph.live_count(), live);
    graph.check_invariants().unwrap();
}

#[test]
fn test_tight_arena_relies_on_oom_fallback() {
    let graph = Arc::new(Graph::new(24).unwrap());
    let anchors = anchors(&graph, 2);
    let collector = Collector::new(graph.clone()).unwrap();
    let config = CollectorConfig {
        cycle_pause_ms: 50,
        ..CollectorConfig::default()
    };
    let background = ConcurrentCollector::spawn(collector, config).unwrap();

    thread::scope(|scope| {
        for &anchor in &anchors {
            let mutator = Mutator::with_collector(background.handle(), Duration::from_secs(5));
            scope.spawn(move || churn(&mutator, anchor, 300));
        }
    });

    let collector = background.stop();
    assert!(collector.stats().nodes_reclaimed > 0);
    graph.check_invariants().unwrap();
}

#[test]
fn test_concurrent_telemetry_balances() {
    let sink = Arc::new(RecordingTelemetry::new());
    let graph = Arc::new(Graph::with_telemetry(128, sink.clone()).unwrap());
    let anchors = anchors(&graph, 3);
    let collector = Collector::new(graph.clone()).unwrap();
    let background = ConcurrentCollector::spawn(collector, CollectorConfig::default()).unwrap();

    thread::scope(|scope| {
        for &anchor in &anchors {
            let mutator = Mutator::with_collector(background.handle(), Duration::from_secs(5));
            scope.spawn(move || churn(&mutator, anchor, 200));
        }
    });
    let mut collector = background.stop();
    collector.run_cycle();

    // every allocation and every reclaim reports exactly once
    let counts = sink.live_counts();
    let stats = collector.stats();
    let allocations = counts.len() - stats.nodes_reclaimed;
    assert_eq!(
        graph.live_count(),
        3 + allocations - stats.nodes_reclaimed
    );
    assert_eq!(sink.passes() as u64, stats.cycles);
}
