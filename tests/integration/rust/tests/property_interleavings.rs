//! Property Tests: Mutator / Collector Interleavings
//!
//! Random sequences of mutator writes and bounded collector steps, checked
//! after every operation:
//!
//! - nothing reachable from the roots is ever on the free list,
//! - while marking, no black node points at a white node,
//! - the structural invariants hold,
//! - once mutation stops, one full cycle frees every unreachable node.

use core_types::{GcError, GcPhase, NodeId, Side};
use integration_tests::reachable_from_roots;
use memory_manager::{Collector, Graph};
use proptest::prelude::*;
use std::sync::Arc;

#[derive(Debug, Clone)]
enum Op {
    Allocate { pick: usize, side: Side },
    Detach { pick: usize, side: Side },
    Relink { pick: usize, side: Side, target: usize },
    Step(usize),
}

fn arb_side() -> impl Strategy<Value = Side> {
    prop_oneof![Just(Side::Left), Just(Side::Right)]
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => (any::<usize>(), arb_side()).prop_map(|(pick, side)| Op::Allocate { pick, side }),
        1 => (any::<usize>(), arb_side()).prop_map(|(pick, side)| Op::Detach { pick, side }),
        2 => (any::<usize>(), arb_side(), any::<usize>())
            .prop_map(|(pick, side, target)| Op::Relink { pick, side, target }),
        3 => (1usize..24).prop_map(Op::Step),
    ]
}

fn apply(graph: &Graph, collector: &mut Collector, op: &Op) -> Result<(), TestCaseError> {
    let live: Vec<NodeId> = reachable_from_roots(graph).into_iter().collect();
    let node = |pick: usize| live[pick % live.len()];

    match *op {
        Op::Allocate { pick, side } => match graph.allocate_child(node(pick), side) {
            Ok(_) | Err(GcError::OutOfMemory) => {}
            Err(err) => return Err(TestCaseError::fail(format!("allocate failed: {err}"))),
        },
        Op::Detach { pick, side } => {
            prop_assert_eq!(graph.set_child(node(pick), side, NodeId::NIL), Ok(()));
        }
        Op::Relink { pick, side, target } => {
            prop_assert_eq!(graph.set_child(node(pick), side, node(target)), Ok(()));
        }
        Op::Step(budget) => {
            collector.step(budget);
        }
    }
    Ok(())
}

fn check_safety(graph: &Graph) -> Result<(), TestCaseError> {
    for id in reachable_from_roots(graph) {
        prop_assert!(
            graph.get(id).unwrap().reachable,
            "node {} is reachable but on the free list",
            id
        );
    }
    if graph.phase() == GcPhase::Marking {
        let edges = graph.black_to_white_edges();
        prop_assert!(edges.is_empty(), "black-to-white edges: {:?}", edges);
    }
    prop_assert_eq!(graph.check_invariants(), Ok(()));
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn interleavings_preserve_reachable_nodes(
        capacity in 6usize..40,
        ops in prop::collection::vec(arb_op(), 1..150),
    ) {
        let graph = Arc::new(Graph::new(capacity).unwrap());
        let mut collector = Collector::new(graph.clone()).unwrap();

        for op in &ops {
            apply(&graph, &mut collector, op)?;
            check_safety(&graph)?;
        }

        // quiet period: finish the running cycle, then one full cycle
        if graph.phase().is_active() {
            collector.run_cycle();
        }
        collector.run_cycle();
        check_safety(&graph)?;

        let reachable = reachable_from_roots(&graph);
        prop_assert_eq!(graph.live_count(), reachable.len() + 1);
    }

    #[test]
    fn step_budget_does_not_change_outcome(
        budget in 1usize..64,
        garbage in 0usize..6,
    ) {
        let graph = Arc::new(Graph::new(16).unwrap());
        let kept = graph.allocate_child(NodeId::new(1), Side::Left).unwrap();
        for _ in 0..garbage {
            let node = graph.allocate_child(kept, Side::Right).unwrap();
            prop_assert!(!node.is_nil());
        }
        graph.set_child(kept, Side::Right, NodeId::NIL).unwrap();

        let mut collector = Collector::new(graph.clone()).unwrap();
        let report = loop {
            if let Some(report) = collector.step(budget) {
                break report;
            }
        };
        prop_assert_eq!(report.reclaimed, garbage);
        prop_assert!(!graph.is_on_free_list(kept));
    }
}
