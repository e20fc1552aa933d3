//! Memory Manager - fixed-capacity node arena with an on-the-fly collector
//!
//! This component provides:
//! - A node arena whose unused nodes form a free list hanging off root 3
//! - Mutator operations guarded by the Dijkstra insertion barrier
//! - A tri-color mark-and-sweep collector, driven step by step or on a
//!   background thread
//! - Telemetry sinks for live-node counts and completed cycles
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use core_types::{NodeId, Side};
//! use memory_manager::{Collector, Graph};
//!
//! let graph = Arc::new(Graph::new(16).unwrap());
//! let root = NodeId::new(1);
//! let kept = graph.allocate_child(root, Side::Left).unwrap();
//! let dropped = graph.allocate_child(kept, Side::Right).unwrap();
//! graph.set_child(kept, Side::Right, NodeId::NIL).unwrap();
//!
//! let mut collector = Collector::new(graph.clone()).unwrap();
//! collector.run_cycle();
//! assert!(graph.is_on_free_list(dropped));
//! assert!(!graph.is_on_free_list(kept));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod arena;
pub mod concurrent_gc;
pub mod free_list;
pub mod gc;
pub mod graph;
pub mod mutator;
pub mod telemetry;
pub mod write_barrier;

// Re-export main types
pub use arena::{Arena, Node, NodeSnapshot};
pub use gc::{Collector, CollectorStats, CycleReport};
pub use graph::{Graph, FREE_ROOT, MIN_CAPACITY, ROOTS};
pub use mutator::Mutator;
pub use telemetry::{
    LogTelemetry, NullTelemetry, RecordingTelemetry, TelemetryEvent, TelemetrySink,
};

// Re-export concurrent collector types
pub use concurrent_gc::{CollectorConfig, CollectorHandle, ConcurrentCollector};
