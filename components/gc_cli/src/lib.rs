//! Dijkstra GC simulation CLI library
//!
//! Provides the argument parser, configuration layering, logging setup and
//! the randomized mutator workload behind the `dijkstra-gc` binary.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod simulation;

pub use cli::Cli;
pub use config::{Mode, SimulationConfig};
pub use error::{CliError, CliResult};
pub use simulation::{run, MutatorStats, SimulationReport};
