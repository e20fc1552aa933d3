//! Command-line argument definitions

use crate::config::{Mode, SimulationConfig};
use crate::error::CliResult;
use clap::Parser;
use std::path::PathBuf;

/// Simulates mutator threads racing an on-the-fly Dijkstra collector
#[derive(Debug, Parser)]
#[command(name = "dijkstra-gc", version, about)]
pub struct Cli {
    /// JSON configuration file; flags override its values
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Number of arena nodes, NIL and the three roots included
    #[arg(short, long)]
    pub capacity: Option<usize>,

    /// Number of mutator threads (concurrent mode)
    #[arg(short, long)]
    pub mutators: Option<usize>,

    /// Operations per mutator
    #[arg(short = 'n', long)]
    pub operations: Option<usize>,

    /// Seed for the random walks
    #[arg(short, long)]
    pub seed: Option<u64>,

    /// Collector scheduling
    #[arg(long, value_enum)]
    pub mode: Option<Mode>,

    /// Write memory_usage and progress logs into this directory
    #[arg(short, long)]
    pub log_dir: Option<PathBuf>,

    /// Node visits per collector step
    #[arg(long)]
    pub step_budget: Option<usize>,

    /// Pause between background cycles, in milliseconds
    #[arg(long)]
    pub cycle_pause_ms: Option<u64>,

    /// Print the final report as JSON
    #[arg(long)]
    pub json: bool,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    /// Builds the run configuration: defaults, then the config file, then
    /// flags.
    pub fn to_config(&self) -> CliResult<SimulationConfig> {
        let mut config = match &self.config {
            Some(path) => SimulationConfig::from_json_file(path)?,
            None => SimulationConfig::default(),
        };

        if let Some(capacity) = self.capacity {
            config.capacity = capacity;
        }
        if let Some(mutators) = self.mutators {
            config.mutators = mutators;
        }
        if let Some(operations) = self.operations {
            config.operations = operations;
        }
        if let Some(seed) = self.seed {
            config.seed = seed;
        }
        if let Some(mode) = self.mode {
            config.mode = mode;
        }
        if let Some(dir) = &self.log_dir {
            config.log_dir = Some(dir.clone());
        }
        if let Some(budget) = self.step_budget {
            config.collector.step_budget = budget;
        }
        if let Some(pause) = self.cycle_pause_ms {
            config.collector.cycle_pause_ms = pause;
        }

        config.validate()?;
        Ok(config)
    }
}
