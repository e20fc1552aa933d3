//! Simulation configuration.
//!
//! Values come from three layers, later ones winning: built-in defaults, an
//! optional JSON file, and command-line flags.

use crate::error::{CliError, CliResult};
use clap::ValueEnum;
use memory_manager::{CollectorConfig, MIN_CAPACITY};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// How the collector is scheduled against the mutators.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Background collector thread plus N mutator threads
    #[default]
    Concurrent,
    /// One mutator on the main thread, collector stepped after every operation
    Incremental,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Concurrent => write!(f, "concurrent"),
            Mode::Incremental => write!(f, "incremental"),
        }
    }
}

/// Full configuration of one simulation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Arena size, `NIL` and roots included
    pub capacity: usize,
    /// Mutator threads (concurrent mode only)
    pub mutators: usize,
    /// Operations performed by each mutator
    pub operations: usize,
    /// Seed for the mutators' random walks
    pub seed: u64,
    /// Scheduling mode
    pub mode: Mode,
    /// Directory receiving `memory_usage` and `progress`
    pub log_dir: Option<PathBuf>,
    /// Background collector settings; `step_budget` also applies to
    /// incremental mode
    pub collector: CollectorConfig,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        SimulationConfig {
            capacity: 1024,
            mutators: 4,
            operations: 10_000,
            seed: 0,
            mode: Mode::default(),
            log_dir: None,
            collector: CollectorConfig::default(),
        }
    }
}

impl SimulationConfig {
    /// Loads a configuration from a JSON file; missing fields keep their
    /// defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> CliResult<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|err| CliError::io(path, err))?;
        serde_json::from_str(&text).map_err(|source| CliError::ConfigParse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Rejects configurations that cannot run.
    pub fn validate(&self) -> CliResult<()> {
        if self.capacity < MIN_CAPACITY {
            return Err(CliError::Config(format!(
                "capacity must be at least {MIN_CAPACITY}, got {}",
                self.capacity
            )));
        }
        if self.mode == Mode::Concurrent && self.mutators == 0 {
            return Err(CliError::Config(
                "concurrent mode needs at least one mutator".to_string(),
            ));
        }
        if self.collector.step_budget == 0 {
            return Err(CliError::Config("step_budget must be positive".to_string()));
        }
        Ok(())
    }
}
