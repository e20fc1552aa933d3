//! End-to-End CLI Integration Tests
//!
//! Drives the simulator through the gc_cli API, from parsed arguments to the
//! telemetry files the plotting tools read.

use clap::Parser;
use gc_cli::{simulation, Cli, Mode, SimulationConfig};
use std::fs;
use std::path::Path;

fn read_lines(path: &Path) -> Vec<String> {
    fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(str::to_string)
        .collect()
}

#[test]
fn test_e2e_incremental_writes_logs() {
    let dir = tempfile::tempdir().unwrap();
    let logs = dir.path().join("logs");
    let config = SimulationConfig {
        capacity: 48,
        operations: 2_000,
        seed: 9,
        mode: Mode::Incremental,
        log_dir: Some(logs.clone()),
        ..SimulationConfig::default()
    };

    let report = simulation::run(&config).unwrap();

    let memory = read_lines(&logs.join("memory_usage"));
    let progress = read_lines(&logs.join("progress"));
    assert_eq!(memory.len(), report.stats.allocations + report.nodes_reclaimed);
    assert!(memory.iter().all(|line| line.parse::<usize>().is_ok()));
    assert_eq!(progress.len() as u64, report.cycles);
    assert!(progress.iter().all(|line| line == "P"));

    let last: usize = memory.last().unwrap().parse().unwrap();
    assert_eq!(last, report.live_nodes);
}

#[test]
fn test_e2e_concurrent_writes_logs() {
    let dir = tempfile::tempdir().unwrap();
    let config = SimulationConfig {
        capacity: 96,
        mutators: 3,
        operations: 800,
        seed: 4,
        mode: Mode::Concurrent,
        log_dir: Some(dir.path().to_path_buf()),
        ..SimulationConfig::default()
    };

    let report = simulation::run(&config).unwrap();
    assert_eq!(report.stats.operations, 2_400);

    let memory = read_lines(&dir.path().join("memory_usage"));
    let progress = read_lines(&dir.path().join("progress"));
    assert_eq!(memory.len(), report.stats.allocations + report.nodes_reclaimed);
    assert_eq!(progress.len() as u64, report.cycles);
}

#[test]
fn test_e2e_logs_append_across_runs() {
    let dir = tempfile::tempdir().unwrap();
    let config = SimulationConfig {
        capacity: 32,
        operations: 300,
        mode: Mode::Incremental,
        log_dir: Some(dir.path().to_path_buf()),
        ..SimulationConfig::default()
    };

    let first = simulation::run(&config).unwrap();
    let second = simulation::run(&config).unwrap();
    let progress = read_lines(&dir.path().join("progress"));
    assert_eq!(progress.len() as u64, first.cycles + second.cycles);
}

#[test]
fn test_e2e_arguments_to_report() {
    let dir = tempfile::tempdir().unwrap();
    let config_path = dir.path().join("sim.json");
    fs::write(
        &config_path,
        r#"{ "capacity": 40, "operations": 500, "collector": { "step_budget": 2 } }"#,
    )
    .unwrap();

    let cli = Cli::parse_from([
        "dijkstra-gc",
        "--config",
        config_path.to_str().unwrap(),
        "--mode",
        "incremental",
        "--seed",
        "17",
    ]);
    let config = cli.to_config().unwrap();
    assert_eq!(config.capacity, 40);
    assert_eq!(config.collector.step_budget, 2);

    let report = simulation::run(&config).unwrap();
    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["mode"], "incremental");
    assert_eq!(json["capacity"], 40);
    assert_eq!(json["seed"], 17);
    assert_eq!(json["stats"]["operations"], 500);
}

#[test]
fn test_e2e_invalid_config_is_rejected() {
    let config = SimulationConfig {
        capacity: 2,
        ..SimulationConfig::default()
    };
    assert!(simulation::run(&config).is_err());
}
