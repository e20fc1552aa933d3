//! Dijkstra GC simulation CLI
//!
//! Entry point for the simulator. Parses CLI arguments, installs logging and
//! delegates to the simulation driver.

use clap::Parser;
use gc_cli::{logging, simulation, Cli, CliResult};
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    match execute(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = %err, "simulation failed");
            eprintln!("Error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn execute(cli: &Cli) -> CliResult<()> {
    let config = cli.to_config()?;
    let report = simulation::run(&config)?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{report}");
    }
    Ok(())
}
