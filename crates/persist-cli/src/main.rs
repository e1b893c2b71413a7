//! # persist CLI entry point
//!
//! Parses command-line arguments and dispatches to subcommand handlers.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use persist_cli::simulate::{run_simulate, SimulateArgs};
use persist_cli::states::{run_states, StatesArgs};

/// Object life-cycle engine.
///
/// Inspects the life-cycle state table and runs event scripts against an
/// in-memory session.
#[derive(Parser, Debug)]
#[command(name = "persist", version, about, long_about = None)]
struct Cli {
    /// Enable verbose output. Repeat for more verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Path to a YAML session configuration.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print every life-cycle state with its code and flags.
    States(StatesArgs),

    /// Run a YAML event script and trace object states.
    Simulate(SimulateArgs),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let result = match cli.command {
        Commands::States(args) => run_states(&args),
        Commands::Simulate(args) => run_simulate(&args, cli.config.as_deref()),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::from(1)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parse_states_json() {
        let cli = Cli::try_parse_from(["persist", "states", "--json"]).unwrap();
        match cli.command {
            Commands::States(args) => assert!(args.json),
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn cli_parse_simulate_with_globals() {
        let cli = Cli::try_parse_from([
            "persist", "-vv", "simulate", "run.yaml", "--strict", "--config", "p.yaml",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.config, Some(PathBuf::from("p.yaml")));
        match cli.command {
            Commands::Simulate(args) => {
                assert_eq!(args.script, PathBuf::from("run.yaml"));
                assert!(args.strict);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn cli_requires_subcommand() {
        assert!(Cli::try_parse_from(["persist"]).is_err());
    }
}
