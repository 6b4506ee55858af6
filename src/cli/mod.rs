//! Command-line interface.
//!
//! - `algorithms`: the algorithm catalog
//! - `problems`: the benchmark problems swarms can name
//! - `run`: one local optimization run with a progress bar
//! - `dispatch`: a JSON-lines command session against the swarm runtime

pub mod commands;
pub mod output;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use commands::algorithms::AlgorithmsArgs;
use commands::dispatch::DispatchArgs;
use commands::run::RunArgs;

#[derive(Parser, Debug)]
#[command(name = "metaswarm")]
#[command(about = "Metaheuristic optimization with coordinated swarms", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output in JSON format
    #[arg(short, long, global = true)]
    pub json: bool,

    /// Configuration file (defaults to .metaswarm/config.yaml)
    #[arg(short, long, global = true, env = "METASWARM_CONFIG")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List algorithms, or show one algorithm's parameters
    Algorithms(AlgorithmsArgs),

    /// List the benchmark problems
    Problems,

    /// Run one algorithm locally against a benchmark problem
    Run(RunArgs),

    /// Read JSON command requests line by line and answer each
    Dispatch(DispatchArgs),
}

/// Print a command failure and exit non-zero.
pub fn handle_error(err: anyhow::Error, json_mode: bool) -> ! {
    if json_mode {
        let body = serde_json::json!({
            "success": false,
            "error": format!("{err:#}"),
        });
        println!("{body}");
    } else {
        eprintln!("Error: {err:#}");
    }
    std::process::exit(1)
}
