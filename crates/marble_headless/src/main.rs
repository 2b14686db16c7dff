//! Headless marble-run simulation runner.
//!
//! This binary runs the simulation core without graphics, for CI
//! verification and batch experiments.
//!
//! # Usage
//!
//! ```bash
//! # Run a built-in scenario for one minute of sim time
//! cargo run -p marble_headless -- run --scenario busy_track --ticks 7200
//!
//! # Run a scenario from a RON file
//! cargo run -p marble_headless -- run --scenario tracks/my_track.ron
//!
//! # Verify determinism with 8 parallel runs
//! cargo run -p marble_headless -- verify --scenario head_on --runs 8 --ticks 1000
//!
//! # List built-in scenarios
//! cargo run -p marble_headless -- list
//! ```
//!
//! Results are printed to stdout as JSON; logs go to stderr.

use std::path::Path;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use marble_headless::{run_scenario, verify_scenario, Scenario};

#[derive(Parser)]
#[command(name = "marble_headless")]
#[command(about = "Headless marble-run simulation runner for CI and batch runs")]
#[command(version)]
struct Cli {
    /// Enable verbose logging to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a single scenario and print a JSON summary
    Run {
        /// Built-in scenario name or path to a RON file
        #[arg(short, long, default_value = "busy_track")]
        scenario: String,

        /// Number of ticks to simulate
        #[arg(short, long, default_value = "7200")]
        ticks: u64,
    },

    /// Verify determinism by running the same scenario multiple times
    Verify {
        /// Built-in scenario name or path to a RON file
        #[arg(short, long, default_value = "busy_track")]
        scenario: String,

        /// Number of parallel runs
        #[arg(short, long, default_value = "8")]
        runs: usize,

        /// Number of ticks per run
        #[arg(short, long, default_value = "1000")]
        ticks: u64,
    },

    /// List built-in scenarios
    List,
}

fn load_scenario(name: &str) -> Result<Scenario, String> {
    if let Some(scenario) = Scenario::by_name(name) {
        return Ok(scenario);
    }
    if Path::new(name).exists() {
        return Scenario::load(name).map_err(|e| e.to_string());
    }
    Err(format!(
        "unknown scenario '{name}' (built-ins: {})",
        Scenario::builtin_names().join(", ")
    ))
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Logs to stderr; stdout carries JSON results.
    let log_level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(true),
        )
        .with(tracing_subscriber::filter::LevelFilter::from_level(
            log_level,
        ))
        .init();

    match cli.command {
        Commands::Run { scenario, ticks } => {
            let scenario = match load_scenario(&scenario) {
                Ok(s) => s,
                Err(e) => {
                    tracing::error!("{e}");
                    return ExitCode::FAILURE;
                }
            };
            match run_scenario(&scenario, ticks) {
                Ok(summary) => {
                    match serde_json::to_string_pretty(&summary) {
                        Ok(json) => println!("{json}"),
                        Err(e) => {
                            tracing::error!("failed to encode summary: {e}");
                            return ExitCode::FAILURE;
                        }
                    }
                    ExitCode::SUCCESS
                }
                Err(e) => {
                    tracing::error!("run failed: {e}");
                    ExitCode::FAILURE
                }
            }
        }
        Commands::Verify {
            scenario,
            runs,
            ticks,
        } => {
            let scenario = match load_scenario(&scenario) {
                Ok(s) => s,
                Err(e) => {
                    tracing::error!("{e}");
                    return ExitCode::FAILURE;
                }
            };
            match verify_scenario(&scenario, runs, ticks) {
                Ok(report) => {
                    match serde_json::to_string_pretty(&report) {
                        Ok(json) => println!("{json}"),
                        Err(e) => {
                            tracing::error!("failed to encode report: {e}");
                            return ExitCode::FAILURE;
                        }
                    }
                    if report.deterministic {
                        ExitCode::SUCCESS
                    } else {
                        ExitCode::FAILURE
                    }
                }
                Err(e) => {
                    tracing::error!("verification failed: {e}");
                    ExitCode::FAILURE
                }
            }
        }
        Commands::List => {
            for name in Scenario::builtin_names() {
                println!("{name}");
            }
            ExitCode::SUCCESS
        }
    }
}
