//! Headless simulation runner for CI verification and batch runs.
//!
//! This crate drives [`marble_core`] without any presentation layer:
//!
//! - **CI verification**: run scenarios for N ticks and compare state
//!   hashes across repeated runs
//! - **Batch runs**: run many simulations in parallel and summarize
//! - **Profiling**: long soaks of a busy track for performance work
//!
//! Output goes to stdout as JSON, logs to stderr.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod runner;
pub mod scenario;

pub use runner::{run_scenario, verify_scenario, RunSummary, VerifyReport};
pub use scenario::{Scenario, ScenarioError};
