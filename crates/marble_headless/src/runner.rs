//! Scenario execution and determinism verification.

use std::time::Instant;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::scenario::{Scenario, ScenarioError};

/// Summary of a single scenario run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    /// Scenario name.
    pub scenario: String,
    /// Ticks simulated.
    pub ticks: u64,
    /// Live marbles at the end of the run.
    pub marbles: usize,
    /// Debris obstacles at the end of the run.
    pub debris: usize,
    /// Total marbles spawned over the run.
    pub total_spawned: u64,
    /// Total marbles destroyed by collisions.
    pub total_destroyed: u64,
    /// Total coins awarded by goal pads.
    pub total_coins: u64,
    /// Total faults raised.
    pub total_faults: u64,
    /// Final state hash.
    pub state_hash: u64,
    /// Wall-clock duration in milliseconds.
    pub elapsed_ms: u64,
}

/// Result of repeated determinism runs of one scenario.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyReport {
    /// Scenario name.
    pub scenario: String,
    /// Runs performed.
    pub runs: usize,
    /// Ticks per run.
    pub ticks: u64,
    /// Final hash of every run.
    pub hashes: Vec<u64>,
    /// Whether all hashes matched.
    pub deterministic: bool,
}

/// Run a scenario for `ticks` ticks and summarize the outcome.
///
/// # Errors
///
/// Returns an error if the scenario cannot be instantiated.
pub fn run_scenario(scenario: &Scenario, ticks: u64) -> Result<RunSummary, ScenarioError> {
    let start = Instant::now();
    let mut sim = scenario.build()?;

    let mut total_spawned = 0u64;
    let mut total_destroyed = 0u64;
    let mut total_coins = 0u64;
    let mut total_faults = 0u64;

    for _ in 0..ticks {
        let events = sim.tick();
        total_spawned += events.spawned.len() as u64;
        total_destroyed += events.destroyed.len() as u64;
        total_coins += events.rewards.iter().map(|r| u64::from(r.coins)).sum::<u64>();
        total_faults += events.faults.len() as u64;
    }

    let summary = RunSummary {
        scenario: scenario.name.clone(),
        ticks,
        marbles: sim.marble_count(),
        debris: sim.debris_count(),
        total_spawned,
        total_destroyed,
        total_coins,
        total_faults,
        state_hash: sim.state_hash(),
        elapsed_ms: start.elapsed().as_millis() as u64,
    };
    tracing::info!(
        scenario = %summary.scenario,
        ticks,
        marbles = summary.marbles,
        hash = summary.state_hash,
        "scenario run complete"
    );
    Ok(summary)
}

/// Run a scenario `runs` times in parallel and compare final hashes.
///
/// # Errors
///
/// Returns an error if any run fails to instantiate the scenario.
pub fn verify_scenario(
    scenario: &Scenario,
    runs: usize,
    ticks: u64,
) -> Result<VerifyReport, ScenarioError> {
    let hashes: Vec<u64> = (0..runs)
        .into_par_iter()
        .map(|_| -> Result<u64, ScenarioError> {
            let mut sim = scenario.build()?;
            for _ in 0..ticks {
                sim.tick();
            }
            Ok(sim.state_hash())
        })
        .collect::<Result<_, _>>()?;

    let deterministic = hashes.windows(2).all(|w| w[0] == w[1]);
    if !deterministic {
        tracing::error!(scenario = %scenario.name, ?hashes, "determinism verification failed");
    }

    Ok(VerifyReport {
        scenario: scenario.name.clone(),
        runs,
        ticks,
        hashes,
        deterministic,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_head_on_run_summary() {
        let scenario = Scenario::head_on();
        let summary = run_scenario(&scenario, 10).unwrap();

        assert_eq!(summary.marbles, 0);
        assert_eq!(summary.debris, 1);
        assert_eq!(summary.total_destroyed, 2);
    }

    #[test]
    fn test_verify_reports_deterministic() {
        let scenario = Scenario::busy_track();
        let report = verify_scenario(&scenario, 4, 100).unwrap();

        assert!(report.deterministic);
        assert_eq!(report.hashes.len(), 4);
    }

    #[test]
    fn test_scenario_runs_match_harness() {
        let scenario = Scenario::splitter_demo();
        let divergence = marble_test_utils::determinism::find_first_divergence(
            || scenario.build().unwrap(),
            50,
        );
        assert!(divergence.is_none());
    }

    #[test]
    fn test_summary_serializes_to_json() {
        let scenario = Scenario::head_on();
        let summary = run_scenario(&scenario, 1).unwrap();
        let json = serde_json::to_string(&summary).unwrap();
        assert!(json.contains("\"scenario\":\"head_on\""));
    }
}
