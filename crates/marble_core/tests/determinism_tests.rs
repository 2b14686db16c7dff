//! Determinism soak tests over full simulations.
//!
//! Identical setups must produce bit-identical state hashes across
//! repeated runs, thread counts, serialization round-trips and
//! snapshot resume points.

use marble_core::prelude::*;
use marble_test_utils::determinism::{
    self, find_first_divergence, run_parallel_simulations_scoped, strategies, verify_determinism,
    verify_serialization_determinism, verify_thread_count_invariance,
};
use marble_test_utils::fixtures;
use proptest::prelude::*;

// ============================================================
// Repeated-run determinism
// ============================================================

#[test]
fn busy_track_long_soak() {
    let result = verify_determinism(
        3,
        1000,
        fixtures::busy_track,
        |sim| {
            sim.tick();
        },
        Simulation::state_hash,
    );
    result.assert_deterministic();
}

#[test]
fn busy_track_never_diverges_tick_by_tick() {
    assert!(find_first_divergence(fixtures::busy_track, 300).is_none());
}

#[test]
fn parallel_hosts_agree() {
    let result = run_parallel_simulations_scoped(fixtures::busy_track, 8, 500);
    result.assert_deterministic();
}

#[test]
fn worker_count_cannot_change_results() {
    assert!(verify_thread_count_invariance(
        fixtures::busy_track_with_threads,
        8,
        500
    ));
}

// ============================================================
// Command streams
// ============================================================

#[test]
fn command_stream_is_deterministic() {
    let setup = || {
        let mut sim = fixtures::splitter_track();
        let splitter = sim
            .entities()
            .iter()
            .find_map(|(&id, e)| e.module.as_ref().map(|_| id))
            .unwrap();
        sim.enqueue_command(TrackCommand::PlaceConnector {
            cell: CellIndex::new(0, 0, 1),
            part: PART_FLAT_CONNECTOR,
            rotation: 0,
        });
        sim.enqueue_click(ClickAction {
            target: splitter,
            action: ACTION_PRIMARY,
            at_tick: 30,
        });
        sim
    };
    assert!(determinism::verify_simulation_determinism(setup, 120));
}

// ============================================================
// Snapshots
// ============================================================

#[test]
fn snapshot_roundtrip_preserves_hash() {
    assert!(verify_serialization_determinism(fixtures::busy_track, 100));
}

#[test]
fn resuming_from_snapshot_matches_continuous_run() {
    let mut continuous = fixtures::busy_track();
    for _ in 0..100 {
        continuous.tick();
    }

    let mut first_half = fixtures::busy_track();
    for _ in 0..50 {
        first_half.tick();
    }
    let bytes = first_half.serialize().unwrap();
    let mut resumed = Simulation::deserialize(&bytes).unwrap();
    for _ in 0..50 {
        resumed.tick();
    }

    assert_eq!(resumed.get_tick(), continuous.get_tick());
    assert_eq!(resumed.state_hash(), continuous.state_hash());
}

// ============================================================
// Property tests
// ============================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn random_spawns_are_deterministic(spawns in strategies::arb_spawn_list(24)) {
        let setup = || {
            let mut sim = Simulation::new(fixtures::test_config()).unwrap();
            for &(cell, velocity) in &spawns {
                sim.spawn_marble(cell, velocity);
            }
            sim
        };
        prop_assert!(determinism::verify_simulation_determinism(setup, 30));
    }

    #[test]
    fn random_command_streams_are_deterministic(
        placements in proptest::collection::vec(
            ((-20i32..20, -2i32..2, -20i32..20), 1u32..=6),
            1..16,
        ),
    ) {
        let setup = || {
            let mut sim = Simulation::new(fixtures::test_config()).unwrap();
            for &((x, y, z), part) in &placements {
                let cell = CellIndex::new(x, y, z);
                let part = PartId(part);
                // Overlapping placements fault instead of applying,
                // which must itself be reproducible.
                let command = if part == PART_FLAT_CONNECTOR || part == PART_RAMP_CONNECTOR {
                    TrackCommand::PlaceConnector {
                        cell,
                        part,
                        rotation: 0,
                    }
                } else {
                    TrackCommand::PlaceModule {
                        cell,
                        part,
                        upgrade_level: 1,
                        rotation: 0,
                    }
                };
                sim.enqueue_command(command);
            }
            sim.add_seed_spawner(CellIndex::new(0, 1, 0), 8, Vec3Fixed::from_ints(60, 0, 0));
            sim
        };
        prop_assert!(determinism::verify_simulation_determinism(setup, 40));
    }

    #[test]
    fn random_spawns_survive_snapshots(spawns in strategies::arb_spawn_list(12)) {
        let setup = || {
            let mut sim = Simulation::new(fixtures::test_config()).unwrap();
            for &(cell, velocity) in &spawns {
                sim.spawn_marble(cell, velocity);
            }
            sim
        };
        prop_assert!(verify_serialization_determinism(setup, 10));
    }
}
