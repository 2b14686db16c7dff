//! Reusable simulation scenarios.
//!
//! Each builder returns a fully configured [`Simulation`] so tests and
//! benchmarks exercise the same tracks.

use marble_core::prelude::*;

/// Single-thread configuration used by most fixtures so results do not
/// depend on the host's core count being exercised.
#[must_use]
pub fn test_config() -> SimConfig {
    SimConfig {
        worker_threads: 1,
        ..SimConfig::default()
    }
}

/// Two marbles on a three-cell track, meeting head-on in the middle
/// cell on the first tick.
#[must_use]
pub fn head_on_collision() -> Simulation {
    let mut sim = Simulation::new(test_config()).unwrap();
    for x in 0..=2 {
        sim.place_connector(CellIndex::new(x, 0, 0), PART_FLAT_CONNECTOR)
            .unwrap();
    }
    sim.spawn_marble(CellIndex::new(0, 0, 0), Vec3Fixed::from_ints(120, 0, 0));
    sim.spawn_marble(CellIndex::new(2, 0, 0), Vec3Fixed::from_ints(-120, 0, 0));
    sim
}

/// A splitter fed by an unlimited spawner two cells upstream, with
/// connector track on both exits.
#[must_use]
pub fn splitter_track() -> Simulation {
    let mut sim = Simulation::new(test_config()).unwrap();
    for x in -4..=4 {
        if x == 0 {
            continue;
        }
        sim.place_connector(CellIndex::new(x, 0, 0), PART_FLAT_CONNECTOR)
            .unwrap();
    }
    sim.place_part(CellIndex::new(0, 0, 0), PART_SPLITTER, 0)
        .unwrap();
    sim.add_seed_spawner(
        CellIndex::new(-4, 0, 0),
        -1,
        Vec3Fixed::from_ints(120, 0, 0),
    );
    sim
}

/// A collector at the given upgrade level holding `queued` captured
/// marbles, plus connector track at its outlet.
///
/// The queue is preloaded directly because in a live track at most one
/// marble per tick can reach a cell intact, and the per-tick release
/// keeps a slowly fed queue near empty.
#[must_use]
pub fn collector_with_queue(upgrade_level: u8, queued: u32) -> (Simulation, EntityId) {
    let mut sim = Simulation::new(test_config()).unwrap();
    let cell = CellIndex::new(0, 0, 0);
    let collector = sim.place_part(cell, PART_COLLECTOR, upgrade_level).unwrap();
    sim.place_connector(CellIndex::new(1, 0, 0), PART_FLAT_CONNECTOR)
        .unwrap();
    let module = sim
        .get_entity_mut(collector)
        .and_then(|e| e.module.as_mut())
        .unwrap();
    if let ModuleState::Collector(ref mut queue) = module.state {
        for i in 0..queued {
            assert!(queue.enqueue(u64::from(1000 + i), 0), "fixture overfilled queue");
        }
    }
    (sim, collector)
}

/// A lift with one marble waiting on its base cell.
#[must_use]
pub fn lift_ride() -> Simulation {
    let mut sim = Simulation::new(test_config()).unwrap();
    let base = CellIndex::new(0, 0, 0);
    sim.place_part(base, PART_LIFT, 0).unwrap();
    sim.spawn_marble(base, Vec3Fixed::ZERO);
    sim
}

/// A straight run ending in a goal pad.
#[must_use]
pub fn goal_run() -> Simulation {
    let mut sim = Simulation::new(test_config()).unwrap();
    for x in 0..4 {
        sim.place_connector(CellIndex::new(x, 0, 0), PART_FLAT_CONNECTOR)
            .unwrap();
    }
    sim.place_part(CellIndex::new(4, 0, 0), PART_GOAL, 0).unwrap();
    sim.spawn_marble(CellIndex::new(0, 0, 0), Vec3Fixed::from_ints(120, 0, 0));
    sim
}

/// A long track with a spawner, splitter, collector and goal, used for
/// benchmarks and long determinism soaks.
#[must_use]
pub fn busy_track() -> Simulation {
    busy_track_with_threads(1)
}

/// [`busy_track`] with an explicit worker thread count, for verifying
/// that parallelism cannot change results.
#[must_use]
pub fn busy_track_with_threads(threads: usize) -> Simulation {
    let config = SimConfig {
        worker_threads: threads,
        ..SimConfig::default()
    };
    let mut sim = Simulation::new(config).unwrap();
    for x in -8..=8 {
        if x == 0 || x == 5 || x == -5 {
            continue;
        }
        sim.place_connector(CellIndex::new(x, 0, 0), PART_FLAT_CONNECTOR)
            .unwrap();
    }
    sim.place_part(CellIndex::new(0, 0, 0), PART_SPLITTER, 0)
        .unwrap();
    sim.place_part(CellIndex::new(5, 0, 0), PART_COLLECTOR, 1)
        .unwrap();
    sim.place_part(CellIndex::new(-5, 0, 0), PART_GOAL, 0).unwrap();
    sim.add_seed_spawner(
        CellIndex::new(-8, 0, 0),
        -1,
        Vec3Fixed::from_ints(120, 0, 0),
    );
    sim
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixtures_build() {
        assert_eq!(head_on_collision().marble_count(), 2);
        assert_eq!(goal_run().marble_count(), 1);
        assert!(busy_track().entities().len() > 10);

        let (sim, collector) = collector_with_queue(1, 3);
        let module = sim.get_entity(collector).unwrap().module.as_ref().unwrap();
        match module.state {
            ModuleState::Collector(ref queue) => assert_eq!(queue.count, 3),
            _ => panic!("expected collector"),
        }
    }
}
