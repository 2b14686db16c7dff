//! End-to-end track mechanics tests.
//!
//! These run whole simulations through the public API and check the
//! observable outcomes: collisions, routing, collection schedules,
//! lift rides and goal rewards.

use marble_core::fault::{CODE_QUEUE_FULL, CODE_UNKNOWN_PART};
use marble_core::prelude::*;
use marble_test_utils::fixtures;

fn tick_n(sim: &mut Simulation, n: u64) -> Vec<TickEvents> {
    (0..n).map(|_| sim.tick()).collect()
}

#[test]
fn head_on_collision_leaves_single_debris() {
    let mut sim = fixtures::head_on_collision();
    sim.tick();

    assert_eq!(sim.marble_count(), 0);
    assert_eq!(sim.debris_count(), 1);
    let debris_cell = sim
        .entities()
        .iter()
        .find_map(|(_, e)| e.debris.map(|d| d.cell))
        .unwrap();
    assert_eq!(debris_cell, CellIndex::new(1, 0, 0));
}

#[test]
fn debris_is_permanent() {
    let mut sim = fixtures::head_on_collision();
    tick_n(&mut sim, 50);
    assert_eq!(sim.debris_count(), 1);
}

#[test]
fn goal_run_awards_coins_and_consumes_marble() {
    let mut sim = fixtures::goal_run();
    let events = tick_n(&mut sim, 20);

    let rewards: Vec<_> = events.iter().flat_map(|e| e.rewards.iter()).collect();
    assert_eq!(rewards.len(), 1);
    assert_eq!(sim.marble_count(), 0);

    let goal = sim
        .entities()
        .iter()
        .find_map(|(_, e)| e.goal)
        .unwrap();
    assert_eq!(goal.marbles_collected, 1);
}

#[test]
fn splitter_alternates_between_exits() {
    let mut sim = Simulation::new(fixtures::test_config()).unwrap();
    for x in -2..=2 {
        if x == 0 {
            continue;
        }
        sim.place_connector(CellIndex::new(x, 0, 0), PART_FLAT_CONNECTOR)
            .unwrap();
    }
    sim.place_part(CellIndex::new(0, 0, 0), PART_SPLITTER, 0)
        .unwrap();
    let route_speed = sim.config().route_speed;

    // First marble rolls in, reaches the splitter cell on the second
    // tick and takes exit 0.
    let first = sim.spawn_marble(CellIndex::new(-2, 0, 0), Vec3Fixed::from_ints(120, 0, 0));
    tick_n(&mut sim, 2);
    let routed = sim.get_entity(first).unwrap().marble.unwrap();
    assert_eq!(routed.velocity.x, route_speed);

    // Second marble follows once the first is clear and takes exit 1.
    let second = sim.spawn_marble(CellIndex::new(-2, 0, 0), Vec3Fixed::from_ints(120, 0, 0));
    tick_n(&mut sim, 2);
    let routed = sim.get_entity(second).unwrap().marble.unwrap();
    assert_eq!(routed.velocity.x, -route_speed);
}

#[test]
fn splitter_override_pins_one_exit() {
    let mut sim = fixtures::splitter_track();
    let splitter = sim
        .entities()
        .iter()
        .find_map(|(&id, e)| e.module.as_ref().map(|_| id))
        .unwrap();
    sim.enqueue_click(ClickAction {
        target: splitter,
        action: ACTION_PRIMARY,
        at_tick: 0,
    });
    tick_n(&mut sim, 60);

    // The pointer sat at exit 0 when the override engaged, so every
    // marble goes through the opposite exit, 1 (-x).
    let wrong_way = sim
        .entities()
        .iter()
        .filter_map(|(_, e)| e.marble.as_ref())
        .filter(|m| m.velocity.x > Fixed::ZERO && m.position.x > Fixed::from_num(1))
        .count();
    assert_eq!(wrong_way, 0, "override must pin every route to one exit");
}

#[test]
fn collector_level_zero_flushes_everything_at_once() {
    let (mut sim, _) = fixtures::collector_with_queue(0, 5);
    let events = sim.tick();
    assert_eq!(events.spawned.len(), 5);
}

#[test]
fn collector_level_one_releases_one_per_tick() {
    let (mut sim, collector) = fixtures::collector_with_queue(1, 3);
    for remaining in (0..3u32).rev() {
        let events = sim.tick();
        assert_eq!(events.spawned.len(), 1);

        let module = sim.get_entity(collector).unwrap().module.as_ref().unwrap();
        match module.state {
            ModuleState::Collector(ref queue) => assert_eq!(queue.count, remaining),
            _ => panic!("expected collector"),
        }
    }
    let events = sim.tick();
    assert_eq!(events.spawned.len(), 0, "queue exhausted");
}

#[test]
fn collector_level_two_releases_bursts() {
    // Built-in collector burst size is 4.
    let (mut sim, _) = fixtures::collector_with_queue(2, 5);
    let events = sim.tick();
    assert_eq!(events.spawned.len(), 4);
    let events = sim.tick();
    assert_eq!(events.spawned.len(), 1);
}

#[test]
fn burst_released_marbles_survive() {
    let (mut sim, _) = fixtures::collector_with_queue(2, 4);
    let events = sim.tick();
    assert_eq!(events.spawned.len(), 4);

    // Releases stagger one cell apart along the outlet run, so the
    // whole burst rolls on instead of colliding one cell downstream.
    sim.tick();
    assert_eq!(sim.marble_count(), 4);
    assert_eq!(sim.debris_count(), 0);
}

#[test]
fn full_collector_rejects_marble_with_fault() {
    let (mut sim, _) = fixtures::collector_with_queue(1, 8);
    let marble = sim.spawn_marble(CellIndex::new(0, 0, 0), Vec3Fixed::ZERO);

    let events = sim.tick();
    assert_eq!(events.faults.len(), 1);
    assert_eq!(events.faults[0].origin, FaultOrigin::Collector);
    assert_eq!(events.faults[0].code, CODE_QUEUE_FULL);
    // The rejected marble stays in the world.
    assert!(sim.get_entity(marble).is_some_and(|e| e.marble.is_some()));

    // The same tick released one marble, so the retry is captured.
    let events = sim.tick();
    assert!(events.faults.is_empty());
    assert!(sim.get_entity(marble).is_none());
}

#[test]
fn collector_released_marbles_appear_at_outlet() {
    let (mut sim, _) = fixtures::collector_with_queue(1, 1);
    let events = sim.tick();
    let released = events.spawned[0];

    let marble = sim.get_entity(released).unwrap().marble.unwrap();
    assert_eq!(marble.cell, CellIndex::new(1, 0, 0));
    assert_eq!(marble.velocity.x, sim.config().route_speed);
}

#[test]
fn lift_steps_once_per_tick_and_deactivates() {
    let mut sim = fixtures::lift_ride();
    let (lift, target) = sim
        .entities()
        .iter()
        .find_map(|(&id, e)| {
            e.module.as_ref().and_then(|m| match m.state {
                ModuleState::Lift(ref l) => Some((id, l.target_height)),
                _ => None,
            })
        })
        .unwrap();
    let marble = sim
        .entities()
        .iter()
        .find_map(|(&id, e)| e.marble.map(|_| id))
        .unwrap();

    for step in 1..=target {
        sim.tick();
        let carried = sim.get_entity(marble).unwrap().marble.unwrap();
        assert_eq!(carried.cell.y, step as i32, "one cell per tick");
    }

    let state = match sim.get_entity(lift).unwrap().module.as_ref().unwrap().state {
        ModuleState::Lift(ref l) => *l,
        _ => panic!("expected lift"),
    };
    assert!(!state.is_active);
    assert_eq!(state.current_height, target);

    // Deactivated lift no longer carries; the marble would fall except
    // the platform cell still counts as supported track.
    let before = sim.get_entity(marble).unwrap().marble.unwrap().cell;
    sim.tick();
    let after = sim.get_entity(marble).unwrap().marble.unwrap().cell;
    assert_eq!(before, after);
}

#[test]
fn paused_lift_holds_position() {
    let mut sim = fixtures::lift_ride();
    let lift = sim
        .entities()
        .iter()
        .find_map(|(&id, e)| e.module.as_ref().map(|_| id))
        .unwrap();

    sim.enqueue_click(ClickAction {
        target: lift,
        action: ACTION_PRIMARY,
        at_tick: 0,
    });
    tick_n(&mut sim, 5);

    let state = match sim.get_entity(lift).unwrap().module.as_ref().unwrap().state {
        ModuleState::Lift(ref l) => *l,
        _ => panic!("expected lift"),
    };
    assert_eq!(state.current_height, 0, "paused lift must not step");

    // Resume; the ride completes.
    sim.enqueue_click(ClickAction {
        target: lift,
        action: ACTION_PRIMARY,
        at_tick: sim.get_tick(),
    });
    tick_n(&mut sim, u64::from(state.target_height));
    let state = match sim.get_entity(lift).unwrap().module.as_ref().unwrap().state {
        ModuleState::Lift(ref l) => *l,
        _ => panic!("expected lift"),
    };
    assert_eq!(state.current_height, state.target_height);
}

#[test]
fn unsupported_marble_falls() {
    let mut sim = Simulation::new(fixtures::test_config()).unwrap();
    let marble = sim.spawn_marble(CellIndex::new(0, 10, 0), Vec3Fixed::ZERO);
    tick_n(&mut sim, 240);

    let fallen = sim.get_entity(marble).unwrap().marble.unwrap();
    assert!(fallen.cell.y < 10, "gravity must pull the marble down");
    assert!(
        fallen.velocity.y >= -sim.config().terminal_speed,
        "fall speed must stay clamped"
    );
}

#[test]
fn ramp_connector_accelerates_along_x() {
    let mut sim = Simulation::new(fixtures::test_config()).unwrap();
    for x in 0..30 {
        sim.place_connector(CellIndex::new(x, 0, 0), PART_RAMP_CONNECTOR)
            .unwrap();
    }
    let marble = sim.spawn_marble(CellIndex::new(0, 0, 0), Vec3Fixed::ZERO);
    tick_n(&mut sim, 120);

    let rolled = sim.get_entity(marble).unwrap().marble.unwrap();
    assert!(rolled.velocity.x > Fixed::ZERO, "ramp must accelerate");
    assert!(rolled.cell.x > 0, "marble must have moved downhill");
}

#[test]
fn spawner_budget_is_exact() {
    let mut sim = Simulation::new(fixtures::test_config()).unwrap();
    // A goal pad on the spawn cell clears it every tick, so the
    // spawner is never blocked by its own output.
    sim.place_part(CellIndex::new(0, 0, 0), PART_GOAL, 0).unwrap();
    sim.add_seed_spawner(CellIndex::new(0, 0, 0), 7, Vec3Fixed::ZERO);

    let events = tick_n(&mut sim, 20);
    let total: usize = events.iter().map(|e| e.spawned.len()).sum();
    assert_eq!(total, 7);
}

#[test]
fn unknown_part_command_raises_fault() {
    let mut sim = Simulation::new(fixtures::test_config()).unwrap();
    sim.enqueue_command(TrackCommand::PlaceModule {
        cell: CellIndex::new(0, 0, 0),
        part: PartId(999),
        upgrade_level: 0,
        rotation: 0,
    });

    let events = sim.tick();
    assert_eq!(events.faults.len(), 1);
    assert_eq!(events.faults[0].origin, FaultOrigin::TrackCommand);
    assert_eq!(events.faults[0].code, CODE_UNKNOWN_PART);
    assert_eq!(sim.entities().len(), 0);
}

#[test]
fn placement_rotation_is_accepted_and_ignored() {
    let build = |rotation| {
        let mut sim = Simulation::new(fixtures::test_config()).unwrap();
        sim.enqueue_command(TrackCommand::PlaceModule {
            cell: CellIndex::new(0, 0, 0),
            part: PART_SPLITTER,
            upgrade_level: 0,
            rotation,
        });
        sim.tick();
        sim
    };

    let upright = build(0);
    let turned = build(3);
    assert_eq!(upright.entities().len(), 1);
    assert_eq!(upright.state_hash(), turned.state_hash());
}
