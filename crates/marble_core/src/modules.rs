//! Module state machines: goal pads, lifts, splitters, collectors.
//!
//! All four read the spatial lookup cache for "what occupies my cell"
//! queries rather than scanning marbles. Each pass is an ordered
//! parallel map over ID-sorted module entities; structural changes go
//! through the mutation buffer, and updated state payloads are
//! committed serially by the scheduler after the pass.
//!
//! The pass order within a tick is fixed: goal, lift, splitter,
//! collector enqueue, flush, collector dequeue. Enqueue flushes before
//! dequeue so a same-tick arrival is queued before it is considered
//! for release.

use rayon::prelude::*;

use crate::components::{EntityId, LiftState, ModuleState, SplitterState};
use crate::grid::CellIndex;
use crate::mutation::Mutation;
use crate::spatial::SpatialCache;
use crate::store::EntityStorage;

/// ID-sorted view of entities carrying a particular module payload.
fn sorted_modules<'a, T, F>(
    storage: &'a EntityStorage,
    select: F,
) -> Vec<(EntityId, CellIndex, &'a T)>
where
    F: Fn(&'a ModuleState) -> Option<&'a T>,
{
    let mut out: Vec<(EntityId, CellIndex, &T)> = storage
        .iter()
        .filter_map(|(&id, entity)| {
            let module = entity.module.as_ref()?;
            select(&module.state).map(|payload| (id, module.cell, payload))
        })
        .collect();
    out.sort_unstable_by_key(|(id, _, _)| *id);
    out
}

/// Goal pads: every marble occupying a goal cell is consumed.
///
/// The counter increment and coin reward happen at replay, so two
/// goals sharing a cell cannot double-consume one marble.
#[must_use]
pub fn goal_pass(storage: &EntityStorage, cache: &SpatialCache) -> Vec<Vec<Mutation>> {
    let mut goals: Vec<(EntityId, CellIndex)> = storage
        .iter()
        .filter_map(|(&id, entity)| entity.goal.map(|g| (id, g.cell)))
        .collect();
    goals.sort_unstable_by_key(|(id, _)| *id);

    goals
        .par_iter()
        .map(|&(goal, cell)| {
            cache
                .marbles_at(cell)
                .iter()
                .map(|&marble| Mutation::GoalCollect { goal, marble })
                .collect()
        })
        .collect()
}

/// Lifts: stepped vertical motion.
///
/// While active and below target, a lift whose current platform cell
/// holds a marble carries that marble (the lowest-ID representative)
/// up exactly one cell and increments its height; reaching the target
/// deactivates it. Returns updated states alongside the mutations.
#[must_use]
pub fn lift_pass(
    storage: &EntityStorage,
    cache: &SpatialCache,
) -> (Vec<(EntityId, LiftState)>, Vec<Vec<Mutation>>) {
    let lifts = sorted_modules(storage, |state| match state {
        ModuleState::Lift(lift) => Some(lift),
        _ => None,
    });

    let results: Vec<((EntityId, LiftState), Vec<Mutation>)> = lifts
        .par_iter()
        .map(|&(id, base, lift)| {
            let mut state = *lift;
            let mut mutations = Vec::new();
            if state.is_active && state.current_height < state.target_height {
                let platform = base.offset(0, state.current_height as i32, 0);
                if let Some(marble) = cache.first_marble_at(platform) {
                    mutations.push(Mutation::LiftMarble { marble });
                    state.current_height += 1;
                    if state.current_height >= state.target_height {
                        state.is_active = false;
                    }
                }
            }
            ((id, state), mutations)
        })
        .collect();

    results.into_iter().unzip()
}

/// Splitters: route the representative marble through the selected exit.
#[must_use]
pub fn splitter_pass(
    storage: &EntityStorage,
    cache: &SpatialCache,
) -> (Vec<(EntityId, SplitterState)>, Vec<Vec<Mutation>>) {
    let splitters = sorted_modules(storage, |state| match state {
        ModuleState::Splitter(splitter) => Some(splitter),
        _ => None,
    });

    let results: Vec<((EntityId, SplitterState), Vec<Mutation>)> = splitters
        .par_iter()
        .map(|&(id, cell, splitter)| {
            let mut state = *splitter;
            let mut mutations = Vec::new();
            if let Some(marble) = cache.first_marble_at(cell) {
                let exit = state.select_exit();
                mutations.push(Mutation::RouteMarble { marble, exit });
            }
            ((id, state), mutations)
        })
        .collect();

    results.into_iter().unzip()
}

/// Collector enqueue sub-phase: capture marbles at collector cells.
///
/// The actual ring push (and any queue-full fault) happens at replay,
/// where the collector's mutable state is available.
#[must_use]
pub fn collector_enqueue_pass(
    storage: &EntityStorage,
    cache: &SpatialCache,
) -> Vec<Vec<Mutation>> {
    let collectors = sorted_modules(storage, |state| match state {
        ModuleState::Collector(collector) => Some(collector),
        _ => None,
    });

    collectors
        .par_iter()
        .map(|&(collector, cell, _)| {
            cache
                .marbles_at(cell)
                .iter()
                .map(|&marble| Mutation::CollectorEnqueue { collector, marble })
                .collect()
        })
        .collect()
}

/// Collector dequeue sub-phase: release marbles by upgrade policy.
///
/// Runs against post-enqueue queue state (its flush precedes this
/// pass), emitting one release record per non-empty collector.
#[must_use]
pub fn collector_release_pass(storage: &EntityStorage) -> Vec<Vec<Mutation>> {
    let collectors = sorted_modules(storage, |state| match state {
        ModuleState::Collector(collector) => Some(collector),
        _ => None,
    });

    collectors
        .par_iter()
        .map(|&(collector, _, state)| {
            let quota = state.release_quota();
            if quota > 0 {
                vec![Mutation::CollectorRelease { collector, quota }]
            } else {
                Vec::new()
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{CollectorState, GoalPad, Marble, Module};
    use crate::fault::FaultQueue;
    use crate::math::Fixed;
    use crate::parts::{PART_COLLECTOR, PART_LIFT, PART_SPLITTER};
    use crate::store::Entity;

    fn add_marble(storage: &mut EntityStorage, cell: CellIndex) -> EntityId {
        let mut entity = Entity::new(0);
        entity.marble = Some(Marble::at(cell.center(Fixed::from_num(1)), cell));
        storage.insert(entity)
    }

    fn rebuilt_cache(storage: &EntityStorage) -> SpatialCache {
        let mut cache = SpatialCache::with_capacity(16);
        let mut faults = FaultQueue::new();
        cache.rebuild(storage, &mut faults);
        cache
    }

    #[test]
    fn test_goal_pass_consumes_occupants() {
        let mut storage = EntityStorage::new();
        let cell = CellIndex::new(3, 0, 0);
        let mut entity = Entity::new(0);
        entity.goal = Some(GoalPad {
            cell,
            coin_reward: 2,
            marbles_collected: 0,
        });
        let goal = storage.insert(entity);
        let marble = add_marble(&mut storage, cell);
        add_marble(&mut storage, CellIndex::ORIGIN);

        let cache = rebuilt_cache(&storage);
        let mutations: Vec<Mutation> = goal_pass(&storage, &cache).into_iter().flatten().collect();
        assert_eq!(mutations, vec![Mutation::GoalCollect { goal, marble }]);
    }

    #[test]
    fn test_lift_steps_and_deactivates() {
        let mut storage = EntityStorage::new();
        let base = CellIndex::ORIGIN;
        let mut entity = Entity::new(0);
        entity.module = Some(Module {
            cell: base,
            part: PART_LIFT,
            state: ModuleState::Lift(LiftState::new(1)),
        });
        let id = storage.insert(entity);
        let marble = add_marble(&mut storage, base);

        let cache = rebuilt_cache(&storage);
        let (states, mutations) = lift_pass(&storage, &cache);

        assert_eq!(states.len(), 1);
        let (state_id, state) = states[0];
        assert_eq!(state_id, id);
        assert_eq!(state.current_height, 1);
        assert!(!state.is_active, "lift at target must deactivate");
        let flat: Vec<Mutation> = mutations.into_iter().flatten().collect();
        assert_eq!(flat, vec![Mutation::LiftMarble { marble }]);
    }

    #[test]
    fn test_inactive_lift_does_nothing() {
        let mut storage = EntityStorage::new();
        let mut entity = Entity::new(0);
        let mut lift = LiftState::new(5);
        lift.is_active = false;
        entity.module = Some(Module {
            cell: CellIndex::ORIGIN,
            part: PART_LIFT,
            state: ModuleState::Lift(lift),
        });
        storage.insert(entity);
        add_marble(&mut storage, CellIndex::ORIGIN);

        let cache = rebuilt_cache(&storage);
        let (states, mutations) = lift_pass(&storage, &cache);
        assert_eq!(states[0].1.current_height, 0);
        assert!(mutations.into_iter().flatten().next().is_none());
    }

    #[test]
    fn test_splitter_routes_lowest_id_marble() {
        let mut storage = EntityStorage::new();
        let cell = CellIndex::new(1, 0, 1);
        let mut entity = Entity::new(0);
        entity.module = Some(Module {
            cell,
            part: PART_SPLITTER,
            state: ModuleState::Splitter(SplitterState::default()),
        });
        storage.insert(entity);
        let first = add_marble(&mut storage, cell);
        let _second = add_marble(&mut storage, cell);

        let cache = rebuilt_cache(&storage);
        let (states, mutations) = splitter_pass(&storage, &cache);

        assert_eq!(states[0].1.current_exit, 1, "round-robin advanced");
        let flat: Vec<Mutation> = mutations.into_iter().flatten().collect();
        assert_eq!(
            flat,
            vec![Mutation::RouteMarble {
                marble: first,
                exit: 0
            }]
        );
    }

    #[test]
    fn test_splitter_idle_without_marble() {
        let mut storage = EntityStorage::new();
        let mut entity = Entity::new(0);
        entity.module = Some(Module {
            cell: CellIndex::ORIGIN,
            part: PART_SPLITTER,
            state: ModuleState::Splitter(SplitterState::default()),
        });
        storage.insert(entity);

        let cache = rebuilt_cache(&storage);
        let (states, mutations) = splitter_pass(&storage, &cache);
        // No marble: the round-robin pointer must not advance.
        assert_eq!(states[0].1.current_exit, 0);
        assert!(mutations.into_iter().flatten().next().is_none());
    }

    #[test]
    fn test_collector_enqueue_then_release_records() {
        let mut storage = EntityStorage::new();
        let cell = CellIndex::new(0, 0, 2);
        let mut entity = Entity::new(0);
        let mut queue = CollectorState::new(8, 1, 1);
        queue.enqueue(77, 0);
        entity.module = Some(Module {
            cell,
            part: PART_COLLECTOR,
            state: ModuleState::Collector(queue),
        });
        let collector = storage.insert(entity);
        let marble = add_marble(&mut storage, cell);

        let cache = rebuilt_cache(&storage);
        let enqueues: Vec<Mutation> = collector_enqueue_pass(&storage, &cache)
            .into_iter()
            .flatten()
            .collect();
        assert_eq!(enqueues, vec![Mutation::CollectorEnqueue { collector, marble }]);

        let releases: Vec<Mutation> = collector_release_pass(&storage)
            .into_iter()
            .flatten()
            .collect();
        assert_eq!(
            releases,
            vec![Mutation::CollectorRelease { collector, quota: 1 }]
        );
    }
}
