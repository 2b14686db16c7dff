//! The simulation scheduler.
//!
//! [`Simulation`] owns all state and advances it with a fixed-order,
//! three-phase tick:
//!
//! 1. **Input** - consume queued track commands and click actions,
//!    then run seed spawners.
//! 2. **Motion** - integrate all marbles in parallel over an ID-sorted
//!    snapshot, then resolve per-cell collisions.
//! 3. **Modules** - goal pads, lifts, splitters, then the collector
//!    enqueue and dequeue sub-phases.
//!
//! Parallel passes never mutate shared state. They emit [`Mutation`]
//! records into a buffer which the scheduler replays serially, in
//! enqueue order, at fixed flush points. Two simulations fed the same
//! configuration and input stream produce bit-identical state, which
//! [`Simulation::state_hash`] makes cheap to verify.

use std::collections::hash_map::DefaultHasher;
use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::collision::{self, CollisionTables};
use crate::commands::{ClickAction, TrackCommand, ACTION_PRIMARY};
use crate::components::{
    CollectorState, Connector, Debris, EntityId, GoalPad, LiftState, Marble, Module, ModuleState,
    SeedSpawner, SplitterState,
};
use crate::config::SimConfig;
use crate::error::{Result, SimError};
use crate::fault::{
    Fault, FaultOrigin, FaultQueue, CODE_BAD_PLACEMENT, CODE_QUEUE_FULL, CODE_UNKNOWN_ACTION,
    CODE_UNKNOWN_PART,
};
use crate::grid::{CellIndex, CellKey};
use crate::math::{Fixed, Vec3Fixed};
use crate::modules;
use crate::motion::{motion_pass, TrackLookup};
use crate::mutation::{Mutation, MutationBuffer};
use crate::parts::{PartId, PartKind, PartRegistry};
use crate::spatial::{ConnectorMap, SpatialCache};
use crate::store::{Entity, EntityStorage};

/// A goal pad consuming a marble this tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RewardEvent {
    /// Goal pad entity that consumed the marble.
    pub goal: EntityId,
    /// Coins awarded.
    pub coins: u32,
}

/// Events produced by a single call to [`Simulation::tick`].
///
/// The presentation layer reads these to trigger effects; the core
/// never depends on them.
#[derive(Debug, Clone, Default)]
pub struct TickEvents {
    /// Marbles created this tick (spawners and collector outlets).
    pub spawned: Vec<EntityId>,
    /// Marbles removed this tick by collision.
    pub destroyed: Vec<EntityId>,
    /// Debris entities created this tick.
    pub debris_created: Vec<EntityId>,
    /// Goal consumptions this tick.
    pub rewards: Vec<RewardEvent>,
    /// Non-fatal diagnostics raised this tick.
    pub faults: Vec<Fault>,
}

/// Serializable portion of the simulation.
///
/// Derived structures (spatial caches, the connector map, the part
/// occupancy map, the thread pool) are rebuilt on restore, so a
/// snapshot is just configuration, tick counter and entities.
#[derive(Serialize, Deserialize)]
struct SimState {
    config: SimConfig,
    tick: u64,
    entities: EntityStorage,
}

/// The deterministic marble-run simulation core.
pub struct Simulation {
    config: SimConfig,
    registry: PartRegistry,
    tick: u64,
    entities: EntityStorage,
    /// Persistent connector-by-cell map, maintained on edit.
    connectors: ConnectorMap,
    /// All part-occupied cells, for placement validation and removal.
    part_cells: HashMap<CellKey, EntityId>,
    cache: SpatialCache,
    collisions: CollisionTables,
    mutations: MutationBuffer,
    faults: FaultQueue,
    pending_commands: VecDeque<TrackCommand>,
    pending_clicks: VecDeque<ClickAction>,
    pool: rayon::ThreadPool,
}

impl Simulation {
    /// Create a simulation from a validated configuration.
    ///
    /// Construction fully succeeds or fails; there is no partially
    /// initialized state.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::InvalidConfig`] if the configuration is
    /// rejected or the worker pool cannot be built.
    pub fn new(config: SimConfig) -> Result<Self> {
        config.validate()?;
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.worker_threads)
            .build()
            .map_err(|e| SimError::InvalidConfig(format!("worker pool: {e}")))?;
        let max_marbles = config.max_marbles;
        Ok(Self {
            config,
            registry: PartRegistry::with_builtin_parts(),
            tick: 0,
            entities: EntityStorage::new(),
            connectors: ConnectorMap::new(),
            part_cells: HashMap::new(),
            cache: SpatialCache::with_capacity(max_marbles),
            collisions: CollisionTables::default(),
            mutations: MutationBuffer::new(),
            faults: FaultQueue::new(),
            pending_commands: VecDeque::new(),
            pending_clicks: VecDeque::new(),
            pool,
        })
    }

    /// Current tick number. Starts at 0 and increments once per tick.
    #[must_use]
    pub const fn get_tick(&self) -> u64 {
        self.tick
    }

    /// Active configuration.
    #[must_use]
    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Part catalog.
    #[must_use]
    pub fn registry(&self) -> &PartRegistry {
        &self.registry
    }

    /// Entity storage, read-only.
    #[must_use]
    pub fn entities(&self) -> &EntityStorage {
        &self.entities
    }

    /// Get an entity by ID.
    #[must_use]
    pub fn get_entity(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(id)
    }

    /// Get a mutable entity by ID.
    ///
    /// Cell occupancy of placed parts must not be edited through this;
    /// use [`Self::remove_part`] and the place methods instead.
    pub fn get_entity_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities.get_mut(id)
    }

    /// Number of live marbles.
    #[must_use]
    pub fn marble_count(&self) -> usize {
        self.entities
            .iter()
            .filter(|(_, e)| e.marble.is_some())
            .count()
    }

    /// Number of debris obstacles.
    #[must_use]
    pub fn debris_count(&self) -> usize {
        self.entities
            .iter()
            .filter(|(_, e)| e.debris.is_some())
            .count()
    }

    /// Queue a track edit for the next input phase.
    pub fn enqueue_command(&mut self, command: TrackCommand) {
        self.pending_commands.push_back(command);
    }

    /// Queue a click action. Applies at the first input phase whose
    /// tick is at least `at_tick`.
    pub fn enqueue_click(&mut self, click: ClickAction) {
        self.pending_clicks.push_back(click);
    }

    /// Spawn a marble at the center of a cell with the given velocity.
    pub fn spawn_marble(&mut self, cell: CellIndex, velocity: Vec3Fixed) -> EntityId {
        let mut entity = Entity::new(0);
        entity.marble =
            Some(Marble::at(cell.center(self.config.cell_size), cell).with_velocity(velocity));
        self.entities.insert(entity)
    }

    /// Add a marble source. A negative `max_count` spawns forever.
    pub fn add_seed_spawner(
        &mut self,
        cell: CellIndex,
        max_count: i64,
        initial_velocity: Vec3Fixed,
    ) -> EntityId {
        let mut entity = Entity::new(0);
        entity.spawner = Some(SeedSpawner {
            cell,
            max_count,
            spawned: 0,
            active: true,
            initial_velocity,
        });
        self.entities.insert(entity)
    }

    /// Place a stateful part (module or goal pad) directly.
    ///
    /// `upgrade_level` applies to collectors and is ignored otherwise.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::UnknownPart`] for an unregistered part id
    /// and [`SimError::InvalidState`] if the cell is occupied or the
    /// part is a connector.
    pub fn place_part(
        &mut self,
        cell: CellIndex,
        part: PartId,
        upgrade_level: u8,
    ) -> Result<EntityId> {
        let def = self
            .registry
            .get(part)
            .ok_or(SimError::UnknownPart(part.0))?
            .clone();
        if self.part_cells.contains_key(&cell.key()) {
            return Err(SimError::InvalidState(format!(
                "cell {cell:?} is already occupied"
            )));
        }
        let mut entity = Entity::new(0);
        match def.kind {
            PartKind::Splitter => {
                entity.module = Some(Module {
                    cell,
                    part,
                    state: ModuleState::Splitter(SplitterState::default()),
                });
            }
            PartKind::Collector => {
                entity.module = Some(Module {
                    cell,
                    part,
                    state: ModuleState::Collector(CollectorState::new(
                        def.queue_capacity,
                        upgrade_level,
                        def.burst_size,
                    )),
                });
            }
            PartKind::Lift => {
                entity.module = Some(Module {
                    cell,
                    part,
                    state: ModuleState::Lift(LiftState::new(def.lift_height)),
                });
            }
            PartKind::GoalPad => {
                entity.goal = Some(GoalPad {
                    cell,
                    coin_reward: def.coin_reward,
                    marbles_collected: 0,
                });
            }
            PartKind::Connector => {
                return Err(SimError::InvalidState(
                    "connector parts are placed with place_connector".into(),
                ));
            }
        }
        let id = self.entities.insert(entity);
        self.part_cells.insert(cell.key(), id);
        Ok(id)
    }

    /// Place a passive connector piece directly.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::UnknownPart`] for an unregistered part id
    /// and [`SimError::InvalidState`] if the cell is occupied or the
    /// part is not a connector.
    pub fn place_connector(&mut self, cell: CellIndex, part: PartId) -> Result<EntityId> {
        let def = self
            .registry
            .get(part)
            .ok_or(SimError::UnknownPart(part.0))?;
        if def.kind != PartKind::Connector {
            return Err(SimError::InvalidState(format!(
                "part {} is not a connector",
                part.0
            )));
        }
        if self.part_cells.contains_key(&cell.key()) {
            return Err(SimError::InvalidState(format!(
                "cell {cell:?} is already occupied"
            )));
        }
        let mut entity = Entity::new(0);
        entity.connector = Some(Connector { cell, part });
        let id = self.entities.insert(entity);
        self.connectors.insert(cell, id);
        self.part_cells.insert(cell.key(), id);
        Ok(id)
    }

    /// Remove the part occupying a cell. No-op if the cell is empty.
    pub fn remove_part(&mut self, cell: CellIndex) -> Option<EntityId> {
        let id = self.part_cells.remove(&cell.key())?;
        self.connectors.remove(cell);
        self.entities.remove(id);
        Some(id)
    }

    /// Clear all entities and restart at tick 0. Configuration and
    /// registry are kept.
    pub fn reset(&mut self) {
        self.entities.clear();
        self.connectors.clear();
        self.part_cells.clear();
        self.mutations.drain();
        self.faults.drain();
        self.pending_commands.clear();
        self.pending_clicks.clear();
        self.tick = 0;
    }

    /// Advance the simulation by one tick.
    ///
    /// Phases run in a fixed order. Within the module phase the pass
    /// order is goal, lift, splitter, collector enqueue, flush,
    /// collector dequeue, flush.
    pub fn tick(&mut self) -> TickEvents {
        let mut events = TickEvents::default();

        // Phase 1: input.
        self.apply_commands();
        self.apply_clicks();
        self.run_spawners(&mut events);

        // Phase 2: motion and collision.
        let track = TrackLookup::build(&self.entities, &self.registry);
        let snapshot = self.entities.marble_snapshot();
        let updated = self
            .pool
            .install(|| motion_pass(&snapshot, &track, &self.config));
        for (id, marble) in updated {
            if let Some(entity) = self.entities.get_mut(id) {
                entity.marble = Some(marble);
            }
        }
        self.collisions.rebuild(&self.entities);
        let jobs = self.pool.install(|| collision::resolve(&self.collisions));
        self.mutations.merge(jobs);
        self.flush_mutations(&mut events);

        // Phase 3: modules.
        self.cache.rebuild(&self.entities, &mut self.faults);

        let goal_jobs = self.pool.install(|| modules::goal_pass(&self.entities, &self.cache));
        self.mutations.merge(goal_jobs);

        let (lift_states, lift_jobs) = self
            .pool
            .install(|| modules::lift_pass(&self.entities, &self.cache));
        self.commit_lift_states(lift_states);
        self.mutations.merge(lift_jobs);

        let (splitter_states, splitter_jobs) = self
            .pool
            .install(|| modules::splitter_pass(&self.entities, &self.cache));
        self.commit_splitter_states(splitter_states);
        self.mutations.merge(splitter_jobs);

        let enqueue_jobs = self
            .pool
            .install(|| modules::collector_enqueue_pass(&self.entities, &self.cache));
        self.mutations.merge(enqueue_jobs);
        self.flush_mutations(&mut events);

        let release_jobs = self
            .pool
            .install(|| modules::collector_release_pass(&self.entities));
        self.mutations.merge(release_jobs);
        self.flush_mutations(&mut events);

        events.faults = self.faults.drain_and_log(self.tick);
        self.tick += 1;

        #[cfg(debug_assertions)]
        {
            let hash = self.state_hash();
            tracing::debug!(tick = self.tick, state_hash = hash, "simulation state hash");
        }

        events
    }

    /// Consume queued track commands in submission order.
    fn apply_commands(&mut self) {
        let commands: Vec<TrackCommand> = self.pending_commands.drain(..).collect();
        for command in commands {
            match command {
                TrackCommand::PlaceModule {
                    cell,
                    part,
                    upgrade_level,
                    rotation: _,
                } => match self.place_part(cell, part, upgrade_level) {
                    Ok(_) => {}
                    Err(SimError::UnknownPart(_)) => {
                        self.faults
                            .push(Fault::new(FaultOrigin::TrackCommand, CODE_UNKNOWN_PART));
                    }
                    Err(_) => {
                        self.faults
                            .push(Fault::new(FaultOrigin::TrackCommand, CODE_BAD_PLACEMENT));
                    }
                },
                TrackCommand::PlaceConnector {
                    cell,
                    part,
                    rotation: _,
                } => {
                    match self.place_connector(cell, part) {
                        Ok(_) => {}
                        Err(SimError::UnknownPart(_)) => {
                            self.faults
                                .push(Fault::new(FaultOrigin::TrackCommand, CODE_UNKNOWN_PART));
                        }
                        Err(_) => {
                            self.faults
                                .push(Fault::new(FaultOrigin::TrackCommand, CODE_BAD_PLACEMENT));
                        }
                    }
                }
                TrackCommand::RemovePart { cell } => {
                    self.remove_part(cell);
                }
                TrackCommand::Reset => self.reset(),
            }
        }
    }

    /// Consume click actions eligible this tick; keep future ones.
    ///
    /// A click stamped for an already-elapsed tick is not dropped; it
    /// applies at the first input phase that observes it.
    fn apply_clicks(&mut self) {
        let mut remaining = VecDeque::new();
        while let Some(click) = self.pending_clicks.pop_front() {
            if click.at_tick > self.tick {
                remaining.push_back(click);
                continue;
            }
            self.apply_click(click);
        }
        self.pending_clicks = remaining;
    }

    fn apply_click(&mut self, click: ClickAction) {
        if click.action != ACTION_PRIMARY {
            self.faults
                .push(Fault::new(FaultOrigin::ClickAction, CODE_UNKNOWN_ACTION));
            return;
        }
        let target = self
            .entities
            .get_mut(click.target)
            .and_then(|e| e.module.as_mut());
        match target.map(|m| &mut m.state) {
            Some(ModuleState::Splitter(splitter)) => splitter.toggle_override(),
            Some(ModuleState::Lift(lift)) => lift.is_active = !lift.is_active,
            _ => {
                self.faults
                    .push(Fault::new(FaultOrigin::ClickAction, CODE_UNKNOWN_ACTION));
            }
        }
    }

    /// Seed spawners emit at most one marble each per tick, skipping
    /// cells a marble already occupies.
    fn run_spawners(&mut self, events: &mut TickEvents) {
        let mut spawner_ids: Vec<EntityId> = self
            .entities
            .iter()
            .filter_map(|(&id, e)| e.spawner.map(|_| id))
            .collect();
        spawner_ids.sort_unstable();

        let mut occupied: HashSet<CellKey> = self
            .entities
            .iter()
            .filter_map(|(_, e)| e.marble.as_ref().map(|m| m.cell.key()))
            .collect();

        for id in spawner_ids {
            let Some(spawner) = self.entities.get(id).and_then(|e| e.spawner) else {
                continue;
            };
            if !spawner.can_spawn() || occupied.contains(&spawner.cell.key()) {
                continue;
            }
            let marble = self.spawn_marble(spawner.cell, spawner.initial_velocity);
            events.spawned.push(marble);
            occupied.insert(spawner.cell.key());
            if let Some(state) = self.entities.get_mut(id).and_then(|e| e.spawner.as_mut()) {
                state.spawned += 1;
                if state.exhausted() {
                    state.active = false;
                }
            }
        }
    }

    fn commit_lift_states(&mut self, states: Vec<(EntityId, LiftState)>) {
        for (id, state) in states {
            if let Some(module) = self.entities.get_mut(id).and_then(|e| e.module.as_mut()) {
                module.state = ModuleState::Lift(state);
            }
        }
    }

    fn commit_splitter_states(&mut self, states: Vec<(EntityId, SplitterState)>) {
        for (id, state) in states {
            if let Some(module) = self.entities.get_mut(id).and_then(|e| e.module.as_mut()) {
                module.state = ModuleState::Splitter(state);
            }
        }
    }

    /// Replay buffered mutations serially in enqueue order.
    ///
    /// Replay is tolerant: destruction clears the marble's `alive`
    /// flag, later mutations in the same flush skip dead marbles, and
    /// a sweep removes them before the flush returns.
    fn flush_mutations(&mut self, events: &mut TickEvents) {
        let mut dead: Vec<EntityId> = Vec::new();
        for mutation in self.mutations.drain() {
            match mutation {
                Mutation::DestroyMarble { marble } => {
                    if self.kill_marble(marble) {
                        dead.push(marble);
                        events.destroyed.push(marble);
                    }
                }
                Mutation::SpawnDebris { cell } => {
                    let mut entity = Entity::new(0);
                    entity.debris = Some(Debris { cell });
                    let id = self.entities.insert(entity);
                    events.debris_created.push(id);
                }
                Mutation::SpawnMarble { cell, velocity } => {
                    let id = self.spawn_marble(cell, velocity);
                    events.spawned.push(id);
                }
                Mutation::RouteMarble { marble, exit } => {
                    let speed = if exit == 0 {
                        self.config.route_speed
                    } else {
                        -self.config.route_speed
                    };
                    if let Some(m) = self.entities.get_mut(marble).and_then(|e| e.marble.as_mut())
                    {
                        if m.alive {
                            m.velocity = Vec3Fixed {
                                x: speed,
                                y: Fixed::ZERO,
                                z: Fixed::ZERO,
                            };
                        }
                    }
                }
                Mutation::LiftMarble { marble } => {
                    let cell_size = self.config.cell_size;
                    if let Some(m) = self.entities.get_mut(marble).and_then(|e| e.marble.as_mut())
                    {
                        if m.alive {
                            m.position.y += cell_size;
                            m.cell = m.cell.offset(0, 1, 0);
                            m.velocity = Vec3Fixed::ZERO;
                        }
                    }
                }
                Mutation::GoalCollect { goal, marble } => {
                    if self.kill_marble(marble) {
                        dead.push(marble);
                        if let Some(pad) =
                            self.entities.get_mut(goal).and_then(|e| e.goal.as_mut())
                        {
                            pad.marbles_collected += 1;
                            events.rewards.push(RewardEvent {
                                goal,
                                coins: pad.coin_reward,
                            });
                        }
                    }
                }
                Mutation::CollectorEnqueue { collector, marble } => {
                    self.replay_collector_enqueue(collector, marble, &mut dead);
                }
                Mutation::CollectorRelease { collector, quota } => {
                    self.replay_collector_release(collector, quota, events);
                }
            }
        }
        for id in dead {
            self.entities.remove(id);
        }
    }

    /// Clear the `alive` flag on a marble. Returns false if the
    /// entity is missing, not a marble, or already dead this flush.
    fn kill_marble(&mut self, id: EntityId) -> bool {
        match self.entities.get_mut(id).and_then(|e| e.marble.as_mut()) {
            Some(m) if m.alive => {
                m.alive = false;
                true
            }
            _ => false,
        }
    }

    fn replay_collector_enqueue(
        &mut self,
        collector: EntityId,
        marble: EntityId,
        dead: &mut Vec<EntityId>,
    ) {
        if !self
            .entities
            .get(marble)
            .is_some_and(|e| e.marble.as_ref().is_some_and(|m| m.alive))
        {
            return;
        }
        let full = match self.collector_state(collector) {
            Some(queue) => queue.is_full(),
            None => return,
        };
        if full {
            // The marble survives and stays in the world.
            self.faults
                .push(Fault::new(FaultOrigin::Collector, CODE_QUEUE_FULL));
            return;
        }
        if self.kill_marble(marble) {
            dead.push(marble);
        }
        let tick = self.tick;
        if let Some(queue) = self.collector_state_mut(collector) {
            queue.enqueue(marble, tick);
        }
    }

    fn replay_collector_release(
        &mut self,
        collector: EntityId,
        quota: u32,
        events: &mut TickEvents,
    ) {
        let Some(module) = self.entities.get(collector).and_then(|e| e.module.as_ref()) else {
            return;
        };
        let outlet = module.cell.offset(1, 0, 0);

        let released = match self.collector_state_mut(collector) {
            Some(queue) => {
                if quota >= queue.count {
                    queue.drain_all()
                } else {
                    (0..quota).filter_map(|_| queue.dequeue()).collect()
                }
            }
            None => return,
        };

        let velocity = Vec3Fixed {
            x: self.config.route_speed,
            y: Fixed::ZERO,
            z: Fixed::ZERO,
        };
        // Successive releases step one cell further downstream so a
        // burst leaves the outlet with the same one-cell spacing it
        // travels at, instead of stacking in a single cell.
        for step in 0..released.len() {
            let id = self.spawn_marble(outlet.offset(step as i32, 0, 0), velocity);
            events.spawned.push(id);
        }
    }

    fn collector_state(&self, id: EntityId) -> Option<&CollectorState> {
        match self.entities.get(id)?.module.as_ref()?.state {
            ModuleState::Collector(ref queue) => Some(queue),
            _ => None,
        }
    }

    fn collector_state_mut(&mut self, id: EntityId) -> Option<&mut CollectorState> {
        match self.entities.get_mut(id)?.module.as_mut()?.state {
            ModuleState::Collector(ref mut queue) => Some(queue),
            _ => None,
        }
    }

    /// Hash of the full simulation state.
    ///
    /// Two simulations with identical state produce identical hashes;
    /// fixed-point values are hashed through their raw bits.
    #[must_use]
    pub fn state_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.tick.hash(&mut hasher);

        let ids = self.entities.sorted_ids();
        ids.len().hash(&mut hasher);

        for id in ids {
            let Some(entity) = self.entities.get(id) else {
                continue;
            };
            id.hash(&mut hasher);

            if let Some(ref marble) = entity.marble {
                hash_vec(&marble.position, &mut hasher);
                hash_vec(&marble.velocity, &mut hasher);
                marble.cell.hash(&mut hasher);
                marble.alive.hash(&mut hasher);
            }

            if let Some(ref debris) = entity.debris {
                debris.cell.hash(&mut hasher);
            }

            if let Some(ref module) = entity.module {
                module.cell.hash(&mut hasher);
                module.part.hash(&mut hasher);
                match module.state {
                    ModuleState::Splitter(ref s) => {
                        s.current_exit.hash(&mut hasher);
                        s.override_exit.hash(&mut hasher);
                        s.override_value.hash(&mut hasher);
                    }
                    ModuleState::Collector(ref c) => {
                        c.count.hash(&mut hasher);
                        c.upgrade_level.hash(&mut hasher);
                        c.burst_size.hash(&mut hasher);
                        for entry in c.iter() {
                            entry.marble.hash(&mut hasher);
                            entry.enqueue_tick.hash(&mut hasher);
                        }
                    }
                    ModuleState::Lift(ref l) => {
                        l.is_active.hash(&mut hasher);
                        l.current_height.hash(&mut hasher);
                        l.target_height.hash(&mut hasher);
                    }
                }
            }

            if let Some(ref connector) = entity.connector {
                connector.cell.hash(&mut hasher);
                connector.part.hash(&mut hasher);
            }

            if let Some(ref goal) = entity.goal {
                goal.cell.hash(&mut hasher);
                goal.coin_reward.hash(&mut hasher);
                goal.marbles_collected.hash(&mut hasher);
            }

            if let Some(ref spawner) = entity.spawner {
                spawner.cell.hash(&mut hasher);
                spawner.max_count.hash(&mut hasher);
                spawner.spawned.hash(&mut hasher);
                spawner.active.hash(&mut hasher);
                hash_vec(&spawner.initial_velocity, &mut hasher);
            }
        }

        hasher.finish()
    }

    /// Serialize the simulation state for snapshots and replays.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn serialize(&self) -> Result<Vec<u8>> {
        let state = SimState {
            config: self.config.clone(),
            tick: self.tick,
            entities: self.entities.clone(),
        };
        bincode::serialize(&state)
            .map_err(|e| SimError::InvalidState(format!("failed to serialize simulation: {e}")))
    }

    /// Restore a simulation from serialized state.
    ///
    /// Derived maps and the worker pool are rebuilt from the restored
    /// entities.
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes do not decode or the embedded
    /// configuration is invalid.
    pub fn deserialize(data: &[u8]) -> Result<Self> {
        let state: SimState = bincode::deserialize(data)
            .map_err(|e| SimError::InvalidState(format!("failed to deserialize simulation: {e}")))?;
        let mut sim = Self::new(state.config)?;
        sim.tick = state.tick;
        sim.entities = state.entities;
        sim.rebuild_derived_maps();
        Ok(sim)
    }

    /// Recompute the connector and occupancy maps from entities.
    fn rebuild_derived_maps(&mut self) {
        self.connectors.clear();
        self.part_cells.clear();
        for id in self.entities.sorted_ids() {
            let Some(entity) = self.entities.get(id) else {
                continue;
            };
            if let Some(ref connector) = entity.connector {
                self.connectors.insert(connector.cell, id);
                self.part_cells.insert(connector.cell.key(), id);
            }
            if let Some(ref module) = entity.module {
                self.part_cells.insert(module.cell.key(), id);
            }
            if let Some(ref goal) = entity.goal {
                self.part_cells.insert(goal.cell.key(), id);
            }
        }
    }
}

fn hash_vec(v: &Vec3Fixed, hasher: &mut DefaultHasher) {
    v.x.to_bits().hash(hasher);
    v.y.to_bits().hash(hasher);
    v.z.to_bits().hash(hasher);
}

impl fmt::Debug for Simulation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Simulation")
            .field("tick", &self.tick)
            .field("entities", &self.entities.len())
            .finish_non_exhaustive()
    }
}
