//! Spatial lookup caches.
//!
//! Per-tick rebuilt maps from packed cell keys to the entities
//! occupying them, giving module logic O(1) "what is at this cell"
//! queries instead of scans over all marbles. Caches are owned by one
//! simulation instance, cleared and repopulated every tick, and grow
//! by capacity doubling against a high-water mark so steady-state
//! rebuilds never reallocate.
//!
//! The scan over entities runs on the worker pool; classification
//! results are sorted by (map, key, id) before the serial merge, so
//! cache contents are identical regardless of which worker produced
//! which entry.

use std::collections::HashMap;

use rayon::prelude::*;

use crate::components::{EntityId, ModuleState};
use crate::fault::{Fault, FaultOrigin, FaultQueue, CODE_DUPLICATE_MODULE};
use crate::grid::{CellIndex, CellKey};
use crate::store::EntityStorage;

/// Which cache a scanned entity belongs in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum MapKind {
    Splitter,
    Lift,
    Goal,
    Marble,
}

/// Per-tick rebuilt cell-occupancy maps.
#[derive(Debug, Default)]
pub struct SpatialCache {
    /// Splitter entity per cell (1:1).
    splitters: HashMap<CellKey, EntityId>,
    /// Lift entity per current platform cell (1:1).
    lifts: HashMap<CellKey, EntityId>,
    /// Goal pads per cell (1:many), ascending IDs.
    goals: HashMap<CellKey, Vec<EntityId>>,
    /// Marbles per cell (1:many), ascending IDs.
    marbles: HashMap<CellKey, Vec<EntityId>>,
    /// High-water mark for observed marble count.
    marble_high_water: usize,
    /// High-water mark for observed module + goal count.
    module_high_water: usize,
}

impl SpatialCache {
    /// Create an empty cache pre-sized for an expected marble budget.
    #[must_use]
    pub fn with_capacity(max_marbles: usize) -> Self {
        Self {
            splitters: HashMap::new(),
            lifts: HashMap::new(),
            goals: HashMap::new(),
            marbles: HashMap::with_capacity(max_marbles),
            marble_high_water: max_marbles,
            module_high_water: 0,
        }
    }

    /// Clear and repopulate every map from the entity store.
    ///
    /// Duplicate insertion into a 1:1 map is a configuration fault:
    /// recorded, not fatal; the lowest entity ID wins the cell.
    pub fn rebuild(&mut self, storage: &EntityStorage, faults: &mut FaultQueue) {
        self.splitters.clear();
        self.lifts.clear();
        self.goals.clear();
        self.marbles.clear();

        let entries: Vec<(EntityId, &crate::store::Entity)> =
            storage.iter().map(|(&id, entity)| (id, entity)).collect();

        let mut tagged: Vec<(MapKind, CellKey, EntityId)> = entries
            .par_iter()
            .flat_map_iter(|&(id, entity)| {
                let mut out = Vec::with_capacity(2);
                if let Some(marble) = &entity.marble {
                    out.push((MapKind::Marble, marble.cell.key(), id));
                }
                if let Some(module) = &entity.module {
                    match &module.state {
                        ModuleState::Splitter(_) => {
                            out.push((MapKind::Splitter, module.cell.key(), id));
                        }
                        ModuleState::Lift(lift) => {
                            let platform =
                                module.cell.offset(0, lift.current_height as i32, 0);
                            out.push((MapKind::Lift, platform.key(), id));
                        }
                        ModuleState::Collector(_) => {}
                    }
                }
                if let Some(goal) = &entity.goal {
                    out.push((MapKind::Goal, goal.cell.key(), id));
                }
                out
            })
            .collect();

        // Deterministic merge order regardless of scan order.
        tagged.sort_unstable();

        let mut marble_count = 0usize;
        let mut module_count = 0usize;
        for (kind, key, id) in tagged {
            match kind {
                MapKind::Splitter => {
                    module_count += 1;
                    if self.splitters.contains_key(&key) {
                        faults.push(Fault::new(FaultOrigin::Spatial, CODE_DUPLICATE_MODULE));
                    } else {
                        self.splitters.insert(key, id);
                    }
                }
                MapKind::Lift => {
                    module_count += 1;
                    if self.lifts.contains_key(&key) {
                        faults.push(Fault::new(FaultOrigin::Spatial, CODE_DUPLICATE_MODULE));
                    } else {
                        self.lifts.insert(key, id);
                    }
                }
                MapKind::Goal => {
                    module_count += 1;
                    self.goals.entry(key).or_default().push(id);
                }
                MapKind::Marble => {
                    marble_count += 1;
                    self.marbles.entry(key).or_default().push(id);
                }
            }
        }

        self.grow_high_water(marble_count, module_count);
    }

    /// Double the stored high-water marks until they cover the
    /// observed counts, reserving map capacity to match. Never shrinks.
    fn grow_high_water(&mut self, marble_count: usize, module_count: usize) {
        if marble_count > self.marble_high_water {
            let mut target = self.marble_high_water.max(1);
            while target < marble_count {
                target *= 2;
            }
            self.marble_high_water = target;
            self.marbles.reserve(target.saturating_sub(self.marbles.len()));
        }
        if module_count > self.module_high_water {
            let mut target = self.module_high_water.max(1);
            while target < module_count {
                target *= 2;
            }
            self.module_high_water = target;
        }
    }

    /// Splitter entity occupying a cell, if any.
    #[must_use]
    pub fn splitter_at(&self, cell: CellIndex) -> Option<EntityId> {
        self.splitters.get(&cell.key()).copied()
    }

    /// Lift entity whose platform occupies a cell, if any.
    #[must_use]
    pub fn lift_at(&self, cell: CellIndex) -> Option<EntityId> {
        self.lifts.get(&cell.key()).copied()
    }

    /// Goal pads occupying a cell, ascending IDs.
    #[must_use]
    pub fn goals_at(&self, cell: CellIndex) -> &[EntityId] {
        self.goals.get(&cell.key()).map_or(&[], Vec::as_slice)
    }

    /// Marbles occupying a cell, ascending IDs.
    #[must_use]
    pub fn marbles_at(&self, cell: CellIndex) -> &[EntityId] {
        self.marbles.get(&cell.key()).map_or(&[], Vec::as_slice)
    }

    /// Representative marble for a cell: the lowest stable identity,
    /// deterministic regardless of insertion order from parallel scans.
    #[must_use]
    pub fn first_marble_at(&self, cell: CellIndex) -> Option<EntityId> {
        self.marbles_at(cell).first().copied()
    }

    /// Current marble high-water mark (test hook for growth policy).
    #[must_use]
    pub fn marble_high_water(&self) -> usize {
        self.marble_high_water
    }
}

/// Persistent map of connectors by cell.
///
/// Connectors never move, so this map is maintained on placement and
/// removal rather than rebuilt per tick.
#[derive(Debug, Clone, Default)]
pub struct ConnectorMap {
    cells: HashMap<CellKey, EntityId>,
}

impl ConnectorMap {
    /// Create an empty map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a placed connector. Returns false if the cell was taken.
    pub fn insert(&mut self, cell: CellIndex, id: EntityId) -> bool {
        match self.cells.entry(cell.key()) {
            std::collections::hash_map::Entry::Occupied(_) => false,
            std::collections::hash_map::Entry::Vacant(slot) => {
                slot.insert(id);
                true
            }
        }
    }

    /// Remove the connector at a cell.
    pub fn remove(&mut self, cell: CellIndex) -> Option<EntityId> {
        self.cells.remove(&cell.key())
    }

    /// Connector entity occupying a cell, if any.
    #[must_use]
    pub fn get(&self, cell: CellIndex) -> Option<EntityId> {
        self.cells.get(&cell.key()).copied()
    }

    /// Remove every connector.
    pub fn clear(&mut self) {
        self.cells.clear();
    }
}
