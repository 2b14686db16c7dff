//! Cell-hash collision detection and resolution.
//!
//! Two hash structures are rebuilt every tick: the set of cells
//! containing debris, and a multi-map from cell to the marbles in it.
//! Resolution runs over the *unique* occupied cells, never per marble
//! or per pair, so the outcome is a set property of the cell: it does
//! not depend on marble iteration order, thread assignment, or which
//! marble "arrived first". All destroys and debris creation go through
//! the deferred mutation buffer; detection never mutates the store.

use std::collections::{HashMap, HashSet};

use rayon::prelude::*;

use crate::components::EntityId;
use crate::grid::CellKey;
use crate::mutation::Mutation;
use crate::store::EntityStorage;

/// Per-tick collision hash structures.
#[derive(Debug, Default)]
pub struct CollisionTables {
    /// Cells occupied by debris.
    debris: HashSet<CellKey>,
    /// Marbles per occupied cell, ascending IDs.
    marbles: HashMap<CellKey, Vec<EntityId>>,
}

impl CollisionTables {
    /// Clear and repopulate both structures from the entity store.
    pub fn rebuild(&mut self, storage: &EntityStorage) {
        self.debris.clear();
        self.marbles.clear();

        for (&id, entity) in storage.iter() {
            if let Some(debris) = &entity.debris {
                self.debris.insert(debris.cell.key());
            }
            if let Some(marble) = &entity.marble {
                self.marbles.entry(marble.cell.key()).or_default().push(id);
            }
        }
        for ids in self.marbles.values_mut() {
            ids.sort_unstable();
        }
    }

    /// Whether a cell holds debris.
    #[must_use]
    pub fn debris_at(&self, key: CellKey) -> bool {
        self.debris.contains(&key)
    }

    /// Number of distinct cells holding at least one marble.
    #[must_use]
    pub fn occupied_cells(&self) -> usize {
        self.marbles.len()
    }
}

/// Resolve collisions over the unique occupied cells.
///
/// Per cell, as a set operation:
/// - debris present: every marble in the cell is destroyed, no new
///   debris (the obstacle already exists);
/// - two or more marbles: every marble is destroyed and exactly one
///   debris entity is created at the cell;
/// - otherwise: no action.
///
/// Cells are processed as an ordered parallel map over sorted packed
/// keys, so the returned mutation order is fully deterministic.
#[must_use]
pub fn resolve(tables: &CollisionTables) -> Vec<Vec<Mutation>> {
    let mut keys: Vec<CellKey> = tables.marbles.keys().copied().collect();
    keys.sort_unstable();

    keys.par_iter()
        .map(|key| {
            let ids = &tables.marbles[key];
            let mut out = Vec::new();
            if tables.debris.contains(key) {
                for &marble in ids {
                    out.push(Mutation::DestroyMarble { marble });
                }
            } else if ids.len() >= 2 {
                for &marble in ids {
                    out.push(Mutation::DestroyMarble { marble });
                }
                out.push(Mutation::SpawnDebris {
                    cell: key.unpack(),
                });
            }
            out
        })
        .collect()
}
