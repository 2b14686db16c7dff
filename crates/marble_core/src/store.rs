//! Entity storage.
//!
//! Entities are composed of optional component slots; only slots that
//! are `Some` are active. Storage is a `HashMap` for O(1) lookup by
//! ID, with deterministic iteration via sorted keys when systems run.
//! There is no inheritance modeling of entity kinds: an entity's
//! archetype is exactly the set of slots it carries.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::components::{Connector, Debris, EntityId, GoalPad, Marble, Module, SeedSpawner};

/// An entity with optional components.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    /// Unique identifier for this entity.
    pub id: EntityId,
    /// Marble data for moving entities.
    pub marble: Option<Marble>,
    /// Debris data for collision obstacles.
    pub debris: Option<Debris>,
    /// Module data for splitters, collectors and lifts.
    pub module: Option<Module>,
    /// Connector data for passive track segments.
    pub connector: Option<Connector>,
    /// Goal pad data.
    pub goal: Option<GoalPad>,
    /// Seed spawner data.
    pub spawner: Option<SeedSpawner>,
}

impl Entity {
    /// Create a new entity with the given ID and no components.
    #[must_use]
    pub fn new(id: EntityId) -> Self {
        Self {
            id,
            marble: None,
            debris: None,
            module: None,
            connector: None,
            goal: None,
            spawner: None,
        }
    }
}

/// Storage for all entities in the simulation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EntityStorage {
    /// Map of entity ID to entity data.
    entities: HashMap<EntityId, Entity>,
    /// Next entity ID to assign.
    next_id: EntityId,
}

impl EntityStorage {
    /// Create empty entity storage.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entities: HashMap::new(),
            next_id: 1,
        }
    }

    /// Insert a new entity and return its ID.
    pub fn insert(&mut self, mut entity: Entity) -> EntityId {
        let id = self.next_id;
        self.next_id += 1;
        entity.id = id;
        self.entities.insert(id, entity);
        id
    }

    /// Remove an entity by ID.
    pub fn remove(&mut self, id: EntityId) -> Option<Entity> {
        self.entities.remove(&id)
    }

    /// Get an entity by ID.
    #[must_use]
    pub fn get(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(&id)
    }

    /// Get a mutable reference to an entity by ID.
    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities.get_mut(&id)
    }

    /// Check if an entity exists.
    #[must_use]
    pub fn contains(&self, id: EntityId) -> bool {
        self.entities.contains_key(&id)
    }

    /// Get the number of entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Check if storage is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Remove every entity and restart ID assignment.
    pub fn clear(&mut self) {
        self.entities.clear();
        self.next_id = 1;
    }

    /// Get sorted entity IDs for deterministic iteration.
    #[must_use]
    pub fn sorted_ids(&self) -> Vec<EntityId> {
        let mut ids: Vec<_> = self.entities.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Iterate over all entities (not in deterministic order).
    pub fn iter(&self) -> impl Iterator<Item = (&EntityId, &Entity)> {
        self.entities.iter()
    }

    /// Snapshot of live marbles in ascending ID order.
    ///
    /// Used by the parallel phases: a copied, ordered view keeps the
    /// parallel work independent of map iteration order.
    #[must_use]
    pub fn marble_snapshot(&self) -> Vec<(EntityId, Marble)> {
        let mut marbles: Vec<(EntityId, Marble)> = self
            .entities
            .iter()
            .filter_map(|(&id, entity)| entity.marble.map(|m| (id, m)))
            .collect();
        marbles.sort_unstable_by_key(|(id, _)| *id);
        marbles
    }

    /// IDs of entities carrying a module slot, ascending.
    #[must_use]
    pub fn module_ids(&self) -> Vec<EntityId> {
        let mut ids: Vec<EntityId> = self
            .entities
            .iter()
            .filter(|(_, entity)| entity.module.is_some())
            .map(|(&id, _)| id)
            .collect();
        ids.sort_unstable();
        ids
    }
}
