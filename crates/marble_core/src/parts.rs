//! Part definitions.
//!
//! A part is the immutable, shared description of something an
//! authoring layer can place on the grid: a module (splitter,
//! collector, lift, goal pad) or a passive connector (flat or sloped
//! track segment). Placed entities carry a [`PartId`] and read shared
//! data through the [`PartRegistry`]; mutable runtime state lives on
//! the entity, never on the definition.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::math::{fixed_serde, Fixed};

/// Identifier for a part definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PartId(pub u32);

/// What a part does when placed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PartKind {
    /// Routes marbles between two exits.
    Splitter,
    /// Queues marbles and releases them by upgrade policy.
    Collector,
    /// Carries marbles upward one cell per tick.
    Lift,
    /// Consumes marbles and awards coins.
    GoalPad,
    /// Passive track segment contributing only to acceleration.
    Connector,
}

/// Immutable shared definition data for a part.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartDef {
    /// Part identifier.
    pub id: PartId,
    /// Behavior class.
    pub kind: PartKind,
    /// Footprint in cells (width, depth). All built-in parts are 1x1.
    pub footprint: (u8, u8),
    /// Forward acceleration imparted by a sloped connector
    /// (world units per second squared along +x). Zero for flat parts.
    #[serde(with = "fixed_serde")]
    pub ramp_accel: Fixed,
    /// Whether a connector is sloped rather than flat.
    pub sloped: bool,
    /// Collector ring-buffer capacity. Must be a power of two.
    pub queue_capacity: u32,
    /// Marbles released per tick at collector upgrade level 2.
    pub burst_size: u32,
    /// Coins awarded per marble by a goal pad.
    pub coin_reward: u32,
    /// Lift travel in cells.
    pub lift_height: u32,
}

impl PartDef {
    /// Create a definition with neutral constants for the given kind.
    #[must_use]
    pub fn new(id: PartId, kind: PartKind) -> Self {
        Self {
            id,
            kind,
            footprint: (1, 1),
            ramp_accel: Fixed::ZERO,
            sloped: false,
            queue_capacity: 8,
            burst_size: 4,
            coin_reward: 1,
            lift_height: 4,
        }
    }

    /// Builder method to set ramp acceleration (marks the part sloped).
    #[must_use]
    pub fn with_ramp_accel(mut self, accel: Fixed) -> Self {
        self.ramp_accel = accel;
        self.sloped = accel != Fixed::ZERO;
        self
    }

    /// Builder method to set collector queue capacity.
    ///
    /// Capacity is rounded up to the next power of two so wraparound
    /// can use a bitwise mask.
    #[must_use]
    pub fn with_queue_capacity(mut self, capacity: u32) -> Self {
        self.queue_capacity = capacity.max(1).next_power_of_two();
        self
    }

    /// Builder method to set level-2 burst size.
    #[must_use]
    pub const fn with_burst_size(mut self, burst: u32) -> Self {
        self.burst_size = burst;
        self
    }

    /// Builder method to set the goal coin reward.
    #[must_use]
    pub const fn with_coin_reward(mut self, coins: u32) -> Self {
        self.coin_reward = coins;
        self
    }

    /// Builder method to set lift travel height.
    #[must_use]
    pub const fn with_lift_height(mut self, height: u32) -> Self {
        self.lift_height = height;
        self
    }
}

/// Built-in part id: basic splitter.
pub const PART_SPLITTER: PartId = PartId(1);
/// Built-in part id: basic collector.
pub const PART_COLLECTOR: PartId = PartId(2);
/// Built-in part id: basic lift.
pub const PART_LIFT: PartId = PartId(3);
/// Built-in part id: goal pad.
pub const PART_GOAL: PartId = PartId(4);
/// Built-in part id: flat connector.
pub const PART_FLAT_CONNECTOR: PartId = PartId(5);
/// Built-in part id: sloped connector.
pub const PART_RAMP_CONNECTOR: PartId = PartId(6);

/// Registry of immutable part definitions indexed by ID.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartRegistry {
    parts: HashMap<PartId, PartDef>,
}

impl PartRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            parts: HashMap::new(),
        }
    }

    /// Registry preloaded with the built-in part set.
    #[must_use]
    pub fn with_builtin_parts() -> Self {
        let mut registry = Self::new();
        registry.register(PartDef::new(PART_SPLITTER, PartKind::Splitter));
        registry.register(
            PartDef::new(PART_COLLECTOR, PartKind::Collector)
                .with_queue_capacity(8)
                .with_burst_size(4),
        );
        registry.register(PartDef::new(PART_LIFT, PartKind::Lift).with_lift_height(4));
        registry.register(PartDef::new(PART_GOAL, PartKind::GoalPad).with_coin_reward(1));
        registry.register(PartDef::new(PART_FLAT_CONNECTOR, PartKind::Connector));
        registry.register(
            PartDef::new(PART_RAMP_CONNECTOR, PartKind::Connector)
                .with_ramp_accel(Fixed::from_num(10)),
        );
        registry
    }

    /// Register or replace a definition.
    pub fn register(&mut self, def: PartDef) {
        self.parts.insert(def.id, def);
    }

    /// Look up a definition.
    #[must_use]
    pub fn get(&self, id: PartId) -> Option<&PartDef> {
        self.parts.get(&id)
    }

    /// Number of registered parts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.parts.len()
    }

    /// Check whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }
}

impl Default for PartRegistry {
    fn default() -> Self {
        Self::with_builtin_parts()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_parts_present() {
        let registry = PartRegistry::with_builtin_parts();
        for id in [
            PART_SPLITTER,
            PART_COLLECTOR,
            PART_LIFT,
            PART_GOAL,
            PART_FLAT_CONNECTOR,
            PART_RAMP_CONNECTOR,
        ] {
            assert!(registry.get(id).is_some(), "missing builtin {id:?}");
        }
    }

    #[test]
    fn test_queue_capacity_power_of_two() {
        let def = PartDef::new(PartId(99), PartKind::Collector).with_queue_capacity(5);
        assert_eq!(def.queue_capacity, 8);
        let def = PartDef::new(PartId(99), PartKind::Collector).with_queue_capacity(16);
        assert_eq!(def.queue_capacity, 16);
    }

    #[test]
    fn test_ramp_accel_marks_sloped() {
        let def = PartDef::new(PartId(7), PartKind::Connector)
            .with_ramp_accel(Fixed::from_num(3));
        assert!(def.sloped);
        assert!(!PartDef::new(PartId(8), PartKind::Connector).sloped);
    }
}
