//! Entity component definitions.
//!
//! Components are pure data with no behavior beyond small state
//! helpers. All simulated entities are composed of these components;
//! the systems in [`motion`](crate::motion), [`collision`](crate::collision)
//! and [`modules`](crate::modules) contain the logic.

use serde::{Deserialize, Serialize};

use crate::grid::CellIndex;
use crate::math::Vec3Fixed;
use crate::parts::PartId;

/// Unique identifier for entities.
pub type EntityId = u64;

/// A moving marble.
///
/// Mutated only by the motion integrator, module state machines, and
/// destroyed by collision or goal consumption. The invariant
/// `cell == floor(position / cell_size)` is re-established every tick
/// after integration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Marble {
    /// Continuous world position.
    pub position: Vec3Fixed,
    /// Velocity in world units per second.
    pub velocity: Vec3Fixed,
    /// Acceleration computed this tick, before integration.
    pub acceleration: Vec3Fixed,
    /// Grid cell currently occupied.
    pub cell: CellIndex,
    /// Cleared when a replayed mutation destroys or consumes the
    /// marble; later mutations in the same flush skip dead marbles,
    /// and the flush sweep removes them.
    pub alive: bool,
}

impl Marble {
    /// Create a live marble at rest.
    #[must_use]
    pub fn at(position: Vec3Fixed, cell: CellIndex) -> Self {
        Self {
            position,
            velocity: Vec3Fixed::ZERO,
            acceleration: Vec3Fixed::ZERO,
            cell,
            alive: true,
        }
    }

    /// Builder method to set the initial velocity.
    #[must_use]
    pub fn with_velocity(mut self, velocity: Vec3Fixed) -> Self {
        self.velocity = velocity;
        self
    }
}

/// A permanent obstacle left by a marble-to-marble collision.
/// Never moves and never despawns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Debris {
    /// Grid cell occupied.
    pub cell: CellIndex,
}

/// Splitter runtime state: alternating or overridden exit selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SplitterState {
    /// Round-robin exit pointer (0 or 1).
    pub current_exit: u8,
    /// Whether the override takes precedence over round-robin.
    pub override_exit: bool,
    /// Exit used while overridden.
    pub override_value: u8,
}

impl SplitterState {
    /// Select the exit for the next marble and advance internal state.
    pub fn select_exit(&mut self) -> u8 {
        if self.override_exit {
            self.override_value
        } else {
            let exit = self.current_exit;
            self.current_exit ^= 1;
            exit
        }
    }

    /// Toggle the override flag. When the override turns on, its value
    /// is set to the exit opposite the round-robin pointer.
    pub fn toggle_override(&mut self) {
        self.override_exit = !self.override_exit;
        if self.override_exit {
            self.override_value = self.current_exit ^ 1;
        }
    }
}

/// One queued marble in a collector ring buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct QueuedMarble {
    /// Identity of the captured marble.
    pub marble: EntityId,
    /// Tick on which it was enqueued.
    pub enqueue_tick: u64,
}

/// Collector runtime state: a circular queue with power-of-two
/// capacity, so wraparound is a bitwise AND with `capacity - 1`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectorState {
    /// Ring buffer slots.
    slots: Vec<QueuedMarble>,
    /// Index of the next entry to release.
    pub head: u32,
    /// Index of the next free slot.
    pub tail: u32,
    /// Number of queued entries.
    pub count: u32,
    /// Wraparound mask, `capacity - 1`.
    pub capacity_mask: u32,
    /// Dequeue policy level (0, 1 or 2; anything else acts as 0).
    pub upgrade_level: u8,
    /// Marbles released per tick at level 2.
    pub burst_size: u32,
}

impl CollectorState {
    /// Create an empty queue. Capacity is rounded up to a power of two.
    #[must_use]
    pub fn new(capacity: u32, upgrade_level: u8, burst_size: u32) -> Self {
        let capacity = capacity.max(1).next_power_of_two();
        Self {
            slots: vec![QueuedMarble::default(); capacity as usize],
            head: 0,
            tail: 0,
            count: 0,
            capacity_mask: capacity - 1,
            upgrade_level,
            burst_size,
        }
    }

    /// Total slot count.
    #[must_use]
    pub fn capacity(&self) -> u32 {
        self.capacity_mask + 1
    }

    /// Whether the queue holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Whether the queue cannot accept another entry.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.count > self.capacity_mask
    }

    /// Append an entry at the tail. Returns false if the queue is full.
    pub fn enqueue(&mut self, marble: EntityId, enqueue_tick: u64) -> bool {
        if self.is_full() {
            return false;
        }
        self.slots[(self.tail & self.capacity_mask) as usize] = QueuedMarble {
            marble,
            enqueue_tick,
        };
        self.tail = (self.tail + 1) & self.capacity_mask;
        self.count += 1;
        true
    }

    /// Remove and return the entry at the head.
    pub fn dequeue(&mut self) -> Option<QueuedMarble> {
        if self.is_empty() {
            return None;
        }
        let entry = self.slots[(self.head & self.capacity_mask) as usize];
        self.head = (self.head + 1) & self.capacity_mask;
        self.count -= 1;
        Some(entry)
    }

    /// Drain every entry in FIFO order and reset head/tail/count to 0.
    pub fn drain_all(&mut self) -> Vec<QueuedMarble> {
        let mut entries = Vec::with_capacity(self.count as usize);
        while let Some(entry) = self.dequeue() {
            entries.push(entry);
        }
        self.head = 0;
        self.tail = 0;
        self.count = 0;
        entries
    }

    /// Visit queued entries in FIFO order without consuming them.
    pub fn iter(&self) -> impl Iterator<Item = QueuedMarble> + '_ {
        (0..self.count).map(move |i| self.slots[((self.head + i) & self.capacity_mask) as usize])
    }

    /// How many marbles this collector releases on a tick where it
    /// holds `count` entries, per the upgrade-level policy.
    #[must_use]
    pub fn release_quota(&self) -> u32 {
        match self.upgrade_level {
            1 => self.count.min(1),
            2 => self.count.min(self.burst_size),
            // Level 0 and any out-of-range level flush everything.
            _ => self.count,
        }
    }
}

/// Lift runtime state: stepped vertical motion toward a target height.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiftState {
    /// Whether the lift is running (clicks pause/resume).
    pub is_active: bool,
    /// Cells climbed so far.
    pub current_height: u32,
    /// Total cells to climb before deactivating.
    pub target_height: u32,
}

impl LiftState {
    /// Create an active lift at height zero.
    #[must_use]
    pub const fn new(target_height: u32) -> Self {
        Self {
            is_active: true,
            current_height: 0,
            target_height,
        }
    }
}

/// Per-kind mutable payload of a module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModuleState {
    /// Splitter payload.
    Splitter(SplitterState),
    /// Collector payload.
    Collector(CollectorState),
    /// Lift payload.
    Lift(LiftState),
}

/// An interactive grid-occupying module (splitter, collector or lift).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Module {
    /// Grid cell occupied (base cell for lifts).
    pub cell: CellIndex,
    /// Immutable shared definition reference.
    pub part: PartId,
    /// Mutable per-kind state payload.
    pub state: ModuleState,
}

/// A passive track segment contributing only to acceleration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connector {
    /// Grid cell occupied.
    pub cell: CellIndex,
    /// Immutable shared definition reference (ramp angle, flat/sloped).
    pub part: PartId,
}

/// A goal pad: consumes marbles and awards coins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoalPad {
    /// Grid cell occupied.
    pub cell: CellIndex,
    /// Coins awarded per marble.
    pub coin_reward: u32,
    /// Cumulative marbles consumed.
    pub marbles_collected: u64,
}

/// A marble source, active until exhausted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedSpawner {
    /// Cell marbles appear in.
    pub cell: CellIndex,
    /// Maximum marbles to spawn; -1 means unlimited.
    pub max_count: i64,
    /// Marbles spawned so far.
    pub spawned: i64,
    /// Whether the spawner is still producing.
    pub active: bool,
    /// Initial velocity for spawned marbles.
    pub initial_velocity: Vec3Fixed,
}

impl SeedSpawner {
    /// Whether this spawner may emit another marble.
    #[must_use]
    pub fn can_spawn(&self) -> bool {
        self.active && (self.max_count < 0 || self.spawned < self.max_count)
    }

    /// Whether the spawner has hit its budget.
    #[must_use]
    pub fn exhausted(&self) -> bool {
        self.max_count >= 0 && self.spawned >= self.max_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_splitter_round_robin() {
        let mut state = SplitterState::default();
        assert_eq!(state.select_exit(), 0);
        assert_eq!(state.select_exit(), 1);
        assert_eq!(state.select_exit(), 0);
        assert_eq!(state.select_exit(), 1);
    }

    #[test]
    fn test_splitter_override_uses_opposite_exit() {
        let mut state = SplitterState::default();
        assert_eq!(state.select_exit(), 0);
        // Pointer now at 1; enabling override pins the opposite exit, 0.
        state.toggle_override();
        assert!(state.override_exit);
        assert_eq!(state.override_value, 0);
        assert_eq!(state.select_exit(), 0);
        assert_eq!(state.select_exit(), 0);

        state.toggle_override();
        assert!(!state.override_exit);
        assert_eq!(state.select_exit(), 1);
    }

    #[test]
    fn test_collector_ring_wraparound() {
        let mut queue = CollectorState::new(4, 1, 1);
        assert_eq!(queue.capacity(), 4);

        for i in 0..4 {
            assert!(queue.enqueue(i, 0));
        }
        assert!(queue.is_full());
        assert!(!queue.enqueue(99, 0));

        assert_eq!(queue.dequeue().unwrap().marble, 0);
        assert!(queue.enqueue(4, 1));

        let order: Vec<EntityId> = queue.drain_all().iter().map(|e| e.marble).collect();
        assert_eq!(order, vec![1, 2, 3, 4]);
        assert_eq!((queue.head, queue.tail, queue.count), (0, 0, 0));
    }

    #[test]
    fn test_collector_release_quota() {
        let mut queue = CollectorState::new(8, 0, 3);
        for i in 0..5 {
            queue.enqueue(i, 0);
        }
        assert_eq!(queue.release_quota(), 5);

        queue.upgrade_level = 1;
        assert_eq!(queue.release_quota(), 1);

        queue.upgrade_level = 2;
        assert_eq!(queue.release_quota(), 3);

        // Out-of-range level behaves as level 0.
        queue.upgrade_level = 7;
        assert_eq!(queue.release_quota(), 5);
    }

    #[test]
    fn test_spawner_exhaustion() {
        let spawner = SeedSpawner {
            cell: CellIndex::ORIGIN,
            max_count: 2,
            spawned: 2,
            active: true,
            initial_velocity: Vec3Fixed::ZERO,
        };
        assert!(!spawner.can_spawn());
        assert!(spawner.exhausted());

        let unlimited = SeedSpawner {
            max_count: -1,
            spawned: 10_000,
            ..spawner
        };
        assert!(unlimited.can_spawn());
        assert!(!unlimited.exhausted());
    }
}
