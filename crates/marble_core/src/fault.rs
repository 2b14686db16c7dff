//! Non-fatal diagnostic faults.
//!
//! A fault is a transient record of a condition that must not halt or
//! corrupt the tick: a duplicate module claiming a cell, a full
//! collector queue, a malformed authoring command. Faults accumulate
//! in a queue and are drained at end of tick by a lightweight
//! processor that currently logs them.

use serde::{Deserialize, Serialize};

/// Subsystem that recorded a fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FaultOrigin {
    /// The spatial lookup cache builder.
    Spatial,
    /// The collector state machine.
    Collector,
    /// Click-action application.
    ClickAction,
    /// Track-command application.
    TrackCommand,
}

/// Fault code: a splitter or lift already occupies the cell.
pub const CODE_DUPLICATE_MODULE: u32 = 1;
/// Fault code: a collector ring buffer rejected a push.
pub const CODE_QUEUE_FULL: u32 = 2;
/// Fault code: a click action targeted a missing or non-clickable entity.
pub const CODE_UNKNOWN_ACTION: u32 = 3;
/// Fault code: a track command referenced an unknown part.
pub const CODE_UNKNOWN_PART: u32 = 4;
/// Fault code: a track command targeted an occupied or invalid cell.
pub const CODE_BAD_PLACEMENT: u32 = 5;

/// A single diagnostic record. Never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fault {
    /// Subsystem that recorded the fault.
    pub origin: FaultOrigin,
    /// Integer code identifying the condition.
    pub code: u32,
}

impl Fault {
    /// Create a fault record.
    #[must_use]
    pub const fn new(origin: FaultOrigin, code: u32) -> Self {
        Self { origin, code }
    }
}

/// Drainable queue of fault records.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FaultQueue {
    records: Vec<Fault>,
}

impl FaultQueue {
    /// Create an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a fault.
    pub fn push(&mut self, fault: Fault) {
        self.records.push(fault);
    }

    /// Record several faults, preserving order.
    pub fn extend(&mut self, faults: impl IntoIterator<Item = Fault>) {
        self.records.extend(faults);
    }

    /// Number of pending records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Check whether the queue is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Remove and return all pending records.
    pub fn drain(&mut self) -> Vec<Fault> {
        std::mem::take(&mut self.records)
    }

    /// End-of-tick processor: drain pending faults, logging each.
    pub fn drain_and_log(&mut self, tick: u64) -> Vec<Fault> {
        let drained = self.drain();
        for fault in &drained {
            tracing::warn!(
                tick,
                origin = ?fault.origin,
                code = fault.code,
                "simulation fault"
            );
        }
        drained
    }
}
