//! Deferred structural mutations.
//!
//! Parallel jobs (collision resolution, module logic) never mutate the
//! entity store mid-scan. They emit [`Mutation`] records instead; the
//! scheduler merges each job's output in the deterministic iteration
//! order of the entity store (ordered parallel map, flattened), then a
//! single-threaded replay applies the log in enqueue order. The final
//! state therefore never depends on which worker produced which
//! record, only on the log order, which is itself deterministic.
//!
//! Replay is tolerant: a mutation whose target entity has already been
//! destroyed earlier in the same log is skipped silently.

use serde::{Deserialize, Serialize};

use crate::components::EntityId;
use crate::grid::CellIndex;
use crate::math::Vec3Fixed;

/// A recorded structural change, applied at phase flush.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mutation {
    /// Destroy a marble entity.
    DestroyMarble {
        /// Target marble.
        marble: EntityId,
    },
    /// Create a debris obstacle at a cell.
    SpawnDebris {
        /// Collision site.
        cell: CellIndex,
    },
    /// Create a marble at the center of a cell.
    SpawnMarble {
        /// Spawn cell.
        cell: CellIndex,
        /// Initial velocity.
        velocity: Vec3Fixed,
    },
    /// Set a marble's horizontal velocity toward a splitter exit.
    RouteMarble {
        /// Routed marble.
        marble: EntityId,
        /// Exit index (0 = +x, 1 = -x).
        exit: u8,
    },
    /// Move a marble up one cell (lift step).
    LiftMarble {
        /// Carried marble.
        marble: EntityId,
    },
    /// Consume a marble at a goal pad and award its coins.
    GoalCollect {
        /// Collecting goal pad entity.
        goal: EntityId,
        /// Consumed marble.
        marble: EntityId,
    },
    /// Capture a marble into a collector's ring buffer.
    CollectorEnqueue {
        /// Capturing collector entity.
        collector: EntityId,
        /// Captured marble.
        marble: EntityId,
    },
    /// Release up to `quota` marbles from a collector's ring buffer.
    CollectorRelease {
        /// Releasing collector entity.
        collector: EntityId,
        /// Upper bound on released marbles this tick.
        quota: u32,
    },
}

/// Append-only log of deferred mutations, replayed serially per phase.
#[derive(Debug, Clone, Default)]
pub struct MutationBuffer {
    log: Vec<Mutation>,
}

impl MutationBuffer {
    /// Create an empty buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a single mutation.
    pub fn push(&mut self, mutation: Mutation) {
        self.log.push(mutation);
    }

    /// Merge per-job output vectors, preserving their order.
    ///
    /// Callers pass the `Vec<Vec<Mutation>>` produced by an ordered
    /// parallel map, so the flattened order matches the entity
    /// iteration order regardless of thread assignment.
    pub fn merge(&mut self, per_job: Vec<Vec<Mutation>>) {
        for job in per_job {
            self.log.extend(job);
        }
    }

    /// Number of pending mutations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.log.len()
    }

    /// Check whether the log is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.log.is_empty()
    }

    /// Take the pending log in enqueue order, leaving the buffer empty.
    pub fn drain(&mut self) -> Vec<Mutation> {
        std::mem::take(&mut self.log)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_preserves_job_order() {
        let mut buffer = MutationBuffer::new();
        buffer.merge(vec![
            vec![Mutation::DestroyMarble { marble: 1 }],
            vec![],
            vec![
                Mutation::DestroyMarble { marble: 2 },
                Mutation::SpawnDebris {
                    cell: CellIndex::ORIGIN,
                },
            ],
        ]);

        let log = buffer.drain();
        assert_eq!(log.len(), 3);
        assert_eq!(log[0], Mutation::DestroyMarble { marble: 1 });
        assert_eq!(log[1], Mutation::DestroyMarble { marble: 2 });
        assert!(buffer.is_empty());
    }
}
