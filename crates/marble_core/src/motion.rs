//! Marble motion: acceleration then integration.
//!
//! Acceleration is computed from the track occupying each marble's
//! current cell (base gravity, friction on supported cells, ramp
//! contributions), strictly before integration within the same phase.
//! Integration then advances velocity and position in fixed point and
//! re-establishes the `cell == floor(position / cell_size)` invariant.
//!
//! Each marble is processed independently of every other marble, so
//! the pass runs as an ordered parallel map over an ID-sorted snapshot
//! and commits results serially.

use std::collections::{HashMap, HashSet};

use rayon::prelude::*;

use crate::components::{EntityId, Marble, ModuleState};
use crate::config::SimConfig;
use crate::grid::{CellIndex, CellKey};
use crate::math::{Fixed, Vec3Fixed};
use crate::parts::PartRegistry;
use crate::store::EntityStorage;

/// Which track geometry occupies which cell, rebuilt at the start of
/// each motion phase (lift platforms move between ticks).
#[derive(Debug, Default)]
pub struct TrackLookup {
    /// Cells where a marble is supported (no gravity): connectors,
    /// module cells, and current lift platform cells.
    supported: HashSet<CellKey>,
    /// Forward ramp acceleration per sloped-connector cell.
    ramp_accel: HashMap<CellKey, Fixed>,
}

impl TrackLookup {
    /// Scan connectors and modules into a fresh lookup.
    #[must_use]
    pub fn build(storage: &EntityStorage, registry: &PartRegistry) -> Self {
        let mut lookup = Self::default();
        for (_, entity) in storage.iter() {
            if let Some(connector) = &entity.connector {
                let key = connector.cell.key();
                lookup.supported.insert(key);
                if let Some(def) = registry.get(connector.part) {
                    if def.sloped {
                        lookup.ramp_accel.insert(key, def.ramp_accel);
                    }
                }
            }
            if let Some(module) = &entity.module {
                lookup.supported.insert(module.cell.key());
                if let ModuleState::Lift(lift) = &module.state {
                    let platform = module.cell.offset(0, lift.current_height as i32, 0);
                    lookup.supported.insert(platform.key());
                }
            }
            if let Some(goal) = &entity.goal {
                lookup.supported.insert(goal.cell.key());
            }
        }
        lookup
    }

    /// Whether a cell supports marbles against gravity.
    #[must_use]
    pub fn is_supported(&self, cell: CellIndex) -> bool {
        self.supported.contains(&cell.key())
    }
}

/// Compute the acceleration acting on a marble this tick.
#[must_use]
pub fn compute_acceleration(
    marble: &Marble,
    track: &TrackLookup,
    config: &SimConfig,
) -> Vec3Fixed {
    let key = marble.cell.key();
    if track.supported.contains(&key) {
        // Supported: friction opposes horizontal motion, ramps push.
        let mut accel = Vec3Fixed {
            x: -(marble.velocity.x * config.friction),
            y: Fixed::ZERO,
            z: -(marble.velocity.z * config.friction),
        };
        if let Some(&ramp) = track.ramp_accel.get(&key) {
            accel.x += ramp;
        }
        accel
    } else {
        Vec3Fixed {
            x: Fixed::ZERO,
            y: -config.gravity,
            z: Fixed::ZERO,
        }
    }
}

/// Advance one marble by one timestep.
///
/// Velocity integrates acceleration, each axis is clamped to the
/// terminal speed, position integrates velocity, and the cell index is
/// overwritten only if it changed.
pub fn integrate(marble: &mut Marble, config: &SimConfig) {
    let dt = config.dt();
    marble.velocity += marble.acceleration.scale(dt);
    marble.velocity = marble.velocity.clamp_abs(config.terminal_speed);
    marble.position += marble.velocity.scale(dt);

    let cell = CellIndex::from_position(marble.position, config.cell_size);
    if cell != marble.cell {
        marble.cell = cell;
    }
}

/// Run acceleration + integration over an ID-sorted marble snapshot.
///
/// Returns updated marbles in the same order for serial commit.
#[must_use]
pub fn motion_pass(
    snapshot: &[(EntityId, Marble)],
    track: &TrackLookup,
    config: &SimConfig,
) -> Vec<(EntityId, Marble)> {
    snapshot
        .par_iter()
        .map(|&(id, mut marble)| {
            marble.acceleration = compute_acceleration(&marble, track, config);
            integrate(&mut marble, config);
            (id, marble)
        })
        .collect()
}
