//! # Marble Core
//!
//! Deterministic simulation core for a marble-run puzzle game.
//!
//! This crate contains **only** deterministic logic:
//! - No rendering
//! - No IO
//! - No system randomness
//! - No floating-point math (uses Q32.32 fixed-point)
//!
//! This separation enables:
//! - Identical runs from the same configuration and input stream
//! - Headless batch simulation
//! - Snapshot and replay systems
//! - Determinism testing across thread counts
//!
//! ## Crate Structure
//!
//! - [`math`] - Fixed-point scalar and vector math
//! - [`grid`] - Cell indexing and packed cell keys
//! - [`components`] - Entity component definitions
//! - [`parts`] - The immutable part catalog
//! - [`motion`] - Gravity, friction and integration
//! - [`collision`] - Per-cell collision resolution
//! - [`modules`] - Splitter, collector, lift and goal passes
//! - [`simulation`] - The three-phase tick scheduler

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod collision;
pub mod commands;
pub mod components;
pub mod config;
pub mod error;
pub mod fault;
pub mod grid;
pub mod math;
pub mod modules;
pub mod motion;
pub mod mutation;
pub mod parts;
pub mod simulation;
pub mod spatial;
pub mod store;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::commands::{ClickAction, TrackCommand, ACTION_PRIMARY};
    pub use crate::components::*;
    pub use crate::config::SimConfig;
    pub use crate::error::{Result, SimError};
    pub use crate::fault::{Fault, FaultOrigin};
    pub use crate::grid::{CellIndex, CellKey};
    pub use crate::math::{Fixed, Vec3Fixed};
    pub use crate::parts::{
        PartDef, PartId, PartKind, PartRegistry, PART_COLLECTOR, PART_FLAT_CONNECTOR, PART_GOAL,
        PART_LIFT, PART_RAMP_CONNECTOR, PART_SPLITTER,
    };
    pub use crate::simulation::{RewardEvent, Simulation, TickEvents};
    pub use crate::store::{Entity, EntityStorage};
}
