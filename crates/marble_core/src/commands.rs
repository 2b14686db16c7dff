//! Player-facing input: track edits and click actions.
//!
//! Commands are enqueued at any time and consumed in submission order
//! during the input phase of the next tick. Keeping track mutation
//! inside the tick keeps runs reproducible from the command stream
//! alone.

use serde::{Deserialize, Serialize};

use crate::components::EntityId;
use crate::grid::CellIndex;
use crate::parts::PartId;

/// A structural edit to the track, applied at the next input phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrackCommand {
    /// Place a stateful module (splitter, collector, lift, goal pad).
    PlaceModule {
        /// Anchor cell of the module footprint.
        cell: CellIndex,
        /// Catalog part to instantiate.
        part: PartId,
        /// Collector upgrade level at placement time; ignored for
        /// other kinds.
        upgrade_level: u8,
        /// Yaw in quarter turns. Built-in parts route along fixed
        /// axes and ignore it, but authoring tools round-trip it.
        rotation: u8,
    },
    /// Place a passive connector piece.
    PlaceConnector {
        /// Cell the connector occupies.
        cell: CellIndex,
        /// Catalog part to instantiate.
        part: PartId,
        /// Yaw in quarter turns; ignored by built-in connectors.
        rotation: u8,
    },
    /// Remove whatever part occupies the cell, if any.
    RemovePart {
        /// Cell to clear.
        cell: CellIndex,
    },
    /// Clear all entities and restart the tick counter.
    Reset,
}

/// Primary click action id.
pub const ACTION_PRIMARY: u32 = 0;

/// A click on an interactive entity, tagged with the tick it was
/// issued for so late-arriving input cannot apply early.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClickAction {
    /// Entity the click targets.
    pub target: EntityId,
    /// Action id. Only [`ACTION_PRIMARY`] is recognized.
    pub action: u32,
    /// Earliest tick the action may apply on.
    pub at_tick: u64,
}
