//! Integer grid coordinates and packed cell keys.
//!
//! Every simulated entity occupies a cell on a signed 3D integer grid.
//! Cell coordinates are derived from continuous fixed-point positions
//! by floor division, and packed into a single 63-bit key for use in
//! hash maps (21 bits per axis).

use serde::{Deserialize, Serialize};

use crate::math::{div_or_zero, Fixed, Vec3Fixed};

/// Bits available per axis in a packed cell key.
pub const AXIS_BITS: u32 = 21;

/// Mask extracting one axis field from a packed key.
pub const AXIS_MASK: u64 = (1 << AXIS_BITS) - 1;

/// A packed 3D cell coordinate: `x << 42 | y << 21 | z`, 21 bits per
/// axis. Axis values must fit in a signed 21-bit range (about ±2^20).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CellKey(pub u64);

/// The integer 3D grid coordinate an entity currently occupies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct CellIndex {
    /// Grid X.
    pub x: i32,
    /// Grid Y (vertical axis).
    pub y: i32,
    /// Grid Z.
    pub z: i32,
}

impl CellIndex {
    /// Create a cell index from components.
    #[must_use]
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// The origin cell.
    pub const ORIGIN: Self = Self { x: 0, y: 0, z: 0 };

    /// Derive the cell containing a continuous position.
    ///
    /// Conversion from fixed-point to integer rounds towards negative
    /// infinity, which is exactly the `floor(position / cell_size)`
    /// the cell-membership invariant requires.
    #[must_use]
    pub fn from_position(position: Vec3Fixed, cell_size: Fixed) -> Self {
        Self {
            x: div_or_zero(position.x, cell_size).to_num::<i32>(),
            y: div_or_zero(position.y, cell_size).to_num::<i32>(),
            z: div_or_zero(position.z, cell_size).to_num::<i32>(),
        }
    }

    /// Pack into a 63-bit hash-map key.
    #[must_use]
    pub fn key(self) -> CellKey {
        let x = (self.x as u64) & AXIS_MASK;
        let y = (self.y as u64) & AXIS_MASK;
        let z = (self.z as u64) & AXIS_MASK;
        CellKey(x << (2 * AXIS_BITS) | y << AXIS_BITS | z)
    }

    /// The cell offset by integer deltas.
    #[must_use]
    pub const fn offset(self, dx: i32, dy: i32, dz: i32) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
            z: self.z + dz,
        }
    }

    /// The continuous position at the center of this cell.
    #[must_use]
    pub fn center(self, cell_size: Fixed) -> Vec3Fixed {
        let half = cell_size / Fixed::from_num(2);
        Vec3Fixed {
            x: Fixed::from_num(self.x) * cell_size + half,
            y: Fixed::from_num(self.y) * cell_size + half,
            z: Fixed::from_num(self.z) * cell_size + half,
        }
    }
}

impl CellKey {
    /// Unpack back into a signed cell index.
    ///
    /// Each 21-bit field is sign-extended, so negative coordinates
    /// survive the round trip.
    #[must_use]
    pub fn unpack(self) -> CellIndex {
        CellIndex {
            x: sign_extend(self.0 >> (2 * AXIS_BITS)),
            y: sign_extend(self.0 >> AXIS_BITS),
            z: sign_extend(self.0),
        }
    }
}

/// Sign-extend the low 21 bits of a value to a full i32.
fn sign_extend(raw: u64) -> i32 {
    let shift = 64 - AXIS_BITS;
    (((raw & AXIS_MASK) << shift) as i64 >> shift) as i32
}
