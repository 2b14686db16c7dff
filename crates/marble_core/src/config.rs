//! Simulation configuration.
//!
//! Configuration is supplied by the host, never owned by the core. A
//! [`SimConfig`] is validated once at simulation construction; there
//! is no partially-configured running state.

use serde::{Deserialize, Serialize};

use crate::error::{Result, SimError};
use crate::math::{fixed_serde, Fixed};

/// Default simulation rate in ticks per second.
pub const DEFAULT_TICK_RATE: u32 = 120;

/// Externally supplied simulation parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimConfig {
    /// Fixed ticks per second.
    pub tick_rate: u32,
    /// Edge length of a grid cell in world units.
    #[serde(with = "fixed_serde")]
    pub cell_size: Fixed,
    /// Per-axis speed clamp for marbles (world units per second).
    #[serde(with = "fixed_serde")]
    pub terminal_speed: Fixed,
    /// Downward gravitational acceleration (world units per second squared).
    #[serde(with = "fixed_serde")]
    pub gravity: Fixed,
    /// Velocity-proportional friction coefficient applied on supported cells.
    #[serde(with = "fixed_serde")]
    pub friction: Fixed,
    /// Horizontal speed imparted by splitters and collector outlets.
    #[serde(with = "fixed_serde")]
    pub route_speed: Fixed,
    /// Platform-dependent marble budget, used only to pre-size caches.
    pub max_marbles: usize,
    /// Worker thread count for parallel phases (0 = library default).
    pub worker_threads: usize,
}

impl SimConfig {
    /// Duration of one tick as a fixed-point fraction of a second.
    #[must_use]
    pub fn dt(&self) -> Fixed {
        // tick_rate is validated non-zero at construction.
        Fixed::from_num(1) / Fixed::from_num(self.tick_rate)
    }

    /// Validate that this configuration can start a simulation.
    pub fn validate(&self) -> Result<()> {
        if self.tick_rate == 0 {
            return Err(SimError::InvalidConfig("tick_rate must be non-zero".into()));
        }
        if self.cell_size <= Fixed::ZERO {
            return Err(SimError::InvalidConfig("cell_size must be positive".into()));
        }
        if self.terminal_speed <= Fixed::ZERO {
            return Err(SimError::InvalidConfig(
                "terminal_speed must be positive".into(),
            ));
        }
        Ok(())
    }
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            tick_rate: DEFAULT_TICK_RATE,
            cell_size: Fixed::from_num(1),
            terminal_speed: Fixed::from_num(240),
            gravity: Fixed::from_num(20),
            friction: Fixed::from_num(2),
            route_speed: Fixed::from_num(120),
            max_marbles: 4096,
            worker_threads: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(SimConfig::default().validate().is_ok());
    }

    #[test]
    fn test_dt_is_exact_fraction() {
        let config = SimConfig::default();
        assert_eq!(config.dt() * Fixed::from_num(120), Fixed::from_num(1));
    }

    #[test]
    fn test_zero_tick_rate_rejected() {
        let config = SimConfig {
            tick_rate: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_cell_size_rejected() {
        let config = SimConfig {
            cell_size: Fixed::ZERO,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
