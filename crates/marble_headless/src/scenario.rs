//! Scenario loading and configuration.
//!
//! Scenarios define the initial track for headless runs: configuration,
//! placed parts, marbles and spawners. They are loadable from RON files
//! or picked from a built-in set by name.

use std::path::Path;
use std::result::Result;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use marble_core::prelude::*;

/// Error type for scenario operations.
#[derive(Error, Debug)]
pub enum ScenarioError {
    /// File not found.
    #[error("scenario file not found: {0}")]
    FileNotFound(String),
    /// Failed to read file.
    #[error("failed to read scenario file: {0}")]
    ReadError(#[from] std::io::Error),
    /// Failed to parse RON.
    #[error("failed to parse scenario: {0}")]
    ParseError(#[from] ron::error::SpannedError),
    /// The scenario could not be instantiated.
    #[error("failed to build scenario: {0}")]
    BuildError(#[from] SimError),
}

/// A part placement in a scenario.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PartPlacement {
    /// Catalog part id.
    pub part: u32,
    /// Cell as (x, y, z).
    pub cell: (i32, i32, i32),
    /// Collector upgrade level; ignored for other kinds.
    #[serde(default)]
    pub upgrade_level: u8,
}

/// A marble placement in a scenario.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MarblePlacement {
    /// Cell as (x, y, z).
    pub cell: (i32, i32, i32),
    /// Whole-number velocity as (vx, vy, vz).
    pub velocity: (i32, i32, i32),
}

/// A seed spawner placement in a scenario.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SpawnerPlacement {
    /// Cell as (x, y, z).
    pub cell: (i32, i32, i32),
    /// Marble budget; -1 spawns forever.
    pub max_count: i64,
    /// Initial whole-number velocity for spawned marbles.
    pub velocity: (i32, i32, i32),
}

/// A complete scenario configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    /// Scenario name.
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// Simulation configuration for this scenario.
    pub config: SimConfig,
    /// Parts to place, connectors included.
    pub parts: Vec<PartPlacement>,
    /// Marbles present at tick 0.
    pub marbles: Vec<MarblePlacement>,
    /// Seed spawners.
    pub spawners: Vec<SpawnerPlacement>,
}

fn cell(triple: (i32, i32, i32)) -> CellIndex {
    CellIndex::new(triple.0, triple.1, triple.2)
}

fn velocity(triple: (i32, i32, i32)) -> Vec3Fixed {
    Vec3Fixed::from_ints(triple.0, triple.1, triple.2)
}

impl Scenario {
    /// Load a scenario from a RON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing, unreadable or
    /// malformed.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ScenarioError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ScenarioError::FileNotFound(path.display().to_string()));
        }
        let contents = std::fs::read_to_string(path)?;
        let scenario: Scenario = ron::from_str(&contents)?;
        Ok(scenario)
    }

    /// Load from a RON string (useful for embedded scenarios).
    ///
    /// # Errors
    ///
    /// Returns an error on malformed input.
    pub fn from_ron_str(ron: &str) -> Result<Self, ScenarioError> {
        let scenario: Scenario = ron::from_str(ron)?;
        Ok(scenario)
    }

    /// Look up a built-in scenario by name.
    #[must_use]
    pub fn by_name(name: &str) -> Option<Self> {
        match name {
            "head_on" => Some(Self::head_on()),
            "splitter_demo" => Some(Self::splitter_demo()),
            "busy_track" => Some(Self::busy_track()),
            _ => None,
        }
    }

    /// Names of the built-in scenarios.
    #[must_use]
    pub fn builtin_names() -> &'static [&'static str] {
        &["head_on", "splitter_demo", "busy_track"]
    }

    /// Two marbles meeting head-on in the middle of a short track.
    #[must_use]
    pub fn head_on() -> Self {
        Self {
            name: "head_on".to_string(),
            description: "Two marbles collide in the middle cell, leaving debris".to_string(),
            config: SimConfig::default(),
            parts: (0..=2)
                .map(|x| PartPlacement {
                    part: PART_FLAT_CONNECTOR.0,
                    cell: (x, 0, 0),
                    upgrade_level: 0,
                })
                .collect(),
            marbles: vec![
                MarblePlacement {
                    cell: (0, 0, 0),
                    velocity: (120, 0, 0),
                },
                MarblePlacement {
                    cell: (2, 0, 0),
                    velocity: (-120, 0, 0),
                },
            ],
            spawners: Vec::new(),
        }
    }

    /// A splitter alternating a marble stream between two exits.
    #[must_use]
    pub fn splitter_demo() -> Self {
        let mut parts: Vec<PartPlacement> = (-4..=4)
            .filter(|&x| x != 0)
            .map(|x| PartPlacement {
                part: PART_FLAT_CONNECTOR.0,
                cell: (x, 0, 0),
                upgrade_level: 0,
            })
            .collect();
        parts.push(PartPlacement {
            part: PART_SPLITTER.0,
            cell: (0, 0, 0),
            upgrade_level: 0,
        });
        Self {
            name: "splitter_demo".to_string(),
            description: "An endless marble stream split across two exits".to_string(),
            config: SimConfig::default(),
            parts,
            marbles: Vec::new(),
            spawners: vec![SpawnerPlacement {
                cell: (-4, 0, 0),
                max_count: -1,
                velocity: (120, 0, 0),
            }],
        }
    }

    /// A full track: spawner, splitter, collector and goal pad.
    #[must_use]
    pub fn busy_track() -> Self {
        let mut parts: Vec<PartPlacement> = (-8..=8)
            .filter(|&x| x != 0 && x != 5 && x != -5)
            .map(|x| PartPlacement {
                part: PART_FLAT_CONNECTOR.0,
                cell: (x, 0, 0),
                upgrade_level: 0,
            })
            .collect();
        parts.push(PartPlacement {
            part: PART_SPLITTER.0,
            cell: (0, 0, 0),
            upgrade_level: 0,
        });
        parts.push(PartPlacement {
            part: PART_COLLECTOR.0,
            cell: (5, 0, 0),
            upgrade_level: 1,
        });
        parts.push(PartPlacement {
            part: PART_GOAL.0,
            cell: (-5, 0, 0),
            upgrade_level: 0,
        });
        Self {
            name: "busy_track".to_string(),
            description: "Spawner, splitter, collector and goal on one line".to_string(),
            config: SimConfig::default(),
            parts,
            marbles: Vec::new(),
            spawners: vec![SpawnerPlacement {
                cell: (-8, 0, 0),
                max_count: -1,
                velocity: (120, 0, 0),
            }],
        }
    }

    /// Instantiate the scenario as a ready-to-tick simulation.
    ///
    /// # Errors
    ///
    /// Returns an error for an invalid configuration, unknown part ids
    /// or conflicting placements.
    pub fn build(&self) -> Result<Simulation, ScenarioError> {
        let mut sim = Simulation::new(self.config.clone())?;
        for placement in &self.parts {
            let part = PartId(placement.part);
            let kind = sim
                .registry()
                .get(part)
                .ok_or(SimError::UnknownPart(placement.part))?
                .kind;
            if kind == PartKind::Connector {
                sim.place_connector(cell(placement.cell), part)?;
            } else {
                sim.place_part(cell(placement.cell), part, placement.upgrade_level)?;
            }
        }
        for marble in &self.marbles {
            sim.spawn_marble(cell(marble.cell), velocity(marble.velocity));
        }
        for spawner in &self.spawners {
            sim.add_seed_spawner(cell(spawner.cell), spawner.max_count, velocity(spawner.velocity));
        }
        Ok(sim)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_builtin_scenarios_build() {
        for name in Scenario::builtin_names() {
            let scenario = Scenario::by_name(name).unwrap();
            let sim = scenario.build().unwrap();
            assert!(!sim.entities().is_empty(), "{name} built an empty track");
        }
    }

    #[test]
    fn test_ron_roundtrip() {
        let scenario = Scenario::head_on();
        let text = ron::ser::to_string_pretty(&scenario, ron::ser::PrettyConfig::default())
            .unwrap();
        let parsed = Scenario::from_ron_str(&text).unwrap();
        assert_eq!(parsed.name, scenario.name);
        assert_eq!(parsed.marbles.len(), 2);
    }

    #[test]
    fn test_load_from_file() {
        let scenario = Scenario::splitter_demo();
        let text = ron::to_string(&scenario).unwrap();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(text.as_bytes()).unwrap();

        let loaded = Scenario::load(file.path()).unwrap();
        assert_eq!(loaded.name, "splitter_demo");
    }

    #[test]
    fn test_missing_file_is_reported() {
        let err = Scenario::load("/nonexistent/scenario.ron").unwrap_err();
        assert!(matches!(err, ScenarioError::FileNotFound(_)));
    }

    #[test]
    fn test_unknown_part_rejected_at_build() {
        let mut scenario = Scenario::head_on();
        scenario.parts.push(PartPlacement {
            part: 999,
            cell: (9, 9, 9),
            upgrade_level: 0,
        });
        assert!(matches!(
            scenario.build(),
            Err(ScenarioError::BuildError(SimError::UnknownPart(999)))
        ));
    }
}
