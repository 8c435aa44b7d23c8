use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::{
    config::{LoggingConfig, SimulationConfig},
    terrain::{Biome, BiomeTable, CellPos, CellProfile, TerrainGrid},
    world::World,
};

fn default_snapshot_interval_ticks() -> u64 {
    100
}

fn default_altitude() -> f64 {
    100.0
}

#[derive(Debug, Clone, Deserialize)]
pub struct Scenario {
    pub name: String,
    pub description: Option<String>,
    pub seed: u64,
    #[serde(default)]
    pub ticks: Option<u64>,
    #[serde(default = "default_snapshot_interval_ticks")]
    pub snapshot_interval_ticks: u64,
    #[serde(default)]
    pub simulation: SimulationConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Replaces the built-in biome table when non-empty.
    #[serde(default)]
    pub biomes: Vec<Biome>,
    pub terrain: ScenarioTerrain,
    pub groups: Vec<ScenarioGroup>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScenarioTerrain {
    pub width: u32,
    pub height: u32,
    pub default: ScenarioCell,
    /// Applied in order; later patches win.
    #[serde(default)]
    pub patches: Vec<TerrainPatch>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScenarioCell {
    #[serde(default = "default_altitude")]
    pub altitude: f64,
    #[serde(default)]
    pub accessibility: Option<f64>,
    pub biomes: BTreeMap<String, f64>,
}

impl ScenarioCell {
    fn profile(&self) -> CellProfile {
        CellProfile {
            altitude: self.altitude,
            accessibility: self.accessibility,
            biomes: self
                .biomes
                .iter()
                .map(|(name, presence)| (name.clone(), *presence))
                .collect(),
        }
    }
}

/// Rectangle of cells sharing a profile. Bounds are inclusive.
#[derive(Debug, Clone, Deserialize)]
pub struct TerrainPatch {
    pub longitudes: [u32; 2],
    pub latitudes: [u32; 2],
    #[serde(flatten)]
    pub cell: ScenarioCell,
}

impl TerrainPatch {
    fn covers(&self, pos: CellPos) -> bool {
        (self.longitudes[0]..=self.longitudes[1]).contains(&pos.longitude)
            && (self.latitudes[0]..=self.latitudes[1]).contains(&pos.latitude)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScenarioGroup {
    pub cell: CellPos,
    pub population: i64,
}

pub struct ScenarioLoader {
    base_dir: PathBuf,
}

impl ScenarioLoader {
    pub fn new(base_dir: impl AsRef<Path>) -> Self {
        Self {
            base_dir: base_dir.as_ref().to_path_buf(),
        }
    }

    pub fn load(&self, file: impl AsRef<Path>) -> Result<Scenario> {
        let path = self.base_dir.join(file);
        let data = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read scenario file {}", path.display()))?;
        let scenario: Scenario = serde_yaml::from_str(&data)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        Ok(scenario)
    }
}

impl Scenario {
    pub fn biome_table(&self) -> BiomeTable {
        if self.biomes.is_empty() {
            BiomeTable::default()
        } else {
            BiomeTable::from_biomes(self.biomes.iter().cloned())
        }
    }

    pub fn build_terrain(&self) -> TerrainGrid {
        let terrain = &self.terrain;
        TerrainGrid::new(terrain.width, terrain.height, self.biome_table(), |pos| {
            terrain
                .patches
                .iter()
                .rev()
                .find(|patch| patch.covers(pos))
                .map(|patch| &patch.cell)
                .unwrap_or(&terrain.default)
                .profile()
        })
    }

    pub fn build_world(&self) -> Result<World> {
        let mut world = World::new(self.build_terrain(), self.simulation.clone(), self.seed);
        for group in &self.groups {
            world
                .spawn_initial_group(group.cell, group.population)
                .with_context(|| {
                    format!(
                        "Failed to place {} people at ({}, {})",
                        group.population, group.cell.longitude, group.cell.latitude
                    )
                })?;
        }
        Ok(world)
    }

    pub fn ticks(&self, override_ticks: Option<u64>) -> u64 {
        override_ticks.or(self.ticks).unwrap_or(500)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALLEY: &str = r#"
name: valley
seed: 11
terrain:
  width: 12
  height: 6
  default:
    biomes: { grassland: 1.0 }
  patches:
    - longitudes: [0, 11]
      latitudes: [0, 0]
      altitude: -100
      biomes: { ocean: 1.0 }
groups:
  - cell: { longitude: 4, latitude: 3 }
    population: 1500
"#;

    #[test]
    fn parses_with_defaults() {
        let scenario: Scenario = serde_yaml::from_str(VALLEY).expect("parse");
        assert_eq!(scenario.snapshot_interval_ticks, 100);
        assert_eq!(scenario.ticks(None), 500);
        assert_eq!(scenario.ticks(Some(7)), 7);
        assert_eq!(scenario.simulation, SimulationConfig::default());
    }

    #[test]
    fn patches_override_the_default_cell() {
        let scenario: Scenario = serde_yaml::from_str(VALLEY).expect("parse");
        let terrain = scenario.build_terrain();
        assert!(terrain
            .cell(CellPos::new(3, 0))
            .map(|c| c.is_water())
            .unwrap_or(false));
        assert!(terrain
            .cell(CellPos::new(3, 1))
            .map(|c| !c.is_water())
            .unwrap_or(false));
    }

    #[test]
    fn builds_the_founding_groups() {
        let scenario: Scenario = serde_yaml::from_str(VALLEY).expect("parse");
        let world = scenario.build_world().expect("world");
        assert_eq!(world.group_count(), 1);
        assert_eq!(world.total_population(), 1500);
        assert_eq!(world.seed(), 11);
    }

    #[test]
    fn loader_reports_missing_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = ScenarioLoader::new(dir.path())
            .load("missing.yaml")
            .expect_err("missing file");
        assert!(err.to_string().contains("Failed to read scenario file"));
    }
}
