//! Periodic JSON summaries of the world state

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::{group::GroupId, polity::PolityId, terrain::CellPos, world::World};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupSummary {
    pub id: GroupId,
    pub cell: CellPos,
    pub population: i64,
    pub optimal_population: i64,
    pub next_update_date: i64,
    /// Polity holding the highest influence over the group.
    pub polity: Option<PolityId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolitySummary {
    pub id: PolityId,
    pub core_group: GroupId,
    pub formation_date: i64,
    pub total_population: f64,
    pub influenced_groups: usize,
    pub territory_cells: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldSnapshot {
    pub tick: u64,
    pub date: i64,
    pub total_population: i64,
    pub queued_events: usize,
    pub groups: Vec<GroupSummary>,
    pub polities: Vec<PolitySummary>,
}

impl WorldSnapshot {
    pub fn capture(world: &World) -> Self {
        Self {
            tick: world.tick(),
            date: world.current_date(),
            total_population: world.total_population(),
            queued_events: world.events().len(),
            groups: world
                .groups()
                .map(|g| GroupSummary {
                    id: g.id,
                    cell: g.cell,
                    population: g.population(),
                    optimal_population: g.optimal_population,
                    next_update_date: g.next_update_date,
                    polity: g.influences.highest(),
                })
                .collect(),
            polities: world
                .polities()
                .map(|p| PolitySummary {
                    id: p.id,
                    core_group: p.core_group,
                    formation_date: p.formation_date,
                    total_population: p.total_population,
                    influenced_groups: p.influenced_group_count(),
                    territory_cells: p.territory.len(),
                })
                .collect(),
        }
    }
}

/// Writes `<dir>/<scenario>/tick_NNNNNN.json` every `interval` ticks.
pub struct SnapshotWriter {
    output_dir: PathBuf,
    interval: u64,
}

impl SnapshotWriter {
    pub fn new(output_dir: impl AsRef<Path>, interval: u64) -> Self {
        Self {
            output_dir: output_dir.as_ref().to_path_buf(),
            interval,
        }
    }

    pub fn maybe_write(&self, world: &World, scenario_name: &str) -> Result<Option<PathBuf>> {
        let tick = world.tick();
        if self.interval == 0 || tick % self.interval != 0 {
            return Ok(None);
        }

        let dir = self.output_dir.join(scenario_name);
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create snapshot dir {}", dir.display()))?;
        let path = dir.join(format!("tick_{tick:06}.json"));
        let json = serde_json::to_string_pretty(&WorldSnapshot::capture(world))?;
        fs::write(&path, json)
            .with_context(|| format!("Failed to write snapshot {}", path.display()))?;
        Ok(Some(path))
    }
}
