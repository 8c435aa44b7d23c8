//! Population in transit between two cells
//!
//! A [`MigratingGroup`] lives for the migration pass of a single tick. The
//! split phase carves people out of the source group and decides which
//! faction cores follow them; the move phase lands them on the target cell.

use std::collections::BTreeMap;

use tracing::debug;

use crate::{
    culture::Culture,
    error::{Result, SimulationError},
    group::{GroupId, PopulationGroup},
    influence::UNREACHABLE,
    polity::PolityId,
    report::Occurrence,
    terrain::CellPos,
    world::World,
};

#[derive(Debug, Clone, PartialEq)]
pub struct MigratingGroup {
    pub source: GroupId,
    pub target_cell: CellPos,
    pub percent: f64,
    pub population: i64,
    pub culture: Culture,
    pub influences: Vec<(PolityId, f64)>,
    /// (polity, faction id) pairs whose core relocates with the migrants.
    pub faction_cores: Vec<(PolityId, u64)>,
}

impl MigratingGroup {
    pub fn new(source: GroupId, target_cell: CellPos, percent: f64) -> Self {
        Self {
            source,
            target_cell,
            percent,
            population: 0,
            culture: Culture::default(),
            influences: Vec::new(),
            faction_cores: Vec::new(),
        }
    }
}

impl World {
    fn present_group_at(&self, cell: CellPos) -> Option<&PopulationGroup> {
        self.group_at(cell)
            .filter(|g| g.still_present && !g.is_destroyed())
    }

    /// Deducts the migrants from the source group and snapshots what they
    /// carry. Returns false when nobody leaves.
    pub(crate) fn split_migrating_group(&mut self, migrating: &mut MigratingGroup) -> Result<bool> {
        if migrating.percent.is_nan() {
            return Err(SimulationError::InvalidMigrationPercent {
                group: migrating.source,
            });
        }
        let Some(source) = self.groups.get_mut(&migrating.source) else {
            return Ok(false);
        };
        if !source.still_present || source.destroyed {
            return Ok(false);
        }
        let population = source.split(migrating.percent);
        if population <= 0 {
            return Ok(false);
        }
        migrating.population = population;
        migrating.culture = source.culture.clone();
        migrating.influences = source.influences.snapshot();
        let source_population = source.population() as f64;
        let source_id = source.id;
        self.pending.updated_groups.insert(source_id);

        let target = self.present_group_at(migrating.target_cell);
        let target_population = target.map(|g| g.population() as f64).unwrap_or(0.0);
        let arriving = population as f64;
        let new_population = arriving + target_population;

        migrating.faction_cores.clear();
        for &(polity_id, source_value) in &migrating.influences {
            let Some(polity) = self.polities.get(&polity_id) else {
                continue;
            };
            let target_value = target
                .map(|g| g.influences.value(polity_id))
                .unwrap_or(source_value);
            let new_prominence =
                (source_value * arriving + target_value * target_population) / new_population;
            for faction in polity.factions_with_core(source_id) {
                if faction.should_migrate_core(
                    source_value,
                    source_population,
                    new_prominence,
                    new_population,
                ) {
                    migrating.faction_cores.push((polity_id, faction.id));
                }
            }
        }
        Ok(true)
    }

    /// Lands the migrants: merges them into the group on the target cell or
    /// founds a new group there, then relocates flagged faction cores.
    pub(crate) fn move_migrating_group(&mut self, migrating: &MigratingGroup) -> Result<()> {
        if migrating.population <= 0 {
            return Ok(());
        }
        let cell = migrating.target_cell;
        if self.terrain.cell(cell).is_none() {
            return Err(SimulationError::UnknownCell(cell));
        }

        let target_id = match self.present_group_at(cell).map(|g| g.id) {
            Some(target_id) => {
                self.with_group(target_id, |world, target| {
                    let distances: BTreeMap<PolityId, f64> = migrating
                        .influences
                        .iter()
                        .map(|(pid, _)| *pid)
                        .chain(target.influences.polities())
                        .map(|pid| (pid, world.shortest_core_distance(target, pid)))
                        .collect();
                    let percent =
                        target.merge_population(migrating.population as f64, &migrating.culture);
                    target.influences.merge(&migrating.influences, percent, |pid| {
                        distances.get(&pid).copied().unwrap_or(UNREACHABLE)
                    });
                    Ok(())
                })?;
                self.pending.updated_groups.insert(target_id);
                target_id
            }
            None => {
                let culture = self.culture_for(cell, Some(&migrating.culture));
                let id = self.allocate_group_id();
                let group = PopulationGroup::new(
                    id,
                    cell,
                    migrating.population as f64,
                    culture,
                    self.current_date,
                );
                self.add_group(group)?;
                self.with_group(id, |world, group| {
                    for &(polity, value) in &migrating.influences {
                        if !world.polities.contains_key(&polity) {
                            continue;
                        }
                        let distance = world.shortest_core_distance(group, polity);
                        group.influences.stage_add(polity, value, distance);
                    }
                    Ok(())
                })?;
                for &(polity, _) in &migrating.influences {
                    if self.polities.contains_key(&polity) {
                        self.add_polity_to_update(polity);
                    }
                }
                id
            }
        };

        for &(polity_id, faction_id) in &migrating.faction_cores {
            if let Some(faction) = self
                .polities
                .get_mut(&polity_id)
                .and_then(|p| p.faction_mut(faction_id))
            {
                faction.prepare_new_core_group(target_id);
            }
            self.add_polity_to_update(polity_id);
        }

        debug!(
            source = migrating.source.raw(),
            target = target_id.raw(),
            population = migrating.population,
            "group migrated"
        );
        self.record(Occurrence::GroupSplit {
            source: migrating.source,
            target: target_id,
            cell,
            population: migrating.population,
        });
        Ok(())
    }
}
