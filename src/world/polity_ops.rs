//! Polity lifecycle: tribe formation, the polity update pass and dissolution

use tracing::{debug, info};

use super::World;
use crate::{
    culture::Culture,
    error::{Result, SimulationError},
    group::GroupId,
    polity::{Polity, PolityId},
    report::Occurrence,
    rng::RngOffset,
};

impl World {
    /// Founds a tribe rooted at `group_id`. The new influence is staged and
    /// becomes live when the group's ledger commits.
    pub(crate) fn form_tribe(&mut self, group_id: GroupId) -> Result<PolityId> {
        let polity_id = self.allocate_polity_id();
        let faction_id = self.allocate_faction_id();
        let date = self.current_date;

        let group = self
            .groups
            .get_mut(&group_id)
            .ok_or(SimulationError::UnknownGroup(group_id))?;
        let draw = self.rng.next_float(group.cell, RngOffset::TribeCoreInfluence);
        let influence = Polity::tribe_core_influence(draw, group.influences.staged_total());
        group.influences.set(polity_id, influence, || 0.0);

        let mut polity =
            Polity::new_tribe(polity_id, group_id, group.culture.clone(), faction_id, date);
        polity.total_population = group.population() as f64 * influence;

        self.polities.insert(polity_id, polity);
        self.add_polity_to_update(polity_id);
        self.add_group_to_update(group_id);
        self.pending.new_polities += 1;

        info!(
            polity = polity_id.raw(),
            group = group_id.raw(),
            influence,
            date,
            "tribe formed"
        );
        self.record(Occurrence::TribeFormed {
            polity: polity_id,
            group: group_id,
        });
        Ok(polity_id)
    }

    /// Applies pending faction relocations, settles the core group and
    /// refreshes the polity's culture and population.
    pub(crate) fn update_polity(&mut self, id: PolityId) -> Result<()> {
        let Some(polity) = self.polities.get_mut(&id) else {
            return Ok(());
        };
        polity.will_be_updated = false;
        for faction in polity.factions.iter_mut() {
            faction.apply_pending_core();
        }

        if polity.influenced_groups.is_empty() {
            self.pending.polities_to_remove.insert(id);
            return Ok(());
        }

        let members: Vec<(GroupId, f64, f64)> = polity
            .influenced_groups
            .iter()
            .filter_map(|gid| {
                self.groups
                    .get(gid)
                    .map(|g| (*gid, g.influences.value(id), g.population() as f64))
            })
            .collect();
        let is_member = |group: GroupId| members.iter().any(|(gid, _, _)| *gid == group);

        let core = polity
            .dominant_faction()
            .map(|f| f.core_group)
            .filter(|core| is_member(*core))
            .or_else(|| {
                members
                    .iter()
                    .fold(None::<(GroupId, f64)>, |best, &(gid, value, _)| match best {
                        Some((_, v)) if v >= value => best,
                        _ => Some((gid, value)),
                    })
                    .map(|(gid, _)| gid)
            });
        if let Some(core) = core {
            if polity.core_group != core {
                debug!(polity = id.raw(), core = core.raw(), "polity core moved");
            }
            polity.core_group = core;
            for faction in polity.factions.iter_mut() {
                if !is_member(faction.core_group) {
                    faction.core_group = core;
                }
            }
        }

        let weighted: Vec<(&Culture, f64)> = members
            .iter()
            .filter_map(|(gid, value, population)| {
                self.groups
                    .get(gid)
                    .map(|g| (&g.culture, value * population))
            })
            .collect();
        let total_population: f64 = weighted.iter().map(|(_, w)| w).sum();
        if total_population > 0.0 {
            polity.culture = Culture::weighted_average(weighted);
        }
        polity.total_population = total_population;
        Ok(())
    }

    /// Destroys a polity that no group holds influence for anymore.
    pub(crate) fn remove_polity(&mut self, id: PolityId) -> Result<()> {
        match self.polities.get(&id) {
            Some(polity) if polity.influenced_groups.is_empty() => {}
            _ => return Ok(()),
        }
        self.polities.remove(&id);
        for group in self.groups.values_mut() {
            group.influences.drop_staged(id);
        }
        self.pending.polities_to_update.remove(&id);
        self.rng.release_polity(id.raw());
        debug!(polity = id.raw(), date = self.current_date, "polity dissolved");
        self.record(Occurrence::PolityDissolved { polity: id });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{terrain::CellPos, world::tests::grassland_world};

    #[test]
    fn forming_a_tribe_stages_core_influence() {
        let mut world = grassland_world(8, 4);
        let group = world
            .spawn_initial_group(CellPos::new(2, 1), 1000)
            .expect("spawn");
        let polity = world.form_tribe(group).expect("tribe");

        let staged = world
            .group(group)
            .map(|g| g.influences.staged_total())
            .unwrap_or_default();
        assert!((0.5..=1.0).contains(&staged));
        assert_eq!(world.group(group).map(|g| g.influences.len()), Some(0));
        assert!(world.pending.polities_to_update.contains(&polity));
        assert_eq!(world.pending.new_polities, 1);

        world.post_update_group(group).expect("commit");
        let polity_ref = world.polity(polity).expect("polity");
        assert!(polity_ref.influenced_groups().any(|g| g == group));
        assert!(polity_ref.territory.contains(&CellPos::new(2, 1)));
    }

    #[test]
    fn update_recomputes_population_and_clears_the_flag() {
        let mut world = grassland_world(8, 4);
        let group = world
            .spawn_initial_group(CellPos::new(2, 1), 1000)
            .expect("spawn");
        let polity = world.form_tribe(group).expect("tribe");
        world.post_update_group(group).expect("commit");
        world.update_polity(polity).expect("update");

        let polity_ref = world.polity(polity).expect("polity");
        let influence = world
            .group(group)
            .map(|g| g.influences.value(polity))
            .unwrap_or_default();
        assert!((polity_ref.total_population - 1000.0 * influence).abs() < 1e-6);
        assert!(!polity_ref.will_be_updated);
        assert_eq!(polity_ref.core_group, group);
    }

    #[test]
    fn memberless_polities_are_dissolved() {
        let mut world = grassland_world(8, 4);
        let group = world
            .spawn_initial_group(CellPos::new(2, 1), 1000)
            .expect("spawn");
        let polity = world.form_tribe(group).expect("tribe");
        world.post_update_group(group).expect("commit");
        world
            .rng
            .next_float(CellPos::new(2, 1), RngOffset::SetPolityUpdate(polity.raw()));
        world.destroy_group(group).expect("destroy");
        assert!(world.pending.polities_to_remove.contains(&polity));

        world.remove_polity(polity).expect("remove");
        assert!(world.polity(polity).is_none());
        assert!(world
            .rng
            .counters()
            .iter()
            .all(|c| c.offset != RngOffset::SetPolityUpdate(polity.raw())));
        assert!(matches!(
            world.pending.occurrences.last(),
            Some(Occurrence::PolityDissolved { .. })
        ));
    }
}
