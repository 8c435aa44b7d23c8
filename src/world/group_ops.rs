//! Group passes: update, post-update, setup for the next update and removal

use std::collections::BTreeMap;

use tracing::{debug, info};

use super::{GroupAction, World};
use crate::{
    culture::{CultureEnvironment, DiscoveryId, KnowledgeId, MIN_KNOWLEDGE_TRANSFER_VALUE},
    error::{Result, SimulationError},
    events::{
        boat_making_span, discovery_flag, plant_cultivation_span, tribalism_span,
        tribe_formation_span, Event, EventKind, MIN_SOCIAL_ORGANIZATION_FOR_TRIBALISM,
        MIN_SOCIAL_ORGANIZATION_FOR_TRIBALISM_SPAWN,
    },
    group::{
        dynamics::{
            adaptation_to_cell, farmland_percentage, next_update_span, optimal_population,
            population_after_time, UpdatePacing,
        },
        migration::{self as scoring, CellCandidate},
        GroupId, PendingExpansion, PendingMigration, PopulationGroup, MIN_GROUP_POPULATION,
    },
    influence::UNREACHABLE,
    polity::{Polity, PolityId},
    report::Occurrence,
    rng::RngOffset,
    terrain::{CellPos, Direction, SeaRoute, OCEAN},
};

impl World {
    /// Advances a dirty group to the current date. Runs at most once per tick.
    pub(crate) fn update_group(&mut self, id: GroupId) -> Result<()> {
        if !self.groups.contains_key(&id) {
            return Ok(());
        }
        self.with_group(id, |world, group| world.update_group_state(group))
    }

    fn update_group_state(&mut self, group: &mut PopulationGroup) -> Result<()> {
        if group.already_updated || group.destroyed {
            return Ok(());
        }
        group.previous_exact_population = group.exact_population;

        let time_span = self.current_date - group.last_update_date;
        if time_span <= 0 {
            return Ok(());
        }
        group.already_updated = true;

        group.exact_population =
            population_after_time(group.exact_population, group.optimal_population, time_span);
        self.update_culture(group, time_span);

        let span = time_span as f64;
        for pi in group.influences.iter() {
            if let Some(polity) = self.polities.get(&pi.polity) {
                group.culture.apply_polity_influence(&polity.culture, pi.value, span);
            }
        }

        self.apply_polity_update_effects(group, span);
        self.consider_tribe_formation(group)?;
        self.queue_knowledge_transfers(group, span);

        group.update_travel_factors(self.terrain.travel_width_factor());
        self.update_core_distances(group);

        self.pending.updated_groups.insert(group.id);
        self.pending.touched_groups.insert(group.id);
        Ok(())
    }

    fn update_culture(&mut self, group: &mut PopulationGroup, time_span: i64) {
        let pos = group.cell;
        let biome_presences = self
            .terrain
            .neighborhood_biomes(pos)
            .into_iter()
            .map(|name| {
                let presence = self.terrain.neighborhood_presence(pos, &name);
                (name, presence)
            })
            .collect();
        let env = CultureEnvironment {
            population: group.exact_population,
            biome_presences,
            ocean_presence: self.terrain.neighborhood_presence(pos, OCEAN),
            arability: self.terrain.cell(pos).map(|c| c.arability).unwrap_or(0.0),
        };
        let jitter = self.rng.next_float(pos, RngOffset::CultureUpdate);
        group.culture.update(&env, time_span as f64, jitter);
    }

    fn apply_polity_update_effects(&mut self, group: &mut PopulationGroup, time_span: f64) {
        // Staged values scale against their own staged sum, so the adjusted
        // values never exceed the target total.
        let total = group.influences.staged_total();
        let active: Vec<(PolityId, f64)> = group
            .influences
            .iter()
            .filter(|pi| !group.influences.is_pending_removal(pi.polity))
            .map(|pi| (pi.polity, pi.new_value))
            .collect();

        for (polity_id, value) in active {
            let Some(is_core) = self.polities.get(&polity_id).map(|p| p.is_core(group.id)) else {
                continue;
            };
            if is_core {
                continue;
            }
            let draw = self
                .rng
                .next_float(group.cell, RngOffset::PolityUpdateEffects(polity_id.raw()));
            let Some(new_value) = self
                .polities
                .get(&polity_id)
                .and_then(|p| p.group_update_effects(group.id, value, total, time_span, draw))
            else {
                continue;
            };
            let distance = group.influences.core_distance(polity_id);
            group.influences.set(polity_id, new_value, || distance);
        }
    }

    fn consider_tribe_formation(&mut self, group: &mut PopulationGroup) -> Result<()> {
        if group.has_tribe_formation_event()
            || !group.culture.has_discovery_or_pending(DiscoveryId::Tribalism)
        {
            return Ok(());
        }
        let social_organization = group
            .culture
            .knowledge_value(KnowledgeId::SocialOrganization);
        if social_organization < MIN_SOCIAL_ORGANIZATION_FOR_TRIBALISM {
            return Ok(());
        }

        let draw = self.rng.next_float(group.cell, RngOffset::TribeFormationDate);
        let Some(span) = tribe_formation_span(draw, social_organization) else {
            return Ok(());
        };
        if span <= 0 {
            return Ok(());
        }
        let date = self.date_after(span)?;
        group.tribe_formation_event_date = Some(date);
        self.insert_event(Event::new(EventKind::TribeFormation, date, group.id, group.cell));
        Ok(())
    }

    fn queue_knowledge_transfers(&mut self, group: &PopulationGroup, time_span: f64) {
        for (knowledge, own) in group.culture.knowledges() {
            let best = group
                .neighbors()
                .filter_map(|(_, id)| self.groups.get(&id))
                .map(|n| n.culture.knowledge_value(knowledge))
                .fold(0.0, f64::max);
            if best <= own.value || best <= 0.0 {
                continue;
            }
            if 1.0 - own.value / best <= MIN_KNOWLEDGE_TRANSFER_VALUE {
                continue;
            }
            self.pending.actions.push(GroupAction::KnowledgeTransfer {
                group: group.id,
                knowledge,
                value: best,
                time_span,
            });
        }
    }

    /// Graph distance from `group` to the core of `polity` through neighbours
    /// that already know their own distance.
    pub(crate) fn shortest_core_distance(&self, group: &PopulationGroup, polity: PolityId) -> f64 {
        if self
            .polities
            .get(&polity)
            .map(|p| p.is_core(group.id))
            .unwrap_or(false)
        {
            return 0.0;
        }
        let Some(cell) = self.terrain.cell(group.cell) else {
            return UNREACHABLE;
        };
        group
            .neighbors()
            .filter_map(|(direction, id)| {
                let from_neighbor = self.groups.get(&id)?.influences.core_distance(polity);
                if from_neighbor == UNREACHABLE {
                    return None;
                }
                let total = from_neighbor + cell.neighbor_distance(direction)?;
                (total >= 0.0).then_some(total)
            })
            .fold(UNREACHABLE, f64::min)
    }

    fn update_core_distances(&self, group: &mut PopulationGroup) {
        let distances: BTreeMap<PolityId, f64> = group
            .influences
            .polities()
            .into_iter()
            .map(|polity| (polity, self.shortest_core_distance(group, polity)))
            .collect();
        group
            .influences
            .update_core_distances(|polity| distances.get(&polity).copied().unwrap_or(UNREACHABLE));
    }

    /// Flags a polity for this tick's update. Core groups and forced calls
    /// always do; other members do so with chance `1 / member count`.
    pub(crate) fn set_polity_update(&mut self, group: &PopulationGroup, polity: PolityId, force: bool) {
        let Some(p) = self.polities.get(&polity) else {
            return;
        };
        if p.will_be_updated {
            return;
        }
        if force || p.is_core(group.id) {
            self.add_polity_to_update(polity);
            return;
        }
        let members = p.influenced_group_count();
        if members == 0 {
            return;
        }
        let chance = 1.0 / members as f64;
        let roll = self
            .rng
            .next_float(group.cell, RngOffset::SetPolityUpdate(polity.raw()));
        if roll <= chance {
            self.add_polity_to_update(polity);
        }
    }

    pub(crate) fn post_update_group(&mut self, id: GroupId) -> Result<()> {
        if !self.groups.contains_key(&id) {
            return Ok(());
        }
        self.with_group(id, |world, group| world.post_update_group_state(group))
    }

    fn post_update_group_state(&mut self, group: &mut PopulationGroup) -> Result<()> {
        group.already_updated = false;
        if group.destroyed {
            return Ok(());
        }
        if group.population() < MIN_GROUP_POPULATION {
            self.pending.groups_to_remove.insert(group.id);
            return Ok(());
        }

        let cell = self
            .terrain
            .cell_mut(group.cell)
            .ok_or(SimulationError::UnknownCell(group.cell))?;
        cell.farmland_percentage = farmland_percentage(&group.culture, cell, group.population());
        let arability = cell.arability;

        for discovery in group.culture.post_update(arability) {
            info!(group = group.id.raw(), ?discovery, date = self.current_date, "discovery made");
            self.record(Occurrence::Discovery {
                group: group.id,
                discovery,
            });
        }

        for polity in group.influences.polities() {
            self.set_polity_update(group, polity, false);
        }

        let previous_highest = group.influences.highest();
        let outcome = group.influences.commit(group.id)?;

        for polity in outcome.removed {
            if let Some(p) = self.polities.get_mut(&polity) {
                if p.remove_influenced_group(group.id) {
                    self.add_polity_to_remove(polity);
                }
            }
            self.set_polity_update(group, polity, true);
        }
        for polity in outcome.added {
            self.set_polity_update(group, polity, true);
            if let Some(p) = self.polities.get_mut(&polity) {
                p.add_influenced_group(group.id);
            }
        }

        let highest = group.influences.highest();
        if highest != previous_highest {
            if let Some(p) = previous_highest.and_then(|pid| self.polities.get_mut(&pid)) {
                p.territory.remove(&group.cell);
            }
            if let Some(p) = highest.and_then(|pid| self.polities.get_mut(&pid)) {
                p.territory.insert(group.cell);
            }
        }

        group
            .influences
            .update_administrative_costs(group.population() as f64);
        Ok(())
    }

    pub(crate) fn setup_group_for_next_update(&mut self, id: GroupId) -> Result<()> {
        if !self.groups.contains_key(&id) {
            return Ok(());
        }
        self.with_group(id, |world, group| world.setup_group_state(group))
    }

    fn setup_group_state(&mut self, group: &mut PopulationGroup) -> Result<()> {
        if group.destroyed {
            return Ok(());
        }
        let cell = self
            .terrain
            .cell(group.cell)
            .ok_or(SimulationError::UnknownCell(group.cell))?;
        group.optimal_population =
            optimal_population(group.id, &group.culture, cell, self.terrain.biomes())?;

        group.migration_value = self.migration_value(group, group.cell)?;
        group.total_migration_value = group.migration_value;

        self.consider_land_migration(group)?;
        self.consider_sea_migration(group)?;
        self.consider_influence_expansion(group)?;
        self.consider_discoveries(group)?;

        let pacing = UpdatePacing {
            draw: self.rng.next_float(group.cell, RngOffset::NextUpdateDate),
            migration_value: group.migration_value,
            total_migration_value: group.total_migration_value,
            expansion_value: group.polity_expansion_value,
            total_expansion_value: group.total_polity_expansion_value,
            skill_level: group.culture.minimum_skill_adaptation_level(),
            knowledge_level: group.culture.minimum_knowledge_progress_level(),
            optimal_population: group.optimal_population,
            population: group.population(),
        };
        group.next_update_date = self.date_after(next_update_span(&pacing))?;
        group.last_update_date = self.current_date;

        self.insert_event(Event::new(
            EventKind::Update,
            group.next_update_date,
            group.id,
            group.cell,
        ));
        self.pending.touched_groups.insert(group.id);
        Ok(())
    }

    /// Attractiveness of `target` for this group, compared against staying.
    pub(crate) fn migration_value(&self, group: &PopulationGroup, target: CellPos) -> Result<f64> {
        let source_cell = self
            .terrain
            .cell(group.cell)
            .ok_or(SimulationError::UnknownCell(group.cell))?;
        let target_cell = self
            .terrain
            .cell(target)
            .ok_or(SimulationError::UnknownCell(target))?;

        let is_own_cell = target == group.cell;
        let (existing_population, optimal) = if is_own_cell {
            (Some(group.population()), group.optimal_population)
        } else {
            let existing = target_cell
                .group
                .and_then(|id| self.groups.get(&id))
                .map(|g| g.population());
            let optimal =
                optimal_population(group.id, &group.culture, target_cell, self.terrain.biomes())?;
            (existing, optimal)
        };

        let candidate = CellCandidate {
            area_factor: target_cell.area / self.terrain.max_area(),
            altitude_delta_factor: scoring::altitude_delta_factor(
                source_cell.area,
                source_cell.altitude,
                target_cell.altitude,
            ),
            existing_population,
            is_own_cell,
            optimal_population: optimal,
        };
        Ok(scoring::migration_value(group.population(), &candidate))
    }

    /// Years to walk from the group's cell into `target`, or `None` when the
    /// group cannot survive there.
    fn land_travel_time(&self, group: &PopulationGroup, target: CellPos) -> Result<Option<i64>> {
        let source = self
            .terrain
            .cell(group.cell)
            .ok_or(SimulationError::UnknownCell(group.cell))?;
        let destination = self
            .terrain
            .cell(target)
            .ok_or(SimulationError::UnknownCell(target))?;
        let adaptation =
            adaptation_to_cell(group.id, &group.culture, destination, self.terrain.biomes())?;
        if adaptation.survivability <= 0.0 {
            return Ok(None);
        }
        let altitude_factor =
            scoring::altitude_delta_factor(source.area, source.altitude, destination.altitude);
        let travel_factor = scoring::land_travel_factor(
            altitude_factor,
            adaptation.survivability,
            destination.accessibility,
        );
        Ok(Some(scoring::land_travel_time(
            source.width,
            self.terrain.travel_width_factor(),
            travel_factor,
        )))
    }

    fn consider_land_migration(&mut self, group: &mut PopulationGroup) -> Result<()> {
        if group.has_migration_event() {
            return Ok(());
        }
        let cell = self
            .terrain
            .cell(group.cell)
            .ok_or(SimulationError::UnknownCell(group.cell))?;
        let index = self.rng.next_int(
            group.cell,
            RngOffset::LandMigrationTarget,
            cell.neighbor_count(),
        );
        let Some((_, target)) = cell.neighbor_at(index) else {
            return Ok(());
        };

        let value = self.migration_value(group, target)?;
        group.total_migration_value += value;
        let chance = if group.total_migration_value > 0.0 {
            value / group.total_migration_value
        } else {
            0.0
        };
        let roll = self
            .rng
            .next_float(group.cell, RngOffset::LandMigrationChance);
        if roll > chance {
            return Ok(());
        }

        let Some(travel_time) = self.land_travel_time(group, target)? else {
            return Ok(());
        };
        let date = self.date_after(travel_time)?;
        self.set_migration_event(group, target, date);
        Ok(())
    }

    fn consider_sea_migration(&mut self, group: &mut PopulationGroup) -> Result<()> {
        if group.sea_travel_factor <= 0.0 || group.has_migration_event() {
            return Ok(());
        }
        if group.sea_route.is_none() {
            group.sea_route = SeaRoute::trace(&self.terrain, group.cell, &mut self.rng)
                .filter(|route| route.is_usable(&self.terrain));
        }
        let Some((target, length)) = group
            .sea_route
            .as_ref()
            .and_then(|route| route.last_cell.map(|last| (last, route.length)))
        else {
            return Ok(());
        };
        if target == group.cell {
            return Ok(());
        }

        group.total_migration_value += self.migration_value(group, target)?;

        let destination = self
            .terrain
            .cell(target)
            .ok_or(SimulationError::UnknownCell(target))?;
        let adaptation =
            adaptation_to_cell(group.id, &group.culture, destination, self.terrain.biomes())?;
        if adaptation.survivability <= 0.0 {
            return Ok(());
        }

        let chance = scoring::sea_success_chance(group.sea_travel_factor, length);
        let attempt = self
            .rng
            .next_float(group.cell, RngOffset::SeaMigrationChance);
        if attempt >= chance {
            return Ok(());
        }

        let travel_time = scoring::sea_travel_time(length, group.sea_travel_factor);
        let date = self.date_after(travel_time.max(1))?;
        self.set_migration_event(group, target, date);
        Ok(())
    }

    fn set_migration_event(&mut self, group: &mut PopulationGroup, target: CellPos, date: i64) {
        group.migration_event = Some(PendingMigration { date, target });
        self.insert_event(Event::new(
            EventKind::Migrate { target },
            date,
            group.id,
            group.cell,
        ));
    }

    fn consider_influence_expansion(&mut self, group: &mut PopulationGroup) -> Result<()> {
        group.polity_expansion_value = 0.0;
        group.total_polity_expansion_value = 0.0;

        if group.influences.is_empty()
            || group.neighbor_count() == 0
            || group.has_expansion_event()
        {
            return Ok(());
        }

        let weights = group.influences.snapshot();
        let draw = self.rng.next_float(group.cell, RngOffset::ExpansionPolity);
        let Some((polity, source_value)) =
            weighted_selection(&weights, group.influences.total(), draw)
        else {
            return Ok(());
        };

        group.polity_expansion_value = 1.0;
        group.total_polity_expansion_value = 1.0;

        let index = self
            .rng
            .next_int(group.cell, RngOffset::ExpansionTarget, Direction::COUNT);
        let Some(target_id) = group.neighbor_from(index) else {
            return Ok(());
        };
        let Some(target) = self.groups.get(&target_id) else {
            return Ok(());
        };
        if !target.still_present {
            return Ok(());
        }
        let target_total = target.influences.total();
        let target_cell_pos = target.cell;

        let target_cell = self
            .terrain
            .cell(target_cell_pos)
            .ok_or(SimulationError::UnknownCell(target_cell_pos))?;
        let survivability =
            adaptation_to_cell(group.id, &group.culture, target_cell, self.terrain.biomes())?
                .survivability;

        let value = Polity::group_influence_expansion_value(
            source_value,
            group.influences.total(),
            target_total,
            survivability,
        );
        group.total_polity_expansion_value += value;

        let chance = value / group.total_polity_expansion_value;
        let roll = self.rng.next_float(group.cell, RngOffset::ExpansionChance);
        if roll > chance {
            return Ok(());
        }

        let Some(travel_time) = self.land_travel_time(group, target_cell_pos)? else {
            return Ok(());
        };
        let date = self.date_after(travel_time)?;
        group.expansion_event = Some(PendingExpansion {
            date,
            polity,
            target: target_id,
        });
        self.insert_event(Event::new(
            EventKind::ExpandInfluence {
                polity,
                target: target_id,
            },
            date,
            group.id,
            group.cell,
        ));
        Ok(())
    }

    fn consider_discoveries(&mut self, group: &mut PopulationGroup) -> Result<()> {
        let cell = self
            .terrain
            .cell(group.cell)
            .ok_or(SimulationError::UnknownCell(group.cell))?;
        let is_coastline = cell.is_coastline;
        let arability = cell.arability;
        let ocean_presence = self.terrain.neighborhood_presence(group.cell, OCEAN);
        let social_organization = group
            .culture
            .knowledge_value(KnowledgeId::SocialOrganization);

        for discovery in [
            DiscoveryId::BoatMaking,
            DiscoveryId::PlantCultivation,
            DiscoveryId::Tribalism,
        ] {
            let flag = discovery_flag(discovery);
            if group.culture.has_discovery_or_pending(discovery) || group.is_flag_set(flag) {
                continue;
            }
            let (eligible, offset) = match discovery {
                DiscoveryId::BoatMaking => (is_coastline, RngOffset::BoatMakingDate),
                DiscoveryId::PlantCultivation => (arability > 0.0, RngOffset::PlantCultivationDate),
                DiscoveryId::Tribalism => (
                    social_organization >= MIN_SOCIAL_ORGANIZATION_FOR_TRIBALISM_SPAWN,
                    RngOffset::TribalismDate,
                ),
            };
            if !eligible {
                continue;
            }

            let draw = self.rng.next_float(group.cell, offset);
            let span = match discovery {
                DiscoveryId::BoatMaking => boat_making_span(draw, ocean_presence),
                DiscoveryId::PlantCultivation => plant_cultivation_span(draw, arability),
                DiscoveryId::Tribalism => tribalism_span(draw, social_organization),
            };
            let date = self.date_after(span.max(1))?;
            group.set_flag(flag);
            self.insert_event(Event::new(
                EventKind::Discovery { discovery },
                date,
                group.id,
                group.cell,
            ));
        }
        Ok(())
    }

    /// Removes an extinct group: releases its influences, vacates the cell
    /// and severs neighbour links.
    pub(crate) fn destroy_group(&mut self, id: GroupId) -> Result<()> {
        let Some(mut group) = self.groups.remove(&id) else {
            return Ok(());
        };
        group.destroyed = true;
        group.still_present = false;

        for polity in group.influences.polities() {
            self.set_polity_update(&group, polity, true);
        }
        if let Some(p) = group
            .influences
            .highest()
            .and_then(|pid| self.polities.get_mut(&pid))
        {
            p.territory.remove(&group.cell);
        }
        for polity in group.influences.clear() {
            if let Some(p) = self.polities.get_mut(&polity) {
                if p.remove_influenced_group(id) {
                    self.add_polity_to_remove(polity);
                }
            }
        }

        if let Some(cell) = self.terrain.cell_mut(group.cell) {
            cell.group = None;
            cell.farmland_percentage = 0.0;
        }
        for (_, neighbor) in group.neighbors() {
            if let Some(n) = self.groups.get_mut(&neighbor) {
                n.remove_neighbor(id);
            }
        }
        group.sea_route = None;

        self.pending.updated_groups.remove(&id);
        self.pending.groups_to_update.remove(&id);
        debug!(group = id.raw(), date = self.current_date, "group extinct");
        self.record(Occurrence::GroupExtinct {
            group: id,
            cell: group.cell,
        });
        Ok(())
    }
}

/// Picks an entry with probability proportional to its weight. `draw` is
/// uniform in [0, 1).
fn weighted_selection<T: Copy>(items: &[(T, f64)], total: f64, draw: f64) -> Option<(T, f64)> {
    let mut threshold = draw * total;
    for &(item, weight) in items {
        if threshold < weight {
            return Some((item, weight));
        }
        threshold -= weight;
    }
    items.last().copied()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::tests::grassland_world;

    #[test]
    fn weighted_selection_follows_cumulative_weights() {
        let items = [("a", 0.2), ("b", 0.3)];
        assert_eq!(weighted_selection(&items, 0.5, 0.0).map(|p| p.0), Some("a"));
        assert_eq!(weighted_selection(&items, 0.5, 0.39).map(|p| p.0), Some("a"));
        assert_eq!(weighted_selection(&items, 0.5, 0.41).map(|p| p.0), Some("b"));
        assert_eq!(weighted_selection::<&str>(&[], 0.0, 0.5), None);
    }

    #[test]
    fn setup_schedules_an_update_within_bounds() {
        let mut world = grassland_world(8, 4);
        let id = world
            .spawn_initial_group(CellPos::new(2, 1), 1000)
            .expect("spawn");
        world.setup_group_for_next_update(id).expect("setup");

        let group = world.group(id).expect("group");
        assert!(group.optimal_population > 0);
        assert!(group.next_update_date >= 25);
        assert!(group.next_update_date <= 200_000);
        assert!(world
            .events()
            .entries()
            .iter()
            .any(|q| q.event.kind == EventKind::Update && q.event.group == id));
    }

    #[test]
    fn update_is_a_noop_without_elapsed_time() {
        let mut world = grassland_world(8, 4);
        let id = world
            .spawn_initial_group(CellPos::new(2, 1), 1000)
            .expect("spawn");
        world.update_group(id).expect("update");
        let group = world.group(id).expect("group");
        assert_eq!(group.exact_population, 1000.0);
        assert!(!group.already_updated);
    }

    #[test]
    fn update_moves_population_toward_optimal() {
        let mut world = grassland_world(8, 4);
        let id = world
            .spawn_initial_group(CellPos::new(2, 1), 1000)
            .expect("spawn");
        world.setup_group_for_next_update(id).expect("setup");
        world.current_date = 100;
        world.update_group(id).expect("update");

        let group = world.group(id).expect("group");
        assert!(group.already_updated);
        assert_eq!(group.previous_exact_population, 1000.0);
        assert!(group.exact_population > 1000.0);
        assert!(group.exact_population <= group.optimal_population as f64);

        let population = group.exact_population;
        world.update_group(id).expect("second update");
        assert_eq!(world.group(id).map(|g| g.exact_population), Some(population));
    }

    #[test]
    fn tiny_groups_are_marked_for_removal() {
        let mut world = grassland_world(8, 4);
        let id = world
            .spawn_initial_group(CellPos::new(2, 1), 1)
            .expect("spawn");
        world.post_update_group(id).expect("post update");
        assert!(world.pending.groups_to_remove.contains(&id));
    }

    #[test]
    fn destroying_a_group_vacates_its_cell_and_links() {
        let mut world = grassland_world(8, 4);
        let a = world
            .spawn_initial_group(CellPos::new(2, 1), 1000)
            .expect("spawn a");
        let b = world
            .spawn_initial_group(CellPos::new(3, 1), 1000)
            .expect("spawn b");
        world.destroy_group(a).expect("destroy");

        assert!(world.group(a).is_none());
        assert!(world.group_at(CellPos::new(2, 1)).is_none());
        assert_eq!(world.group(b).map(|g| g.neighbor_count()), Some(0));
        assert!(matches!(
            world.pending.occurrences.last(),
            Some(Occurrence::GroupExtinct { group, .. }) if *group == a
        ));
    }

    #[test]
    fn update_effects_after_a_merge_keep_the_total_within_one() {
        let mut world = grassland_world(8, 4);
        let a = world
            .spawn_initial_group(CellPos::new(1, 1), 1000)
            .expect("spawn a");
        let member = world
            .spawn_initial_group(CellPos::new(3, 1), 1000)
            .expect("spawn member");
        let c = world
            .spawn_initial_group(CellPos::new(5, 1), 1000)
            .expect("spawn c");
        let first = world.form_tribe(a).expect("tribe a");
        let second = world.form_tribe(c).expect("tribe c");
        world.post_update_group(a).expect("commit a");
        world.post_update_group(c).expect("commit c");

        let mut group = world.groups.remove(&member).expect("member");
        group.influences.set(first, 0.03, || 1.0);
        group.influences.set(second, 0.02, || 1.0);
        group.influences.commit(member).expect("commit member");
        group.influences.merge(&[(first, 0.9)], 0.9, |_| 1.0);
        assert!(group.influences.staged_total() > 0.8);
        assert!(group.influences.total() < 0.1);

        world.apply_polity_update_effects(&mut group, 1.0e9);
        let outcome = group.influences.commit(member);
        assert!(outcome.is_ok(), "{outcome:?}");
        assert!(group.influences.total() <= 1.0 + 1e-5);
    }

    #[test]
    fn core_distance_is_zero_at_the_core_and_grows_outward() {
        let mut world = grassland_world(8, 4);
        let core = world
            .spawn_initial_group(CellPos::new(2, 1), 1000)
            .expect("spawn core");
        let edge = world
            .spawn_initial_group(CellPos::new(3, 1), 1000)
            .expect("spawn edge");
        let polity = world.form_tribe(core).expect("tribe");
        world.post_update_group(core).expect("commit core");

        let core_group = world.group(core).expect("core");
        assert_eq!(world.shortest_core_distance(core_group, polity), 0.0);
        let edge_group = world.group(edge).expect("edge");
        let distance = world.shortest_core_distance(edge_group, polity);
        assert!(distance > 0.0 && distance < UNREACHABLE);
    }
}
