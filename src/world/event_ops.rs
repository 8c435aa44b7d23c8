//! Event lifecycle: validity, trigger gate, trigger action and cleanup

use std::collections::BTreeMap;

use tracing::{debug, trace};

use super::World;
use crate::{
    culture::{DiscoveryId, KnowledgeId},
    error::{Result, SimulationError},
    events::{
        discovery_flag, tribe_formation_allowed, Event, EventKind,
        MIN_SOCIAL_ORGANIZATION_FOR_TRIBALISM,
    },
    group::{
        migration::{expansion_percent, migration_percent},
        GroupId, PendingExpansion, PendingMigration,
    },
    influence::UNREACHABLE,
    migration::MigratingGroup,
    polity::PolityId,
    report::Occurrence,
    rng::RngOffset,
    terrain::CellPos,
};

impl World {
    /// Handles a popped event. Stale events are dropped without touching
    /// their owner; current ones run when their gate passes and then release
    /// the owner's outstanding-event marker.
    pub(crate) fn fire_event(&mut self, event: Event) -> Result<()> {
        if !self.event_is_valid(&event) {
            trace!(id = event.id, kind = event.kind.name(), "dropping stale event");
            return Ok(());
        }
        if self.event_can_trigger(&event) {
            self.trigger_event(&event)?;
        } else {
            trace!(id = event.id, kind = event.kind.name(), "event gate closed");
        }
        self.release_event(&event);
        Ok(())
    }

    fn event_is_valid(&self, event: &Event) -> bool {
        let Some(group) = self.groups.get(&event.group) else {
            return false;
        };
        if group.destroyed || !group.still_present {
            return false;
        }
        match event.kind {
            EventKind::Update => group.next_update_date == event.trigger_date,
            EventKind::Migrate { target } => {
                group.migration_event
                    == Some(PendingMigration {
                        date: event.trigger_date,
                        target,
                    })
            }
            EventKind::ExpandInfluence { polity, target } => {
                group.expansion_event
                    == Some(PendingExpansion {
                        date: event.trigger_date,
                        polity,
                        target,
                    })
            }
            EventKind::TribeFormation => group.tribe_formation_event_date == Some(event.trigger_date),
            EventKind::Discovery { discovery } => group.is_flag_set(discovery_flag(discovery)),
        }
    }

    fn event_can_trigger(&mut self, event: &Event) -> bool {
        let Some(group) = self.groups.get(&event.group) else {
            return false;
        };
        let social_organization = group
            .culture
            .knowledge_value(KnowledgeId::SocialOrganization);

        match event.kind {
            EventKind::Update => true,
            EventKind::Migrate { .. } => group.total_migration_value > 0.0,
            EventKind::ExpandInfluence { polity, target } => {
                group.influences.contains(polity)
                    && self
                        .groups
                        .get(&target)
                        .map(|t| t.still_present && !t.destroyed)
                        .unwrap_or(false)
            }
            EventKind::TribeFormation => {
                if !group.culture.has_discovery_or_pending(DiscoveryId::Tribalism) {
                    return false;
                }
                let total = group.influences.staged_total();
                let cell = group.cell;
                let rng = &mut self.rng;
                tribe_formation_allowed(total, || {
                    rng.next_float(cell, RngOffset::EventCanTrigger(event.id))
                })
            }
            EventKind::Discovery { discovery } => {
                if group.culture.has_discovery_or_pending(discovery) {
                    return false;
                }
                discovery != DiscoveryId::Tribalism
                    || social_organization >= MIN_SOCIAL_ORGANIZATION_FOR_TRIBALISM
            }
        }
    }

    fn trigger_event(&mut self, event: &Event) -> Result<()> {
        match event.kind {
            EventKind::Update => {
                self.add_group_to_update(event.group);
                Ok(())
            }
            EventKind::Migrate { target } => self.trigger_migration(event, target),
            EventKind::ExpandInfluence { polity, target } => {
                self.trigger_expansion(event, polity, target)
            }
            EventKind::TribeFormation => self.form_tribe(event.group).map(|_| ()),
            EventKind::Discovery { discovery } => {
                if let Some(group) = self.groups.get_mut(&event.group) {
                    group.culture.add_discovery_to_find(discovery);
                }
                self.add_group_to_update(event.group);
                Ok(())
            }
        }
    }

    fn trigger_migration(&mut self, event: &Event, target: CellPos) -> Result<()> {
        let group = self
            .groups
            .get(&event.group)
            .ok_or(SimulationError::UnknownGroup(event.group))?;
        let (migration_value, total) = (group.migration_value, group.total_migration_value);

        let draw = self
            .rng
            .next_float(event.cell, RngOffset::EventTrigger(event.id));
        let percent = migration_percent(draw, migration_value, total)
            .ok_or(SimulationError::InvalidMigrationPercent { group: event.group })?;

        self.add_migrating_group(MigratingGroup::new(event.group, target, percent));
        Ok(())
    }

    /// Queues a migration for this tick and marks both ends for update.
    pub(crate) fn add_migrating_group(&mut self, migrating: MigratingGroup) {
        self.add_group_to_update(migrating.source);
        if let Some(target) = self
            .terrain
            .cell(migrating.target_cell)
            .and_then(|cell| cell.group)
        {
            self.add_group_to_update(target);
        }
        self.pending.migrating_groups.push(migrating);
    }

    fn trigger_expansion(
        &mut self,
        event: &Event,
        polity: PolityId,
        target_id: GroupId,
    ) -> Result<()> {
        let source = self
            .groups
            .get(&event.group)
            .ok_or(SimulationError::UnknownGroup(event.group))?;
        let influence = source.influences.value(polity);
        let source_population = source.population();
        let culture = source.culture.clone();
        let target_population = self
            .groups
            .get(&target_id)
            .map(|g| g.population())
            .ok_or(SimulationError::UnknownGroup(target_id))?;

        let draw = self
            .rng
            .next_float(event.cell, RngOffset::EventTrigger(event.id));
        let percent = expansion_percent(draw, source_population, target_population);

        self.with_group(target_id, |world, target| {
            target.culture.merge(&culture, percent);
            let distances: BTreeMap<PolityId, f64> = target
                .influences
                .polities()
                .into_iter()
                .chain(std::iter::once(polity))
                .map(|p| (p, world.shortest_core_distance(target, p)))
                .collect();
            target.influences.merge(&[(polity, influence)], percent, |p| {
                distances.get(&p).copied().unwrap_or(UNREACHABLE)
            });
            Ok(())
        })?;

        self.add_group_to_update(event.group);
        self.add_group_to_update(target_id);
        debug!(
            polity = polity.raw(),
            source = event.group.raw(),
            target = target_id.raw(),
            percent,
            "influence expanded"
        );
        self.record(Occurrence::InfluenceExpanded {
            polity,
            source: event.group,
            target: target_id,
            percent,
        });
        Ok(())
    }

    /// Clears the owner's marker for the event that just fired.
    fn release_event(&mut self, event: &Event) {
        let Some(group) = self.groups.get_mut(&event.group) else {
            return;
        };
        match event.kind {
            EventKind::Update => {}
            EventKind::Migrate { .. } => group.migration_event = None,
            EventKind::ExpandInfluence { .. } => group.expansion_event = None,
            EventKind::TribeFormation => group.tribe_formation_event_date = None,
            EventKind::Discovery { discovery } => group.unset_flag(discovery_flag(discovery)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::tests::grassland_world;

    #[test]
    fn superseded_migration_is_stale() {
        let mut world = grassland_world(8, 4);
        let id = world
            .spawn_initial_group(CellPos::new(2, 1), 1000)
            .expect("spawn");
        let cell = CellPos::new(2, 1);
        let target = CellPos::new(3, 1);
        if let Some(group) = world.groups.get_mut(&id) {
            group.migration_event = Some(PendingMigration { date: 40, target });
            group.total_migration_value = 1.0;
        }

        let old = Event::new(EventKind::Migrate { target }, 30, id, cell);
        world.fire_event(old).expect("fire");
        assert!(world.pending.migrating_groups.is_empty());
        assert!(world.group(id).map(|g| g.has_migration_event()).unwrap_or(false));

        let current = Event::new(EventKind::Migrate { target }, 40, id, cell);
        world.fire_event(current).expect("fire");
        assert_eq!(world.pending.migrating_groups.len(), 1);
        assert!(!world.group(id).map(|g| g.has_migration_event()).unwrap_or(true));
        assert!(world.pending.groups_to_update.contains(&id));
    }

    #[test]
    fn migrate_without_value_is_released_untriggered() {
        let mut world = grassland_world(8, 4);
        let id = world
            .spawn_initial_group(CellPos::new(2, 1), 1000)
            .expect("spawn");
        let target = CellPos::new(3, 1);
        if let Some(group) = world.groups.get_mut(&id) {
            group.migration_event = Some(PendingMigration { date: 40, target });
            group.total_migration_value = 0.0;
        }
        let event = Event::new(EventKind::Migrate { target }, 40, id, CellPos::new(2, 1));
        world.fire_event(event).expect("fire");
        assert!(world.pending.migrating_groups.is_empty());
        assert!(!world.group(id).map(|g| g.has_migration_event()).unwrap_or(true));
    }

    #[test]
    fn discovery_event_stages_the_discovery_and_clears_its_flag() {
        let mut world = grassland_world(8, 4);
        let id = world
            .spawn_initial_group(CellPos::new(2, 1), 1000)
            .expect("spawn");
        let discovery = DiscoveryId::PlantCultivation;
        if let Some(group) = world.groups.get_mut(&id) {
            group.set_flag(discovery_flag(discovery));
        }
        let event = Event::new(EventKind::Discovery { discovery }, 10, id, CellPos::new(2, 1));
        world.fire_event(event).expect("fire");

        let group = world.group(id).expect("group");
        assert!(group.culture.has_discovery_or_pending(discovery));
        assert!(!group.is_flag_set(discovery_flag(discovery)));
    }

    #[test]
    fn tribalism_needs_social_organization() {
        let mut world = grassland_world(8, 4);
        let id = world
            .spawn_initial_group(CellPos::new(2, 1), 1000)
            .expect("spawn");
        let discovery = DiscoveryId::Tribalism;
        if let Some(group) = world.groups.get_mut(&id) {
            group.set_flag(discovery_flag(discovery));
        }
        let event = Event::new(EventKind::Discovery { discovery }, 10, id, CellPos::new(2, 1));
        world.fire_event(event).expect("fire");
        let group = world.group(id).expect("group");
        assert!(!group.culture.has_discovery_or_pending(discovery));
        assert!(!group.is_flag_set(discovery_flag(discovery)));
    }

    #[test]
    fn tribe_formation_needs_tribalism_found_or_pending() {
        let mut world = grassland_world(8, 4);
        let cell = CellPos::new(2, 1);
        let id = world.spawn_initial_group(cell, 1000).expect("spawn");
        if let Some(group) = world.groups.get_mut(&id) {
            group
                .culture
                .set_knowledge_value(KnowledgeId::SocialOrganization, 5000.0);
            group.tribe_formation_event_date = Some(60);
        }
        world
            .fire_event(Event::new(EventKind::TribeFormation, 60, id, cell))
            .expect("fire");
        assert_eq!(world.polity_count(), 0);
        assert!(!world.group(id).map(|g| g.has_tribe_formation_event()).unwrap_or(true));

        if let Some(group) = world.groups.get_mut(&id) {
            group.culture.add_discovery_to_find(DiscoveryId::Tribalism);
            group.tribe_formation_event_date = Some(80);
        }
        world
            .fire_event(Event::new(EventKind::TribeFormation, 80, id, cell))
            .expect("fire");
        assert_eq!(world.polity_count(), 1);
        assert!(world.pending.groups_to_update.contains(&id));
    }

    #[test]
    fn events_of_missing_groups_are_ignored() {
        let mut world = grassland_world(8, 4);
        let event = Event::new(
            EventKind::Update,
            10,
            GroupId::new(99),
            CellPos::new(2, 1),
        );
        world.fire_event(event).expect("fire");
        assert!(world.pending.groups_to_update.is_empty());
    }

    #[test]
    fn expansion_moves_a_share_of_source_influence_into_the_target() {
        let mut world = grassland_world(8, 4);
        let source_cell = CellPos::new(2, 1);
        let source = world
            .spawn_initial_group(source_cell, 1000)
            .expect("spawn source");
        let target = world
            .spawn_initial_group(CellPos::new(3, 1), 1000)
            .expect("spawn target");
        let polity = world.form_tribe(source).expect("tribe");
        if let Some(group) = world.groups.get_mut(&source) {
            group.influences.set(polity, 0.3, || 0.0);
        }
        world.post_update_group(source).expect("commit");
        assert_eq!(world.group(source).map(|g| g.influences.value(polity)), Some(0.3));
        assert_eq!(world.group(target).map(|g| g.influences.staged_total()), Some(0.0));

        let date = 50;
        if let Some(group) = world.groups.get_mut(&source) {
            group.expansion_event = Some(PendingExpansion {
                date,
                polity,
                target,
            });
        }
        let event = Event::new(
            EventKind::ExpandInfluence { polity, target },
            date,
            source,
            source_cell,
        );
        let draw = crate::rng::draw(
            world.seed(),
            source_cell,
            RngOffset::EventTrigger(event.id),
            0,
        );
        let percent = expansion_percent(draw, 1000, 1000);
        world.fire_event(event).expect("fire");

        let expected = crate::influence::round_to_six_decimals(0.3 * percent);
        let staged = world
            .group(target)
            .map(|g| g.influences.staged_total())
            .unwrap_or_default();
        if expected > crate::influence::MIN_POLITY_INFLUENCE {
            assert_eq!(staged, expected);
            assert!(staged > 0.0);
        } else {
            assert_eq!(staged, 0.0);
        }
        assert!(staged <= 1.0);

        let recorded = world
            .pending
            .occurrences
            .iter()
            .find_map(|o| match o {
                Occurrence::InfluenceExpanded { percent, .. } => Some(*percent),
                _ => None,
            })
            .expect("expansion recorded");
        assert_eq!(recorded, percent);
        assert!(world.pending.groups_to_update.contains(&target));
        assert!(!world.group(source).map(|g| g.has_expansion_event()).unwrap_or(true));
    }
}
