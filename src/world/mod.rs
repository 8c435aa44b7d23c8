//! World state: the group and polity arenas, the event queue and the clock
//!
//! Groups and polities live in id-keyed maps. Cross references (neighbours,
//! influenced groups, faction cores) are ids, never borrows. Operations that
//! need a group and the rest of the world at once take the group out of its
//! map for the duration (see [`World::with_group`]).

mod actions;
mod event_ops;
mod group_ops;
mod polity_ops;

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    config::SimulationConfig,
    culture::{ActivityId, Culture, KnowledgeId, BASE_KNOWLEDGE_VALUE},
    error::{Result, SimulationError},
    events::{Event, EventQueue},
    group::{GroupId, PopulationGroup},
    migration::MigratingGroup,
    polity::{Polity, PolityId},
    report::{Occurrence, TickReport},
    rng::CellRng,
    terrain::{CellPos, TerrainGrid, OCEAN},
};

pub use actions::GroupAction;

/// Monotonic id sources.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct IdCounters {
    pub next_group: u64,
    pub next_polity: u64,
    pub next_faction: u64,
}

/// Working sets of the tick in progress. Empty between ticks except for
/// `updated_groups`, which holds freshly spawned groups awaiting setup.
#[derive(Debug, Default)]
pub(crate) struct TickState {
    pub(crate) groups_to_update: BTreeSet<GroupId>,
    pub(crate) migrating_groups: Vec<MigratingGroup>,
    pub(crate) actions: Vec<GroupAction>,
    pub(crate) updated_groups: BTreeSet<GroupId>,
    pub(crate) groups_to_remove: BTreeSet<GroupId>,
    pub(crate) polities_to_update: BTreeSet<PolityId>,
    pub(crate) polities_to_remove: BTreeSet<PolityId>,
    pub(crate) date_to_skip_to: i64,
    pub(crate) span: i64,
    pub(crate) touched_groups: BTreeSet<GroupId>,
    pub(crate) new_polities: usize,
    pub(crate) occurrences: Vec<Occurrence>,
}

#[derive(Debug)]
pub struct World {
    pub(crate) terrain: TerrainGrid,
    pub(crate) groups: BTreeMap<GroupId, PopulationGroup>,
    pub(crate) polities: BTreeMap<PolityId, Polity>,
    pub(crate) events: EventQueue,
    pub(crate) rng: CellRng,
    pub(crate) config: SimulationConfig,
    pub(crate) current_date: i64,
    pub(crate) tick: u64,
    pub(crate) ids: IdCounters,
    pub(crate) pending: TickState,
}

impl World {
    pub fn new(terrain: TerrainGrid, config: SimulationConfig, seed: u64) -> Self {
        Self {
            terrain,
            groups: BTreeMap::new(),
            polities: BTreeMap::new(),
            events: EventQueue::new(),
            rng: CellRng::new(seed),
            config,
            current_date: 0,
            tick: 0,
            ids: IdCounters::default(),
            pending: TickState::default(),
        }
    }

    pub fn terrain(&self) -> &TerrainGrid {
        &self.terrain
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn seed(&self) -> u64 {
        self.rng.seed()
    }

    pub fn current_date(&self) -> i64 {
        self.current_date
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn group(&self, id: GroupId) -> Option<&PopulationGroup> {
        self.groups.get(&id)
    }

    pub fn groups(&self) -> impl Iterator<Item = &PopulationGroup> {
        self.groups.values()
    }

    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    pub fn group_at(&self, cell: CellPos) -> Option<&PopulationGroup> {
        self.terrain
            .cell(cell)
            .and_then(|c| c.group)
            .and_then(|id| self.groups.get(&id))
    }

    pub fn polity(&self, id: PolityId) -> Option<&Polity> {
        self.polities.get(&id)
    }

    pub fn polities(&self) -> impl Iterator<Item = &Polity> {
        self.polities.values()
    }

    pub fn polity_count(&self) -> usize {
        self.polities.len()
    }

    pub fn events(&self) -> &EventQueue {
        &self.events
    }

    pub fn total_population(&self) -> i64 {
        self.groups.values().map(|g| g.population()).sum()
    }

    /// Places a founding population on `cell`. Founders are fully adapted to
    /// the biomes around them.
    pub fn spawn_initial_group(&mut self, cell: CellPos, population: i64) -> Result<GroupId> {
        let target = self
            .terrain
            .cell(cell)
            .ok_or(SimulationError::UnknownCell(cell))?;
        if target.group.is_some() {
            return Err(SimulationError::OccupiedCell(cell));
        }
        let culture = self.culture_for(cell, None);
        let id = self.allocate_group_id();
        let group = PopulationGroup::new(id, cell, population as f64, culture, self.current_date);
        self.add_group(group)?;
        Ok(id)
    }

    /// Culture of a group founded on `cell`, optionally inherited from migrants.
    pub(crate) fn culture_for(&self, cell: CellPos, base: Option<&Culture>) -> Culture {
        let initial = base.is_none();
        let mut culture = base.cloned().unwrap_or_default();
        if initial {
            culture.add_activity(ActivityId::Foraging, 1.0);
            culture.add_knowledge(KnowledgeId::SocialOrganization, BASE_KNOWLEDGE_VALUE);
        }
        let skill = if initial { 1.0 } else { 0.0 };
        for biome in self.terrain.neighborhood_biomes(cell) {
            if biome == OCEAN {
                culture.add_seafaring();
            } else {
                culture.add_biome_skill(&biome, skill);
            }
        }
        culture
    }

    /// Registers a group: occupies its cell, links neighbours both ways and
    /// marks it for setup at the end of the tick.
    pub(crate) fn add_group(&mut self, mut group: PopulationGroup) -> Result<()> {
        let cell = self
            .terrain
            .cell(group.cell)
            .ok_or(SimulationError::UnknownCell(group.cell))?;
        let neighbors: Vec<_> = cell
            .neighbors()
            .filter_map(|(dir, pos)| {
                self.terrain
                    .cell(pos)
                    .and_then(|c| c.group)
                    .map(|other| (dir, other))
            })
            .collect();

        for (direction, other) in neighbors {
            group.add_neighbor(direction, other);
            if let Some(neighbor) = self.groups.get_mut(&other) {
                neighbor.add_neighbor(direction.reverse(), group.id);
            }
        }

        if let Some(cell) = self.terrain.cell_mut(group.cell) {
            cell.group = Some(group.id);
        }
        debug!(group = group.id.raw(), population = group.population(), "group added");
        self.pending.updated_groups.insert(group.id);
        self.groups.insert(group.id, group);
        Ok(())
    }

    /// Runs `f` with the group taken out of the arena. The group is put back
    /// before any error from `f` propagates.
    pub(crate) fn with_group<T>(
        &mut self,
        id: GroupId,
        f: impl FnOnce(&mut World, &mut PopulationGroup) -> Result<T>,
    ) -> Result<T> {
        let mut group = self
            .groups
            .remove(&id)
            .ok_or(SimulationError::UnknownGroup(id))?;
        let result = f(self, &mut group);
        self.groups.insert(id, group);
        result
    }

    pub(crate) fn allocate_group_id(&mut self) -> GroupId {
        let id = GroupId::new(self.ids.next_group);
        self.ids.next_group += 1;
        id
    }

    pub(crate) fn allocate_polity_id(&mut self) -> PolityId {
        let id = PolityId::new(self.ids.next_polity);
        self.ids.next_polity += 1;
        id
    }

    pub(crate) fn allocate_faction_id(&mut self) -> u64 {
        let id = self.ids.next_faction;
        self.ids.next_faction += 1;
        id
    }

    pub(crate) fn insert_event(&mut self, event: Event) {
        self.events.push(event);
    }

    pub(crate) fn add_group_to_update(&mut self, id: GroupId) {
        self.pending.groups_to_update.insert(id);
    }

    pub(crate) fn add_polity_to_update(&mut self, id: PolityId) {
        if let Some(polity) = self.polities.get_mut(&id) {
            polity.will_be_updated = true;
        }
        self.pending.polities_to_update.insert(id);
    }

    pub(crate) fn add_polity_to_remove(&mut self, id: PolityId) {
        self.pending.polities_to_remove.insert(id);
    }

    pub(crate) fn record(&mut self, occurrence: Occurrence) {
        self.pending.occurrences.push(occurrence);
    }

    /// Drains the per-tick bookkeeping into a report.
    pub(crate) fn take_report(&mut self) -> TickReport {
        let touched = std::mem::take(&mut self.pending.touched_groups);
        TickReport {
            tick: self.tick,
            date: self.current_date,
            span: std::mem::take(&mut self.pending.span),
            touched_groups: touched.len(),
            new_polities: std::mem::take(&mut self.pending.new_polities),
            occurrences: std::mem::take(&mut self.pending.occurrences),
            group_count: self.groups.len(),
            polity_count: self.polities.len(),
            total_population: self.total_population(),
        }
    }

    /// `current + span`, failing instead of wrapping.
    pub(crate) fn date_after(&self, span: i64) -> Result<i64> {
        self.current_date
            .checked_add(span)
            .ok_or(SimulationError::DateOverflow {
                date: self.current_date,
                span,
            })
    }
}
