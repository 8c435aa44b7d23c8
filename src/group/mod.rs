//! Population groups - the agents occupying terrain cells

pub mod dynamics;
pub mod migration;

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::{
    culture::{ActivityId, Culture, KnowledgeId},
    influence::InfluenceLedger,
    polity::PolityId,
    terrain::{CellPos, Direction, SeaRoute},
};

pub const GENERATION_TIME: i64 = 25;
pub const MAX_UPDATE_SPAN: i64 = 200_000;
pub const MAX_UPDATE_SPAN_FACTOR: f64 = (MAX_UPDATE_SPAN / GENERATION_TIME) as f64;
pub const NATURAL_BIRTH_RATE: f64 = 0.105;
pub const NATURAL_DEATH_RATE: f64 = 0.03;
pub const NATURAL_GROWTH_RATE: f64 = NATURAL_BIRTH_RATE - NATURAL_DEATH_RATE;
pub const POPULATION_FORAGING_CONSTANT: f64 = 10.0;
pub const POPULATION_FARMING_CONSTANT: f64 = 40.0;
pub const SEA_TRAVEL_BASE_FACTOR: f64 = 500.0;
pub const MIGRATION_FACTOR: f64 = 0.1;
pub const MIN_GROUP_POPULATION: i64 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GroupId(u64);

impl GroupId {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> u64 {
        self.0
    }
}

/// Outstanding migration: at most one per group.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PendingMigration {
    pub date: i64,
    pub target: CellPos,
}

/// Outstanding influence expansion: at most one per group.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PendingExpansion {
    pub date: i64,
    pub polity: PolityId,
    pub target: GroupId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PopulationGroup {
    pub id: GroupId,
    pub cell: CellPos,
    pub exact_population: f64,
    pub previous_exact_population: f64,
    pub optimal_population: i64,
    pub last_update_date: i64,
    pub next_update_date: i64,
    pub flags: BTreeSet<String>,
    pub culture: Culture,
    pub influences: InfluenceLedger,
    pub sea_route: Option<SeaRoute>,
    pub sea_travel_factor: f64,
    pub migration_value: f64,
    pub total_migration_value: f64,
    pub polity_expansion_value: f64,
    pub total_polity_expansion_value: f64,
    pub migration_event: Option<PendingMigration>,
    pub expansion_event: Option<PendingExpansion>,
    pub tribe_formation_event_date: Option<i64>,
    pub still_present: bool,
    /// One direction per neighbour, the first one linked. On a narrow
    /// wrapped grid that choice depends on spawn order, so it is saved.
    #[serde(default)]
    pub(crate) neighbors: BTreeMap<Direction, GroupId>,
    #[serde(skip)]
    pub(crate) already_updated: bool,
    #[serde(skip)]
    pub(crate) destroyed: bool,
}

impl PopulationGroup {
    pub fn new(id: GroupId, cell: CellPos, population: f64, culture: Culture, date: i64) -> Self {
        Self {
            id,
            cell,
            exact_population: population,
            previous_exact_population: 0.0,
            optimal_population: 0,
            last_update_date: date,
            next_update_date: date,
            flags: BTreeSet::new(),
            culture,
            influences: InfluenceLedger::new(),
            sea_route: None,
            sea_travel_factor: 0.0,
            migration_value: 0.0,
            total_migration_value: 0.0,
            polity_expansion_value: 0.0,
            total_polity_expansion_value: 0.0,
            migration_event: None,
            expansion_event: None,
            tribe_formation_event_date: None,
            still_present: true,
            neighbors: BTreeMap::new(),
            already_updated: false,
            destroyed: false,
        }
    }

    /// Integer population.
    pub fn population(&self) -> i64 {
        self.exact_population.floor() as i64
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    pub fn has_migration_event(&self) -> bool {
        self.migration_event.is_some()
    }

    pub fn has_expansion_event(&self) -> bool {
        self.expansion_event.is_some()
    }

    pub fn has_tribe_formation_event(&self) -> bool {
        self.tribe_formation_event_date.is_some()
    }

    pub fn neighbors(&self) -> impl Iterator<Item = (Direction, GroupId)> + '_ {
        self.neighbors.iter().map(|(d, g)| (*d, *g))
    }

    pub fn neighbor_count(&self) -> usize {
        self.neighbors.len()
    }

    pub fn add_neighbor(&mut self, direction: Direction, group: GroupId) {
        if self.neighbors.values().any(|g| *g == group) {
            return;
        }
        self.neighbors.entry(direction).or_insert(group);
    }

    pub fn remove_neighbor(&mut self, group: GroupId) {
        self.neighbors.retain(|_, g| *g != group);
    }

    /// Neighbour in direction `index`, probing further directions with a
    /// stride of three until a present neighbour is found.
    pub fn neighbor_from(&self, index: usize) -> Option<GroupId> {
        let stride = Direction::COUNT / 2 - 1;
        let mut i = index % Direction::COUNT;
        for _ in 0..Direction::COUNT {
            if let Some(group) = self.neighbors.get(&Direction::from_index(i)) {
                return Some(*group);
            }
            i = (i + stride) % Direction::COUNT;
        }
        None
    }

    pub fn set_flag(&mut self, flag: &str) {
        self.flags.insert(flag.to_string());
    }

    pub fn unset_flag(&mut self, flag: &str) {
        self.flags.remove(flag);
    }

    pub fn is_flag_set(&self, flag: &str) -> bool {
        self.flags.contains(flag)
    }

    /// Merges an arriving population with its culture and influences.
    /// Returns the share of the merged group the newcomers represent.
    pub fn merge_population(&mut self, population: f64, culture: &Culture) -> f64 {
        let new_population = self.population() as f64 + population;
        let percentage = population / new_population;
        self.exact_population = new_population;
        self.culture.merge(culture, percentage);
        self.sea_route = None;
        percentage
    }

    /// Removes `floor(population * percent)` people and returns the count.
    pub fn split(&mut self, percent: f64) -> i64 {
        let split = (self.population() as f64 * percent).floor() as i64;
        self.exact_population -= split as f64;
        split
    }

    /// Sea travel capability from seafaring skill and shipbuilding knowledge.
    pub fn update_travel_factors(&mut self, travel_width_factor: f64) {
        let seafaring = self.culture.seafaring().unwrap_or(0.0);
        let shipbuilding = self
            .culture
            .knowledge(KnowledgeId::Shipbuilding)
            .map(|k| k.scaled_value())
            .unwrap_or(0.0);
        self.sea_travel_factor =
            SEA_TRAVEL_BASE_FACTOR * seafaring * shipbuilding * travel_width_factor;
    }

    pub fn activity_contribution(&self, activity: ActivityId) -> f64 {
        self.culture.activity_contribution(activity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn group() -> PopulationGroup {
        PopulationGroup::new(GroupId::new(1), CellPos::new(2, 2), 1000.7, Culture::new(), 0)
    }

    #[test]
    fn population_is_floored() {
        assert_eq!(group().population(), 1000);
    }

    #[test]
    fn split_deducts_whole_people() {
        let mut g = group();
        let moved = g.split(0.25);
        assert_eq!(moved, 250);
        assert_eq!(g.population(), 750);
    }

    #[test]
    fn merge_reports_newcomer_share() {
        let mut g = group();
        g.sea_route = Some(SeaRoute {
            first_cell: g.cell,
            last_cell: None,
            cells: vec![],
            length: 1.0,
        });
        let share = g.merge_population(1000.0, &Culture::new());
        assert_eq!(share, 0.5);
        assert_eq!(g.population(), 2000);
        assert!(g.sea_route.is_none());
    }

    #[test]
    fn neighbor_from_skips_missing_directions() {
        let mut g = group();
        assert_eq!(g.neighbor_from(0), None);
        g.add_neighbor(Direction::SouthEast, GroupId::new(5));
        // North(0) -> SouthEast(3)
        assert_eq!(g.neighbor_from(0), Some(GroupId::new(5)));
        g.add_neighbor(Direction::North, GroupId::new(6));
        assert_eq!(g.neighbor_from(0), Some(GroupId::new(6)));
        g.add_neighbor(Direction::East, GroupId::new(6));
        assert_eq!(g.neighbor_count(), 2);
        g.remove_neighbor(GroupId::new(6));
        assert_eq!(g.neighbor_count(), 1);
    }

    #[test]
    fn flags_round_trip() {
        let mut g = group();
        g.set_flag("BoatMakingDiscoveryEvent_Set");
        assert!(g.is_flag_set("BoatMakingDiscoveryEvent_Set"));
        g.unset_flag("BoatMakingDiscoveryEvent_Set");
        assert!(!g.is_flag_set("BoatMakingDiscoveryEvent_Set"));
    }
}
