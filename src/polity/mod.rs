//! Polities and their factions
//!
//! Tribes are the only polity kind. A polity keeps back-pointers to every
//! group it influences; the groups own the actual influence values.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::{culture::Culture, group::GroupId, terrain::CellPos};

pub const TRIBE_BASE_CORE_INFLUENCE: f64 = 0.5;
pub const GROUP_EFFECTS_TIME_CONSTANT: f64 = 2500.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PolityId(u64);

impl PolityId {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolityKind {
    Tribe,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FactionKind {
    Clan,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Faction {
    pub id: u64,
    pub kind: FactionKind,
    pub core_group: GroupId,
    pub pending_core_group: Option<GroupId>,
    pub prominence: f64,
}

impl Faction {
    pub fn clan(id: u64, core_group: GroupId) -> Self {
        Self {
            id,
            kind: FactionKind::Clan,
            core_group,
            pending_core_group: None,
            prominence: 1.0,
        }
    }

    /// Whether the faction core follows a migrating group. A clan moves when
    /// the influence-weighted population at the destination outweighs what
    /// stays behind.
    pub fn should_migrate_core(
        &self,
        source_prominence: f64,
        source_population: f64,
        target_new_prominence: f64,
        target_new_population: f64,
    ) -> bool {
        match self.kind {
            FactionKind::Clan => {
                target_new_prominence * target_new_population
                    > source_prominence * source_population
            }
        }
    }

    pub fn prepare_new_core_group(&mut self, group: GroupId) {
        self.pending_core_group = Some(group);
    }

    /// Applies a pending relocation. Returns true when the core moved.
    pub fn apply_pending_core(&mut self) -> bool {
        match self.pending_core_group.take() {
            Some(group) if group != self.core_group => {
                self.core_group = group;
                true
            }
            _ => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Polity {
    pub id: PolityId,
    pub kind: PolityKind,
    pub core_group: GroupId,
    pub culture: Culture,
    pub formation_date: i64,
    pub total_population: f64,
    pub factions: Vec<Faction>,
    pub territory: BTreeSet<CellPos>,
    #[serde(skip)]
    pub(crate) influenced_groups: BTreeSet<GroupId>,
    #[serde(skip)]
    pub(crate) will_be_updated: bool,
}

impl Polity {
    pub fn new_tribe(
        id: PolityId,
        core_group: GroupId,
        culture: Culture,
        faction_id: u64,
        formation_date: i64,
    ) -> Self {
        Self {
            id,
            kind: PolityKind::Tribe,
            core_group,
            culture,
            formation_date,
            total_population: 0.0,
            factions: vec![Faction::clan(faction_id, core_group)],
            territory: BTreeSet::new(),
            influenced_groups: BTreeSet::new(),
            will_be_updated: false,
        }
    }

    /// Initial influence of a new tribe over its core group.
    pub fn tribe_core_influence(draw: f64, existing_total: f64) -> f64 {
        let influence = TRIBE_BASE_CORE_INFLUENCE + draw * (1.0 - TRIBE_BASE_CORE_INFLUENCE);
        influence * (1.0 - existing_total)
    }

    pub fn is_core(&self, group: GroupId) -> bool {
        self.core_group == group
    }

    pub fn influenced_groups(&self) -> impl Iterator<Item = GroupId> + '_ {
        self.influenced_groups.iter().copied()
    }

    pub fn influenced_group_count(&self) -> usize {
        self.influenced_groups.len()
    }

    pub fn add_influenced_group(&mut self, group: GroupId) {
        self.influenced_groups.insert(group);
    }

    /// Returns true when the polity is left without influenced groups.
    pub fn remove_influenced_group(&mut self, group: GroupId) -> bool {
        self.influenced_groups.remove(&group);
        self.influenced_groups.is_empty()
    }

    pub fn dominant_faction(&self) -> Option<&Faction> {
        self.factions
            .iter()
            .fold(None::<&Faction>, |best, f| match best {
                Some(b) if b.prominence >= f.prominence => Some(b),
                _ => Some(f),
            })
    }

    pub fn factions_with_core(&self, group: GroupId) -> impl Iterator<Item = &Faction> {
        self.factions.iter().filter(move |f| f.core_group == group)
    }

    pub fn faction_mut(&mut self, id: u64) -> Option<&mut Faction> {
        self.factions.iter_mut().find(|f| f.id == id)
    }

    /// Influence drift applied by the polity to one of its non-core groups.
    /// `draw` is a uniform value in [0, 1). Returns `None` for the core group,
    /// which keeps its influence.
    pub fn group_update_effects(
        &self,
        group: GroupId,
        value: f64,
        total: f64,
        time_span: f64,
        draw: f64,
    ) -> Option<f64> {
        if self.is_core(group) || total <= 0.0 {
            return None;
        }
        let min_target = 0.8 * total;
        let target_total = min_target + draw * (1.0 - min_target);
        let target = value + (target_total - total) * value / total;
        let time_factor = time_span / (time_span + GROUP_EFFECTS_TIME_CONSTANT);
        Some((value * (1.0 - time_factor) + target * time_factor).clamp(0.0, 1.0))
    }

    /// Attractiveness of spreading influence from a source group into a target.
    pub fn group_influence_expansion_value(
        source_value: f64,
        source_total: f64,
        target_total: f64,
        target_survivability: f64,
    ) -> f64 {
        if source_value <= 0.0 || source_total <= 0.0 {
            return 0.0;
        }
        let influence_factor = (source_total / (target_total + source_total)).powi(4);
        influence_factor * target_survivability.powi(2)
    }
}
