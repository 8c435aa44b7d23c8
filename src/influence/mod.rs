//! Per-group polity influence ledger with staged adds and removals
//!
//! Writes during a tick only touch `new_value` or the staging maps. `commit`
//! applies everything at once in the post-update pass.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::{
    error::{Result, SimulationError},
    group::GroupId,
    polity::PolityId,
};

/// Influence at or below this value is treated as absent.
pub const MIN_POLITY_INFLUENCE: f64 = 0.001;

/// Slack on the total-influence check for six-decimal rounding.
pub const INFLUENCE_TOLERANCE: f64 = 1e-5;

/// Core distance of a polity not reachable from a group.
pub const UNREACHABLE: f64 = f64::MAX;

pub fn round_to_six_decimals(value: f64) -> f64 {
    (value * 1_000_000.0).round() / 1_000_000.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolityInfluence {
    pub polity: PolityId,
    pub value: f64,
    pub new_value: f64,
    pub core_distance: f64,
    pub new_core_distance: f64,
    pub administrative_cost: f64,
}

impl PolityInfluence {
    pub fn new(polity: PolityId, value: f64, core_distance: f64) -> Self {
        Self {
            polity,
            value,
            new_value: value,
            core_distance,
            new_core_distance: core_distance,
            administrative_cost: 0.0,
        }
    }
}

/// Result of committing staged changes. Callers notify the affected polities.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommitOutcome {
    pub removed: Vec<PolityId>,
    pub added: Vec<PolityId>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "LedgerRecord", into = "LedgerRecord")]
pub struct InfluenceLedger {
    live: BTreeMap<PolityId, PolityInfluence>,
    to_add: BTreeMap<PolityId, PolityInfluence>,
    to_remove: BTreeSet<PolityId>,
    total: f64,
    highest: Option<PolityId>,
}

impl InfluenceLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    pub fn len(&self) -> usize {
        self.live.len()
    }

    pub fn get(&self, polity: PolityId) -> Option<&PolityInfluence> {
        self.live.get(&polity)
    }

    pub fn contains(&self, polity: PolityId) -> bool {
        self.live.contains_key(&polity)
    }

    /// Committed value, 0 when absent.
    pub fn value(&self, polity: PolityId) -> f64 {
        self.live.get(&polity).map(|pi| pi.value).unwrap_or(0.0)
    }

    /// Committed core distance, [`UNREACHABLE`] when absent.
    pub fn core_distance(&self, polity: PolityId) -> f64 {
        self.live
            .get(&polity)
            .map(|pi| pi.core_distance)
            .unwrap_or(UNREACHABLE)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PolityInfluence> {
        self.live.values()
    }

    pub fn polities(&self) -> Vec<PolityId> {
        self.live.keys().copied().collect()
    }

    pub fn is_pending_removal(&self, polity: PolityId) -> bool {
        self.to_remove.contains(&polity)
    }

    pub fn has_pending_changes(&self) -> bool {
        !self.to_add.is_empty() || !self.to_remove.is_empty()
    }

    /// Sum of committed values.
    pub fn total(&self) -> f64 {
        self.total
    }

    /// Sum of staged values: live entries not pending removal plus pending adds.
    pub fn staged_total(&self) -> f64 {
        self.live
            .values()
            .filter(|pi| !self.to_remove.contains(&pi.polity))
            .chain(self.to_add.values())
            .map(|pi| pi.new_value)
            .sum()
    }

    /// Polity with the highest committed value.
    pub fn highest(&self) -> Option<PolityId> {
        self.highest
    }

    /// Committed (polity, value) pairs, used to snapshot a migrating group.
    pub fn snapshot(&self) -> Vec<(PolityId, f64)> {
        self.live.values().map(|pi| (pi.polity, pi.value)).collect()
    }

    /// Stages `value` for `polity`. A new entry is created only above the
    /// minimum threshold; an existing one at or below it is staged for removal.
    pub fn set(&mut self, polity: PolityId, value: f64, core_distance: impl FnOnce() -> f64) {
        let value = round_to_six_decimals(value);
        self.to_remove.remove(&polity);

        let existing = match self.live.get_mut(&polity) {
            Some(entry) => Some(entry),
            None => self.to_add.get_mut(&polity),
        };

        match existing {
            None => {
                if value > MIN_POLITY_INFLUENCE {
                    self.to_add
                        .insert(polity, PolityInfluence::new(polity, value, core_distance()));
                }
            }
            Some(_) if value <= MIN_POLITY_INFLUENCE => {
                self.to_remove.insert(polity);
            }
            Some(entry) => entry.new_value = value,
        }
    }

    /// Stages an entry without threshold checks. Used when a group is born
    /// from a migrating group carrying committed influences.
    pub fn stage_add(&mut self, polity: PolityId, value: f64, core_distance: f64) {
        self.to_add
            .insert(polity, PolityInfluence::new(polity, value, core_distance));
    }

    /// Population-weighted merge: every entry on either side becomes
    /// `current * (1 - percent) + incoming * percent`.
    pub fn merge(
        &mut self,
        incoming: &[(PolityId, f64)],
        percent: f64,
        mut core_distance: impl FnMut(PolityId) -> f64,
    ) {
        let mut targets: BTreeMap<PolityId, f64> = self
            .live
            .values()
            .chain(self.to_add.values())
            .map(|pi| (pi.polity, pi.new_value))
            .collect();

        for &(polity, incoming_value) in incoming {
            let current = targets.remove(&polity).unwrap_or(0.0);
            let value = current * (1.0 - percent) + incoming_value * percent;
            self.set(polity, value, || core_distance(polity));
        }

        for (polity, current) in targets {
            self.set(polity, current * (1.0 - percent), || core_distance(polity));
        }
    }

    pub fn update_core_distances(&mut self, mut distance: impl FnMut(PolityId) -> f64) {
        for pi in self.live.values_mut() {
            pi.new_core_distance = distance(pi.polity);
        }
    }

    /// Applies staged removals and additions, then promotes every staged value.
    pub fn commit(&mut self, group: GroupId) -> Result<CommitOutcome> {
        let mut outcome = CommitOutcome::default();

        for polity in std::mem::take(&mut self.to_remove) {
            if self.live.remove(&polity).is_some() {
                outcome.removed.push(polity);
            } else if self.to_add.remove(&polity).is_none() {
                return Err(SimulationError::MissingInfluence { group, polity });
            }
        }

        for (polity, pi) in std::mem::take(&mut self.to_add) {
            self.live.insert(polity, pi);
            outcome.added.push(polity);
        }

        self.total = 0.0;
        for pi in self.live.values_mut() {
            pi.value = pi.new_value;
            pi.core_distance = pi.new_core_distance;
            self.total += pi.value;
        }

        if self.total > 1.0 + INFLUENCE_TOLERANCE {
            return Err(SimulationError::InfluenceOverflow {
                group,
                total: self.total,
            });
        }

        self.highest = self
            .live
            .values()
            .fold(None::<&PolityInfluence>, |best, pi| match best {
                Some(b) if b.value >= pi.value => Some(b),
                _ => Some(pi),
            })
            .map(|pi| pi.polity);

        Ok(outcome)
    }

    pub fn update_administrative_costs(&mut self, population: f64) {
        for pi in self.live.values_mut() {
            let cost = population * pi.value * (500.0 + pi.core_distance) * 0.001;
            pi.administrative_cost = if cost < 0.0 { f64::MAX } else { cost };
        }
    }

    /// Forgets staged changes for a polity that no longer exists.
    pub fn drop_staged(&mut self, polity: PolityId) {
        self.to_add.remove(&polity);
        self.to_remove.remove(&polity);
    }

    /// Empties the ledger, returning the polities that held committed influence.
    pub fn clear(&mut self) -> Vec<PolityId> {
        let polities = self.polities();
        *self = InfluenceLedger::default();
        polities
    }
}

#[derive(Clone, Serialize, Deserialize)]
struct LedgerRecord {
    live: Vec<PolityInfluence>,
    #[serde(default)]
    to_add: Vec<PolityInfluence>,
    #[serde(default)]
    to_remove: Vec<PolityId>,
    total: f64,
    highest: Option<PolityId>,
}

impl From<InfluenceLedger> for LedgerRecord {
    fn from(ledger: InfluenceLedger) -> Self {
        Self {
            live: ledger.live.into_values().collect(),
            to_add: ledger.to_add.into_values().collect(),
            to_remove: ledger.to_remove.into_iter().collect(),
            total: ledger.total,
            highest: ledger.highest,
        }
    }
}

impl From<LedgerRecord> for InfluenceLedger {
    fn from(record: LedgerRecord) -> Self {
        Self {
            live: record.live.into_iter().map(|pi| (pi.polity, pi)).collect(),
            to_add: record.to_add.into_iter().map(|pi| (pi.polity, pi)).collect(),
            to_remove: record.to_remove.into_iter().collect(),
            total: record.total,
            highest: record.highest,
        }
    }
}
