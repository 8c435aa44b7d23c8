//! Deterministic per-cell random streams
//!
//! Every draw is a pure function of (world seed, cell, offset, iteration).
//! The only mutable state is one counter per (cell, offset) pair, which
//! advances on each draw and is persisted with the world. Event-keyed
//! offsets are drawn at most once per event and keep no counter; polity-keyed
//! counters are released when the polity dissolves.

use std::collections::BTreeMap;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::terrain::CellPos;

/// Draw site tag. Sites keyed by an entity id get independent streams per id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RngOffset {
    NextUpdateDate,
    LandMigrationTarget,
    LandMigrationChance,
    SeaMigrationChance,
    SeaRouteDirection,
    SeaRouteDrift,
    ExpansionPolity,
    ExpansionTarget,
    ExpansionChance,
    TribeFormationDate,
    TribeCoreInfluence,
    BoatMakingDate,
    PlantCultivationDate,
    TribalismDate,
    CultureUpdate,
    EventTrigger(u64),
    EventCanTrigger(u64),
    SetPolityUpdate(u64),
    PolityUpdateEffects(u64),
}

impl RngOffset {
    fn tag(self) -> (u64, u64) {
        match self {
            RngOffset::NextUpdateDate => (1, 0),
            RngOffset::LandMigrationTarget => (2, 0),
            RngOffset::LandMigrationChance => (3, 0),
            RngOffset::SeaMigrationChance => (4, 0),
            RngOffset::SeaRouteDirection => (5, 0),
            RngOffset::SeaRouteDrift => (6, 0),
            RngOffset::ExpansionPolity => (7, 0),
            RngOffset::ExpansionTarget => (8, 0),
            RngOffset::ExpansionChance => (9, 0),
            RngOffset::TribeFormationDate => (10, 0),
            RngOffset::TribeCoreInfluence => (11, 0),
            RngOffset::BoatMakingDate => (12, 0),
            RngOffset::PlantCultivationDate => (13, 0),
            RngOffset::TribalismDate => (14, 0),
            RngOffset::CultureUpdate => (15, 0),
            RngOffset::EventTrigger(id) => (100, id),
            RngOffset::EventCanTrigger(id) => (101, id),
            RngOffset::SetPolityUpdate(id) => (102, id),
            RngOffset::PolityUpdateEffects(id) => (103, id),
        }
    }

    /// Offsets owned by a single event. Their draws always use iteration 0.
    pub fn is_single_use(self) -> bool {
        matches!(
            self,
            RngOffset::EventTrigger(_) | RngOffset::EventCanTrigger(_)
        )
    }

    fn polity(self) -> Option<u64> {
        match self {
            RngOffset::SetPolityUpdate(id) | RngOffset::PolityUpdateEffects(id) => Some(id),
            _ => None,
        }
    }
}

/// Persisted form of a single (cell, offset) counter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RngCounter {
    pub cell: CellPos,
    pub offset: RngOffset,
    pub iteration: u64,
}

#[derive(Debug, Clone)]
pub struct CellRng {
    seed: u64,
    counters: BTreeMap<(CellPos, RngOffset), u64>,
}

impl CellRng {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            counters: BTreeMap::new(),
        }
    }

    pub fn restore(seed: u64, counters: Vec<RngCounter>) -> Self {
        let counters = counters
            .into_iter()
            .filter(|c| !c.offset.is_single_use())
            .map(|c| ((c.cell, c.offset), c.iteration))
            .collect();
        Self { seed, counters }
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn counters(&self) -> Vec<RngCounter> {
        self.counters
            .iter()
            .map(|(&(cell, offset), &iteration)| RngCounter {
                cell,
                offset,
                iteration,
            })
            .collect()
    }

    pub fn counter_count(&self) -> usize {
        self.counters.len()
    }

    /// Drops every counter keyed by a dissolved polity.
    pub fn release_polity(&mut self, polity: u64) {
        self.counters
            .retain(|(_, offset), _| offset.polity() != Some(polity));
    }

    /// Uniform float in [0, 1).
    pub fn next_float(&mut self, cell: CellPos, offset: RngOffset) -> f64 {
        if offset.is_single_use() {
            return draw(self.seed, cell, offset, 0);
        }
        let counter = self.counters.entry((cell, offset)).or_insert(0);
        let iteration = *counter;
        *counter += 1;
        draw(self.seed, cell, offset, iteration)
    }

    /// Uniform integer in [0, max). Returns 0 when `max` is 0.
    pub fn next_int(&mut self, cell: CellPos, offset: RngOffset, max: usize) -> usize {
        if max == 0 {
            return 0;
        }
        let value = (self.next_float(cell, offset) * max as f64) as usize;
        value.min(max - 1)
    }
}

pub fn draw(seed: u64, cell: CellPos, offset: RngOffset, iteration: u64) -> f64 {
    let (tag, index) = offset.tag();
    let cell_key = ((cell.longitude as u64) << 32) | cell.latitude as u64;
    let mixed = derive_seed(seed, cell_key, tag, index, iteration);
    ChaCha8Rng::seed_from_u64(mixed).gen::<f64>()
}

fn derive_seed(seed: u64, cell: u64, tag: u64, index: u64, iteration: u64) -> u64 {
    let mut mixed = seed;
    for value in [cell, tag, index, iteration] {
        mixed = mixed
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        mixed ^= value.wrapping_mul(0x9E37_79B9_7F4A_7C15);
    }
    mixed
}
