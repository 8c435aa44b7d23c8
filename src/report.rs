use serde::{Deserialize, Serialize};

use crate::{culture::DiscoveryId, group::GroupId, polity::PolityId, terrain::CellPos};

/// Notable things that happened during a tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Occurrence {
    Discovery {
        group: GroupId,
        discovery: DiscoveryId,
    },
    TribeFormed {
        polity: PolityId,
        group: GroupId,
    },
    GroupSplit {
        source: GroupId,
        target: GroupId,
        cell: CellPos,
        population: i64,
    },
    InfluenceExpanded {
        polity: PolityId,
        source: GroupId,
        target: GroupId,
        percent: f64,
    },
    GroupExtinct {
        group: GroupId,
        cell: CellPos,
    },
    PolityDissolved {
        polity: PolityId,
    },
}

/// Summary of one tick, returned by the engine and streamed to observers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TickReport {
    pub tick: u64,
    /// Simulated date after the tick.
    pub date: i64,
    /// Years the clock advanced.
    pub span: i64,
    pub touched_groups: usize,
    pub new_polities: usize,
    pub occurrences: Vec<Occurrence>,
    pub group_count: usize,
    pub polity_count: usize,
    pub total_population: i64,
}
