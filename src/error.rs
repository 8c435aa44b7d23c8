use thiserror::Error;

use crate::{group::GroupId, polity::PolityId, terrain::CellPos};

/// Fatal simulation corruption. Any of these aborts the tick: the world
/// state can no longer be trusted once one is raised.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SimulationError {
    #[error("total polity influence of group {group:?} exceeds 1: {total}")]
    InfluenceOverflow { group: GroupId, total: f64 },

    #[error("survivability of group {group:?} exceeds 1: {value}")]
    SurvivabilityOverflow { group: GroupId, value: f64 },

    #[error("group {group:?} tried to remove nonexistent influence of polity {polity:?}")]
    MissingInfluence { group: GroupId, polity: PolityId },

    #[error("group {group:?} produced a NaN migration percentage")]
    InvalidMigrationPercent { group: GroupId },

    #[error("date overflow: {date} + {span}")]
    DateOverflow { date: i64, span: i64 },

    #[error("unknown group: {0:?}")]
    UnknownGroup(GroupId),

    #[error("unknown polity: {0:?}")]
    UnknownPolity(PolityId),

    #[error("unknown cell: {0:?}")]
    UnknownCell(CellPos),

    #[error("cell {0:?} is already occupied")]
    OccupiedCell(CellPos),
}

pub type Result<T> = std::result::Result<T, SimulationError>;
