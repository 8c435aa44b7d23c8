//! Scheduled world events
//!
//! Events are plain data: kind, trigger date, and the id of the owning group.
//! They hold no references, so a queued event whose owner has moved on is
//! simply found invalid when popped and dropped.

pub mod queue;

use serde::{Deserialize, Serialize};

use crate::{
    culture::DiscoveryId,
    group::{GroupId, GENERATION_TIME},
    polity::PolityId,
    terrain::CellPos,
};

pub use queue::{EventQueue, QueuedEvent};

pub const MIN_SOCIAL_ORGANIZATION_FOR_TRIBALISM_SPAWN: f64 = 500.0;
pub const MIN_SOCIAL_ORGANIZATION_FOR_TRIBALISM: f64 = 600.0;
pub const OPTIMAL_SOCIAL_ORGANIZATION_FOR_TRIBALISM: f64 = 10_000.0;
pub const TRIBE_FORMATION_DATE_SPAN_FACTOR: f64 = (GENERATION_TIME * 100) as f64;

const BOAT_MAKING_DATE_SPAN_FACTOR: f64 = (GENERATION_TIME * 10_000) as f64;
const PLANT_CULTIVATION_DATE_SPAN_FACTOR: f64 = (GENERATION_TIME * 20_000) as f64;
const TRIBALISM_DATE_SPAN_FACTOR: f64 = (GENERATION_TIME * 1_000) as f64;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    Update,
    Migrate { target: CellPos },
    ExpandInfluence { polity: PolityId, target: GroupId },
    TribeFormation,
    Discovery { discovery: DiscoveryId },
}

impl EventKind {
    pub fn type_tag(&self) -> u64 {
        match self {
            EventKind::Update => 0,
            EventKind::Migrate { .. } => 1,
            EventKind::ExpandInfluence { .. } => 2,
            EventKind::TribeFormation => 3,
            EventKind::Discovery { discovery } => match discovery {
                DiscoveryId::BoatMaking => 4,
                DiscoveryId::PlantCultivation => 5,
                DiscoveryId::Tribalism => 6,
            },
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            EventKind::Update => "update",
            EventKind::Migrate { .. } => "migrate",
            EventKind::ExpandInfluence { .. } => "expand_influence",
            EventKind::TribeFormation => "tribe_formation",
            EventKind::Discovery { .. } => "discovery",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: u64,
    pub kind: EventKind,
    pub trigger_date: i64,
    pub group: GroupId,
    pub cell: CellPos,
}

impl Event {
    pub fn new(kind: EventKind, trigger_date: i64, group: GroupId, cell: CellPos) -> Self {
        Self {
            id: event_id(trigger_date, cell, kind.type_tag()),
            kind,
            trigger_date,
            group,
            cell,
        }
    }
}

/// Deterministic id derived from trigger date, cell and type tag.
pub fn event_id(trigger_date: i64, cell: CellPos, type_tag: u64) -> u64 {
    (trigger_date as u64)
        .wrapping_mul(100_000_000)
        .wrapping_add((cell.longitude as u64).wrapping_mul(100_000))
        .wrapping_add((cell.latitude as u64).wrapping_mul(100))
        .wrapping_add(type_tag)
}

/// Flag a group carries while a discovery event of this kind is scheduled.
pub fn discovery_flag(discovery: DiscoveryId) -> &'static str {
    match discovery {
        DiscoveryId::BoatMaking => "BoatMakingDiscoveryEvent_Set",
        DiscoveryId::PlantCultivation => "PlantCultivationDiscoveryEvent_Set",
        DiscoveryId::Tribalism => "TribalismDiscoveryEvent_Set",
    }
}

/// Years until a tribe forms, or `None` when social organisation is too low.
pub fn tribe_formation_span(draw: f64, social_organization: f64) -> Option<i64> {
    if social_organization < MIN_SOCIAL_ORGANIZATION_FOR_TRIBALISM {
        return None;
    }
    let random_factor = draw * draw;
    let organization_factor = ((social_organization - MIN_SOCIAL_ORGANIZATION_FOR_TRIBALISM)
        / (OPTIMAL_SOCIAL_ORGANIZATION_FOR_TRIBALISM - MIN_SOCIAL_ORGANIZATION_FOR_TRIBALISM))
        .powi(2)
        .clamp(0.001, 1.0);
    let span = (1.0 - random_factor) * TRIBE_FORMATION_DATE_SPAN_FACTOR / organization_factor;
    Some(span as i64)
}

/// Chance gate for tribe formation: existing influence suppresses new tribes.
pub fn tribe_formation_allowed(total_influence: f64, draw: impl FnOnce() -> f64) -> bool {
    let influence_factor = (total_influence * 3.0).min(1.0);
    if influence_factor >= 1.0 {
        return false;
    }
    if influence_factor <= 0.0 {
        return true;
    }
    draw() <= (1.0 - influence_factor).powi(4)
}

pub fn boat_making_span(draw: f64, ocean_presence: f64) -> i64 {
    let ocean_factor = 1.0 - ocean_presence * 0.9;
    ((1.0 - draw * draw) * BOAT_MAKING_DATE_SPAN_FACTOR * ocean_factor) as i64
}

pub fn plant_cultivation_span(draw: f64, arability: f64) -> i64 {
    ((1.0 - draw * draw) * PLANT_CULTIVATION_DATE_SPAN_FACTOR / arability.max(0.01)) as i64
}

pub fn tribalism_span(draw: f64, social_organization: f64) -> i64 {
    let organization_factor = ((social_organization - MIN_SOCIAL_ORGANIZATION_FOR_TRIBALISM_SPAWN)
        / (OPTIMAL_SOCIAL_ORGANIZATION_FOR_TRIBALISM - MIN_SOCIAL_ORGANIZATION_FOR_TRIBALISM_SPAWN))
        .powi(2)
        .clamp(0.001, 1.0);
    ((1.0 - draw * draw) * TRIBALISM_DATE_SPAN_FACTOR / organization_factor) as i64
}
