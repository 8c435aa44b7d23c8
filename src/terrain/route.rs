use serde::{Deserialize, Serialize};

use super::{CellPos, Direction, TerrainGrid};
use crate::rng::{CellRng, RngOffset};

/// Chance per hop that a route veers one direction step left or right.
const DRIFT_CHANCE: f64 = 0.1;

/// A water crossing from a coastline cell to the first land cell reached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeaRoute {
    pub first_cell: CellPos,
    pub last_cell: Option<CellPos>,
    pub cells: Vec<CellPos>,
    pub length: f64,
}

impl SeaRoute {
    /// Traces a route out of `start`. Returns `None` when the start cell is
    /// not on a coastline. The route may still lack a `last_cell` when it
    /// runs into a pole or exceeds the hop limit.
    pub fn trace(grid: &TerrainGrid, start: CellPos, rng: &mut CellRng) -> Option<SeaRoute> {
        let cell = grid.cell(start)?;
        if !cell.is_coastline {
            return None;
        }

        let water: Vec<Direction> = cell
            .neighbors()
            .filter(|(_, pos)| grid.cell(*pos).map(|c| c.is_water()).unwrap_or(false))
            .map(|(dir, _)| dir)
            .collect();
        let choice = rng.next_int(start, RngOffset::SeaRouteDirection, water.len());
        let mut direction = water.get(choice).copied()?;

        let mut route = SeaRoute {
            first_cell: start,
            last_cell: None,
            cells: vec![start],
            length: 0.0,
        };
        let max_hops = (grid.width() + grid.height()) as usize;
        let mut current = start;

        for _ in 0..max_hops {
            let Some(current_cell) = grid.cell(current) else {
                break;
            };
            let (Some(next), Some(distance)) = (
                current_cell.neighbor(direction),
                current_cell.neighbor_distance(direction),
            ) else {
                break;
            };
            route.length += distance;
            route.cells.push(next);

            let Some(next_cell) = grid.cell(next) else {
                break;
            };
            if !next_cell.is_water() {
                route.last_cell = Some(next);
                break;
            }

            let drift = rng.next_float(start, RngOffset::SeaRouteDrift);
            if drift < DRIFT_CHANCE {
                direction = direction.rotate(-1);
            } else if drift < DRIFT_CHANCE * 2.0 {
                direction = direction.rotate(1);
            }
            current = next;
        }

        Some(route)
    }

    /// A route is usable when it ends on land that is neither the start cell
    /// nor one of its direct neighbours.
    pub fn is_usable(&self, grid: &TerrainGrid) -> bool {
        let Some(last) = self.last_cell else {
            return false;
        };
        if last == self.first_cell {
            return false;
        }
        grid.cell(self.first_cell)
            .map(|first| !first.is_neighbor(last))
            .unwrap_or(false)
    }
}
