//! Migration scoring and travel-time helpers
//!
//! Everything here is a pure function of cell data and group numbers; the
//! world decides which cells to score and applies the outcome.

use crate::terrain::MAX_POSSIBLE_ALTITUDE;

use super::MIGRATION_FACTOR;

/// Floor for the altitude modifier so sea-level targets keep a finite range.
const MIN_ALTITUDE_DELTA_MODIFIER: f64 = 1e-6;

/// How much a climb (or descent) discourages moving from the source cell.
/// Returns a value in [0, 1]; descending scores higher than climbing.
pub fn altitude_delta_factor(source_area: f64, source_altitude: f64, target_altitude: f64) -> f64 {
    let altitude_modifier = target_altitude / MAX_POSSIBLE_ALTITUDE;
    let delta_modifier = (5.0 * altitude_modifier).max(MIN_ALTITUDE_DELTA_MODIFIER);
    let max_delta = source_area / delta_modifier;
    let min_delta = -source_area / (delta_modifier * 5.0);
    let delta = (target_altitude - source_altitude).clamp(min_delta, max_delta);
    1.0 - (delta - min_delta) / (max_delta - min_delta)
}

/// What a group knows about a candidate cell.
#[derive(Debug, Clone, Copy)]
pub struct CellCandidate {
    pub area_factor: f64,
    pub altitude_delta_factor: f64,
    pub existing_population: Option<i64>,
    pub is_own_cell: bool,
    pub optimal_population: i64,
}

/// Attractiveness of a cell for a group of `population` people.
pub fn migration_value(population: i64, candidate: &CellCandidate) -> f64 {
    let altitude_factor = candidate.altitude_delta_factor.powi(4);

    let existing = candidate.existing_population.unwrap_or(0);
    let population_difference_factor = match candidate.existing_population {
        Some(existing) if population + existing > 0 => {
            (population as f64 / (population + existing) as f64).powi(4)
        }
        Some(_) => 0.0,
        None => 1.0,
    };

    let no_migration_factor = if candidate.is_own_cell {
        1.0
    } else {
        MIGRATION_FACTOR
    };

    let optimal = candidate.optimal_population as f64;
    let optimal_factor = if optimal > 0.0 {
        optimal / (existing as f64 + optimal)
    } else {
        0.0
    };

    candidate.area_factor
        * altitude_factor
        * population_difference_factor
        * no_migration_factor
        * optimal_factor
}

/// Overland travel factor, clamped to `[0.0001, 1]`.
pub fn land_travel_factor(altitude_delta_factor: f64, survivability: f64, accessibility: f64) -> f64 {
    let factor = altitude_delta_factor.powi(2) * survivability.powi(2) * accessibility;
    factor.clamp(0.0001, 1.0)
}

/// Years to walk out of a cell of `cell_width`.
pub fn land_travel_time(cell_width: f64, travel_width_factor: f64, travel_factor: f64) -> i64 {
    (cell_width / (travel_width_factor * travel_factor)).ceil() as i64
}

pub fn sea_success_chance(sea_travel_factor: f64, route_length: f64) -> f64 {
    sea_travel_factor / (sea_travel_factor + route_length.powi(2))
}

pub fn sea_travel_time(route_length: f64, sea_travel_factor: f64) -> i64 {
    (route_length / sea_travel_factor).ceil() as i64
}

/// Share of the population that leaves. `None` signals a NaN result.
pub fn migration_percent(draw: f64, migration_value: f64, total_migration_value: f64) -> Option<f64> {
    let share = 1.0 - migration_value / total_migration_value;
    let percent = (share * draw).powi(4).clamp(0.0, 1.0);
    if percent.is_nan() {
        None
    } else {
        Some(percent)
    }
}

/// Share of the source's influence carried into an expansion target.
pub fn expansion_percent(draw: f64, source_population: i64, target_population: i64) -> f64 {
    let total = (source_population + target_population) as f64;
    if total <= 0.0 {
        return 0.0;
    }
    draw.powi(4) * source_population as f64 / total
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate() -> CellCandidate {
        CellCandidate {
            area_factor: 1.0,
            altitude_delta_factor: 1.0,
            existing_population: None,
            is_own_cell: false,
            optimal_population: 1000,
        }
    }

    #[test]
    fn descending_beats_climbing() {
        let area = 10_000.0;
        let down = altitude_delta_factor(area, 500.0, 100.0);
        let up = altitude_delta_factor(area, 100.0, 500.0);
        assert!(down > up, "down {down} should exceed up {up}");
        assert!((0.0..=1.0).contains(&down));
        assert!((0.0..=1.0).contains(&up));
    }

    #[test]
    fn sea_level_targets_stay_finite() {
        let factor = altitude_delta_factor(10_000.0, 0.0, 0.0);
        assert!(factor.is_finite());
        assert!((factor - 5.0 / 6.0).abs() < 1e-6, "got {factor}");
    }

    #[test]
    fn empty_neighbour_scores_the_migration_factor() {
        assert!((migration_value(500, &candidate()) - MIGRATION_FACTOR).abs() < 1e-12);
    }

    #[test]
    fn crowded_cells_score_lower() {
        let empty = migration_value(500, &candidate());
        let crowded = migration_value(
            500,
            &CellCandidate {
                existing_population: Some(500),
                ..candidate()
            },
        );
        assert!(crowded < empty);
        assert_eq!(
            migration_value(
                500,
                &CellCandidate {
                    optimal_population: 0,
                    ..candidate()
                }
            ),
            0.0
        );
    }

    #[test]
    fn own_cell_is_not_penalised() {
        let own = CellCandidate {
            existing_population: Some(500),
            is_own_cell: true,
            optimal_population: 500,
            ..candidate()
        };
        // (500/1000)^4 * 500/1000
        assert!((migration_value(500, &own) - 0.03125).abs() < 1e-12);
    }

    #[test]
    fn travel_factor_is_clamped() {
        assert_eq!(land_travel_factor(0.0, 1.0, 1.0), 0.0001);
        assert_eq!(land_travel_factor(1.0, 1.0, 1.0), 1.0);
        assert_eq!(land_travel_time(500.0, 1000.0, 1.0), 1);
        assert_eq!(land_travel_time(500.0, 1000.0, 0.0001), 5000);
    }

    #[test]
    fn migration_percent_rejects_nan() {
        assert_eq!(migration_percent(0.5, 0.0, 0.0), None);
        let percent = migration_percent(1.0, 0.5, 1.0).expect("finite");
        assert!((percent - 0.0625).abs() < 1e-12);
        assert_eq!(migration_percent(0.0, 0.5, 1.0), Some(0.0));
    }

    #[test]
    fn expansion_percent_shares_population() {
        assert_eq!(expansion_percent(1.0, 100, 100), 0.5);
        assert_eq!(expansion_percent(0.5, 100, 0), 0.0625);
        assert_eq!(expansion_percent(0.5, 0, 0), 0.0);
    }

    #[test]
    fn sea_crossings_get_harder_with_length() {
        assert!(sea_success_chance(100.0, 5.0) > sea_success_chance(100.0, 50.0));
        assert_eq!(sea_travel_time(250.0, 100.0), 3);
    }
}
