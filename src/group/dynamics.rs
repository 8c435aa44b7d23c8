//! Population dynamics: growth curve, carrying capacity and update pacing

use crate::{
    culture::{ActivityId, Culture, KnowledgeId},
    error::{Result, SimulationError},
    influence::round_to_six_decimals,
    terrain::{BiomeTable, TerrainCell, MAX_POSSIBLE_ALTITUDE},
};

use super::{
    GroupId, GENERATION_TIME, MAX_UPDATE_SPAN, MAX_UPDATE_SPAN_FACTOR, NATURAL_GROWTH_RATE,
    POPULATION_FARMING_CONSTANT, POPULATION_FORAGING_CONSTANT,
};

/// Population after `time_span` years of logistic-like drift toward `optimal`.
pub fn population_after_time(population: f64, optimal: i64, time_span: i64) -> f64 {
    let optimal = optimal as f64;
    if population == optimal {
        return population;
    }

    let time_factor = NATURAL_GROWTH_RATE * time_span as f64 / GENERATION_TIME as f64;

    if population < optimal {
        let geometric = (1.0 - population / optimal).powf(2f64.powf(time_factor));
        return optimal * round_to_six_decimals(1.0 - geometric);
    }

    if population > optimal {
        return optimal + (population - optimal) * round_to_six_decimals((-time_factor).exp());
    }

    0.0
}

/// Foraging capacity and survivability of a culture on a given cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Adaptation {
    pub foraging_capacity: f64,
    pub survivability: f64,
}

pub fn adaptation_to_cell(
    group: GroupId,
    culture: &Culture,
    cell: &TerrainCell,
    biomes: &BiomeTable,
) -> Result<Adaptation> {
    let mut foraging_capacity = 0.0;
    let mut survivability = 0.0;

    for (name, presence) in cell.biomes() {
        let Some(biome) = biomes.get(name) else {
            continue;
        };
        match culture.biome_skill(name) {
            Some(skill) => {
                foraging_capacity += presence * biome.foraging_capacity * skill;
                survivability +=
                    presence * (biome.survivability + skill * (1.0 - biome.survivability));
            }
            None => survivability += presence * biome.survivability,
        }
    }

    let farmland = cell.farmland_percentage;
    let altitude_factor = 1.0 - cell.altitude / MAX_POSSIBLE_ALTITUDE;
    survivability = (survivability * (1.0 - farmland) + farmland) * altitude_factor;
    foraging_capacity *= 1.0 - farmland;

    if survivability > 1.0 {
        return Err(SimulationError::SurvivabilityOverflow {
            group,
            value: survivability,
        });
    }

    Ok(Adaptation {
        foraging_capacity,
        survivability,
    })
}

fn agriculture_tech_factor(culture: &Culture) -> Option<f64> {
    culture
        .knowledge(KnowledgeId::Agriculture)
        .map(|k| k.scaled_value().max(0.0).sqrt())
}

pub fn farming_capacity(culture: &Culture, cell: &TerrainCell) -> f64 {
    agriculture_tech_factor(culture)
        .map(|tech| cell.farmland_percentage * tech)
        .unwrap_or(0.0)
}

/// Carrying capacity of `cell` for a group with this culture.
pub fn optimal_population(
    group: GroupId,
    culture: &Culture,
    cell: &TerrainCell,
    biomes: &BiomeTable,
) -> Result<i64> {
    let adaptation = adaptation_to_cell(group, culture, cell, biomes)?;

    let foraging = culture.activity_contribution(ActivityId::Foraging)
        * POPULATION_FORAGING_CONSTANT
        * cell.area
        * adaptation.foraging_capacity;

    let farming_contribution = culture.activity_contribution(ActivityId::Farming);
    let farming = if farming_contribution > 0.0 {
        farming_contribution * POPULATION_FARMING_CONSTANT * cell.area * farming_capacity(culture, cell)
    } else {
        0.0
    };

    let accessibility_factor = 0.25 + 0.75 * cell.accessibility;
    let capacity = (foraging + farming) * adaptation.survivability * accessibility_factor;
    Ok(capacity.floor() as i64)
}

/// Share of the cell under cultivation.
///
/// Keeps the historical quirk: the farmland area term cancels to 1 whenever
/// both workable and available area are positive, so the result is a flat
/// `1 / area` rather than scaling with the farming population.
pub fn farmland_percentage(culture: &Culture, cell: &TerrainCell, population: i64) -> f64 {
    let Some(tech) = agriculture_tech_factor(culture) else {
        return cell.farmland_percentage;
    };
    let area_per_farm_worker = tech / 5.0;
    let farming_population = culture.activity_contribution(ActivityId::Farming) * population as f64;
    let workable_area = area_per_farm_worker * farming_population;
    let available_area = cell.area * cell.arability;

    if workable_area > 0.0 && available_area > 0.0 && cell.area > 0.0 {
        let farmland_area = workable_area * available_area / (workable_area * available_area);
        farmland_area / cell.area
    } else {
        0.0
    }
}

/// Inputs of the next-update pacing formula.
#[derive(Debug, Clone, Copy)]
pub struct UpdatePacing {
    pub draw: f64,
    pub migration_value: f64,
    pub total_migration_value: f64,
    pub expansion_value: f64,
    pub total_expansion_value: f64,
    pub skill_level: f64,
    pub knowledge_level: f64,
    pub optimal_population: i64,
    pub population: i64,
}

fn share_factor(value: f64, total: f64) -> f64 {
    if total > 0.0 {
        (value / total).powi(4)
    } else {
        1.0
    }
}

/// Years until the next scheduled update, always within
/// `[GENERATION_TIME, MAX_UPDATE_SPAN]`.
pub fn next_update_span(pacing: &UpdatePacing) -> i64 {
    let random_factor = 1.0 - pacing.draw.powi(4);
    let migration_factor = share_factor(pacing.migration_value, pacing.total_migration_value);
    let expansion_factor = share_factor(pacing.expansion_value, pacing.total_expansion_value);

    let optimal = pacing.optimal_population as f64;
    let divergence = 0.0001 + (optimal - pacing.population as f64).abs();
    let population_factor = (100.0 * optimal / divergence).min(MAX_UPDATE_SPAN_FACTOR);

    let mix = random_factor
        * migration_factor
        * expansion_factor
        * pacing.skill_level
        * pacing.knowledge_level
        * population_factor;

    // The mix truncates to whole generations, so a mix below one yields a
    // zero span that clamps up to one generation. Only a negative span
    // (overflow) is read as "wait the maximum".
    let span = GENERATION_TIME.saturating_mul(mix as i64);
    let span = if span < 0 { MAX_UPDATE_SPAN } else { span };
    span.clamp(GENERATION_TIME, MAX_UPDATE_SPAN)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::terrain::{tests::grassland_grid, CellPos};

    const GROUP: GroupId = GroupId::new(1);

    fn forager() -> Culture {
        let mut culture = Culture::new();
        culture.add_activity(ActivityId::Foraging, 1.0);
        culture.add_biome_skill("grassland", 1.0);
        culture
    }

    #[test]
    fn one_generation_grows_without_reaching_optimum() {
        let after = population_after_time(100.0, 200, GENERATION_TIME);
        assert!(after > 100.0, "population should grow, got {after}");
        assert!(after < 200.0, "population should not reach optimum, got {after}");
    }

    #[test]
    fn zero_elapsed_time_is_idempotent() {
        assert_eq!(population_after_time(150.0, 150, 0), 150.0);
        let below = population_after_time(100.0, 200, 0);
        assert!((below - 100.0).abs() < 1e-3, "got {below}");
        let above = population_after_time(300.0, 200, 0);
        assert!((above - 300.0).abs() < 1e-9, "got {above}");
    }

    #[test]
    fn growth_never_overshoots_from_either_side() {
        let mut previous_low = 100.0;
        let mut previous_high = 1000.0;
        for span in [25, 250, 2500, 25_000] {
            let low = population_after_time(100.0, 500, span);
            let high = population_after_time(1000.0, 500, span);
            assert!(low >= previous_low && low <= 500.0, "low {low}");
            assert!(high <= previous_high && high >= 500.0, "high {high}");
            previous_low = low;
            previous_high = high;
        }
    }

    #[test]
    fn adapted_foragers_on_grassland() {
        let grid = grassland_grid(8, 4);
        let cell = grid.cell(CellPos::new(2, 2)).expect("cell");
        let adaptation =
            adaptation_to_cell(GROUP, &forager(), cell, grid.biomes()).expect("adaptation");
        let altitude_factor = 1.0 - cell.altitude / MAX_POSSIBLE_ALTITUDE;
        assert!((adaptation.survivability - altitude_factor).abs() < 1e-9);
        assert!(adaptation.foraging_capacity > 0.0);

        let optimal = optimal_population(GROUP, &forager(), cell, grid.biomes()).expect("optimal");
        assert!(optimal > 0);
    }

    #[test]
    fn unskilled_cultures_cannot_forage() {
        let grid = grassland_grid(8, 4);
        let cell = grid.cell(CellPos::new(2, 2)).expect("cell");
        let mut culture = Culture::new();
        culture.add_activity(ActivityId::Foraging, 1.0);
        let adaptation =
            adaptation_to_cell(GROUP, &culture, cell, grid.biomes()).expect("adaptation");
        assert_eq!(adaptation.foraging_capacity, 0.0);
        assert_eq!(
            optimal_population(GROUP, &culture, cell, grid.biomes()).expect("optimal"),
            0
        );
    }

    #[test]
    fn farmland_is_flat_share_of_area() {
        let grid = grassland_grid(8, 4);
        let cell = grid.cell(CellPos::new(2, 2)).expect("cell");
        let mut culture = forager();
        assert_eq!(farmland_percentage(&culture, cell, 1000), 0.0);

        culture.add_knowledge(KnowledgeId::Agriculture, 100.0);
        culture.add_activity(ActivityId::Farming, 0.5);
        let small = farmland_percentage(&culture, cell, 10);
        let large = farmland_percentage(&culture, cell, 10_000);
        assert_eq!(small, 1.0 / cell.area);
        assert_eq!(small, large);
        assert_eq!(farmland_percentage(&culture, cell, 0), 0.0);
    }

    fn pacing() -> UpdatePacing {
        UpdatePacing {
            draw: 0.5,
            migration_value: 1.0,
            total_migration_value: 1.0,
            expansion_value: 0.0,
            total_expansion_value: 0.0,
            skill_level: 1.0,
            knowledge_level: 1.0,
            optimal_population: 1000,
            population: 500,
        }
    }

    #[test]
    fn update_span_is_clamped() {
        let span = next_update_span(&pacing());
        assert!((GENERATION_TIME..=MAX_UPDATE_SPAN).contains(&span));
        // random 0.9375 * population 200 = 187.5 generations
        assert_eq!(span, GENERATION_TIME * 187);

        let stable = next_update_span(&UpdatePacing {
            population: 1000,
            ..pacing()
        });
        // population factor saturates at MAX_UPDATE_SPAN_FACTOR
        assert_eq!(stable, GENERATION_TIME * 7500);

        let starving = next_update_span(&UpdatePacing {
            optimal_population: 0,
            ..pacing()
        });
        assert_eq!(starving, GENERATION_TIME);
    }

    #[test]
    fn sub_generation_mix_waits_one_generation() {
        let restless = next_update_span(&UpdatePacing {
            draw: 0.999,
            migration_value: 0.1,
            total_migration_value: 1.0,
            ..pacing()
        });
        assert_eq!(restless, GENERATION_TIME);
    }

    #[test]
    fn competing_migration_shortens_updates() {
        let calm = next_update_span(&pacing());
        let restless = next_update_span(&UpdatePacing {
            migration_value: 0.5,
            total_migration_value: 1.0,
            ..pacing()
        });
        assert!(restless < calm);
    }
}
