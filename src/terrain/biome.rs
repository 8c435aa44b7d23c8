use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub const OCEAN: &str = "ocean";

fn unbounded_min() -> f64 {
    f64::NEG_INFINITY
}

fn unbounded_max() -> f64 {
    f64::INFINITY
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Biome {
    pub name: String,
    pub survivability: f64,
    pub foraging_capacity: f64,
    pub accessibility: f64,
    #[serde(default)]
    pub arability: f64,
    #[serde(default = "unbounded_min")]
    pub min_altitude: f64,
    #[serde(default = "unbounded_max")]
    pub max_altitude: f64,
    #[serde(default = "unbounded_min")]
    pub min_rainfall: f64,
    #[serde(default = "unbounded_max")]
    pub max_rainfall: f64,
    #[serde(default = "unbounded_min")]
    pub min_temperature: f64,
    #[serde(default = "unbounded_max")]
    pub max_temperature: f64,
}

impl Biome {
    fn new(
        name: &str,
        survivability: f64,
        foraging_capacity: f64,
        accessibility: f64,
        arability: f64,
        altitude: (f64, f64),
    ) -> Self {
        Self {
            name: name.to_string(),
            survivability,
            foraging_capacity,
            accessibility,
            arability,
            min_altitude: altitude.0,
            max_altitude: altitude.1,
            min_rainfall: unbounded_min(),
            max_rainfall: unbounded_max(),
            min_temperature: unbounded_min(),
            max_temperature: unbounded_max(),
        }
    }

    pub fn admits_altitude(&self, altitude: f64) -> bool {
        altitude >= self.min_altitude && altitude <= self.max_altitude
    }
}

/// Static biome attributes keyed by name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BiomeTable {
    biomes: BTreeMap<String, Biome>,
}

impl BiomeTable {
    pub fn from_biomes(biomes: impl IntoIterator<Item = Biome>) -> Self {
        Self {
            biomes: biomes.into_iter().map(|b| (b.name.clone(), b)).collect(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Biome> {
        self.biomes.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.biomes.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Biome> {
        self.biomes.values()
    }
}

impl Default for BiomeTable {
    fn default() -> Self {
        Self::from_biomes([
            Biome::new("ice_cap", 0.0, 0.0, 0.3, 0.0, (f64::NEG_INFINITY, f64::INFINITY)),
            Biome::new(OCEAN, 0.0, 0.0, 0.0, 0.0, (f64::NEG_INFINITY, 0.0)),
            Biome::new("grassland", 1.0, 0.7, 0.9, 0.8, (0.0, 6000.0)),
            Biome::new("forest", 0.85, 0.9, 0.6, 0.5, (0.0, 5000.0)),
            Biome::new("taiga", 0.6, 0.5, 0.7, 0.1, (0.0, 5000.0)),
            Biome::new("tundra", 0.3, 0.2, 0.8, 0.0, (0.0, 8000.0)),
            Biome::new("desert", 0.3, 0.1, 0.9, 0.05, (0.0, 6000.0)),
            Biome::new("rainforest", 0.7, 1.0, 0.3, 0.4, (0.0, 4000.0)),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_table_has_ocean_and_land() {
        let table = BiomeTable::default();
        let ocean = table.get(OCEAN).expect("ocean biome");
        assert_eq!(ocean.survivability, 0.0);
        assert!(table.get("grassland").is_some());
        assert!(!table.contains("swamp"));
    }

    #[test]
    fn yaml_biome_defaults_to_unbounded_ranges() {
        let yaml = "name: steppe\nsurvivability: 0.8\nforaging_capacity: 0.5\naccessibility: 1.0\n";
        let biome: Biome = serde_yaml::from_str(yaml).expect("biome parses");
        assert!(biome.admits_altitude(12_000.0));
        assert_eq!(biome.arability, 0.0);
    }
}
