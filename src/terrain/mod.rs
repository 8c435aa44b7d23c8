//! Spatial cell graph - a longitude-wrapping grid of terrain cells

mod biome;
pub mod route;

use std::collections::BTreeSet;
use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

pub use biome::{Biome, BiomeTable, OCEAN};
pub use route::SeaRoute;

use crate::group::GroupId;

/// Planet circumference in kilometers.
pub const CIRCUMFERENCE: f64 = 40075.0;
pub const MAX_POSSIBLE_ALTITUDE: f64 = 15000.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CellPos {
    pub longitude: u32,
    pub latitude: u32,
}

impl CellPos {
    pub fn new(longitude: u32, latitude: u32) -> Self {
        Self {
            longitude,
            latitude,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Direction {
    North,
    NorthEast,
    East,
    SouthEast,
    South,
    SouthWest,
    West,
    NorthWest,
}

impl Direction {
    pub const COUNT: usize = 8;

    pub const ALL: [Direction; Direction::COUNT] = [
        Direction::North,
        Direction::NorthEast,
        Direction::East,
        Direction::SouthEast,
        Direction::South,
        Direction::SouthWest,
        Direction::West,
        Direction::NorthWest,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Direction {
        Direction::ALL[index % Direction::COUNT]
    }

    pub fn reverse(self) -> Direction {
        Direction::from_index(self.index() + 4)
    }

    /// Rotates clockwise by `steps` (negative rotates counter-clockwise).
    pub fn rotate(self, steps: i32) -> Direction {
        let index = (self.index() as i32 + steps).rem_euclid(Direction::COUNT as i32);
        Direction::from_index(index as usize)
    }

    fn offset(self) -> (i64, i64) {
        match self {
            Direction::North => (0, 1),
            Direction::NorthEast => (1, 1),
            Direction::East => (1, 0),
            Direction::SouthEast => (1, -1),
            Direction::South => (0, -1),
            Direction::SouthWest => (-1, -1),
            Direction::West => (-1, 0),
            Direction::NorthWest => (-1, 1),
        }
    }
}

/// Declarative description of a cell used to build the grid.
#[derive(Debug, Clone, PartialEq)]
pub struct CellProfile {
    pub altitude: f64,
    pub accessibility: Option<f64>,
    pub biomes: Vec<(String, f64)>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TerrainCell {
    pub pos: CellPos,
    pub width: f64,
    pub height: f64,
    pub area: f64,
    pub altitude: f64,
    pub accessibility: f64,
    pub arability: f64,
    pub farmland_percentage: f64,
    pub is_coastline: bool,
    pub group: Option<GroupId>,
    biomes: Vec<(String, f64)>,
    neighbors: Vec<(Direction, CellPos, f64)>,
}

impl TerrainCell {
    pub fn biomes(&self) -> &[(String, f64)] {
        &self.biomes
    }

    pub fn biome_presence(&self, name: &str) -> f64 {
        self.biomes
            .iter()
            .find(|(biome, _)| biome == name)
            .map(|(_, presence)| *presence)
            .unwrap_or(0.0)
    }

    pub fn is_water(&self) -> bool {
        self.biome_presence(OCEAN) >= 1.0
    }

    /// Neighbours in direction order.
    pub fn neighbors(&self) -> impl Iterator<Item = (Direction, CellPos)> + '_ {
        self.neighbors.iter().map(|(dir, pos, _)| (*dir, *pos))
    }

    pub fn neighbor_count(&self) -> usize {
        self.neighbors.len()
    }

    pub fn neighbor_at(&self, index: usize) -> Option<(Direction, CellPos)> {
        self.neighbors.get(index).map(|(dir, pos, _)| (*dir, *pos))
    }

    pub fn neighbor(&self, direction: Direction) -> Option<CellPos> {
        self.neighbors
            .iter()
            .find(|(dir, _, _)| *dir == direction)
            .map(|(_, pos, _)| *pos)
    }

    pub fn neighbor_distance(&self, direction: Direction) -> Option<f64> {
        self.neighbors
            .iter()
            .find(|(dir, _, _)| *dir == direction)
            .map(|(_, _, distance)| *distance)
    }

    pub fn is_neighbor(&self, pos: CellPos) -> bool {
        self.neighbors.iter().any(|(_, p, _)| *p == pos)
    }
}

#[derive(Debug, Clone)]
pub struct TerrainGrid {
    width: u32,
    height: u32,
    max_side: f64,
    biomes: BiomeTable,
    cells: Vec<TerrainCell>,
}

impl TerrainGrid {
    pub fn new(
        width: u32,
        height: u32,
        biomes: BiomeTable,
        mut profile: impl FnMut(CellPos) -> CellProfile,
    ) -> Self {
        let max_side = CIRCUMFERENCE / width.max(1) as f64;
        let mut cells = Vec::with_capacity(width as usize * height as usize);
        for longitude in 0..width {
            for latitude in 0..height {
                let pos = CellPos::new(longitude, latitude);
                let alpha = (latitude as f64 + 0.5) / height as f64 * PI;
                let cell_width = alpha.sin() * max_side;
                let CellProfile {
                    altitude,
                    accessibility,
                    biomes: raw_biomes,
                } = profile(pos);
                let presences = normalize_presences(raw_biomes, &biomes);
                let weighted = |attr: fn(&Biome) -> f64| -> f64 {
                    presences
                        .iter()
                        .filter_map(|(name, p)| biomes.get(name).map(|b| attr(b) * p))
                        .sum()
                };
                let accessibility = accessibility.unwrap_or_else(|| weighted(|b| b.accessibility));
                let arability = weighted(|b| b.arability);
                cells.push(TerrainCell {
                    pos,
                    width: cell_width,
                    height: max_side,
                    area: cell_width * max_side,
                    altitude,
                    accessibility,
                    arability,
                    farmland_percentage: 0.0,
                    is_coastline: false,
                    group: None,
                    biomes: presences,
                    neighbors: Vec::new(),
                });
            }
        }

        let mut grid = Self {
            width,
            height,
            max_side,
            biomes,
            cells,
        };
        grid.link_neighbors();
        grid
    }

    fn link_neighbors(&mut self) {
        for index in 0..self.cells.len() {
            let pos = self.cells[index].pos;
            let own_width = self.cells[index].width;
            let mut neighbors = Vec::with_capacity(Direction::COUNT);
            for direction in Direction::ALL {
                let Some(other) = self.neighbor_pos(pos, direction) else {
                    continue;
                };
                let other_width = self.cells[self.index(other)].width;
                let horizontal = (own_width + other_width) / 2.0;
                let distance = match direction {
                    Direction::North | Direction::South => self.max_side,
                    Direction::East | Direction::West => horizontal,
                    _ => (horizontal * horizontal + self.max_side * self.max_side).sqrt(),
                };
                neighbors.push((direction, other, distance));
            }
            self.cells[index].neighbors = neighbors;
        }

        for index in 0..self.cells.len() {
            let coastline = !self.cells[index].is_water()
                && self.cells[index]
                    .neighbors()
                    .any(|(_, n)| self.cells[self.index(n)].is_water());
            self.cells[index].is_coastline = coastline;
        }
    }

    fn index(&self, pos: CellPos) -> usize {
        pos.longitude as usize * self.height as usize + pos.latitude as usize
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn biomes(&self) -> &BiomeTable {
        &self.biomes
    }

    /// Area of an equatorial cell; the largest cell on the grid.
    pub fn max_area(&self) -> f64 {
        self.max_side * self.max_side
    }

    pub fn travel_width_factor(&self) -> f64 {
        self.max_side
    }

    pub fn contains(&self, pos: CellPos) -> bool {
        pos.longitude < self.width && pos.latitude < self.height
    }

    pub fn cell(&self, pos: CellPos) -> Option<&TerrainCell> {
        if !self.contains(pos) {
            return None;
        }
        self.cells.get(self.index(pos))
    }

    pub fn cell_mut(&mut self, pos: CellPos) -> Option<&mut TerrainCell> {
        if !self.contains(pos) {
            return None;
        }
        let index = self.index(pos);
        self.cells.get_mut(index)
    }

    pub fn cells(&self) -> impl Iterator<Item = &TerrainCell> {
        self.cells.iter()
    }

    pub fn neighbor_pos(&self, pos: CellPos, direction: Direction) -> Option<CellPos> {
        let (dx, dy) = direction.offset();
        let latitude = pos.latitude as i64 + dy;
        if latitude < 0 || latitude >= self.height as i64 {
            return None;
        }
        let longitude = (pos.longitude as i64 + dx).rem_euclid(self.width as i64);
        let other = CellPos::new(longitude as u32, latitude as u32);
        if other == pos {
            return None;
        }
        Some(other)
    }

    /// Names of biomes present in the cell or any of its neighbours.
    pub fn neighborhood_biomes(&self, pos: CellPos) -> BTreeSet<String> {
        let mut names = BTreeSet::new();
        let Some(cell) = self.cell(pos) else {
            return names;
        };
        let neighborhood =
            std::iter::once(cell).chain(cell.neighbors().filter_map(|(_, n)| self.cell(n)));
        for member in neighborhood {
            for (name, presence) in member.biomes() {
                if *presence > 0.0 {
                    names.insert(name.clone());
                }
            }
        }
        names
    }

    /// Mean presence of a biome across the cell and its neighbours.
    pub fn neighborhood_presence(&self, pos: CellPos, biome: &str) -> f64 {
        let Some(cell) = self.cell(pos) else {
            return 0.0;
        };
        let mut total = cell.biome_presence(biome);
        let mut count = 1.0;
        for (_, n) in cell.neighbors() {
            if let Some(other) = self.cell(n) {
                total += other.biome_presence(biome);
                count += 1.0;
            }
        }
        total / count
    }
}

fn normalize_presences(raw: Vec<(String, f64)>, table: &BiomeTable) -> Vec<(String, f64)> {
    let mut presences: Vec<(String, f64)> = raw
        .into_iter()
        .filter(|(name, presence)| *presence > 0.0 && table.contains(name))
        .collect();
    presences.sort_by(|a, b| a.0.cmp(&b.0));
    presences.dedup_by(|later, earlier| {
        if later.0 == earlier.0 {
            earlier.1 += later.1;
            true
        } else {
            false
        }
    });
    let total: f64 = presences.iter().map(|(_, p)| p).sum();
    if total > 0.0 {
        for (_, presence) in presences.iter_mut() {
            *presence /= total;
        }
    }
    presences
}
