//! Shared fixtures for integration tests.

use std::collections::HashMap;

use cresta_core::{CoordinateSystem, Elevation, Tile, TileKey, TileSource};

/// In-memory tile source keyed by integer degree corners.
pub struct MemorySource {
    tiles: HashMap<(i32, i32), Tile>,
    samples_per_degree: i32,
}

impl MemorySource {
    pub fn new(samples_per_degree: i32) -> Self {
        Self {
            tiles: HashMap::new(),
            samples_per_degree,
        }
    }

    pub fn insert(&mut self, lat: i32, lng: i32, rows: &[&[Elevation]]) {
        let height = rows.len();
        let width = rows[0].len();
        let mut samples = Vec::with_capacity(width * height);
        for row in rows {
            assert_eq!(row.len(), width, "ragged test grid");
            samples.extend_from_slice(row);
        }
        self.tiles
            .insert((lat, lng), Tile::new(width, height, samples));
    }
}

impl TileSource for MemorySource {
    fn load(&self, key: TileKey) -> Option<Tile> {
        self.tiles
            .get(&(key.min_lat.round() as i32, key.min_lng.round() as i32))
            .cloned()
    }

    fn coordinate_system(&self, key: TileKey) -> CoordinateSystem {
        CoordinateSystem::degree(
            key.min_lat,
            key.min_lng,
            key.min_lat + 1.0,
            key.min_lng + 1.0,
            self.samples_per_degree,
            self.samples_per_degree,
        )
    }
}
