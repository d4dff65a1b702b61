//! Elevation tiles and the source abstraction that supplies them.

use crate::coords::CoordinateSystem;
use crate::primitives::{Coord, Elevation, Offsets, NODATA_ELEVATION};

/// Identifies a tile by the geographic coordinates of its south-west corner.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TileKey {
    /// Southern edge, decimal degrees (or metric northing for UTM sources).
    pub min_lat: f32,
    /// Western edge, decimal degrees (or metric easting for UTM sources).
    pub min_lng: f32,
}

impl TileKey {
    /// Creates a key from the south-west corner.
    #[must_use]
    pub fn new(min_lat: f32, min_lng: f32) -> Self {
        Self {
            min_lat,
            min_lng,
        }
    }

    /// Collapses the key to an integer for cache maps, keeping two decimal
    /// places of precision.
    #[must_use]
    pub fn cache_key(self) -> i64 {
        let lat = (self.min_lat * 100.0) as i64;
        let lng = (self.min_lng * 100.0) as i64;
        lat * 100_000 + lng
    }
}

/// A rectangular grid of elevation samples in row-major order, with `y = 0`
/// the northernmost row.
///
/// # Examples
/// ```
/// use cresta_core::Tile;
///
/// let tile = Tile::new(2, 2, vec![1.0, 2.0, 3.0, 4.0]);
/// assert_eq!(tile.get(1, 0), 2.0);
/// assert!(tile.is_in_extents(1, 1));
/// assert!(!tile.is_in_extents(2, 0));
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct Tile {
    width: usize,
    height: usize,
    samples: Vec<Elevation>,
}

impl Tile {
    /// Creates a tile from row-major samples.
    ///
    /// # Panics
    /// Panics when `samples.len() != width * height`.
    #[must_use]
    pub fn new(width: usize, height: usize, samples: Vec<Elevation>) -> Self {
        assert_eq!(
            samples.len(),
            width * height,
            "tile samples must fill the grid"
        );
        Self {
            width,
            height,
            samples,
        }
    }

    /// Creates a tile filled with [`NODATA_ELEVATION`].
    #[must_use]
    pub fn filled_with_nodata(width: usize, height: usize) -> Self {
        Self::new(width, height, vec![NODATA_ELEVATION; width * height])
    }

    /// Returns the number of samples per row.
    #[must_use]
    pub fn width(&self) -> Coord {
        self.width as Coord
    }

    /// Returns the number of rows.
    #[must_use]
    pub fn height(&self) -> Coord {
        self.height as Coord
    }

    /// Returns whether `(x, y)` lies inside the grid.
    #[must_use]
    pub fn is_in_extents(&self, x: Coord, y: Coord) -> bool {
        x >= 0 && (x as usize) < self.width && y >= 0 && (y as usize) < self.height
    }

    /// Returns whether the packed offsets lie inside the grid.
    #[must_use]
    pub fn is_in_extents_offsets(&self, offsets: Offsets) -> bool {
        self.is_in_extents(offsets.x(), offsets.y())
    }

    /// Returns the sample at `(x, y)`, which must be inside the extents.
    #[must_use]
    pub fn get(&self, x: Coord, y: Coord) -> Elevation {
        self.samples[y as usize * self.width + x as usize]
    }

    /// Returns the sample at the packed offsets.
    #[must_use]
    pub fn get_offsets(&self, offsets: Offsets) -> Elevation {
        self.get(offsets.x(), offsets.y())
    }

    /// Overwrites the sample at `(x, y)`.
    pub fn set(&mut self, x: Coord, y: Coord, elevation: Elevation) {
        self.samples[y as usize * self.width + x as usize] = elevation;
    }

    /// Returns the highest non-missing sample, or [`NODATA_ELEVATION`] when
    /// the tile holds no data at all.
    #[must_use]
    pub fn max_elevation(&self) -> Elevation {
        self.samples
            .iter()
            .copied()
            .filter(|&sample| sample != NODATA_ELEVATION)
            .fold(NODATA_ELEVATION, Elevation::max)
    }

    /// Negates every sample so that depressions and mountains swap roles.
    /// Missing samples are left unchanged.
    pub fn flip_elevations(&mut self) {
        for sample in &mut self.samples {
            if *sample != NODATA_ELEVATION {
                *sample = -*sample;
            }
        }
    }
}

/// Supplies elevation tiles for a region. `load` must be deterministic: the
/// same key always yields the same samples.
///
/// Decoders for concrete on-disk formats live outside this crate; the
/// algorithms only ever see tiles through this trait.
pub trait TileSource {
    /// Loads the tile anchored at `key`, or `None` when the source has no
    /// data there.
    fn load(&self, key: TileKey) -> Option<Tile>;

    /// Returns the coordinate system of the tile anchored at `key`.
    fn coordinate_system(&self, key: TileKey) -> CoordinateSystem;

    /// Returns the geographic span of one tile, in the same units as
    /// [`TileKey`] coordinates.
    fn span_degrees(&self) -> f32 {
        1.0
    }

    /// Returns `true` when tiles omit their last row and column entirely,
    /// requiring the cache to grow them by one sample from neighbours.
    fn omits_trailing_edge(&self) -> bool {
        false
    }
}
