//! A minimal raster source reading headerless little-endian `f32` grids.
//!
//! Files are named after the south-west corner of the tile they cover,
//! `n37w122.flt` style, and hold `(samples_per_degree + 1)^2` samples in
//! row-major, north-up order, so neighbouring tiles overlap by one sample
//! row and column. Decoders for real-world formats (SRTM, NED, GLO30 and
//! friends) belong to external tooling; this grid keeps the drivers
//! runnable end to end.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use cresta_core::{CoordinateSystem, Tile, TileKey, TileSource};

/// Tile source over a directory of raw `f32` grid files.
pub struct FltTileSource {
    directory: PathBuf,
    samples_per_degree: i32,
}

impl FltTileSource {
    /// Creates a source reading from `directory` at the given resolution.
    #[must_use]
    pub fn new(directory: impl Into<PathBuf>, samples_per_degree: i32) -> Self {
        Self {
            directory: directory.into(),
            samples_per_degree,
        }
    }

    /// Returns the file name for the tile anchored at `key`.
    #[must_use]
    pub fn file_name(key: TileKey) -> String {
        // Nudge off exact-integer corners so float truncation cannot flip
        // the tile index.
        let lat = (key.min_lat + 0.01).floor() as i32;
        let lng = (key.min_lng + 0.01).floor() as i32;
        let ns = if lat >= 0 { 'n' } else { 's' };
        let ew = if lng >= 0 { 'e' } else { 'w' };
        format!("{}{:02}{}{:03}.flt", ns, lat.abs(), ew, lng.abs())
    }

    fn path_for(&self, key: TileKey) -> PathBuf {
        self.directory.join(Self::file_name(key))
    }

    fn read_samples(path: &Path) -> Option<Vec<f32>> {
        let bytes = fs::read(path).ok()?;
        if bytes.len() % 4 != 0 {
            warn!(path = %path.display(), "grid file length is not a multiple of 4");
            return None;
        }
        Some(
            bytes
                .chunks_exact(4)
                .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
                .collect(),
        )
    }
}

impl TileSource for FltTileSource {
    fn load(&self, key: TileKey) -> Option<Tile> {
        let path = self.path_for(key);
        let samples = Self::read_samples(&path)?;
        let side = (self.samples_per_degree + 1) as usize;
        if samples.len() != side * side {
            warn!(
                path = %path.display(),
                expected = side * side,
                actual = samples.len(),
                "grid file has the wrong sample count"
            );
            return None;
        }
        debug!(path = %path.display(), "loaded grid tile");
        Some(Tile::new(side, side, samples))
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

#[cfg(test)]
mod tests {
    use super::*;

    use rstest::rstest;

    #[rstest]
    #[case(36.0, -122.0, "n36w122.flt")]
    #[case(-34.0, 18.0, "s34e018.flt")]
    #[case(0.0, 0.0, "n00e000.flt")]
    #[case(59.0, -1.0, "n59w001.flt")]
    fn file_names_follow_the_corner_convention(
        #[case] lat: f32,
        #[case] lng: f32,
        #[case] expected: &str,
    ) {
        assert_eq!(FltTileSource::file_name(TileKey::new(lat, lng)), expected);
    }

    #[test]
    fn loads_grids_with_the_expected_sample_count() {
        let dir = tempfile::tempdir().expect("temp dir");
        let source = FltTileSource::new(dir.path(), 2);
        let key = TileKey::new(10.0, 20.0);

        let samples: Vec<f32> = (0..9).map(|v| v as f32).collect();
        let bytes: Vec<u8> = samples.iter().flat_map(|v| v.to_le_bytes()).collect();
        std::fs::write(dir.path().join("n10e020.flt"), bytes).expect("write grid");

        let tile = source.load(key).expect("grid loads");
        assert_eq!(tile.width(), 3);
        assert_eq!(tile.get(2, 2), 8.0);
    }

    #[test]
    fn wrong_sample_counts_are_rejected() {
        let dir = tempfile::tempdir().expect("temp dir");
        let source = FltTileSource::new(dir.path(), 2);
        let key = TileKey::new(10.0, 20.0);
        std::fs::write(dir.path().join("n10e020.flt"), [0u8; 16]).expect("write grid");
        assert!(source.load(key).is_none());
    }

    #[test]
    fn missing_files_yield_no_tile() {
        let dir = tempfile::tempdir().expect("temp dir");
        let source = FltTileSource::new(dir.path(), 2);
        assert!(source.load(TileKey::new(1.0, 1.0)).is_none());
    }
}
