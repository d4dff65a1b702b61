//! A mutex-guarded LRU cache of elevation tiles.
//!
//! Beyond caching, this is where raw tiles are normalised before any
//! algorithmic use: single-sample spikes are masked to NODATA, and tile
//! edges are reconciled with neighbouring tiles so that runoffs mate
//! exactly during merges. Sources whose tiles omit the trailing row and
//! column entirely have their tiles grown by one sample, filled from the
//! south and east neighbours.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use tracing::{debug, info};

use crate::primitives::{Elevation, NODATA_ELEVATION};
use crate::tile::{Tile, TileKey, TileSource};

/// Elevation difference against a 4-neighbour beyond which a sample is
/// treated as a data spike.
const MAX_LEGAL_ELEVATION_DIFF: Elevation = 1000.0;

#[derive(Default)]
struct CacheInner {
    tiles: HashMap<i64, Arc<Tile>>,
    /// Least-recently-used keys at the front.
    order: VecDeque<i64>,
    max_elevations: HashMap<i64, Elevation>,
    first_rows: HashMap<i64, Vec<Elevation>>,
    first_cols: HashMap<i64, Vec<Elevation>>,
}

/// LRU tile cache over a [`TileSource`].
///
/// A single mutex serialises the bookkeeping; per-tile normalisation work
/// runs outside the lock. Cached tiles are shared [`Arc`]s and drop when
/// evicted.
pub struct TileCache<S> {
    source: S,
    max_entries: usize,
    inner: Mutex<CacheInner>,
}

impl<S: TileSource> TileCache<S> {
    /// Creates a cache holding at most `max_entries` tiles.
    #[must_use]
    pub fn new(source: S, max_entries: usize) -> Self {
        Self {
            source,
            max_entries: max_entries.max(1),
            inner: Mutex::new(CacheInner::default()),
        }
    }

    /// Returns the underlying source.
    #[must_use]
    pub fn source(&self) -> &S {
        &self.source
    }

    /// Returns the cached tile for `key`, loading and caching it on a miss.
    pub fn get_or_load(&self, key: TileKey) -> Option<Arc<Tile>> {
        let cache_key = key.cache_key();
        {
            let mut inner = self.lock();
            if let Some(tile) = inner.tiles.get(&cache_key).cloned() {
                touch(&mut inner.order, cache_key);
                return Some(tile);
            }
        }

        let tile = self.load_without_caching(key);

        let mut inner = self.lock();
        match tile {
            None => {
                // No terrain here; remember that as max elevation zero.
                inner.max_elevations.insert(cache_key, 0.0);
                None
            }
            Some(tile) => {
                inner.max_elevations.insert(cache_key, tile.max_elevation());
                let tile = Arc::new(tile);
                inner.tiles.insert(cache_key, Arc::clone(&tile));
                touch(&mut inner.order, cache_key);
                while inner.tiles.len() > self.max_entries {
                    if let Some(oldest) = inner.order.pop_front() {
                        inner.tiles.remove(&oldest);
                    } else {
                        break;
                    }
                }
                Some(tile)
            }
        }
    }

    /// Loads and normalises a tile without caching it; the caller owns the
    /// result.
    pub fn load_without_caching(&self, key: TileKey) -> Option<Tile> {
        let mut tile = self.source.load(key)?;

        tile = self.reconcile_edges(tile, key);
        suppress_spikes(&mut tile);

        // Remember the first row and column; merges of neighbouring tiles
        // read them back instead of reloading whole tiles.
        let first_row: Vec<Elevation> = (0..tile.width()).map(|x| tile.get(x, 0)).collect();
        let first_col: Vec<Elevation> = (0..tile.height()).map(|y| tile.get(0, y)).collect();
        {
            let mut inner = self.lock();
            let cache_key = key.cache_key();
            inner.first_rows.insert(cache_key, first_row);
            inner.first_cols.insert(cache_key, first_col);
        }

        debug!(
            min_lat = f64::from(key.min_lat),
            min_lng = f64::from(key.min_lng),
            max_elevation = f64::from(tile.max_elevation()),
            "loaded tile"
        );
        Some(tile)
    }

    /// Returns the remembered maximum elevation for `key`, if the tile was
    /// ever loaded (zero for keys known to have no terrain).
    pub fn max_elevation(&self, key: TileKey) -> Option<Elevation> {
        self.lock().max_elevations.get(&key.cache_key()).copied()
    }

    /// Returns the remembered first row of the tile at `key`.
    pub fn first_row(&self, key: TileKey) -> Option<Vec<Elevation>> {
        self.lock().first_rows.get(&key.cache_key()).cloned()
    }

    /// Returns the remembered first column of the tile at `key`.
    pub fn first_column(&self, key: TileKey) -> Option<Vec<Elevation>> {
        self.lock().first_cols.get(&key.cache_key()).cloned()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, CacheInner> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Seamless tiles share their edge samples with their neighbours. For
    /// sources that do not guarantee that, overwrite our trailing row and
    /// column with the neighbours' leading ones; for sources that omit the
    /// trailing edge entirely, grow the tile by one sample instead.
    fn reconcile_edges(&self, tile: Tile, key: TileKey) -> Tile {
        let span = self.source.span_degrees();
        let south_key = TileKey::new(key.min_lat - span, key.min_lng);
        let mut east_lng = key.min_lng + span;
        if east_lng >= 180.0 {
            east_lng -= 360.0;
        }
        let east_key = TileKey::new(key.min_lat, east_lng);

        if self.source.omits_trailing_edge() {
            self.append_edges_from_neighbors(tile, south_key, east_key)
        } else {
            self.copy_edges_from_neighbors(tile, south_key, east_key)
        }
    }

    fn copy_edges_from_neighbors(&self, mut tile: Tile, south_key: TileKey, east_key: TileKey) -> Tile {
        if let Some(neighbor) = self.source.load(south_key) {
            if neighbor.width() == tile.width() {
                for x in 0..tile.width() {
                    tile.set(x, tile.height() - 1, neighbor.get(x, 0));
                }
            }
        }
        if let Some(neighbor) = self.source.load(east_key) {
            if neighbor.height() == tile.height() {
                for y in 0..tile.height() {
                    tile.set(tile.width() - 1, y, neighbor.get(0, y));
                }
            }
        }
        tile
    }

    fn append_edges_from_neighbors(&self, tile: Tile, south_key: TileKey, east_key: TileKey) -> Tile {
        let old_width = tile.width();
        let old_height = tile.height();
        let mut grown = Tile::filled_with_nodata(old_width as usize + 1, old_height as usize + 1);
        for y in 0..old_height {
            for x in 0..old_width {
                grown.set(x, y, tile.get(x, y));
            }
        }

        if let Some(neighbor) = self.source.load(south_key) {
            for x in 0..old_width.min(neighbor.width()) {
                grown.set(x, old_height, neighbor.get(x, 0));
            }
        }
        if let Some(neighbor) = self.source.load(east_key) {
            for y in 0..old_height.min(neighbor.height()) {
                grown.set(old_width, y, neighbor.get(0, y));
            }
        }
        // The grown corner pixel comes from the south-east neighbour.
        let south_east_key = TileKey::new(south_key.min_lat, east_key.min_lng);
        if let Some(neighbor) = self.source.load(south_east_key) {
            grown.set(old_width, old_height, neighbor.get(0, 0));
        }
        grown
    }
}

/// Replaces samples that differ from any 4-neighbour by more than
/// [`MAX_LEGAL_ELEVATION_DIFF`] with NODATA. Checking the higher point of
/// each offending pair suffices; external true peaks are rare enough that
/// the occasional false positive costs little terrain.
fn suppress_spikes(tile: &mut Tile) {
    let mut removed = 0u32;
    for y in 0..tile.height() {
        for x in 0..tile.width() {
            let elevation = tile.get(x, y);
            if elevation == NODATA_ELEVATION {
                continue;
            }
            for (dx, dy) in [(1, 0), (0, 1), (-1, 0), (0, -1)] {
                if !tile.is_in_extents(x + dx, y + dy) {
                    continue;
                }
                let neighbor = tile.get(x + dx, y + dy);
                if neighbor != NODATA_ELEVATION
                    && elevation - neighbor > MAX_LEGAL_ELEVATION_DIFF
                {
                    tile.set(x, y, NODATA_ELEVATION);
                    removed += 1;
                    break;
                }
            }
        }
    }
    if removed > 0 {
        info!(removed, "masked possible elevation spikes");
    }
}

fn touch(order: &mut VecDeque<i64>, key: i64) {
    if let Some(position) = order.iter().position(|&k| k == key) {
        order.remove(position);
    }
    order.push_back(key);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coords::CoordinateSystem;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct GridSource {
        tiles: HashMap<(i32, i32), Tile>,
        loads: AtomicUsize,
        omit_trailing_edge: bool,
    }

    impl GridSource {
        fn new() -> Self {
            Self {
                tiles: HashMap::new(),
                loads: AtomicUsize::new(0),
                omit_trailing_edge: false,
            }
        }

        fn insert(&mut self, lat: i32, lng: i32, tile: Tile) {
            self.tiles.insert((lat, lng), tile);
        }
    }

    impl TileSource for GridSource {
        fn load(&self, key: TileKey) -> Option<Tile> {
            self.loads.fetch_add(1, Ordering::Relaxed);
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
                2,
                2,
            )
        }

        fn omits_trailing_edge(&self) -> bool {
            self.omit_trailing_edge
        }
    }

    fn flat_tile(size: usize, elevation: Elevation) -> Tile {
        Tile::new(size, size, vec![elevation; size * size])
    }

    #[test]
    fn spikes_against_any_four_neighbour_become_nodata() {
        let mut tile = flat_tile(3, 100.0);
        tile.set(1, 1, 2000.0);
        suppress_spikes(&mut tile);
        assert_eq!(tile.get(1, 1), NODATA_ELEVATION);
        assert_eq!(tile.get(0, 0), 100.0);
    }

    #[test]
    fn moderate_relief_survives_spike_suppression() {
        let mut tile = flat_tile(3, 100.0);
        tile.set(1, 1, 900.0);
        suppress_spikes(&mut tile);
        assert_eq!(tile.get(1, 1), 900.0);
    }

    #[test]
    fn get_or_load_caches_and_evicts_least_recently_used() {
        let mut source = GridSource::new();
        source.insert(0, 0, flat_tile(3, 1.0));
        source.insert(1, 0, flat_tile(3, 2.0));
        let cache = TileCache::new(source, 1);

        let key_a = TileKey::new(0.0, 0.0);
        let key_b = TileKey::new(1.0, 0.0);
        assert!(cache.get_or_load(key_a).is_some());
        let loads_after_first = cache.source().loads.load(Ordering::Relaxed);
        assert!(cache.get_or_load(key_a).is_some());
        // The second lookup hits the cache without reloading.
        assert_eq!(cache.source().loads.load(Ordering::Relaxed), loads_after_first);

        assert!(cache.get_or_load(key_b).is_some());
        assert!(cache.get_or_load(key_a).is_some());
        assert!(cache.source().loads.load(Ordering::Relaxed) > loads_after_first);
    }

    #[test]
    fn missing_tiles_record_zero_max_elevation() {
        let cache = TileCache::new(GridSource::new(), 2);
        let key = TileKey::new(5.0, 5.0);
        assert!(cache.get_or_load(key).is_none());
        assert_eq!(cache.max_elevation(key), Some(0.0));
    }

    #[test]
    fn trailing_edges_copy_from_south_and_east_neighbours() {
        let mut source = GridSource::new();
        source.insert(0, 0, flat_tile(3, 10.0));
        source.insert(-1, 0, flat_tile(3, 20.0));
        source.insert(0, 1, flat_tile(3, 30.0));
        let cache = TileCache::new(source, 2);

        let tile = cache
            .load_without_caching(TileKey::new(0.0, 0.0))
            .expect("tile exists");
        assert_eq!(tile.get(0, 2), 20.0);
        assert_eq!(tile.get(2, 0), 30.0);
        assert_eq!(tile.get(0, 0), 10.0);
    }

    #[test]
    fn omitted_trailing_edge_grows_the_tile_by_one_sample() {
        let mut source = GridSource::new();
        source.insert(0, 0, flat_tile(3, 10.0));
        source.insert(-1, 0, flat_tile(3, 20.0));
        source.insert(0, 1, flat_tile(3, 30.0));
        source.insert(-1, 1, flat_tile(3, 40.0));
        source.omit_trailing_edge = true;
        let cache = TileCache::new(source, 2);

        let tile = cache
            .load_without_caching(TileKey::new(0.0, 0.0))
            .expect("tile exists");
        assert_eq!(tile.width(), 4);
        assert_eq!(tile.height(), 4);
        assert_eq!(tile.get(0, 3), 20.0);
        assert_eq!(tile.get(3, 0), 30.0);
        assert_eq!(tile.get(3, 3), 40.0);
    }

    #[test]
    fn first_row_and_column_are_remembered() {
        let mut source = GridSource::new();
        let mut tile = flat_tile(3, 5.0);
        tile.set(1, 0, 7.0);
        source.insert(0, 0, tile);
        let cache = TileCache::new(source, 2);

        let key = TileKey::new(0.0, 0.0);
        cache.load_without_caching(key).expect("tile exists");
        assert_eq!(cache.first_row(key), Some(vec![5.0, 7.0, 5.0]));
        assert_eq!(cache.first_column(key), Some(vec![5.0, 5.0, 5.0]));
    }
}
