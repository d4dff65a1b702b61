//! Converts one terrain tile into a divide tree.
//!
//! The algorithm:
//!
//! * Find all peaks and saddles. A peak is a flat area higher than its
//!   entire boundary. A saddle is a flat area with at least two disjoint
//!   higher areas on its boundary; a flat area bordering N >= 2 higher
//!   segments yields N - 1 saddles, each of multiplicity 2.
//! * Walk up the divides (steepest ascent) from each saddle to two peaks.
//!   A walk that enters a flat region continues from the highest point
//!   adjacent to it.
//! * If both walks reach the same peak the saddle is false and discarded.
//!   Otherwise an edge is added to the divide tree; if that would create a
//!   cycle, the edge with the lowest saddle on the cycle is removed and
//!   that saddle becomes a basin saddle.
//! * Find runoffs around the tile border and connect each to a peak by an
//!   uphill walk.

use tracing::{debug, error};

use crate::coords::CoordinateSystem;
use crate::divide_tree::{DivideTree, Node};
use crate::domain_map::{Boundary, DomainMap, GENERIC_FLAT_AREA};
use crate::primitives::{Offsets, Peak, Runoff, Saddle, SaddleKind, NODATA_ELEVATION};
use crate::tile::Tile;

/// The two higher boundary points a saddle's divides leave through.
/// `rise1` belongs to the highest boundary segment.
#[derive(Clone, Copy, Debug)]
struct SaddleRises {
    rise1: Offsets,
    rise2: Offsets,
}

/// Builds a per-tile [`DivideTree`].
pub struct TreeBuilder<'a> {
    tile: &'a Tile,
    coordinate_system: CoordinateSystem,
    domain_map: DomainMap<'a>,
    peaks: Vec<Peak>,
    saddles: Vec<Saddle>,
    saddle_rises: Vec<SaddleRises>,
    runoffs: Vec<Runoff>,
}

impl<'a> TreeBuilder<'a> {
    /// Creates a builder for `tile`, whose pixels are addressed by
    /// `coordinate_system`.
    #[must_use]
    pub fn new(tile: &'a Tile, coordinate_system: CoordinateSystem) -> Self {
        Self {
            tile,
            coordinate_system,
            domain_map: DomainMap::new(tile),
            peaks: Vec::new(),
            saddles: Vec::new(),
            saddle_rises: Vec::new(),
            runoffs: Vec::new(),
        }
    }

    /// Scans the tile and produces its divide tree.
    #[must_use]
    pub fn build(mut self) -> DivideTree {
        self.find_extrema();
        self.find_runoffs();
        self.generate_divide_tree()
    }

    fn find_extrema(&mut self) {
        let mut boundary = Boundary::default();
        let mut segment_high_points: Vec<Offsets> = Vec::new();
        let mut pending: Vec<Offsets> = Vec::new();

        for y in 0..self.tile.height() {
            for x in 0..self.tile.width() {
                let elevation = self.tile.get(x, y);
                if elevation == NODATA_ELEVATION {
                    continue;
                }
                if self.domain_map.get(x, y) != crate::domain_map::EMPTY {
                    continue;
                }

                self.domain_map.find_flat_area(x, y, &mut boundary);

                // No higher boundary points: a peak.
                if boundary.higher_points.is_empty() {
                    let peak_id = self.peaks.len() as i32 + 1;
                    self.domain_map.fill_flat_area(x, y, peak_id);
                    self.peaks.push(Peak::new(Offsets::new(x, y), elevation));
                    debug!(peak_id, x, y, elevation, "found peak");
                    continue;
                }

                // A single higher point cannot make a saddle.
                if boundary.higher_points.len() < 2 {
                    self.domain_map.fill_flat_area(x, y, GENERIC_FLAT_AREA);
                    continue;
                }

                // Group the higher boundary points into segments connected
                // under the 3x3 neighbourhood.
                segment_high_points.clear();
                let mut segment_with_highest_point = 0;

                boundary.higher_points.sort_unstable();
                if boundary.higher_points.len() > 100 {
                    // Duplicates pile up on enormous flat areas.
                    boundary.higher_points.dedup();
                }

                while let Some(&seed_value) = boundary.higher_points.first() {
                    let seed = Offsets::from_value(seed_value);
                    pending.push(seed);
                    let mut highest_point_in_segment = seed;
                    let mut max_height_in_segment = self.tile.get_offsets(seed);
                    while let Some(point) = pending.pop() {
                        let lo = boundary
                            .higher_points
                            .partition_point(|&v| v < point.value());
                        let hi = boundary
                            .higher_points
                            .partition_point(|&v| v <= point.value());
                        boundary.higher_points.drain(lo..hi);

                        if self.tile.get_offsets(point) > max_height_in_segment {
                            highest_point_in_segment = point;
                            max_height_in_segment = self.tile.get_offsets(point);
                        }

                        for dy in -1..=1 {
                            for dx in -1..=1 {
                                let neighbour = point.offset_by(dx, dy);
                                if boundary
                                    .higher_points
                                    .binary_search(&neighbour.value())
                                    .is_ok()
                                {
                                    pending.push(neighbour);
                                }
                            }
                        }
                    }

                    segment_high_points.push(highest_point_in_segment);
                    if max_height_in_segment
                        > self
                            .tile
                            .get_offsets(segment_high_points[segment_with_highest_point])
                    {
                        segment_with_highest_point = segment_high_points.len() - 1;
                    }
                }

                // N higher segments around a flat area mean N - 1 saddles.
                // Pair the highest segment with each of the others so the
                // walks across the flat area cannot cross.
                let num_segments = segment_high_points.len();
                if num_segments < 2 {
                    self.domain_map.fill_flat_area(x, y, GENERIC_FLAT_AREA);
                    continue;
                }

                let mut filled_saddle_id = 0;
                for i in 0..num_segments {
                    if i == segment_with_highest_point {
                        continue;
                    }
                    // Saddles get negative labels, starting at -1.
                    let saddle_label = -(self.saddles.len() as i32 + 1);
                    if filled_saddle_id == 0 {
                        self.domain_map.fill_flat_area(x, y, saddle_label);
                        filled_saddle_id = saddle_label;
                    }

                    let rises = SaddleRises {
                        rise1: segment_high_points[segment_with_highest_point],
                        rise2: segment_high_points[i],
                    };

                    // Place the saddle in the flat area close to the midpoint
                    // of its two rises. In a gigantic saddle with hundreds of
                    // segments the search is too slow to bother with.
                    let mut location = Offsets::new(x, y);
                    if num_segments < 500 {
                        let midpoint = Offsets::new(
                            (rises.rise1.x() + rises.rise2.x()) / 2,
                            (rises.rise1.y() + rises.rise2.y()) / 2,
                        );
                        location = self
                            .domain_map
                            .find_close_point_with_value(midpoint, filled_saddle_id);
                    }

                    self.saddles.push(Saddle::new(location, elevation));
                    self.saddle_rises.push(rises);
                }
            }
        }
    }

    fn find_runoffs(&mut self) {
        // Walk the border left to right and top to bottom, matching the
        // directions used in every other tile so that runoffs land on
        // exactly the same pixels in overlapping rows and columns. While
        // walking, look for a fall after a rise.
        let width = self.tile.width();
        let height = self.tile.height();
        let mut x = 0;
        let mut y = 0;
        let mut dx = 1;
        let mut dy = 0;
        let mut rising_or_flat = false;
        let mut elevation = self.tile.get(0, 0);
        let mut last_elevation = elevation;
        if elevation != NODATA_ELEVATION {
            self.runoffs.push(Runoff::new(Offsets::new(0, 0), elevation, 1));
        }

        loop {
            elevation = self.tile.get(x, y);

            if elevation != NODATA_ELEVATION
                && (last_elevation == NODATA_ELEVATION || elevation > last_elevation)
            {
                rising_or_flat = true;
            } else if rising_or_flat
                && (elevation == NODATA_ELEVATION || elevation < last_elevation)
            {
                // Fell after a rise: the previous point is a runoff with two
                // neighbouring quadrants, since it lies along an edge.
                self.runoffs.push(Runoff::new(
                    Offsets::new(x - dx, y - dy),
                    last_elevation,
                    2,
                ));
                rising_or_flat = false;
            }
            last_elevation = elevation;

            // Corners always get runoffs: a peak or saddle there may involve
            // pixels in tiles we have not seen.
            if x == width - 1 && y == 0 {
                if elevation != NODATA_ELEVATION {
                    self.runoffs.push(Runoff::new(Offsets::new(x, y), elevation, 1));
                    rising_or_flat = false;
                }
                dx = 0;
                dy = 1;
            } else if x == width - 1 && y == height - 1 {
                if dx == 1 {
                    // Reached the bottom-right corner travelling right: done.
                    break;
                }
                if elevation != NODATA_ELEVATION {
                    self.runoffs.push(Runoff::new(Offsets::new(x, y), elevation, 1));
                }
                rising_or_flat = false;
                // Jump back to the top-left corner and walk down the left
                // column.
                x = 0;
                y = 0;
                last_elevation = self.tile.get(0, 0);
                dx = 0;
                dy = 1;
            } else if x == 0 && y == height - 1 {
                if elevation != NODATA_ELEVATION {
                    self.runoffs.push(Runoff::new(Offsets::new(x, y), elevation, 1));
                    rising_or_flat = false;
                }
                dx = 1;
                dy = 0;
            }

            x += dx;
            y += dy;
        }

        for runoff in &mut self.runoffs {
            runoff.inside_peak_area = self.domain_map.get_offsets(runoff.location) > 0;
        }
    }

    fn generate_divide_tree(mut self) -> DivideTree {
        let mut tree = DivideTree::new(
            self.coordinate_system.clone(),
            self.peaks.clone(),
            self.saddles.clone(),
            self.runoffs.clone(),
        );

        for saddle_index in 1..=self.saddles.len() as i32 {
            let rises = self.saddle_rises[(saddle_index - 1) as usize];
            let destination1 = self.walk_up_to_peak(rises.rise1);
            let destination2 = self.walk_up_to_peak(rises.rise2);

            let (Some(end1), Some(end2)) = (destination1, destination2) else {
                let saddle = &mut self.saddles[(saddle_index - 1) as usize];
                let position = self.coordinate_system.to_lat_lng(saddle.location);
                error!(
                    saddle_index,
                    x = saddle.location.x(),
                    y = saddle.location.y(),
                    latitude = position.latitude(),
                    longitude = position.longitude(),
                    "failed to connect saddle to a peak"
                );
                saddle.kind = SaddleKind::Error;
                continue;
            };

            let peak1 = self.domain_map.get_offsets(end1);
            let peak2 = self.domain_map.get_offsets(end2);
            if peak1 == peak2 {
                // Both divides reach the same peak: not really a saddle.
                self.saddles[(saddle_index - 1) as usize].kind = SaddleKind::False;
                continue;
            }

            self.saddles[(saddle_index - 1) as usize].kind = SaddleKind::Prom;
            let basin_saddle_id = tree.maybe_add_edge(peak1, peak2, saddle_index);
            if basin_saddle_id != Node::NULL {
                self.saddles[(basin_saddle_id - 1) as usize].kind = SaddleKind::Basin;
            }
        }
        // The walks reclassified saddles.
        tree.set_saddles(self.saddles.clone());

        for runoff_index in 0..self.runoffs.len() {
            let location = self.runoffs[runoff_index].location;
            let Some(end) = self.walk_up_to_peak(location) else {
                let position = self.coordinate_system.to_lat_lng(location);
                error!(
                    runoff_index,
                    x = location.x(),
                    y = location.y(),
                    latitude = position.latitude(),
                    longitude = position.longitude(),
                    "failed to connect runoff to a peak"
                );
                continue;
            };
            let peak = self.domain_map.get_offsets(end);
            tree.add_runoff_edge(peak, runoff_index);
        }

        tree.compact();

        debug!(
            peaks = tree.peaks().len(),
            saddles = tree.saddles().len(),
            runoffs = tree.runoffs().len(),
            "built divide tree"
        );

        tree
    }

    /// Walks steepest ascent from `start` until a pixel labelled as a peak
    /// is reached, returning that pixel. A saddle along the way is exited
    /// through its higher-segment rise; a flat area with no strictly higher
    /// 8-neighbour is exited through the highest point of its boundary.
    fn walk_up_to_peak(&mut self, start: Offsets) -> Option<Offsets> {
        let mut point = start;
        loop {
            let label = self.domain_map.get_offsets(point);
            if label > 0 {
                return Some(point);
            }
            if label < 0 && label != GENERIC_FLAT_AREA {
                point = self.saddle_rises[(-label - 1) as usize].rise1;
                continue;
            }

            match self.find_higher_neighbour(point) {
                Some(next) => point = next,
                None => {
                    // Check the boundary of the whole flat area.
                    let mut boundary = Boundary::default();
                    self.domain_map
                        .find_flat_area(point.x(), point.y(), &mut boundary);
                    let mut highest = self.tile.get_offsets(point);
                    let mut next = point;
                    for &value in &boundary.higher_points {
                        let candidate = Offsets::from_value(value);
                        if self.tile.get_offsets(candidate) > highest {
                            highest = self.tile.get_offsets(candidate);
                            next = candidate;
                        }
                    }
                    if next == point {
                        let position = self.coordinate_system.to_lat_lng(point);
                        error!(
                            x = point.x(),
                            y = point.y(),
                            elevation = f64::from(self.tile.get_offsets(point)),
                            latitude = position.latitude(),
                            longitude = position.longitude(),
                            "no higher neighbour during ascent"
                        );
                        return None;
                    }
                    point = next;
                }
            }
        }
    }

    /// Returns the highest 8-neighbour strictly higher than `point`.
    fn find_higher_neighbour(&self, point: Offsets) -> Option<Offsets> {
        let mut max_elevation = self.tile.get_offsets(point);
        let mut best: Option<Offsets> = None;
        for dy in -1..=1 {
            for dx in -1..=1 {
                if dx == 0 && dy == 0 {
                    continue;
                }
                let neighbour = point.offset_by(dx, dy);
                if self.tile.is_in_extents_offsets(neighbour)
                    && self.tile.get_offsets(neighbour) > max_elevation
                {
                    max_elevation = self.tile.get_offsets(neighbour);
                    best = Some(neighbour);
                }
            }
        }
        best
    }
}

#[cfg(test)]
mod tests;
