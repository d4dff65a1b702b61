//! A raster of labels parallel to an elevation tile.
//!
//! Each label records whether the flat area containing that pixel is a peak
//! (positive label), a saddle (negative label), or a flat area that is
//! neither. Flood fills run on horizontal ranges: each range is extended
//! left and right at the seed elevation, then the rows above and below are
//! scanned for adjacent ranges. A second raster of markers, bumped once per
//! scan, lets repeated boundary searches skip already-visited pixels
//! without ever clearing the raster.

use tracing::error;

use crate::primitives::{Coord, Elevation, Offsets, NODATA_ELEVATION};
use crate::tile::Tile;

/// Label stored per pixel.
pub type Label = i32;

/// Pixel not yet assigned to any flat area.
pub const EMPTY: Label = 0;

/// Pixel belongs to a multi-pixel flat area that is neither a peak nor a
/// saddle. Large enough in magnitude to stay clear of real saddle labels.
pub const GENERIC_FLAT_AREA: Label = -999_999;

/// Higher-elevation pixels found along the boundary of a flat area.
///
/// A location may appear multiple times; callers sort and deduplicate when
/// they need unique boundary segments.
#[derive(Clone, Debug, Default)]
pub struct Boundary {
    /// Packed [`Offsets`] values of boundary pixels strictly higher than
    /// the flat area.
    pub higher_points: Vec<u64>,
}

#[derive(Clone, Copy)]
struct Range {
    xmin: Coord,
    xmax: Coord,
    y: Coord,
}

/// Flood-fill labeler over one tile.
pub struct DomainMap<'a> {
    tile: &'a Tile,
    pixels: Vec<Label>,
    markers: Vec<Label>,
    marker_value: Label,
    pending_ranges: Vec<Range>,
}

impl<'a> DomainMap<'a> {
    /// Creates an empty map the same size as `tile`.
    #[must_use]
    pub fn new(tile: &'a Tile) -> Self {
        let size = tile.width() as usize * tile.height() as usize;
        Self {
            tile,
            pixels: vec![EMPTY; size],
            markers: vec![EMPTY; size],
            marker_value: 1,
            pending_ranges: Vec::new(),
        }
    }

    /// Returns the label at `(x, y)`.
    #[must_use]
    pub fn get(&self, x: Coord, y: Coord) -> Label {
        self.pixels[self.index(x, y)]
    }

    /// Returns the label at the packed offsets.
    #[must_use]
    pub fn get_offsets(&self, offsets: Offsets) -> Label {
        self.get(offsets.x(), offsets.y())
    }

    fn index(&self, x: Coord, y: Coord) -> usize {
        y as usize * self.tile.width() as usize + x as usize
    }

    /// Finds the flat area containing `(x, y)` and fills `boundary` with
    /// every strictly higher, non-missing 4-neighbour of the area.
    pub fn find_flat_area(&mut self, x: Coord, y: Coord, boundary: &mut Boundary) {
        // A fresh marker value hides the traces of all previous searches.
        self.marker_value += 1;
        boundary.higher_points.clear();

        let elevation: Elevation = self.tile.get(x, y);
        let width = self.tile.width();
        let height = self.tile.height();

        self.pending_ranges.push(Range {
            xmin: x,
            xmax: x,
            y,
        });

        while let Some(mut range) = self.pending_ranges.pop() {
            // Extend the range to the left.
            loop {
                let left_x = range.xmin - 1;
                if left_x < 0 {
                    break;
                }
                let neighbour = self.tile.get(left_x, range.y);
                if neighbour != elevation {
                    if neighbour != NODATA_ELEVATION && neighbour > elevation {
                        boundary
                            .higher_points
                            .push(Offsets::new(left_x, range.y).value());
                    }
                    break;
                }
                range.xmin = left_x;
            }

            // Extend the range to the right.
            loop {
                let right_x = range.xmax + 1;
                if right_x >= width {
                    break;
                }
                let neighbour = self.tile.get(right_x, range.y);
                if neighbour != elevation {
                    if neighbour != NODATA_ELEVATION && neighbour > elevation {
                        boundary
                            .higher_points
                            .push(Offsets::new(right_x, range.y).value());
                    }
                    break;
                }
                range.xmax = right_x;
            }

            // Mark the range as visited.
            let row_start = self.index(range.xmin, range.y);
            let count = (range.xmax - range.xmin + 1) as usize;
            for marker in &mut self.markers[row_start..row_start + count] {
                *marker = self.marker_value;
            }

            for row_offset in [-1, 1] {
                let scan_y = range.y + row_offset;
                if scan_y < 0 || scan_y >= height {
                    continue;
                }
                let mut lo: Coord = -1;
                let max_x = (range.xmax + 1).min(width - 1);
                for scan_x in (range.xmin - 1)..=max_x {
                    if !self.tile.is_in_extents(scan_x, scan_y) {
                        continue;
                    }
                    let neighbour = self.tile.get(scan_x, scan_y);
                    if neighbour == elevation {
                        if lo == -1 {
                            lo = scan_x;
                        }
                    } else {
                        if neighbour != NODATA_ELEVATION && neighbour > elevation {
                            boundary
                                .higher_points
                                .push(Offsets::new(scan_x, scan_y).value());
                        }
                        if lo != -1 {
                            // End of a range; enqueue it unless visited. The
                            // leftmost pixel suffices since a range is either
                            // entirely marked or entirely unmarked.
                            if self.markers[self.index(lo, scan_y)] != self.marker_value {
                                self.pending_ranges.push(Range {
                                    xmin: lo,
                                    xmax: scan_x - 1,
                                    y: scan_y,
                                });
                            }
                            lo = -1;
                        }
                    }
                }
                if lo != -1 && self.markers[self.index(lo, scan_y)] != self.marker_value {
                    self.pending_ranges.push(Range {
                        xmin: lo,
                        xmax: max_x,
                        y: scan_y,
                    });
                }
            }
        }
    }

    /// Writes `value` into every pixel of the flat area containing `(x, y)`.
    pub fn fill_flat_area(&mut self, x: Coord, y: Coord, value: Label) {
        let elevation: Elevation = self.tile.get(x, y);
        let width = self.tile.width();
        let height = self.tile.height();

        self.pending_ranges.push(Range {
            xmin: x,
            xmax: x,
            y,
        });

        while let Some(mut range) = self.pending_ranges.pop() {
            loop {
                let left_x = range.xmin - 1;
                if left_x < 0 || self.tile.get(left_x, range.y) != elevation {
                    break;
                }
                range.xmin = left_x;
            }
            loop {
                let right_x = range.xmax + 1;
                if right_x >= width || self.tile.get(right_x, range.y) != elevation {
                    break;
                }
                range.xmax = right_x;
            }

            let row_start = self.index(range.xmin, range.y);
            let count = (range.xmax - range.xmin + 1) as usize;
            for pixel in &mut self.pixels[row_start..row_start + count] {
                *pixel = value;
            }

            for row_offset in [-1, 1] {
                let scan_y = range.y + row_offset;
                if scan_y < 0 || scan_y >= height {
                    continue;
                }
                let mut lo: Coord = -1;
                for scan_x in (range.xmin - 1)..=(range.xmax + 1) {
                    if !self.tile.is_in_extents(scan_x, scan_y)
                        || self.tile.get(scan_x, scan_y) != elevation
                    {
                        if lo != -1 {
                            if self.pixels[self.index(lo, scan_y)] == EMPTY {
                                self.pending_ranges.push(Range {
                                    xmin: lo,
                                    xmax: scan_x - 1,
                                    y: scan_y,
                                });
                            }
                            lo = -1;
                        }
                    } else if lo == -1 {
                        lo = scan_x;
                    }
                }
                if lo != -1 && self.pixels[self.index(lo, scan_y)] == EMPTY {
                    self.pending_ranges.push(Range {
                        xmin: lo,
                        xmax: range.xmax + 1,
                        y: scan_y,
                    });
                }
            }
        }
    }

    /// Returns the pixel nearest to `location` carrying `value`, searching
    /// outward in square rings. Falls back to `location` itself when the
    /// search exhausts the tile.
    #[must_use]
    pub fn find_close_point_with_value(&self, location: Offsets, value: Label) -> Offsets {
        if self.get(location.x(), location.y()) == value {
            return location;
        }

        for radius in 1..self.tile.width() {
            let mut x = location.x() - radius;
            let mut y = location.y() - radius;
            let mut dx = 1;
            let mut dy = 0;
            loop {
                if self.tile.is_in_extents(x, y) && self.pixels[self.index(x, y)] == value {
                    return Offsets::new(x, y);
                }

                if x == location.x() + radius && y == location.y() - radius {
                    // Top-right corner: go down.
                    dx = 0;
                    dy = 1;
                } else if x == location.x() + radius && y == location.y() + radius {
                    // Bottom-right corner: go left.
                    dx = -1;
                    dy = 0;
                } else if x == location.x() - radius && y == location.y() + radius {
                    // Bottom-left corner: go up.
                    dx = 0;
                    dy = -1;
                }

                x += dx;
                y += dy;

                if x == location.x() - radius && y == location.y() - radius {
                    break;
                }
            }
        }

        error!(
            x = location.x(),
            y = location.y(),
            value,
            "no nearby pixel with requested value"
        );
        location
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tile_3x3(samples: [Elevation; 9]) -> Tile {
        Tile::new(3, 3, samples.to_vec())
    }

    #[test]
    fn flat_area_boundary_collects_strictly_higher_neighbours() {
        let tile = tile_3x3([
            1.0, 9.0, 1.0, //
            9.0, 5.0, 9.0, //
            1.0, 9.0, 1.0,
        ]);
        let mut map = DomainMap::new(&tile);
        let mut boundary = Boundary::default();
        map.find_flat_area(1, 1, &mut boundary);

        let mut points = boundary.higher_points.clone();
        points.sort_unstable();
        points.dedup();
        assert_eq!(points.len(), 4);
    }

    #[test]
    fn flat_area_spans_connected_equal_pixels() {
        let tile = tile_3x3([
            5.0, 5.0, 9.0, //
            5.0, 5.0, 1.0, //
            1.0, 1.0, 1.0,
        ]);
        let mut map = DomainMap::new(&tile);
        let mut boundary = Boundary::default();
        map.find_flat_area(0, 0, &mut boundary);

        let mut points = boundary.higher_points.clone();
        points.sort_unstable();
        points.dedup();
        assert_eq!(points, vec![Offsets::new(2, 0).value()]);
    }

    #[test]
    fn fill_flat_area_labels_the_whole_region() {
        let tile = tile_3x3([
            5.0, 5.0, 9.0, //
            5.0, 5.0, 1.0, //
            1.0, 1.0, 1.0,
        ]);
        let mut map = DomainMap::new(&tile);
        map.fill_flat_area(0, 0, 7);

        assert_eq!(map.get(0, 0), 7);
        assert_eq!(map.get(1, 0), 7);
        assert_eq!(map.get(0, 1), 7);
        assert_eq!(map.get(1, 1), 7);
        assert_eq!(map.get(2, 0), EMPTY);
        assert_eq!(map.get(2, 1), EMPTY);
    }

    #[test]
    fn nodata_neighbours_are_not_higher_points() {
        let tile = tile_3x3([
            NODATA_ELEVATION, 5.0, 9.0, //
            NODATA_ELEVATION, 5.0, 1.0, //
            1.0, 1.0, 1.0,
        ]);
        let mut map = DomainMap::new(&tile);
        let mut boundary = Boundary::default();
        map.find_flat_area(1, 0, &mut boundary);

        let mut points = boundary.higher_points.clone();
        points.sort_unstable();
        points.dedup();
        assert_eq!(points, vec![Offsets::new(2, 0).value()]);
    }

    #[test]
    fn close_point_search_spirals_outward() {
        let tile = tile_3x3([
            1.0, 1.0, 1.0, //
            1.0, 1.0, 1.0, //
            1.0, 1.0, 1.0,
        ]);
        let mut map = DomainMap::new(&tile);
        map.fill_flat_area(0, 0, 3);
        // Everything is labelled 3, so the probe location itself matches.
        assert_eq!(
            map.find_close_point_with_value(Offsets::new(1, 1), 3),
            Offsets::new(1, 1)
        );
        // A value that exists nowhere falls back to the probe location.
        assert_eq!(
            map.find_close_point_with_value(Offsets::new(1, 1), 42),
            Offsets::new(1, 1)
        );
    }
}
