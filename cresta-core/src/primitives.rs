//! Shared terrain primitives: elevation samples, packed pixel offsets, and
//! the peak, saddle, and runoff records produced by scanning a tile.

/// An elevation sample, in whatever units the tile source provides.
pub type Elevation = f32;

/// Signed pixel coordinate within a tile.
pub type Coord = i32;

/// Sentinel marking a missing elevation sample.
pub const NODATA_ELEVATION: Elevation = -32768.0;

/// Pixel coordinates `(x, y)` within a tile, packed into a single `u64` so
/// they can serve directly as hash-map keys. `y` increases southward and
/// occupies the high 32 bits.
///
/// # Examples
/// ```
/// use cresta_core::Offsets;
///
/// let point = Offsets::new(12, 7);
/// assert_eq!(point.x(), 12);
/// assert_eq!(point.y(), 7);
/// assert_eq!(point.offset_by(-2, 3), Offsets::new(10, 10));
/// ```
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Offsets(u64);

impl Offsets {
    /// Packs an `(x, y)` pair.
    #[must_use]
    pub fn new(x: Coord, y: Coord) -> Self {
        Self((u64::from(y as u32) << 32) | u64::from(x as u32))
    }

    /// Reinterprets a previously packed value.
    #[must_use]
    pub fn from_value(value: u64) -> Self {
        Self(value)
    }

    /// Returns the horizontal coordinate.
    #[must_use]
    pub fn x(self) -> Coord {
        self.0 as u32 as Coord
    }

    /// Returns the vertical coordinate.
    #[must_use]
    pub fn y(self) -> Coord {
        (self.0 >> 32) as u32 as Coord
    }

    /// Returns the packed representation.
    #[must_use]
    pub fn value(self) -> u64 {
        self.0
    }

    /// Returns a copy translated by `(dx, dy)`.
    #[must_use]
    pub fn offset_by(self, dx: Coord, dy: Coord) -> Self {
        Self::new(self.x() + dx, self.y() + dy)
    }
}

/// A flat area strictly higher than its entire boundary.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Peak {
    /// Representative pixel inside the peak's flat area.
    pub location: Offsets,
    /// Elevation of the flat area.
    pub elevation: Elevation,
}

impl Peak {
    /// Creates a peak record.
    #[must_use]
    pub fn new(location: Offsets, elevation: Elevation) -> Self {
        Self {
            location,
            elevation,
        }
    }
}

/// Classification of a saddle after divide-tree construction.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum SaddleKind {
    /// Both steepest-ascent divides reach the same peak.
    False,
    /// A genuine col that may be some peak's key saddle.
    Prom,
    /// The lowest saddle on a cycle broken during construction or merging;
    /// kept structurally, ignored by prominence.
    Basin,
    /// Could not be classified; indicates corrupt input.
    Error,
}

impl SaddleKind {
    /// Returns the single-character representation used by the `.dvt` format.
    #[must_use]
    pub const fn as_char(self) -> char {
        match self {
            Self::False => 'f',
            Self::Prom => 'p',
            Self::Basin => 'b',
            Self::Error => 'e',
        }
    }

    /// Parses the `.dvt` representation; anything unrecognised maps to
    /// [`SaddleKind::Error`].
    #[must_use]
    pub fn from_char(c: char) -> Self {
        match c {
            'f' => Self::False,
            'p' => Self::Prom,
            'b' => Self::Basin,
            _ => Self::Error,
        }
    }
}

/// A flat area with at least two disjoint higher regions on its boundary.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Saddle {
    /// Representative pixel inside the saddle's flat area.
    pub location: Offsets,
    /// Elevation of the flat area.
    pub elevation: Elevation,
    /// Classification assigned during divide-tree construction.
    pub kind: SaddleKind,
}

impl Saddle {
    /// Creates a saddle record, initially classified [`SaddleKind::Prom`].
    #[must_use]
    pub fn new(location: Offsets, elevation: Elevation) -> Self {
        Self {
            location,
            elevation,
            kind: SaddleKind::Prom,
        }
    }
}

/// A point along the edge of a tile that looks like half a saddle: a local
/// edge maximum whose other half may lie in a neighbouring tile.
///
/// Runoffs cannot be removed until all of their neighbouring pixels have
/// been examined. At tile corners that requires all four neighbouring
/// quadrants, so each runoff tracks how many have contributed so far.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Runoff {
    /// Edge pixel the runoff marks.
    pub location: Offsets,
    /// Elevation at the marked pixel.
    pub elevation: Elevation,
    /// Whether the location sits inside the flat area of a peak. A peak
    /// area touching the tile edge may not truly be a peak, since the
    /// neighbouring tile could be higher.
    pub inside_peak_area: bool,
    /// How many of the four neighbouring quadrants have been examined.
    pub filled_quadrants: i32,
}

impl Runoff {
    /// Creates a runoff record with `inside_peak_area` unset.
    #[must_use]
    pub fn new(location: Offsets, elevation: Elevation, filled_quadrants: i32) -> Self {
        Self {
            location,
            elevation,
            inside_peak_area: false,
            filled_quadrants,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use rstest::rstest;

    #[rstest]
    #[case(0, 0)]
    #[case(3600, 1)]
    #[case(1, 3600)]
    #[case(123_456, 654_321)]
    fn offsets_round_trip_through_packed_value(#[case] x: Coord, #[case] y: Coord) {
        let offsets = Offsets::new(x, y);
        assert_eq!(offsets.x(), x);
        assert_eq!(offsets.y(), y);
        assert_eq!(Offsets::from_value(offsets.value()), offsets);
    }

    #[test]
    fn offset_by_translates_both_axes() {
        let offsets = Offsets::new(10, 20).offset_by(5, -3);
        assert_eq!(offsets, Offsets::new(15, 17));
    }

    #[rstest]
    #[case(SaddleKind::False, 'f')]
    #[case(SaddleKind::Prom, 'p')]
    #[case(SaddleKind::Basin, 'b')]
    #[case(SaddleKind::Error, 'e')]
    fn saddle_kind_round_trips_through_char(#[case] kind: SaddleKind, #[case] c: char) {
        assert_eq!(kind.as_char(), c);
        assert_eq!(SaddleKind::from_char(c), kind);
    }

    #[test]
    fn unknown_saddle_kind_char_maps_to_error() {
        assert_eq!(SaddleKind::from_char('x'), SaddleKind::Error);
    }
}
