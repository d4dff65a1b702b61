//! Coordinate systems mapping pixel offsets to points on the Earth.
//!
//! Two projections are supported: a degree-based grid (graticule-aligned
//! tiles with a fixed number of samples per degree) and a UTM grid (metric
//! tiles within a single zone). All downstream algorithms treat coordinates
//! opaquely; the variants differ only in how offsets map to geographic
//! coordinates. Each system persists to a single comma-separated line with
//! a `G` or `U` discriminant, which is also the first record of the `.dvt`
//! file format.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::primitives::{Coord, Offsets};

/// A geographic position in decimal degrees.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LatLng {
    latitude: f64,
    longitude: f64,
}

impl LatLng {
    /// Creates a position from decimal degrees.
    #[must_use]
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Returns the latitude in decimal degrees.
    #[must_use]
    pub fn latitude(self) -> f64 {
        self.latitude
    }

    /// Returns the longitude in decimal degrees.
    #[must_use]
    pub fn longitude(self) -> f64 {
        self.longitude
    }
}

/// Errors raised while parsing, constructing, or combining coordinate
/// systems.
#[non_exhaustive]
#[derive(Clone, Debug, Error, PartialEq)]
pub enum CoordinateSystemError {
    /// The persisted description could not be parsed.
    #[error("malformed coordinate system description `{text}`")]
    Malformed {
        /// The offending description line.
        text: String,
    },
    /// Sample counts or sample spacing must be positive.
    #[error("coordinate system has a non-positive sample resolution")]
    InvalidResolution,
    /// UTM zones run from 1 to 60.
    #[error("UTM zone {zone} is out of range 1..=60")]
    ZoneOutOfRange {
        /// The rejected zone number.
        zone: i64,
    },
    /// The two systems differ in projection, zone, or resolution.
    #[error("coordinate systems have incompatible projections or resolutions")]
    Incompatible,
}

/// Mapping between pixel [`Offsets`] and geographic coordinates.
///
/// # Examples
/// ```
/// use cresta_core::{CoordinateSystem, Offsets};
///
/// let coords = CoordinateSystem::degree(36.0, -122.0, 37.0, -121.0, 1200, 1200);
/// let position = coords.to_lat_lng(Offsets::new(0, 0));
/// assert!((position.latitude() - 37.0).abs() < 1e-6);
/// assert!((position.longitude() + 122.0).abs() < 1e-6);
/// ```
#[derive(Clone, Debug, PartialEq)]
pub enum CoordinateSystem {
    /// Graticule-aligned grid with a fixed number of samples per degree.
    Degree {
        /// Southern edge, decimal degrees.
        min_lat: f32,
        /// Western edge, decimal degrees.
        min_lng: f32,
        /// Northern edge, decimal degrees.
        max_lat: f32,
        /// Eastern edge, decimal degrees.
        max_lng: f32,
        /// Vertical sample density.
        samples_per_degree_lat: i32,
        /// Horizontal sample density.
        samples_per_degree_lng: i32,
    },
    /// Metric grid within a single UTM zone.
    Utm {
        /// Zone number, 1..=60.
        zone: u8,
        /// Western edge, metres easting.
        min_x: i32,
        /// Southern edge, metres northing.
        min_y: i32,
        /// Eastern edge, metres easting.
        max_x: i32,
        /// Northern edge, metres northing.
        max_y: i32,
        /// Grid spacing in metres.
        meters_per_sample: f64,
    },
}

impl CoordinateSystem {
    /// Creates a degree-based system covering the given bounding box.
    #[must_use]
    pub fn degree(
        min_lat: f32,
        min_lng: f32,
        max_lat: f32,
        max_lng: f32,
        samples_per_degree_lat: i32,
        samples_per_degree_lng: i32,
    ) -> Self {
        Self::Degree {
            min_lat,
            min_lng,
            max_lat,
            max_lng,
            samples_per_degree_lat,
            samples_per_degree_lng,
        }
    }

    /// Creates a UTM-based system covering the given metric bounding box.
    ///
    /// # Errors
    /// Returns [`CoordinateSystemError::ZoneOutOfRange`] for zones outside
    /// 1..=60 and [`CoordinateSystemError::InvalidResolution`] for a
    /// non-positive sample spacing.
    pub fn utm(
        zone: u8,
        min_x: i32,
        min_y: i32,
        max_x: i32,
        max_y: i32,
        meters_per_sample: f64,
    ) -> Result<Self, CoordinateSystemError> {
        if zone == 0 || zone > 60 {
            return Err(CoordinateSystemError::ZoneOutOfRange {
                zone: i64::from(zone),
            });
        }
        if meters_per_sample <= 0.0 {
            return Err(CoordinateSystemError::InvalidResolution);
        }
        Ok(Self::Utm {
            zone,
            min_x,
            min_y,
            max_x,
            max_y,
            meters_per_sample,
        })
    }

    /// Converts pixel offsets to geographic coordinates. Positive `y` is
    /// south.
    #[must_use]
    pub fn to_lat_lng(&self, offsets: Offsets) -> LatLng {
        match *self {
            Self::Degree {
                min_lng,
                max_lat,
                samples_per_degree_lat,
                samples_per_degree_lng,
                ..
            } => {
                let latitude =
                    f64::from(max_lat) - f64::from(offsets.y()) / f64::from(samples_per_degree_lat);
                let longitude =
                    f64::from(min_lng) + f64::from(offsets.x()) / f64::from(samples_per_degree_lng);
                LatLng::new(latitude, longitude)
            }
            Self::Utm {
                zone,
                min_x,
                max_y,
                meters_per_sample,
                ..
            } => {
                let easting = f64::from(min_x) + f64::from(offsets.x()) * meters_per_sample;
                let northing = f64::from(max_y) - f64::from(offsets.y()) * meters_per_sample;
                utm_to_lat_lng(zone, easting, northing)
            }
        }
    }

    /// Returns whether the two systems share a projection and resolution,
    /// which is what merging and re-origining require.
    #[must_use]
    pub fn compatible_with(&self, other: &Self) -> bool {
        match (self, other) {
            (
                Self::Degree {
                    samples_per_degree_lat: lat1,
                    samples_per_degree_lng: lng1,
                    ..
                },
                Self::Degree {
                    samples_per_degree_lat: lat2,
                    samples_per_degree_lng: lng2,
                    ..
                },
            ) => lat1 == lat2 && lng1 == lng2,
            (
                Self::Utm {
                    zone: zone1,
                    meters_per_sample: spacing1,
                    ..
                },
                Self::Utm {
                    zone: zone2,
                    meters_per_sample: spacing2,
                    ..
                },
            ) => zone1 == zone2 && spacing1 == spacing2,
            _ => false,
        }
    }

    /// Returns the pixel translation taking this system's origin to
    /// `other`'s origin. Both systems must be compatible.
    #[must_use]
    pub fn offsets_to(&self, other: &Self) -> Offsets {
        match (self, other) {
            (
                Self::Degree {
                    min_lng,
                    max_lat,
                    samples_per_degree_lat,
                    samples_per_degree_lng,
                    ..
                },
                Self::Degree {
                    min_lng: other_min_lng,
                    max_lat: other_max_lat,
                    ..
                },
            ) => {
                let dx = ((min_lng - other_min_lng) * *samples_per_degree_lng as f32).round();
                let dy = ((other_max_lat - max_lat) * *samples_per_degree_lat as f32).round();
                Offsets::new(dx as Coord, dy as Coord)
            }
            (
                Self::Utm {
                    min_x,
                    max_y,
                    meters_per_sample,
                    ..
                },
                Self::Utm {
                    min_x: other_min_x,
                    max_y: other_max_y,
                    ..
                },
            ) => {
                let dx = (f64::from(min_x - other_min_x) / meters_per_sample).round();
                let dy = (f64::from(other_max_y - max_y) / meters_per_sample).round();
                Offsets::new(dx as Coord, dy as Coord)
            }
            _ => Offsets::new(0, 0),
        }
    }

    /// Returns a system of the same projection whose bounding box covers
    /// both inputs.
    ///
    /// # Errors
    /// Returns [`CoordinateSystemError::Incompatible`] when the systems
    /// differ in projection, zone, or resolution.
    pub fn merge_with(&self, other: &Self) -> Result<Self, CoordinateSystemError> {
        if !self.compatible_with(other) {
            return Err(CoordinateSystemError::Incompatible);
        }
        match (self, other) {
            (
                Self::Degree {
                    min_lat,
                    min_lng,
                    max_lat,
                    max_lng,
                    samples_per_degree_lat,
                    samples_per_degree_lng,
                },
                Self::Degree {
                    min_lat: other_min_lat,
                    min_lng: other_min_lng,
                    max_lat: other_max_lat,
                    max_lng: other_max_lng,
                    ..
                },
            ) => Ok(Self::Degree {
                min_lat: min_lat.min(*other_min_lat),
                min_lng: min_lng.min(*other_min_lng),
                max_lat: max_lat.max(*other_max_lat),
                max_lng: max_lng.max(*other_max_lng),
                samples_per_degree_lat: *samples_per_degree_lat,
                samples_per_degree_lng: *samples_per_degree_lng,
            }),
            (
                Self::Utm {
                    zone,
                    min_x,
                    min_y,
                    max_x,
                    max_y,
                    meters_per_sample,
                },
                Self::Utm {
                    min_x: other_min_x,
                    min_y: other_min_y,
                    max_x: other_max_x,
                    max_y: other_max_y,
                    ..
                },
            ) => Ok(Self::Utm {
                zone: *zone,
                min_x: (*min_x).min(*other_min_x),
                min_y: (*min_y).min(*other_min_y),
                max_x: (*max_x).max(*other_max_x),
                max_y: (*max_y).max(*other_max_y),
                meters_per_sample: *meters_per_sample,
            }),
            _ => Err(CoordinateSystemError::Incompatible),
        }
    }

    /// Returns how many samples span the full circumference at the equator,
    /// used to mate runoffs across the antimeridian.
    #[must_use]
    pub fn samples_around_equator(&self) -> Coord {
        match *self {
            Self::Degree {
                samples_per_degree_lng,
                ..
            } => 360 * samples_per_degree_lng,
            Self::Utm {
                meters_per_sample, ..
            } => (60.0 * 666_000.0 / meters_per_sample) as Coord,
        }
    }
}

impl fmt::Display for CoordinateSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::Degree {
                min_lat,
                min_lng,
                max_lat,
                max_lng,
                samples_per_degree_lat,
                samples_per_degree_lng,
            } => write!(
                f,
                "G,{min_lat},{min_lng},{samples_per_degree_lat},{samples_per_degree_lng},{max_lat},{max_lng}"
            ),
            Self::Utm {
                zone,
                min_x,
                min_y,
                max_x,
                max_y,
                meters_per_sample,
            } => write!(
                f,
                "U,{zone},{min_x},{min_y},{max_x},{max_y},{meters_per_sample}"
            ),
        }
    }
}

impl FromStr for CoordinateSystem {
    type Err = CoordinateSystemError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || CoordinateSystemError::Malformed {
            text: s.to_owned(),
        };
        let fields: Vec<&str> = s.trim().split(',').collect();
        match fields.first().copied() {
            Some("G") => {
                if fields.len() < 5 {
                    return Err(malformed());
                }
                let min_lat: f32 = fields[1].parse().map_err(|_| malformed())?;
                let min_lng: f32 = fields[2].parse().map_err(|_| malformed())?;
                let samples_per_degree_lat: i32 = fields[3].parse().map_err(|_| malformed())?;
                let samples_per_degree_lng: i32 = fields[4].parse().map_err(|_| malformed())?;
                // The max corner was added later for non-1x1 tile support;
                // older descriptions imply a one-degree tile.
                let (max_lat, max_lng) = if fields.len() >= 7 {
                    (
                        fields[5].parse().map_err(|_| malformed())?,
                        fields[6].parse().map_err(|_| malformed())?,
                    )
                } else {
                    (min_lat + 1.0, min_lng + 1.0)
                };
                if samples_per_degree_lat <= 0 || samples_per_degree_lng <= 0 {
                    return Err(CoordinateSystemError::InvalidResolution);
                }
                Ok(Self::degree(
                    min_lat,
                    min_lng,
                    max_lat,
                    max_lng,
                    samples_per_degree_lat,
                    samples_per_degree_lng,
                ))
            }
            Some("U") => {
                if fields.len() < 7 {
                    return Err(malformed());
                }
                let zone: i64 = fields[1].parse().map_err(|_| malformed())?;
                if zone < 1 || zone > 60 {
                    return Err(CoordinateSystemError::ZoneOutOfRange { zone });
                }
                let min_x: i32 = fields[2].parse().map_err(|_| malformed())?;
                let min_y: i32 = fields[3].parse().map_err(|_| malformed())?;
                let max_x: i32 = fields[4].parse().map_err(|_| malformed())?;
                let max_y: i32 = fields[5].parse().map_err(|_| malformed())?;
                let meters_per_sample: f64 = fields[6].parse().map_err(|_| malformed())?;
                Self::utm(zone as u8, min_x, min_y, max_x, max_y, meters_per_sample)
            }
            _ => Err(malformed()),
        }
    }
}

/// Inverse transverse Mercator on the WGS84 ellipsoid, northern hemisphere.
fn utm_to_lat_lng(zone: u8, easting: f64, northing: f64) -> LatLng {
    const EQUATORIAL_RADIUS: f64 = 6_378_137.0;
    const ECC_SQUARED: f64 = 0.006_694_38;
    const K0: f64 = 0.9996;

    let ecc_prime_squared = ECC_SQUARED / (1.0 - ECC_SQUARED);
    let e1 = (1.0 - (1.0 - ECC_SQUARED).sqrt()) / (1.0 + (1.0 - ECC_SQUARED).sqrt());
    let x = easting - 500_000.0;
    let long_origin = f64::from(zone) * 6.0 - 183.0;

    let m = northing / K0;
    let mu = m / (EQUATORIAL_RADIUS
        * (1.0 - ECC_SQUARED / 4.0
            - 3.0 * ECC_SQUARED * ECC_SQUARED / 64.0
            - 5.0 * ECC_SQUARED.powi(3) / 256.0));
    let phi1 = mu
        + (3.0 * e1 / 2.0 - 27.0 * e1.powi(3) / 32.0) * (2.0 * mu).sin()
        + (21.0 * e1 * e1 / 16.0 - 55.0 * e1.powi(4) / 32.0) * (4.0 * mu).sin()
        + (151.0 * e1.powi(3) / 96.0) * (6.0 * mu).sin();

    let sin_phi1 = phi1.sin();
    let n1 = EQUATORIAL_RADIUS / (1.0 - ECC_SQUARED * sin_phi1 * sin_phi1).sqrt();
    let t1 = phi1.tan() * phi1.tan();
    let c1 = ecc_prime_squared * phi1.cos() * phi1.cos();
    let r1 = EQUATORIAL_RADIUS * (1.0 - ECC_SQUARED)
        / (1.0 - ECC_SQUARED * sin_phi1 * sin_phi1).powf(1.5);
    let d = x / (n1 * K0);

    let latitude = phi1
        - (n1 * phi1.tan() / r1)
            * (d * d / 2.0
                - (5.0 + 3.0 * t1 + 10.0 * c1 - 4.0 * c1 * c1 - 9.0 * ecc_prime_squared)
                    * d.powi(4)
                    / 24.0
                + (61.0 + 90.0 * t1 + 298.0 * c1 + 45.0 * t1 * t1
                    - 252.0 * ecc_prime_squared
                    - 3.0 * c1 * c1)
                    * d.powi(6)
                    / 720.0);
    let longitude = (d - (1.0 + 2.0 * t1 + c1) * d.powi(3) / 6.0
        + (5.0 - 2.0 * c1 + 28.0 * t1 - 3.0 * c1 * c1
            + 8.0 * ecc_prime_squared
            + 24.0 * t1 * t1)
            * d.powi(5)
            / 120.0)
        / phi1.cos();

    LatLng::new(
        latitude.to_degrees(),
        long_origin + longitude.to_degrees(),
    )
}
