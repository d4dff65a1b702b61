//! Tabular output records for surviving peaks.

use std::io::{self, Write};

use crate::coords::LatLng;
use crate::primitives::Elevation;

/// One line of the prominence table.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ProminenceRecord {
    /// Peak position.
    pub peak: LatLng,
    /// Peak elevation, already re-flipped for anti-prominence runs.
    pub elevation: Elevation,
    /// Key saddle position; `(0, 0)` for landmass high points.
    pub saddle: LatLng,
    /// Prominence of the peak.
    pub prominence: Elevation,
}

/// One line of the parents table. Landmass high points are omitted
/// upstream, since they have no well-defined parents.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ParentRecord {
    /// Peak position.
    pub peak: LatLng,
    /// Key saddle position.
    pub saddle: LatLng,
    /// Peak elevation.
    pub elevation: Elevation,
    /// Prominence of the peak.
    pub prominence: Elevation,
    /// Position and prominence of the first line-tree ancestor with
    /// greater prominence.
    pub prominence_parent: Option<(LatLng, Elevation)>,
    /// Position and elevation of the first line-tree ancestor at least as
    /// high.
    pub line_parent: Option<(LatLng, Elevation)>,
}

/// Writes the prominence table: coordinates with four decimals, elevations
/// with two.
///
/// # Errors
/// Returns any error from the underlying writer.
pub fn write_prominence_table(
    records: &[ProminenceRecord],
    writer: &mut impl Write,
) -> io::Result<()> {
    for record in records {
        writeln!(
            writer,
            "{:.4},{:.4},{:.2},{:.4},{:.4},{:.2}",
            record.peak.latitude(),
            record.peak.longitude(),
            record.elevation,
            record.saddle.latitude(),
            record.saddle.longitude(),
            record.prominence
        )?;
    }
    Ok(())
}

/// Writes the parents table; missing parents render as zeroes.
///
/// # Errors
/// Returns any error from the underlying writer.
pub fn write_parents_table(records: &[ParentRecord], writer: &mut impl Write) -> io::Result<()> {
    for record in records {
        let (prominence_parent_position, prominence_parent_prominence) = record
            .prominence_parent
            .map_or((LatLng::new(0.0, 0.0), 0.0), |(position, prominence)| {
                (position, prominence)
            });
        let (line_parent_position, line_parent_elevation) = record
            .line_parent
            .map_or((LatLng::new(0.0, 0.0), 0.0), |(position, elevation)| {
                (position, elevation)
            });
        writeln!(
            writer,
            "{:.4},{:.4},{:.4},{:.4},{:.2},{:.2},{:.4},{:.4},{:.2},{:.4},{:.4},{:.2}",
            record.peak.latitude(),
            record.peak.longitude(),
            record.saddle.latitude(),
            record.saddle.longitude(),
            record.elevation,
            record.prominence,
            prominence_parent_position.latitude(),
            prominence_parent_position.longitude(),
            prominence_parent_prominence,
            line_parent_position.latitude(),
            line_parent_position.longitude(),
            line_parent_elevation
        )?;
    }
    Ok(())
}
