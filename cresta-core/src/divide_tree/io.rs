//! Reading and writing the `.dvt` divide-tree text format.
//!
//! The format is line oriented UTF-8, tolerant of `#` comments and blank
//! lines. The first real line is the coordinate-system description; the
//! rest are one-character-tagged records: `P` peaks (1-indexed), `S`
//! saddles (1-indexed, with a kind character), `R` runoffs (0-indexed),
//! `N` nodes (0-indexed, index 0 being the sentinel), and `E` runoff
//! edges (0-indexed).

use std::fmt;
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use thiserror::Error;
use tracing::warn;

use crate::coords::{CoordinateSystem, CoordinateSystemError};
use crate::primitives::{Offsets, Peak, Runoff, Saddle, SaddleKind};

use super::{DivideTree, Node};

/// Errors raised while reading or writing `.dvt` files.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum DvtError {
    /// The underlying reader or writer failed.
    #[error(transparent)]
    Io(#[from] io::Error),
    /// No coordinate-system line preceded the first record.
    #[error("missing coordinate system description line")]
    MissingCoordinateSystem,
    /// The coordinate-system line did not parse.
    #[error(transparent)]
    CoordinateSystem(#[from] CoordinateSystemError),
    /// A record had the wrong field count or unparseable fields.
    #[error("malformed `{kind}` record on line {line}")]
    MalformedRecord {
        /// 1-based line number in the input.
        line: usize,
        /// Record tag.
        kind: char,
    },
}

impl DvtError {
    /// Returns a stable, machine-readable code for the variant.
    #[must_use]
    pub const fn code(&self) -> DvtErrorCode {
        match self {
            Self::Io(_) => DvtErrorCode::Io,
            Self::MissingCoordinateSystem => DvtErrorCode::MissingCoordinateSystem,
            Self::CoordinateSystem(_) => DvtErrorCode::CoordinateSystem,
            Self::MalformedRecord { .. } => DvtErrorCode::MalformedRecord,
        }
    }
}

/// Machine-readable codes for [`DvtError`].
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum DvtErrorCode {
    /// The underlying reader or writer failed.
    Io,
    /// No coordinate-system line preceded the first record.
    MissingCoordinateSystem,
    /// The coordinate-system line did not parse.
    CoordinateSystem,
    /// A record had the wrong field count or unparseable fields.
    MalformedRecord,
}

impl DvtErrorCode {
    /// Returns the symbolic identifier for logging surfaces.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Io => "DVT_IO",
            Self::MissingCoordinateSystem => "DVT_MISSING_COORDINATE_SYSTEM",
            Self::CoordinateSystem => "DVT_COORDINATE_SYSTEM",
            Self::MalformedRecord => "DVT_MALFORMED_RECORD",
        }
    }
}

impl fmt::Display for DvtErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl DivideTree {
    /// Writes the tree in `.dvt` form.
    ///
    /// # Errors
    /// Returns any error from the underlying writer.
    pub fn write_to(&self, writer: &mut impl Write) -> io::Result<()> {
        writeln!(writer, "# prominence divide tree")?;
        writeln!(writer, "{}", self.coordinate_system())?;

        for (index, peak) in self.peaks().iter().enumerate() {
            writeln!(
                writer,
                "P,{},{},{},{:.2}",
                index + 1,
                peak.location.x(),
                peak.location.y(),
                peak.elevation
            )?;
        }
        for (index, saddle) in self.saddles().iter().enumerate() {
            writeln!(
                writer,
                "S,{},{},{},{},{:.2}",
                index + 1,
                saddle.kind.as_char(),
                saddle.location.x(),
                saddle.location.y(),
                saddle.elevation
            )?;
        }
        for (index, runoff) in self.runoffs().iter().enumerate() {
            writeln!(
                writer,
                "R,{},{},{},{:.2},{},{}",
                index,
                runoff.location.x(),
                runoff.location.y(),
                runoff.elevation,
                runoff.filled_quadrants,
                i32::from(runoff.inside_peak_area)
            )?;
        }
        for (index, node) in self.nodes().iter().enumerate() {
            writeln!(writer, "N,{},{},{}", index, node.parent_id, node.saddle_id)?;
        }
        for (index, peak_id) in self.runoff_edges().iter().enumerate() {
            writeln!(writer, "E,{index},{peak_id}")?;
        }
        Ok(())
    }

    /// Writes the tree to a file at `path`.
    ///
    /// # Errors
    /// Returns any error from creating or writing the file.
    pub fn write_to_file(&self, path: impl AsRef<Path>) -> io::Result<()> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        self.write_to(&mut writer)?;
        writer.flush()
    }

    /// Reads a tree from `.dvt` text.
    ///
    /// # Errors
    /// Returns [`DvtError`] when the input is unreadable or malformed.
    pub fn read_from(reader: impl BufRead) -> Result<DivideTree, DvtError> {
        let mut coordinate_system: Option<CoordinateSystem> = None;
        let mut peaks: Vec<Peak> = Vec::new();
        let mut saddles: Vec<Saddle> = Vec::new();
        let mut runoffs: Vec<Runoff> = Vec::new();
        let mut nodes: Vec<Node> = Vec::new();
        let mut runoff_edges: Vec<i32> = Vec::new();

        for (line_index, line) in reader.lines().enumerate() {
            let line = line?;
            let line_number = line_index + 1;
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }

            // The coordinate system is the first real line.
            if coordinate_system.is_none() {
                coordinate_system = Some(trimmed.parse()?);
                continue;
            }

            let fields: Vec<&str> = trimmed.split(',').collect();
            let kind = fields[0].chars().next().unwrap_or(' ');
            let malformed = || DvtError::MalformedRecord {
                line: line_number,
                kind,
            };
            match kind {
                'P' => {
                    if fields.len() != 5 {
                        return Err(malformed());
                    }
                    let x = fields[2].parse().map_err(|_| malformed())?;
                    let y = fields[3].parse().map_err(|_| malformed())?;
                    let elevation = fields[4].parse().map_err(|_| malformed())?;
                    peaks.push(Peak::new(Offsets::new(x, y), elevation));
                }
                'S' => {
                    if fields.len() != 6 {
                        return Err(malformed());
                    }
                    let saddle_kind =
                        SaddleKind::from_char(fields[2].chars().next().ok_or_else(malformed)?);
                    let x = fields[3].parse().map_err(|_| malformed())?;
                    let y = fields[4].parse().map_err(|_| malformed())?;
                    let elevation = fields[5].parse().map_err(|_| malformed())?;
                    let mut saddle = Saddle::new(Offsets::new(x, y), elevation);
                    saddle.kind = saddle_kind;
                    saddles.push(saddle);
                }
                'R' => {
                    if fields.len() != 7 {
                        return Err(malformed());
                    }
                    let x = fields[2].parse().map_err(|_| malformed())?;
                    let y = fields[3].parse().map_err(|_| malformed())?;
                    let elevation = fields[4].parse().map_err(|_| malformed())?;
                    let filled_quadrants = fields[5].parse().map_err(|_| malformed())?;
                    let mut runoff =
                        Runoff::new(Offsets::new(x, y), elevation, filled_quadrants);
                    runoff.inside_peak_area = fields[6] == "1";
                    runoffs.push(runoff);
                }
                'N' => {
                    if fields.len() != 4 {
                        return Err(malformed());
                    }
                    let parent_id = fields[2].parse().map_err(|_| malformed())?;
                    let saddle_id = fields[3].parse().map_err(|_| malformed())?;
                    if parent_id != Node::NULL && saddle_id == Node::NULL {
                        warn!(line = line_number, parent_id, "node without saddle id");
                    } else {
                        nodes.push(Node {
                            parent_id,
                            saddle_id,
                        });
                    }
                }
                'E' => {
                    if fields.len() != 3 {
                        return Err(malformed());
                    }
                    runoff_edges.push(fields[2].parse().map_err(|_| malformed())?);
                }
                _ => {}
            }
        }

        let coordinate_system = coordinate_system.ok_or(DvtError::MissingCoordinateSystem)?;
        Ok(DivideTree::from_parts(
            coordinate_system,
            peaks,
            saddles,
            runoffs,
            nodes,
            runoff_edges,
        ))
    }

    /// Reads a tree from the file at `path`.
    ///
    /// # Errors
    /// Returns [`DvtError`] when the file is unreadable or malformed.
    pub fn read_from_file(path: impl AsRef<Path>) -> Result<DivideTree, DvtError> {
        let file = File::open(path)?;
        Self::read_from(BufReader::new(file))
    }
}
