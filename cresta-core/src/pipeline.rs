//! Orchestration of the prominence computation over a region of tiles.
//!
//! One region run walks the requested bounding box tile by tile: each tile
//! is loaded through the cache, scanned into a per-tile divide tree, and
//! pruned against the prominence threshold. The per-tile trees are then
//! merged by pairwise binary reduction, parallelised with rayon, splicing
//! runoffs at every step. The merged tree yields an island tree, is pruned
//! once more, and the surviving peaks are emitted as prominence records.
//! The final values are independent of task order: tile scans are
//! deterministic, and merges are associative with respect to the pruned
//! prominence set.

use std::fmt;

use rayon::prelude::*;
use thiserror::Error;
use tracing::{debug, instrument, warn};

use crate::cache::TileCache;
use crate::coords::{CoordinateSystemError, LatLng};
use crate::divide_tree::{DivideTree, Node};
use crate::island_tree::IslandTree;
use crate::line_tree::LineTree;
use crate::primitives::Elevation;
use crate::records::{ParentRecord, ProminenceRecord};
use crate::tile::{TileKey, TileSource};

/// Options for a region prominence run.
#[derive(Clone, Copy, Debug)]
pub struct RegionOptions {
    /// Southern edge of the region, inclusive.
    pub min_latitude: f32,
    /// Northern edge of the region, exclusive.
    pub max_latitude: f32,
    /// Western edge of the region, inclusive. May exceed 180 to express
    /// ranges spanning the antimeridian.
    pub min_longitude: f32,
    /// Eastern edge of the region, exclusive.
    pub max_longitude: f32,
    /// Minimum prominence for a peak to survive, in elevation units.
    pub min_prominence: Elevation,
    /// Compute anti-prominence of depressions instead.
    pub anti_prominence: bool,
    /// Measure the deepest root from the lowest saddle instead of zero.
    pub bathymetry: bool,
}

/// Outcome of a region run.
#[derive(Clone, Debug)]
pub struct RegionSummary {
    /// Tiles that produced a divide tree.
    pub tiles_processed: usize,
    /// Tiles skipped because the source had no data.
    pub tiles_skipped: usize,
    /// One record per surviving peak.
    pub records: Vec<ProminenceRecord>,
    /// The merged, pruned divide tree.
    pub tree: DivideTree,
}

/// Errors raised by region runs and merges.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum PipelineError {
    /// No tile in the region produced a divide tree.
    #[error("no tiles in the region produced a divide tree")]
    EmptyRegion,
    /// Trees to merge disagreed on projection or resolution.
    #[error("cannot merge divide trees: {0}")]
    IncompatibleTrees(#[from] CoordinateSystemError),
    /// Parents require a finalized tree with no runoffs.
    #[error("parents require a finalized divide tree with no runoffs")]
    TreeNotFinalized,
}

impl PipelineError {
    /// Returns a stable, machine-readable code for the variant.
    #[must_use]
    pub const fn code(&self) -> PipelineErrorCode {
        match self {
            Self::EmptyRegion => PipelineErrorCode::EmptyRegion,
            Self::IncompatibleTrees(_) => PipelineErrorCode::IncompatibleTrees,
            Self::TreeNotFinalized => PipelineErrorCode::TreeNotFinalized,
        }
    }
}

/// Machine-readable codes for [`PipelineError`].
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum PipelineErrorCode {
    /// No tile in the region produced a divide tree.
    EmptyRegion,
    /// Trees to merge disagreed on projection or resolution.
    IncompatibleTrees,
    /// Parents require a finalized tree with no runoffs.
    TreeNotFinalized,
}

impl PipelineErrorCode {
    /// Returns the symbolic identifier for logging surfaces.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::EmptyRegion => "PIPELINE_EMPTY_REGION",
            Self::IncompatibleTrees => "PIPELINE_INCOMPATIBLE_TREES",
            Self::TreeNotFinalized => "PIPELINE_TREE_NOT_FINALIZED",
        }
    }
}

impl fmt::Display for PipelineErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Builds the pruned divide tree for one tile, or `None` when the source
/// has no data there.
pub fn build_tile_tree<S: TileSource>(
    cache: &TileCache<S>,
    key: TileKey,
    options: &RegionOptions,
) -> Option<DivideTree> {
    // Load outside the cache proper: the tile is used once and the cache
    // would be free to evict it mid-scan anyway.
    let mut tile = cache.load_without_caching(key)?;
    if options.anti_prominence {
        tile.flip_elevations();
    }

    let coordinate_system = cache.source().coordinate_system(key);
    let builder = crate::tree_builder::TreeBuilder::new(&tile, coordinate_system);
    let mut tree = builder.build();

    // Prune within the tile to keep the merge inputs small.
    let island_tree = IslandTree::build(&tree, options.bathymetry);
    tree.prune(options.min_prominence, &island_tree);
    Some(tree)
}

/// Merges two trees after moving both to a shared coordinate system, then
/// compacts away the basin saddles the splice created.
///
/// # Errors
/// Returns [`PipelineError::IncompatibleTrees`] when the trees disagree on
/// projection or resolution.
pub fn merge_trees(
    mut first: DivideTree,
    mut second: DivideTree,
) -> Result<DivideTree, PipelineError> {
    let shared = first
        .coordinate_system()
        .merge_with(second.coordinate_system())?;
    first.set_origin(&shared)?;
    second.set_origin(&shared)?;
    first.merge(&second);
    first.compact();
    Ok(first)
}

/// Reduces per-tile trees to one by pairwise merging, splitting the work
/// across rayon tasks.
///
/// # Errors
/// Propagates [`PipelineError::IncompatibleTrees`] from any merge.
pub fn reduce_trees(mut trees: Vec<DivideTree>) -> Result<Option<DivideTree>, PipelineError> {
    match trees.len() {
        0 => Ok(None),
        1 => Ok(trees.pop()),
        _ => {
            let right_half = trees.split_off(trees.len() / 2);
            let (left, right) = rayon::join(|| reduce_trees(trees), || reduce_trees(right_half));
            match (left?, right?) {
                (Some(left), Some(right)) => Ok(Some(merge_trees(left, right)?)),
                (Some(tree), None) | (None, Some(tree)) => Ok(Some(tree)),
                (None, None) => Ok(None),
            }
        }
    }
}

/// Runs the full prominence computation over a region.
///
/// # Errors
/// Returns [`PipelineError::EmptyRegion`] when no tile yields terrain, or
/// an error from merging.
#[instrument(
    skip(cache, options),
    fields(
        min_lat = f64::from(options.min_latitude),
        max_lat = f64::from(options.max_latitude),
        min_lng = f64::from(options.min_longitude),
        max_lng = f64::from(options.max_longitude),
        min_prominence = f64::from(options.min_prominence),
    )
)]
pub fn run_region<S: TileSource + Sync>(
    cache: &TileCache<S>,
    options: &RegionOptions,
) -> Result<RegionSummary, PipelineError> {
    let keys = region_tile_keys(cache.source(), options);
    debug!(tiles = keys.len(), "enumerated region tiles");

    let trees: Vec<Option<DivideTree>> = keys
        .par_iter()
        .map(|&key| {
            let tree = build_tile_tree(cache, key, options);
            if tree.is_none() {
                warn!(
                    min_lat = f64::from(key.min_lat),
                    min_lng = f64::from(key.min_lng),
                    "no terrain for tile"
                );
            }
            tree
        })
        .collect();

    let tiles_skipped = trees.iter().filter(|tree| tree.is_none()).count();
    let built: Vec<DivideTree> = trees.into_iter().flatten().collect();
    let tiles_processed = built.len();

    let Some(mut tree) = reduce_trees(built)? else {
        return Err(PipelineError::EmptyRegion);
    };

    let island_tree = IslandTree::build(&tree, options.bathymetry);
    tree.prune(options.min_prominence, &island_tree);

    // Prominence values come from a fresh island tree over the pruned tree.
    let island_tree = IslandTree::build(&tree, options.bathymetry);
    let records = prominence_records(
        &tree,
        &island_tree,
        options.min_prominence,
        options.anti_prominence,
    );

    Ok(RegionSummary {
        tiles_processed,
        tiles_skipped,
        records,
        tree,
    })
}

/// Deletes all runoffs and re-prunes, finalising a tree that will never be
/// merged again. Off-map paths stop protecting their saddles, so peaks
/// held only by tile edges fall out here.
pub fn finalize_tree(tree: &mut DivideTree, min_prominence: Elevation, bathymetry: bool) {
    let island_tree = IslandTree::build(tree, bathymetry);
    tree.delete_runoffs();
    tree.prune(min_prominence, &island_tree);
}

/// Emits one record per peak whose prominence reaches `min_prominence`.
#[must_use]
pub fn prominence_records(
    tree: &DivideTree,
    island_tree: &IslandTree,
    min_prominence: Elevation,
    flip_elevations: bool,
) -> Vec<ProminenceRecord> {
    let coordinate_system = tree.coordinate_system();
    let mut records = Vec::new();
    for peak_id in 1..tree.nodes().len() as i32 {
        let node = &island_tree.nodes()[peak_id as usize];
        let Some(prominence) = node.prominence else {
            continue;
        };
        if prominence < min_prominence {
            continue;
        }

        let peak = tree.peak(peak_id);
        let saddle = if node.key_saddle_id == Node::NULL {
            LatLng::new(0.0, 0.0)
        } else {
            coordinate_system.to_lat_lng(tree.saddle(node.key_saddle_id).location)
        };
        // Undo the flip applied for anti-prominence runs.
        let elevation = if flip_elevations {
            -peak.elevation
        } else {
            peak.elevation
        };
        records.push(ProminenceRecord {
            peak: coordinate_system.to_lat_lng(peak.location),
            elevation,
            saddle,
            prominence,
        });
    }
    records
}

/// Computes prominence parents and line parents for every peak at or above
/// `min_prominence`. Landmass high points are omitted: they have no
/// well-defined parents.
///
/// # Errors
/// Returns [`PipelineError::TreeNotFinalized`] when the tree still has
/// runoffs; off-map paths make parents ambiguous.
pub fn parents_records(
    tree: &DivideTree,
    min_prominence: Elevation,
) -> Result<Vec<ParentRecord>, PipelineError> {
    if !tree.runoffs().is_empty() {
        return Err(PipelineError::TreeNotFinalized);
    }

    let island_tree = IslandTree::build(tree, false);
    let line_tree = LineTree::build(tree);
    let coordinate_system = tree.coordinate_system();

    let mut records = Vec::new();
    for peak_id in 1..tree.nodes().len() as i32 {
        let island_node = &island_tree.nodes()[peak_id as usize];
        let Some(prominence) = island_node.prominence else {
            continue;
        };
        if prominence < min_prominence {
            continue;
        }

        let peak = tree.peak(peak_id);
        if prominence == peak.elevation {
            continue;
        }

        let saddle = if island_node.key_saddle_id == Node::NULL {
            LatLng::new(0.0, 0.0)
        } else {
            coordinate_system.to_lat_lng(tree.saddle(island_node.key_saddle_id).location)
        };

        // Walk up the line tree for the first ancestor with greater
        // prominence and the first at least as high.
        let mut prominence_parent: Option<(LatLng, Elevation)> = None;
        let mut line_parent: Option<(LatLng, Elevation)> = None;
        let mut parent_id = line_tree.nodes()[peak_id as usize].parent_id;
        while parent_id != Node::NULL {
            let parent_prominence = island_tree.nodes()[parent_id as usize]
                .prominence
                .unwrap_or(0.0);
            if prominence_parent.is_none() && parent_prominence > prominence {
                prominence_parent = Some((
                    coordinate_system.to_lat_lng(tree.peak(parent_id).location),
                    parent_prominence,
                ));
            }
            let parent_elevation = tree.peak(parent_id).elevation;
            if line_parent.is_none() && parent_elevation >= peak.elevation {
                line_parent = Some((
                    coordinate_system.to_lat_lng(tree.peak(parent_id).location),
                    parent_elevation,
                ));
            }
            if prominence_parent.is_some() && line_parent.is_some() {
                break;
            }
            parent_id = line_tree.nodes()[parent_id as usize].parent_id;
        }

        records.push(ParentRecord {
            peak: coordinate_system.to_lat_lng(peak.location),
            saddle,
            elevation: peak.elevation,
            prominence,
            prominence_parent,
            line_parent,
        });
    }
    Ok(records)
}

/// Enumerates the tile keys covering the region, wrapping longitudes past
/// the antimeridian back into range.
fn region_tile_keys<S: TileSource>(source: &S, options: &RegionOptions) -> Vec<TileKey> {
    let span = source.span_degrees();
    let mut keys = Vec::new();
    let mut lat = options.min_latitude;
    while lat < options.max_latitude {
        let mut lng = options.min_longitude;
        while lng < options.max_longitude {
            let mut wrapped_lng = lng;
            if wrapped_lng >= 180.0 {
                wrapped_lng -= 360.0;
            }
            keys.push(TileKey::new(lat, wrapped_lng));
            lng += span;
        }
        lat += span;
    }
    keys
}
