//! Cresta core library.
//!
//! Computes the topographic prominence of every peak in a region of
//! elevation rasters. Tiles are scanned into per-tile divide trees, the
//! trees are merged at their shared edges, and the merged tree is re-rooted
//! into an island tree whose parent chains yield each peak's key saddle
//! and prominence. A companion line tree bounds per-saddle prominence so
//! that low-prominence peaks can be pruned without ever discarding a
//! saddle that a neighbouring, not-yet-seen tile might still need.

mod cache;
mod coords;
mod divide_tree;
mod domain_map;
mod island_tree;
mod line_tree;
mod pipeline;
mod primitives;
mod records;
mod tile;
mod tree_builder;

pub use crate::{
    cache::TileCache,
    coords::{CoordinateSystem, CoordinateSystemError, LatLng},
    divide_tree::{DivideTree, DvtError, DvtErrorCode, Node},
    island_tree::{IslandNode, IslandTree},
    line_tree::{LineNode, LineTree},
    pipeline::{
        build_tile_tree, finalize_tree, merge_trees, parents_records, prominence_records,
        reduce_trees, run_region, PipelineError, PipelineErrorCode, RegionOptions, RegionSummary,
    },
    primitives::{
        Coord, Elevation, Offsets, Peak, Runoff, Saddle, SaddleKind, NODATA_ELEVATION,
    },
    records::{
        write_parents_table, write_prominence_table, ParentRecord, ProminenceRecord,
    },
    tile::{Tile, TileKey, TileSource},
    tree_builder::TreeBuilder,
};
