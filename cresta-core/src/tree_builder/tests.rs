//! Unit tests for per-tile divide-tree extraction.

use crate::coords::CoordinateSystem;
use crate::primitives::{Elevation, SaddleKind, NODATA_ELEVATION};
use crate::tile::Tile;
use crate::tree_builder::TreeBuilder;

fn tile_from_rows(rows: &[&[Elevation]]) -> Tile {
    let height = rows.len();
    let width = rows[0].len();
    let mut samples = Vec::with_capacity(width * height);
    for row in rows {
        assert_eq!(row.len(), width, "ragged test grid");
        samples.extend_from_slice(row);
    }
    Tile::new(width, height, samples)
}

fn coords_for(tile: &Tile) -> CoordinateSystem {
    CoordinateSystem::degree(
        0.0,
        0.0,
        1.0,
        1.0,
        (tile.height() - 1).max(1),
        (tile.width() - 1).max(1),
    )
}

fn build(rows: &[&[Elevation]]) -> crate::divide_tree::DivideTree {
    let tile = tile_from_rows(rows);
    let coords = coords_for(&tile);
    TreeBuilder::new(&tile, coords).build()
}

#[test]
fn single_maximum_is_the_only_peak() {
    let tree = build(&[
        &[1.0, 2.0, 1.0],
        &[2.0, 9.0, 2.0],
        &[1.0, 2.0, 1.0],
    ]);
    assert_eq!(tree.peaks().len(), 1);
    assert_eq!(tree.peaks()[0].elevation, 9.0);
}

#[test]
fn corner_peak_with_three_lower_neighbours_is_detected() {
    let tree = build(&[
        &[9.0, 2.0],
        &[2.0, 1.0],
    ]);
    assert_eq!(tree.peaks().len(), 1);
    assert_eq!(tree.peaks()[0].location.x(), 0);
    assert_eq!(tree.peaks()[0].location.y(), 0);
}

#[test]
fn two_peaks_share_one_prom_saddle() {
    let tree = build(&[
        &[1.0, 1.0, 1.0, 1.0, 1.0],
        &[1.0, 9.0, 1.0, 8.0, 1.0],
        &[1.0, 1.0, 1.0, 1.0, 1.0],
    ]);
    assert_eq!(tree.peaks().len(), 2);
    assert_eq!(tree.saddles().len(), 1);
    assert_eq!(tree.saddles()[0].kind, SaddleKind::Prom);
    assert_eq!(tree.saddles()[0].elevation, 1.0);

    // The edge runs from the higher peak to the lower one through saddle 1.
    let node = tree.nodes()[1];
    assert_eq!(node.parent_id, 2);
    assert_eq!(node.saddle_id, 1);
}

#[test]
fn col_between_two_summits_is_a_prom_saddle() {
    let tree = build(&[
        &[1.0, 1.0, 1.0, 1.0, 1.0],
        &[1.0, 9.0, 7.0, 9.5, 1.0],
        &[1.0, 1.0, 1.0, 1.0, 1.0],
    ]);
    assert_eq!(tree.peaks().len(), 2);
    assert_eq!(tree.saddles().len(), 1);
    assert_eq!(tree.saddles()[0].elevation, 7.0);
    assert_eq!(tree.saddles()[0].kind, SaddleKind::Prom);
}

#[test]
fn false_saddles_are_compacted_away() {
    // A U-shaped ridge: the notch between the two arms looks like a
    // saddle, but both its divides climb to the same flat summit.
    let tree = build(&[
        &[8.0, 2.0, 7.0],
        &[8.0, 2.0, 7.0],
        &[8.0, 1.0, 7.0],
        &[8.0, 8.0, 8.0],
    ]);
    assert_eq!(tree.peaks().len(), 1);
    assert_eq!(tree.peaks()[0].elevation, 8.0);
    assert!(tree.saddles().is_empty());
}

#[test]
fn flat_area_with_five_higher_segments_yields_four_saddles() {
    let tree = build(&[
        &[1.0, 9.0, 1.0, 1.0, 9.0, 1.0, 1.0],
        &[1.0, 5.0, 5.0, 5.0, 5.0, 5.0, 1.0],
        &[1.0, 5.0, 5.0, 5.0, 5.0, 5.0, 1.0],
        &[9.0, 5.0, 5.0, 5.0, 5.0, 5.0, 9.0],
        &[1.0, 5.0, 5.0, 5.0, 5.0, 5.0, 1.0],
        &[1.0, 5.0, 5.0, 5.0, 5.0, 5.0, 1.0],
        &[1.0, 1.0, 1.0, 9.0, 1.0, 1.0, 1.0],
    ]);
    assert_eq!(tree.peaks().len(), 5);
    assert_eq!(tree.saddles().len(), 4);
    for saddle in tree.saddles() {
        assert_eq!(saddle.elevation, 5.0);
        assert_eq!(saddle.kind, SaddleKind::Prom);
    }
}

#[test]
fn runoffs_appear_at_all_four_corners() {
    let tree = build(&[
        &[1.0, 2.0, 1.0],
        &[2.0, 9.0, 2.0],
        &[1.0, 2.0, 1.0],
    ]);
    let corner_runoffs: Vec<_> = tree
        .runoffs()
        .iter()
        .filter(|runoff| runoff.filled_quadrants == 1)
        .collect();
    assert_eq!(corner_runoffs.len(), 4);
    let mut corners: Vec<(i32, i32)> = corner_runoffs
        .iter()
        .map(|runoff| (runoff.location.x(), runoff.location.y()))
        .collect();
    corners.sort_unstable();
    assert_eq!(corners, vec![(0, 0), (0, 2), (2, 0), (2, 2)]);
}

#[test]
fn edge_maxima_become_runoffs_with_two_quadrants() {
    let tree = build(&[
        &[1.0, 5.0, 1.0],
        &[2.0, 9.0, 2.0],
        &[1.0, 2.0, 1.0],
    ]);
    let edge_runoff = tree
        .runoffs()
        .iter()
        .find(|runoff| runoff.filled_quadrants == 2)
        .expect("the 5 on the top edge is a local edge maximum");
    assert_eq!(edge_runoff.location.x(), 1);
    assert_eq!(edge_runoff.location.y(), 0);
    assert_eq!(edge_runoff.elevation, 5.0);
}

#[test]
fn every_runoff_connects_to_a_peak() {
    let tree = build(&[
        &[1.0, 2.0, 1.0],
        &[2.0, 9.0, 2.0],
        &[1.0, 2.0, 1.0],
    ]);
    assert_eq!(tree.runoff_edges().len(), tree.runoffs().len());
    for &peak_id in tree.runoff_edges() {
        assert_eq!(peak_id, 1);
    }
}

#[test]
fn nodata_tiles_produce_an_empty_tree() {
    let tile = Tile::filled_with_nodata(4, 4);
    let coords = coords_for(&tile);
    let tree = TreeBuilder::new(&tile, coords).build();
    assert!(tree.peaks().is_empty());
    assert!(tree.saddles().is_empty());
    assert!(tree.runoffs().is_empty());
}

#[test]
fn nodata_edge_ends_a_rise_with_a_runoff() {
    let tree = build(&[
        &[1.0, 5.0, NODATA_ELEVATION],
        &[2.0, 9.0, 2.0],
        &[1.0, 2.0, 1.0],
    ]);
    // The rise along the top row falls into missing data, so the 5 is a
    // runoff even though nothing lower follows it.
    assert!(tree
        .runoffs()
        .iter()
        .any(|runoff| runoff.location.x() == 1
            && runoff.location.y() == 0
            && runoff.filled_quadrants == 2));
}

#[test]
fn runoff_inside_peak_area_is_flagged() {
    // The summit plateau touches the tile edge.
    let tree = build(&[
        &[1.0, 9.0, 1.0],
        &[1.0, 9.0, 1.0],
        &[1.0, 1.0, 1.0],
    ]);
    let flagged = tree
        .runoffs()
        .iter()
        .find(|runoff| runoff.location.x() == 1 && runoff.location.y() == 0)
        .expect("edge maximum on the plateau");
    assert!(flagged.inside_peak_area);
}
