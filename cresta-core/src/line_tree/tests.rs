//! Unit tests for line-tree construction and saddle prominence bounds.

use crate::coords::CoordinateSystem;
use crate::divide_tree::DivideTree;
use crate::island_tree::IslandTree;
use crate::primitives::{Offsets, Peak, Runoff, Saddle};

use super::LineTree;

fn coords() -> CoordinateSystem {
    CoordinateSystem::degree(0.0, 0.0, 1.0, 1.0, 4, 4)
}

fn peak(x: i32, elevation: f32) -> Peak {
    Peak::new(Offsets::new(x, 0), elevation)
}

fn saddle(x: i32, elevation: f32) -> Saddle {
    Saddle::new(Offsets::new(x, 1), elevation)
}

/// A=100 over B=90 over C=80 with saddles at 70 and 60, no runoffs.
fn chain_tree() -> DivideTree {
    let mut tree = DivideTree::new(
        coords(),
        vec![peak(0, 100.0), peak(2, 90.0), peak(4, 80.0)],
        vec![saddle(1, 70.0), saddle(3, 60.0)],
        Vec::new(),
    );
    tree.maybe_add_edge(1, 2, 1);
    tree.maybe_add_edge(2, 3, 2);
    tree
}

#[test]
fn on_map_saddles_are_bounded_by_the_highest_claiming_peak() {
    let tree = chain_tree();
    let line = LineTree::build(&tree);

    // Saddle 1 (70) is the key saddle of B=90: bound 20.
    assert!(line.saddle_has_min_prominence(1, 20.0));
    assert!(!line.saddle_has_min_prominence(1, 20.1));
    // Saddle 2 (60) is first claimed by the summit A=100: bound 40.
    assert!(line.saddle_has_min_prominence(2, 40.0));
    assert!(!line.saddle_has_min_prominence(2, 40.1));
}

#[test]
fn line_parent_is_the_first_higher_peak() {
    let tree = chain_tree();
    let line = LineTree::build(&tree);
    // B hangs under A after the build.
    assert_eq!(line.nodes()[2].parent_id, 1);
}

/// A low peak whose only saddle sits on a runoff-to-runoff path.
fn edge_tree(with_runoffs: bool) -> DivideTree {
    let runoffs = if with_runoffs {
        vec![
            Runoff::new(Offsets::new(4, 2), 160.0, 2),
            Runoff::new(Offsets::new(0, 2), 155.0, 2),
        ]
    } else {
        Vec::new()
    };
    let mut tree = DivideTree::new(
        coords(),
        vec![peak(1, 200.0), peak(3, 250.0)],
        vec![saddle(2, 150.0)],
        runoffs,
    );
    tree.maybe_add_edge(1, 2, 1);
    if with_runoffs {
        tree.add_runoff_edge(2, 0);
        tree.add_runoff_edge(1, 1);
    }
    tree
}

#[test]
fn saddles_on_off_map_paths_get_unlimited_prominence() {
    let tree = edge_tree(true);
    let line = LineTree::build(&tree);
    // The saddle could be the key saddle of an unseen peak beyond either
    // runoff, so any finite threshold passes.
    assert!(line.saddle_has_min_prominence(1, 1.0e9));
}

#[test]
fn pruning_preserves_peaks_held_by_off_map_saddles() {
    let mut tree = edge_tree(true);
    let island = IslandTree::build(&tree, false);
    assert_eq!(island.nodes()[1].prominence, Some(50.0));

    tree.prune(100.0, &island);
    // Prominence 50 is under the threshold, but the saddle's bound is
    // unlimited, so the peak must survive.
    assert_eq!(tree.peaks().len(), 2);
}

#[test]
fn pruning_removes_the_same_peak_once_runoffs_are_gone() {
    let mut tree = edge_tree(false);
    let island = IslandTree::build(&tree, false);
    assert_eq!(island.nodes()[1].prominence, Some(50.0));

    tree.prune(100.0, &island);
    assert_eq!(tree.peaks().len(), 1);
    assert_eq!(tree.peaks()[0].elevation, 250.0);
    assert!(tree.saddles().is_empty());
}

#[test]
fn unassigned_saddles_never_reach_a_threshold() {
    let tree = chain_tree();
    let line = LineTree::build(&tree);
    // Out-of-range ids are simply not prominent.
    assert!(!line.saddle_has_min_prominence(99, 0.0));
}
