//! Unit tests for island-tree construction and prominence computation.

use crate::coords::CoordinateSystem;
use crate::divide_tree::{DivideTree, Node};
use crate::primitives::{Offsets, Peak, Saddle};

use super::IslandTree;

fn coords() -> CoordinateSystem {
    CoordinateSystem::degree(0.0, 0.0, 1.0, 1.0, 64, 64)
}

fn peak(x: i32, elevation: f32) -> Peak {
    Peak::new(Offsets::new(x, 0), elevation)
}

fn saddle(x: i32, elevation: f32) -> Saddle {
    Saddle::new(Offsets::new(x, 1), elevation)
}

/// A=100 over B=90 over C=80 with saddles at 70 and 60.
fn chain_tree() -> DivideTree {
    let mut tree = DivideTree::new(
        coords(),
        vec![peak(0, 100.0), peak(2, 90.0), peak(4, 80.0)],
        vec![saddle(1, 70.0), saddle(3, 60.0)],
        Vec::new(),
    );
    tree.maybe_add_edge(2, 1, 1);
    tree.maybe_add_edge(3, 2, 2);
    tree
}

#[test]
fn prominence_is_height_above_the_key_saddle() {
    let tree = chain_tree();
    let island = IslandTree::build(&tree, false);

    assert_eq!(island.nodes()[1].prominence, Some(100.0));
    assert_eq!(island.nodes()[1].key_saddle_id, Node::NULL);
    assert_eq!(island.nodes()[2].prominence, Some(20.0));
    assert_eq!(island.nodes()[2].key_saddle_id, 1);
    assert_eq!(island.nodes()[3].prominence, Some(20.0));
    assert_eq!(island.nodes()[3].key_saddle_id, 2);
}

#[test]
fn parents_are_always_higher_after_build() {
    // Start from a tree whose parent links point downhill.
    let mut tree = DivideTree::new(
        coords(),
        vec![peak(0, 50.0), peak(2, 100.0), peak(4, 75.0)],
        vec![saddle(1, 40.0), saddle(3, 35.0)],
        Vec::new(),
    );
    tree.maybe_add_edge(2, 1, 1);
    tree.maybe_add_edge(3, 1, 2);

    let island = IslandTree::build(&tree, false);
    for peak_id in 1..island.nodes().len() as i32 {
        let parent_id = island.nodes()[peak_id as usize].parent_id;
        if parent_id != Node::NULL {
            assert!(
                tree.peak(parent_id).elevation > tree.peak(peak_id).elevation
                    || (tree.peak(parent_id).elevation == tree.peak(peak_id).elevation
                        && parent_id < peak_id)
            );
        }
    }
    assert_eq!(island.nodes()[2].prominence, Some(100.0));
}

#[test]
fn building_twice_yields_identical_prominences() {
    let tree = chain_tree();
    let first = IslandTree::build(&tree, false);
    let second = IslandTree::build(&tree, false);
    assert_eq!(first, second);
}

#[test]
fn equal_elevation_peaks_break_ties_by_id() {
    let mut tree = DivideTree::new(
        coords(),
        vec![peak(0, 100.0), peak(2, 100.0)],
        vec![saddle(1, 50.0)],
        Vec::new(),
    );
    tree.maybe_add_edge(1, 2, 1);
    let island = IslandTree::build(&tree, false);

    // Only the lower-id peak cedes the saddle; the other is the root.
    assert_eq!(island.nodes()[1].prominence, Some(50.0));
    assert_eq!(island.nodes()[1].key_saddle_id, 1);
    assert_eq!(island.nodes()[2].prominence, Some(100.0));
    assert_eq!(island.nodes()[2].key_saddle_id, Node::NULL);
}

#[test]
fn bathymetry_measures_the_root_from_the_lowest_saddle() {
    let tree = chain_tree();
    let island = IslandTree::build(&tree, true);
    // Lowest saddle is 60, so the deepest root rises 40 above it.
    assert_eq!(island.nodes()[1].prominence, Some(40.0));
    assert_eq!(island.nodes()[2].prominence, Some(20.0));
}

#[test]
fn deep_inverted_chains_do_not_overflow_the_stack() {
    // A pathological chain tens of thousands of nodes deep, every parent
    // lower than its child, which a recursive uninversion cannot survive.
    let n: i32 = 50_000;
    let peaks: Vec<Peak> = (1..=n)
        .map(|id| peak(id, (n - id) as f32 + 1000.0))
        .collect();
    let saddles: Vec<Saddle> = (1..n)
        .map(|id| saddle(id, (n - id) as f32 + 998.5))
        .collect();
    let mut tree = DivideTree::new(coords(), peaks, saddles, Vec::new());
    for id in 1..n {
        tree.maybe_add_edge(id, id + 1, id);
    }

    let island = IslandTree::build(&tree, false);
    // The first peak is the summit of the whole chain.
    assert_eq!(island.nodes()[1].prominence, Some((n - 1) as f32 + 1000.0));
    for id in 2..=n {
        let node = &island.nodes()[id as usize];
        assert_eq!(node.prominence, Some(0.5), "peak {id}");
        assert_eq!(node.key_saddle_id, id - 1);
    }
}
