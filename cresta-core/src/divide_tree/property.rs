//! Property tests for divide-tree edge insertion.

use std::collections::HashSet;

use proptest::prelude::*;

use crate::coords::CoordinateSystem;
use crate::primitives::{Offsets, Peak, Saddle};

use super::{DivideTree, Node};

fn is_acyclic(tree: &DivideTree) -> bool {
    for start in 1..tree.nodes().len() as i32 {
        let mut seen = HashSet::new();
        let mut current = start;
        while current != Node::NULL {
            if !seen.insert(current) {
                return false;
            }
            current = tree.nodes()[current as usize].parent_id;
        }
    }
    true
}

fn saddle_ids_well_formed(tree: &DivideTree) -> bool {
    tree.nodes()[1..].iter().all(|node| {
        node.parent_id == Node::NULL
            || (node.saddle_id >= 1 && (node.saddle_id as usize) <= tree.saddles().len())
    })
}

fn tree_with(peak_count: usize, saddle_elevations: &[f32]) -> DivideTree {
    let peaks = (0..peak_count)
        .map(|index| Peak::new(Offsets::new(index as i32, 0), 1000.0 + index as f32))
        .collect();
    let saddles = saddle_elevations
        .iter()
        .enumerate()
        .map(|(index, &elevation)| Saddle::new(Offsets::new(index as i32, 1), elevation))
        .collect();
    DivideTree::new(
        CoordinateSystem::degree(0.0, 0.0, 1.0, 1.0, 64, 64),
        peaks,
        saddles,
        Vec::new(),
    )
}

proptest! {
    /// Any insertion sequence leaves the graph an acyclic forest with
    /// well-formed saddle references, and every broken cycle reports the
    /// basin saddle it discarded.
    #[test]
    fn edge_insertion_preserves_forest_invariants(
        peak_count in 2usize..10,
        pairs in prop::collection::vec((0u8..10, 0u8..10), 1..30),
        elevations in prop::collection::vec(0.0f32..500.0, 30),
    ) {
        let mut tree = tree_with(peak_count, &elevations);
        let mut next_saddle_id = 0;
        let mut discarded: HashSet<i32> = HashSet::new();

        for (raw1, raw2) in pairs {
            let peak1 = i32::from(raw1) % peak_count as i32 + 1;
            let peak2 = i32::from(raw2) % peak_count as i32 + 1;
            if peak1 == peak2 {
                continue;
            }
            next_saddle_id += 1;
            if next_saddle_id as usize > elevations.len() {
                break;
            }

            let basin = tree.maybe_add_edge(peak1, peak2, next_saddle_id);
            if basin != Node::NULL {
                prop_assert!(basin >= 1 && basin <= next_saddle_id);
                prop_assert!(discarded.insert(basin), "saddle discarded twice");
            }

            prop_assert!(is_acyclic(&tree));
            prop_assert!(saddle_ids_well_formed(&tree));

            // A discarded saddle never reappears on a live edge.
            for node in &tree.nodes()[1..] {
                if node.saddle_id != Node::NULL {
                    prop_assert!(!discarded.contains(&node.saddle_id));
                }
            }
        }
    }
}
