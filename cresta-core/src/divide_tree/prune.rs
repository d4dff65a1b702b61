//! Pruning low-prominence peaks from a divide tree.

use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::island_tree::IslandTree;
use crate::line_tree::LineTree;
use crate::primitives::Elevation;

use super::{DivideTree, Node};

fn multimap_insert(map: &mut HashMap<i32, Vec<i32>>, key: i32, value: i32) {
    map.entry(key).or_default().push(value);
}

fn multimap_remove(map: &mut HashMap<i32, Vec<i32>>, key: i32, value: i32) {
    if let Some(values) = map.get_mut(&key) {
        if let Some(position) = values.iter().position(|&v| v == value) {
            values.swap_remove(position);
        }
    }
}

impl DivideTree {
    /// Removes peaks whose prominence is provably below `min_prominence`.
    ///
    /// Best effort rather than a guarantee: peaks whose prominence could
    /// still grow through an unmerged tile edge are kept. `island_tree`
    /// must carry up-to-date prominence values for this tree and is
    /// invalidated by the call, since the tree is modified.
    pub fn prune(&mut self, min_prominence: Elevation, island_tree: &IslandTree) {
        // The line tree tells us whether a saddle is safe to delete.
        let line_tree = LineTree::build(self);

        let mut deleted_peak_indices: HashSet<usize> = HashSet::new();
        let mut deleted_saddle_indices: HashSet<usize> = HashSet::new();

        // Peak id to the peaks just above and below it in the tree.
        let mut neighbors: HashMap<i32, Vec<i32>> = HashMap::new();
        for peak_id in 1..self.nodes.len() as i32 {
            let parent_id = self.nodes[peak_id as usize].parent_id;
            if parent_id != Node::NULL {
                multimap_insert(&mut neighbors, parent_id, peak_id);
                multimap_insert(&mut neighbors, peak_id, parent_id);
            }
        }

        // Peak id to the runoffs pointing at it.
        let mut runoff_neighbors: HashMap<i32, Vec<i32>> = HashMap::new();
        for (runoff_id, &peak_id) in self.runoff_edges.iter().enumerate() {
            multimap_insert(&mut runoff_neighbors, peak_id, runoff_id as i32);
        }

        // Remove low-prominence peaks whose highest saddle also has low
        // prominence, repeating until a fixed point: each removal rewires
        // saddles and can expose further candidates.
        let mut anything_changed = true;
        while anything_changed {
            anything_changed = false;

            for peak_id in 1..self.nodes.len() as i32 {
                if deleted_peak_indices.contains(&((peak_id - 1) as usize)) {
                    continue;
                }
                let Some(prominence) = island_tree.nodes()[peak_id as usize].prominence else {
                    continue;
                };
                if prominence >= min_prominence {
                    continue;
                }

                let peak_neighbors = neighbors.get(&peak_id).cloned().unwrap_or_default();
                if peak_neighbors.is_empty() {
                    // An isolated peak. One connected to a runoff has to
                    // stay, since a neighbouring tile could still give it
                    // prominence.
                    let has_runoff = runoff_neighbors
                        .get(&peak_id)
                        .is_some_and(|runoffs| !runoffs.is_empty());
                    if !has_runoff {
                        debug!(peak_id, "removing isolated peak");
                        deleted_peak_indices.insert((peak_id - 1) as usize);
                        anything_changed = true;
                    }
                    continue;
                }

                // The peak can only go if its highest saddle lacks the
                // minimum prominence too.
                let node_parent_id = self.nodes[peak_id as usize].parent_id;
                let mut owner_of_saddle_to_delete = Node::NULL;
                let mut highest_saddle_elevation = 0.0;
                for &neighbor_peak_id in &peak_neighbors {
                    let saddle_owner_peak_id = if neighbor_peak_id == node_parent_id {
                        peak_id
                    } else {
                        neighbor_peak_id
                    };
                    let saddle_id = self.nodes[saddle_owner_peak_id as usize].saddle_id;
                    let elevation = self.saddle(saddle_id).elevation;
                    if owner_of_saddle_to_delete == Node::NULL
                        || elevation > highest_saddle_elevation
                    {
                        owner_of_saddle_to_delete = saddle_owner_peak_id;
                        highest_saddle_elevation = elevation;
                    }
                }

                let mut delete_peak = false;
                if owner_of_saddle_to_delete != Node::NULL {
                    let saddle_id = self.nodes[owner_of_saddle_to_delete as usize].saddle_id;
                    delete_peak = !line_tree.saddle_has_min_prominence(saddle_id, min_prominence);
                }
                if !delete_peak {
                    continue;
                }

                let saddle_id_to_delete = self.nodes[owner_of_saddle_to_delete as usize].saddle_id;
                debug!(
                    peak_id,
                    owner = owner_of_saddle_to_delete,
                    saddle = saddle_id_to_delete,
                    prominence = f64::from(prominence),
                    "pruning peak"
                );

                // Skip over the eliminated saddle.
                let saddle_parent_id = self.nodes[owner_of_saddle_to_delete as usize].parent_id;
                self.nodes[owner_of_saddle_to_delete as usize].saddle_id =
                    self.nodes[saddle_parent_id as usize].saddle_id;

                // Skip over the eliminated peak: every child points at a new
                // parent. When the saddle owner is one of our children, it
                // becomes the new parent; otherwise our own parent does.
                let mut new_parent_id = node_parent_id;
                if peak_id != owner_of_saddle_to_delete {
                    new_parent_id = owner_of_saddle_to_delete;
                    self.nodes[owner_of_saddle_to_delete as usize].parent_id = node_parent_id;
                }
                for &neighbor_peak_id in &peak_neighbors {
                    if neighbor_peak_id != node_parent_id && neighbor_peak_id != new_parent_id {
                        self.nodes[neighbor_peak_id as usize].parent_id = new_parent_id;
                    }
                }

                for &neighbor_peak_id in &peak_neighbors {
                    multimap_remove(&mut neighbors, neighbor_peak_id, peak_id);
                    if neighbor_peak_id != new_parent_id {
                        multimap_insert(&mut neighbors, new_parent_id, neighbor_peak_id);
                        multimap_insert(&mut neighbors, neighbor_peak_id, new_parent_id);
                    }
                }

                // Any runoffs pointing at us now point at the new parent.
                let runoff_ids = runoff_neighbors.get(&peak_id).cloned().unwrap_or_default();
                for runoff_id in runoff_ids {
                    self.runoff_edges[runoff_id as usize] = new_parent_id;
                    multimap_insert(&mut runoff_neighbors, new_parent_id, runoff_id);
                    // The runoff's adjacent peak is gone; it cannot carry
                    // flat-area information about the new parent.
                    self.runoffs[runoff_id as usize].inside_peak_area = false;
                }

                self.nodes[peak_id as usize].parent_id = Node::NULL;
                self.nodes[peak_id as usize].saddle_id = Node::NULL;
                neighbors.remove(&peak_id);
                runoff_neighbors.remove(&peak_id);
                deleted_peak_indices.insert((peak_id - 1) as usize);
                deleted_saddle_indices.insert((saddle_id_to_delete - 1) as usize);
                anything_changed = true;
            }
        }

        self.remove_deleted_peaks_and_saddles(&deleted_peak_indices, &deleted_saddle_indices);
        debug!(
            peaks = self.peaks.len(),
            saddles = self.saddles.len(),
            "pruned divide tree"
        );
    }
}
