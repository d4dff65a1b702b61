//! Merging two divide trees and splicing their runoffs together.

use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::primitives::{Offsets, Saddle, SaddleKind};

use super::{remove_elements_by_indices, DivideTree, Node};

impl DivideTree {
    /// Appends `other` to this tree and splices any runoffs that coincide.
    /// Both trees must already be expressed in the same coordinate system;
    /// see [`DivideTree::set_origin`].
    pub fn merge(&mut self, other: &DivideTree) {
        let old_num_peaks = self.peaks.len() as i32;
        let old_num_saddles = self.saddles.len() as i32;
        let old_num_nodes = self.nodes.len();
        let old_num_runoffs = self.runoff_edges.len();

        self.peaks.extend_from_slice(&other.peaks);
        self.saddles.extend_from_slice(&other.saddles);
        self.runoffs.extend_from_slice(&other.runoffs);
        // Skip the other tree's sentinel node.
        self.nodes.extend_from_slice(&other.nodes[1..]);
        self.runoff_edges.extend_from_slice(&other.runoff_edges);

        // Renumber the appended references.
        for node in &mut self.nodes[old_num_nodes..] {
            if node.parent_id != Node::NULL {
                node.parent_id += old_num_peaks;
            }
            if node.saddle_id != Node::NULL {
                node.saddle_id += old_num_saddles;
            }
        }
        for edge in &mut self.runoff_edges[old_num_runoffs..] {
            *edge += old_num_peaks;
        }

        self.splice_all_runoffs();
    }

    /// Converts pairs of runoffs at the same location into saddles.
    fn splice_all_runoffs(&mut self) {
        let samples_around_globe = self.coordinate_system.samples_around_equator();
        let mut removed_runoffs: HashSet<usize> = HashSet::new();

        // A hash map keeps the pair lookup linear in the runoff count.
        let mut location_map: HashMap<u64, Vec<usize>> = HashMap::new();
        for (index, runoff) in self.runoffs.iter().enumerate() {
            location_map
                .entry(runoff.location.value())
                .or_default()
                .push(index);
        }

        for index in 0..self.runoffs.len() {
            if removed_runoffs.contains(&index) {
                continue;
            }
            let location = self.runoffs[index].location;
            // Runoffs may also coincide a full revolution away, across the
            // antimeridian.
            for wraparound in -1..=1 {
                let probe = Offsets::new(
                    location.x() + wraparound * samples_around_globe,
                    location.y(),
                );
                let candidates = match location_map.get(&probe.value()) {
                    Some(candidates) => candidates.clone(),
                    None => continue,
                };
                for other_index in candidates {
                    if other_index != index && !removed_runoffs.contains(&other_index) {
                        self.splice_two_runoffs(index, other_index, &mut removed_runoffs);
                        break;
                    }
                }
            }
        }

        remove_elements_by_indices(&mut self.runoffs, &removed_runoffs);
        remove_elements_by_indices(&mut self.runoff_edges, &removed_runoffs);

        let removed_peaks = std::mem::take(&mut self.removed_peak_indices);
        let removed_saddles = std::mem::take(&mut self.removed_saddle_indices);
        self.remove_deleted_peaks_and_saddles(&removed_peaks, &removed_saddles);
    }

    fn splice_two_runoffs(
        &mut self,
        index1: usize,
        index2: usize,
        removed_runoffs: &mut HashSet<usize>,
    ) {
        debug!(index1, index2, "splicing runoffs");

        let peak1 = self.runoff_edges[index1];
        let peak2 = self.runoff_edges[index2];
        // removing peaks below can overwrite these flags, so capture them
        // before any mutation.
        let was_runoff1_inside_peak_area = self.runoffs[index1].inside_peak_area;
        let was_runoff2_inside_peak_area = self.runoffs[index2].inside_peak_area;

        if peak1 != peak2 {
            // The two halves form a complete saddle at this location.
            self.saddles.push(Saddle::new(
                self.runoffs[index1].location,
                self.runoffs[index1].elevation,
            ));
            let new_saddle_id = self.saddles.len() as i32;
            let basin_saddle_id = self.maybe_add_edge(peak1, peak2, new_saddle_id);
            if basin_saddle_id != Node::NULL {
                self.saddle_mut(basin_saddle_id).kind = SaddleKind::Basin;
            }

            // A peak area touching the tile edge either reappears on the
            // other side of the boundary or was never a peak at all; either
            // way one copy can go.
            if was_runoff1_inside_peak_area {
                self.remove_peak(self.runoff_edges[index1], self.runoff_edges[index2]);
            } else if was_runoff2_inside_peak_area {
                self.remove_peak(self.runoff_edges[index2], self.runoff_edges[index1]);
            }
        }

        removed_runoffs.insert(index1);

        // The other runoff can go once all four neighbouring quadrants have
        // contributed; otherwise it stays for a future merge.
        self.runoffs[index2].filled_quadrants += self.runoffs[index1].filled_quadrants;
        if self.runoffs[index2].filled_quadrants >= 4 {
            removed_runoffs.insert(index2);
        } else {
            self.runoffs[index2].inside_peak_area =
                was_runoff1_inside_peak_area && was_runoff2_inside_peak_area;
        }
    }

    /// Removes `peak_id`, stitching its neighbours to `neighbor_peak_id`.
    /// When there is no saddle between the two, the peak's highest incident
    /// saddle is removed instead.
    pub(crate) fn remove_peak(&mut self, peak_id: i32, neighbor_peak_id: i32) {
        debug!(peak_id, neighbor_peak_id, "removing peak");

        let mut neighbor_peak_id = neighbor_peak_id;
        let mut removed_saddle_id = self.nodes[peak_id as usize].saddle_id;
        if self.nodes[peak_id as usize].parent_id != neighbor_peak_id {
            let mut saddle_owner_is_child = true;
            if self.nodes[neighbor_peak_id as usize].parent_id != peak_id {
                // No direct edge; scan for the highest incident saddle.
                let mut highest_saddle_elevation = 0.0;
                if self.nodes[peak_id as usize].parent_id != Node::NULL {
                    neighbor_peak_id = self.nodes[peak_id as usize].parent_id;
                    highest_saddle_elevation =
                        self.saddle(self.nodes[peak_id as usize].saddle_id).elevation;
                    saddle_owner_is_child = false;
                }
                for node_id in 1..self.nodes.len() {
                    if self.nodes[node_id].parent_id != peak_id {
                        continue;
                    }
                    let elevation = self.saddle(self.nodes[node_id].saddle_id).elevation;
                    if elevation > highest_saddle_elevation {
                        highest_saddle_elevation = elevation;
                        neighbor_peak_id = node_id as i32;
                        saddle_owner_is_child = true;
                    }
                }
            }

            if saddle_owner_is_child {
                // The saddle owner is a child of the removed peak; the
                // child inherits the edge between the peak and its parent.
                removed_saddle_id = self.nodes[neighbor_peak_id as usize].saddle_id;
                self.nodes[neighbor_peak_id as usize].parent_id =
                    self.nodes[peak_id as usize].parent_id;
                self.nodes[neighbor_peak_id as usize].saddle_id =
                    self.nodes[peak_id as usize].saddle_id;
            }
        }

        // Deferring the index updates and renumbering everything once at
        // the end of the splice is much faster than renumbering per peak.
        self.removed_peak_indices.insert((peak_id - 1) as usize);
        if removed_saddle_id != Node::NULL {
            self.removed_saddle_indices
                .insert((removed_saddle_id - 1) as usize);
        }

        for node in &mut self.nodes {
            if node.parent_id == peak_id {
                node.parent_id = neighbor_peak_id;
            }
        }

        for index in 0..self.runoff_edges.len() {
            if self.runoff_edges[index] == peak_id {
                self.runoff_edges[index] = neighbor_peak_id;
                // The runoff's adjacent peak is gone; the flat-area flag
                // applied only to that peak.
                self.runoffs[index].inside_peak_area = false;
            }
        }
    }
}
