//! The line tree: each peak's parent is the first higher peak reached by
//! walking the divide tree while staying as high as possible.
//!
//! Building the tree also derives an upper bound on every saddle's
//! prominence, defined as the prominence of the peak whose key saddle it
//! is. Pruning a divide tree below a prominence threshold must keep not
//! only the peaks at or above the threshold but also their key saddles, and
//! the bounds computed here are what make that test possible. The lowest
//! saddle on any runoff-to-runoff path gets an effectively infinite bound:
//! it could be the key saddle of a huge peak in a tile not yet seen.

use tracing::{debug, warn};

use crate::divide_tree::{DivideTree, Node};
use crate::primitives::Elevation;

/// Bound standing in for "unlimited": compares above any finite threshold.
const HUGE_ELEVATION: Elevation = f32::MAX / 2.0;

/// One node of the line tree, parallel to the divide tree's peaks.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LineNode {
    /// First higher peak along the highest path, [`Node::NULL`] for roots.
    pub parent_id: i32,
    /// Peak whose divide-tree edge owns the saddle between this node and
    /// its line parent.
    pub saddle_owner_id: i32,
    /// Lowest saddle elevation seen in the direction of the children.
    pub lowest_saddle_child_dir: Elevation,
    /// Lowest saddle elevation seen in the direction of the parents.
    pub lowest_saddle_parent_dir: Elevation,
    /// The node whose parent this node currently is, during propagation.
    pub child_id: i32,
    /// Runoff pointing at this peak, [`Node::NULL`] if none.
    pub runoff_id: i32,
}

/// Saddle prominence bounds derived from a fixed [`DivideTree`].
#[derive(Clone, Debug, PartialEq)]
pub struct LineTree {
    nodes: Vec<LineNode>,
    /// Upper bound on each saddle's prominence; `None` until assigned.
    saddle_prominence: Vec<Option<Elevation>>,
}

impl LineTree {
    /// Builds the line tree and saddle prominence bounds for `divide_tree`.
    #[must_use]
    pub fn build(divide_tree: &DivideTree) -> Self {
        let mut tree = Self {
            nodes: divide_tree
                .nodes()
                .iter()
                .enumerate()
                .map(|(index, node)| LineNode {
                    parent_id: node.parent_id,
                    saddle_owner_id: index as i32,
                    lowest_saddle_child_dir: -HUGE_ELEVATION,
                    lowest_saddle_parent_dir: -HUGE_ELEVATION,
                    child_id: Node::NULL,
                    runoff_id: Node::NULL,
                })
                .collect(),
            saddle_prominence: vec![None; divide_tree.saddles().len()],
        };

        debug!("computing off-map saddle prominence");
        tree.compute_off_map_saddle_prominence(divide_tree);
        debug!("computing on-map saddle prominence");
        tree.compute_on_map_saddle_prominence(divide_tree);
        tree
    }

    /// Returns the nodes; index 0 is a sentinel.
    #[must_use]
    pub fn nodes(&self) -> &[LineNode] {
        &self.nodes
    }

    /// Returns whether the saddle's prominence bound reaches `min_prominence`.
    /// This is the sole query pruning relies on.
    #[must_use]
    pub fn saddle_has_min_prominence(&self, saddle_id: i32, min_prominence: Elevation) -> bool {
        self.saddle_prominence
            .get((saddle_id - 1) as usize)
            .copied()
            .flatten()
            .is_some_and(|prominence| prominence >= min_prominence)
    }

    /// The divide-tree saddle carried by the edge above `owner_id`, as a
    /// `(saddle index, elevation)` pair. `None` for roots.
    fn saddle_for_owner(
        &self,
        divide_tree: &DivideTree,
        owner_id: i32,
    ) -> Option<(usize, Elevation)> {
        if owner_id == Node::NULL {
            return None;
        }
        let saddle_id = divide_tree.nodes()[owner_id as usize].saddle_id;
        if saddle_id == Node::NULL {
            return None;
        }
        let index = (saddle_id - 1) as usize;
        Some((index, divide_tree.saddles()[index].elevation))
    }

    /// Marks the lowest saddles on runoff-to-runoff paths as having
    /// unlimited prominence and re-roots each path at its runoff peak.
    fn compute_off_map_saddle_prominence(&mut self, divide_tree: &DivideTree) {
        for runoff_index in 0..divide_tree.runoffs().len() {
            let peak_id = divide_tree.runoff_edges()[runoff_index];
            if peak_id == Node::NULL {
                continue;
            }

            let mut node_id = peak_id;
            let mut lowest_saddle_owner = Node::NULL;
            let mut lowest_saddle_elevation = divide_tree.runoffs()[runoff_index].elevation;
            loop {
                if self.nodes[node_id as usize].parent_id == Node::NULL {
                    break;
                }
                if let Some((_, saddle_elevation)) =
                    self.saddle_for_owner(divide_tree, self.nodes[node_id as usize].saddle_owner_id)
                {
                    if saddle_elevation < lowest_saddle_elevation {
                        lowest_saddle_owner = node_id;
                        lowest_saddle_elevation = saddle_elevation;
                    }
                }
                node_id = self.nodes[node_id as usize].parent_id;
            }

            if self.nodes[node_id as usize].runoff_id == Node::NULL {
                lowest_saddle_owner = node_id;
            } else {
                let other_runoff =
                    &divide_tree.runoffs()[self.nodes[node_id as usize].runoff_id as usize];
                if other_runoff.elevation < lowest_saddle_elevation {
                    lowest_saddle_owner = node_id;
                    lowest_saddle_elevation = other_runoff.elevation;
                }

                // Both path ends leave the map: the lowest saddles along it
                // could be the key saddle of an unseen peak, so their
                // prominence is unbounded until more tiles arrive.
                let mut current = peak_id;
                while current != node_id {
                    let saddle_owner_id = self.nodes[current as usize].saddle_owner_id;
                    if let Some((saddle_index, saddle_elevation)) =
                        self.saddle_for_owner(divide_tree, saddle_owner_id)
                    {
                        if saddle_elevation <= lowest_saddle_elevation
                            && self.saddle_prominence[saddle_index].is_none()
                        {
                            self.saddle_prominence[saddle_index] = Some(HUGE_ELEVATION);
                        }
                    }
                    current = self.nodes[current as usize].parent_id;
                    if current == Node::NULL {
                        break;
                    }
                }
            }

            if lowest_saddle_owner != Node::NULL {
                self.reverse_path(peak_id, lowest_saddle_owner);
                // Remember the runoff at this root for the on-map pass.
                self.nodes[peak_id as usize].runoff_id = runoff_index as i32;
                self.nodes[peak_id as usize].parent_id = Node::NULL;
            }
        }
    }

    /// Assigns every on-map saddle the prominence of the highest peak it
    /// can be a key saddle for, walking peaks in decreasing elevation.
    fn compute_on_map_saddle_prominence(&mut self, divide_tree: &DivideTree) {
        let mut sorted_peak_indices: Vec<usize> = (0..divide_tree.peaks().len()).collect();
        sorted_peak_indices.sort_by(|&a, &b| {
            divide_tree.peaks()[b]
                .elevation
                .total_cmp(&divide_tree.peaks()[a].elevation)
        });

        for &peak_index in &sorted_peak_indices {
            let starting_peak_id = peak_index as i32 + 1;
            let starting_elevation = divide_tree.peak(starting_peak_id).elevation;

            // Walk to the first ancestor at least as high, tracking the
            // lowest intervening saddle.
            let mut lowest_saddle_elevation = HUGE_ELEVATION;
            let mut lowest_saddle_owner = Node::NULL;
            let mut node_id = starting_peak_id;
            let mut runoff_index = Node::NULL;
            self.nodes[node_id as usize].child_id = Node::NULL;

            loop {
                if self.nodes[node_id as usize].parent_id == Node::NULL {
                    if self.nodes[node_id as usize].runoff_id == Node::NULL {
                        lowest_saddle_owner = node_id;
                    } else {
                        runoff_index = self.nodes[node_id as usize].runoff_id;
                        let runoff_elevation =
                            divide_tree.runoffs()[runoff_index as usize].elevation;
                        if runoff_elevation < lowest_saddle_elevation {
                            lowest_saddle_owner = node_id;
                            lowest_saddle_elevation = runoff_elevation;
                        }
                    }
                    break;
                }

                self.nodes[node_id as usize].lowest_saddle_child_dir = lowest_saddle_elevation;
                self.nodes[node_id as usize].lowest_saddle_parent_dir = -HUGE_ELEVATION;
                let parent_id = self.nodes[node_id as usize].parent_id;
                self.nodes[parent_id as usize].child_id = node_id;

                if let Some((_, saddle_elevation)) =
                    self.saddle_for_owner(divide_tree, self.nodes[node_id as usize].saddle_owner_id)
                {
                    if saddle_elevation < lowest_saddle_elevation {
                        lowest_saddle_owner = node_id;
                        lowest_saddle_elevation = saddle_elevation;
                    }
                }

                node_id = parent_id;
                if divide_tree.peak(node_id).elevation >= starting_elevation {
                    break;
                }
            }

            // A runoff at the top of the path leaves the lowest saddle's
            // prominence unbounded; otherwise the bound is our own height
            // above the saddle.
            if runoff_index == Node::NULL {
                self.nodes[node_id as usize].lowest_saddle_parent_dir = HUGE_ELEVATION;
            } else {
                self.nodes[node_id as usize].lowest_saddle_parent_dir =
                    divide_tree.runoffs()[runoff_index as usize].elevation;
            }
            self.propagate_lowest_intervening_saddle(divide_tree, node_id);

            let mut current = starting_peak_id;
            while current != node_id {
                let saddle_owner_id = self.nodes[current as usize].saddle_owner_id;
                let parent_id = self.nodes[current as usize].parent_id;
                if parent_id == Node::NULL {
                    break;
                }
                let lowest = self.nodes[current as usize]
                    .lowest_saddle_child_dir
                    .min(self.nodes[parent_id as usize].lowest_saddle_parent_dir);
                if let Some((saddle_index, saddle_elevation)) =
                    self.saddle_for_owner(divide_tree, saddle_owner_id)
                {
                    if saddle_elevation <= lowest && self.saddle_prominence[saddle_index].is_none()
                    {
                        self.saddle_prominence[saddle_index] =
                            Some(starting_elevation - saddle_elevation);
                    }
                }
                current = parent_id;
            }

            // Re-root so the parent pointers run from the lowest saddle's
            // owner up to this peak, then hang the peak below its first
            // higher ancestor.
            if starting_peak_id != node_id {
                self.reverse_path(starting_peak_id, lowest_saddle_owner);
                if lowest_saddle_owner == node_id {
                    // The ancestor sits on the reversed path; leaving its
                    // parent in place would close a cycle.
                    self.nodes[node_id as usize].parent_id = Node::NULL;
                }
                self.nodes[starting_peak_id as usize].parent_id = node_id;
            }
        }
    }

    /// Reverses the parent pointers along the path from `start_peak_id` up
    /// to `end_peak_id`, sliding saddle owners along the reversed links.
    fn reverse_path(&mut self, start_peak_id: i32, end_peak_id: i32) {
        if start_peak_id == end_peak_id {
            return;
        }
        if end_peak_id == Node::NULL {
            warn!(start_peak_id, "cannot reverse a path to a null peak");
            return;
        }

        let mut saddle_owner_id = self.nodes[start_peak_id as usize].saddle_owner_id;
        let mut peak_id = start_peak_id;

        self.nodes[start_peak_id as usize].saddle_owner_id =
            self.nodes[end_peak_id as usize].saddle_owner_id;
        let mut parent_id = self.nodes[start_peak_id as usize].parent_id;
        while peak_id != end_peak_id {
            if parent_id == Node::NULL {
                warn!(start_peak_id, end_peak_id, "path reversal hit a root early");
                break;
            }
            let grandparent_id = self.nodes[parent_id as usize].parent_id;
            self.nodes[parent_id as usize].parent_id = peak_id;
            let displaced = self.nodes[parent_id as usize].saddle_owner_id;
            self.nodes[parent_id as usize].saddle_owner_id = saddle_owner_id;

            peak_id = parent_id;
            parent_id = grandparent_id;
            saddle_owner_id = displaced;
        }
    }

    /// Pushes the lowest saddle bound from `origin_node_id` down the chain
    /// of `child_id` links until a lower bound is already present.
    fn propagate_lowest_intervening_saddle(&mut self, divide_tree: &DivideTree, origin_node_id: i32) {
        let mut node_id = origin_node_id;
        let mut elevation = self.nodes[node_id as usize].lowest_saddle_parent_dir;
        loop {
            let neighbor_id = self.nodes[node_id as usize].child_id;
            if neighbor_id == Node::NULL {
                break;
            }
            let saddle_owner_peak_id =
                if neighbor_id == divide_tree.nodes()[node_id as usize].parent_id {
                    node_id
                } else {
                    neighbor_id
                };
            let Some((_, saddle_elevation)) =
                self.saddle_for_owner(divide_tree, saddle_owner_peak_id)
            else {
                break;
            };
            elevation = elevation.min(saddle_elevation);
            if elevation <= self.nodes[neighbor_id as usize].lowest_saddle_parent_dir {
                break;
            }
            self.nodes[neighbor_id as usize].lowest_saddle_parent_dir = self.nodes
                [neighbor_id as usize]
                .lowest_saddle_parent_dir
                .max(elevation);
            node_id = neighbor_id;
        }
    }
}

#[cfg(test)]
mod tests;
