//! The prominence island tree: the divide tree re-rooted so that every
//! parent is a higher peak, which makes each peak's key saddle and
//! prominence fall out of a single walk up the parent chain.

use tracing::debug;

use crate::divide_tree::{DivideTree, Node};
use crate::primitives::Elevation;

/// One node of the island tree, parallel to the divide tree's peaks.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct IslandNode {
    /// A higher peak, [`Node::NULL`] for the root.
    pub parent_id: i32,
    /// The peak owning the highest saddle on the border of this peak's
    /// prominence island.
    pub saddle_peak_id: i32,
    /// Elevation drop to the key saddle, `None` before computation.
    pub prominence: Option<Elevation>,
    /// The key saddle, [`Node::NULL`] for the root.
    pub key_saddle_id: i32,
}

/// Prominence values derived from a fixed [`DivideTree`]. Any modification
/// to the divide tree invalidates the island tree.
#[derive(Clone, Debug, PartialEq)]
pub struct IslandTree {
    nodes: Vec<IslandNode>,
}

/// Total order on points: elevation first, id breaking ties. Two peaks of
/// equal elevation must not both claim the saddle between them as their
/// key saddle; correct prominences do not require the disambiguation, but
/// pruning against key saddles does.
fn second_is_higher(
    first_elevation: Elevation,
    first_id: i32,
    second_elevation: Elevation,
    second_id: i32,
) -> bool {
    first_elevation < second_elevation
        || (first_elevation == second_elevation && first_id < second_id)
}

impl IslandTree {
    /// Builds the island tree for `divide_tree`.
    ///
    /// With `bathymetry` set, the root's prominence is measured from the
    /// lowest saddle instead of from sea level zero.
    #[must_use]
    pub fn build(divide_tree: &DivideTree, bathymetry: bool) -> Self {
        let mut tree = Self {
            nodes: divide_tree
                .nodes()
                .iter()
                .enumerate()
                .map(|(index, node)| IslandNode {
                    parent_id: node.parent_id,
                    saddle_peak_id: index as i32,
                    prominence: None,
                    key_saddle_id: Node::NULL,
                })
                .collect(),
        };

        tree.uninvert_peaks(divide_tree);
        tree.uninvert_saddles(divide_tree);
        tree.compute_prominences(divide_tree, bathymetry);
        debug!(peaks = tree.nodes.len().saturating_sub(1), "built island tree");
        tree
    }

    /// Returns the nodes; index 0 is a sentinel.
    #[must_use]
    pub fn nodes(&self) -> &[IslandNode] {
        &self.nodes
    }

    /// Rearranges parent links so every parent is higher than its child,
    /// keeping `saddle_peak_id` pointing at the highest saddle among each
    /// node's former parent and children.
    fn uninvert_peaks(&mut self, divide_tree: &DivideTree) {
        for node_id in 1..self.nodes.len() as i32 {
            self.uninvert_peak(divide_tree, node_id);
        }
    }

    // Parent chains reach thousands of nodes in real terrain, so the
    // recursive formulation overflows the stack; frames carry the parent
    // whose own uninversion must finish before the rotation applies.
    fn uninvert_peak(&mut self, divide_tree: &DivideTree, start_id: i32) {
        let mut stack: Vec<(i32, Option<i32>)> = vec![(start_id, None)];
        while let Some(&(node_id, pending_parent)) = stack.last() {
            if let Some(parent_id) = pending_parent {
                let top = stack.len() - 1;
                stack[top].1 = None;

                let grandparent_id = self.nodes[parent_id as usize].parent_id;
                let child_saddle_peak = self.nodes[node_id as usize].saddle_peak_id;
                let parent_saddle_peak = self.nodes[parent_id as usize].saddle_peak_id;
                // At the top of the tree the parent's saddle reference may
                // be null, so compare saddles only when a grandparent
                // exists.
                let move_parent_under_child = grandparent_id == Node::NULL || {
                    let child_saddle_id =
                        divide_tree.nodes()[child_saddle_peak as usize].saddle_id;
                    let parent_saddle_id =
                        divide_tree.nodes()[parent_saddle_peak as usize].saddle_id;
                    second_is_higher(
                        divide_tree.saddle(parent_saddle_id).elevation,
                        parent_saddle_id,
                        divide_tree.saddle(child_saddle_id).elevation,
                        child_saddle_id,
                    )
                };
                if move_parent_under_child {
                    self.nodes[parent_id as usize].parent_id = node_id;
                    self.nodes[parent_id as usize].saddle_peak_id = child_saddle_peak;
                    self.nodes[node_id as usize].saddle_peak_id = parent_saddle_peak;
                }

                // The child climbs one spot in the tree.
                self.nodes[node_id as usize].parent_id = grandparent_id;
                continue;
            }

            let parent_id = self.nodes[node_id as usize].parent_id;
            if parent_id == Node::NULL
                || second_is_higher(
                    divide_tree.peak(node_id).elevation,
                    node_id,
                    divide_tree.peak(parent_id).elevation,
                    parent_id,
                )
            {
                stack.pop();
                continue;
            }

            let top = stack.len() - 1;
            stack[top].1 = Some(parent_id);
            stack.push((parent_id, None));
        }
    }

    /// Second pass: orders parent chains by increasing saddle elevation so
    /// `saddle_peak_id` chains are monotone.
    fn uninvert_saddles(&mut self, divide_tree: &DivideTree) {
        for node_id in 1..self.nodes.len() as i32 {
            self.uninvert_saddle(divide_tree, node_id);
        }
    }

    fn uninvert_saddle(&mut self, divide_tree: &DivideTree, start_id: i32) {
        // Frames remember the grandparent captured before the parent's own
        // uninversion, matching the order the rotations must apply in.
        let mut stack: Vec<(i32, Option<i32>)> = vec![(start_id, None)];
        while let Some(&(node_id, pending_grandparent)) = stack.last() {
            if let Some(grandparent_id) = pending_grandparent {
                let top = stack.len() - 1;
                stack[top].1 = None;
                self.nodes[node_id as usize].parent_id = grandparent_id;
                continue;
            }

            let parent_id = self.nodes[node_id as usize].parent_id;
            if parent_id == Node::NULL {
                stack.pop();
                continue;
            }
            let grandparent_id = self.nodes[parent_id as usize].parent_id;
            if grandparent_id == Node::NULL {
                stack.pop();
                continue;
            }

            let child_saddle_peak = self.nodes[node_id as usize].saddle_peak_id;
            let parent_saddle_peak = self.nodes[parent_id as usize].saddle_peak_id;
            let child_saddle_id = divide_tree.nodes()[child_saddle_peak as usize].saddle_id;
            let parent_saddle_id = divide_tree.nodes()[parent_saddle_peak as usize].saddle_id;
            if second_is_higher(
                divide_tree.saddle(parent_saddle_id).elevation,
                parent_saddle_id,
                divide_tree.saddle(child_saddle_id).elevation,
                child_saddle_id,
            ) {
                stack.pop();
                continue;
            }

            let top = stack.len() - 1;
            stack[top].1 = Some(grandparent_id);
            stack.push((parent_id, None));
        }
    }

    fn compute_prominences(&mut self, divide_tree: &DivideTree, bathymetry: bool) {
        let sea_level = if bathymetry {
            divide_tree
                .saddles()
                .iter()
                .map(|saddle| saddle.elevation)
                .fold(None, |lowest: Option<Elevation>, elevation| {
                    Some(lowest.map_or(elevation, |low| low.min(elevation)))
                })
                .unwrap_or(0.0)
        } else {
            0.0
        };

        for node_id in 1..self.nodes.len() as i32 {
            let elevation = divide_tree.peak(node_id).elevation;
            let mut child_node_id = node_id;
            let mut parent_node_id = self.nodes[node_id as usize].parent_id;

            // Find the first strictly higher peak up the parent chain.
            while parent_node_id != Node::NULL {
                if second_is_higher(
                    elevation,
                    node_id,
                    divide_tree.peak(parent_node_id).elevation,
                    parent_node_id,
                ) {
                    break;
                }
                child_node_id = parent_node_id;
                parent_node_id = self.nodes[child_node_id as usize].parent_id;
            }

            if parent_node_id == Node::NULL {
                // The highest point in the tree.
                self.nodes[node_id as usize].prominence = Some(elevation - sea_level);
            } else {
                let saddle_peak_id = self.nodes[child_node_id as usize].saddle_peak_id;
                let saddle_id = divide_tree.nodes()[saddle_peak_id as usize].saddle_id;
                self.nodes[node_id as usize].prominence =
                    Some(elevation - divide_tree.saddle(saddle_id).elevation);
                self.nodes[node_id as usize].key_saddle_id = saddle_id;
            }
        }
    }
}

#[cfg(test)]
mod tests;
