//! The divide tree: peaks connected by edges through saddles.
//!
//! Edges connect peaks whose divides, walked uphill from a shared saddle,
//! reach the two peaks. Although the tree is in principle undirected, it is
//! stored as a directed graph: each peak has one parent, and the id of the
//! saddle between the peak and its parent is stored with the child. Parent
//! edges are reversed as convenient while the tree is built up.
//!
//! Peaks and saddles are 1-indexed so that the null id `-1` and the
//! sentinel node `0` occupy the same integer space; `runoffs` and their
//! parallel edge array are 0-indexed.

mod io;
mod merge;
mod prune;

use std::collections::HashSet;

use tracing::debug;

pub use io::{DvtError, DvtErrorCode};

use crate::coords::{CoordinateSystem, CoordinateSystemError};
use crate::primitives::{Peak, Runoff, Saddle, SaddleKind};

/// One directed edge from a peak to its current parent.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Node {
    /// Id of the parent peak, [`Node::NULL`] if none.
    pub parent_id: i32,
    /// Id of the saddle between this peak and its parent, [`Node::NULL`]
    /// if none.
    pub saddle_id: i32,
}

impl Node {
    /// Marks an absent peak or saddle reference.
    pub const NULL: i32 = -1;
}

impl Default for Node {
    fn default() -> Self {
        Self {
            parent_id: Self::NULL,
            saddle_id: Self::NULL,
        }
    }
}

/// The core terrain graph; see the module documentation.
#[derive(Clone, Debug, PartialEq)]
pub struct DivideTree {
    coordinate_system: CoordinateSystem,
    peaks: Vec<Peak>,
    saddles: Vec<Saddle>,
    runoffs: Vec<Runoff>,
    nodes: Vec<Node>,
    /// Peak id connected to each runoff, parallel to `runoffs`.
    runoff_edges: Vec<i32>,
    /// Peak and saddle indices queued for deletion during a merge step.
    removed_peak_indices: HashSet<usize>,
    removed_saddle_indices: HashSet<usize>,
}

impl DivideTree {
    /// Creates a tree over the given peaks, saddles, and runoffs with no
    /// edges yet.
    #[must_use]
    pub fn new(
        coordinate_system: CoordinateSystem,
        peaks: Vec<Peak>,
        saddles: Vec<Saddle>,
        runoffs: Vec<Runoff>,
    ) -> Self {
        let nodes = vec![Node::default(); peaks.len() + 1];
        let runoff_edges = vec![Node::NULL; runoffs.len()];
        Self {
            coordinate_system,
            peaks,
            saddles,
            runoffs,
            nodes,
            runoff_edges,
            removed_peak_indices: HashSet::new(),
            removed_saddle_indices: HashSet::new(),
        }
    }

    pub(crate) fn from_parts(
        coordinate_system: CoordinateSystem,
        peaks: Vec<Peak>,
        saddles: Vec<Saddle>,
        runoffs: Vec<Runoff>,
        nodes: Vec<Node>,
        runoff_edges: Vec<i32>,
    ) -> Self {
        Self {
            coordinate_system,
            peaks,
            saddles,
            runoffs,
            nodes,
            runoff_edges,
            removed_peak_indices: HashSet::new(),
            removed_saddle_indices: HashSet::new(),
        }
    }

    /// Attempts to add an edge between `peak_id1` and `peak_id2` through
    /// the given saddle.
    ///
    /// If the edge would create a cycle, the edge on the cycle with the
    /// lowest saddle is removed instead, which may be the proposed edge
    /// itself. Returns the id of the removed (basin) saddle, or
    /// [`Node::NULL`] when no cycle formed.
    pub fn maybe_add_edge(&mut self, peak_id1: i32, peak_id2: i32, saddle_id: i32) -> i32 {
        let common_ancestor_id = self.find_common_ancestor(peak_id1, peak_id2);
        if common_ancestor_id == Node::NULL {
            // Two separate trees; root one of them so its parent is free.
            self.make_node_into_root(peak_id1);
            self.nodes[peak_id1 as usize].parent_id = peak_id2;
            self.nodes[peak_id1 as usize].saddle_id = saddle_id;
            return Node::NULL;
        }

        // Find the lowest saddle on the proposed cycle.
        let mut lowest_node1 = self.find_lowest_saddle_on_path(peak_id1, common_ancestor_id);
        let mut lowest_node2 = self.find_lowest_saddle_on_path(peak_id2, common_ancestor_id);

        // Make node 1 the one with a guaranteed parent and saddle.
        if lowest_node1 == Node::NULL || self.nodes[lowest_node1 as usize].saddle_id == Node::NULL {
            std::mem::swap(&mut lowest_node1, &mut lowest_node2);
        }
        if lowest_node1 == Node::NULL {
            // Degenerate request (both peaks are the ancestor); nothing to
            // break, and accepting the edge would self-loop.
            return saddle_id;
        }

        let mut lowest_saddle_node_id = lowest_node1;
        let mut lowest_saddle_id = self.nodes[lowest_node1 as usize].saddle_id;
        if lowest_node2 != Node::NULL {
            let candidate = self.nodes[lowest_node2 as usize].saddle_id;
            if self.saddle_is_lower(candidate, lowest_saddle_id) {
                lowest_saddle_node_id = lowest_node2;
                lowest_saddle_id = candidate;
            }
        }

        // If the proposed saddle is the lowest, discard the new edge.
        if self.saddle_is_lower(saddle_id, lowest_saddle_id) {
            return saddle_id;
        }

        // Break the edge with the lowest saddle.
        let basin_saddle_id = self.nodes[lowest_saddle_node_id as usize].saddle_id;
        self.nodes[lowest_saddle_node_id as usize].parent_id = Node::NULL;
        self.nodes[lowest_saddle_node_id as usize].saddle_id = Node::NULL;

        self.make_node_into_root(peak_id1);
        self.nodes[peak_id1 as usize].parent_id = peak_id2;
        self.nodes[peak_id1 as usize].saddle_id = saddle_id;
        debug!(peak_id1, peak_id2, basin_saddle_id, "replaced cycle edge");

        basin_saddle_id
    }

    /// Connects the given runoff to a peak.
    pub fn add_runoff_edge(&mut self, peak_id: i32, runoff_id: usize) {
        self.runoff_edges[runoff_id] = peak_id;
    }

    /// Shifts every location so the tree is expressed in the given
    /// coordinate system.
    ///
    /// # Errors
    /// Returns [`CoordinateSystemError::Incompatible`] when the systems
    /// differ in projection or resolution.
    pub fn set_origin(
        &mut self,
        coordinate_system: &CoordinateSystem,
    ) -> Result<(), CoordinateSystemError> {
        if !self.coordinate_system.compatible_with(coordinate_system) {
            return Err(CoordinateSystemError::Incompatible);
        }

        let offsets = self.coordinate_system.offsets_to(coordinate_system);
        let dx = offsets.x();
        let dy = offsets.y();
        debug!(dx, dy, "offsetting origin");
        for peak in &mut self.peaks {
            peak.location = peak.location.offset_by(dx, dy);
        }
        for saddle in &mut self.saddles {
            saddle.location = saddle.location.offset_by(dx, dy);
        }
        for runoff in &mut self.runoffs {
            runoff.location = runoff.location.offset_by(dx, dy);
        }

        self.coordinate_system = coordinate_system.clone();
        Ok(())
    }

    /// Deletes every false, basin, and error saddle. Purely structural; a
    /// second call is a no-op.
    pub fn compact(&mut self) {
        let removed: HashSet<usize> = self
            .saddles
            .iter()
            .enumerate()
            .filter(|(_, saddle)| {
                matches!(
                    saddle.kind,
                    SaddleKind::False | SaddleKind::Basin | SaddleKind::Error
                )
            })
            .map(|(index, _)| index)
            .collect();
        self.remove_deleted_peaks_and_saddles(&HashSet::new(), &removed);
    }

    /// Deletes all runoffs, finalising a tree that will never be merged
    /// again.
    pub fn delete_runoffs(&mut self) {
        self.runoffs.clear();
        self.runoff_edges.clear();
    }

    /// Negates every elevation so that depressions and mountains swap.
    pub fn flip_elevations(&mut self) {
        for peak in &mut self.peaks {
            peak.elevation = -peak.elevation;
        }
        for saddle in &mut self.saddles {
            saddle.elevation = -saddle.elevation;
        }
        for runoff in &mut self.runoffs {
            runoff.elevation = -runoff.elevation;
        }
    }

    /// Returns the coordinate system the tree's locations are expressed in.
    #[must_use]
    pub fn coordinate_system(&self) -> &CoordinateSystem {
        &self.coordinate_system
    }

    /// Returns the peaks; peak id `i` maps to `peaks()[i - 1]`.
    #[must_use]
    pub fn peaks(&self) -> &[Peak] {
        &self.peaks
    }

    /// Returns the saddles; saddle id `i` maps to `saddles()[i - 1]`.
    #[must_use]
    pub fn saddles(&self) -> &[Saddle] {
        &self.saddles
    }

    /// Returns the runoffs, 0-indexed.
    #[must_use]
    pub fn runoffs(&self) -> &[Runoff] {
        &self.runoffs
    }

    /// Returns the peak each runoff connects to, parallel to [`Self::runoffs`].
    #[must_use]
    pub fn runoff_edges(&self) -> &[i32] {
        &self.runoff_edges
    }

    /// Returns the parent edges; `nodes()[0]` is a sentinel.
    #[must_use]
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Replaces the saddle array, typically after the builder has
    /// reclassified saddle kinds.
    pub fn set_saddles(&mut self, saddles: Vec<Saddle>) {
        self.saddles = saddles;
    }

    /// Returns the peak with the given 1-based id.
    #[must_use]
    pub fn peak(&self, peak_id: i32) -> &Peak {
        &self.peaks[(peak_id - 1) as usize]
    }

    /// Returns the saddle with the given 1-based id.
    #[must_use]
    pub fn saddle(&self, saddle_id: i32) -> &Saddle {
        &self.saddles[(saddle_id - 1) as usize]
    }

    pub(crate) fn saddle_mut(&mut self, saddle_id: i32) -> &mut Saddle {
        &mut self.saddles[(saddle_id - 1) as usize]
    }

    /// Total order on saddles: elevation first, id breaking ties.
    fn saddle_is_lower(&self, saddle_id1: i32, saddle_id2: i32) -> bool {
        let elevation1 = self.saddle(saddle_id1).elevation;
        let elevation2 = self.saddle(saddle_id2).elevation;
        elevation1 < elevation2 || (elevation1 == elevation2 && saddle_id1 < saddle_id2)
    }

    /// Makes the given node the root of its tree by reversing the parent
    /// links above it, sliding saddles onto the reversed links.
    fn make_node_into_root(&mut self, node_id: i32) {
        let mut child_id = node_id;
        let mut parent_id = self.nodes[child_id as usize].parent_id;
        let mut saddle_id = self.nodes[child_id as usize].saddle_id;

        while parent_id != Node::NULL {
            let grandparent_id = self.nodes[parent_id as usize].parent_id;
            let displaced_saddle_id = self.nodes[parent_id as usize].saddle_id;
            self.nodes[parent_id as usize].saddle_id = saddle_id;
            self.nodes[parent_id as usize].parent_id = child_id;
            saddle_id = displaced_saddle_id;

            child_id = parent_id;
            parent_id = grandparent_id;
        }

        self.nodes[node_id as usize].parent_id = Node::NULL;
        self.nodes[node_id as usize].saddle_id = Node::NULL;
    }

    /// Returns the id of the node owning the lowest saddle on the path from
    /// `child_peak_id` up to `ancestor_peak_id`, or [`Node::NULL`] when the
    /// two coincide or the ancestor is unreachable.
    fn find_lowest_saddle_on_path(&self, child_peak_id: i32, ancestor_peak_id: i32) -> i32 {
        if child_peak_id == ancestor_peak_id {
            return Node::NULL;
        }

        let mut current = child_peak_id;
        let mut lowest_saddle_node_id = child_peak_id;
        while current != ancestor_peak_id {
            let parent_id = self.nodes[current as usize].parent_id;
            if parent_id == Node::NULL {
                debug!(child_peak_id, ancestor_peak_id, "no path to ancestor");
                return Node::NULL;
            }

            let child_saddle_id = self.nodes[current as usize].saddle_id;
            if self.saddle_is_lower(
                child_saddle_id,
                self.nodes[lowest_saddle_node_id as usize].saddle_id,
            ) {
                lowest_saddle_node_id = current;
            }

            current = parent_id;
        }

        lowest_saddle_node_id
    }

    /// Returns the lowest common ancestor of the two nodes, or
    /// [`Node::NULL`] when they live in separate trees.
    fn find_common_ancestor(&self, node_id1: i32, node_id2: i32) -> i32 {
        let mut node_id1 = node_id1;
        let mut node_id2 = node_id2;
        let mut depth1 = self.depth(node_id1);
        let mut depth2 = self.depth(node_id2);

        while depth1 > depth2 {
            node_id1 = self.nodes[node_id1 as usize].parent_id;
            if node_id1 == Node::NULL {
                break;
            }
            depth1 -= 1;
        }
        while depth2 > depth1 {
            node_id2 = self.nodes[node_id2 as usize].parent_id;
            if node_id2 == Node::NULL {
                break;
            }
            depth2 -= 1;
        }

        loop {
            if node_id1 == Node::NULL || node_id2 == Node::NULL {
                return Node::NULL;
            }
            if node_id1 == node_id2 {
                return node_id1;
            }
            node_id1 = self.nodes[node_id1 as usize].parent_id;
            node_id2 = self.nodes[node_id2 as usize].parent_id;
        }
    }

    /// Depth of a node; a root has depth 1.
    fn depth(&self, node_id: i32) -> i32 {
        let mut depth = 0;
        let mut current = node_id;
        while current != Node::NULL {
            depth += 1;
            current = self.nodes[current as usize].parent_id;
        }
        depth
    }

    /// Removes the queued peaks and saddles in one pass, renumbering every
    /// reference through deletion-offset tables.
    pub(crate) fn remove_deleted_peaks_and_saddles(
        &mut self,
        deleted_peak_indices: &HashSet<usize>,
        deleted_saddle_indices: &HashSet<usize>,
    ) {
        let peak_offsets = compute_deletion_offsets(deleted_peak_indices, self.peaks.len());
        let saddle_offsets = compute_deletion_offsets(deleted_saddle_indices, self.saddles.len());

        remove_elements_by_indices(&mut self.saddles, deleted_saddle_indices);
        remove_elements_by_indices(&mut self.peaks, deleted_peak_indices);
        // The node array is 1-indexed; drop the sentinel while compacting.
        self.nodes.remove(0);
        remove_elements_by_indices(&mut self.nodes, deleted_peak_indices);
        self.nodes.insert(0, Node::default());

        for node in &mut self.nodes {
            if node.parent_id != Node::NULL {
                node.parent_id -= peak_offsets[(node.parent_id - 1) as usize];
            }
            if node.saddle_id != Node::NULL {
                node.saddle_id -= saddle_offsets[(node.saddle_id - 1) as usize];
            }
        }
        for edge in &mut self.runoff_edges {
            if *edge != Node::NULL {
                *edge -= peak_offsets[(*edge - 1) as usize];
            }
        }
    }
}

/// Builds a table telling, for each index, how many deleted indices are at
/// or below it, so that `new_index = old_index - offsets[old_index]` for
/// every surviving index. With deletions `{3, 5, 6}` and length 9 the
/// result is `[0, 0, 0, 1, 1, 2, 3, 3, 3]`.
pub(crate) fn compute_deletion_offsets(deleted_indices: &HashSet<usize>, len: usize) -> Vec<i32> {
    let mut offsets = vec![0; len];
    if deleted_indices.is_empty() {
        return offsets;
    }

    let mut sorted: Vec<usize> = deleted_indices.iter().copied().collect();
    sorted.sort_unstable();

    let mut offset = 1;
    for pair in sorted.windows(2) {
        for entry in offsets.iter_mut().take(pair[1]).skip(pair[0]) {
            *entry = offset;
        }
        offset += 1;
    }
    if let Some(&last) = sorted.last() {
        for entry in offsets.iter_mut().skip(last) {
            *entry = offset;
        }
    }
    offsets
}

/// Drops the elements at the given indices, preserving the order of the
/// survivors.
pub(crate) fn remove_elements_by_indices<T>(values: &mut Vec<T>, deleted: &HashSet<usize>) {
    if deleted.is_empty() {
        return;
    }
    let mut index = 0;
    values.retain(|_| {
        let keep = !deleted.contains(&index);
        index += 1;
        keep
    });
}

#[cfg(test)]
mod property;
