//! Structural checks over a whole tree.

use super::node::{Node, NodeId};
use super::store::NodeStore;
use super::RTree;
use crate::bounding_box::BoundingBox;
use crate::errors::{SpatialError, SpatialResult};
use crate::geometry::Geometry;
use crate::stats::EntryCounts;

impl<S: NodeStore> RTree<S> {
    /// Walks every node and verifies the tree's structural invariants.
    ///
    /// Checked: all leaves sit at the tracked height, every child reference
    /// carries the exact union of its child's boxes, every non-root node holds
    /// between `ceil(M/2)` and `M` items, leaf entry boxes match their
    /// geometry, and the per-kind entry totals match the tracked counts.
    ///
    /// # Errors
    ///
    /// Returns `CorruptIndex` describing the first violation found.
    pub fn check_invariants(&self) -> SpatialResult<()> {
        let meta = &self.meta;
        let Some(root) = meta.root else {
            if meta.height != 0 || meta.counts.total() != 0 {
                return Err(SpatialError::corrupt(format!(
                    "empty tree claims height {} and {} entries",
                    meta.height,
                    meta.counts.total()
                )));
            }
            return Ok(());
        };

        if meta.height == 0 {
            return Err(SpatialError::corrupt("tree with a root has height 0"));
        }

        let node_count = self.store.node_count();
        let mut seen = EntryCounts::default();
        let mut stack: Vec<(NodeId, u32, Option<BoundingBox>)> = vec![(root, 1, None)];

        while let Some((node_id, depth, expected_bbox)) = stack.pop() {
            if node_id == 0 || node_id > node_count {
                return Err(SpatialError::corrupt(format!(
                    "reference to unallocated node {}",
                    node_id
                )));
            }

            let node = self.store.read(node_id)?;
            let is_root = node_id == root;
            self.check_fill(node_id, &node, is_root)?;

            if let Some(expected) = expected_bbox {
                if node.compute_bbox() != expected {
                    return Err(SpatialError::corrupt(format!(
                        "node {} is not bounded by its parent's box {}",
                        node_id, expected
                    )));
                }
            }

            match &*node {
                Node::Leaf { entries } => {
                    if depth != meta.height {
                        return Err(SpatialError::corrupt(format!(
                            "leaf {} at depth {} but tree height is {}",
                            node_id, depth, meta.height
                        )));
                    }
                    for entry in entries {
                        check_entry(node_id, &entry.geometry, &entry.bbox)?;
                        seen.record(&entry.geometry);
                    }
                }
                Node::Internal { children, level } => {
                    if depth >= meta.height || *level != meta.height - depth {
                        return Err(SpatialError::corrupt(format!(
                            "internal node {} has level {} at depth {} of {}",
                            node_id, level, depth, meta.height
                        )));
                    }
                    stack.extend(
                        children
                            .iter()
                            .map(|c| (c.node_id, depth + 1, Some(c.bbox))),
                    );
                }
            }
        }

        if seen != meta.counts {
            return Err(SpatialError::corrupt(format!(
                "tree holds {} entries but {} are recorded",
                seen.total(),
                meta.counts.total()
            )));
        }

        Ok(())
    }

    fn check_fill(&self, node_id: NodeId, node: &Node, is_root: bool) -> SpatialResult<()> {
        let len = node.len();
        let capacity = self.meta.capacity;
        let min = match (is_root, node) {
            (true, Node::Leaf { .. }) => 1,
            (true, Node::Internal { .. }) => 2,
            (false, _) => self.meta.min_fill(),
        };

        if len > capacity || len < min {
            return Err(SpatialError::corrupt(format!(
                "node {} holds {} items, expected {}..={}",
                node_id, len, min, capacity
            )));
        }
        Ok(())
    }
}

fn check_entry(node_id: NodeId, geometry: &Geometry, bbox: &BoundingBox) -> SpatialResult<()> {
    let actual = match geometry {
        Geometry::Polygon(poly) => {
            if poly.vertices().len() < 3 {
                return Err(SpatialError::corrupt(format!(
                    "polygon in leaf {} has {} vertices",
                    node_id,
                    poly.vertices().len()
                )));
            }
            let computed = poly.computed_bounding_box();
            if computed != poly.bounding_box() {
                return Err(SpatialError::corrupt(format!(
                    "polygon in leaf {} carries a stale MBR",
                    node_id
                )));
            }
            computed
        }
        other => other.bounding_box(),
    };

    if actual != *bbox {
        return Err(SpatialError::corrupt(format!(
            "entry box {} in leaf {} does not match its geometry",
            bbox, node_id
        )));
    }
    Ok(())
}
