//! Balanced bounding-box tree.
//!
//! [`RTree`] implements insertion with quadratic splitting, window search and
//! best-first nearest neighbour search on top of a [`NodeStore`]. The in-memory
//! index uses [`MemoryStore`]; the disk index plugs in a paged store and reuses
//! every algorithm here unchanged.
//!
//! Structural invariants maintained by every insert:
//!
//! - all leaves are at the same depth
//! - every child reference carries the tight union of the child's boxes
//! - every node except the root holds between `ceil(M/2)` and `M` items

mod node;
mod search;
mod split;
mod store;
mod validate;

pub use node::{ChildRef, LeafEntry, Node, NodeId};
pub use store::{MemoryStore, NodeStore};
pub(crate) use search::KnnResults;

use std::mem;

use log::trace;
use serde::{Deserialize, Serialize};

use crate::bounding_box::BoundingBox;
use crate::config::validate_capacity;
use crate::constants::{BULK_HILBERT_ORDER, DEFAULT_CAPACITY};
use crate::errors::{SpatialError, SpatialResult};
use crate::geometry::{validate_points_2d, validate_points_3d, Geometry, Point2D, Point3D, Polygon};
use crate::hilbert::sort_by_hilbert;
use crate::index::SpatialIndex;
use crate::stats::{EntryCounts, IndexStats};
use split::quadratic_split;

/// Everything about a tree besides its nodes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub(crate) struct TreeMeta {
    pub capacity: usize,
    pub root: Option<NodeId>,
    /// Levels from root to leaves, 0 for an empty tree
    pub height: u32,
    pub counts: EntryCounts,
}

impl TreeMeta {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            root: None,
            height: 0,
            counts: EntryCounts::default(),
        }
    }

    pub fn min_fill(&self) -> usize {
        self.capacity.div_ceil(2)
    }
}

/// An R-Tree over points and polygons.
///
/// # Examples
///
/// ```rust
/// use spatial_index::{BoundingBox, Point2D, RTree};
///
/// let mut tree = RTree::new(4).unwrap();
/// tree.insert_points_2d(&[
///     Point2D::new(0.0, 0.0),
///     Point2D::new(10.0, 10.0),
///     Point2D::new(20.0, 20.0),
///     Point2D::new(50.0, 50.0),
/// ])
/// .unwrap();
///
/// let hits = tree.range_query(&BoundingBox::new(0.0, 0.0, 15.0, 15.0)).unwrap();
/// assert_eq!(hits.len(), 2);
///
/// let nearest = tree.nearest_2d(&Point2D::new(12.0, 12.0), 2).unwrap();
/// assert_eq!(nearest[0].0.as_point_2d(), Some(&Point2D::new(10.0, 10.0)));
/// ```
#[derive(Debug)]
pub struct RTree<S: NodeStore = MemoryStore> {
    store: S,
    meta: TreeMeta,
}

impl RTree<MemoryStore> {
    /// Creates an empty in-memory tree with node capacity `capacity`.
    ///
    /// # Errors
    ///
    /// Returns `CapacityConfig` when `capacity` is below 2.
    pub fn new(capacity: usize) -> SpatialResult<Self> {
        validate_capacity(capacity)?;
        Ok(Self {
            store: MemoryStore::new(),
            meta: TreeMeta::new(capacity),
        })
    }
}

impl Default for RTree<MemoryStore> {
    fn default() -> Self {
        Self {
            store: MemoryStore::new(),
            meta: TreeMeta::new(DEFAULT_CAPACITY),
        }
    }
}

impl<S: NodeStore> RTree<S> {
    /// Wraps an existing store. The caller vouches that `meta` describes it.
    pub(crate) fn from_parts(store: S, meta: TreeMeta) -> Self {
        Self { store, meta }
    }

    pub(crate) fn meta(&self) -> &TreeMeta {
        &self.meta
    }

    pub(crate) fn store(&self) -> &S {
        &self.store
    }

    /// Maximum number of items per node.
    pub fn capacity(&self) -> usize {
        self.meta.capacity
    }

    /// Levels from root to leaves; 0 when empty.
    pub fn height(&self) -> u32 {
        self.meta.height
    }

    /// Number of stored geometries.
    pub fn len(&self) -> u64 {
        self.meta.counts.total()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Inserts a batch of 2D points, rejecting the whole batch if any
    /// coordinate is non-finite.
    pub fn insert_points_2d(&mut self, points: &[Point2D]) -> SpatialResult<usize> {
        validate_points_2d(points)?;
        self.insert_all(points.iter().copied().map(Geometry::Point2D).collect())
    }

    /// Inserts a batch of 3D points, rejecting the whole batch if any
    /// coordinate is non-finite.
    pub fn insert_points_3d(&mut self, points: &[Point3D]) -> SpatialResult<usize> {
        validate_points_3d(points)?;
        self.insert_all(points.iter().copied().map(Geometry::Point3D).collect())
    }

    pub fn insert_polygon(&mut self, polygon: Polygon) -> SpatialResult<()> {
        self.insert(Geometry::Polygon(polygon))
    }

    /// Inserts one geometry.
    pub fn insert(&mut self, geometry: Geometry) -> SpatialResult<()> {
        self.insert_entry(LeafEntry::new(geometry))
    }

    /// Inserts already validated geometries in Hilbert order.
    pub(crate) fn insert_all(&mut self, geometries: Vec<Geometry>) -> SpatialResult<usize> {
        let mut entries: Vec<LeafEntry> = geometries.into_iter().map(LeafEntry::new).collect();
        sort_by_hilbert(&mut entries, BULK_HILBERT_ORDER, |e| e.bbox.center());

        let count = entries.len();
        for entry in entries {
            self.insert_entry(entry)?;
        }
        Ok(count)
    }

    fn insert_entry(&mut self, entry: LeafEntry) -> SpatialResult<()> {
        let root = match self.meta.root {
            Some(root) => root,
            None => {
                let root = self.store.allocate();
                self.store.write(root, Node::empty_leaf())?;
                self.meta.root = Some(root);
                self.meta.height = 1;
                root
            }
        };

        let mut path = Vec::with_capacity(self.meta.height as usize);
        let leaf_id = self.choose_leaf(root, &entry.bbox, &mut path)?;

        let mut counts = self.meta.counts;
        counts.record(&entry.geometry);

        let mut leaf = (*self.store.read(leaf_id)?).clone();
        let Node::Leaf { entries } = &mut leaf else {
            return Err(SpatialError::corrupt(format!(
                "node {} should be a leaf",
                leaf_id
            )));
        };
        entries.push(entry);

        let mut sibling = None;
        if entries.len() > self.meta.capacity {
            let (kept, moved) = quadratic_split(mem::take(entries), self.meta.min_fill());
            *entries = kept;
            let moved = Node::Leaf { entries: moved };
            sibling = Some(self.add_node(moved)?);
            trace!("Split leaf {}", leaf_id);
        }

        let mut child_bbox = leaf.compute_bbox();
        self.store.write(leaf_id, leaf)?;

        for &(parent_id, child_idx) in path.iter().rev() {
            let mut parent = (*self.store.read(parent_id)?).clone();
            let Node::Internal { children, level } = &mut parent else {
                return Err(SpatialError::corrupt(format!(
                    "node {} should be internal",
                    parent_id
                )));
            };

            let slot = children.get_mut(child_idx).ok_or_else(|| {
                SpatialError::corrupt(format!("node {} lost child #{}", parent_id, child_idx))
            })?;
            if sibling.is_none() && slot.bbox == child_bbox {
                // Nothing above this level changes.
                break;
            }
            slot.bbox = child_bbox;

            if let Some(new_child) = sibling.take() {
                children.push(new_child);
                if children.len() > self.meta.capacity {
                    let level = *level;
                    let (kept, moved) =
                        quadratic_split(mem::take(children), self.meta.min_fill());
                    *children = kept;
                    let moved = Node::Internal {
                        children: moved,
                        level,
                    };
                    sibling = Some(self.add_node(moved)?);
                    trace!("Split internal node {} at level {}", parent_id, level);
                }
            }

            child_bbox = parent.compute_bbox();
            self.store.write(parent_id, parent)?;
        }

        if let Some(new_child) = sibling {
            let new_root = Node::Internal {
                children: vec![
                    ChildRef {
                        bbox: child_bbox,
                        node_id: root,
                    },
                    new_child,
                ],
                level: self.meta.height,
            };
            let new_root_id = self.store.allocate();
            self.store.write(new_root_id, new_root)?;
            self.meta.root = Some(new_root_id);
            self.meta.height += 1;
            trace!("Root split, height is now {}", self.meta.height);
        }

        self.meta.counts = counts;
        Ok(())
    }

    /// Stores a freshly split-off node and returns the reference to it.
    fn add_node(&mut self, node: Node) -> SpatialResult<ChildRef> {
        let bbox = node.compute_bbox();
        let node_id = self.store.allocate();
        self.store.write(node_id, node)?;
        Ok(ChildRef { bbox, node_id })
    }

    /// Descends to the leaf that should receive `bbox`, recording
    /// (node, chosen child index) for every internal node on the way.
    fn choose_leaf(
        &self,
        root: NodeId,
        bbox: &BoundingBox,
        path: &mut Vec<(NodeId, usize)>,
    ) -> SpatialResult<NodeId> {
        let mut current = root;
        loop {
            let node = self.store.read(current)?;
            match &*node {
                Node::Leaf { .. } => return Ok(current),
                Node::Internal { children, .. } => {
                    if children.is_empty() {
                        return Err(SpatialError::corrupt(format!(
                            "internal node {} has no children",
                            current
                        )));
                    }
                    let idx = self.choose_subtree(children, bbox)?;
                    path.push((current, idx));
                    current = children[idx].node_id;
                }
            }
        }
    }

    /// Least enlargement, then smallest resulting area, then fewest items.
    fn choose_subtree(&self, children: &[ChildRef], bbox: &BoundingBox) -> SpatialResult<usize> {
        let mut best_idx = 0;
        let mut best_enlargement = f64::INFINITY;
        let mut best_area = f64::INFINITY;
        let mut best_len: Option<usize> = None;

        for (i, child) in children.iter().enumerate() {
            let enlargement = child.bbox.enlargement(bbox);
            let area = child.bbox.union(bbox).area();

            let better = if enlargement != best_enlargement {
                enlargement < best_enlargement
            } else if area != best_area {
                area < best_area
            } else {
                // Only read node sizes when the cheaper criteria tie.
                let best = match best_len {
                    Some(len) => len,
                    None => self.store.read(children[best_idx].node_id)?.len(),
                };
                best_len = Some(best);
                self.store.read(child.node_id)?.len() < best
            };

            if better || i == 0 {
                best_idx = i;
                best_enlargement = enlargement;
                best_area = area;
                best_len = None;
            }
        }

        Ok(best_idx)
    }

    /// Shape summary of the tree, computed from tracked counters.
    pub fn stats(&self) -> IndexStats {
        let counts = self.meta.counts;
        let node_count = if self.meta.root.is_some() {
            self.store.node_count()
        } else {
            0
        };

        // Every node but the root is referenced from exactly one parent.
        let used = counts.total() + node_count.saturating_sub(1);
        let fill_factor = if node_count == 0 {
            0.0
        } else {
            used as f64 / (node_count as f64 * self.meta.capacity as f64)
        };

        IndexStats {
            kind: "rtree".to_string(),
            node_count,
            entry_count: counts.total(),
            height: self.meta.height,
            point_count: counts.points(),
            point_2d_count: counts.point_2d,
            point_3d_count: counts.point_3d,
            polygon_count: counts.polygon,
            fill_factor,
            cache: None,
        }
    }
}

impl<S: NodeStore> SpatialIndex for RTree<S> {
    fn insert_2d(&mut self, points: &[Point2D]) -> SpatialResult<usize> {
        self.insert_points_2d(points)
    }

    fn insert_3d(&mut self, points: &[Point3D]) -> SpatialResult<usize> {
        self.insert_points_3d(points)
    }

    fn insert_polygon(&mut self, polygon: Polygon) -> SpatialResult<()> {
        RTree::insert_polygon(self, polygon)
    }

    fn range_query_2d(&self, window: &BoundingBox) -> SpatialResult<Vec<Geometry>> {
        self.range_query(window)
    }

    fn range_query_3d(&self, window: &BoundingBox) -> SpatialResult<Vec<Point3D>> {
        RTree::range_query_3d(self, window)
    }

    fn range_query_polygons(&self, window: &BoundingBox) -> SpatialResult<Vec<Polygon>> {
        RTree::range_query_polygons(self, window)
    }

    fn knn_query_2d(&self, query: Point2D, k: usize) -> SpatialResult<Vec<(Geometry, f64)>> {
        self.nearest_2d(&query, k)
    }

    fn knn_query_3d(&self, query: Point3D, k: usize) -> SpatialResult<Vec<(Point3D, f64)>> {
        self.nearest_3d(&query, k)
    }

    fn stats(&self) -> IndexStats {
        RTree::stats(self)
    }

    fn len(&self) -> u64 {
        RTree::len(self)
    }
}
