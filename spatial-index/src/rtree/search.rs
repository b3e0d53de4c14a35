//! Window and nearest neighbour search.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use super::node::{LeafEntry, Node, NodeId};
use super::store::NodeStore;
use super::RTree;
use crate::bounding_box::BoundingBox;
use crate::errors::{SpatialError, SpatialResult};
use crate::geometry::{Geometry, Point2D, Point3D, Polygon};

impl<S: NodeStore> RTree<S> {
    /// Geometries whose footprint meets the planar window.
    ///
    /// Points (including 3D points, by projection) must lie inside the window,
    /// boundaries included; polygons match when their MBR overlaps it. Result
    /// order is unspecified.
    pub fn range_query(&self, window: &BoundingBox) -> SpatialResult<Vec<Geometry>> {
        let window = BoundingBox::new(window.min_x, window.min_y, window.max_x, window.max_y);
        let mut results = Vec::new();
        self.visit_overlapping(&window, |entry| {
            if entry.geometry.matches_window(&window) {
                results.push(entry.geometry.clone());
            }
        })?;
        Ok(results)
    }

    /// 3D points inside the window on all three axes.
    pub fn range_query_3d(&self, window: &BoundingBox) -> SpatialResult<Vec<Point3D>> {
        let mut results = Vec::new();
        self.visit_overlapping(window, |entry| {
            if let Geometry::Point3D(p) = &entry.geometry {
                if window.contains_point_3d(p) {
                    results.push(*p);
                }
            }
        })?;
        Ok(results)
    }

    /// Polygons whose MBR overlaps the planar window.
    pub fn range_query_polygons(&self, window: &BoundingBox) -> SpatialResult<Vec<Polygon>> {
        let window = BoundingBox::new(window.min_x, window.min_y, window.max_x, window.max_y);
        let mut results = Vec::new();
        self.visit_overlapping(&window, |entry| {
            if let Geometry::Polygon(poly) = &entry.geometry {
                results.push(poly.clone());
            }
        })?;
        Ok(results)
    }

    /// Depth-first walk calling `visit` for every leaf entry whose box
    /// overlaps `window`. Subtrees that miss the window are never read.
    fn visit_overlapping<F>(&self, window: &BoundingBox, mut visit: F) -> SpatialResult<()>
    where
        F: FnMut(&LeafEntry),
    {
        let Some(root) = self.meta.root else {
            return Ok(());
        };

        let mut stack = vec![root];
        while let Some(node_id) = stack.pop() {
            let node = self.store.read(node_id)?;
            match &*node {
                Node::Leaf { entries } => entries
                    .iter()
                    .filter(|e| e.bbox.overlaps(window))
                    .for_each(&mut visit),
                Node::Internal { children, .. } => stack.extend(
                    children
                        .iter()
                        .filter(|c| c.bbox.overlaps(window))
                        .map(|c| c.node_id),
                ),
            }
        }
        Ok(())
    }

    /// The `k` geometries closest to `query` in the plane, nearest first.
    ///
    /// 3D points are measured by their projection and polygons by their MBR.
    /// Entries at equal distance keep the order in which they were reached.
    pub fn nearest_2d(&self, query: &Point2D, k: usize) -> SpatialResult<Vec<(Geometry, f64)>> {
        if !query.is_finite() {
            return Err(SpatialError::invalid_geometry(format!(
                "query point {} is not finite",
                query
            )));
        }

        self.best_first(
            k,
            |bbox| bbox.min_distance_2d(query),
            |geometry| Some(geometry.distance_2d(query)),
        )
    }

    /// The `k` 3D points closest to `query`, nearest first.
    pub fn nearest_3d(&self, query: &Point3D, k: usize) -> SpatialResult<Vec<(Point3D, f64)>> {
        if !query.is_finite() {
            return Err(SpatialError::invalid_geometry(format!(
                "query point {} is not finite",
                query
            )));
        }

        let found = self.best_first(
            k,
            |bbox| bbox.min_distance_3d(query),
            |geometry| geometry.distance_3d(query),
        )?;

        Ok(found
            .into_iter()
            .filter_map(|(g, d)| g.as_point_3d().map(|p| (*p, d)))
            .collect())
    }

    /// Best-first traversal ordered by the lower bound `node_bound`.
    ///
    /// `entry_distance` returns `None` for entries the query ignores. The
    /// search stops once the closest unexplored node is farther than the
    /// current k-th result.
    fn best_first<B, D>(
        &self,
        k: usize,
        node_bound: B,
        entry_distance: D,
    ) -> SpatialResult<Vec<(Geometry, f64)>>
    where
        B: Fn(&BoundingBox) -> f64,
        D: Fn(&Geometry) -> Option<f64>,
    {
        let mut results = KnnResults::new(k);
        let Some(root) = self.meta.root else {
            return Ok(results.into_vec());
        };
        if k == 0 {
            return Ok(Vec::new());
        }

        let mut seq = 0u64;
        let mut queue = BinaryHeap::new();
        queue.push(QueueItem {
            bound: 0.0,
            seq,
            node_id: root,
        });

        while let Some(item) = queue.pop() {
            if item.bound > results.kth_distance() {
                break;
            }

            let node = self.store.read(item.node_id)?;
            match &*node {
                Node::Leaf { entries } => {
                    for entry in entries {
                        if let Some(distance) = entry_distance(&entry.geometry) {
                            results.offer(&entry.geometry, distance);
                        }
                    }
                }
                Node::Internal { children, .. } => {
                    for child in children {
                        let bound = node_bound(&child.bbox);
                        if bound <= results.kth_distance() {
                            seq += 1;
                            queue.push(QueueItem {
                                bound,
                                seq,
                                node_id: child.node_id,
                            });
                        }
                    }
                }
            }
        }

        Ok(results.into_vec())
    }
}

/// A node waiting in the best-first queue.
struct QueueItem {
    bound: f64,
    seq: u64,
    node_id: NodeId,
}

// BinaryHeap is a max-heap: reverse so the smallest bound, then the earliest
// pushed node, comes out first.
impl Ord for QueueItem {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .bound
            .total_cmp(&self.bound)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for QueueItem {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for QueueItem {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for QueueItem {}

/// At most `k` results sorted by distance.
pub(crate) struct KnnResults {
    k: usize,
    items: Vec<(Geometry, f64)>,
}

impl KnnResults {
    pub(crate) fn new(k: usize) -> Self {
        Self {
            k,
            items: Vec::with_capacity(k.min(1024)),
        }
    }

    /// Distance a new candidate has to beat; infinite until `k` are found.
    pub(crate) fn kth_distance(&self) -> f64 {
        if self.items.len() < self.k {
            f64::INFINITY
        } else {
            self.items.last().map_or(f64::INFINITY, |(_, d)| *d)
        }
    }

    pub(crate) fn offer(&mut self, geometry: &Geometry, distance: f64) {
        if self.items.len() == self.k && distance >= self.kth_distance() {
            return;
        }
        // After any equal distances, so earlier finds win ties.
        let pos = self.items.partition_point(|(_, d)| *d <= distance);
        self.items.insert(pos, (geometry.clone(), distance));
        self.items.truncate(self.k);
    }

    pub(crate) fn is_full(&self) -> bool {
        self.items.len() == self.k
    }

    pub(crate) fn into_vec(self) -> Vec<(Geometry, f64)> {
        self.items
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(x: f64, y: f64) -> Geometry {
        Geometry::Point2D(Point2D::new(x, y))
    }

    #[test]
    fn test_queue_pops_smallest_bound_first() {
        let mut heap = BinaryHeap::new();
        for (seq, bound) in [(0, 5.0), (1, 1.0), (2, 3.0), (3, 1.0)] {
            heap.push(QueueItem {
                bound,
                seq,
                node_id: seq + 1,
            });
        }
        let order: Vec<NodeId> = std::iter::from_fn(|| heap.pop().map(|i| i.node_id)).collect();
        assert_eq!(order, vec![2, 4, 3, 1]);
    }

    #[test]
    fn test_results_bounded_and_sorted() {
        let mut results = KnnResults::new(2);
        assert_eq!(results.kth_distance(), f64::INFINITY);

        results.offer(&point(3.0, 0.0), 3.0);
        results.offer(&point(1.0, 0.0), 1.0);
        assert_eq!(results.kth_distance(), 3.0);

        results.offer(&point(2.0, 0.0), 2.0);
        results.offer(&point(9.0, 0.0), 9.0);
        let items = results.into_vec();
        assert_eq!(items, vec![(point(1.0, 0.0), 1.0), (point(2.0, 0.0), 2.0)]);
    }

    #[test]
    fn test_results_ties_keep_first_seen() {
        let mut results = KnnResults::new(2);
        results.offer(&point(1.0, 0.0), 1.0);
        results.offer(&point(0.0, 1.0), 1.0);
        results.offer(&point(-1.0, 0.0), 1.0);
        let items = results.into_vec();
        assert_eq!(items[0].0, point(1.0, 0.0));
        assert_eq!(items[1].0, point(0.0, 1.0));
    }
}
