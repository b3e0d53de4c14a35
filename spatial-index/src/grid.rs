//! Uniform grid index.
//!
//! The plane is cut into square cells of a configured edge length and every
//! geometry is bucketed by the cells its footprint touches. Only occupied
//! cells are stored, so the grid is unbounded. Lookups cost O(1) per cell,
//! which makes the grid a good fit for dense, evenly spread data and a poor
//! one for sparse or skewed data.

use std::collections::{HashMap, HashSet};

use log::debug;

use crate::bounding_box::BoundingBox;
use crate::constants::DEFAULT_CELL_SIZE;
use crate::errors::{SpatialError, SpatialResult};
use crate::geometry::{validate_points_2d, validate_points_3d, Geometry, Point2D, Point3D, Polygon};
use crate::index::SpatialIndex;
use crate::rtree::{KnnResults, LeafEntry};
use crate::stats::{EntryCounts, IndexStats};

/// Polygons covering more cells than this are kept in a side list that every
/// query checks directly.
const MAX_POLYGON_CELLS: i128 = 4096;

/// A rectangle whose area in cells exceeds the occupied cell count by this
/// factor is scanned through the cell map instead of cell by cell.
const SPARSE_FACTOR: i128 = 4;

type CellKey = (i64, i64);

/// Inclusive range of cell coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct CellRange {
    min_x: i64,
    min_y: i64,
    max_x: i64,
    max_y: i64,
}

impl CellRange {
    fn single(key: CellKey) -> Self {
        Self {
            min_x: key.0,
            min_y: key.1,
            max_x: key.0,
            max_y: key.1,
        }
    }

    fn union(&self, other: &CellRange) -> CellRange {
        CellRange {
            min_x: self.min_x.min(other.min_x),
            min_y: self.min_y.min(other.min_y),
            max_x: self.max_x.max(other.max_x),
            max_y: self.max_y.max(other.max_y),
        }
    }

    fn intersect(&self, other: &CellRange) -> Option<CellRange> {
        let range = CellRange {
            min_x: self.min_x.max(other.min_x),
            min_y: self.min_y.max(other.min_y),
            max_x: self.max_x.min(other.max_x),
            max_y: self.max_y.min(other.max_y),
        };
        (range.min_x <= range.max_x && range.min_y <= range.max_y).then_some(range)
    }

    fn contains(&self, key: &CellKey) -> bool {
        key.0 >= self.min_x && key.0 <= self.max_x && key.1 >= self.min_y && key.1 <= self.max_y
    }

    fn cell_count(&self) -> i128 {
        (self.max_x as i128 - self.min_x as i128 + 1) * (self.max_y as i128 - self.min_y as i128 + 1)
    }
}

/// Spatial hash over points and polygons.
///
/// # Examples
///
/// ```rust
/// use spatial_index::{BoundingBox, GridIndex, Point2D};
///
/// let mut grid = GridIndex::new(10.0).unwrap();
/// grid.insert_points_2d(&[Point2D::new(1.0, 1.0), Point2D::new(25.0, 3.0)]).unwrap();
///
/// let hits = grid.range_query(&BoundingBox::new(0.0, 0.0, 5.0, 5.0));
/// assert_eq!(hits.len(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct GridIndex {
    cell_size: f64,
    entries: Vec<LeafEntry>,
    cells: HashMap<CellKey, Vec<usize>>,
    wide_polygons: Vec<usize>,
    occupied: Option<CellRange>,
    counts: EntryCounts,
}

impl Default for GridIndex {
    fn default() -> Self {
        Self::with_cell_size(DEFAULT_CELL_SIZE)
    }
}

impl GridIndex {
    /// Creates an empty grid with square cells of edge `cell_size`.
    ///
    /// # Errors
    ///
    /// Returns `CapacityConfig` if `cell_size` is not a positive finite number.
    pub fn new(cell_size: f64) -> SpatialResult<Self> {
        if !(cell_size.is_finite() && cell_size > 0.0) {
            return Err(SpatialError::capacity(format!(
                "cell size must be a positive finite number, got {}",
                cell_size
            )));
        }
        Ok(Self::with_cell_size(cell_size))
    }

    fn with_cell_size(cell_size: f64) -> Self {
        Self {
            cell_size,
            entries: Vec::new(),
            cells: HashMap::new(),
            wide_polygons: Vec::new(),
            occupied: None,
            counts: EntryCounts::default(),
        }
    }

    pub fn cell_size(&self) -> f64 {
        self.cell_size
    }

    pub fn len(&self) -> u64 {
        self.counts.total()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Stored geometries in insertion order.
    pub fn geometries(&self) -> impl Iterator<Item = &Geometry> {
        self.entries.iter().map(|e| &e.geometry)
    }

    fn cell_coord(&self, v: f64) -> i64 {
        (v / self.cell_size).floor() as i64
    }

    fn cell_of(&self, p: &Point2D) -> CellKey {
        (self.cell_coord(p.x), self.cell_coord(p.y))
    }

    fn cells_covering(&self, bbox: &BoundingBox) -> CellRange {
        CellRange {
            min_x: self.cell_coord(bbox.min_x),
            min_y: self.cell_coord(bbox.min_y),
            max_x: self.cell_coord(bbox.max_x),
            max_y: self.cell_coord(bbox.max_y),
        }
    }

    /// Inserts a batch of 2D points; the batch is rejected whole if any
    /// coordinate is non-finite.
    pub fn insert_points_2d(&mut self, points: &[Point2D]) -> SpatialResult<usize> {
        validate_points_2d(points)?;
        for p in points {
            self.push_point(Geometry::Point2D(*p), self.cell_of(p));
        }
        Ok(points.len())
    }

    /// Inserts a batch of 3D points, bucketed by their xy projection.
    pub fn insert_points_3d(&mut self, points: &[Point3D]) -> SpatialResult<usize> {
        validate_points_3d(points)?;
        for p in points {
            self.push_point(Geometry::Point3D(*p), self.cell_of(&p.to_2d()));
        }
        Ok(points.len())
    }

    /// Inserts a polygon into every cell its MBR covers.
    pub fn insert_polygon(&mut self, polygon: Polygon) -> SpatialResult<()> {
        let range = self.cells_covering(&polygon.bounding_box());
        let idx = self.push_entry(Geometry::Polygon(polygon));

        if range.cell_count() > MAX_POLYGON_CELLS {
            debug!(
                "Polygon spans {} cells, keeping it outside the grid",
                range.cell_count()
            );
            self.wide_polygons.push(idx);
        } else {
            for cx in range.min_x..=range.max_x {
                for cy in range.min_y..=range.max_y {
                    self.cells.entry((cx, cy)).or_default().push(idx);
                }
            }
        }
        self.mark_occupied(range);
        Ok(())
    }

    fn push_point(&mut self, geometry: Geometry, key: CellKey) {
        let idx = self.push_entry(geometry);
        self.cells.entry(key).or_default().push(idx);
        self.mark_occupied(CellRange::single(key));
    }

    fn push_entry(&mut self, geometry: Geometry) -> usize {
        self.counts.record(&geometry);
        self.entries.push(LeafEntry::new(geometry));
        self.entries.len() - 1
    }

    fn mark_occupied(&mut self, range: CellRange) {
        self.occupied = Some(match self.occupied {
            Some(occupied) => occupied.union(&range),
            None => range,
        });
    }

    /// Geometries meeting the planar window: points inside it (3D points by
    /// projection), polygons whose MBR overlaps it.
    pub fn range_query(&self, window: &BoundingBox) -> Vec<Geometry> {
        let window = BoundingBox::new(window.min_x, window.min_y, window.max_x, window.max_y);
        self.collect_in_window(&window, |g| g.matches_window(&window))
            .into_iter()
            .cloned()
            .collect()
    }

    /// 3D points inside the window on all three axes.
    pub fn range_query_3d(&self, window: &BoundingBox) -> Vec<Point3D> {
        self.collect_in_window(window, |g| {
            g.as_point_3d().is_some_and(|p| window.contains_point_3d(p))
        })
        .into_iter()
        .filter_map(|g| g.as_point_3d().copied())
        .collect()
    }

    /// Polygons whose MBR overlaps the planar window.
    pub fn range_query_polygons(&self, window: &BoundingBox) -> Vec<Polygon> {
        let window = BoundingBox::new(window.min_x, window.min_y, window.max_x, window.max_y);
        self.collect_in_window(&window, |g| {
            g.as_polygon().is_some() && g.matches_window(&window)
        })
        .into_iter()
        .filter_map(|g| g.as_polygon().cloned())
        .collect()
    }

    /// Scans the cells under `window`, each entry at most once.
    fn collect_in_window<F>(&self, window: &BoundingBox, keep: F) -> Vec<&Geometry>
    where
        F: Fn(&Geometry) -> bool,
    {
        let mut results = Vec::new();
        if window.is_empty() {
            return results;
        }
        let Some(range) = self
            .occupied
            .and_then(|occupied| occupied.intersect(&self.cells_covering(window)))
        else {
            return results;
        };

        let mut seen_polygons = HashSet::new();
        let mut take = |idx: usize| {
            let entry = &self.entries[idx];
            if matches!(entry.geometry, Geometry::Polygon(_)) && !seen_polygons.insert(idx) {
                return;
            }
            if keep(&entry.geometry) {
                results.push(&entry.geometry);
            }
        };

        if range.cell_count() > SPARSE_FACTOR * self.cells.len() as i128 {
            for (key, bucket) in &self.cells {
                if range.contains(key) {
                    bucket.iter().copied().for_each(&mut take);
                }
            }
        } else {
            for cx in range.min_x..=range.max_x {
                for cy in range.min_y..=range.max_y {
                    if let Some(bucket) = self.cells.get(&(cx, cy)) {
                        bucket.iter().copied().for_each(&mut take);
                    }
                }
            }
        }

        self.wide_polygons.iter().copied().for_each(take);
        results
    }

    /// The `k` geometries nearest to `query` in the plane.
    ///
    /// Cells are visited in square rings around the query cell. Once `k`
    /// candidates are known the next ring is always scanned, since a closer
    /// entry may sit just across a cell border; after that, rings are scanned
    /// only while their nearest possible point could still beat the k-th
    /// candidate.
    pub fn nearest_2d(&self, query: &Point2D, k: usize) -> SpatialResult<Vec<(Geometry, f64)>> {
        if !query.is_finite() {
            return Err(SpatialError::invalid_geometry(format!(
                "query point {} is not finite",
                query
            )));
        }
        Ok(self.ring_search(query, k, |g| Some(g.distance_2d(query))))
    }

    /// The `k` 3D points nearest to `query`, searched by rings in the plane.
    pub fn nearest_3d(&self, query: &Point3D, k: usize) -> SpatialResult<Vec<(Point3D, f64)>> {
        if !query.is_finite() {
            return Err(SpatialError::invalid_geometry(format!(
                "query point {} is not finite",
                query
            )));
        }
        Ok(self
            .ring_search(&query.to_2d(), k, |g| g.distance_3d(query))
            .into_iter()
            .filter_map(|(g, d)| g.as_point_3d().map(|p| (*p, d)))
            .collect())
    }

    fn ring_search<D>(&self, query: &Point2D, k: usize, distance: D) -> Vec<(Geometry, f64)>
    where
        D: Fn(&Geometry) -> Option<f64>,
    {
        let mut results = KnnResults::new(k);
        let Some(occupied) = self.occupied else {
            return results.into_vec();
        };
        if k == 0 {
            return Vec::new();
        }

        let mut seen_polygons = HashSet::new();
        let mut offer = |idx: usize, results: &mut KnnResults| {
            let entry = &self.entries[idx];
            if matches!(entry.geometry, Geometry::Polygon(_)) && !seen_polygons.insert(idx) {
                return;
            }
            if let Some(d) = distance(&entry.geometry) {
                results.offer(&entry.geometry, d);
            }
        };

        for &idx in &self.wide_polygons {
            offer(idx, &mut results);
        }

        if occupied.cell_count() > SPARSE_FACTOR * self.cells.len() as i128 {
            // Rings would mostly hit empty cells; a linear pass is cheaper.
            for idx in 0..self.entries.len() {
                offer(idx, &mut results);
            }
            return results.into_vec();
        }

        // A query far outside the data is pulled next to it; rings then cover
        // the occupied range in a bounded number of steps.
        let center = clamp_near(self.cell_of(query), &occupied);
        let first_ring = chebyshev_gap(center, &occupied);
        let last_ring = chebyshev_reach(center, &occupied);
        let mut filled_at: Option<i64> = None;

        for r in first_ring..=last_ring {
            if let Some(filled) = filled_at {
                if r > filled.saturating_add(1) && self.ring_bound(query, center, r) >= results.kth_distance() {
                    break;
                }
            }

            for key in ring_cells(center, r, &occupied) {
                if let Some(bucket) = self.cells.get(&key) {
                    for &idx in bucket {
                        offer(idx, &mut results);
                    }
                }
            }

            if filled_at.is_none() && results.is_full() {
                filled_at = Some(r);
            }
        }

        results.into_vec()
    }

    /// Smallest planar distance from `query` to any cell of ring `r` or
    /// beyond. Zero when `query` lies outside the block of rings `0..r`.
    fn ring_bound(&self, query: &Point2D, center: CellKey, r: i64) -> f64 {
        if r == 0 {
            return 0.0;
        }
        let (cx, cy, r) = (center.0 as i128, center.1 as i128, r as i128);
        let low_x = (cx - r + 1) as f64 * self.cell_size;
        let high_x = (cx + r) as f64 * self.cell_size;
        let low_y = (cy - r + 1) as f64 * self.cell_size;
        let high_y = (cy + r) as f64 * self.cell_size;
        (query.x - low_x)
            .min(high_x - query.x)
            .min(query.y - low_y)
            .min(high_y - query.y)
            .max(0.0)
    }

    /// Occupied cells as nodes; a grid is one level deep.
    pub fn stats(&self) -> IndexStats {
        let empty = self.entries.is_empty();
        IndexStats {
            kind: "grid".to_string(),
            node_count: self.cells.len() as u64,
            entry_count: self.counts.total(),
            height: if empty { 0 } else { 1 },
            point_count: self.counts.points(),
            point_2d_count: self.counts.point_2d,
            point_3d_count: self.counts.point_3d,
            polygon_count: self.counts.polygon,
            fill_factor: if empty { 0.0 } else { 1.0 },
            cache: None,
        }
    }
}

/// `key` moved to within one cell of `range`.
fn clamp_near(key: CellKey, range: &CellRange) -> CellKey {
    (
        key.0.clamp(range.min_x.saturating_sub(1), range.max_x.saturating_add(1)),
        key.1.clamp(range.min_y.saturating_sub(1), range.max_y.saturating_add(1)),
    )
}

fn saturate(v: i128) -> i64 {
    v.clamp(i64::MIN as i128, i64::MAX as i128) as i64
}

/// Rings closer than this contain no occupied cell.
fn chebyshev_gap(center: CellKey, range: &CellRange) -> i64 {
    let (cx, cy) = (center.0 as i128, center.1 as i128);
    let dx = (range.min_x as i128 - cx).max(cx - range.max_x as i128).max(0);
    let dy = (range.min_y as i128 - cy).max(cy - range.max_y as i128).max(0);
    saturate(dx.max(dy))
}

/// Ring beyond which no occupied cell exists.
fn chebyshev_reach(center: CellKey, range: &CellRange) -> i64 {
    let (cx, cy) = (center.0 as i128, center.1 as i128);
    saturate(
        (cx - range.min_x as i128)
            .abs()
            .max((range.max_x as i128 - cx).abs())
            .max((cy - range.min_y as i128).abs())
            .max((range.max_y as i128 - cy).abs()),
    )
}

/// Cells at Chebyshev distance `r` from `center`, clipped to `bounds`.
fn ring_cells(center: CellKey, r: i64, bounds: &CellRange) -> Vec<CellKey> {
    if r == 0 {
        return vec![center];
    }

    let mut cells = Vec::new();
    let (cx, cy, r) = (center.0 as i128, center.1 as i128, r as i128);
    let (min_x, max_x) = (bounds.min_x as i128, bounds.max_x as i128);
    let (min_y, max_y) = (bounds.min_y as i128, bounds.max_y as i128);

    // Clipped to `bounds`, so every coordinate below fits an i64.
    let x_lo = (cx - r).max(min_x) as i64;
    let x_hi = (cx + r).min(max_x) as i64;
    let y_lo = (cy - r + 1).max(min_y) as i64;
    let y_hi = (cy + r - 1).min(max_y) as i64;

    for y in [cy - r, cy + r] {
        if y >= min_y && y <= max_y {
            cells.extend((x_lo..=x_hi).map(|x| (x, y as i64)));
        }
    }
    for x in [cx - r, cx + r] {
        if x >= min_x && x <= max_x {
            cells.extend((y_lo..=y_hi).map(|y| (x as i64, y)));
        }
    }
    cells
}

impl SpatialIndex for GridIndex {
    fn insert_2d(&mut self, points: &[Point2D]) -> SpatialResult<usize> {
        self.insert_points_2d(points)
    }

    fn insert_3d(&mut self, points: &[Point3D]) -> SpatialResult<usize> {
        self.insert_points_3d(points)
    }

    fn insert_polygon(&mut self, polygon: Polygon) -> SpatialResult<()> {
        GridIndex::insert_polygon(self, polygon)
    }

    fn range_query_2d(&self, window: &BoundingBox) -> SpatialResult<Vec<Geometry>> {
        Ok(self.range_query(window))
    }

    fn range_query_3d(&self, window: &BoundingBox) -> SpatialResult<Vec<Point3D>> {
        Ok(GridIndex::range_query_3d(self, window))
    }

    fn range_query_polygons(&self, window: &BoundingBox) -> SpatialResult<Vec<Polygon>> {
        Ok(GridIndex::range_query_polygons(self, window))
    }

    fn knn_query_2d(&self, query: Point2D, k: usize) -> SpatialResult<Vec<(Geometry, f64)>> {
        self.nearest_2d(&query, k)
    }

    fn knn_query_3d(&self, query: Point3D, k: usize) -> SpatialResult<Vec<(Point3D, f64)>> {
        self.nearest_3d(&query, k)
    }

    fn stats(&self) -> IndexStats {
        GridIndex::stats(self)
    }

    fn len(&self) -> u64 {
        GridIndex::len(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn triangle() -> Polygon {
        Polygon::new(vec![
            Point2D::new(10.0, 10.0),
            Point2D::new(30.0, 10.0),
            Point2D::new(20.0, 30.0),
        ])
        .unwrap()
    }

    fn sorted(mut points: Vec<(f64, f64)>) -> Vec<(f64, f64)> {
        points.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.total_cmp(&b.1)));
        points
    }

    fn xy(geometries: &[Geometry]) -> Vec<(f64, f64)> {
        sorted(
            geometries
                .iter()
                .filter_map(|g| g.as_point_2d().map(|p| (p.x, p.y)))
                .collect(),
        )
    }

    #[test]
    fn test_rejects_bad_cell_size() {
        assert_eq!(GridIndex::new(0.0).unwrap_err().kind(), ErrorKind::CapacityConfig);
        assert_eq!(GridIndex::new(f64::NAN).unwrap_err().kind(), ErrorKind::CapacityConfig);
    }

    #[test]
    fn test_range_query_filters_exactly() {
        let mut grid = GridIndex::new(10.0).unwrap();
        grid.insert_points_2d(&[
            Point2D::new(0.0, 0.0),
            Point2D::new(10.0, 10.0),
            Point2D::new(20.0, 20.0),
            Point2D::new(50.0, 50.0),
            Point2D::new(-3.0, 14.9),
        ])
        .unwrap();

        let hits = grid.range_query(&BoundingBox::new(0.0, 0.0, 15.0, 15.0));
        assert_eq!(xy(&hits), vec![(0.0, 0.0), (10.0, 10.0)]);

        let hits = grid.range_query(&BoundingBox::new(-5.0, 10.0, 10.0, 15.0));
        assert_eq!(xy(&hits), vec![(-3.0, 14.9), (10.0, 10.0)]);
    }

    #[test]
    fn test_range_query_huge_window() {
        let mut grid = GridIndex::new(1.0).unwrap();
        grid.insert_points_2d(&[Point2D::new(0.5, 0.5), Point2D::new(1e6, -1e6)]).unwrap();
        let hits = grid.range_query(&BoundingBox::new(-1e12, -1e12, 1e12, 1e12));
        assert_eq!(hits.len(), 2);
    }

    #[test]
    fn test_polygon_reported_once() {
        let mut grid = GridIndex::new(5.0).unwrap();
        grid.insert_polygon(triangle()).unwrap();

        let hits = grid.range_query(&BoundingBox::new(0.0, 0.0, 40.0, 40.0));
        assert_eq!(hits, vec![Geometry::Polygon(triangle())]);
        assert!(grid.range_query(&BoundingBox::new(0.0, 0.0, 5.0, 5.0)).is_empty());
        assert_eq!(grid.range_query_polygons(&BoundingBox::new(25.0, 25.0, 26.0, 26.0)).len(), 1);
    }

    #[test]
    fn test_wide_polygon_is_still_found() {
        let mut grid = GridIndex::new(1.0).unwrap();
        let wide = Polygon::new(vec![
            Point2D::new(-1000.0, -1000.0),
            Point2D::new(1000.0, -1000.0),
            Point2D::new(0.0, 1000.0),
        ])
        .unwrap();
        grid.insert_polygon(wide.clone()).unwrap();
        grid.insert_points_2d(&[Point2D::new(3.0, 3.0)]).unwrap();

        assert_eq!(grid.range_query_polygons(&BoundingBox::new(0.0, 0.0, 1.0, 1.0)), vec![wide]);
        let nearest = grid.nearest_2d(&Point2D::new(3.0, 3.0), 2).unwrap();
        assert_eq!(nearest.len(), 2);
        assert_eq!(nearest[0].1, 0.0);
    }

    #[test]
    fn test_knn_across_cell_border() {
        // The query sits at the right edge of its cell; the nearest point is
        // just across the border while a farther one shares the query cell.
        let mut grid = GridIndex::new(10.0).unwrap();
        grid.insert_points_2d(&[Point2D::new(0.5, 5.0), Point2D::new(10.2, 5.0)]).unwrap();

        let result = grid.nearest_2d(&Point2D::new(9.9, 5.0), 1).unwrap();
        assert_eq!(result[0].0, Geometry::Point2D(Point2D::new(10.2, 5.0)));
    }

    #[test]
    fn test_knn_matches_brute_force() {
        let mut rng = StdRng::seed_from_u64(99);
        let points: Vec<Point2D> = (0..2000)
            .map(|_| Point2D::new(rng.gen_range(0.0..300.0), rng.gen_range(0.0..300.0)))
            .collect();
        let mut grid = GridIndex::new(7.5).unwrap();
        grid.insert_points_2d(&points).unwrap();

        for k in [1, 4, 25, 200] {
            let q = Point2D::new(rng.gen_range(-50.0..350.0), rng.gen_range(-50.0..350.0));
            let result = grid.nearest_2d(&q, k).unwrap();
            assert_eq!(result.len(), k);
            assert!(result.windows(2).all(|w| w[0].1 <= w[1].1));

            let mut brute: Vec<f64> = points.iter().map(|p| p.distance(&q)).collect();
            brute.sort_by(f64::total_cmp);
            assert_eq!(result[k - 1].1, brute[k - 1]);
        }
    }

    #[test]
    fn test_knn_sparse_grid_falls_back_to_scan() {
        let mut grid = GridIndex::new(1.0).unwrap();
        grid.insert_points_2d(&[
            Point2D::new(0.0, 0.0),
            Point2D::new(5000.0, 5000.0),
            Point2D::new(-4000.0, 10.0),
        ])
        .unwrap();
        let result = grid.nearest_2d(&Point2D::new(-3000.0, 0.0), 2).unwrap();
        assert_eq!(result[0].0, Geometry::Point2D(Point2D::new(-4000.0, 10.0)));
        assert_eq!(result[1].0, Geometry::Point2D(Point2D::new(0.0, 0.0)));
    }

    #[test]
    fn test_knn_fewer_points_than_k() {
        let mut grid = GridIndex::default();
        grid.insert_points_2d(&[Point2D::new(1.0, 1.0), Point2D::new(2.0, 2.0)]).unwrap();
        assert_eq!(grid.nearest_2d(&Point2D::new(0.0, 0.0), 5).unwrap().len(), 2);
        assert!(GridIndex::default().nearest_2d(&Point2D::new(0.0, 0.0), 5).unwrap().is_empty());
    }

    #[test]
    fn test_3d_points() {
        let mut grid = GridIndex::new(10.0).unwrap();
        grid.insert_points_3d(&[
            Point3D::new(1.0, 1.0, 1.0),
            Point3D::new(1.0, 1.0, 50.0),
            Point3D::new(30.0, 1.0, 0.0),
        ])
        .unwrap();

        let cube = BoundingBox::new_3d(0.0, 0.0, 0.0, 5.0, 5.0, 10.0);
        assert_eq!(grid.range_query_3d(&cube), vec![Point3D::new(1.0, 1.0, 1.0)]);
        assert_eq!(grid.range_query(&BoundingBox::new(0.0, 0.0, 5.0, 5.0)).len(), 2);

        let nearest = grid.nearest_3d(&Point3D::new(1.0, 1.0, 40.0), 1).unwrap();
        assert_eq!(nearest, vec![(Point3D::new(1.0, 1.0, 50.0), 10.0)]);
    }

    #[test]
    fn test_stats() {
        let mut grid = GridIndex::new(10.0).unwrap();
        assert_eq!(grid.stats().height, 0);
        assert_eq!(grid.stats().fill_factor, 0.0);

        grid.insert_points_2d(&[Point2D::new(1.0, 1.0), Point2D::new(2.0, 2.0), Point2D::new(15.0, 1.0)])
            .unwrap();
        let stats = grid.stats();
        assert_eq!(stats.kind, "grid");
        assert_eq!(stats.node_count, 2);
        assert_eq!(stats.entry_count, 3);
        assert_eq!(stats.height, 1);
        assert_eq!(stats.fill_factor, 1.0);
    }

    #[test]
    fn test_knn_far_away_query() {
        let mut grid = GridIndex::new(1.0).unwrap();
        let points: Vec<Point2D> = (0..10)
            .flat_map(|x| (0..10).map(move |y| Point2D::new(x as f64, y as f64)))
            .collect();
        grid.insert_points_2d(&points).unwrap();

        // Cells of these queries lie outside the i64 range of ring arithmetic.
        for (q, k) in [
            (Point2D::new(-1e20, 0.0), 1),
            (Point2D::new(-5e18, 0.0), 1),
            (Point2D::new(1e20, 1e20), 3),
            (Point2D::new(4.2, -9e18), 2),
        ] {
            let result = grid.nearest_2d(&q, k).unwrap();
            assert_eq!(result.len(), k);
            let nearest = points.iter().map(|p| p.distance(&q)).fold(f64::INFINITY, f64::min);
            assert_eq!(result[0].1, nearest);
        }
    }

    #[test]
    fn test_knn_data_at_extreme_coordinates() {
        let mut grid = GridIndex::new(1.0).unwrap();
        // Cells saturate at the ends of the i64 range.
        grid.insert_points_2d(&[Point2D::new(-1e30, 0.0), Point2D::new(-1e30, 1.0)]).unwrap();

        let result = grid.nearest_2d(&Point2D::new(1e30, 0.0), 2).unwrap();
        assert_eq!(result.len(), 2);
        let result = grid.nearest_2d(&Point2D::new(-1e30, 0.2), 1).unwrap();
        assert_eq!(result[0].0, Geometry::Point2D(Point2D::new(-1e30, 0.0)));
    }

    #[test]
    fn test_ring_cells_at_range_edge() {
        let bounds = CellRange {
            min_x: i64::MIN,
            min_y: i64::MIN,
            max_x: i64::MIN + 2,
            max_y: i64::MIN + 2,
        };
        let ring = ring_cells((i64::MIN, i64::MIN), 2, &bounds);
        assert_eq!(ring.len(), 5);
        assert_eq!(chebyshev_reach((i64::MAX, i64::MAX), &bounds), i64::MAX);
        assert_eq!(chebyshev_gap((i64::MIN, i64::MIN), &bounds), 0);
    }

    #[test]
    fn test_ring_cells_cover_ring_once() {
        let bounds = CellRange {
            min_x: -100,
            min_y: -100,
            max_x: 100,
            max_y: 100,
        };
        let ring = ring_cells((0, 0), 2, &bounds);
        assert_eq!(ring.len(), 16);
        let unique: HashSet<_> = ring.iter().collect();
        assert_eq!(unique.len(), 16);
        assert!(ring.iter().all(|(x, y)| x.abs().max(y.abs()) == 2));
    }
}
