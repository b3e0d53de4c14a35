//! The operations every index variant offers, and a handle to pick one at
//! runtime.

use std::path::Path;

use log::{debug, info};

use crate::bounding_box::BoundingBox;
use crate::config::{IndexConfig, IndexKind};
use crate::constants::DEFAULT_CAPACITY;
use crate::disk::{write_snapshot, DiskRTreeIndex};
use crate::errors::SpatialResult;
use crate::geometry::{Geometry, Point2D, Point3D, Polygon};
use crate::grid::GridIndex;
use crate::rtree::RTree;
use crate::stats::IndexStats;

/// Insert, query and introspection operations shared by all index variants.
///
/// Queries take `&self` and may run concurrently on an index that is not
/// being mutated. Inserts need exclusive access.
pub trait SpatialIndex {
    /// Inserts a batch of planar points and returns how many were stored.
    ///
    /// A batch containing any non-finite coordinate is rejected whole.
    fn insert_2d(&mut self, points: &[Point2D]) -> SpatialResult<usize>;

    /// Inserts a batch of 3D points and returns how many were stored.
    fn insert_3d(&mut self, points: &[Point3D]) -> SpatialResult<usize>;

    fn insert_polygon(&mut self, polygon: Polygon) -> SpatialResult<()>;

    /// Builds a polygon from `vertices` and inserts it.
    ///
    /// Fails with `InvalidGeometry` for fewer than three vertices or any
    /// non-finite coordinate, leaving the index untouched.
    fn insert_polygon_vertices(&mut self, vertices: &[Point2D]) -> SpatialResult<()> {
        let polygon = Polygon::new(vertices.to_vec())?;
        self.insert_polygon(polygon)
    }

    /// Geometries whose box overlaps `window`, in no particular order.
    ///
    /// Points match when they lie inside the window, boundary included; 3D
    /// points are matched by their planar projection.
    fn range_query_2d(&self, window: &BoundingBox) -> SpatialResult<Vec<Geometry>>;

    /// 3D points inside `window` on all three axes.
    fn range_query_3d(&self, window: &BoundingBox) -> SpatialResult<Vec<Point3D>>;

    /// Polygons whose bounding box overlaps `window`.
    fn range_query_polygons(&self, window: &BoundingBox) -> SpatialResult<Vec<Polygon>>;

    /// Up to `k` geometries nearest to `query`, by ascending distance.
    fn knn_query_2d(&self, query: Point2D, k: usize) -> SpatialResult<Vec<(Geometry, f64)>>;

    /// Up to `k` stored 3D points nearest to `query`, by ascending distance.
    fn knn_query_3d(&self, query: Point3D, k: usize) -> SpatialResult<Vec<(Point3D, f64)>>;

    fn stats(&self) -> IndexStats;

    /// Number of stored geometries.
    fn len(&self) -> u64;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One index of any variant, chosen at runtime.
///
/// # Examples
///
/// ```rust
/// use spatial_index::{construct, BoundingBox, IndexConfig, IndexKind, Point2D, SpatialIndex};
///
/// let mut index = construct(IndexKind::Grid, &IndexConfig::default().cell_size(5.0))?;
/// index.insert_2d(&[Point2D::new(1.0, 1.0), Point2D::new(8.0, 8.0)])?;
/// let hits = index.range_query_2d(&BoundingBox::new(0.0, 0.0, 2.0, 2.0))?;
/// assert_eq!(hits.len(), 1);
/// # Ok::<(), spatial_index::SpatialError>(())
/// ```
pub enum IndexHandle {
    Grid(GridIndex),
    RTree(RTree),
    DiskRTree(DiskRTreeIndex),
}

impl IndexHandle {
    fn inner(&self) -> &dyn SpatialIndex {
        match self {
            IndexHandle::Grid(index) => index,
            IndexHandle::RTree(index) => index,
            IndexHandle::DiskRTree(index) => index,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn SpatialIndex {
        match self {
            IndexHandle::Grid(index) => index,
            IndexHandle::RTree(index) => index,
            IndexHandle::DiskRTree(index) => index,
        }
    }

    /// Variant name as used in [`IndexStats::kind`].
    pub fn kind_name(&self) -> &'static str {
        match self {
            IndexHandle::Grid(_) => "grid",
            IndexHandle::RTree(_) => "rtree",
            IndexHandle::DiskRTree(_) => "disk-rtree",
        }
    }

    /// Writes an index file at `path` that [`load`] turns back into a disk
    /// index holding the same geometries.
    ///
    /// In-memory variants write a fresh snapshot; a grid is stored as the
    /// R-Tree built from its entries. The disk variant flushes when `path` is
    /// its working file and snapshots otherwise.
    pub fn save(&mut self, path: impl AsRef<Path>) -> SpatialResult<()> {
        let path = path.as_ref();
        match self {
            IndexHandle::Grid(grid) => {
                let mut tree = RTree::new(DEFAULT_CAPACITY)?;
                tree.insert_all(grid.geometries().cloned().collect())?;
                debug!("Built {} node R-Tree from grid for saving", tree.stats().node_count);
                write_snapshot(&tree, path, None)
            }
            IndexHandle::RTree(tree) => write_snapshot(tree, path, None),
            IndexHandle::DiskRTree(index) => index.save(path),
        }
    }

    /// Makes pending changes durable. In-memory variants have nothing to
    /// flush.
    pub fn flush(&mut self) -> SpatialResult<()> {
        match self {
            IndexHandle::DiskRTree(index) => index.flush(),
            IndexHandle::Grid(_) | IndexHandle::RTree(_) => Ok(()),
        }
    }
}

impl SpatialIndex for IndexHandle {
    fn insert_2d(&mut self, points: &[Point2D]) -> SpatialResult<usize> {
        self.inner_mut().insert_2d(points)
    }

    fn insert_3d(&mut self, points: &[Point3D]) -> SpatialResult<usize> {
        self.inner_mut().insert_3d(points)
    }

    fn insert_polygon(&mut self, polygon: Polygon) -> SpatialResult<()> {
        self.inner_mut().insert_polygon(polygon)
    }

    fn range_query_2d(&self, window: &BoundingBox) -> SpatialResult<Vec<Geometry>> {
        self.inner().range_query_2d(window)
    }

    fn range_query_3d(&self, window: &BoundingBox) -> SpatialResult<Vec<Point3D>> {
        self.inner().range_query_3d(window)
    }

    fn range_query_polygons(&self, window: &BoundingBox) -> SpatialResult<Vec<Polygon>> {
        self.inner().range_query_polygons(window)
    }

    fn knn_query_2d(&self, query: Point2D, k: usize) -> SpatialResult<Vec<(Geometry, f64)>> {
        self.inner().knn_query_2d(query, k)
    }

    fn knn_query_3d(&self, query: Point3D, k: usize) -> SpatialResult<Vec<(Point3D, f64)>> {
        self.inner().knn_query_3d(query, k)
    }

    fn stats(&self) -> IndexStats {
        self.inner().stats()
    }

    fn len(&self) -> u64 {
        self.inner().len()
    }
}

/// Creates an empty index of the requested kind.
///
/// The configuration is validated before anything is built. For
/// [`IndexKind::DiskRTree`] an existing file at the path is opened instead.
pub fn construct(kind: IndexKind, config: &IndexConfig) -> SpatialResult<IndexHandle> {
    config.validate()?;
    let handle = match kind {
        IndexKind::Grid => IndexHandle::Grid(GridIndex::new(config.get_cell_size())?),
        IndexKind::RTree => IndexHandle::RTree(RTree::new(config.get_capacity())?),
        IndexKind::DiskRTree { path } => IndexHandle::DiskRTree(DiskRTreeIndex::open(path, config)?),
    };
    info!("Constructed {} index", handle.kind_name());
    Ok(handle)
}

/// Opens a saved index file as a disk index.
///
/// # Errors
///
/// `NotFound` for a missing file and `CorruptIndex` when the file fails
/// validation.
pub fn load(path: impl AsRef<Path>) -> SpatialResult<IndexHandle> {
    DiskRTreeIndex::load(path).map(IndexHandle::DiskRTree)
}
