//! R-Tree persisted in a paged file.

use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};

use super::format::FileHeader;
use super::paged_store::PagedStore;
use super::snapshot::write_snapshot;
use super::storage::Storage;
use crate::bounding_box::BoundingBox;
use crate::config::IndexConfig;
use crate::errors::{SpatialError, SpatialResult};
use crate::geometry::{Geometry, Point2D, Point3D, Polygon};
use crate::index::SpatialIndex;
use crate::rtree::{NodeStore, RTree, TreeMeta};
use crate::stats::IndexStats;

/// An R-Tree whose nodes live in a file.
///
/// Inserts run the in-memory tree algorithms against a node cache; changed
/// nodes are only marked dirty. Nothing reaches the file until a dirty node is
/// evicted from the cache or [`flush`](DiskRTreeIndex::flush) /
/// [`save`](DiskRTreeIndex::save) is called, and changes that were never
/// flushed are lost when the index is dropped.
///
/// Two instances must not open the same file at the same time.
///
/// # Examples
///
/// ```rust,no_run
/// use spatial_index::{BoundingBox, DiskRTreeIndex, IndexConfig, Point2D};
///
/// let mut index = DiskRTreeIndex::open("places.sidx", &IndexConfig::default().capacity(10))?;
/// index.insert_points_2d(&[Point2D::new(1.0, 2.0), Point2D::new(3.0, 4.0)])?;
/// index.flush()?;
///
/// let reopened = DiskRTreeIndex::load("places.sidx")?;
/// assert_eq!(reopened.range_query(&BoundingBox::new(0.0, 0.0, 5.0, 5.0))?.len(), 2);
/// # Ok::<(), spatial_index::SpatialError>(())
/// ```
pub struct DiskRTreeIndex {
    tree: RTree<PagedStore>,
    path: PathBuf,
    /// Header as last written to the file
    persisted: FileHeader,
}

impl DiskRTreeIndex {
    /// Opens the index at `path`, creating an empty one if no file exists.
    ///
    /// For an existing file the stored capacity and page size win over the
    /// configured ones; the cache size always comes from `config`.
    pub fn open(path: impl AsRef<Path>, config: &IndexConfig) -> SpatialResult<Self> {
        config.validate()?;
        let path = path.as_ref();

        if path.exists() {
            let index = Self::load_with_cache(path, config.get_cache_nodes())?;
            if index.capacity() != config.get_capacity() {
                warn!(
                    "{} was built with capacity {}, ignoring configured capacity {}",
                    path.display(),
                    index.capacity(),
                    config.get_capacity()
                );
            }
            Ok(index)
        } else {
            Self::create(path, config)
        }
    }

    /// Creates a fresh, empty index file at `path`, replacing any file there.
    pub fn create(path: impl AsRef<Path>, config: &IndexConfig) -> SpatialResult<Self> {
        config.validate()?;
        let path = path.as_ref();

        let storage = Storage::create(path, config.get_page_size())?;
        let meta = TreeMeta::new(config.get_capacity());
        let header = FileHeader::new(&meta, 0, config.get_page_size());
        storage.write_header(&header)?;
        storage.sync()?;

        info!(
            "Created disk index {} (capacity {}, page size {})",
            path.display(),
            config.get_capacity(),
            config.get_page_size()
        );

        let store = PagedStore::new(storage, config.get_cache_nodes(), 0);
        Ok(Self {
            tree: RTree::from_parts(store, meta),
            path: path.to_path_buf(),
            persisted: header,
        })
    }

    /// Reconstructs an index from its file without replaying inserts.
    ///
    /// # Errors
    ///
    /// `NotFound` when `path` does not exist, `CorruptIndex` when the header or
    /// any node fails validation, `StorageIo` for other read failures. No
    /// partially loaded index is ever returned.
    pub fn load(path: impl AsRef<Path>) -> SpatialResult<Self> {
        Self::load_with_cache(path.as_ref(), IndexConfig::default().get_cache_nodes())
    }

    fn load_with_cache(path: &Path, cache_nodes: usize) -> SpatialResult<Self> {
        if !path.exists() {
            return Err(SpatialError::NotFound(path.to_path_buf()));
        }

        let (storage, header) = Storage::open(path)?;
        let store = PagedStore::new(storage, cache_nodes, header.node_count);
        let tree = RTree::from_parts(store, header.tree_meta());
        tree.check_invariants()?;

        info!(
            "Loaded disk index {} ({} entries, height {})",
            path.display(),
            header.entry_count,
            header.height
        );

        Ok(Self {
            tree,
            path: path.to_path_buf(),
            persisted: header,
        })
    }

    /// The working file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn capacity(&self) -> usize {
        self.tree.capacity()
    }

    pub fn height(&self) -> u32 {
        self.tree.height()
    }

    pub fn len(&self) -> u64 {
        self.tree.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    fn current_header(&self) -> FileHeader {
        FileHeader::new(
            self.tree.meta(),
            self.tree.store().node_count(),
            self.tree.store().storage().page_size(),
        )
    }

    /// True if anything changed since the last flush.
    pub fn has_unflushed_changes(&self) -> bool {
        self.tree.store().has_dirty_nodes() || self.current_header() != self.persisted
    }

    /// Writes every dirty node, then the header if it changed, and syncs the
    /// file. Returns once the data is durable.
    ///
    /// A flush with nothing dirty writes no nodes. On failure the in-memory
    /// tree stays valid and queryable and a later flush retries.
    pub fn flush(&mut self) -> SpatialResult<()> {
        let written = self.tree.store().flush_nodes()?;

        let header = self.current_header();
        let storage = self.tree.store().storage();
        if header != self.persisted {
            storage.ensure_len(header.node_count)?;
            storage.write_header(&header)?;
        }
        storage.sync()?;
        self.persisted = header;

        debug!("Flushed {} nodes to {}", written, self.path.display());
        Ok(())
    }

    /// Persists the index to `path`.
    ///
    /// Saving to the working file is a [`flush`](Self::flush). Any other path
    /// receives an independent snapshot of header plus all live nodes; the
    /// working file and its pending changes are left alone.
    pub fn save(&mut self, path: impl AsRef<Path>) -> SpatialResult<()> {
        let path = path.as_ref();
        if self.is_working_file(path) {
            return self.flush();
        }

        let page_size = self.tree.store().storage().page_size();
        write_snapshot(&self.tree, path, Some(page_size))
    }

    fn is_working_file(&self, path: &Path) -> bool {
        match (fs::canonicalize(path), fs::canonicalize(&self.path)) {
            (Ok(target), Ok(working)) => target == working,
            _ => path == self.path,
        }
    }

    /// Changes how many nodes are kept in memory, writing back dirty nodes
    /// that no longer fit.
    pub fn set_cache_size(&mut self, cache_nodes: usize) -> SpatialResult<()> {
        if cache_nodes == 0 {
            return Err(SpatialError::capacity("node cache must hold at least one node"));
        }
        self.tree.store().set_cache_size(cache_nodes);
        Ok(())
    }

    /// Verifies the structural invariants of the stored tree.
    pub fn check_invariants(&self) -> SpatialResult<()> {
        self.tree.check_invariants()
    }

    pub fn insert_points_2d(&mut self, points: &[Point2D]) -> SpatialResult<usize> {
        self.tree.insert_points_2d(points)
    }

    pub fn insert_points_3d(&mut self, points: &[Point3D]) -> SpatialResult<usize> {
        self.tree.insert_points_3d(points)
    }

    pub fn insert_polygon(&mut self, polygon: Polygon) -> SpatialResult<()> {
        self.tree.insert_polygon(polygon)
    }

    pub fn range_query(&self, window: &BoundingBox) -> SpatialResult<Vec<Geometry>> {
        self.tree.range_query(window)
    }

    pub fn nearest_2d(&self, query: &Point2D, k: usize) -> SpatialResult<Vec<(Geometry, f64)>> {
        self.tree.nearest_2d(query, k)
    }

    pub fn stats(&self) -> IndexStats {
        let mut stats = self.tree.stats();
        stats.kind = "disk-rtree".to_string();
        stats.cache = Some(self.tree.store().cache_stats());
        stats
    }
}

impl Drop for DiskRTreeIndex {
    fn drop(&mut self) {
        if self.has_unflushed_changes() {
            warn!(
                "Dropping disk index {} with unflushed changes; they are not persisted",
                self.path.display()
            );
        }
    }
}

impl SpatialIndex for DiskRTreeIndex {
    fn insert_2d(&mut self, points: &[Point2D]) -> SpatialResult<usize> {
        self.insert_points_2d(points)
    }

    fn insert_3d(&mut self, points: &[Point3D]) -> SpatialResult<usize> {
        self.insert_points_3d(points)
    }

    fn insert_polygon(&mut self, polygon: Polygon) -> SpatialResult<()> {
        DiskRTreeIndex::insert_polygon(self, polygon)
    }

    fn range_query_2d(&self, window: &BoundingBox) -> SpatialResult<Vec<Geometry>> {
        self.tree.range_query(window)
    }

    fn range_query_3d(&self, window: &BoundingBox) -> SpatialResult<Vec<Point3D>> {
        self.tree.range_query_3d(window)
    }

    fn range_query_polygons(&self, window: &BoundingBox) -> SpatialResult<Vec<Polygon>> {
        self.tree.range_query_polygons(window)
    }

    fn knn_query_2d(&self, query: Point2D, k: usize) -> SpatialResult<Vec<(Geometry, f64)>> {
        self.tree.nearest_2d(&query, k)
    }

    fn knn_query_3d(&self, query: Point3D, k: usize) -> SpatialResult<Vec<(Point3D, f64)>> {
        self.tree.nearest_3d(&query, k)
    }

    fn stats(&self) -> IndexStats {
        DiskRTreeIndex::stats(self)
    }

    fn len(&self) -> u64 {
        self.tree.len()
    }
}
