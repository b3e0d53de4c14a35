//! Index construction parameters.

use std::path::PathBuf;

use crate::constants::{
    DEFAULT_CACHE_NODES, DEFAULT_CAPACITY, DEFAULT_CELL_SIZE, DEFAULT_PAGE_SIZE, MIN_CAPACITY,
    NODE_OVERHEAD_BYTES, POINT_ENTRY_BYTES,
};
use crate::errors::{SpatialError, SpatialResult};

/// Which index variant to construct.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexKind {
    /// Uniform grid over the plane.
    Grid,
    /// In-memory R-Tree.
    RTree,
    /// R-Tree persisted in the file at `path`.
    DiskRTree { path: PathBuf },
}

impl IndexKind {
    pub fn name(&self) -> &'static str {
        match self {
            IndexKind::Grid => "grid",
            IndexKind::RTree => "rtree",
            IndexKind::DiskRTree { .. } => "disk-rtree",
        }
    }
}

/// Configuration shared by every index variant.
///
/// Each variant reads only the settings it needs: the grid uses `cell_size`,
/// the R-Trees use `capacity`, and the disk variant additionally uses
/// `cache_nodes` and `page_size`.
///
/// # Examples
///
/// ```rust
/// use spatial_index::IndexConfig;
///
/// let config = IndexConfig::default().capacity(4).cache_nodes(64);
/// assert!(config.validate().is_ok());
/// assert!(IndexConfig::default().capacity(0).validate().is_err());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct IndexConfig {
    capacity: usize,
    cell_size: f64,
    cache_nodes: usize,
    page_size: usize,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            cell_size: DEFAULT_CELL_SIZE,
            cache_nodes: DEFAULT_CACHE_NODES,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl IndexConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum number of entries per R-Tree node (M).
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Sets the edge length of a grid cell.
    pub fn cell_size(mut self, cell_size: f64) -> Self {
        self.cell_size = cell_size;
        self
    }

    /// Sets how many nodes the disk variant keeps in memory.
    pub fn cache_nodes(mut self, cache_nodes: usize) -> Self {
        self.cache_nodes = cache_nodes;
        self
    }

    /// Sets the size in bytes of one node slot in the backing file.
    pub fn page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn get_capacity(&self) -> usize {
        self.capacity
    }

    pub fn get_cell_size(&self) -> f64 {
        self.cell_size
    }

    pub fn get_cache_nodes(&self) -> usize {
        self.cache_nodes
    }

    pub fn get_page_size(&self) -> usize {
        self.page_size
    }

    /// Checks every setting.
    ///
    /// # Errors
    ///
    /// Returns `CapacityConfig` for a capacity below 2, a non-positive or
    /// non-finite cell size, an empty cache, or a page too small to hold a full
    /// leaf of point entries.
    pub fn validate(&self) -> SpatialResult<()> {
        validate_capacity(self.capacity)?;

        if !(self.cell_size.is_finite() && self.cell_size > 0.0) {
            return Err(SpatialError::capacity(format!(
                "cell size must be a positive finite number, got {}",
                self.cell_size
            )));
        }

        if self.cache_nodes == 0 {
            return Err(SpatialError::capacity("node cache must hold at least one node"));
        }

        validate_page_size(self.page_size, self.capacity)
    }
}

pub(crate) fn validate_capacity(capacity: usize) -> SpatialResult<()> {
    if capacity < MIN_CAPACITY {
        return Err(SpatialError::capacity(format!(
            "node capacity must be at least {}, got {}",
            MIN_CAPACITY, capacity
        )));
    }
    Ok(())
}

pub(crate) fn validate_page_size(page_size: usize, capacity: usize) -> SpatialResult<()> {
    let required = capacity
        .saturating_mul(POINT_ENTRY_BYTES)
        .saturating_add(NODE_OVERHEAD_BYTES);
    if page_size < required {
        return Err(SpatialError::capacity(format!(
            "page size {} cannot hold {} entries (needs {} bytes)",
            page_size, capacity, required
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;

    #[test]
    fn test_defaults_are_valid() {
        let config = IndexConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.get_capacity(), DEFAULT_CAPACITY);
        assert_eq!(config.get_page_size(), DEFAULT_PAGE_SIZE);
    }

    #[test]
    fn test_builder_sets_values() {
        let config = IndexConfig::new()
            .capacity(10)
            .cell_size(2.5)
            .cache_nodes(8)
            .page_size(4096);
        assert_eq!(config.get_capacity(), 10);
        assert_eq!(config.get_cell_size(), 2.5);
        assert_eq!(config.get_cache_nodes(), 8);
        assert_eq!(config.get_page_size(), 4096);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_small_capacity() {
        for capacity in [0, 1] {
            let err = IndexConfig::default().capacity(capacity).validate().unwrap_err();
            assert_eq!(err.kind(), ErrorKind::CapacityConfig);
        }
        assert!(IndexConfig::default().capacity(2).validate().is_ok());
    }

    #[test]
    fn test_rejects_bad_cell_size() {
        for size in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            let err = IndexConfig::default().cell_size(size).validate().unwrap_err();
            assert_eq!(err.kind(), ErrorKind::CapacityConfig);
        }
    }

    #[test]
    fn test_rejects_empty_cache() {
        let err = IndexConfig::default().cache_nodes(0).validate().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CapacityConfig);
    }

    #[test]
    fn test_rejects_page_too_small_for_capacity() {
        let err = IndexConfig::default()
            .capacity(1000)
            .page_size(4096)
            .validate()
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CapacityConfig);
    }

    #[test]
    fn test_kind_names() {
        assert_eq!(IndexKind::Grid.name(), "grid");
        assert_eq!(IndexKind::RTree.name(), "rtree");
        assert_eq!(
            IndexKind::DiskRTree { path: PathBuf::from("x") }.name(),
            "disk-rtree"
        );
    }
}
