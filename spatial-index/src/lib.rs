//! # Spatial Index - Grid and R-Tree Indexing for Points and Polygons
//!
//! This crate stores 2D points, 3D points and polygons and answers window
//! (range) and k-nearest-neighbour queries over them. Three interchangeable
//! variants are provided:
//!
//! - **[`GridIndex`]**: uniform cell grid, cheap inserts, ring-expanding KNN
//! - **[`RTree`]**: balanced bounding-box tree with quadratic splits and
//!   best-first KNN
//! - **[`DiskRTreeIndex`]**: the same tree stored in a paged file behind an
//!   LRU node cache, persisted on explicit `flush`/`save` and reopened with
//!   `load`
//!
//! All of them implement [`SpatialIndex`]; [`IndexHandle`] selects one at
//! runtime. Polygons are indexed by their bounding boxes.
//!
//! ## Quick Start
//!
//! ```rust
//! use spatial_index::{construct, BoundingBox, IndexConfig, IndexKind, Point2D, SpatialIndex};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut index = construct(IndexKind::RTree, &IndexConfig::default().capacity(8))?;
//! index.insert_2d(&[Point2D::new(0.0, 0.0), Point2D::new(3.0, 4.0)])?;
//! index.insert_polygon_vertices(&[
//!     Point2D::new(10.0, 10.0),
//!     Point2D::new(12.0, 10.0),
//!     Point2D::new(11.0, 12.0),
//! ])?;
//!
//! let window = index.range_query_2d(&BoundingBox::new(-1.0, -1.0, 5.0, 5.0))?;
//! assert_eq!(window.len(), 2);
//!
//! let nearest = index.knn_query_2d(Point2D::new(0.0, 0.0), 1)?;
//! assert_eq!(nearest[0].1, 0.0);
//! # Ok(())
//! # }
//! ```
//!
//! ## Persistence
//!
//! ```rust,no_run
//! use spatial_index::{load, construct, IndexConfig, IndexKind, Point2D, SpatialIndex};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let kind = IndexKind::DiskRTree { path: "points.sidx".into() };
//! let mut index = construct(kind, &IndexConfig::default())?;
//! index.insert_2d(&[Point2D::new(1.0, 1.0)])?;
//! index.flush()?;
//!
//! let reopened = load("points.sidx")?;
//! assert_eq!(reopened.len(), 1);
//! # Ok(())
//! # }
//! ```

pub mod bounding_box;
pub mod config;
pub mod constants;
pub mod disk;
pub mod errors;
pub mod geometry;
pub mod grid;
pub mod hilbert;
pub mod index;
pub mod rtree;
pub mod stats;

pub use bounding_box::BoundingBox;
pub use config::{IndexConfig, IndexKind};
pub use disk::DiskRTreeIndex;
pub use errors::{ErrorKind, SpatialError, SpatialResult};
pub use geometry::{distance_2d, distance_3d, Geometry, Point2D, Point3D, Polygon};
pub use grid::GridIndex;
pub use index::{construct, load, IndexHandle, SpatialIndex};
pub use rtree::{MemoryStore, NodeStore, RTree};
pub use stats::{CacheStats, IndexStats};
