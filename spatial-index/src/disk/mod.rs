//! File-backed R-Tree.
//!
//! The tree algorithms are the ones from [`crate::rtree`]; this module supplies
//! the node store they run on: fixed-size node slots in a single file, a
//! checksummed page format and an LRU cache of decoded nodes with dirty
//! tracking.

mod cache;
mod disk_index;
mod format;
pub(crate) mod paged_store;
mod snapshot;
mod storage;

pub use disk_index::DiskRTreeIndex;
pub(crate) use snapshot::write_snapshot;
