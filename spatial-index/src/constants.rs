//! Constants shared by the index variants and the on-disk format.

/// Default maximum number of entries per R-Tree node
pub const DEFAULT_CAPACITY: usize = 16;

/// Smallest capacity for which a split always yields two legal nodes
pub const MIN_CAPACITY: usize = 2;

/// Default edge length of a grid cell
pub const DEFAULT_CELL_SIZE: f64 = 10.0;

/// Default node cache size in number of nodes
pub const DEFAULT_CACHE_NODES: usize = 1024;

/// Default node slot size (16KB)
pub const DEFAULT_PAGE_SIZE: usize = 16384;

/// Size of the header region at the start of an index file
pub const HEADER_SIZE: usize = 512;

/// Upper bound on the encoded size of one point entry, used to check that a
/// full leaf fits into a node slot
pub const POINT_ENTRY_BYTES: usize = 96;

/// Fixed per-node overhead (enum tag, checksum, vector length)
pub const NODE_OVERHEAD_BYTES: usize = 64;

/// Magic number for file format identification
pub const MAGIC: u32 = 0x5349_4458; // "SIDX"

/// File format version
pub const VERSION: u32 = 1;

/// Hilbert curve order used when ordering bulk inserts
pub const BULK_HILBERT_ORDER: u32 = 16;
