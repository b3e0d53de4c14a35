//! On-disk layout of an index file.
//!
//! ```text
//! +----------------------+  offset 0
//! | FileHeader (padded)  |  HEADER_SIZE bytes
//! +----------------------+  HEADER_SIZE
//! | node slot 1          |  page_size bytes
//! +----------------------+
//! | node slot 2          |
//! | ...                  |
//! ```
//!
//! A slot holds a bincode-encoded [`PageWithChecksum`] followed by zero padding.

use std::io;

use serde::{Deserialize, Serialize};

use crate::config::{validate_capacity, validate_page_size};
use crate::constants::{HEADER_SIZE, MAGIC, VERSION};
use crate::errors::{SpatialError, SpatialResult};
use crate::rtree::{Node, NodeId, TreeMeta};
use crate::stats::EntryCounts;

/// Largest node slot a file may declare (64MB).
const MAX_PAGE_SIZE: u32 = 64 * 1024 * 1024;

/// File header stored at the beginning of the index file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct FileHeader {
    pub magic: u32,
    pub version: u32,
    pub page_size: u32,
    pub capacity: u32,
    pub node_count: u64,
    pub next_node_id: NodeId,
    /// 0 when the tree is empty
    pub root_node: NodeId,
    pub height: u32,
    pub entry_count: u64,
    pub point_2d_count: u64,
    pub point_3d_count: u64,
    pub polygon_count: u64,
}

impl FileHeader {
    pub fn new(meta: &TreeMeta, node_count: u64, page_size: usize) -> Self {
        Self {
            magic: MAGIC,
            version: VERSION,
            page_size: page_size as u32,
            capacity: meta.capacity as u32,
            node_count,
            next_node_id: node_count + 1,
            root_node: meta.root.unwrap_or(0),
            height: meta.height,
            entry_count: meta.counts.total(),
            point_2d_count: meta.counts.point_2d,
            point_3d_count: meta.counts.point_3d,
            polygon_count: meta.counts.polygon,
        }
    }

    pub fn tree_meta(&self) -> TreeMeta {
        TreeMeta {
            capacity: self.capacity as usize,
            root: (self.root_node != 0).then_some(self.root_node),
            height: self.height,
            counts: EntryCounts {
                point_2d: self.point_2d_count,
                point_3d: self.point_3d_count,
                polygon: self.polygon_count,
            },
        }
    }

    /// Structural checks that need nothing but the header itself.
    pub fn validate(&self) -> SpatialResult<()> {
        if self.magic != MAGIC {
            return Err(SpatialError::corrupt(format!(
                "bad magic {:#010x}, not an index file",
                self.magic
            )));
        }
        if self.version != VERSION {
            return Err(SpatialError::corrupt(format!(
                "unsupported format version {}",
                self.version
            )));
        }
        if self.page_size == 0 || self.page_size > MAX_PAGE_SIZE {
            return Err(SpatialError::corrupt(format!(
                "invalid page size {}",
                self.page_size
            )));
        }
        validate_capacity(self.capacity as usize)
            .and_then(|_| validate_page_size(self.page_size as usize, self.capacity as usize))
            .map_err(|e| SpatialError::corrupt(e.to_string()))?;

        if self.next_node_id != self.node_count + 1 {
            return Err(SpatialError::corrupt(format!(
                "next node id {} does not follow node count {}",
                self.next_node_id, self.node_count
            )));
        }
        if self.root_node > self.node_count {
            return Err(SpatialError::corrupt(format!(
                "root node {} beyond node count {}",
                self.root_node, self.node_count
            )));
        }

        let counted = self.point_2d_count + self.point_3d_count + self.polygon_count;
        if counted != self.entry_count {
            return Err(SpatialError::corrupt(format!(
                "entry count {} does not match per-kind counts ({})",
                self.entry_count, counted
            )));
        }

        let empty = self.root_node == 0;
        if empty != (self.height == 0) || empty != (self.entry_count == 0) {
            return Err(SpatialError::corrupt(format!(
                "inconsistent root {} for height {} and {} entries",
                self.root_node, self.height, self.entry_count
            )));
        }
        Ok(())
    }
}

/// Byte offset of the slot holding node `id`.
pub(crate) fn node_offset(id: NodeId, page_size: usize) -> u64 {
    HEADER_SIZE as u64 + (id - 1) * page_size as u64
}

pub(crate) fn encode_header(header: &FileHeader) -> SpatialResult<Vec<u8>> {
    let mut bytes = bincode::serde::encode_to_vec(header, bincode::config::legacy())
        .map_err(|e| SpatialError::StorageIo(io::Error::other(e.to_string())))?;
    if bytes.len() > HEADER_SIZE {
        return Err(SpatialError::StorageIo(io::Error::other(format!(
            "header of {} bytes does not fit its {} byte region",
            bytes.len(),
            HEADER_SIZE
        ))));
    }
    bytes.resize(HEADER_SIZE, 0);
    Ok(bytes)
}

pub(crate) fn decode_header(bytes: &[u8]) -> SpatialResult<FileHeader> {
    let (header, _): (FileHeader, usize) =
        bincode::serde::decode_from_slice(bytes, bincode::config::legacy())
            .map_err(|e| SpatialError::corrupt(format!("unreadable header: {}", e)))?;
    header.validate()?;
    Ok(header)
}

/// A node as stored in its slot: encoded bytes plus their CRC32.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct PageWithChecksum {
    pub checksum: u32,
    pub payload: Vec<u8>,
}

impl PageWithChecksum {
    pub fn new(node: &Node) -> SpatialResult<Self> {
        let payload = bincode::serde::encode_to_vec(node, bincode::config::legacy())
            .map_err(|e| SpatialError::StorageIo(io::Error::other(e.to_string())))?;
        Ok(Self {
            checksum: crc32fast::hash(&payload),
            payload,
        })
    }

    /// Verify checksum and consume self to return node
    pub fn into_node(self) -> SpatialResult<Node> {
        let actual = crc32fast::hash(&self.payload);
        if actual != self.checksum {
            return Err(SpatialError::corrupt(format!(
                "page checksum mismatch (expected: {:x}, got: {:x})",
                self.checksum, actual
            )));
        }
        bincode::serde::decode_from_slice(&self.payload, bincode::config::legacy())
            .map(|(node, _)| node)
            .map_err(|e| SpatialError::corrupt(format!("unreadable node: {}", e)))
    }
}

/// Encodes `node` into a full, zero-padded slot of `page_size` bytes.
///
/// # Errors
///
/// `StorageIo` when the encoded node does not fit the slot.
pub(crate) fn encode_page(node: &Node, page_size: usize) -> SpatialResult<Vec<u8>> {
    let page = PageWithChecksum::new(node)?;
    let mut bytes = bincode::serde::encode_to_vec(&page, bincode::config::legacy())
        .map_err(|e| SpatialError::StorageIo(io::Error::other(e.to_string())))?;

    if bytes.len() > page_size {
        return Err(SpatialError::StorageIo(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("Node too large: {} bytes (max {})", bytes.len(), page_size),
        )));
    }
    bytes.resize(page_size, 0);
    Ok(bytes)
}

/// Unpadded size of the slot contents for `node`.
pub(crate) fn encoded_page_len(node: &Node) -> SpatialResult<usize> {
    let page = PageWithChecksum::new(node)?;
    bincode::serde::encode_to_vec(&page, bincode::config::legacy())
        .map(|bytes| bytes.len())
        .map_err(|e| SpatialError::StorageIo(io::Error::other(e.to_string())))
}

pub(crate) fn decode_page(bytes: &[u8]) -> SpatialResult<Node> {
    let (page, _): (PageWithChecksum, usize) =
        bincode::serde::decode_from_slice(bytes, bincode::config::legacy())
            .map_err(|e| SpatialError::corrupt(format!("unreadable page: {}", e)))?;
    page.into_node()
}
