//! Disk storage layer for the paged R-Tree.
//!
//! Every node read is exactly one seek plus one read of its slot; nothing is
//! preloaded. Callers decide when to sync.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use log::debug;
use parking_lot::Mutex;

use super::format::{decode_header, decode_page, encode_header, encode_page, node_offset, FileHeader};
use crate::constants::HEADER_SIZE;
use crate::errors::{SpatialError, SpatialResult};
use crate::rtree::{Node, NodeId};

/// Handles reading/writing the header and individual node slots.
pub(crate) struct Storage {
    file: Mutex<File>,
    path: PathBuf,
    page_size: usize,
}

impl Storage {
    /// Creates (or truncates) the file at `path`.
    pub fn create(path: &Path, page_size: usize) -> SpatialResult<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        debug!("Created index file {}", path.display());

        Ok(Self {
            file: Mutex::new(file),
            path: path.to_path_buf(),
            page_size,
        })
    }

    /// Opens an existing file and reads its validated header.
    pub fn open(path: &Path) -> SpatialResult<(Self, FileHeader)> {
        let mut file = match OpenOptions::new().read(true).write(true).open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(SpatialError::NotFound(path.to_path_buf()))
            }
            Err(e) => return Err(e.into()),
        };

        let mut buffer = vec![0u8; HEADER_SIZE];
        read_exact_at(&mut file, 0, &mut buffer)
            .map_err(|e| truncated(e, "file is shorter than its header"))?;
        let header = decode_header(&buffer)?;

        let storage = Self {
            file: Mutex::new(file),
            path: path.to_path_buf(),
            page_size: header.page_size as usize,
        };
        Ok((storage, header))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn write_header(&self, header: &FileHeader) -> SpatialResult<()> {
        let bytes = encode_header(header)?;
        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(0))?;
        file.write_all(&bytes)?;
        Ok(())
    }

    /// Reads a single node from its slot, verifying its checksum.
    pub fn read_node(&self, id: NodeId) -> SpatialResult<Node> {
        if id == 0 {
            return Err(SpatialError::corrupt("node id 0 is reserved"));
        }

        let mut buffer = vec![0u8; self.page_size];
        {
            let mut file = self.file.lock();
            read_exact_at(&mut file, node_offset(id, self.page_size), &mut buffer).map_err(
                |e| truncated(e, &format!("node {} lies beyond the end of the file", id)),
            )?;
        }
        decode_page(&buffer)
    }

    /// Writes a single node to its slot.
    pub fn write_node(&self, id: NodeId, node: &Node) -> SpatialResult<()> {
        let bytes = encode_page(node, self.page_size)?;
        self.write_slot(id, &bytes)
    }

    /// Writes an already encoded, padded slot.
    pub fn write_slot(&self, id: NodeId, bytes: &[u8]) -> SpatialResult<()> {
        if id == 0 {
            return Err(SpatialError::StorageIo(io::Error::new(
                io::ErrorKind::InvalidInput,
                "Cannot write node 0 (reserved)",
            )));
        }

        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(node_offset(id, self.page_size)))?;
        file.write_all(bytes)?;
        Ok(())
    }

    /// Extends the file so that every slot up to `node_count` exists.
    pub fn ensure_len(&self, node_count: u64) -> SpatialResult<()> {
        let len = HEADER_SIZE as u64 + node_count * self.page_size as u64;
        let file = self.file.lock();
        if file.metadata()?.len() < len {
            file.set_len(len)?;
        }
        Ok(())
    }

    /// Sync file to disk
    pub fn sync(&self) -> SpatialResult<()> {
        self.file.lock().sync_all()?;
        Ok(())
    }
}

fn read_exact_at(file: &mut File, offset: u64, buffer: &mut [u8]) -> io::Result<()> {
    file.seek(SeekFrom::Start(offset))?;
    file.read_exact(buffer)
}

/// A short read means the file is damaged, not that the disk failed.
fn truncated(e: io::Error, msg: &str) -> SpatialError {
    if e.kind() == io::ErrorKind::UnexpectedEof {
        SpatialError::corrupt(msg)
    } else {
        SpatialError::StorageIo(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;
    use crate::geometry::{Geometry, Point2D};
    use crate::rtree::{ChildRef, LeafEntry, TreeMeta};
    use crate::bounding_box::BoundingBox;
    use tempfile::tempdir;

    fn leaf(x: f64) -> Node {
        Node::Leaf {
            entries: vec![LeafEntry::new(Geometry::Point2D(Point2D::new(x, x)))],
        }
    }

    #[test]
    fn test_storage_header_read_write() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.sidx");
        let storage = Storage::create(&path, 4096).unwrap();

        let header = FileHeader::new(&TreeMeta::new(8), 0, 4096);
        storage.write_header(&header).unwrap();
        drop(storage);

        let (storage, read_header) = Storage::open(&path).unwrap();
        assert_eq!(read_header, header);
        assert_eq!(storage.page_size(), 4096);
        assert_eq!(storage.path(), path.as_path());
    }

    #[test]
    fn test_storage_multiple_nodes() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.sidx");
        let storage = Storage::create(&path, 4096).unwrap();

        let internal = Node::Internal {
            children: vec![ChildRef {
                bbox: BoundingBox::new(0.0, 0.0, 1.0, 1.0),
                node_id: 1,
            }],
            level: 1,
        };

        storage.write_node(1, &leaf(1.0)).unwrap();
        storage.write_node(2, &internal).unwrap();
        storage.write_node(3, &leaf(3.0)).unwrap();

        assert_eq!(storage.read_node(1).unwrap(), leaf(1.0));
        assert_eq!(storage.read_node(2).unwrap(), internal);
        assert_eq!(storage.read_node(3).unwrap(), leaf(3.0));
    }

    #[test]
    fn test_missing_file_is_not_found() {
        let dir = tempdir().unwrap();
        let err = Storage::open(&dir.path().join("absent.sidx")).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_short_file_is_corrupt() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("short.sidx");
        std::fs::write(&path, b"SIDX").unwrap();
        let err = Storage::open(&path).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::CorruptIndex);
    }

    #[test]
    fn test_read_past_end_is_corrupt() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.sidx");
        let storage = Storage::create(&path, 4096).unwrap();
        storage.write_node(1, &leaf(1.0)).unwrap();
        assert_eq!(storage.read_node(5).unwrap_err().kind(), ErrorKind::CorruptIndex);
    }

    #[test]
    fn test_node_zero_rejected() {
        let dir = tempdir().unwrap();
        let storage = Storage::create(&dir.path().join("test.sidx"), 4096).unwrap();
        assert!(storage.write_node(0, &leaf(0.0)).is_err());
        assert!(storage.read_node(0).is_err());
    }

    #[test]
    fn test_ensure_len_and_sync() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.sidx");
        let storage = Storage::create(&path, 1024).unwrap();
        storage.ensure_len(3).unwrap();
        storage.sync().unwrap();
        assert_eq!(std::fs::metadata(&path).unwrap().len(), (HEADER_SIZE + 3 * 1024) as u64);
    }
}
