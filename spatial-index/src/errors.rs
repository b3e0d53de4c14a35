//! Error and result types shared by every index variant.
//!
//! Every failure the engine can report is a [`SpatialError`]. The binding layer
//! can match on [`SpatialError::kind`] to map failures onto its own error model
//! without inspecting the payloads.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur in spatial indexing operations
#[derive(Debug, Error)]
pub enum SpatialError {
    /// A polygon with fewer than three vertices, or any non-finite coordinate.
    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),

    /// A configuration value that cannot produce a working index.
    #[error("Invalid capacity configuration: {0}")]
    CapacityConfig(String),

    /// Open, read, write or sync failure on a backing file.
    #[error("Storage I/O error: {0}")]
    StorageIo(#[from] io::Error),

    /// An index file whose header or nodes fail structural validation.
    #[error("Corrupt index: {0}")]
    CorruptIndex(String),

    /// `load` was pointed at a path that does not exist.
    #[error("Index file not found: {}", .0.display())]
    NotFound(PathBuf),
}

/// Flat discriminant of [`SpatialError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidGeometry,
    CapacityConfig,
    StorageIo,
    CorruptIndex,
    NotFound,
}

impl SpatialError {
    /// Returns the kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            SpatialError::InvalidGeometry(_) => ErrorKind::InvalidGeometry,
            SpatialError::CapacityConfig(_) => ErrorKind::CapacityConfig,
            SpatialError::StorageIo(_) => ErrorKind::StorageIo,
            SpatialError::CorruptIndex(_) => ErrorKind::CorruptIndex,
            SpatialError::NotFound(_) => ErrorKind::NotFound,
        }
    }

    pub(crate) fn corrupt(msg: impl Into<String>) -> Self {
        SpatialError::CorruptIndex(msg.into())
    }

    pub(crate) fn invalid_geometry(msg: impl Into<String>) -> Self {
        SpatialError::InvalidGeometry(msg.into())
    }

    pub(crate) fn capacity(msg: impl Into<String>) -> Self {
        SpatialError::CapacityConfig(msg.into())
    }
}

/// Result type for spatial operations
pub type SpatialResult<T> = Result<T, SpatialError>;
