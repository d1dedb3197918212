//! Error types for resource loading, archive access and particle allocation.

use std::collections::TryReserveError;
use std::io;
use thiserror::Error;

/// Result type alias for resource operations
pub type Result<T> = std::result::Result<T, ResourceError>;

/// Main error type for the resource layer.
///
/// Loading operations never panic on bad data; they log a diagnostic and
/// return one of these variants. A duplicate name is not an error: the
/// existing resource is kept and the load reports success.
#[derive(Error, Debug)]
pub enum ResourceError {
    /// I/O error on the native filesystem
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Missing file, pack or referenced resource
    #[error("not found: {0}")]
    NotFound(String),

    /// Malformed image, descriptor or font data
    #[error("decode error: {0}")]
    Decode(String),

    /// Buffer allocation failed
    #[error("out of memory: {0}")]
    OutOfMemory(String),

    /// The archive container could not be parsed
    #[error("cannot open archive '{path}': {reason}")]
    ArchiveOpen {
        /// Path of the pack
        path: String,
        /// What went wrong while reading the directory
        reason: String,
    },

    /// An entry could not be extracted. Wrong passwords land here too.
    #[error("extraction of '{entry}' failed: {reason}")]
    ExtractFailed {
        /// Entry name inside the archive
        entry: String,
        /// Decompression or checksum failure
        reason: String,
    },

    /// No free particle-system slot
    #[error("capacity exceeded: {0}")]
    CapacityExceeded(String),

    /// Bad load parameters (zero-sized regions, empty grids)
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The render device refused to create a primitive
    #[error("render device error: {0}")]
    Device(String),

    /// Unreadable configuration or manifest
    #[error("configuration error: {0}")]
    Config(String),
}

impl ResourceError {
    /// Create a new NotFound error
    pub fn not_found<S: Into<String>>(msg: S) -> Self {
        ResourceError::NotFound(msg.into())
    }

    /// Create a new Decode error
    pub fn decode<S: Into<String>>(msg: S) -> Self {
        ResourceError::Decode(msg.into())
    }

    /// Create a new ExtractFailed error
    pub fn extract_failed<E: Into<String>, R: Into<String>>(entry: E, reason: R) -> Self {
        ResourceError::ExtractFailed {
            entry: entry.into(),
            reason: reason.into(),
        }
    }

    /// Map a failed `try_reserve` into an `OutOfMemory` error for `what`.
    pub fn out_of_memory<S: Into<String>>(what: S, err: TryReserveError) -> Self {
        ResourceError::OutOfMemory(format!("{}: {}", what.into(), err))
    }

    /// Check if this error means the requested thing simply does not exist
    pub fn is_not_found(&self) -> bool {
        match self {
            ResourceError::NotFound(_) => true,
            ResourceError::Io(e) => e.kind() == io::ErrorKind::NotFound,
            _ => false,
        }
    }

    /// Check if this error is an archive open or extraction failure
    pub fn is_archive_error(&self) -> bool {
        matches!(
            self,
            ResourceError::ArchiveOpen { .. } | ResourceError::ExtractFailed { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_not_found_counts_as_not_found() {
        let err: ResourceError = io::Error::new(io::ErrorKind::NotFound, "gone").into();
        assert!(err.is_not_found());
        assert!(!err.is_archive_error());
    }

    #[test]
    fn test_extract_failed_is_archive_error() {
        let err = ResourceError::extract_failed("a.png", "bad crc");
        assert!(err.is_archive_error());
        assert!(!err.is_not_found());
        assert_eq!(err.to_string(), "extraction of 'a.png' failed: bad crc");
    }
}
