//! Error types for the resources crate.

use std::path::PathBuf;

use thiserror::Error;

use crate::EntryRef;

/// Errors that can occur when loading or accessing resource archives.
#[derive(Debug, Error)]
pub enum Error {
    /// An index or resource-pool file does not exist.
    #[error("file not found: {}", .0.display())]
    NotFound(PathBuf),

    /// Magic number mismatch in an index file.
    #[error("invalid magic in {}: expected {expected:#010x}, got {actual:#010x}", path.display())]
    BadMagic {
        path: PathBuf,
        expected: u32,
        actual: u32,
    },

    /// A read ended before a declared length was satisfied.
    #[error("truncated data: {0}")]
    Truncated(String),

    /// A length-prefixed string was not valid UTF-8.
    #[error("invalid string: {0}")]
    InvalidString(String),

    /// The master index referenced a container that does not exist.
    #[error("container index {index} out of range ({count} containers)")]
    InvalidContainerIndex { index: u16, count: usize },

    /// A reference no longer points at a loaded container or entry.
    #[error("stale reference {reference}: {reason}, try reloading indexes")]
    StaleReference {
        reference: EntryRef,
        reason: &'static str,
    },

    /// The flags of an entry select a resource pool the container lacks.
    #[error("entry {reference} selects resource {index} but its container has {count}")]
    UnresolvedResource {
        reference: EntryRef,
        index: usize,
        count: usize,
    },

    /// Inflating a stored payload failed.
    #[error("decompression failed: {0}")]
    DecompressionFailed(String),

    /// Deflating a payload failed.
    #[error("compression failed: {0}")]
    CompressionFailed(String),

    /// A payload does not fit in its fixed slot.
    #[error("payload is too large: {size} > {capacity}")]
    OversizedPayload { size: usize, capacity: u32 },

    /// A payload for a compressed slot has a different logical size than the index records.
    #[error("payload size {actual} does not match the indexed size {expected}")]
    SizeMismatch { expected: u32, actual: usize },

    /// An export destination would leave the export directory.
    #[error("invalid destination path: {0}")]
    InvalidPath(String),

    /// The archive service is handling another request.
    #[error("archive service is busy ({0})")]
    Busy(&'static str),

    /// The archive service worker has exited.
    #[error("archive service has stopped")]
    ServiceStopped,

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<voidtweak_common::Error> for Error {
    fn from(err: voidtweak_common::Error) -> Self {
        match err {
            voidtweak_common::Error::UnexpectedEof { .. } => Error::Truncated(err.to_string()),
            voidtweak_common::Error::Utf8 { .. } => Error::InvalidString(err.to_string()),
            voidtweak_common::Error::InvalidMagic { expected, actual } => Error::BadMagic {
                path: PathBuf::new(),
                expected,
                actual,
            },
            voidtweak_common::Error::Io(e) => Error::Io(e),
        }
    }
}

impl Error {
    /// Attach a file path to errors raised while parsing that file.
    pub(crate) fn in_file(self, file: &std::path::Path) -> Self {
        match self {
            Error::BadMagic {
                path,
                expected,
                actual,
            } if path.as_os_str().is_empty() => Error::BadMagic {
                path: file.to_path_buf(),
                expected,
                actual,
            },
            Error::Truncated(msg) => Error::Truncated(format!("{}: {}", file.display(), msg)),
            Error::InvalidString(msg) => {
                Error::InvalidString(format!("{}: {}", file.display(), msg))
            }
            other => other,
        }
    }
}

/// Result type for resource operations.
pub type Result<T> = std::result::Result<T, Error>;
