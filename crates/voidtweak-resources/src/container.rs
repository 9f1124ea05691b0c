//! Resource containers.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::Entry;

/// Selector bit marking an entry stored in the shared resource pool.
pub const SHARED_RESOURCE_FLAG: u16 = 0x8000;

/// A child index together with the resource pools its entries live in.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Container {
    /// Directory holding the child index and the resource pools.
    pub dir: PathBuf,
    /// Child index file name, relative to `dir`.
    pub path: String,
    /// Resource pool file names, selected by position.
    pub resources: Vec<String>,
    /// Entries kept after dropping tombstones.
    pub entries: Vec<Entry>,
}

impl Container {
    /// Create a container with its first resource pool.
    pub fn new(dir: impl Into<PathBuf>, path: impl Into<String>, resource: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            path: path.into(),
            resources: vec![resource.into()],
            entries: Vec::new(),
        }
    }

    /// Get the full path of the child index.
    pub fn index_path(&self) -> PathBuf {
        join_relative(&self.dir, &self.path)
    }

    /// Compute which resource pool `flags2` selects.
    ///
    /// The shared flag picks the last pool; otherwise the pool index sits
    /// above the two low bits. Returns the computed index even when it is out
    /// of range so callers can report it.
    #[inline]
    pub fn resource_index(&self, flags2: u16) -> Option<usize> {
        if flags2 & SHARED_RESOURCE_FLAG != 0 {
            self.resources.len().checked_sub(1)
        } else {
            Some((flags2 >> 2) as usize)
        }
    }

    /// Get the resource pool name selected by `flags2`, if it exists.
    pub fn resource_name(&self, flags2: u16) -> Option<&str> {
        self.resource_index(flags2)
            .and_then(|index| self.resources.get(index))
            .map(String::as_str)
    }

    /// Get the full path of the resource pool selected by `flags2`, if it exists.
    pub fn resource_path(&self, flags2: u16) -> Option<PathBuf> {
        self.resource_name(flags2)
            .map(|name| join_relative(&self.dir, name))
    }

    /// Get the number of kept entries.
    #[inline]
    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }
}

impl fmt::Display for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Container({}, {} resources, {} entries)",
            self.path,
            self.resources.len(),
            self.entries.len()
        )
    }
}

/// Join a file name from an index onto a directory.
///
/// Names in the indexes may use Windows separators.
pub(crate) fn join_relative(dir: &Path, name: &str) -> PathBuf {
    let mut path = dir.to_path_buf();
    path.extend(name.split(['\\', '/']).filter(|part| !part.is_empty()));
    path
}
