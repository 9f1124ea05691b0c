//! Resource index entry.

use std::fmt;
use std::path::Path;

/// Position of an entry in the loaded index.
///
/// References stay comparable across reloads, but every use is checked
/// against the current bounds because a reload replaces all containers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EntryRef {
    /// Index of the owning container.
    pub container: usize,
    /// Position of the entry inside its container.
    pub entry: usize,
}

impl EntryRef {
    /// Create a new reference.
    #[inline]
    pub const fn new(container: usize, entry: usize) -> Self {
        Self { container, entry }
    }
}

impl fmt::Display for EntryRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.container, self.entry)
    }
}

/// An asset record of a child index.
///
/// Entries describe where a payload lives, not the payload itself. Use
/// [`ResourceArchive::extract`](crate::ResourceArchive::extract) to read it.
/// Records with a zero logical or packed size are deleted slots and never
/// become entries.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Entry {
    /// Index of the owning container.
    pub container: usize,
    /// Position among the kept entries of the container.
    pub index: usize,
    /// Offset of the record inside the child index file.
    pub index_pos: u64,
    /// Archive-assigned identifier, unique only within a container.
    pub id: u32,
    /// Free-form resource type.
    pub type_name: String,
    /// Source virtual path.
    pub src: String,
    /// Destination virtual path.
    pub dst: String,
    /// Absolute offset into the resource pool.
    pub resource_pos: u64,
    /// Logical (decompressed) size.
    pub size: u32,
    /// Size of the slot on disk.
    pub size_packed: u32,
    /// Opaque flags.
    pub flags1: u16,
    /// Resource pool selector.
    pub flags2: u16,
}

impl Entry {
    /// Get a reference to this entry.
    #[inline]
    pub fn reference(&self) -> EntryRef {
        EntryRef::new(self.container, self.index)
    }

    /// Check if the slot holds a compressed payload.
    #[inline]
    pub fn is_compressed(&self) -> bool {
        self.size != self.size_packed
    }

    /// Check if the record marks a deleted slot.
    #[inline]
    pub fn is_tombstone(&self) -> bool {
        self.size == 0 || self.size_packed == 0
    }

    /// Get the last component of the source path.
    pub fn src_file_name(&self) -> &str {
        file_name(&self.src)
    }

    /// Get the last component of the destination path.
    pub fn dst_file_name(&self) -> &str {
        file_name(&self.dst)
    }

    /// Get the source file extension, if any.
    pub fn src_extension(&self) -> Option<&str> {
        extension(&self.src)
    }

    /// Get the destination file extension, if any.
    pub fn dst_extension(&self) -> Option<&str> {
        extension(&self.dst)
    }

    /// Get the directory part of the destination path.
    pub fn dst_dir(&self) -> &str {
        match self.dst.rfind('/') {
            Some(pos) => &self.dst[..pos],
            None => "",
        }
    }
}

impl fmt::Display for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Entry({}, {}, {})", self.id, self.src, self.dst)
    }
}

fn file_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

fn extension(path: &str) -> Option<&str> {
    Path::new(file_name(path))
        .extension()
        .and_then(|ext| ext.to_str())
}
