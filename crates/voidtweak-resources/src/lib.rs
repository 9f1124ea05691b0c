//! Resource index reader and patcher for Void engine games.
//!
//! Game assets are stored in a two-tier layout:
//!
//! - `master.index` lists containers. Each container has a child index and
//!   one or more resource pools, some of them shared between containers.
//! - Each child index lists entries: virtual paths plus the offset, logical
//!   size and packed size of a fixed slot in one of the resource pools.
//!
//! Slots whose logical and packed sizes differ hold zlib-compressed data.
//! Payloads can be replaced in place as long as they fit the existing slot;
//! index files are never rewritten.
//!
//! # Example
//!
//! ```no_run
//! use voidtweak_resources::ResourceArchive;
//!
//! let archive = ResourceArchive::open("Dishonored2/base")?;
//!
//! for reference in archive.search("player") {
//!     let entry = archive.get(reference)?;
//!     let data = archive.extract(reference)?;
//!     println!("{}: {} bytes", entry.dst, data.len());
//! }
//! # Ok::<(), voidtweak_resources::Error>(())
//! ```

mod archive;
pub mod compress;
mod container;
mod entry;
mod error;
pub mod format;
pub mod index;
pub mod service;
mod sort;

pub use archive::{ExportSummary, ResourceArchive};
pub use container::{Container, SHARED_RESOURCE_FLAG};
pub use entry::{Entry, EntryRef};
pub use error::{Error, Result};
pub use index::LoadSummary;
pub use service::{ArchiveService, SearchHandle, SearchMatch, ServiceState, Status};
pub use sort::SortOrder;
