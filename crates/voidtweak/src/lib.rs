//! Voidtweak - resource archive tooling for Void engine games.
//!
//! This crate provides a single entry point to the voidtweak library crates.
//!
//! # Crates
//!
//! - [`voidtweak_common`] - Binary reading in either byte order
//! - [`voidtweak_resources`] - Master/child index loading, extraction and
//!   in-place insertion
//!
//! # Example
//!
//! ```no_run
//! use voidtweak::prelude::*;
//!
//! let archive = ResourceArchive::open("Dishonored2/base")?;
//! println!("{} entries", archive.entry_count());
//!
//! if let Some(reference) = archive.search("player.decl").next() {
//!     let data = archive.extract(reference)?;
//!     archive.insert(reference, &data)?;
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub use voidtweak_common as common;
pub use voidtweak_resources as resources;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use voidtweak_common::BinaryReader;
    pub use voidtweak_resources::{
        ArchiveService, Container, Entry, EntryRef, ExportSummary, LoadSummary, ResourceArchive,
        SearchMatch, ServiceState, SortOrder, Status,
    };
}

pub use voidtweak_resources::{Error, Result};

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
