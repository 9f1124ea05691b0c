//! Common utilities for voidtweak.
//!
//! This crate provides the foundational binary reading used by the resource
//! index parsers:
//!
//! - [`BinaryReader`] - Zero-copy reading from byte slices with a switchable
//!   active byte order
//! - [`Endian`] - The byte order a reader currently decodes with

mod error;
mod reader;

pub use error::{Error, Result};
pub use reader::{BinaryReader, Endian};

/// Re-export zerocopy traits for convenience
pub use zerocopy::{FromBytes, Immutable, KnownLayout, Unaligned};
