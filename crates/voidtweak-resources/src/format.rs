//! Fixed-layout records of the index formats.
//!
//! Both index files mix byte orders: integers are big-endian, while the
//! length prefixes of strings are little-endian. The fixed runs of
//! big-endian fields are described here and read in one go; strings are
//! read through [`voidtweak_common::BinaryReader`] with its byte order
//! switched.

use zerocopy::byteorder::{BigEndian, U16, U32, U64};
use zerocopy::{FromBytes, Immutable, KnownLayout, Unaligned};

/// File name of the master index inside the base directory.
pub const MASTER_INDEX_NAME: &str = "master.index";

/// Header of the master index, after the magic number.
#[derive(Debug, Clone, Copy, FromBytes, Immutable, KnownLayout, Unaligned)]
#[repr(C)]
pub struct MasterHeader {
    /// Unknown, observed as 0x0002
    pub reserved: [u8; 2],
    /// Number of containers
    pub index_count: U16<BigEndian>,
}

impl MasterHeader {
    /// Master index magic ("\x04SER").
    pub const MAGIC: u32 = 0x04534552;
}

/// Header of a child index, after the magic number.
#[derive(Debug, Clone, Copy, FromBytes, Immutable, KnownLayout, Unaligned)]
#[repr(C)]
pub struct ChildHeader {
    /// Padding
    pub reserved: [u8; 28],
    /// Number of entry records, tombstones included
    pub entry_count: U32<BigEndian>,
}

impl ChildHeader {
    /// Child index magic ("\x05SER").
    pub const MAGIC: u32 = 0x05534552;
}

/// Storage coordinates that close every child index record.
#[derive(Debug, Clone, Copy, FromBytes, Immutable, KnownLayout, Unaligned)]
#[repr(C)]
pub struct EntryTail {
    /// Absolute offset into the resource pool
    pub resource_pos: U64<BigEndian>,
    /// Logical size
    pub size: U32<BigEndian>,
    /// Size on disk
    pub size_packed: U32<BigEndian>,
    /// Unknown, always zero so far
    pub reserved: [u8; 6],
    /// Opaque flags
    pub flags1: U16<BigEndian>,
    /// Resource pool selector
    pub flags2: U16<BigEndian>,
}
