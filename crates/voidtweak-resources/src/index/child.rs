//! Child index parser.

use tracing::trace;
use voidtweak_common::{BinaryReader, Endian};

use crate::format::{ChildHeader, EntryTail};
use crate::{Entry, Result};

/// Smallest possible record: id, three empty strings and the tail.
const MIN_RECORD_SIZE: usize = 4 + 3 * 4 + std::mem::size_of::<EntryTail>();

/// Entries parsed from one child index.
#[derive(Debug, Clone, Default)]
pub struct ChildIndex {
    /// Entries kept after dropping tombstones, positioned sequentially.
    pub entries: Vec<Entry>,
    /// Number of records on disk, tombstones included.
    pub record_count: u32,
}

impl ChildIndex {
    /// Number of deleted records that were dropped.
    #[inline]
    pub fn tombstones(&self) -> usize {
        self.record_count as usize - self.entries.len()
    }
}

/// Parse a child index, assigning its entries to `container`.
pub fn parse_child_index(data: &[u8], container: usize) -> Result<ChildIndex> {
    let mut reader = BinaryReader::new(data);

    reader.expect_magic(ChildHeader::MAGIC)?;
    let header: ChildHeader = reader.read_struct()?;

    let record_count = header.entry_count.get();
    let mut entries =
        Vec::with_capacity((record_count as usize).min(reader.remaining() / MIN_RECORD_SIZE));

    for _ in 0..record_count {
        let index_pos = reader.position() as u64;
        let id = reader.read_u32()?;

        reader.set_endian(Endian::Little);
        let type_name = reader.read_prefixed_string()?;
        let src = reader.read_prefixed_string()?;
        let dst = reader.read_prefixed_string()?;
        reader.set_endian(Endian::Big);

        let tail: EntryTail = reader.read_struct()?;
        let size = tail.size.get();
        let size_packed = tail.size_packed.get();
        if size == 0 || size_packed == 0 {
            trace!("Dropping deleted record {} at {:#x}", id, index_pos);
            continue;
        }

        entries.push(Entry {
            container,
            index: entries.len(),
            index_pos,
            id,
            type_name: type_name.to_string(),
            src: src.to_string(),
            dst: dst.to_string(),
            resource_pos: tail.resource_pos.get(),
            size,
            size_packed,
            flags1: tail.flags1.get(),
            flags2: tail.flags2.get(),
        });
    }

    Ok(ChildIndex {
        entries,
        record_count,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    fn le_string(out: &mut Vec<u8>, s: &str) {
        out.extend_from_slice(&(s.len() as u32).to_le_bytes());
        out.extend_from_slice(s.as_bytes());
    }

    fn header(count: u32) -> Vec<u8> {
        let mut out = ChildHeader::MAGIC.to_be_bytes().to_vec();
        out.extend_from_slice(&[0u8; 28]);
        out.extend_from_slice(&count.to_be_bytes());
        out
    }

    #[allow(clippy::too_many_arguments)]
    fn record(
        out: &mut Vec<u8>,
        id: u32,
        dst: &str,
        resource_pos: u64,
        size: u32,
        size_packed: u32,
        flags1: u16,
        flags2: u16,
    ) {
        out.extend_from_slice(&id.to_be_bytes());
        le_string(out, "rs_streamfile");
        le_string(out, "");
        le_string(out, dst);
        out.extend_from_slice(&resource_pos.to_be_bytes());
        out.extend_from_slice(&size.to_be_bytes());
        out.extend_from_slice(&size_packed.to_be_bytes());
        out.extend_from_slice(&[0u8; 6]);
        out.extend_from_slice(&flags1.to_be_bytes());
        out.extend_from_slice(&flags2.to_be_bytes());
    }

    #[test]
    fn test_parse_records() {
        let mut data = header(2);
        record(&mut data, 10, "models/foo/mesh.bwm", 0x1000, 100, 100, 3, 0x8000);
        let second_pos = data.len() as u64;
        record(&mut data, 11, "decls/a.decl", 0x2000, 400, 120, 0, 1 << 2);

        let index = parse_child_index(&data, 4).unwrap();
        assert_eq!(index.record_count, 2);
        assert_eq!(index.entries.len(), 2);

        let first = &index.entries[0];
        assert_eq!(first.container, 4);
        assert_eq!(first.index, 0);
        assert_eq!(first.index_pos, 36);
        assert_eq!(first.id, 10);
        assert_eq!(first.type_name, "rs_streamfile");
        assert_eq!(first.src, "");
        assert_eq!(first.dst, "models/foo/mesh.bwm");
        assert_eq!(first.resource_pos, 0x1000);
        assert_eq!(first.flags1, 3);
        assert_eq!(first.flags2, 0x8000);

        let second = &index.entries[1];
        assert_eq!(second.index, 1);
        assert_eq!(second.index_pos, second_pos);
        assert_eq!(second.size, 400);
        assert_eq!(second.size_packed, 120);
    }

    #[test]
    fn test_tombstones_dropped() {
        let mut data = header(4);
        record(&mut data, 1, "a", 0, 0, 10, 0, 0);
        record(&mut data, 2, "b", 0, 10, 10, 0, 0);
        record(&mut data, 3, "c", 0, 10, 0, 0, 0);
        record(&mut data, 4, "d", 10, 20, 8, 0, 0);

        let index = parse_child_index(&data, 0).unwrap();
        assert_eq!(index.record_count, 4);
        assert_eq!(index.tombstones(), 2);

        let ids: Vec<u32> = index.entries.iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![2, 4]);
        let positions: Vec<usize> = index.entries.iter().map(|e| e.index).collect();
        assert_eq!(positions, vec![0, 1]);
        assert!(index.entries.iter().all(|e| e.size != 0 && e.size_packed != 0));
    }

    #[test]
    fn test_bad_magic() {
        let mut data = header(0);
        data[0] = 0x04;

        assert!(matches!(
            parse_child_index(&data, 0),
            Err(Error::BadMagic {
                expected: 0x05534552,
                actual: 0x04534552,
                ..
            })
        ));
    }

    #[test]
    fn test_truncated_record() {
        let mut data = header(2);
        record(&mut data, 1, "a", 0, 10, 10, 0, 0);
        data.extend_from_slice(&[0, 0, 0, 2, 9, 0]);

        assert!(matches!(parse_child_index(&data, 0), Err(Error::Truncated(_))));
    }
}
