//! Master index parser.

use std::path::Path;

use tracing::{debug, trace};
use voidtweak_common::{BinaryReader, Endian};

use crate::format::MasterHeader;
use crate::{Container, Error, Result};

/// Parse a master index into containers without entries.
///
/// `dir` is recorded as the directory of every container.
pub fn parse_master_index(data: &[u8], dir: &Path) -> Result<Vec<Container>> {
    let mut reader = BinaryReader::new(data);

    reader.expect_magic(MasterHeader::MAGIC)?;
    let header: MasterHeader = reader.read_struct()?;
    trace!("master index reserved bytes: {:02x?}", header.reserved);

    let index_count = header.index_count.get() as usize;
    let mut containers = Vec::with_capacity(index_count);
    for _ in 0..index_count {
        reader.set_endian(Endian::Little);
        let path = reader.read_prefixed_string()?;
        let resource = reader.read_prefixed_string()?;
        reader.set_endian(Endian::Big);
        containers.push(Container::new(dir, path, resource));
    }

    let resource_count = reader.read_u32()?;
    debug!(
        "Master index: {} containers, {} extra resources",
        index_count, resource_count
    );
    for _ in 0..resource_count {
        reader.set_endian(Endian::Little);
        let name = reader.read_prefixed_string()?;
        reader.set_endian(Endian::Big);
        let index = reader.read_u16()?;
        container_mut(&mut containers, index)?
            .resources
            .push(name.to_string());
    }

    let shared_count = reader.read_u32()?;
    debug!("Master index: {} shared resource groups", shared_count);
    for _ in 0..shared_count {
        let member_count = reader.read_u32()?;
        let mut members = Vec::with_capacity((member_count as usize).min(reader.remaining() / 2));
        for _ in 0..member_count {
            members.push(reader.read_u16()?);
        }
        reader.set_endian(Endian::Little);
        let name = reader.read_prefixed_string()?;
        reader.set_endian(Endian::Big);
        for index in members {
            container_mut(&mut containers, index)?
                .resources
                .push(name.to_string());
        }
    }

    if !reader.is_empty() {
        trace!("{} trailing bytes after master index", reader.remaining());
    }

    Ok(containers)
}

fn container_mut(containers: &mut [Container], index: u16) -> Result<&mut Container> {
    let count = containers.len();
    containers
        .get_mut(index as usize)
        .ok_or(Error::InvalidContainerIndex { index, count })
}
