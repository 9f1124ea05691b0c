//! Builds resource archives on disk for integration tests.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use byteorder::{BigEndian, LittleEndian, WriteBytesExt};
use voidtweak_resources::compress;

/// One child index record as stored on disk.
#[derive(Debug, Clone, Default)]
pub struct Record {
    pub id: u32,
    pub type_name: String,
    pub src: String,
    pub dst: String,
    pub resource_pos: u64,
    pub size: u32,
    pub size_packed: u32,
    pub flags1: u16,
    pub flags2: u16,
}

struct ContainerSpec {
    index: String,
    first_resource: String,
    records: Vec<Record>,
}

/// Collects containers, records and pool contents, then writes them out.
#[derive(Default)]
pub struct ArchiveBuilder {
    containers: Vec<ContainerSpec>,
    extra: Vec<(String, u16)>,
    shared: Vec<(Vec<u16>, String)>,
    pools: BTreeMap<String, Vec<u8>>,
    next_id: u32,
}

impl ArchiveBuilder {
    pub fn new() -> Self {
        Self {
            next_id: 100,
            ..Default::default()
        }
    }

    pub fn container(&mut self, index: &str, first_resource: &str) -> u16 {
        self.containers.push(ContainerSpec {
            index: index.to_string(),
            first_resource: first_resource.to_string(),
            records: Vec::new(),
        });
        self.pools.entry(first_resource.to_string()).or_default();
        (self.containers.len() - 1) as u16
    }

    pub fn extra_resource(&mut self, container: u16, name: &str) {
        self.extra.push((name.to_string(), container));
        self.pools.entry(name.to_string()).or_default();
    }

    pub fn shared_resource(&mut self, containers: &[u16], name: &str) {
        self.shared.push((containers.to_vec(), name.to_string()));
        self.pools.entry(name.to_string()).or_default();
    }

    /// Append a record as-is.
    pub fn record(&mut self, container: u16, record: Record) {
        self.containers[container as usize].records.push(record);
    }

    /// Store `data` uncompressed in `pool` and add a record pointing at it.
    pub fn stored(&mut self, container: u16, pool: &str, flags2: u16, dst: &str, data: &[u8]) {
        let resource_pos = self.append(pool, data);
        let record = Record {
            id: self.id(),
            type_name: "rs_streamfile".to_string(),
            src: format!("source/{}", dst),
            dst: dst.to_string(),
            resource_pos,
            size: data.len() as u32,
            size_packed: data.len() as u32,
            flags1: 0,
            flags2,
        };
        self.record(container, record);
    }

    /// Store `data` compressed in a slot `slack` bytes larger than needed.
    pub fn compressed(
        &mut self,
        container: u16,
        pool: &str,
        flags2: u16,
        dst: &str,
        data: &[u8],
        slack: usize,
    ) {
        let mut packed = zlib(data);
        packed.resize(packed.len() + slack, 0);
        let resource_pos = self.append(pool, &packed);
        let record = Record {
            id: self.id(),
            type_name: "decl".to_string(),
            src: String::new(),
            dst: dst.to_string(),
            resource_pos,
            size: data.len() as u32,
            size_packed: packed.len() as u32,
            flags1: 1,
            flags2,
        };
        self.record(container, record);
    }

    /// Add a deleted record.
    pub fn tombstone(&mut self, container: u16, dst: &str) {
        let record = Record {
            id: self.id(),
            type_name: "rs_streamfile".to_string(),
            dst: dst.to_string(),
            size: 0,
            size_packed: 32,
            ..Default::default()
        };
        self.record(container, record);
    }

    pub fn write(&self, dir: &Path) {
        fs::write(dir.join("master.index"), self.master_index()).unwrap();
        for container in &self.containers {
            fs::write(dir.join(&container.index), child_index(&container.records)).unwrap();
        }
        for (name, data) in &self.pools {
            fs::write(dir.join(name), data).unwrap();
        }
    }

    pub fn master_index(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.write_u32::<BigEndian>(0x04534552).unwrap();
        out.write_u16::<BigEndian>(2).unwrap();
        out.write_u16::<BigEndian>(self.containers.len() as u16).unwrap();
        for container in &self.containers {
            le_string(&mut out, &container.index);
            le_string(&mut out, &container.first_resource);
        }

        out.write_u32::<BigEndian>(self.extra.len() as u32).unwrap();
        for (name, container) in &self.extra {
            le_string(&mut out, name);
            out.write_u16::<BigEndian>(*container).unwrap();
        }

        out.write_u32::<BigEndian>(self.shared.len() as u32).unwrap();
        for (containers, name) in &self.shared {
            out.write_u32::<BigEndian>(containers.len() as u32).unwrap();
            for container in containers {
                out.write_u16::<BigEndian>(*container).unwrap();
            }
            le_string(&mut out, name);
        }
        out
    }

    fn append(&mut self, pool: &str, data: &[u8]) -> u64 {
        let pool = self.pools.entry(pool.to_string()).or_default();
        let pos = pool.len() as u64;
        pool.extend_from_slice(data);
        pos
    }

    fn id(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }
}

pub fn child_index(records: &[Record]) -> Vec<u8> {
    let mut out = Vec::new();
    out.write_u32::<BigEndian>(0x05534552).unwrap();
    out.extend_from_slice(&[0u8; 28]);
    out.write_u32::<BigEndian>(records.len() as u32).unwrap();
    for r in records {
        out.write_u32::<BigEndian>(r.id).unwrap();
        le_string(&mut out, &r.type_name);
        le_string(&mut out, &r.src);
        le_string(&mut out, &r.dst);
        out.write_u64::<BigEndian>(r.resource_pos).unwrap();
        out.write_u32::<BigEndian>(r.size).unwrap();
        out.write_u32::<BigEndian>(r.size_packed).unwrap();
        out.extend_from_slice(&[0u8; 6]);
        out.write_u16::<BigEndian>(r.flags1).unwrap();
        out.write_u16::<BigEndian>(r.flags2).unwrap();
    }
    out
}

pub fn le_string(out: &mut Vec<u8>, s: &str) {
    out.write_u32::<LittleEndian>(s.len() as u32).unwrap();
    out.extend_from_slice(s.as_bytes());
}

/// Pack data the way the archive writes compressed slots.
pub fn zlib(data: &[u8]) -> Vec<u8> {
    compress::compress(data).unwrap()
}

/// Text that compresses well, for compressed slots.
pub fn decl_text(lines: usize) -> Vec<u8> {
    let mut text = b"Version 6\n".to_vec();
    for i in 0..lines {
        text.extend_from_slice(
            format!("entityDef player_{} {{ edit = {{ health = {}; }} }}\n", i % 4, i % 7).as_bytes(),
        );
    }
    text
}

/// Bytes that do not compress, for stored slots.
pub fn noise(len: usize, seed: u32) -> Vec<u8> {
    let mut state = seed.wrapping_mul(2654435761).wrapping_add(1);
    (0..len)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            (state >> 24) as u8
        })
        .collect()
}

/// The standard two-container layout used by most tests.
///
/// Container 0 (`game1.index`): pools `game1.resources`, `shared_2_3.sharedrsc`
/// - 0: stored, 100 bytes, `models/foo/mesh.bwm`
/// - tombstone
/// - 1: compressed, `decls/player.decl`
/// - 2: shared pool, `textures/common/sky.tga`
///
/// Container 1 (`game2.index`): pools `game2.resources`, `game2_001.resources`,
/// `shared_2_3.sharedrsc`
/// - zero-length record, dropped as a tombstone
/// - 0: second pool, `levels/dunwall/map.entities`
/// - 1: selector out of range, `broken/bad.bin`
pub fn standard_archive(dir: &Path) -> ArchiveBuilder {
    let mut b = ArchiveBuilder::new();
    let game1 = b.container("game1.index", "game1.resources");
    let game2 = b.container("game2.index", "game2.resources");
    b.extra_resource(game2, "game2_001.resources");
    b.shared_resource(&[game1, game2], "shared_2_3.sharedrsc");

    b.stored(game1, "game1.resources", 0, "models/foo/mesh.bwm", &noise(100, 1));
    b.tombstone(game1, "models/deleted.bwm");
    b.compressed(game1, "game1.resources", 0, "decls/player.decl", &decl_text(40), 64);
    b.stored(game1, "shared_2_3.sharedrsc", 0x8000, "textures/common/sky.tga", &noise(48, 2));

    b.stored(game2, "game2.resources", 0, "levels/dunwall/padding.bin", &[]);
    b.compressed(
        game2,
        "game2_001.resources",
        1 << 2,
        "levels/dunwall/map.entities",
        &decl_text(10),
        0,
    );
    b.stored(game2, "game2.resources", 7 << 2, "broken/bad.bin", &noise(8, 3));

    b.write(dir);
    b
}
