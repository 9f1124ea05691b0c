//! Master and child index loading.
//!
//! The master index names every container and the resource pools it may
//! draw from. Each container then has a child index listing its entries.

mod child;
mod master;

use std::fs::File;
use std::io;
use std::path::Path;

use memmap2::Mmap;
use tracing::{debug, info};

use crate::format::MASTER_INDEX_NAME;
use crate::{Container, Error, Result};

pub use child::{parse_child_index, ChildIndex};
pub use master::parse_master_index;

/// Counts reported after a successful load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LoadSummary {
    /// Number of containers.
    pub containers: usize,
    /// Number of entries kept across all containers.
    pub entries: usize,
    /// Number of deleted records that were dropped.
    pub tombstones: usize,
}

/// Load the master index of `base_dir` and every child index it names.
///
/// Nothing is returned unless every file parses.
pub fn load_containers(base_dir: &Path) -> Result<(Vec<Container>, LoadSummary)> {
    let master_path = base_dir.join(MASTER_INDEX_NAME);
    info!("Loading resource indexes from {}", base_dir.display());

    let master = map_file(&master_path)?;
    let mut containers =
        parse_master_index(&master, base_dir).map_err(|e| e.in_file(&master_path))?;

    let mut summary = LoadSummary {
        containers: containers.len(),
        ..Default::default()
    };
    for (ci, container) in containers.iter_mut().enumerate() {
        let index_path = container.index_path();
        let data = map_file(&index_path)?;
        let child = parse_child_index(&data, ci).map_err(|e| e.in_file(&index_path))?;

        debug!(
            "Kept {} of {} entries in {}",
            child.entries.len(),
            child.record_count,
            container.path
        );
        summary.entries += child.entries.len();
        summary.tombstones += child.tombstones();
        container.entries = child.entries;
    }

    info!(
        "Loaded {} containers with {} entries",
        summary.containers, summary.entries
    );
    Ok((containers, summary))
}

/// Memory-map an index file.
fn map_file(path: &Path) -> Result<Mmap> {
    let file = open_file(path)?;
    // Index files are only ever read.
    let mmap = unsafe { Mmap::map(&file)? };
    Ok(mmap)
}

/// Open a file read-only, reporting a missing file as [`Error::NotFound`].
pub(crate) fn open_file(path: &Path) -> Result<File> {
    File::open(path).map_err(|e| not_found_or_io(e, path))
}

pub(crate) fn not_found_or_io(err: io::Error, path: &Path) -> Error {
    if err.kind() == io::ErrorKind::NotFound {
        Error::NotFound(path.to_path_buf())
    } else {
        Error::Io(err)
    }
}
