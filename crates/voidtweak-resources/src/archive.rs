//! Resource archive access.
//!
//! [`ResourceArchive`] owns the loaded container/entry graph and performs all
//! reads and writes against the resource pools. Entries are addressed by
//! [`EntryRef`]; every access checks the reference against the current
//! graph.

use std::fs::{self, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Component, Path, PathBuf};

use memchr::memmem;
use tracing::{debug, info, warn};

use crate::compress;
use crate::index::{self, not_found_or_io, open_file, LoadSummary};
use crate::{Container, Entry, EntryRef, Error, Result};

/// Counts reported by a full export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExportSummary {
    /// Number of files written.
    pub files: usize,
    /// Number of payload bytes written.
    pub bytes: u64,
}

/// The loaded resource indexes of one game installation.
pub struct ResourceArchive {
    /// Directory holding `master.index`
    base_dir: PathBuf,
    /// Loaded containers, empty until a load succeeds
    containers: Vec<Container>,
}

impl ResourceArchive {
    /// Create an archive for `base_dir` without loading anything.
    pub fn new<P: AsRef<Path>>(base_dir: P) -> Self {
        Self {
            base_dir: base_dir.as_ref().to_path_buf(),
            containers: Vec::new(),
        }
    }

    /// Open the archive in `base_dir` and load all indexes.
    pub fn open<P: AsRef<Path>>(base_dir: P) -> Result<Self> {
        let mut archive = Self::new(base_dir);
        archive.reload()?;
        Ok(archive)
    }

    /// Replace the loaded graph with a fresh load of the indexes.
    ///
    /// The previous graph is discarded first, so a failed reload leaves the
    /// archive empty. References taken before a reload may be stale.
    pub fn reload(&mut self) -> Result<LoadSummary> {
        self.containers.clear();
        let (containers, summary) = index::load_containers(&self.base_dir)?;
        self.containers = containers;
        Ok(summary)
    }

    /// Get the base directory.
    #[inline]
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Get the loaded containers.
    #[inline]
    pub fn containers(&self) -> &[Container] {
        &self.containers
    }

    /// Get the number of containers.
    #[inline]
    pub fn container_count(&self) -> usize {
        self.containers.len()
    }

    /// Get the number of entries across all containers.
    pub fn entry_count(&self) -> usize {
        self.containers.iter().map(Container::entry_count).sum()
    }

    /// Iterate over all entries in container order.
    pub fn iter(&self) -> impl Iterator<Item = &Entry> + '_ {
        self.containers.iter().flat_map(|c| c.entries.iter())
    }

    /// Resolve the container of a reference.
    pub fn container(&self, reference: EntryRef) -> Result<&Container> {
        self.containers
            .get(reference.container)
            .ok_or(Error::StaleReference {
                reference,
                reason: "invalid container",
            })
    }

    /// Resolve an entry reference.
    pub fn get(&self, reference: EntryRef) -> Result<&Entry> {
        self.container(reference)?
            .entries
            .get(reference.entry)
            .ok_or(Error::StaleReference {
                reference,
                reason: "invalid entry",
            })
    }

    /// Resolve the resource pool file holding an entry's payload.
    pub fn resource_path(&self, reference: EntryRef) -> Result<PathBuf> {
        let container = self.container(reference)?;
        let entry = self.get(reference)?;
        container
            .resource_path(entry.flags2)
            .ok_or(Error::UnresolvedResource {
                reference,
                index: container.resource_index(entry.flags2).unwrap_or(0),
                count: container.resources.len(),
            })
    }

    /// Read an entry's logical bytes.
    pub fn extract(&self, reference: EntryRef) -> Result<Vec<u8>> {
        let entry = self.get(reference)?;
        let path = self.resource_path(reference)?;
        debug!("Starting extraction of {}", entry);

        let mut file = open_file(&path)?;
        let file_len = file.metadata()?.len();
        if entry.resource_pos > file_len {
            return Err(Error::Truncated(format!(
                "{} starts at {:#x}, beyond the end of {} ({} bytes)",
                reference,
                entry.resource_pos,
                path.display(),
                file_len
            )));
        }
        file.seek(SeekFrom::Start(entry.resource_pos))?;

        let mut packed = Vec::with_capacity(entry.size_packed as usize);
        file.take(entry.size_packed as u64).read_to_end(&mut packed)?;
        if packed.len() != entry.size_packed as usize {
            return Err(Error::Truncated(format!(
                "{} needs {} bytes at {:#x} but {} ends after {}",
                reference,
                entry.size_packed,
                entry.resource_pos,
                path.display(),
                packed.len()
            )));
        }

        let data = if entry.is_compressed() {
            compress::decompress_sized(&packed, entry.size as usize)?
        } else {
            packed
        };

        debug!("Finished extraction, {} bytes", data.len());
        Ok(data)
    }

    /// Overwrite an entry's slot with a new logical payload.
    ///
    /// The slot keeps its size: the payload is compressed if the slot is,
    /// must fit in the packed size, and is zero-padded up to it. The index
    /// records are never modified, and nothing is written when the payload
    /// is rejected.
    pub fn insert(&self, reference: EntryRef, data: &[u8]) -> Result<()> {
        let entry = self.get(reference)?;
        let path = self.resource_path(reference)?;
        debug!("Starting insertion of {}", entry);

        let mut packed = if entry.is_compressed() {
            compress::compress(data)?
        } else {
            data.to_vec()
        };
        if packed.len() > entry.size_packed as usize {
            return Err(Error::OversizedPayload {
                size: packed.len(),
                capacity: entry.size_packed,
            });
        }
        if entry.is_compressed() && data.len() != entry.size as usize {
            return Err(Error::SizeMismatch {
                expected: entry.size,
                actual: data.len(),
            });
        }
        packed.resize(entry.size_packed as usize, 0);

        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&path)
            .map_err(|e| not_found_or_io(e, &path))?;
        let file_len = file.metadata()?.len();
        match slot_end(entry) {
            Some(end) if end <= file_len => {}
            end => {
                return Err(Error::Truncated(format!(
                    "slot of {} ends at {}, beyond the end of {} ({} bytes)",
                    reference,
                    describe_end(end),
                    path.display(),
                    file_len
                )));
            }
        }

        file.seek(SeekFrom::Start(entry.resource_pos))?;
        file.write_all(&packed)?;
        file.flush()?;

        debug!("Finished insertion, {} bytes", packed.len());
        Ok(())
    }

    /// Find entries whose source or destination path contains `query`.
    ///
    /// The scan is lazy; matches are produced in container order as the
    /// iterator advances. Matching is case-sensitive.
    pub fn search<'a>(&'a self, query: &'a str) -> impl Iterator<Item = EntryRef> + 'a {
        let finder = memmem::Finder::new(query.as_bytes());
        self.iter()
            .filter(move |e| {
                finder.find(e.src.as_bytes()).is_some() || finder.find(e.dst.as_bytes()).is_some()
            })
            .map(Entry::reference)
    }

    /// Extract an entry into a local file.
    pub fn export_to_file<P: AsRef<Path>>(&self, reference: EntryRef, path: P) -> Result<u64> {
        let data = self.extract(reference)?;
        fs::write(path.as_ref(), &data)?;
        Ok(data.len() as u64)
    }

    /// Insert the contents of a local file into an entry's slot.
    pub fn import_from_file<P: AsRef<Path>>(&self, reference: EntryRef, path: P) -> Result<()> {
        let path = path.as_ref();
        let data = fs::read(path).map_err(|e| not_found_or_io(e, path))?;
        self.insert(reference, &data)
    }

    /// Extract every entry below `dir`, using its destination path.
    pub fn export_all<P: AsRef<Path>>(&self, dir: P) -> Result<ExportSummary> {
        self.export_all_with(dir, |_, _, _| {})
    }

    /// Extract every entry below `dir`, reporting progress.
    ///
    /// The callback receives the number of entries handled so far, the
    /// total, and the entry just handled. Entries without a destination path
    /// are skipped. The first failure aborts the export.
    pub fn export_all_with<P, F>(&self, dir: P, mut progress: F) -> Result<ExportSummary>
    where
        P: AsRef<Path>,
        F: FnMut(usize, usize, &Entry),
    {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;
        info!("Starting full export to {}", dir.display());

        let total = self.entry_count();
        let mut summary = ExportSummary::default();
        for (done, entry) in self.iter().enumerate() {
            if entry.dst.is_empty() {
                debug!("Skipping {} without destination", entry);
                progress(done + 1, total, entry);
                continue;
            }

            let output_path = export_path(dir, &entry.dst)?;
            if let Some(parent) = output_path.parent() {
                fs::create_dir_all(parent)?;
            }
            summary.bytes += self.export_to_file(entry.reference(), &output_path)?;
            summary.files += 1;
            progress(done + 1, total, entry);
        }

        info!(
            "Exported {} files, {} MiB",
            summary.files,
            summary.bytes / 1024 / 1024
        );
        Ok(summary)
    }

    /// Check that every entry's slot lies inside an existing resource pool.
    ///
    /// Returns one error per entry that would fail to extract for lack of
    /// data; payload contents are not read.
    pub fn verify(&self) -> Vec<(EntryRef, Error)> {
        let mut failures = Vec::new();
        for container in &self.containers {
            let sizes: Vec<Option<u64>> = container
                .resources
                .iter()
                .map(|name| {
                    fs::metadata(crate::container::join_relative(&container.dir, name))
                        .map(|m| m.len())
                        .ok()
                })
                .collect();

            for entry in &container.entries {
                let reference = entry.reference();
                let Some(index) = container
                    .resource_index(entry.flags2)
                    .filter(|&i| i < sizes.len())
                else {
                    failures.push((
                        reference,
                        Error::UnresolvedResource {
                            reference,
                            index: container.resource_index(entry.flags2).unwrap_or(0),
                            count: container.resources.len(),
                        },
                    ));
                    continue;
                };

                match sizes[index] {
                    None => failures.push((
                        reference,
                        Error::NotFound(crate::container::join_relative(
                            &container.dir,
                            &container.resources[index],
                        )),
                    )),
                    Some(len) => match slot_end(entry) {
                        Some(end) if end <= len => {}
                        end => failures.push((
                            reference,
                            Error::Truncated(format!(
                                "slot of {} ends at {}, beyond the end of {} ({} bytes)",
                                reference,
                                describe_end(end),
                                container.resources[index],
                                len
                            )),
                        )),
                    },
                }
            }
        }

        if !failures.is_empty() {
            warn!("{} entries do not fit their resource pools", failures.len());
        }
        failures
    }
}

impl std::fmt::Debug for ResourceArchive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceArchive")
            .field("base_dir", &self.base_dir)
            .field("containers", &self.containers.len())
            .finish()
    }
}

/// End offset of an entry's slot, `None` if it does not fit in a u64.
fn slot_end(entry: &Entry) -> Option<u64> {
    entry.resource_pos.checked_add(entry.size_packed as u64)
}

fn describe_end(end: Option<u64>) -> String {
    match end {
        Some(end) => format!("{:#x}", end),
        None => "an offset past u64::MAX".to_string(),
    }
}

/// Map a destination virtual path below `dir`, refusing paths that escape it.
fn export_path(dir: &Path, dst: &str) -> Result<PathBuf> {
    let relative = Path::new(dst);
    if relative
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
    {
        return Err(Error::InvalidPath(dst.to_string()));
    }
    Ok(dir.join(relative))
}
