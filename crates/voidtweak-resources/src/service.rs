//! Single-worker archive service.
//!
//! [`ArchiveService`] moves a [`ResourceArchive`] onto a dedicated thread
//! and talks to it only through channels. Every request gets its own reply
//! channel; search matches stream over a separate channel as they are found.
//! The service runs one request at a time and rejects anything issued while
//! it is not [`ServiceState::Idle`] with [`Error::Busy`]. A worker that dies
//! mid-request leaves the service [`ServiceState::Stopped`], after which every
//! request fails with [`Error::ServiceStopped`].

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use crossbeam_channel::{Receiver, Sender, TryRecvError};
use tracing::{debug, error, warn};

use crate::index::LoadSummary;
use crate::{Entry, EntryRef, Error, ExportSummary, ResourceArchive, Result};

/// Status messages kept for a receiver that is not draining them.
const STATUS_CAPACITY: usize = 64;

/// Search matches buffered ahead of the receiver before the worker waits.
const SEARCH_BUFFER: usize = 64;

/// What the worker is doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ServiceState {
    Idle = 0,
    Loading = 1,
    Searching = 2,
    Extracting = 3,
    Inserting = 4,
    Exporting = 5,
    Stopped = 6,
}

impl ServiceState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => ServiceState::Loading,
            2 => ServiceState::Searching,
            3 => ServiceState::Extracting,
            4 => ServiceState::Inserting,
            5 => ServiceState::Exporting,
            6 => ServiceState::Stopped,
            _ => ServiceState::Idle,
        }
    }

    /// Get a lowercase name for messages.
    pub fn name(self) -> &'static str {
        match self {
            ServiceState::Idle => "idle",
            ServiceState::Loading => "loading",
            ServiceState::Searching => "searching",
            ServiceState::Extracting => "extracting",
            ServiceState::Inserting => "inserting",
            ServiceState::Exporting => "exporting",
            ServiceState::Stopped => "stopped",
        }
    }

    /// Check if the worker is handling a request.
    #[inline]
    pub fn is_busy(self) -> bool {
        !matches!(self, ServiceState::Idle | ServiceState::Stopped)
    }
}

impl fmt::Display for ServiceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A state transition published by the worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Status {
    /// State entered.
    pub state: ServiceState,
    /// Message of the error that ended the previous request, if any.
    pub error: Option<String>,
}

/// One streamed search result.
#[derive(Debug, Clone)]
pub struct SearchMatch {
    /// Reference valid until the next reload.
    pub reference: EntryRef,
    /// Snapshot of the matching entry.
    pub entry: Entry,
}

/// Shared busy flag; only `Idle` accepts a new request.
#[derive(Debug, Clone, Default)]
struct StateGate(Arc<AtomicU8>);

impl StateGate {
    fn current(&self) -> ServiceState {
        ServiceState::from_u8(self.0.load(Ordering::Acquire))
    }

    fn try_begin(&self, state: ServiceState) -> Result<()> {
        self.0
            .compare_exchange(
                ServiceState::Idle as u8,
                state as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .map(|_| ())
            .map_err(|current| match ServiceState::from_u8(current) {
                ServiceState::Stopped => Error::ServiceStopped,
                busy => Error::Busy(busy.name()),
            })
    }

    fn finish(&self) {
        self.0.store(ServiceState::Idle as u8, Ordering::Release);
    }

    fn stop(&self) {
        self.0.store(ServiceState::Stopped as u8, Ordering::Release);
    }
}

/// Held by the worker across one request; marks the service stopped if the
/// request unwinds.
struct PanicGuard<'a>(&'a StateGate);

impl Drop for PanicGuard<'_> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            error!("Archive worker panicked, service stopped");
            self.0.stop();
        }
    }
}

/// A reply that has not arrived yet.
#[derive(Debug)]
pub struct Pending<T> {
    reply: Receiver<Result<T>>,
}

impl<T> Pending<T> {
    /// Block until the worker answers.
    pub fn wait(self) -> Result<T> {
        self.reply.recv().map_err(|_| Error::ServiceStopped)?
    }

    /// Take the answer if it has arrived.
    pub fn try_take(&self) -> Option<Result<T>> {
        match self.reply.try_recv() {
            Ok(result) => Some(result),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(Err(Error::ServiceStopped)),
        }
    }
}

/// A running search.
///
/// Matches arrive one message at a time. The worker stays busy until they
/// are received; dropping the handle makes it stop at the next match. Drop
/// or drain the handle before dropping the service.
#[derive(Debug)]
pub struct SearchHandle {
    matches: Receiver<SearchMatch>,
    done: Pending<usize>,
}

impl SearchHandle {
    /// Get the match channel. Iterating it ends once the search is over.
    #[inline]
    pub fn matches(&self) -> &Receiver<SearchMatch> {
        &self.matches
    }

    /// Wait for the search to end and get the number of matches sent.
    pub fn finish(self) -> Result<usize> {
        self.done.wait()
    }
}

enum Request {
    Load {
        reply: Sender<Result<LoadSummary>>,
    },
    Search {
        query: String,
        matches: Sender<SearchMatch>,
        reply: Sender<Result<usize>>,
    },
    Extract {
        reference: EntryRef,
        reply: Sender<Result<Vec<u8>>>,
    },
    Insert {
        reference: EntryRef,
        data: Vec<u8>,
        reply: Sender<Result<()>>,
    },
    ExportToFile {
        reference: EntryRef,
        path: PathBuf,
        reply: Sender<Result<u64>>,
    },
    ImportFromFile {
        reference: EntryRef,
        path: PathBuf,
        reply: Sender<Result<()>>,
    },
    ExportAll {
        dir: PathBuf,
        reply: Sender<Result<ExportSummary>>,
    },
    Shutdown,
}

/// Handle to the archive worker thread.
pub struct ArchiveService {
    requests: Sender<Request>,
    status: Receiver<Status>,
    gate: StateGate,
    worker: Option<JoinHandle<()>>,
}

impl ArchiveService {
    /// Start a worker for the installation in `base_dir`.
    ///
    /// Nothing is loaded until [`load_indexes`](Self::load_indexes) is called.
    pub fn spawn<P: AsRef<Path>>(base_dir: P) -> Result<Self> {
        let archive = ResourceArchive::new(base_dir);
        let (requests, inbox) = crossbeam_channel::unbounded();
        let (status_tx, status) = crossbeam_channel::bounded(STATUS_CAPACITY);
        let gate = StateGate::default();

        let worker = Worker {
            archive,
            gate: gate.clone(),
            status: status_tx,
        };
        let handle = std::thread::Builder::new()
            .name("resource-archive".to_string())
            .spawn(move || worker.run(inbox))?;

        Ok(Self {
            requests,
            status,
            gate,
            worker: Some(handle),
        })
    }

    /// Get the current worker state.
    #[inline]
    pub fn state(&self) -> ServiceState {
        self.gate.current()
    }

    /// Get the channel of state transitions.
    #[inline]
    pub fn status(&self) -> &Receiver<Status> {
        &self.status
    }

    /// Load or reload all indexes.
    ///
    /// References taken before the reload must be treated as stale.
    pub fn load_indexes(&self) -> Result<Pending<LoadSummary>> {
        let (reply, pending) = reply_channel();
        self.submit(ServiceState::Loading, Request::Load { reply })?;
        Ok(pending)
    }

    /// Stream all entries whose source or destination path contains `query`.
    pub fn search(&self, query: impl Into<String>) -> Result<SearchHandle> {
        let (matches_tx, matches) = crossbeam_channel::bounded(SEARCH_BUFFER);
        let (reply, done) = reply_channel();
        self.submit(
            ServiceState::Searching,
            Request::Search {
                query: query.into(),
                matches: matches_tx,
                reply,
            },
        )?;
        Ok(SearchHandle { matches, done })
    }

    /// Read an entry's logical bytes.
    pub fn extract(&self, reference: EntryRef) -> Result<Pending<Vec<u8>>> {
        let (reply, pending) = reply_channel();
        self.submit(
            ServiceState::Extracting,
            Request::Extract { reference, reply },
        )?;
        Ok(pending)
    }

    /// Overwrite an entry's slot.
    pub fn insert(&self, reference: EntryRef, data: Vec<u8>) -> Result<Pending<()>> {
        let (reply, pending) = reply_channel();
        self.submit(
            ServiceState::Inserting,
            Request::Insert {
                reference,
                data,
                reply,
            },
        )?;
        Ok(pending)
    }

    /// Extract an entry into a local file.
    pub fn export_to_file(
        &self,
        reference: EntryRef,
        path: impl Into<PathBuf>,
    ) -> Result<Pending<u64>> {
        let (reply, pending) = reply_channel();
        self.submit(
            ServiceState::Exporting,
            Request::ExportToFile {
                reference,
                path: path.into(),
                reply,
            },
        )?;
        Ok(pending)
    }

    /// Insert a local file into an entry's slot.
    pub fn import_from_file(
        &self,
        reference: EntryRef,
        path: impl Into<PathBuf>,
    ) -> Result<Pending<()>> {
        let (reply, pending) = reply_channel();
        self.submit(
            ServiceState::Inserting,
            Request::ImportFromFile {
                reference,
                path: path.into(),
                reply,
            },
        )?;
        Ok(pending)
    }

    /// Extract every entry below `dir`.
    pub fn export_all(&self, dir: impl Into<PathBuf>) -> Result<Pending<ExportSummary>> {
        let (reply, pending) = reply_channel();
        self.submit(
            ServiceState::Exporting,
            Request::ExportAll {
                dir: dir.into(),
                reply,
            },
        )?;
        Ok(pending)
    }

    fn submit(&self, state: ServiceState, request: Request) -> Result<()> {
        self.gate.try_begin(state)?;
        if self.requests.send(request).is_err() {
            self.gate.finish();
            return Err(Error::ServiceStopped);
        }
        Ok(())
    }
}

impl Drop for ArchiveService {
    fn drop(&mut self) {
        self.requests.send(Request::Shutdown).ok();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("Archive worker panicked");
            }
        }
    }
}

impl fmt::Debug for ArchiveService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArchiveService")
            .field("state", &self.state())
            .finish()
    }
}

fn reply_channel<T>() -> (Sender<Result<T>>, Pending<T>) {
    let (reply, receiver) = crossbeam_channel::bounded(1);
    (reply, Pending { reply: receiver })
}

/// State owned by the worker thread.
struct Worker {
    archive: ResourceArchive,
    gate: StateGate,
    status: Sender<Status>,
}

impl Worker {
    fn run(mut self, inbox: Receiver<Request>) {
        debug!("Archive worker started");
        for request in inbox.iter() {
            let _guard = PanicGuard(&self.gate);
            match request {
                Request::Load { reply } => {
                    self.publish(ServiceState::Loading, None);
                    let result = self.archive.reload();
                    self.complete(reply, result);
                }
                Request::Search {
                    query,
                    matches,
                    reply,
                } => {
                    self.publish(ServiceState::Searching, None);
                    debug!("Searching for: {}", query);
                    let mut sent = 0;
                    for reference in self.archive.search(&query) {
                        let Ok(entry) = self.archive.get(reference) else {
                            continue;
                        };
                        let found = SearchMatch {
                            reference,
                            entry: entry.clone(),
                        };
                        if matches.send(found).is_err() {
                            debug!("Search receiver dropped, stopping");
                            break;
                        }
                        sent += 1;
                    }
                    debug!("Finished searching, {} matches", sent);
                    self.gate.finish();
                    self.publish(ServiceState::Idle, None);
                    drop(matches);
                    reply.send(Ok(sent)).ok();
                }
                Request::Extract { reference, reply } => {
                    self.publish(ServiceState::Extracting, None);
                    let result = self.archive.extract(reference);
                    self.complete(reply, result);
                }
                Request::Insert {
                    reference,
                    data,
                    reply,
                } => {
                    self.publish(ServiceState::Inserting, None);
                    let result = self.archive.insert(reference, &data);
                    self.complete(reply, result);
                }
                Request::ExportToFile {
                    reference,
                    path,
                    reply,
                } => {
                    self.publish(ServiceState::Exporting, None);
                    let result = self.archive.export_to_file(reference, &path);
                    self.complete(reply, result);
                }
                Request::ImportFromFile {
                    reference,
                    path,
                    reply,
                } => {
                    self.publish(ServiceState::Inserting, None);
                    let result = self.archive.import_from_file(reference, &path);
                    self.complete(reply, result);
                }
                Request::ExportAll { dir, reply } => {
                    self.publish(ServiceState::Exporting, None);
                    let result = self.archive.export_all(&dir);
                    self.complete(reply, result);
                }
                Request::Shutdown => break,
            }
        }
        debug!("Archive worker stopped");
    }

    /// Return to idle, then answer. The gate opens before the reply so a
    /// caller reacting to the reply can issue its next request at once.
    fn complete<T>(&self, reply: Sender<Result<T>>, result: Result<T>) {
        let error = result.as_ref().err().map(|e| {
            warn!("Request failed: {}", e);
            e.to_string()
        });
        self.gate.finish();
        self.publish(ServiceState::Idle, error);
        reply.send(result).ok();
    }

    fn publish(&self, state: ServiceState, error: Option<String>) {
        self.status.try_send(Status { state, error }).ok();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gate_rejects_while_busy() {
        let gate = StateGate::default();
        assert_eq!(gate.current(), ServiceState::Idle);

        gate.try_begin(ServiceState::Loading).unwrap();
        assert_eq!(gate.current(), ServiceState::Loading);
        assert!(matches!(
            gate.try_begin(ServiceState::Searching),
            Err(Error::Busy("loading"))
        ));

        gate.finish();
        assert!(gate.try_begin(ServiceState::Searching).is_ok());

        gate.stop();
        assert!(matches!(
            gate.try_begin(ServiceState::Loading),
            Err(Error::ServiceStopped)
        ));
    }

    #[test]
    fn test_worker_panic_stops_service() {
        let gate = StateGate::default();
        let (requests, inbox) = crossbeam_channel::unbounded::<Request>();
        let (_status_tx, status) = crossbeam_channel::bounded(STATUS_CAPACITY);
        let worker_gate = gate.clone();
        let worker = std::thread::spawn(move || {
            let _request = inbox.recv();
            let _guard = PanicGuard(&worker_gate);
            panic!("request failed on the worker");
        });
        let service = ArchiveService {
            requests,
            status,
            gate,
            worker: Some(worker),
        };

        let result = service.insert(EntryRef::new(0, 0), vec![1, 2, 3]).unwrap().wait();
        assert!(matches!(result, Err(Error::ServiceStopped)));
        assert_eq!(service.state(), ServiceState::Stopped);
        assert!(!service.state().is_busy());

        assert!(matches!(
            service.extract(EntryRef::new(0, 0)),
            Err(Error::ServiceStopped)
        ));
        assert!(matches!(service.load_indexes(), Err(Error::ServiceStopped)));
    }

    #[test]
    fn test_failed_load_reports_status() {
        let dir = tempfile::tempdir().unwrap();
        let service = ArchiveService::spawn(dir.path()).unwrap();

        let result = service.load_indexes().unwrap().wait();
        assert!(matches!(result, Err(Error::NotFound(_))));
        assert_eq!(service.state(), ServiceState::Idle);

        let statuses: Vec<Status> = service.status().try_iter().collect();
        assert_eq!(statuses.first().map(|s| s.state), Some(ServiceState::Loading));
        let last = statuses.last().unwrap();
        assert_eq!(last.state, ServiceState::Idle);
        assert!(last.error.as_deref().unwrap().contains("master.index"));
    }

    #[test]
    fn test_stale_reference_before_load() {
        let dir = tempfile::tempdir().unwrap();
        let service = ArchiveService::spawn(dir.path()).unwrap();

        let result = service.extract(EntryRef::new(0, 0)).unwrap().wait();
        assert!(matches!(result, Err(Error::StaleReference { .. })));

        let search = service.search("anything").unwrap();
        assert_eq!(search.matches().iter().count(), 0);
        assert_eq!(search.finish().unwrap(), 0);
    }
}
