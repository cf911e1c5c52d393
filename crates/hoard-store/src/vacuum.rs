use crate::entry::{decode_header, is_expired, ENTRY_HEADER_LEN};
use crate::error::StoreError;
use crate::lock::LockRegistry;
use crate::util::{now_secs, remove_file_best_effort};
use crossbeam_channel as channel;
use serde::Serialize;
use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use walkdir::WalkDir;

/// Counts from one vacuum pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct VacuumReport {
    /// Regular files visited.
    pub scanned: u64,
    /// Expired files deleted.
    pub removed: u64,
    /// Files left alone because they could not be opened, read or deleted.
    pub skipped: u64,
    /// Files whose expiry is still in the future.
    pub live: u64,
}

/// One entry file as seen by [`scan`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct EntryInfo {
    pub path: PathBuf,
    pub size_bytes: u64,
    /// `None` when the file is shorter than the expiry header.
    pub expires_at: Option<u64>,
    pub expired: bool,
}

/// Walks `root` and deletes every expired entry file.
///
/// Each file is inspected under its exclusive path lock so a deletion never races a
/// `get` or `set` for the same key. Per-file failures are counted and skipped.
pub fn sweep(root: &Path, locks: &LockRegistry) -> VacuumReport {
    let mut report = VacuumReport::default();

    for entry in WalkDir::new(root).follow_links(false) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                if is_root_error(&err, root) {
                    tracing::warn!(
                        target: "hoard.store",
                        root = %root.display(),
                        error = %err,
                        "vacuum could not walk cache directory"
                    );
                    break;
                }
                // Entries can vanish under us; keep walking.
                tracing::debug!(target: "hoard.store", error = %err, "vacuum skipped path");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        report.scanned += 1;

        let path = entry.path();
        let _guard = locks.lock_at(path).write();

        let expires_at = match read_expiry(path) {
            Ok(expires_at) => expires_at,
            Err(err) => {
                if err.kind() != io::ErrorKind::NotFound {
                    tracing::debug!(
                        target: "hoard.store",
                        path = %path.display(),
                        error = %err,
                        "vacuum skipped unreadable entry"
                    );
                }
                report.skipped += 1;
                continue;
            }
        };

        if !is_expired(expires_at, now_secs()) {
            report.live += 1;
            continue;
        }

        if remove_file_best_effort(path, "vacuum.expired") {
            report.removed += 1;
        } else {
            report.skipped += 1;
        }
    }

    report
}

/// Lists entry files under `root` with their expiry, without locking or deleting.
pub fn scan(root: &Path) -> Result<Vec<EntryInfo>, StoreError> {
    let now = now_secs();
    let mut entries = Vec::new();

    for entry in WalkDir::new(root).follow_links(false).sort_by_file_name() {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let size_bytes = match entry.metadata() {
            Ok(meta) => meta.len(),
            Err(_) => continue,
        };
        let expires_at = read_expiry(entry.path()).ok();
        entries.push(EntryInfo {
            path: entry.into_path(),
            size_bytes,
            expires_at,
            expired: expires_at.is_some_and(|at| is_expired(at, now)),
        });
    }

    Ok(entries)
}

fn read_expiry(path: &Path) -> io::Result<u64> {
    let mut header = [0u8; ENTRY_HEADER_LEN];
    let mut file = File::open(path)?;
    file.read_exact(&mut header)?;
    Ok(decode_header(header))
}

fn is_root_error(err: &walkdir::Error, root: &Path) -> bool {
    err.depth() == 0 || err.path() == Some(root)
}

/// Background thread running [`sweep`] on a fixed interval until stopped.
#[derive(Debug)]
pub(crate) struct VacuumWorker {
    stop_tx: Option<channel::Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl VacuumWorker {
    pub(crate) fn spawn(
        root: PathBuf,
        locks: Arc<LockRegistry>,
        interval: Duration,
    ) -> Result<Self, StoreError> {
        let (stop_tx, stop_rx) = channel::bounded::<()>(0);
        let thread = std::thread::Builder::new()
            .name("hoard-vacuum".to_string())
            .spawn(move || run_vacuum_loop(&root, &locks, interval, stop_rx))
            .map_err(StoreError::VacuumSpawn)?;

        Ok(Self {
            stop_tx: Some(stop_tx),
            thread: Some(thread),
        })
    }

    /// Stops the timer and waits for an in-flight pass to finish.
    pub(crate) fn shutdown(&mut self) {
        // Dropping the sender disconnects the stop channel, which wakes the loop.
        self.stop_tx.take();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                tracing::warn!(target: "hoard.store", "vacuum worker panicked");
            }
        }
    }
}

impl Drop for VacuumWorker {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_vacuum_loop(
    root: &Path,
    locks: &LockRegistry,
    interval: Duration,
    stop_rx: channel::Receiver<()>,
) {
    tracing::info!(
        target: "hoard.store",
        root = %root.display(),
        interval_ms = interval.as_millis() as u64,
        "vacuum worker started"
    );
    let ticker = channel::tick(interval);

    loop {
        channel::select! {
            recv(stop_rx) -> _ => break,
            recv(ticker) -> _ => {
                let started = Instant::now();
                let report = sweep(root, locks);
                tracing::debug!(
                    target: "hoard.store",
                    scanned = report.scanned,
                    removed = report.removed,
                    skipped = report.skipped,
                    live = report.live,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "vacuum pass finished"
                );
            }
        }
    }

    tracing::info!(target: "hoard.store", root = %root.display(), "vacuum worker stopped");
}
