use crate::config::StoreConfig;
use crate::entry::{decode, encode, ENTRY_HEADER_LEN};
use crate::error::{Result, StoreError};
use crate::lock::LockRegistry;
use crate::shard::shard_path;
use crate::util::{now_secs, remove_file_best_effort};
use crate::vacuum::{sweep, VacuumReport, VacuumWorker};
use parking_lot::Mutex;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// On-disk TTL cache keyed by opaque strings.
///
/// `get` and `set` are safe to call from any number of threads; operations on the same
/// key are serialized by a per-path read/write lock, operations on different keys never
/// wait on each other. A background worker deletes expired entries every
/// `vacuum_interval` until [`Store::shutdown`] is called or the store is dropped.
#[derive(Debug)]
pub struct Store {
    root: PathBuf,
    locks: Arc<LockRegistry>,
    vacuum: Mutex<Option<VacuumWorker>>,
}

impl Store {
    /// Opens the store rooted at `path` and starts its vacuum worker.
    ///
    /// `path` must already exist and be a directory.
    pub fn open(path: impl AsRef<Path>, vacuum_interval: Duration) -> Result<Self> {
        let root = path.as_ref().to_path_buf();
        let meta = fs::metadata(&root).map_err(|source| StoreError::InvalidBasePath {
            path: root.clone(),
            source,
        })?;
        if !meta.is_dir() {
            return Err(StoreError::NotADirectory { path: root });
        }
        if vacuum_interval.is_zero() {
            return Err(StoreError::InvalidVacuumInterval {
                interval: vacuum_interval,
                reason: "must be non-zero",
            });
        }

        let locks = Arc::new(LockRegistry::new());
        let worker = VacuumWorker::spawn(root.clone(), Arc::clone(&locks), vacuum_interval)?;

        Ok(Self {
            root,
            locks,
            vacuum: Mutex::new(Some(worker)),
        })
    }

    pub fn from_config(config: &StoreConfig) -> Result<Self> {
        config.validate()?;
        Self::open(&config.path, config.vacuum_interval())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn lock_registry(&self) -> &LockRegistry {
        &self.locks
    }

    /// Path of the file that holds (or would hold) `key`.
    pub fn entry_path(&self, key: &str) -> PathBuf {
        shard_path(&self.root, key)
    }

    /// Returns the payload stored under `key` if it exists and has not expired.
    ///
    /// Missing, corrupt, unreadable and expired entries are all misses. Expired entries
    /// are deleted as a side effect.
    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        let path = self.entry_path(key);
        let _guard = self.locks.lock_at(&path).read();

        match fs::metadata(&path) {
            Ok(meta) if meta.is_file() => {}
            Ok(_) => return None,
            Err(err) => {
                if err.kind() != io::ErrorKind::NotFound {
                    tracing::debug!(
                        target: "hoard.store",
                        path = %path.display(),
                        error = %err,
                        "failed to stat cache entry"
                    );
                }
                return None;
            }
        }

        let mut bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(err) => {
                if err.kind() != io::ErrorKind::NotFound {
                    tracing::debug!(
                        target: "hoard.store",
                        path = %path.display(),
                        error = %err,
                        "failed to read cache entry"
                    );
                }
                return None;
            }
        };

        let entry = match decode(&bytes) {
            Ok(entry) => entry,
            Err(err) => {
                tracing::debug!(
                    target: "hoard.store",
                    path = %path.display(),
                    error = %err,
                    "treating corrupt cache entry as a miss"
                );
                return None;
            }
        };

        if entry.is_expired_at(now_secs()) {
            tracing::debug!(
                target: "hoard.store",
                path = %path.display(),
                expires_at = entry.expires_at,
                "removing expired cache entry"
            );
            remove_file_best_effort(&path, "get.expired");
            return None;
        }

        bytes.drain(..ENTRY_HEADER_LEN);
        Some(bytes)
    }

    /// Stores `payload` under `key`, replacing any previous entry, to expire after `ttl`.
    pub fn set(&self, key: &str, payload: &[u8], ttl: Duration) -> Result<()> {
        let path = self.entry_path(key);
        let _guard = self.locks.lock_at(&path).write();

        if let Some(parent) = path.parent() {
            create_dir_all_private(parent)?;
        }

        let bytes = encode(ttl, payload);
        let mut file = open_entry_for_write(&path)?;
        write_or_discard(&path, &mut file, &bytes)?;
        Ok(())
    }

    /// Runs one vacuum pass on the calling thread.
    pub fn vacuum_now(&self) -> VacuumReport {
        sweep(&self.root, &self.locks)
    }

    /// Stops the background vacuum worker, waiting for an in-flight pass to finish.
    ///
    /// Calling this more than once is a no-op. `get` and `set` keep working afterwards.
    pub fn shutdown(&self) {
        let worker = self.vacuum.lock().take();
        if let Some(mut worker) = worker {
            worker.shutdown();
        }
    }
}

impl Drop for Store {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn create_dir_all_private(dir: &Path) -> io::Result<()> {
    let mut builder = fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt as _;
        builder.mode(0o700);
    }
    builder.create(dir)
}

/// The parts of an open entry file that `set` relies on.
trait EntryFile: Write {
    fn set_len(&self, len: u64) -> io::Result<()>;
}

impl EntryFile for fs::File {
    fn set_len(&self, len: u64) -> io::Result<()> {
        fs::File::set_len(self, len)
    }
}

/// Overwrites the entry in place. On failure the file is removed so a half-written
/// header and payload (or a stale tail from the previous entry) can never be read back.
fn write_or_discard(path: &Path, file: &mut impl EntryFile, bytes: &[u8]) -> io::Result<()> {
    let result = file
        .write_all(bytes)
        // The file is reused in place; drop any tail left by a longer previous entry.
        .and_then(|()| file.set_len(bytes.len() as u64));
    if let Err(err) = result {
        if !remove_file_best_effort(path, "set.partial_write") {
            // Could not unlink; at least make the entry too short to decode.
            let _ = file.set_len(0);
        }
        return Err(err);
    }
    Ok(())
}

fn open_entry_for_write(path: &Path) -> io::Result<fs::File> {
    let mut options = OpenOptions::new();
    options.read(true).write(true).create(true).truncate(false);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt as _;
        options.mode(0o600);
    }
    options.open(path)
}
