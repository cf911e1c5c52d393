use parking_lot::{ArcRwLockReadGuard, ArcRwLockWriteGuard, Mutex, RawRwLock, RwLock};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Registry of reference-counted read/write locks keyed by entry path.
///
/// A slot exists only while at least one [`PathLock`] for its path is alive, so the
/// registry holds locks for paths currently being accessed rather than every path
/// ever touched. The registry mutex guards bookkeeping only and is never held while
/// waiting on a path lock or doing file I/O.
#[derive(Debug, Default)]
pub struct LockRegistry {
    slots: Mutex<HashMap<PathBuf, LockSlot>>,
}

#[derive(Debug)]
struct LockSlot {
    lock: Arc<RwLock<()>>,
    refs: usize,
}

impl LockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the lock handle for `path`, creating the slot on first use.
    ///
    /// Concurrent callers for the same path share one underlying lock.
    pub fn lock_at(&self, path: &Path) -> PathLock<'_> {
        let mut slots = self.slots.lock();
        let slot = slots
            .entry(path.to_path_buf())
            .or_insert_with(|| LockSlot {
                lock: Arc::new(RwLock::new(())),
                refs: 0,
            });
        slot.refs += 1;

        PathLock {
            registry: self,
            path: path.to_path_buf(),
            lock: Arc::clone(&slot.lock),
        }
    }

    /// Number of paths with live handles.
    pub fn len(&self) -> usize {
        self.slots.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.lock().is_empty()
    }

    /// Live handle count for `path` (zero when it has no slot).
    pub fn ref_count(&self, path: &Path) -> usize {
        self.slots.lock().get(path).map_or(0, |slot| slot.refs)
    }

    fn release(&self, path: &Path) {
        let mut slots = self.slots.lock();
        let Some(slot) = slots.get_mut(path) else {
            return;
        };
        slot.refs = slot.refs.saturating_sub(1);
        if slot.refs == 0 {
            slots.remove(path);
        }
    }
}

/// A registered reference to one path's lock.
///
/// Dropping the handle (directly, or through the guard it was turned into) gives the
/// reference back to the registry.
#[derive(Debug)]
pub struct PathLock<'a> {
    registry: &'a LockRegistry,
    path: PathBuf,
    lock: Arc<RwLock<()>>,
}

impl<'a> PathLock<'a> {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Blocks until shared access to the path is available.
    pub fn read(self) -> PathReadGuard<'a> {
        let guard = self.lock.read_arc();
        PathReadGuard {
            _guard: guard,
            _handle: self,
        }
    }

    /// Blocks until exclusive access to the path is available.
    pub fn write(self) -> PathWriteGuard<'a> {
        let guard = self.lock.write_arc();
        PathWriteGuard {
            _guard: guard,
            _handle: self,
        }
    }
}

impl Drop for PathLock<'_> {
    fn drop(&mut self) {
        self.registry.release(&self.path);
    }
}

// Field order matters in both guards: the path lock is released before the handle
// drops its registry reference.

/// Shared access to one path. Released on drop.
#[must_use = "the path is unlocked as soon as the guard is dropped"]
pub struct PathReadGuard<'a> {
    _guard: ArcRwLockReadGuard<RawRwLock, ()>,
    _handle: PathLock<'a>,
}

/// Exclusive access to one path. Released on drop.
#[must_use = "the path is unlocked as soon as the guard is dropped"]
pub struct PathWriteGuard<'a> {
    _guard: ArcRwLockWriteGuard<RawRwLock, ()>,
    _handle: PathLock<'a>,
}
