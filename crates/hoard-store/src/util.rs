use std::path::Path;
use std::sync::OnceLock;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Whole seconds since the Unix epoch for `time`, rounded down.
pub fn unix_secs(time: SystemTime) -> u64 {
    match time.duration_since(UNIX_EPOCH) {
        Ok(d) => d.as_secs(),
        Err(err) => {
            // Clock set before 1970. Log once so hot paths don't spam.
            static REPORTED: OnceLock<()> = OnceLock::new();
            if REPORTED.set(()).is_ok() {
                tracing::debug!(
                    target: "hoard.store",
                    error = %err,
                    "system time is before unix epoch; using 0"
                );
            }
            0
        }
    }
}

pub fn now_secs() -> u64 {
    unix_secs(SystemTime::now())
}

/// Absolute expiry for an entry written now with the given time-to-live.
///
/// Saturates instead of overflowing for absurdly large TTLs.
pub fn expiry_after(ttl: Duration) -> u64 {
    match SystemTime::now().checked_add(ttl) {
        Some(at) => unix_secs(at),
        None => u64::MAX,
    }
}

pub(crate) fn remove_file_best_effort(path: &Path, reason: &'static str) -> bool {
    match std::fs::remove_file(path) {
        Ok(()) => true,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => true,
        Err(err) => {
            tracing::debug!(
                target: "hoard.store",
                path = %path.display(),
                reason,
                error = %err,
                "failed to remove cache file"
            );
            false
        }
    }
}
