use crate::error::StoreError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_VACUUM_INTERVAL_SECS: u64 = 600;

/// Configuration for opening a [`crate::Store`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreConfig {
    /// Base directory holding the shard tree. Must already exist.
    pub path: PathBuf,
    /// Seconds between vacuum passes.
    pub vacuum_interval_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: std::env::temp_dir().join("hoard"),
            vacuum_interval_secs: DEFAULT_VACUUM_INTERVAL_SECS,
        }
    }
}

impl StoreConfig {
    /// Defaults overridden by `HOARD_CACHE_DIR` and `HOARD_VACUUM_INTERVAL_SECS`.
    ///
    /// An unparsable interval is ignored in favor of the default.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(dir) = std::env::var_os("HOARD_CACHE_DIR") {
            config.path = PathBuf::from(dir);
        }
        if let Ok(raw) = std::env::var("HOARD_VACUUM_INTERVAL_SECS") {
            match raw.trim().parse::<u64>() {
                Ok(secs) => config.vacuum_interval_secs = secs,
                Err(err) => tracing::warn!(
                    target: "hoard.store",
                    value = %raw,
                    error = %err,
                    "ignoring invalid HOARD_VACUUM_INTERVAL_SECS"
                ),
            }
        }
        config
    }

    pub fn vacuum_interval(&self) -> Duration {
        Duration::from_secs(self.vacuum_interval_secs)
    }

    pub fn validate(&self) -> Result<(), StoreError> {
        if self.vacuum_interval_secs <= 1 {
            return Err(StoreError::InvalidVacuumInterval {
                interval: self.vacuum_interval(),
                reason: "must be greater than one second",
            });
        }
        Ok(())
    }
}
