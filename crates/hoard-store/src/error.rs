use std::path::PathBuf;
use std::time::Duration;

pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors produced when opening or writing to a store.
///
/// Cache misses are not errors: [`crate::Store::get`] reports them as `None`.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("invalid cache path {path}: {source}")]
    InvalidBasePath {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cache path {path} must be a directory")]
    NotADirectory { path: PathBuf },

    #[error("invalid vacuum interval {interval:?}: {reason}")]
    InvalidVacuumInterval {
        interval: Duration,
        reason: &'static str,
    },

    #[error("failed to start vacuum worker: {0}")]
    VacuumSpawn(#[source] std::io::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("walkdir error: {0}")]
    WalkDir(#[from] walkdir::Error),
}
