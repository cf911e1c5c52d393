//! On-disk cache store with per-entry expiry.
//!
//! This crate is the storage engine behind an HTTP response cache: callers compute
//! keys and TTLs, the store persists opaque payloads and reclaims expired ones.
//!
//! ## On-disk layout
//!
//! Each entry is a single file at
//! `<root>/<hex b0>/<hex b1>/<hex b2>/<hex b3>/<sanitized key>`, where `b0..b3` are
//! the little-endian bytes of the CRC-32 (IEEE) checksum of the key. The file holds
//! an 8-byte little-endian expiry (Unix seconds) followed by the raw payload.
//! Files shorter than 8 bytes are treated as misses.
//!
//! ## Concurrency
//!
//! - [`LockRegistry`] hands out one reference-counted read/write lock per entry path;
//!   slots are dropped as soon as the last handle goes away.
//! - [`Store::get`] reads under a shared lock, [`Store::set`] and the vacuum write
//!   and delete under an exclusive one.
//! - The vacuum runs on a background thread every `vacuum_interval` and deletes
//!   expired files. Expired entries are also removed lazily by `get`.

mod config;
mod entry;
mod error;
mod lock;
mod shard;
mod store;
mod util;
mod vacuum;

pub use config::{StoreConfig, DEFAULT_VACUUM_INTERVAL_SECS};
pub use entry::{
    decode, decode_header, encode, encode_with_expiry, is_expired, Entry, EntryError,
    ENTRY_HEADER_LEN,
};
pub use error::{Result, StoreError};
pub use lock::{LockRegistry, PathLock, PathReadGuard, PathWriteGuard};
pub use shard::{key_checksum, relative_shard_path, sanitize_key, shard_path, SHARD_DEPTH};
pub use store::Store;
pub use util::{expiry_after, now_secs, unix_secs};
pub use vacuum::{scan, sweep, EntryInfo, VacuumReport};
