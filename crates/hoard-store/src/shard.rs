//! Key to on-disk path mapping.
//!
//! Entries live at `<root>/<b0>/<b1>/<b2>/<b3>/<sanitized key>` where `b0..b3` are the
//! hex-encoded little-endian bytes of the key's CRC-32 (IEEE) checksum.

use std::path::{Path, PathBuf};

/// Number of checksum-derived directory levels between the root and an entry file.
pub const SHARD_DEPTH: usize = 4;

/// CRC-32 (IEEE) of the raw key bytes, split into little-endian bytes.
pub fn key_checksum(key: &str) -> [u8; SHARD_DEPTH] {
    crc32fast::hash(key.as_bytes()).to_le_bytes()
}

/// Makes `key` usable as a single path component.
///
/// `/` becomes `-` and `:` becomes `_`. Names that would otherwise refer to the
/// shard directory itself (``, `.`, `..`) have their dots replaced with `_`.
pub fn sanitize_key(key: &str) -> String {
    let sanitized: String = key
        .chars()
        .map(|c| match c {
            '/' => '-',
            ':' => '_',
            c => c,
        })
        .collect();

    match sanitized.as_str() {
        "" => "_".to_string(),
        "." => "_".to_string(),
        ".." => "__".to_string(),
        _ => sanitized,
    }
}

/// Relative shard path for `key`, without the base directory.
pub fn relative_shard_path(key: &str) -> PathBuf {
    let mut path = PathBuf::new();
    for byte in key_checksum(key) {
        path.push(hex::encode([byte]));
    }
    path.push(sanitize_key(key));
    path
}

/// Full path of the entry file for `key` under `root`.
pub fn shard_path(root: &Path, key: &str) -> PathBuf {
    root.join(relative_shard_path(key))
}
