use crate::util::expiry_after;
use std::time::Duration;

/// Size of the little-endian expiry timestamp that prefixes every entry file.
pub const ENTRY_HEADER_LEN: usize = 8;

/// A decoded entry borrowing its payload from the file contents.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Entry<'a> {
    /// Absolute expiry, whole seconds since the Unix epoch.
    pub expires_at: u64,
    pub payload: &'a [u8],
}

impl Entry<'_> {
    /// An entry is expired once the clock reaches its expiry second.
    pub fn is_expired_at(&self, now_secs: u64) -> bool {
        is_expired(self.expires_at, now_secs)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum EntryError {
    #[error("entry is {len} bytes, shorter than its 8-byte expiry header")]
    Truncated { len: usize },
}

pub fn is_expired(expires_at: u64, now_secs: u64) -> bool {
    expires_at <= now_secs
}

/// Encodes `payload` to expire `ttl` from now. Sub-second TTLs round down.
pub fn encode(ttl: Duration, payload: &[u8]) -> Vec<u8> {
    encode_with_expiry(expiry_after(ttl), payload)
}

pub fn encode_with_expiry(expires_at: u64, payload: &[u8]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(ENTRY_HEADER_LEN + payload.len());
    bytes.extend_from_slice(&expires_at.to_le_bytes());
    bytes.extend_from_slice(payload);
    bytes
}

pub fn decode(bytes: &[u8]) -> Result<Entry<'_>, EntryError> {
    let Some((header, payload)) = bytes.split_first_chunk::<ENTRY_HEADER_LEN>() else {
        return Err(EntryError::Truncated { len: bytes.len() });
    };
    Ok(Entry {
        expires_at: decode_header(*header),
        payload,
    })
}

pub fn decode_header(header: [u8; ENTRY_HEADER_LEN]) -> u64 {
    u64::from_le_bytes(header)
}
