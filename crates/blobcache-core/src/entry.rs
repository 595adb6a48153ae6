//! The wire-level cache entry.
//!
//! `CacheEntry` is what the storage backends persist and exchange: a key,
//! the raw serialized payload, an optional type tag used for type-indexed
//! listing, and the creation/expiry instants as ticks (see [`crate::ticks`]).
//! It carries no knowledge of `T` — typed access is layered on top in the
//! `blobcache` crate.

use crate::ticks::{self, NEVER};

/// A single stored row: key, bytes, and the bookkeeping needed to answer
/// "is this still here" without touching the clock twice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub key: String,
    pub type_name: Option<String>,
    pub value: Vec<u8>,
    pub created_at: i64,
    pub expires_at: i64,
}

impl CacheEntry {
    /// Build an entry that expires at `expires_at` ticks (or never, if `None`).
    pub fn new(
        key: impl Into<String>,
        value: Vec<u8>,
        type_name: Option<String>,
        expires_at: Option<i64>,
    ) -> Self {
        Self {
            key: key.into(),
            type_name,
            value,
            created_at: ticks::now_ticks(),
            expires_at: expires_at.unwrap_or(NEVER),
        }
    }

    /// Whether this entry is logically absent as of `now`.
    pub fn is_expired_at(&self, now: i64) -> bool {
        ticks::is_expired(self.expires_at, now)
    }

    /// Whether this entry is logically absent right now.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(ticks::now_ticks())
    }
}
