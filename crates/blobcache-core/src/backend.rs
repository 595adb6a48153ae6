//! The cache contract every storage backend implements.
//!
//! `CacheBackend` is the single trait both `InMemoryCache` and
//! `PersistentCache` implement. Bulk operations have default, sequential
//! fallback bodies so a backend only has to override them when it can do
//! better than "loop and call the single-key method" — there is no
//! duck-typed branching anywhere above this trait to ask "does this backend
//! support bulk ops"; every backend supports them, some just faster than
//! others.

use crate::Result;
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use std::pin::Pin;
use tokio::runtime::Handle;

/// A stream of `(key, value)` pairs. Missing or expired keys are silently
/// skipped rather than appearing as stream errors.
pub type KvStream = Pin<Box<dyn futures::Stream<Item = (String, Vec<u8>)> + Send>>;

/// A stream of bare keys.
pub type KeyStream = Pin<Box<dyn futures::Stream<Item = String> + Send>>;

/// Upper bound on concurrent single-key requests the default bulk-read
/// fallback issues at once.
const DEFAULT_FANOUT: usize = 4;

#[async_trait]
pub trait CacheBackend: Send + Sync + 'static {
    /// Upsert `value` under `key`. `expires_at`, if given, is a tick count
    /// (see [`crate::ticks`]); `None` means "never expires."
    async fn insert(
        &self,
        key: &str,
        value: Vec<u8>,
        type_name: Option<&str>,
        expires_at: Option<i64>,
    ) -> Result<()>;

    /// Upsert many entries sharing the same type tag and expiry. Backends
    /// that can batch this into one transaction should override it;
    /// the default just calls [`CacheBackend::insert`] in a loop.
    async fn insert_many(
        &self,
        entries: Vec<(String, Vec<u8>)>,
        type_name: Option<&str>,
        expires_at: Option<i64>,
    ) -> Result<()> {
        for (key, value) in entries {
            self.insert(&key, value, type_name, expires_at).await?;
        }
        Ok(())
    }

    /// Fetch the bytes stored at `key`. `Err(NotFound)` if absent or expired.
    async fn get(&self, key: &str, type_name: Option<&str>) -> Result<Vec<u8>>;

    /// Fetch many keys at once. Missing or expired keys are simply absent
    /// from the returned stream — no per-key error. The default fallback
    /// issues bounded-concurrency single-key gets.
    async fn get_many(&self, keys: Vec<String>, type_name: Option<String>) -> Result<KvStream> {
        let results: Vec<(String, Vec<u8>)> = stream::iter(keys)
            .map(|key| {
                let type_name = type_name.clone();
                async move {
                    self.get(&key, type_name.as_deref())
                        .await
                        .ok()
                        .map(|bytes| (key, bytes))
                }
            })
            .buffer_unordered(DEFAULT_FANOUT)
            .filter_map(|item| async move { item })
            .collect()
            .await;
        Ok(stream::iter(results).boxed())
    }

    /// Every non-expired entry stored under `type_name`.
    async fn get_all(&self, type_name: &str) -> Result<KvStream>;

    /// All keys, optionally restricted to one type tag.
    async fn get_all_keys(&self, type_name: Option<&str>) -> Result<KeyStream>;

    /// The creation instant (ticks) of `key`, or `None` if absent/expired.
    /// Never errors on a miss.
    async fn get_created_at(&self, key: &str, type_name: Option<&str>) -> Result<Option<i64>>;

    /// Flush buffered writes to durable storage. A no-op for backends with
    /// nothing to flush (in-memory).
    async fn flush(&self, type_name: Option<&str>) -> Result<()> {
        let _ = type_name;
        Ok(())
    }

    /// Remove `key`. Idempotent: removing an absent key is not an error.
    async fn invalidate(&self, key: &str, type_name: Option<&str>) -> Result<()>;

    /// Remove many keys. Default fallback calls [`CacheBackend::invalidate`]
    /// in a loop.
    async fn invalidate_many(&self, keys: Vec<String>, type_name: Option<&str>) -> Result<()> {
        for key in keys {
            self.invalidate(&key, type_name).await?;
        }
        Ok(())
    }

    /// Remove every entry, optionally restricted to one type tag.
    async fn invalidate_all(&self, type_name: Option<&str>) -> Result<()>;

    /// Physically evict rows whose expiry has passed and reclaim their
    /// storage. Safe to call at any time; a no-op if nothing is expired.
    async fn vacuum(&self) -> Result<()>;

    /// Release any resources (connections, background workers) this
    /// backend holds. Subsequent calls return `Err(Disposed)`.
    async fn shutdown(&self) -> Result<()>;

    /// The executor this backend's background work runs on.
    fn scheduler(&self) -> Handle {
        Handle::current()
    }
}
