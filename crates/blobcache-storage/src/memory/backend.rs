//! In-memory cache backend.
//!
//! All operations execute synchronously under a single mutex; the async
//! surface required by [`CacheBackend`] is a trivial adapter over that
//! synchronous core. There is no background sweep: expired entries are
//! reaped lazily on read and in bulk by [`CacheBackend::vacuum`].

use async_trait::async_trait;
use blobcache_core::{
    CacheBackend, CacheEntry, CacheError, CacheMetrics, KeyStream, KvStream, NoopMetrics, Result,
    ticks,
};
use futures::stream::{self, StreamExt};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Default)]
struct State {
    entries: HashMap<String, CacheEntry>,
    type_index: HashMap<String, HashSet<String>>,
}

impl State {
    fn remove(&mut self, key: &str) {
        if let Some(entry) = self.entries.remove(key) {
            if let Some(type_name) = &entry.type_name {
                if let Some(keys) = self.type_index.get_mut(type_name) {
                    keys.remove(key);
                }
            }
        }
    }

    fn insert(&mut self, entry: CacheEntry) {
        // Replacing a key previously stored under a different type must
        // drop the stale type-index membership.
        if let Some(old) = self.entries.get(&entry.key) {
            if old.type_name != entry.type_name {
                if let Some(old_type) = &old.type_name {
                    if let Some(keys) = self.type_index.get_mut(old_type) {
                        keys.remove(&entry.key);
                    }
                }
            }
        }
        if let Some(type_name) = &entry.type_name {
            self.type_index
                .entry(type_name.clone())
                .or_default()
                .insert(entry.key.clone());
        }
        self.entries.insert(entry.key.clone(), entry);
    }
}

/// In-memory, process-local cache backend. Cloning shares the same
/// underlying store — it's a handle, not a copy.
#[derive(Clone)]
pub struct InMemoryCache {
    state: Arc<Mutex<State>>,
    disposed: Arc<AtomicBool>,
    metrics: Arc<dyn CacheMetrics>,
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self::with_metrics(Arc::new(NoopMetrics))
    }

    pub fn with_metrics(metrics: Arc<dyn CacheMetrics>) -> Self {
        Self {
            state: Arc::new(Mutex::new(State::default())),
            disposed: Arc::new(AtomicBool::new(false)),
            metrics,
        }
    }

    fn check_disposed(&self) -> Result<()> {
        if self.disposed.load(Ordering::Acquire) {
            Err(CacheError::Disposed)
        } else {
            Ok(())
        }
    }
}

impl Default for InMemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheBackend for InMemoryCache {
    async fn insert(
        &self,
        key: &str,
        value: Vec<u8>,
        type_name: Option<&str>,
        expires_at: Option<i64>,
    ) -> Result<()> {
        self.check_disposed()?;
        let entry = CacheEntry::new(key, value, type_name.map(str::to_string), expires_at);
        self.state.lock().insert(entry);
        Ok(())
    }

    async fn insert_many(
        &self,
        entries: Vec<(String, Vec<u8>)>,
        type_name: Option<&str>,
        expires_at: Option<i64>,
    ) -> Result<()> {
        self.check_disposed()?;
        let mut state = self.state.lock();
        for (key, value) in entries {
            state.insert(CacheEntry::new(
                key,
                value,
                type_name.map(str::to_string),
                expires_at,
            ));
        }
        Ok(())
    }

    async fn get(&self, key: &str, _type_name: Option<&str>) -> Result<Vec<u8>> {
        self.check_disposed()?;
        let mut state = self.state.lock();
        let now = ticks::now_ticks();
        match state.entries.get(key) {
            Some(entry) if entry.is_expired_at(now) => {
                state.remove(key);
                self.metrics.record_miss(key);
                Err(CacheError::NotFound(key.to_string()))
            }
            Some(entry) => {
                self.metrics.record_hit(key);
                Ok(entry.value.clone())
            }
            None => {
                self.metrics.record_miss(key);
                Err(CacheError::NotFound(key.to_string()))
            }
        }
    }

    async fn get_all(&self, type_name: &str) -> Result<KvStream> {
        self.check_disposed()?;
        let mut state = self.state.lock();
        let now = ticks::now_ticks();
        let keys: Vec<String> = state
            .type_index
            .get(type_name)
            .map(|k| k.iter().cloned().collect())
            .unwrap_or_default();

        let mut live = Vec::with_capacity(keys.len());
        let mut expired = Vec::new();
        for key in keys {
            match state.entries.get(&key) {
                Some(entry) if entry.is_expired_at(now) => expired.push(key),
                Some(entry) => live.push((key, entry.value.clone())),
                None => {}
            }
        }
        for key in expired {
            state.remove(&key);
        }
        Ok(stream::iter(live).boxed())
    }

    async fn get_all_keys(&self, type_name: Option<&str>) -> Result<KeyStream> {
        self.check_disposed()?;
        let state = self.state.lock();
        let now = ticks::now_ticks();
        let keys: Vec<String> = match type_name {
            Some(t) => state
                .type_index
                .get(t)
                .map(|k| k.iter().cloned().collect())
                .unwrap_or_default(),
            None => state.entries.keys().cloned().collect(),
        };
        let live: Vec<String> = keys
            .into_iter()
            .filter(|k| {
                state
                    .entries
                    .get(k)
                    .map(|e| !e.is_expired_at(now))
                    .unwrap_or(false)
            })
            .collect();
        Ok(stream::iter(live).boxed())
    }

    async fn get_created_at(&self, key: &str, _type_name: Option<&str>) -> Result<Option<i64>> {
        self.check_disposed()?;
        let state = self.state.lock();
        let now = ticks::now_ticks();
        Ok(state
            .entries
            .get(key)
            .filter(|e| !e.is_expired_at(now))
            .map(|e| e.created_at))
    }

    async fn invalidate(&self, key: &str, _type_name: Option<&str>) -> Result<()> {
        self.check_disposed()?;
        self.state.lock().remove(key);
        Ok(())
    }

    async fn invalidate_many(&self, keys: Vec<String>, _type_name: Option<&str>) -> Result<()> {
        self.check_disposed()?;
        let mut state = self.state.lock();
        for key in keys {
            state.remove(&key);
        }
        Ok(())
    }

    async fn invalidate_all(&self, type_name: Option<&str>) -> Result<()> {
        self.check_disposed()?;
        let mut state = self.state.lock();
        match type_name {
            Some(t) => {
                let keys: Vec<String> = state
                    .type_index
                    .get(t)
                    .map(|k| k.iter().cloned().collect())
                    .unwrap_or_default();
                for key in keys {
                    state.remove(&key);
                }
            }
            None => {
                state.entries.clear();
                state.type_index.clear();
            }
        }
        Ok(())
    }

    async fn vacuum(&self) -> Result<()> {
        self.check_disposed()?;
        let mut state = self.state.lock();
        let now = ticks::now_ticks();
        let expired: Vec<String> = state
            .entries
            .iter()
            .filter(|(_, e)| e.is_expired_at(now))
            .map(|(k, _)| k.clone())
            .collect();
        for key in &expired {
            state.remove(key);
        }
        for _ in &expired {
            self.metrics.record_eviction(blobcache_core::EvictionReason::Expired);
        }
        Ok(())
    }

    async fn shutdown(&self) -> Result<()> {
        self.disposed.store(true, Ordering::Release);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn insert_then_get() {
        let cache = InMemoryCache::new();
        cache.insert("a", b"1".to_vec(), None, None).await.unwrap();
        assert_eq!(cache.get("a", None).await.unwrap(), b"1".to_vec());
    }

    #[tokio::test]
    async fn get_missing_is_not_found() {
        let cache = InMemoryCache::new();
        assert!(matches!(
            cache.get("missing", None).await,
            Err(CacheError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn expired_entry_is_absent() {
        let cache = InMemoryCache::new();
        cache
            .insert("a", b"1".to_vec(), None, Some(0))
            .await
            .unwrap();
        assert!(matches!(
            cache.get("a", None).await,
            Err(CacheError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn type_indexed_listing() {
        let cache = InMemoryCache::new();
        cache
            .insert("u1", b"1".to_vec(), Some("User"), None)
            .await
            .unwrap();
        cache
            .insert("u2", b"2".to_vec(), Some("User"), None)
            .await
            .unwrap();
        cache
            .insert("o1", b"3".to_vec(), Some("Org"), None)
            .await
            .unwrap();

        let mut stream = cache.get_all("User").await.unwrap();
        let mut seen = HashSet::new();
        while let Some((k, _)) = stream.next().await {
            seen.insert(k);
        }
        assert_eq!(seen, ["u1".to_string(), "u2".to_string()].into_iter().collect());
    }

    #[tokio::test]
    async fn invalidate_all_scoped_to_type() {
        let cache = InMemoryCache::new();
        cache
            .insert("u1", b"1".to_vec(), Some("User"), None)
            .await
            .unwrap();
        cache
            .insert("o1", b"2".to_vec(), Some("Org"), None)
            .await
            .unwrap();

        cache.invalidate_all(Some("User")).await.unwrap();
        assert!(cache.get("u1", None).await.is_err());
        assert!(cache.get("o1", None).await.is_ok());
    }

    #[tokio::test]
    async fn vacuum_evicts_expired_rows() {
        let cache = InMemoryCache::new();
        cache
            .insert("a", b"1".to_vec(), None, Some(0))
            .await
            .unwrap();
        cache.vacuum().await.unwrap();
        let state = cache.state.lock();
        assert!(state.entries.is_empty());
    }

    #[tokio::test]
    async fn shutdown_disposes_the_handle() {
        let cache = InMemoryCache::new();
        cache.shutdown().await.unwrap();
        assert!(matches!(
            cache.insert("a", vec![], None, None).await,
            Err(CacheError::Disposed)
        ));
    }

    #[tokio::test]
    async fn get_created_at_is_none_for_missing_key() {
        let cache = InMemoryCache::new();
        assert_eq!(cache.get_created_at("missing", None).await.unwrap(), None);
    }
}
