//! Single-flight request deduplication.
//!
//! Concurrent fetches for the same `(type_name, key)` pair collapse into one
//! underlying call. A [`tokio::sync::watch`] channel carries the terminal
//! result to every subscriber, including ones that join after the leader has
//! already started — `watch` replays its last value, which is exactly the
//! "late subscriber sees the outcome" semantics a fetch helper needs.

use blobcache_core::{CacheError, Result};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::watch;

type DedupResult = Result<Vec<u8>>;
type MapKey = (String, String);

/// Map of in-flight fetches keyed by `(type_name, key)`. Cheap to clone —
/// clones share the same underlying map.
#[derive(Clone)]
pub struct RequestDeduplicator {
    in_flight: Arc<DashMap<MapKey, watch::Receiver<Option<DedupResult>>>>,
}

impl RequestDeduplicator {
    pub fn new() -> Self {
        Self {
            in_flight: Arc::new(DashMap::new()),
        }
    }

    /// Runs `fetch` for `(type_name, key)` unless a fetch for that pair is
    /// already in flight, in which case this call joins it. `fetch` itself
    /// only ever executes once per in-flight window, on a detached task —
    /// dropping the caller's future does not cancel it for other
    /// subscribers.
    pub async fn get_or_create<F>(&self, type_name: &str, key: &str, fetch: F) -> DedupResult
    where
        F: Future<Output = DedupResult> + Send + 'static,
    {
        let map_key = (type_name.to_string(), key.to_string());

        if let Some(rx) = self.in_flight.get(&map_key).map(|entry| entry.value().clone()) {
            return Self::join(rx).await;
        }

        let (tx, rx) = watch::channel(None);
        let follower_rx = rx.clone();
        match self.in_flight.entry(map_key.clone()) {
            Entry::Occupied(existing) => return Self::join(existing.get().clone()).await,
            Entry::Vacant(vacant) => {
                vacant.insert(rx);
            }
        }

        let in_flight = self.in_flight.clone();
        tokio::spawn(async move {
            let result = fetch.await;
            let _ = tx.send(Some(result));
            in_flight.remove(&map_key);
        });

        Self::join(follower_rx).await
    }

    async fn join(mut rx: watch::Receiver<Option<DedupResult>>) -> DedupResult {
        if let Some(result) = rx.borrow().clone() {
            return result;
        }
        match rx.changed().await {
            Ok(()) => rx.borrow().clone().unwrap_or_else(|| {
                Err(CacheError::Internal(
                    "in-flight fetch resolved without a value".into(),
                ))
            }),
            Err(_) => Err(CacheError::Internal(
                "in-flight fetch was dropped before completing".into(),
            )),
        }
    }
}

impl Default for RequestDeduplicator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn concurrent_fetches_for_the_same_key_run_once() {
        let dedup = RequestDeduplicator::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..5 {
            let dedup = dedup.clone();
            let calls = calls.clone();
            handles.push(tokio::spawn(async move {
                dedup
                    .get_or_create("int", "k", async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(20)).await;
                        Ok(b"42".to_vec())
                    })
                    .await
            }));
        }

        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), b"42".to_vec());
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn distinct_keys_do_not_share_a_fetch() {
        let dedup = RequestDeduplicator::new();
        let a = dedup.get_or_create("t", "a", async { Ok(b"a".to_vec()) });
        let b = dedup.get_or_create("t", "b", async { Ok(b"b".to_vec()) });
        assert_eq!(a.await.unwrap(), b"a".to_vec());
        assert_eq!(b.await.unwrap(), b"b".to_vec());
    }

    #[tokio::test]
    async fn a_failed_fetch_is_retried_by_the_next_caller() {
        let dedup = RequestDeduplicator::new();
        let first = dedup
            .get_or_create("t", "k", async { Err(CacheError::Backend("boom".into())) })
            .await;
        assert!(first.is_err());

        let second = dedup.get_or_create("t", "k", async { Ok(b"ok".to_vec()) }).await;
        assert_eq!(second.unwrap(), b"ok".to_vec());
    }
}
