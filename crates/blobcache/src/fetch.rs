//! Fetch-and-cache policies built on [`TypedCache`] and [`RequestDeduplicator`].

use crate::dedup::RequestDeduplicator;
use crate::typed::TypedCache;
use blobcache_core::{CacheBackend, CacheError, Result, Serializer, TypeTag};
use futures::Stream;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::future::Future;
use std::sync::Arc;

/// Composes the typed API with single-flight deduplication for the
/// `get_or_fetch*` family. Cheap to clone.
pub struct FetchCache<B: CacheBackend + ?Sized, S: Serializer> {
    typed: TypedCache<B, S>,
    dedup: RequestDeduplicator,
}

impl<B: CacheBackend + ?Sized, S: Serializer> Clone for FetchCache<B, S> {
    fn clone(&self) -> Self {
        Self {
            typed: self.typed.clone(),
            dedup: self.dedup.clone(),
        }
    }
}

impl<B: CacheBackend + ?Sized, S: Serializer> FetchCache<B, S> {
    pub fn new(backend: Arc<B>, serializer: S) -> Self {
        Self {
            typed: TypedCache::new(backend, serializer),
            dedup: RequestDeduplicator::new(),
        }
    }

    pub fn typed(&self) -> &TypedCache<B, S> {
        &self.typed
    }

    /// Tries the cache first; on a miss (or decode failure) runs `fetch_fn`
    /// under the deduplicator so concurrent callers for the same
    /// `(type, key)` share one underlying call, and caches the result
    /// before returning it.
    pub async fn get_or_fetch_object<T, F, Fut>(
        &self,
        key: &str,
        fetch_fn: F,
        expires_at: Option<i64>,
    ) -> Result<T>
    where
        T: Serialize + DeserializeOwned + TypeTag + Send + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        if let Ok(value) = self.typed.get_object::<T>(key).await {
            return Ok(value);
        }

        let typed = self.typed.clone();
        let key_owned = key.to_string();
        let wrapped = async move {
            let value = fetch_fn().await?;
            let bytes = typed.serializer().serialize_wrapped(&value)?;
            typed
                .backend()
                .insert(&key_owned, bytes.clone(), Some(T::type_tag()), expires_at)
                .await?;
            Ok(bytes)
        };

        let bytes = self.dedup.get_or_create(T::type_tag(), key, wrapped).await?;
        self.typed.serializer().deserialize_wrapped(&bytes)
    }

    /// Tries the cache; on any failure invokes `factory_fn` directly (no
    /// deduplication — concurrent callers each run their own factory) and
    /// caches its result.
    pub async fn get_or_create_object<T, F, Fut>(&self, key: &str, factory_fn: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned + TypeTag + Clone + Send + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        if let Ok(value) = self.typed.get_object::<T>(key).await {
            return Ok(value);
        }
        let value = factory_fn().await;
        self.typed.insert_object(key, &value, None).await?;
        Ok(value)
    }

    /// Emits the cached value (if present) followed by a freshly fetched
    /// one. At most two items; the stream is hot — it runs to completion
    /// as it's polled and does not replay past subscribers.
    pub fn get_and_fetch_latest<T, F, Fut>(
        &self,
        key: &str,
        fetch_fn: F,
        fetch_predicate: Option<Box<dyn Fn(i64) -> bool + Send>>,
        expires_at: Option<i64>,
        should_invalidate_on_error: bool,
        cache_validation_predicate: Option<Box<dyn Fn(&T) -> bool + Send>>,
    ) -> impl Stream<Item = Result<T>> + Send
    where
        T: Serialize + DeserializeOwned + TypeTag + Clone + Send + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let typed = self.typed.clone();
        let key = key.to_string();

        async_stream::try_stream! {
            let cached = typed.get_object::<T>(&key).await.ok();
            if let Some(value) = &cached {
                yield value.clone();
            }

            if let Some(predicate) = &fetch_predicate {
                if let Some(created_at) = typed.get_created_at_object::<T>(&key).await? {
                    if !predicate(created_at) {
                        return;
                    }
                }
            }

            match fetch_fn().await {
                Ok(fetched) => {
                    let should_cache = cache_validation_predicate
                        .as_ref()
                        .map(|predicate| predicate(&fetched))
                        .unwrap_or(true);
                    if should_cache {
                        typed.invalidate_object::<T>(&key).await?;
                        typed.insert_object(&key, &fetched, expires_at).await?;
                    }
                    yield fetched;
                }
                Err(e) => {
                    if should_invalidate_on_error {
                        typed.invalidate_object::<T>(&key).await?;
                    }
                    Err(e)?;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blobcache_core::JsonSerializer;
    use blobcache_storage::InMemoryCache;
    use futures::StreamExt;
    use serde::Deserialize;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
    struct Value(i32);

    fn cache() -> FetchCache<InMemoryCache, JsonSerializer> {
        FetchCache::new(Arc::new(InMemoryCache::new()), JsonSerializer::new())
    }

    #[tokio::test]
    async fn concurrent_get_or_fetch_runs_the_fetch_once() {
        let cache = Arc::new(cache());
        let calls = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..5 {
            let cache = cache.clone();
            let calls = calls.clone();
            handles.push(tokio::spawn(async move {
                cache
                    .get_or_fetch_object::<Value, _, _>(
                        "k",
                        move || {
                            let calls = calls.clone();
                            async move {
                                calls.fetch_add(1, Ordering::SeqCst);
                                tokio::time::sleep(std::time::Duration::from_millis(20)).await;
                                Ok(Value(42))
                            }
                        },
                        None,
                    )
                    .await
            }));
        }

        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), Value(42));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            cache.typed().get_object::<Value>("k").await.unwrap(),
            Value(42)
        );
    }

    #[tokio::test]
    async fn get_and_fetch_latest_invalidates_on_error() {
        let cache = cache();
        cache
            .typed()
            .insert_object("foo", &Value(1), None)
            .await
            .unwrap();

        let mut stream = Box::pin(cache.get_and_fetch_latest::<Value, _, _>(
            "foo",
            || async { Err(CacheError::Backend("boom".into())) },
            None,
            None,
            true,
            None,
        ));

        assert_eq!(stream.next().await.unwrap().unwrap(), Value(1));
        assert!(stream.next().await.unwrap().is_err());
        assert!(stream.next().await.is_none());
        assert!(cache.typed().get_object::<Value>("foo").await.is_err());
    }

    #[tokio::test]
    async fn get_and_fetch_latest_skips_cache_update_when_validation_rejects() {
        let cache = cache();
        cache
            .typed()
            .insert_object("foo", &Value(1), None)
            .await
            .unwrap();

        let validator: Box<dyn Fn(&Value) -> bool + Send> = Box::new(|v: &Value| v.0 != 99);
        let mut stream = Box::pin(cache.get_and_fetch_latest::<Value, _, _>(
            "foo",
            || async { Ok(Value(99)) },
            None,
            None,
            false,
            Some(validator),
        ));

        assert_eq!(stream.next().await.unwrap().unwrap(), Value(1));
        assert_eq!(stream.next().await.unwrap().unwrap(), Value(99));
        assert_eq!(
            cache.typed().get_object::<Value>("foo").await.unwrap(),
            Value(1)
        );
    }
}
