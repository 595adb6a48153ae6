//! Typed insert/get/invalidate built on the raw blob contract and a
//! [`Serializer`].

use blobcache_core::{CacheBackend, CacheError, KvStream, Result, Serializer, TypeTag, legacy_key};
use futures::stream::{self, Stream, StreamExt};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::pin::Pin;
use std::sync::Arc;

/// Typed view over a raw [`CacheBackend`]. Cheap to clone: both fields are
/// handles (`Arc` and a serializer that is itself required to be `Clone`).
pub struct TypedCache<B: CacheBackend + ?Sized, S: Serializer> {
    backend: Arc<B>,
    serializer: S,
}

impl<B: CacheBackend + ?Sized, S: Serializer> Clone for TypedCache<B, S> {
    fn clone(&self) -> Self {
        Self {
            backend: self.backend.clone(),
            serializer: self.serializer.clone(),
        }
    }
}

impl<B: CacheBackend + ?Sized, S: Serializer> TypedCache<B, S> {
    pub fn new(backend: Arc<B>, serializer: S) -> Self {
        Self { backend, serializer }
    }

    pub fn backend(&self) -> Arc<B> {
        self.backend.clone()
    }

    pub fn serializer(&self) -> S {
        self.serializer.clone()
    }

    pub async fn insert_object<T>(&self, key: &str, value: &T, expires_at: Option<i64>) -> Result<()>
    where
        T: Serialize + TypeTag,
    {
        let bytes = self.serializer.serialize_wrapped(value)?;
        self.backend
            .insert(key, bytes, Some(T::type_tag()), expires_at)
            .await
    }

    /// Reads under the preferred `type_name`-scoped key; on a miss, falls
    /// back to the legacy synthetic `"{type}___{key}"` layout so data
    /// written by an older layer is still reachable. Never writes that
    /// legacy form itself.
    pub async fn get_object<T>(&self, key: &str) -> Result<T>
    where
        T: DeserializeOwned + TypeTag,
    {
        match self.backend.get(key, Some(T::type_tag())).await {
            Ok(bytes) => self.serializer.deserialize_wrapped(&bytes),
            Err(CacheError::NotFound(_)) => {
                let legacy = legacy_key(T::type_tag(), key);
                let bytes = self.backend.get(&legacy, None).await?;
                self.serializer.deserialize_wrapped(&bytes)
            }
            Err(e) => Err(e),
        }
    }

    /// Decode errors drop the offending row rather than failing the whole
    /// stream — one corrupt entry must not poison a listing.
    pub async fn get_all_objects<T>(&self) -> Result<Pin<Box<dyn Stream<Item = T> + Send>>>
    where
        T: DeserializeOwned + TypeTag + Send + 'static,
    {
        let raw: KvStream = self.backend.get_all(T::type_tag()).await?;
        let serializer = self.serializer.clone();
        let decoded = raw.filter_map(move |(_, bytes)| {
            let serializer = serializer.clone();
            async move { serializer.deserialize_wrapped::<T>(&bytes).ok() }
        });
        Ok(Box::pin(decoded))
    }

    pub async fn get_created_at_object<T>(&self, key: &str) -> Result<Option<i64>>
    where
        T: TypeTag,
    {
        self.backend.get_created_at(key, Some(T::type_tag())).await
    }

    pub async fn invalidate_object<T>(&self, key: &str) -> Result<()>
    where
        T: TypeTag,
    {
        self.backend.invalidate(key, Some(T::type_tag())).await
    }

    pub async fn invalidate_all_objects<T>(&self) -> Result<()>
    where
        T: TypeTag,
    {
        self.backend.invalidate_all(Some(T::type_tag())).await
    }
}
