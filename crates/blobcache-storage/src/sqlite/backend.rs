//! SQLite-backed, durable cache backend.
//!
//! All state lives in one table behind [`OperationQueue`]; this type is a
//! thin [`CacheBackend`] adapter that turns each trait method into an
//! [`Operation`] submission and unpacks the resulting [`Outcome`].

use super::config::PersistentCacheConfig;
use super::queue::{Operation, OperationQueue, Outcome};
use async_trait::async_trait;
use blobcache_core::{
    CacheBackend, CacheEntry, CacheError, CacheMetrics, KeyStream, KvStream, NoopMetrics, Result,
};
use futures::stream::{self, StreamExt};
use std::path::Path;
use std::sync::Arc;

/// Durable, process-shared cache backend over a single SQLite database.
/// Cloning shares the same queue and connection — it's a handle.
#[derive(Clone)]
pub struct PersistentCache {
    queue: Arc<OperationQueue>,
    metrics: Arc<dyn CacheMetrics>,
}

impl PersistentCache {
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with_config(PersistentCacheConfig::new(path.as_ref()), Arc::new(NoopMetrics)).await
    }

    pub async fn open_in_memory() -> Result<Self> {
        Ok(Self {
            queue: Arc::new(OperationQueue::open(":memory:").await?),
            metrics: Arc::new(NoopMetrics),
        })
    }

    pub async fn open_with_metrics(
        path: impl AsRef<Path>,
        metrics: Arc<dyn CacheMetrics>,
    ) -> Result<Self> {
        Self::open_with_config(PersistentCacheConfig::new(path.as_ref()), metrics).await
    }

    pub async fn open_with_config(
        config: PersistentCacheConfig,
        metrics: Arc<dyn CacheMetrics>,
    ) -> Result<Self> {
        let path = config
            .path()
            .to_str()
            .ok_or_else(|| CacheError::ArgumentInvalid("database path is not valid UTF-8".into()))?;
        Ok(Self {
            queue: Arc::new(OperationQueue::open_with_capacity(path, config.drain_capacity()).await?),
            metrics,
        })
    }
}

fn unexpected(outcome: &Outcome) -> CacheError {
    CacheError::Internal(format!("unexpected queue outcome: {outcome:?}"))
}

#[async_trait]
impl CacheBackend for PersistentCache {
    async fn insert(
        &self,
        key: &str,
        value: Vec<u8>,
        type_name: Option<&str>,
        expires_at: Option<i64>,
    ) -> Result<()> {
        let entry = CacheEntry::new(key, value, type_name.map(str::to_string), expires_at);
        self.queue
            .submit(Operation::InsertBatch(vec![entry]))
            .await?;
        Ok(())
    }

    async fn insert_many(
        &self,
        entries: Vec<(String, Vec<u8>)>,
        type_name: Option<&str>,
        expires_at: Option<i64>,
    ) -> Result<()> {
        let entries = entries
            .into_iter()
            .map(|(key, value)| CacheEntry::new(key, value, type_name.map(str::to_string), expires_at))
            .collect();
        self.queue.submit(Operation::InsertBatch(entries)).await?;
        Ok(())
    }

    async fn get(&self, key: &str, _type_name: Option<&str>) -> Result<Vec<u8>> {
        match self
            .queue
            .submit(Operation::SelectByKeys(vec![key.to_string()]))
            .await?
        {
            Outcome::Entries(entries) => match entries.into_iter().find(|e| e.key == key) {
                Some(entry) => {
                    self.metrics.record_hit(key);
                    Ok(entry.value)
                }
                None => {
                    self.metrics.record_miss(key);
                    Err(CacheError::NotFound(key.to_string()))
                }
            },
            other => Err(unexpected(&other)),
        }
    }

    async fn get_all(&self, type_name: &str) -> Result<KvStream> {
        match self
            .queue
            .submit(Operation::SelectByTypes(vec![type_name.to_string()]))
            .await?
        {
            Outcome::Entries(entries) => {
                Ok(stream::iter(entries.into_iter().map(|e| (e.key, e.value))).boxed())
            }
            other => Err(unexpected(&other)),
        }
    }

    async fn get_all_keys(&self, type_name: Option<&str>) -> Result<KeyStream> {
        match type_name {
            Some(type_name) => match self
                .queue
                .submit(Operation::SelectByTypes(vec![type_name.to_string()]))
                .await?
            {
                Outcome::Entries(entries) => {
                    Ok(stream::iter(entries.into_iter().map(|e| e.key)).boxed())
                }
                other => Err(unexpected(&other)),
            },
            None => match self.queue.submit(Operation::SelectAllKeys).await? {
                Outcome::Keys(keys) => Ok(stream::iter(keys).boxed()),
                other => Err(unexpected(&other)),
            },
        }
    }

    async fn get_created_at(&self, key: &str, _type_name: Option<&str>) -> Result<Option<i64>> {
        match self
            .queue
            .submit(Operation::SelectByKeys(vec![key.to_string()]))
            .await?
        {
            Outcome::Entries(entries) => {
                Ok(entries.into_iter().find(|e| e.key == key).map(|e| e.created_at))
            }
            other => Err(unexpected(&other)),
        }
    }

    async fn flush(&self, _type_name: Option<&str>) -> Result<()> {
        self.queue.submit(Operation::Flush).await?;
        Ok(())
    }

    async fn invalidate(&self, key: &str, _type_name: Option<&str>) -> Result<()> {
        self.queue
            .submit(Operation::InvalidateByKeys(vec![key.to_string()]))
            .await?;
        Ok(())
    }

    async fn invalidate_many(&self, keys: Vec<String>, _type_name: Option<&str>) -> Result<()> {
        self.queue.submit(Operation::InvalidateByKeys(keys)).await?;
        Ok(())
    }

    async fn invalidate_all(&self, type_name: Option<&str>) -> Result<()> {
        match type_name {
            Some(type_name) => {
                self.queue
                    .submit(Operation::InvalidateByTypes(vec![type_name.to_string()]))
                    .await?;
            }
            None => {
                self.queue.submit(Operation::InvalidateAll).await?;
            }
        }
        Ok(())
    }

    async fn vacuum(&self) -> Result<()> {
        self.queue.submit(Operation::Vacuum).await?;
        Ok(())
    }

    async fn shutdown(&self) -> Result<()> {
        self.queue.shutdown().await
    }
}
