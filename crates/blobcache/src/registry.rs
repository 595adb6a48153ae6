//! Global namespace registry: the four named cache slots an application
//! initializes once at startup and disposes once at shutdown.

use async_trait::async_trait;
use blobcache_core::{CacheBackend, CacheError, KeyStream, KvStream, Result};
use dashmap::DashMap;
use futures::stream::{self, StreamExt};
use std::sync::Arc;

pub const LOCAL_MACHINE: &str = "local_machine";
pub const USER_ACCOUNT: &str = "user_account";
pub const SECURE: &str = "secure";
pub const IN_MEMORY: &str = "in_memory";

const NAMESPACES: [&str; 4] = [LOCAL_MACHINE, USER_ACCOUNT, SECURE, IN_MEMORY];

/// Construction parameters for [`NamespaceRegistry::initialize`].
#[derive(Debug, Clone)]
pub struct NamespaceConfig {
    pub(crate) application_name: String,
}

impl NamespaceConfig {
    pub fn new(application_name: impl Into<String>) -> Self {
        Self {
            application_name: application_name.into(),
        }
    }

    pub fn application_name(&self) -> &str {
        &self.application_name
    }
}

/// Substituted for a disposed handle. Every write is a no-op, every read
/// comes back empty, and nothing here ever errors — a shutdown namespace
/// behaves as a permanently empty cache rather than a broken one.
struct SentinelBackend;

#[async_trait]
impl CacheBackend for SentinelBackend {
    async fn insert(&self, _key: &str, _value: Vec<u8>, _type_name: Option<&str>, _expires_at: Option<i64>) -> Result<()> {
        Ok(())
    }

    async fn get(&self, key: &str, _type_name: Option<&str>) -> Result<Vec<u8>> {
        Err(CacheError::NotFound(key.to_string()))
    }

    async fn get_all(&self, _type_name: &str) -> Result<KvStream> {
        Ok(stream::empty().boxed())
    }

    async fn get_all_keys(&self, _type_name: Option<&str>) -> Result<KeyStream> {
        Ok(stream::empty().boxed())
    }

    async fn get_created_at(&self, _key: &str, _type_name: Option<&str>) -> Result<Option<i64>> {
        Ok(None)
    }

    async fn invalidate(&self, _key: &str, _type_name: Option<&str>) -> Result<()> {
        Ok(())
    }

    async fn invalidate_all(&self, _type_name: Option<&str>) -> Result<()> {
        Ok(())
    }

    async fn vacuum(&self) -> Result<()> {
        Ok(())
    }

    async fn shutdown(&self) -> Result<()> {
        Ok(())
    }
}

/// Process-wide holder for the four named cache slots. `get` never returns
/// `None`: an uninitialized or shut-down namespace resolves to the shared
/// sentinel rather than forcing every call site to handle absence.
pub struct NamespaceRegistry {
    application_name: std::sync::RwLock<Option<String>>,
    slots: DashMap<&'static str, Arc<dyn CacheBackend>>,
    sentinel: Arc<dyn CacheBackend>,
}

impl NamespaceRegistry {
    pub fn new() -> Self {
        let sentinel: Arc<dyn CacheBackend> = Arc::new(SentinelBackend);
        let slots = DashMap::new();
        for name in NAMESPACES {
            slots.insert(name, sentinel.clone());
        }
        Self {
            application_name: std::sync::RwLock::new(None),
            slots,
            sentinel,
        }
    }

    pub fn application_name(&self) -> Option<String> {
        self.application_name.read().unwrap().clone()
    }

    /// Installs the four handles and records `config.application_name()`,
    /// which backends use to resolve per-user storage roots. Re-initializing
    /// after a `shutdown` is permitted and simply replaces the sentinels.
    pub fn initialize(
        &self,
        config: NamespaceConfig,
        local_machine: Arc<dyn CacheBackend>,
        user_account: Arc<dyn CacheBackend>,
        secure: Arc<dyn CacheBackend>,
        in_memory: Arc<dyn CacheBackend>,
    ) {
        *self.application_name.write().unwrap() = Some(config.application_name);
        self.slots.insert(LOCAL_MACHINE, local_machine);
        self.slots.insert(USER_ACCOUNT, user_account);
        self.slots.insert(SECURE, secure);
        self.slots.insert(IN_MEMORY, in_memory);
    }

    /// Sets a single slot directly, bypassing `initialize`. Useful for
    /// tests and for callers that only need one or two namespaces.
    pub fn set(&self, name: &'static str, backend: Arc<dyn CacheBackend>) {
        self.slots.insert(name, backend);
    }

    pub fn get(&self, name: &str) -> Arc<dyn CacheBackend> {
        self.slots
            .get(name)
            .map(|entry| entry.value().clone())
            .unwrap_or_else(|| self.sentinel.clone())
    }

    /// Disposes all four slots in sequence and replaces each with the
    /// sentinel. Idempotent: shutting down an already-sentinel slot is a
    /// no-op `shutdown()` call on the sentinel itself.
    pub async fn shutdown(&self) -> Result<()> {
        for name in NAMESPACES {
            let backend = self.get(name);
            backend.shutdown().await?;
            self.slots.insert(name, self.sentinel.clone());
        }
        Ok(())
    }
}

impl Default for NamespaceRegistry {
    fn default() -> Self {
        Self::new()
    }
}
