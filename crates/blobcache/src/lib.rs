//! blobcache: an asynchronous, persistent key-value blob cache.
//!
//! Layers, bottom to top: a [`blobcache_core::CacheBackend`] contract with
//! two implementations ([`blobcache_storage::InMemoryCache`], volatile, and
//! [`blobcache_storage::PersistentCache`], SQLite-backed); a typed API
//! ([`TypedCache`]) that adds serialization and type-scoped keys on top;
//! [`FetchCache`], which adds single-flight fetch-and-cache policies; and
//! [`NamespaceRegistry`], the process-wide holder for the four conventional
//! cache slots.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use blobcache::prelude::*;
//! use std::sync::Arc;
//!
//! #[derive(serde::Serialize, serde::Deserialize, Clone)]
//! struct User { name: String }
//!
//! #[tokio::main]
//! async fn main() -> blobcache_core::Result<()> {
//!     let cache = FetchCache::new(Arc::new(InMemoryCache::new()), JsonSerializer::new());
//!     cache.typed().insert_object("u1", &User { name: "octocat".into() }, None).await?;
//!     let user: User = cache.typed().get_object("u1").await?;
//!     println!("{}", user.name);
//!     Ok(())
//! }
//! ```

mod dedup;
mod fetch;
mod registry;
mod typed;

pub use blobcache_core::*;
pub use dedup::RequestDeduplicator;
pub use fetch::FetchCache;
pub use registry::{IN_MEMORY, LOCAL_MACHINE, NamespaceConfig, NamespaceRegistry, SECURE, USER_ACCOUNT};
pub use typed::TypedCache;

#[cfg(feature = "memory")]
pub use blobcache_storage::InMemoryCache;

#[cfg(feature = "sqlite")]
pub use blobcache_storage::{PersistentCache, PersistentCacheConfig};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::{
        CacheBackend, CacheError, FetchCache, JsonSerializer, NamespaceConfig, NamespaceRegistry,
        RequestDeduplicator, Result, Serializer, TypeTag, TypedCache,
    };

    #[cfg(feature = "memory")]
    pub use crate::InMemoryCache;

    #[cfg(feature = "sqlite")]
    pub use crate::{PersistentCache, PersistentCacheConfig};

    #[cfg(feature = "msgpack")]
    pub use crate::MsgPackSerializer;

    #[cfg(feature = "bincode")]
    pub use crate::BincodeSerializer;
}
