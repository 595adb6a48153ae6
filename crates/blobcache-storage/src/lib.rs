//! blobcache-storage: storage backends for blobcache.

#[cfg(feature = "memory")]
pub mod memory;

#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(feature = "memory")]
pub use memory::InMemoryCache;

#[cfg(feature = "sqlite")]
pub use sqlite::{PersistentCache, PersistentCacheConfig};
