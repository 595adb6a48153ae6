//! blobcache-core: the cache contract, wire types, and error taxonomy
//! shared by every storage backend and the typed API built on top of them.

mod backend;
mod entry;
mod error;
mod interfaces;
mod key;
mod metrics;
mod serializer;
pub mod ticks;

pub use backend::{CacheBackend, KeyStream, KvStream};
pub use entry::CacheEntry;
pub use error::{CacheError, Result};
pub use interfaces::{EncryptionProvider, FilesystemProvider, HttpService};
pub use key::{TypeTag, legacy_key};
pub use metrics::{CacheMetrics, CacheOperation, EvictionReason, NoopMetrics, TracingMetrics};
pub use serializer::{CacheDateTime, DateTimeKind, JsonSerializer, Serializer};

#[cfg(feature = "msgpack")]
pub use serializer::MsgPackSerializer;

#[cfg(feature = "bincode")]
pub use serializer::BincodeSerializer;
