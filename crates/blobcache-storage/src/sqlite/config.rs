//! Typed construction parameters for [`super::PersistentCache`].

use super::queue::DEFAULT_DRAIN_CAPACITY;
use super::schema::CURRENT_SCHEMA_VERSION;
use std::path::PathBuf;

/// Configuration for opening a [`super::PersistentCache`].
#[derive(Debug, Clone)]
pub struct PersistentCacheConfig {
    pub(crate) path: PathBuf,
    pub(crate) drain_capacity: usize,
}

impl PersistentCacheConfig {
    /// Open (or create) the database at `path` with default drain batching.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            drain_capacity: DEFAULT_DRAIN_CAPACITY,
        }
    }

    /// Upper bound on queued operations folded into one write transaction.
    /// Larger batches amortize transaction overhead at the cost of latency
    /// for the first item in a burst.
    pub fn with_drain_capacity(mut self, drain_capacity: usize) -> Self {
        self.drain_capacity = drain_capacity.max(1);
        self
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    pub fn drain_capacity(&self) -> usize {
        self.drain_capacity
    }

    /// Schema version this build of the crate migrates every opened
    /// database to. Not configurable: there is only ever one "latest."
    pub fn schema_version(&self) -> i32 {
        CURRENT_SCHEMA_VERSION
    }
}
