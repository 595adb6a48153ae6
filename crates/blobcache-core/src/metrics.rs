//! Ambient observability seam.
//!
//! Not part of the cache contract's public surface — backends call into a
//! `CacheMetrics` implementation purely to record what happened. The
//! default [`NoopMetrics`] costs nothing; [`TracingMetrics`] re-expresses
//! the same events as `tracing` spans for callers who already have a
//! subscriber wired up.

use std::time::Duration;

/// Labels the kind of operation a latency sample belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheOperation {
    Insert,
    Get,
    Invalidate,
    Vacuum,
}

impl CacheOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheOperation::Insert => "insert",
            CacheOperation::Get => "get",
            CacheOperation::Invalidate => "invalidate",
            CacheOperation::Vacuum => "vacuum",
        }
    }
}

/// Why an entry left the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EvictionReason {
    Expired,
    Invalidated,
    Replaced,
}

impl EvictionReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            EvictionReason::Expired => "expired",
            EvictionReason::Invalidated => "invalidated",
            EvictionReason::Replaced => "replaced",
        }
    }
}

/// Trait for cache metrics/observability. Implement this to integrate with
/// a metrics system; the cache itself only ever calls these methods, never
/// branches on whether they do anything.
pub trait CacheMetrics: Send + Sync + 'static {
    fn record_hit(&self, key: &str);
    fn record_miss(&self, key: &str);
    fn record_latency(&self, operation: CacheOperation, duration: Duration);
    fn record_eviction(&self, reason: EvictionReason);
}

/// Zero-overhead default.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopMetrics;

impl CacheMetrics for NoopMetrics {
    #[inline]
    fn record_hit(&self, _key: &str) {}
    #[inline]
    fn record_miss(&self, _key: &str) {}
    #[inline]
    fn record_latency(&self, _operation: CacheOperation, _duration: Duration) {}
    #[inline]
    fn record_eviction(&self, _reason: EvictionReason) {}
}

/// Re-expresses cache events as `tracing` events on the `blobcache` target.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingMetrics;

impl CacheMetrics for TracingMetrics {
    fn record_hit(&self, key: &str) {
        tracing::trace!(target: "blobcache", key, "cache hit");
    }

    fn record_miss(&self, key: &str) {
        tracing::trace!(target: "blobcache", key, "cache miss");
    }

    fn record_latency(&self, operation: CacheOperation, duration: Duration) {
        tracing::debug!(
            target: "blobcache",
            operation = operation.as_str(),
            micros = duration.as_micros() as u64,
            "operation latency"
        );
    }

    fn record_eviction(&self, reason: EvictionReason) {
        tracing::debug!(target: "blobcache", reason = reason.as_str(), "eviction");
    }
}
