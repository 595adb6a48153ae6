//! Error types for cache operations

use thiserror::Error;

/// Main error type for all cache operations.
///
/// The variants mirror the small taxonomy the cache contract promises
/// callers: a miss is never an error, everything else either names a bad
/// caller input, a backend-level failure, or the handle's lifecycle state.
#[derive(Error, Debug, Clone)]
pub enum CacheError {
    /// Key not found, or present but expired.
    #[error("key not found: {0}")]
    NotFound(String),

    /// The stored bytes could not be decoded into the requested type.
    #[error("deserialization error: {0}")]
    Deserialization(String),

    /// A value could not be encoded before being written.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Caller supplied a key, namespace, or option outside its valid range.
    #[error("invalid argument: {0}")]
    ArgumentInvalid(String),

    /// The operation targeted a handle that has already been shut down.
    #[error("cache handle has been disposed")]
    Disposed,

    /// The storage backend itself failed (I/O, driver, schema).
    #[error("backend error: {0}")]
    Backend(String),

    /// The operation was cancelled before it completed.
    #[error("operation cancelled")]
    Cancelled,

    /// Anything that doesn't fit the taxonomy above: a poisoned internal
    /// state or a channel closing out from under a caller.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Result type alias for cache operations
pub type Result<T> = std::result::Result<T, CacheError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CacheError::NotFound("test_key".to_string());
        assert_eq!(err.to_string(), "key not found: test_key");

        let err = CacheError::Deserialization("failed".to_string());
        assert_eq!(err.to_string(), "deserialization error: failed");

        let err = CacheError::Disposed;
        assert_eq!(err.to_string(), "cache handle has been disposed");
    }

    #[test]
    fn test_error_clone() {
        let err = CacheError::Cancelled;
        let cloned = err.clone();
        assert_eq!(err.to_string(), cloned.to_string());
    }
}
