//! Pluggable serialization and the object-wrapper envelope.

use crate::CacheError;
use crate::ticks::{self, NEVER};
use serde::{Deserialize, Serialize, de::DeserializeOwned};

/// How a reconstructed timestamp should be interpreted on read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateTimeKind {
    Utc,
    Local,
    Unspecified,
}

/// Trait for pluggable serialization formats.
///
/// Implement this to add custom wire formats. Built-in implementations:
/// JSON (default), MessagePack, Bincode.
pub trait Serializer: Send + Sync + Clone + 'static {
    /// Name of the serializer (for debugging/metrics).
    fn name(&self) -> &str;

    /// Overrides how tick-encoded timestamps are interpreted when
    /// reconstructed. `None` means the caller gets the kind the value was
    /// originally stored with.
    fn forced_date_time_kind(&self) -> Option<DateTimeKind> {
        None
    }

    fn serialize<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, CacheError>;
    fn deserialize<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T, CacheError>;

    /// Wrap `value` in the object envelope before encoding it. Every typed
    /// write goes through this rather than [`Serializer::serialize`]
    /// directly.
    fn serialize_wrapped<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, CacheError> {
        self.serialize(&ObjectWrapperRef { value })
    }

    /// Unwrap the object envelope, falling back to decoding the bytes as a
    /// bare (un-enveloped) value for payloads written before the envelope
    /// existed, or written by a caller that bypassed it.
    fn deserialize_wrapped<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T, CacheError> {
        match self.deserialize::<ObjectWrapper<T>>(bytes) {
            Ok(wrapper) => Ok(wrapper.value),
            Err(_) => self.deserialize::<T>(bytes),
        }
    }
}

#[derive(Serialize)]
struct ObjectWrapperRef<'a, T> {
    value: &'a T,
}

#[derive(Deserialize)]
struct ObjectWrapper<T> {
    value: T,
}

/// A tick-encoded instant that round-trips through the envelope as a plain
/// 64-bit integer rather than a formatted string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheDateTime(pub i64);

impl CacheDateTime {
    pub fn now() -> Self {
        Self(ticks::now_ticks())
    }

    pub fn never() -> Self {
        Self(NEVER)
    }

    pub fn ticks(self) -> i64 {
        self.0
    }
}

impl Serialize for CacheDateTime {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.0.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for CacheDateTime {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        i64::deserialize(deserializer).map(CacheDateTime)
    }
}

/// JSON serializer (default).
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonSerializer {
    forced_kind: Option<DateTimeKind>,
}

impl JsonSerializer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_forced_date_time_kind(mut self, kind: DateTimeKind) -> Self {
        self.forced_kind = Some(kind);
        self
    }
}

impl Serializer for JsonSerializer {
    fn name(&self) -> &str {
        "json"
    }

    fn forced_date_time_kind(&self) -> Option<DateTimeKind> {
        self.forced_kind
    }

    fn serialize<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, CacheError> {
        serde_json::to_vec(value).map_err(|e| CacheError::Serialization(e.to_string()))
    }

    fn deserialize<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T, CacheError> {
        serde_json::from_slice(bytes).map_err(|e| CacheError::Deserialization(e.to_string()))
    }
}

/// MessagePack serializer (optional). Faster and more compact than JSON,
/// not human-readable. Enable with the `msgpack` feature.
#[cfg(feature = "msgpack")]
#[derive(Debug, Clone, Copy, Default)]
pub struct MsgPackSerializer {
    forced_kind: Option<DateTimeKind>,
}

#[cfg(feature = "msgpack")]
impl Serializer for MsgPackSerializer {
    fn name(&self) -> &str {
        "msgpack"
    }

    fn forced_date_time_kind(&self) -> Option<DateTimeKind> {
        self.forced_kind
    }

    fn serialize<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, CacheError> {
        rmp_serde::to_vec(value).map_err(|e| CacheError::Serialization(e.to_string()))
    }

    fn deserialize<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T, CacheError> {
        rmp_serde::from_slice(bytes).map_err(|e| CacheError::Deserialization(e.to_string()))
    }
}

/// Bincode serializer (optional). Fastest and most compact, not
/// cross-language. Enable with the `bincode` feature.
#[cfg(feature = "bincode")]
#[derive(Debug, Clone, Copy, Default)]
pub struct BincodeSerializer {
    forced_kind: Option<DateTimeKind>,
}

#[cfg(feature = "bincode")]
impl Serializer for BincodeSerializer {
    fn name(&self) -> &str {
        "bincode"
    }

    fn forced_date_time_kind(&self) -> Option<DateTimeKind> {
        self.forced_kind
    }

    fn serialize<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, CacheError> {
        bincode::serde::encode_to_vec(value, bincode::config::standard())
            .map_err(|e| CacheError::Serialization(e.to_string()))
    }

    fn deserialize<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T, CacheError> {
        let (val, _len) = bincode::serde::decode_from_slice(bytes, bincode::config::standard())
            .map_err(|e| CacheError::Deserialization(e.to_string()))?;
        Ok(val)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_roundtrip() {
        let serializer = JsonSerializer::new();
        let value = vec![1, 2, 3, 4, 5];
        let bytes = serializer.serialize(&value).unwrap();
        let decoded: Vec<i32> = serializer.deserialize(&bytes).unwrap();
        assert_eq!(value, decoded);
    }

    #[test]
    fn wrapped_roundtrip() {
        #[derive(Debug, PartialEq, serde::Serialize, serde::Deserialize)]
        struct Point {
            x: i32,
            y: i32,
        }

        let serializer = JsonSerializer::new();
        let value = Point { x: 1, y: 2 };
        let bytes = serializer.serialize_wrapped(&value).unwrap();
        let decoded: Point = serializer.deserialize_wrapped(&bytes).unwrap();
        assert_eq!(value, decoded);
    }

    #[test]
    fn wrapped_read_falls_back_to_bare_payload() {
        let serializer = JsonSerializer::new();
        let bare = serializer.serialize(&42i32).unwrap();
        let decoded: i32 = serializer.deserialize_wrapped(&bare).unwrap();
        assert_eq!(decoded, 42);
    }

    #[test]
    fn forced_date_time_kind_is_configurable() {
        let serializer = JsonSerializer::new().with_forced_date_time_kind(DateTimeKind::Utc);
        assert_eq!(serializer.forced_date_time_kind(), Some(DateTimeKind::Utc));
    }

    #[test]
    fn cache_date_time_roundtrips_as_plain_integer() {
        let serializer = JsonSerializer::new();
        let now = CacheDateTime::now();
        let bytes = serializer.serialize(&now).unwrap();
        let decoded: CacheDateTime = serializer.deserialize(&bytes).unwrap();
        assert_eq!(now, decoded);
    }
}
