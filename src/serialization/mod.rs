//! Cache entry serialization with versioned envelopes.
//!
//! Every cache entry is a JSON document:
//!
//! ```text
//! {"magic":[82,75,73,84],"version":1,"payload":<normalized resource data>}
//! ```
//!
//! The payload is the normalized attribute map of a member, or an array of
//! them for a collection. Entries that fail to parse, or carry another magic
//! or version, are rejected with `Error::InvalidCacheData` so the caller can
//! evict them and refetch.
//!
//! # Example
//!
//! ```rust
//! use resource_kit::serialization::{deserialize_from_cache, serialize_for_cache};
//! use serde_json::{json, Value};
//!
//! # fn main() -> resource_kit::Result<()> {
//! let data = json!({"id": 1, "title": "Dummy"});
//! let bytes = serialize_for_cache(&data)?;
//! let back: Value = deserialize_from_cache(&bytes)?;
//! assert_eq!(back, data);
//! # Ok(())
//! # }
//! ```

use crate::error::{Error, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Magic header for resource-kit entries: b"RKIT"
pub const CACHE_MAGIC: [u8; 4] = *b"RKIT";

/// Current schema version.
///
/// Bump when the layout of cached payloads changes; entries written under an
/// older version are evicted on read.
pub const CURRENT_SCHEMA_VERSION: u32 = 1;

/// Versioned envelope for cache entries.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct CacheEnvelope<T> {
    pub magic: [u8; 4],
    pub version: u32,
    pub payload: T,
}

impl<T> CacheEnvelope<T> {
    pub fn new(payload: T) -> Self {
        Self {
            magic: CACHE_MAGIC,
            version: CURRENT_SCHEMA_VERSION,
            payload,
        }
    }
}

/// Serialize a value with envelope for cache storage.
///
/// # Errors
///
/// Returns `Error::SerializationError` if the value cannot be encoded.
pub fn serialize_for_cache<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    let envelope = CacheEnvelope::new(value);
    serde_json::to_vec(&envelope).map_err(|e| {
        error!("Cache serialization failed: {}", e);
        Error::SerializationError(e.to_string())
    })
}

/// Deserialize a value from cache storage, checking magic and version.
///
/// # Errors
///
/// Returns `Error::InvalidCacheData` for unparseable bytes, a foreign magic
/// header or a schema version mismatch.
pub fn deserialize_from_cache<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    let envelope: CacheEnvelope<T> = serde_json::from_slice(bytes).map_err(|e| {
        warn!("Cache entry could not be decoded: {}", e);
        Error::InvalidCacheData(format!("Undecodable cache entry: {}", e))
    })?;

    if envelope.magic != CACHE_MAGIC {
        warn!(
            "Invalid cache entry: expected magic {:?}, got {:?}",
            CACHE_MAGIC, envelope.magic
        );
        return Err(Error::InvalidCacheData(format!(
            "Invalid magic: expected {:?}, got {:?}",
            CACHE_MAGIC, envelope.magic
        )));
    }

    if envelope.version != CURRENT_SCHEMA_VERSION {
        warn!(
            "Cache version mismatch: expected {}, got {}",
            CURRENT_SCHEMA_VERSION, envelope.version
        );
        return Err(Error::InvalidCacheData(format!(
            "Schema version {} (expected {})",
            envelope.version, CURRENT_SCHEMA_VERSION
        )));
    }

    Ok(envelope.payload)
}
