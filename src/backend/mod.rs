//! Cache backend implementations.

use crate::error::Result;
use futures::future::try_join_all;
use std::time::Duration;

pub mod inmemory;
#[cfg(feature = "memcached")]
pub mod memcached;

pub use inmemory::{CacheStats, InMemoryBackend};
#[cfg(feature = "memcached")]
pub use memcached::{MemcachedBackend, MemcachedConfig};

/// Trait for cache backend implementations.
///
/// Stores opaque bytes under string keys. The manager only needs get, set
/// and delete; `flush` backs `ResourceManager::flush`.
///
/// All methods take `&self`, so implementations keep their state behind
/// interior mutability or an external server.
#[allow(async_fn_in_trait)]
pub trait CacheBackend: Send + Sync + Clone {
    /// Retrieve a value.
    ///
    /// # Returns
    /// - `Ok(Some(bytes))` on a hit
    /// - `Ok(None)` on a miss or an expired entry
    ///
    /// # Errors
    /// Returns `Err` if the backend is unreachable.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Store a value. `ttl` of `None` means no expiry.
    ///
    /// # Errors
    /// Returns `Err` if the backend is unreachable.
    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<()>;

    /// Remove a value. Deleting a missing key succeeds.
    ///
    /// # Errors
    /// Returns `Err` if the backend is unreachable.
    async fn delete(&self, key: &str) -> Result<()>;

    /// # Errors
    /// Returns `Err` if the backend is unreachable.
    async fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.get(key).await?.is_some())
    }

    /// Remove several values concurrently.
    ///
    /// # Errors
    /// Returns the first error reported by `delete`.
    async fn mdelete(&self, keys: &[&str]) -> Result<()> {
        try_join_all(keys.iter().map(|key| self.delete(key))).await?;
        Ok(())
    }

    /// Drop every entry.
    ///
    /// # Errors
    /// Returns `Err` if the backend is unreachable.
    async fn flush(&self) -> Result<()>;
}
