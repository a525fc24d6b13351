//! Memcached cache backend.

use super::CacheBackend;
use crate::error::{Error, Result};
use async_memcached::AsciiProtocol;
use deadpool_memcached::{Manager, Object, Pool};
use sha2::{Digest, Sha256};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Default connection pool size, overridable with `MEMCACHED_POOL_SIZE`.
const DEFAULT_POOL_SIZE: u32 = 16;

/// Longest key memcached accepts.
const MAX_KEY_LEN: usize = 250;

#[derive(Clone, Debug)]
pub struct MemcachedConfig {
    /// Server address, e.g. `localhost:11211`. Only the first entry is used.
    pub servers: Vec<String>,
    pub pool_size: u32,
    /// Prepended to every key, so several applications can share a server.
    pub namespace: Option<String>,
}

impl Default for MemcachedConfig {
    fn default() -> Self {
        MemcachedConfig {
            servers: vec!["localhost:11211".to_string()],
            pool_size: DEFAULT_POOL_SIZE,
            namespace: None,
        }
    }
}

/// Memcached backend over a deadpool connection pool.
///
/// Cache keys built from conditions may contain spaces or run long; they are
/// rewritten into memcached-safe form before every call.
///
/// # Example
///
/// ```no_run
/// # use resource_kit::backend::{CacheBackend, MemcachedBackend, MemcachedConfig};
/// # async fn example() -> resource_kit::Result<()> {
/// let backend = MemcachedBackend::new(MemcachedConfig {
///     namespace: Some("shop".to_string()),
///     ..Default::default()
/// })
/// .await?;
/// backend.set("dummy:dummies/1", b"{}".to_vec(), None).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct MemcachedBackend {
    pool: Pool,
    namespace: Option<String>,
}

impl MemcachedBackend {
    /// # Errors
    /// Returns `Error::ConfigurationInvalid` without servers or if the pool
    /// cannot be built.
    pub async fn new(config: MemcachedConfig) -> Result<Self> {
        let addr = config
            .servers
            .first()
            .ok_or_else(|| {
                Error::ConfigurationInvalid("No memcached servers specified".to_string())
            })?
            .clone();

        let pool = Pool::builder(Manager::new(addr.clone()))
            .max_size(config.pool_size as usize)
            .build()
            .map_err(|e| {
                Error::ConfigurationInvalid(format!("Failed to create connection pool: {}", e))
            })?;

        info!(
            "✓ Memcached backend initialized with server: {} (pool size: {})",
            addr, config.pool_size
        );

        Ok(MemcachedBackend {
            pool,
            namespace: config.namespace,
        })
    }

    /// Connect to a single server, sizing the pool from `MEMCACHED_POOL_SIZE`.
    ///
    /// # Errors
    /// Returns `Err` if the pool cannot be built.
    pub async fn from_server(addr: impl Into<String>) -> Result<Self> {
        let pool_size = std::env::var("MEMCACHED_POOL_SIZE")
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
            .unwrap_or(DEFAULT_POOL_SIZE);

        Self::new(MemcachedConfig {
            servers: vec![addr.into()],
            pool_size,
            ..Default::default()
        })
        .await
    }

    async fn connection(&self) -> Result<Object> {
        self.pool.get().await.map_err(|e| {
            Error::BackendError(format!("Failed to get Memcached connection: {}", e))
        })
    }

    fn wire_key(&self, key: &str) -> String {
        let full = match &self.namespace {
            Some(ns) => format!("{}:{}", ns, key),
            None => key.to_string(),
        };
        sanitize_key(&full)
    }
}

/// Rewrite `key` so memcached accepts it.
///
/// Whitespace and control characters are percent-escaped. Keys still over
/// the length limit keep a prefix and gain a hash of the full key.
pub(crate) fn sanitize_key(key: &str) -> String {
    let mut escaped = String::with_capacity(key.len());
    for c in key.chars() {
        if c.is_whitespace() || c.is_control() || c == '%' {
            let mut buf = [0u8; 4];
            for byte in c.encode_utf8(&mut buf).bytes() {
                escaped.push_str(&format!("%{:02X}", byte));
            }
        } else {
            escaped.push(c);
        }
    }

    if escaped.len() <= MAX_KEY_LEN {
        return escaped;
    }

    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    let hex = format!("{:x}", hasher.finalize());
    let digest = format!("#{}", &hex[..16]);

    let mut cut = MAX_KEY_LEN - digest.len();
    while !escaped.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}{}", &escaped[..cut], digest)
}

/// Longest expiration memcached reads as relative seconds; larger values
/// are taken as a unix timestamp.
const MAX_RELATIVE_EXPIRATION: u64 = 60 * 60 * 24 * 30;

/// Expiration field for `ttl`.
///
/// Memcached counts whole seconds and reads `0` as "never expire", so
/// sub-second TTLs round up. TTLs past 30 days become absolute timestamps.
pub(crate) fn expiration_for(ttl: Duration) -> i64 {
    let mut secs = ttl.as_secs();
    if ttl.subsec_nanos() > 0 {
        secs += 1;
    }
    let secs = secs.max(1);

    if secs > MAX_RELATIVE_EXPIRATION {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        return i64::try_from(now.saturating_add(secs)).unwrap_or(i64::MAX);
    }
    secs as i64
}

impl CacheBackend for MemcachedBackend {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let wire = self.wire_key(key);
        let mut conn = self.connection().await?;

        match conn.get(&wire).await {
            Ok(Some(value)) => {
                debug!("✓ Memcached GET {} -> HIT", key);
                Ok(value.data)
            }
            Ok(None) => {
                debug!("✓ Memcached GET {} -> MISS", key);
                Ok(None)
            }
            Err(e) => Err(Error::BackendError(format!(
                "Memcached GET failed for key {}: {}",
                key, e
            ))),
        }
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<()> {
        let wire = self.wire_key(key);
        let mut conn = self.connection().await?;

        let expiration = ttl.map(expiration_for);

        conn.set(&wire, value.as_slice(), expiration, None)
            .await
            .map_err(|e| {
                Error::BackendError(format!("Memcached SET failed for key {}: {}", key, e))
            })?;

        match ttl {
            Some(d) => debug!("✓ Memcached SET {} (TTL: {:?})", key, d),
            None => debug!("✓ Memcached SET {}", key),
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let wire = self.wire_key(key);
        let mut conn = self.connection().await?;

        match conn.delete(&wire).await {
            Ok(()) => {}
            Err(e) if e.to_string().to_lowercase().contains("not found") => {}
            Err(e) => {
                return Err(Error::BackendError(format!(
                    "Memcached DELETE failed for key {}: {}",
                    key, e
                )))
            }
        }

        debug!("✓ Memcached DELETE {}", key);
        Ok(())
    }

    /// Clear the server with `flush_all`.
    ///
    /// Memcached cannot flush a single namespace, so a namespaced backend
    /// refuses rather than wipe the entries of every other namespace.
    async fn flush(&self) -> Result<()> {
        if let Some(ns) = &self.namespace {
            return Err(Error::BackendError(format!(
                "Refusing FLUSH_ALL from namespace {}: it would clear the whole server",
                ns
            )));
        }
        let mut conn = self.connection().await?;

        conn.flush_all()
            .await
            .map_err(|e| Error::BackendError(format!("Memcached FLUSH_ALL failed: {}", e)))?;

        warn!("⚠ Memcached FLUSH_ALL executed - all cache cleared!");
        Ok(())
    }
}
