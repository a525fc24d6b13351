//! Metrics hooks and TTL policies.
//!
//! The manager reports every cache operation and every transport request to
//! a [`CacheMetrics`] implementation. The default, [`NoOpMetrics`], drops them.
//!
//! ```ignore
//! use resource_kit::observability::CacheMetrics;
//! use std::time::Duration;
//!
//! struct PrometheusMetrics;
//!
//! impl CacheMetrics for PrometheusMetrics {
//!     fn record_hit(&self, _key: &str, duration: Duration) {
//!         // histogram!("resource_cache_latency").record(duration);
//!     }
//! }
//!
//! let manager = ResourceManager::new(config, backend, transport)
//!     .with_metrics(Box::new(PrometheusMetrics));
//! ```
//!
//! How long entries live is decided by a [`TtlPolicy`], keyed by the
//! singular resource type name:
//!
//! ```
//! use resource_kit::observability::TtlPolicy;
//! use std::time::Duration;
//!
//! let policy = TtlPolicy::PerType(|resource_type| match resource_type {
//!     "dummy" => Duration::from_secs(3600),
//!     _ => Duration::from_secs(600),
//! });
//! assert_eq!(policy.get_ttl("dummy"), Some(Duration::from_secs(3600)));
//! ```

use crate::transport::HttpMethod;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Trait for metrics collection.
///
/// Every method has a default that logs at debug level.
pub trait CacheMetrics: Send + Sync {
    fn record_hit(&self, key: &str, duration: Duration) {
        debug!("Cache HIT: {} took {:?}", key, duration);
    }

    fn record_miss(&self, key: &str, duration: Duration) {
        debug!("Cache MISS: {} took {:?}", key, duration);
    }

    fn record_set(&self, key: &str, duration: Duration) {
        debug!("Cache SET: {} took {:?}", key, duration);
    }

    fn record_delete(&self, key: &str, duration: Duration) {
        debug!("Cache DELETE: {} took {:?}", key, duration);
    }

    fn record_error(&self, key: &str, error: &str) {
        warn!("Cache ERROR for {}: {}", key, error);
    }

    /// A transport request finished with `code` after `duration`.
    fn record_request(&self, method: HttpMethod, path: &str, code: u16, duration: Duration) {
        debug!("{} {} -> {} took {:?}", method, path, code, duration);
    }
}

#[derive(Clone, Default)]
pub struct NoOpMetrics;

impl CacheMetrics for NoOpMetrics {
    fn record_hit(&self, _key: &str, _duration: Duration) {}
    fn record_miss(&self, _key: &str, _duration: Duration) {}
    fn record_set(&self, _key: &str, _duration: Duration) {}
    fn record_delete(&self, _key: &str, _duration: Duration) {}
    fn record_error(&self, _key: &str, _error: &str) {}
    fn record_request(&self, _method: HttpMethod, _path: &str, _code: u16, _duration: Duration) {}
}

/// Metrics that count events, for tests and diagnostics.
///
/// Share it with the manager through an `Arc`:
///
/// ```
/// use resource_kit::observability::CountingMetrics;
/// use std::sync::Arc;
///
/// let metrics = Arc::new(CountingMetrics::default());
/// assert_eq!(metrics.snapshot().hits, 0);
/// ```
#[derive(Debug, Default)]
pub struct CountingMetrics {
    hits: AtomicU64,
    misses: AtomicU64,
    sets: AtomicU64,
    deletes: AtomicU64,
    errors: AtomicU64,
    requests: AtomicU64,
}

/// Point-in-time counts from [`CountingMetrics`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub hits: u64,
    pub misses: u64,
    pub sets: u64,
    pub deletes: u64,
    pub errors: u64,
    pub requests: u64,
}

impl CountingMetrics {
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            sets: self.sets.load(Ordering::Relaxed),
            deletes: self.deletes.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            requests: self.requests.load(Ordering::Relaxed),
        }
    }
}

impl CacheMetrics for CountingMetrics {
    fn record_hit(&self, _key: &str, _duration: Duration) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    fn record_miss(&self, _key: &str, _duration: Duration) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    fn record_set(&self, _key: &str, _duration: Duration) {
        self.sets.fetch_add(1, Ordering::Relaxed);
    }

    fn record_delete(&self, _key: &str, _duration: Duration) {
        self.deletes.fetch_add(1, Ordering::Relaxed);
    }

    fn record_error(&self, _key: &str, _error: &str) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    fn record_request(&self, _method: HttpMethod, _path: &str, _code: u16, _duration: Duration) {
        self.requests.fetch_add(1, Ordering::Relaxed);
    }
}

impl<M: CacheMetrics + ?Sized> CacheMetrics for std::sync::Arc<M> {
    fn record_hit(&self, key: &str, duration: Duration) {
        (**self).record_hit(key, duration)
    }

    fn record_miss(&self, key: &str, duration: Duration) {
        (**self).record_miss(key, duration)
    }

    fn record_set(&self, key: &str, duration: Duration) {
        (**self).record_set(key, duration)
    }

    fn record_delete(&self, key: &str, duration: Duration) {
        (**self).record_delete(key, duration)
    }

    fn record_error(&self, key: &str, error: &str) {
        (**self).record_error(key, error)
    }

    fn record_request(&self, method: HttpMethod, path: &str, code: u16, duration: Duration) {
        (**self).record_request(method, path, code, duration)
    }
}

/// TTL policy for cache entries.
#[derive(Clone, Debug, Default)]
pub enum TtlPolicy {
    /// Leave expiry to the backend.
    #[default]
    Default,

    /// Same duration for every entry.
    Fixed(Duration),

    /// Entries never expire.
    Infinite,

    /// Duration chosen by resource type name.
    PerType(fn(&str) -> Duration),
}

impl TtlPolicy {
    pub fn get_ttl(&self, resource_type: &str) -> Option<Duration> {
        match self {
            TtlPolicy::Default | TtlPolicy::Infinite => None,
            TtlPolicy::Fixed(d) => Some(*d),
            TtlPolicy::PerType(f) => Some(f(resource_type)),
        }
    }
}
