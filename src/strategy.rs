//! Cache strategies for `find` and `all`.
//!
//! | Strategy       | Cache hit | Cache miss           | Typical use                    |
//! |----------------|-----------|----------------------|--------------------------------|
//! | **Refresh**    | Return    | Fetch, store         | Default read-through           |
//! | **Fresh**      | Return    | `Error::CacheMiss`   | Cache-only lookups             |
//! | **Invalidate** | Delete    | Fetch, store         | Known-stale entries            |
//! | **Bypass**     | Ignore    | Fetch, store         | `force`: skip read, still write |
//!
//! ```
//! use resource_kit::{CacheStrategy, QueryOptions};
//!
//! let forced = QueryOptions::default().force();
//! assert_eq!(forced.strategy, CacheStrategy::Bypass);
//! ```
//!
//! Strategies only matter for cacheable types; with caching disabled every
//! lookup goes to the transport and nothing is written.

/// Strategy controlling how a read uses the cache.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum CacheStrategy {
    /// Cache only. A miss fails with `Error::CacheMiss` instead of calling the
    /// transport.
    Fresh,

    /// Cache first, transport on miss, store the result.
    #[default]
    Refresh,

    /// Delete the entry, fetch from the transport, store the result.
    Invalidate,

    /// Skip the read, fetch from the transport, store the result.
    Bypass,
}

impl CacheStrategy {
    /// Whether the lookup consults the store before the transport.
    pub fn reads_cache(&self) -> bool {
        matches!(self, CacheStrategy::Fresh | CacheStrategy::Refresh)
    }

    /// Whether a miss may fall through to the transport.
    pub fn allows_fetch(&self) -> bool {
        !matches!(self, CacheStrategy::Fresh)
    }
}

impl std::fmt::Display for CacheStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheStrategy::Fresh => write!(f, "Fresh"),
            CacheStrategy::Refresh => write!(f, "Refresh"),
            CacheStrategy::Invalidate => write!(f, "Invalidate"),
            CacheStrategy::Bypass => write!(f, "Bypass"),
        }
    }
}
