//! Cache key construction.
//!
//! A key is built from the resource type, the collection scope (the relative
//! collection path, which carries the whole parent chain), and either a
//! member identifier or nothing for collection lookups. Non-empty conditions
//! are appended in canonical form.
//!
//! ```text
//! dummy:dummies/5
//! dummy:dummies?"title"="Dummy"
//! child:dummies/1/children/3?"title"="Child"
//! ```

use crate::conditions::Conditions;
use dashmap::DashMap;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// What a key looks up.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Lookup {
    /// A single resource by identifier.
    Member(String),
    /// A collection of resources.
    Collection,
}

/// Deterministic key for a cached query.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CacheKey {
    resource_type: String,
    scope: String,
    lookup: Lookup,
    conditions: String,
}

impl CacheKey {
    /// Key for a member lookup.
    pub fn member(
        resource_type: &str,
        scope: impl Into<String>,
        id: impl Into<String>,
        conditions: &Conditions,
    ) -> Self {
        CacheKey {
            resource_type: resource_type.to_string(),
            scope: scope.into(),
            lookup: Lookup::Member(id.into()),
            conditions: conditions.canonical(),
        }
    }

    /// Key for a collection lookup.
    pub fn collection(
        resource_type: &str,
        scope: impl Into<String>,
        conditions: &Conditions,
    ) -> Self {
        CacheKey {
            resource_type: resource_type.to_string(),
            scope: scope.into(),
            lookup: Lookup::Collection,
            conditions: conditions.canonical(),
        }
    }

    pub fn resource_type(&self) -> &str {
        &self.resource_type
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }

    pub fn lookup(&self) -> &Lookup {
        &self.lookup
    }

    pub fn is_collection(&self) -> bool {
        self.lookup == Lookup::Collection
    }

    /// `type:scope`, shared by every key of one collection.
    pub fn base(&self) -> String {
        format!("{}:{}", self.resource_type, self.scope)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.resource_type, self.scope)?;
        if let Lookup::Member(id) = &self.lookup {
            write!(f, "/{}", id)?;
        }
        if !self.conditions.is_empty() {
            write!(f, "?{}", self.conditions)?;
        }
        Ok(())
    }
}

/// Keys one scope may track before older ones are displaced.
const DEFAULT_SCOPE_LIMIT: usize = 512;

/// Slack past a key's TTL before the index forgets it. Memcached expires on
/// whole seconds, so an entry may outlive its TTL by up to one.
const EXPIRY_GRACE: Duration = Duration::from_secs(1);

/// Keys written to the store, grouped by [`CacheKey::base`].
///
/// Conditioned lookups produce keys nobody can rebuild from a resource
/// alone; the index remembers them so a mutation can evict every lookup that
/// may contain the resource.
///
/// Keys are forgotten once their TTL has passed, when a read misses, or when
/// they are evicted. Each scope holds at most `scope_limit` keys; a key
/// displaced past that limit is handed back so the caller evicts it too.
#[derive(Clone)]
pub(crate) struct KeyIndex {
    written: Arc<DashMap<String, HashMap<CacheKey, Option<Instant>>>>,
    scope_limit: usize,
}

impl Default for KeyIndex {
    fn default() -> Self {
        KeyIndex {
            written: Arc::new(DashMap::new()),
            scope_limit: DEFAULT_SCOPE_LIMIT,
        }
    }
}

impl KeyIndex {
    #[cfg(test)]
    pub(crate) fn with_scope_limit(limit: usize) -> Self {
        KeyIndex {
            scope_limit: limit.max(1),
            ..Default::default()
        }
    }

    /// Track `key`, stored with `ttl`. Returns keys displaced from the
    /// scope, which must be evicted from the store.
    pub(crate) fn record(&self, key: &CacheKey, ttl: Option<Duration>) -> Vec<String> {
        let now = Instant::now();
        let mut keys = self.written.entry(key.base()).or_default();
        keys.retain(|_, expires| expires.map_or(true, |at| at > now));
        keys.insert(key.clone(), ttl.map(|d| now + d + EXPIRY_GRACE));

        let mut displaced = Vec::new();
        while keys.len() > self.scope_limit {
            let Some(victim) = keys.keys().find(|k| *k != key).cloned() else {
                break;
            };
            keys.remove(&victim);
            displaced.push(victim.to_string());
        }
        displaced
    }

    /// Stop tracking `key`, once the store no longer holds it.
    pub(crate) fn forget(&self, key: &CacheKey) {
        let base = key.base();
        if let Some(mut keys) = self.written.get_mut(&base) {
            keys.remove(key);
        }
        self.written.remove_if(&base, |_, keys| keys.is_empty());
    }

    /// Remove and return the collection keys of `base`, plus its member keys
    /// for `id`.
    pub(crate) fn take_related(&self, base: &str, id: Option<&str>) -> Vec<String> {
        let Some(mut keys) = self.written.get_mut(base) else {
            return Vec::new();
        };
        let mut taken = Vec::new();
        keys.retain(|key, _| {
            let related = match &key.lookup {
                Lookup::Collection => true,
                Lookup::Member(member) => Some(member.as_str()) == id,
            };
            if related {
                taken.push(key.to_string());
            }
            !related
        });
        taken
    }

    /// Remove and return every key of `base`.
    pub(crate) fn take_all(&self, base: &str) -> Vec<String> {
        self.written
            .remove(base)
            .map(|(_, keys)| keys.keys().map(CacheKey::to_string).collect())
            .unwrap_or_default()
    }

    /// Number of tracked keys across all scopes.
    pub(crate) fn len(&self) -> usize {
        self.written.iter().map(|keys| keys.len()).sum()
    }

    pub(crate) fn clear(&self) {
        self.written.clear();
    }
}
