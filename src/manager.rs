//! Resource manager - main entry point for resource operations.
//!
//! Reads (`find`, `all`) go through the cache store first and fall back to
//! the transport; writes (`save`, `destroy`) always go to the transport and
//! invalidate every cache entry that may hold the resource.
//!
//! ```text
//! find/all:  key ──► store ──hit──► Resource
//!                      │
//!                     miss ──► GET path ──► classify ──► store ──► Resource
//!
//! save/destroy:  POST/PUT/DELETE path ──► classify ──► invalidate keys
//! ```

use crate::backend::CacheBackend;
use crate::conditions::Conditions;
use crate::config::Config;
use crate::entity::ResourceType;
use crate::error::{Error, Result};
use crate::key::{CacheKey, KeyIndex};
use crate::observability::{CacheMetrics, NoOpMetrics, TtlPolicy};
use crate::path::{PathOptions, PathResolver};
use crate::relationship::{Ancestor, Relationship, RelationshipRegistry};
use crate::resource::Resource;
use crate::response::{classify, Classified, ResponseStatus};
use crate::serialization::{deserialize_from_cache, serialize_for_cache};
use crate::strategy::CacheStrategy;
use crate::transport::{HttpMethod, RequestOptions, RestClient};
use serde_json::Value;
use std::fmt::Display;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Options for a single `find` or `all`.
///
/// # Example
///
/// ```
/// use resource_kit::{CacheStrategy, QueryOptions};
/// use std::time::Duration;
///
/// let options = QueryOptions::new()
///     .condition("title", "Dummy")
///     .with_ttl(Duration::from_secs(60))
///     .force();
///
/// assert_eq!(options.strategy, CacheStrategy::Bypass);
/// assert_eq!(options.conditions.len(), 1);
/// ```
#[derive(Clone, Debug, Default)]
pub struct QueryOptions {
    /// Attribute filters, sent as query parameters and folded into the key.
    pub conditions: Conditions,
    pub strategy: CacheStrategy,
    /// Resolve through a parent instead of the flat collection.
    pub relationship: Option<Relationship>,
    /// TTL for the entry written by this lookup; overrides the manager's
    /// `TtlPolicy`.
    pub ttl_override: Option<Duration>,
}

impl QueryOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_conditions(mut self, conditions: Conditions) -> Self {
        self.conditions = conditions;
        self
    }

    /// Add one condition.
    pub fn condition(mut self, attribute: impl Into<String>, value: impl Into<Value>) -> Self {
        self.conditions.insert(attribute, value);
        self
    }

    /// Skip the cache read but still store the fetched result.
    pub fn force(mut self) -> Self {
        self.strategy = CacheStrategy::Bypass;
        self
    }

    pub fn with_strategy(mut self, strategy: CacheStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn through(mut self, relationship: Relationship) -> Self {
        self.relationship = Some(relationship);
        self
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl_override = Some(ttl);
        self
    }
}

/// Orchestrates cache lookups, transport requests and invalidation.
///
/// # Example
///
/// ```no_run
/// use resource_kit::backend::InMemoryBackend;
/// use resource_kit::transport::StubTransport;
/// use resource_kit::{Config, QueryOptions, ResourceManager, ResourceType};
/// use std::sync::Arc;
///
/// # async fn example() -> resource_kit::Result<()> {
/// let config = Config::builder().base_uri("/api").resource_suffix(".json").build()?;
/// let manager = ResourceManager::new(config, InMemoryBackend::new(), StubTransport::new());
///
/// let dummy = Arc::new(ResourceType::new("dummy"));
/// let found = manager.find(&dummy, 5, &QueryOptions::default()).await?;
/// assert!(found.is_persisted());
/// # Ok(())
/// # }
/// ```
pub struct ResourceManager<B: CacheBackend, C: RestClient> {
    config: Arc<Config>,
    backend: B,
    client: C,
    registry: RelationshipRegistry,
    index: KeyIndex,
    metrics: Box<dyn CacheMetrics>,
    ttl_policy: TtlPolicy,
}

impl<B: CacheBackend, C: RestClient> ResourceManager<B, C> {
    pub fn new(config: impl Into<Arc<Config>>, backend: B, client: C) -> Self {
        ResourceManager {
            config: config.into(),
            backend,
            client,
            registry: RelationshipRegistry::new(),
            index: KeyIndex::default(),
            metrics: Box::new(NoOpMetrics),
            ttl_policy: TtlPolicy::default(),
        }
    }

    /// Use a registry shared with other managers.
    pub fn with_registry(mut self, registry: RelationshipRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_metrics(mut self, metrics: Box<dyn CacheMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn with_ttl_policy(mut self, policy: TtlPolicy) -> Self {
        self.ttl_policy = policy;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn registry(&self) -> &RelationshipRegistry {
        &self.registry
    }

    pub fn ttl_policy(&self) -> &TtlPolicy {
        &self.ttl_policy
    }

    /// Path builder bound to this manager's config and registry.
    pub fn paths(&self) -> PathResolver<'_> {
        PathResolver::new(&self.config, &self.registry)
    }

    /// Whether lookups and invalidation for `kind` use the cache.
    pub fn cacheable(&self, kind: &ResourceType) -> bool {
        kind.cacheable(&self.config)
    }

    /// Find one resource by identifier.
    ///
    /// # Errors
    ///
    /// - `Error::MissingIdentifier` for an empty id
    /// - `Error::InvalidPath` if the relationship cannot be resolved
    /// - `Error::CacheMiss` on a miss with `CacheStrategy::Fresh`
    /// - `Error::RecordNotFound` when the API answers 404
    /// - `Error::RequestFailed` for 422, 406 or 500
    /// - `Error::InvalidCacheData` for a corrupt cache entry or payload
    /// - `Error::Transport` and `Error::UnknownResponseStatus` unchanged
    pub async fn find(
        &self,
        kind: &Arc<ResourceType>,
        id: impl Display,
        options: &QueryOptions,
    ) -> Result<Resource> {
        let id = id.to_string();
        let relationship = options.relationship.as_ref();
        let path = self
            .paths()
            .find_path(kind, &id, &PathOptions::through(relationship))?;
        let scope = self.paths().scope(kind, relationship)?;
        let key = CacheKey::member(kind.name(), scope, id.clone(), &options.conditions);
        let cacheable = self.cacheable(kind);

        debug!("» find {} (strategy: {})", key, options.strategy);

        if cacheable {
            if let Some(payload) = self.lookup(&key, options.strategy).await? {
                let rebuilt = Resource::from_payload(
                    Arc::clone(kind),
                    Some(payload),
                    Some(key.to_string()),
                    ancestry_of(relationship),
                );
                return self.revive(&key, rebuilt).await;
            }
        }

        let request = RequestOptions::with_query(options.conditions.to_query());
        let classified = self.fetch(&key, cacheable, &path, &request).await?;
        let resource = Resource::from_payload(
            Arc::clone(kind),
            Some(classified.body),
            Some(key.to_string()),
            ancestry_of(relationship),
        )?;

        if cacheable {
            self.store(&key, &resource.to_json(), self.ttl_for(kind, options))
                .await;
        }
        Ok(resource)
    }

    /// Fetch a collection.
    ///
    /// The response body may be a list, or an object holding the list under
    /// the plural type name. Every returned resource remembers the collection
    /// key as its provenance.
    ///
    /// # Errors
    ///
    /// Same as [`find`](Self::find), without `MissingIdentifier`.
    pub async fn all(
        &self,
        kind: &Arc<ResourceType>,
        options: &QueryOptions,
    ) -> Result<Vec<Resource>> {
        let relationship = options.relationship.as_ref();
        let path = self
            .paths()
            .resource_path(kind, &PathOptions::through(relationship))?;
        let scope = self.paths().scope(kind, relationship)?;
        let key = CacheKey::collection(kind.name(), scope, &options.conditions);
        let ancestry = ancestry_of(relationship);
        let cacheable = self.cacheable(kind);

        debug!("» all {} (strategy: {})", key, options.strategy);

        if cacheable {
            if let Some(payload) = self.lookup(&key, options.strategy).await? {
                let rebuilt = match payload {
                    Value::Array(items) => build_all(kind, items, &key, &ancestry),
                    other => Err(Error::InvalidCacheData(format!(
                        "Invalid data: expected a list under {}, got {}",
                        key, other
                    ))),
                };
                return self.revive(&key, rebuilt).await;
            }
        }

        let request = RequestOptions::with_query(options.conditions.to_query());
        let classified = self.fetch(&key, cacheable, &path, &request).await?;
        let items = collection_items(kind, classified.body)?;
        let resources = build_all(kind, items, &key, &ancestry)?;

        if cacheable {
            let payload = Value::Array(resources.iter().map(Resource::to_json).collect());
            self.store(&key, &payload, self.ttl_for(kind, options)).await;
        }
        Ok(resources)
    }

    /// Create or update `resource`.
    ///
    /// Unsaved resources are POSTed to the collection path, persisted ones
    /// PUT to their member path; the body is wrapped under the type name.
    /// Returns `Ok(false)` when validation fails locally or the API answers
    /// 422 (errors land on `resource.errors()`), 406 or 500.
    ///
    /// # Errors
    ///
    /// - `Error::InvalidPath` if a parent has not been saved yet
    /// - `Error::RecordNotFound` when the API answers 404
    /// - `Error::Transport` and `Error::UnknownResponseStatus` unchanged
    pub async fn save(&self, resource: &mut Resource) -> Result<bool> {
        let kind = Arc::clone(resource.resource_type());
        if !resource.is_valid() {
            warn!(
                "Not saving invalid {}: {}",
                kind.name(),
                resource.errors().full_messages().join(", ")
            );
            return Ok(false);
        }

        let relationship = resource.relationship();
        let path_options = PathOptions::through(relationship.as_ref());
        let (method, path) = if resource.is_persisted() {
            let id = resource
                .id()
                .ok_or_else(|| Error::MissingIdentifier(kind.name().to_string()))?;
            (
                HttpMethod::Put,
                self.paths().find_path(&kind, id, &path_options)?,
            )
        } else {
            (
                HttpMethod::Post,
                self.paths().resource_path(&kind, &path_options)?,
            )
        };

        let body = resource.to_json_with_root();
        let request = RequestOptions::with_body(body.clone());
        let classified = self
            .handle_request(method, &path, &request, move || body)
            .await?;

        match classified.status {
            ResponseStatus::Success | ResponseStatus::Created => {
                resource.update_attributes_from_response(&classified.body);
                resource.mark_persisted();
                if self.cacheable(&kind) {
                    self.invalidate(resource, false).await?;
                }
                info!(
                    "✓ Saved {} {}",
                    kind.name(),
                    resource.id().unwrap_or_default()
                );
                Ok(true)
            }
            ResponseStatus::Errors => {
                resource.errors_mut().extend_from_body(&classified.body);
                warn!(
                    "Saving {} was rejected: {}",
                    kind.name(),
                    resource.errors().full_messages().join(", ")
                );
                Ok(false)
            }
            ResponseStatus::ServerError | ResponseStatus::NotAcceptable => {
                warn!(
                    "Saving {} failed with {} ({})",
                    kind.name(),
                    classified.code,
                    classified.status
                );
                Ok(false)
            }
            ResponseStatus::NotFound => Err(Error::RecordNotFound { path }),
        }
    }

    /// Delete `resource` remotely.
    ///
    /// On success every cache entry that may hold it is evicted, together
    /// with the unconditioned collections of its registered child types, and
    /// the resource is marked unsaved with no provenance.
    ///
    /// # Errors
    ///
    /// - `Error::MissingIdentifier` for a resource without id
    /// - `Error::InvalidPath` if a parent has not been saved yet
    /// - `Error::RecordNotFound` when the API answers 404
    /// - `Error::Transport` and `Error::UnknownResponseStatus` unchanged
    pub async fn destroy(&self, resource: &mut Resource) -> Result<bool> {
        let kind = Arc::clone(resource.resource_type());
        let id = resource
            .id()
            .ok_or_else(|| Error::MissingIdentifier(kind.name().to_string()))?;
        let relationship = resource.relationship();
        let path = self
            .paths()
            .find_path(&kind, &id, &PathOptions::through(relationship.as_ref()))?;

        let classified = self
            .handle_request(
                HttpMethod::Delete,
                &path,
                &RequestOptions::default(),
                || Value::Null,
            )
            .await?;

        match classified.status {
            ResponseStatus::Success | ResponseStatus::Created => {
                if self.cacheable(&kind) {
                    self.invalidate(resource, true).await?;
                }
                resource.mark_destroyed();
                info!("✓ Destroyed {} {}", kind.name(), id);
                Ok(true)
            }
            ResponseStatus::Errors => {
                let errors = resource.errors_mut();
                errors.clear();
                errors.extend_from_body(&classified.body);
                warn!("Destroying {} {} was rejected", kind.name(), id);
                Ok(false)
            }
            ResponseStatus::ServerError | ResponseStatus::NotAcceptable => {
                warn!(
                    "Destroying {} {} failed with {} ({})",
                    kind.name(),
                    id,
                    classified.code,
                    classified.status
                );
                Ok(false)
            }
            ResponseStatus::NotFound => Err(Error::RecordNotFound { path }),
        }
    }

    /// True when the key `resource` was retrieved under is still stored.
    pub async fn is_cached(&self, resource: &Resource) -> bool {
        let Some(key) = resource.cache_key() else {
            return false;
        };
        if !self.cacheable(resource.resource_type()) {
            return false;
        }
        match self.backend.exists(key).await {
            Ok(found) => found,
            Err(e) => {
                warn!("⚠ Cache check for {} failed: {}", key, e);
                false
            }
        }
    }

    /// Drop every cache entry.
    ///
    /// # Errors
    /// Returns `Err` if the backend cannot be flushed.
    pub async fn flush(&self) -> Result<()> {
        self.backend.flush().await?;
        self.index.clear();
        Ok(())
    }

    /// Send an arbitrary request by verb name and classify the answer.
    ///
    /// # Errors
    ///
    /// - `Error::UnknownRestMethod` for verbs other than get/post/put/delete
    /// - `Error::RecordNotFound` when the API answers 404
    /// - `Error::Transport` and `Error::UnknownResponseStatus` unchanged
    pub async fn request(
        &self,
        verb: &str,
        path: &str,
        options: &RequestOptions,
    ) -> Result<Classified> {
        let method: HttpMethod = verb.parse()?;
        self.handle_request(method, path, options, || Value::Null)
            .await
    }

    async fn handle_request<F>(
        &self,
        method: HttpMethod,
        path: &str,
        request: &RequestOptions,
        default_body: F,
    ) -> Result<Classified>
    where
        F: FnOnce() -> Value,
    {
        warn!(
            "Making request to {} with {} and {:?}",
            path, method, request.query
        );

        let timer = Instant::now();
        let raw = self.client.request(method, path, request).await?;
        self.metrics
            .record_request(method, path, raw.code, timer.elapsed());

        let classified = classify(path, &raw, default_body)?;
        if !classified.status.is_success() {
            warn!(
                "{} {} answered {} ({})",
                method, path, raw.code, classified.status
            );
        }
        Ok(classified)
    }

    /// GET for a read, evicting `key` on 404 and refusing non-success
    /// outcomes.
    async fn fetch(
        &self,
        key: &CacheKey,
        cacheable: bool,
        path: &str,
        request: &RequestOptions,
    ) -> Result<Classified> {
        let classified = match self
            .handle_request(HttpMethod::Get, path, request, || Value::Null)
            .await
        {
            Err(e) if e.is_not_found() => {
                if cacheable {
                    self.evict(key).await;
                }
                return Err(e);
            }
            other => other?,
        };

        if !classified.status.is_success() {
            return Err(Error::RequestFailed {
                path: path.to_string(),
                code: classified.code,
            });
        }
        Ok(classified)
    }

    async fn lookup(&self, key: &CacheKey, strategy: CacheStrategy) -> Result<Option<Value>> {
        match strategy {
            CacheStrategy::Refresh | CacheStrategy::Fresh => {
                let found = self.read(key).await?;
                if found.is_none() && !strategy.allows_fetch() {
                    debug!("✗ Cache miss for {} (Fresh strategy) - no fallback", key);
                    return Err(Error::CacheMiss);
                }
                Ok(found)
            }
            CacheStrategy::Invalidate => {
                self.evict(key).await;
                Ok(None)
            }
            CacheStrategy::Bypass => {
                debug!("Bypassing cache read for {}", key);
                Ok(None)
            }
        }
    }

    /// Read an entry. A failing backend reads as a miss; a corrupt entry is
    /// evicted and reported. A key the store no longer holds leaves the
    /// index.
    async fn read(&self, key: &CacheKey) -> Result<Option<Value>> {
        let name = key.to_string();
        let timer = Instant::now();
        match self.backend.get(&name).await {
            Ok(Some(bytes)) => match deserialize_from_cache::<Value>(&bytes) {
                Ok(payload) => {
                    self.metrics.record_hit(&name, timer.elapsed());
                    Ok(Some(payload))
                }
                Err(e) => {
                    self.metrics.record_error(&name, &e.to_string());
                    self.evict(key).await;
                    Err(e)
                }
            },
            Ok(None) => {
                self.metrics.record_miss(&name, timer.elapsed());
                self.index.forget(key);
                Ok(None)
            }
            Err(e) => {
                warn!(
                    "⚠ Cache read for {} failed, falling back to network: {}",
                    name, e
                );
                self.metrics.record_error(&name, &e.to_string());
                Ok(None)
            }
        }
    }

    /// Evict `key` if rebuilding from its payload failed.
    async fn revive<T>(&self, key: &CacheKey, rebuilt: Result<T>) -> Result<T> {
        if let Err(e) = &rebuilt {
            warn!("⚠ Evicting unusable cache entry {}: {}", key, e);
            self.evict(key).await;
        }
        rebuilt
    }

    async fn store(&self, key: &CacheKey, payload: &Value, ttl: Option<Duration>) {
        let name = key.to_string();
        let bytes = match serialize_for_cache(payload) {
            Ok(bytes) => bytes,
            Err(e) => {
                self.metrics.record_error(&name, &e.to_string());
                return;
            }
        };

        let timer = Instant::now();
        match self.backend.set(&name, bytes, ttl).await {
            Ok(()) => {
                self.metrics.record_set(&name, timer.elapsed());
                for displaced in self.index.record(key, ttl) {
                    debug!("Dropping {} to keep the key index bounded", displaced);
                    self.delete_entry(&displaced).await;
                }
            }
            Err(e) => {
                warn!("⚠ Cache write for {} failed: {}", name, e);
                self.metrics.record_error(&name, &e.to_string());
            }
        }
    }

    async fn evict(&self, key: &CacheKey) {
        if self.delete_entry(&key.to_string()).await {
            self.index.forget(key);
        }
    }

    async fn delete_entry(&self, key: &str) -> bool {
        let timer = Instant::now();
        match self.backend.delete(key).await {
            Ok(()) => {
                self.metrics.record_delete(key, timer.elapsed());
                true
            }
            Err(e) => {
                warn!("⚠ Cache delete for {} failed: {}", key, e);
                self.metrics.record_error(key, &e.to_string());
                false
            }
        }
    }

    /// Evict every entry that may hold `resource`: its provenance key, its
    /// member lookups, the collections of its scope and, with `cascade`, the
    /// collections of its registered child types.
    async fn invalidate(&self, resource: &Resource, cascade: bool) -> Result<()> {
        let kind = resource.resource_type();
        let relationship = resource.relationship();
        let scope = self.paths().scope(kind, relationship.as_ref())?;
        let id = resource.id();
        let collection = CacheKey::collection(kind.name(), scope.clone(), &Conditions::new());

        let mut keys = self.index.take_related(&collection.base(), id.as_deref());
        keys.push(collection.to_string());
        if let Some(id) = &id {
            keys.push(CacheKey::member(kind.name(), scope, id.clone(), &Conditions::new()).to_string());
        }
        if let Some(provenance) = resource.cache_key() {
            keys.push(provenance.to_string());
        }

        if cascade && id.is_some() {
            for child_type in self.registry.children_of(kind.name()) {
                let nested = Relationship::new(resource, child_type.as_str());
                let child_scope = self.registry.full_path(&nested)?;
                let children = CacheKey::collection(&child_type, child_scope, &Conditions::new());
                keys.extend(self.index.take_all(&children.base()));
                keys.push(children.to_string());
            }
        }

        keys.sort();
        keys.dedup();

        let timer = Instant::now();
        let refs: Vec<&str> = keys.iter().map(String::as_str).collect();
        match self.backend.mdelete(&refs).await {
            Ok(()) => {
                for key in &keys {
                    self.metrics.record_delete(key, timer.elapsed());
                }
                debug!(
                    "✓ Invalidated {} cache entries for {}",
                    keys.len(),
                    kind.name()
                );
            }
            Err(e) => {
                warn!("⚠ Cache invalidation for {} failed: {}", kind.name(), e);
                for key in &keys {
                    self.metrics.record_error(key, &e.to_string());
                }
            }
        }
        Ok(())
    }

    fn ttl_for(&self, kind: &ResourceType, options: &QueryOptions) -> Option<Duration> {
        options
            .ttl_override
            .or_else(|| self.ttl_policy.get_ttl(kind.name()))
    }
}

fn ancestry_of(relationship: Option<&Relationship>) -> Vec<Ancestor> {
    relationship
        .map(|rel| rel.chain().to_vec())
        .unwrap_or_default()
}

fn build_all(
    kind: &Arc<ResourceType>,
    items: Vec<Value>,
    key: &CacheKey,
    ancestry: &[Ancestor],
) -> Result<Vec<Resource>> {
    let provenance = key.to_string();
    items
        .into_iter()
        .map(|item| {
            Resource::from_payload(
                Arc::clone(kind),
                Some(item),
                Some(provenance.clone()),
                ancestry.to_vec(),
            )
        })
        .collect()
}

/// The list of a collection response: the body itself, or the list under
/// the plural type name.
fn collection_items(kind: &ResourceType, body: Value) -> Result<Vec<Value>> {
    match body {
        Value::Array(items) => Ok(items),
        Value::Object(mut map) => match map.remove(kind.plural()) {
            Some(Value::Array(items)) => Ok(items),
            _ => Err(Error::InvalidCacheData(format!(
                "Invalid data: no {} list in response",
                kind.plural()
            ))),
        },
        Value::Null => Err(Error::InvalidCacheData("Empty data".to_string())),
        other => Err(Error::InvalidCacheData(format!("Invalid data: {}", other))),
    }
}
