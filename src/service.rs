//! High-level resource service for applications.
//!
//! Wraps a [`ResourceManager`] in `Arc` for sharing across tasks and hands
//! out [`Scope`]s: a resource type, optionally bound to a parent, with
//! `find`, `all` and `build`.

use crate::backend::CacheBackend;
use crate::entity::ResourceType;
use crate::error::{Error, Result};
use crate::manager::{QueryOptions, ResourceManager};
use crate::relationship::Relationship;
use crate::resource::{Attributes, Resource};
use crate::transport::RestClient;
use std::fmt::Display;
use std::sync::Arc;

/// Cloneable handle over a shared [`ResourceManager`].
///
/// # Example
///
/// ```ignore
/// let service = ResourceService::new(manager);
/// service.register(&dummy, &child)?;
///
/// let parent = service.scope(&dummy).find(1, &QueryOptions::default()).await?;
/// let children = service
///     .children(&parent, &child)?
///     .all(&QueryOptions::new().condition("title", "Child"))
///     .await?;
/// ```
pub struct ResourceService<B: CacheBackend, C: RestClient> {
    manager: Arc<ResourceManager<B, C>>,
}

impl<B: CacheBackend, C: RestClient> Clone for ResourceService<B, C> {
    fn clone(&self) -> Self {
        ResourceService {
            manager: Arc::clone(&self.manager),
        }
    }
}

impl<B: CacheBackend, C: RestClient> ResourceService<B, C> {
    pub fn new(manager: ResourceManager<B, C>) -> Self {
        ResourceService {
            manager: Arc::new(manager),
        }
    }

    pub fn manager(&self) -> &ResourceManager<B, C> {
        &self.manager
    }

    /// Declare `child` as a nested collection of `parent`, under the default
    /// `parents/:parent_id/children` template.
    ///
    /// # Errors
    /// Returns `Error::ConfigurationInvalid` if the template is rejected.
    pub fn register(&self, parent: &ResourceType, child: &ResourceType) -> Result<()> {
        self.manager.registry().register(parent, child)
    }

    /// Top-level collection of `kind`.
    pub fn scope(&self, kind: &Arc<ResourceType>) -> Scope<'_, B, C> {
        Scope {
            manager: &self.manager,
            kind: Arc::clone(kind),
            relationship: None,
        }
    }

    /// Collection of `child` under `parent`.
    ///
    /// The parent does not need to be saved yet; requests through the scope
    /// fail with `Error::InvalidPath` until it is.
    ///
    /// # Errors
    ///
    /// Returns `Error::ConfigurationInvalid` if no link between the two types
    /// is registered.
    pub fn children(
        &self,
        parent: &Resource,
        child: &Arc<ResourceType>,
    ) -> Result<Scope<'_, B, C>> {
        let parent_type = parent.resource_type().name();
        if !self.manager.registry().is_registered(parent_type, child.name()) {
            return Err(Error::ConfigurationInvalid(format!(
                "{} has no registered {} children",
                parent_type,
                child.name()
            )));
        }

        Ok(Scope {
            manager: &self.manager,
            kind: Arc::clone(child),
            relationship: Some(Relationship::new(parent, child.name())),
        })
    }

    /// # Errors
    /// See [`ResourceManager::save`].
    pub async fn save(&self, resource: &mut Resource) -> Result<bool> {
        self.manager.save(resource).await
    }

    /// # Errors
    /// See [`ResourceManager::destroy`].
    pub async fn destroy(&self, resource: &mut Resource) -> Result<bool> {
        self.manager.destroy(resource).await
    }

    pub async fn is_cached(&self, resource: &Resource) -> bool {
        self.manager.is_cached(resource).await
    }

    /// # Errors
    /// See [`ResourceManager::flush`].
    pub async fn flush(&self) -> Result<()> {
        self.manager.flush().await
    }
}

/// A resource type, optionally bound to a parent.
pub struct Scope<'a, B: CacheBackend, C: RestClient> {
    manager: &'a ResourceManager<B, C>,
    kind: Arc<ResourceType>,
    relationship: Option<Relationship>,
}

impl<'a, B: CacheBackend, C: RestClient> Scope<'a, B, C> {
    pub fn resource_type(&self) -> &Arc<ResourceType> {
        &self.kind
    }

    pub fn relationship(&self) -> Option<&Relationship> {
        self.relationship.as_ref()
    }

    /// # Errors
    /// See [`ResourceManager::find`].
    pub async fn find(&self, id: impl Display, options: &QueryOptions) -> Result<Resource> {
        let options = self.bind(options);
        self.manager.find(&self.kind, id, &options).await
    }

    /// # Errors
    /// See [`ResourceManager::all`].
    pub async fn all(&self, options: &QueryOptions) -> Result<Vec<Resource>> {
        let options = self.bind(options);
        self.manager.all(&self.kind, &options).await
    }

    /// A new, unsaved resource in this scope.
    pub fn build(&self, attributes: Attributes) -> Resource {
        match &self.relationship {
            Some(rel) => Resource::nested(Arc::clone(&self.kind), attributes, rel),
            None => Resource::new(Arc::clone(&self.kind), attributes),
        }
    }

    fn bind(&self, options: &QueryOptions) -> QueryOptions {
        let mut bound = options.clone();
        if bound.relationship.is_none() {
            bound.relationship = self.relationship.clone();
        }
        bound
    }
}
