//! # resource-kit
//!
//! A client-side object mapper over REST APIs with a read-through cache.
//!
//! Remote resources are plain attribute maps ([`Resource`]) described by a
//! [`ResourceType`]. The [`ResourceManager`] finds them by id or by
//! conditions, serving repeated lookups from a [`CacheBackend`], and saves
//! or destroys them through a pluggable [`RestClient`], invalidating every
//! cache entry that may hold the changed resource.
//!
//! ## Features
//!
//! - **Read-through caching:** deterministic keys from type, parent chain,
//!   id and canonicalized conditions
//! - **Nested resources:** parent/child links resolved into nested paths
//!   such as `/dummies/1/children/3`
//! - **Backend agnostic:** in-memory by default, Memcached behind the
//!   `memcached` feature
//! - **Transport agnostic:** bring any HTTP client, or use the reqwest
//!   transport behind the `http` feature
//! - **Fail open:** an unavailable cache reads as a miss
//!
//! ## Quick Start
//!
//! ```ignore
//! use resource_kit::{
//!     backend::InMemoryBackend, transport::HttpTransport, Attributes, Config, QueryOptions,
//!     ResourceManager, ResourceService, ResourceType,
//! };
//! use std::sync::Arc;
//!
//! let config = Config::builder()
//!     .base_uri("/api")
//!     .resource_suffix(".json")
//!     .build()?;
//!
//! let service = ResourceService::new(ResourceManager::new(
//!     config,
//!     InMemoryBackend::new(),
//!     HttpTransport::new("https://example.com"),
//! ));
//!
//! let dummy = Arc::new(ResourceType::new("dummy"));
//! let child = Arc::new(ResourceType::new("child"));
//! service.register(&dummy, &child)?;
//!
//! // GET /api/dummies/1.json, then served from cache
//! let parent = service.scope(&dummy).find(1, &QueryOptions::default()).await?;
//!
//! // GET /api/dummies/1/children.json?title=Child
//! let children = service
//!     .children(&parent, &child)?
//!     .all(&QueryOptions::new().condition("title", "Child"))
//!     .await?;
//!
//! // POST /api/dummies/1/children.json
//! let mut toy = service.children(&parent, &child)?.build(Attributes::new());
//! toy.set("title", "New child");
//! if !service.save(&mut toy).await? {
//!     eprintln!("{:?}", toy.errors().full_messages());
//! }
//! ```

#[macro_use]
extern crate log;

pub mod backend;
pub mod conditions;
pub mod config;
pub mod entity;
pub mod error;
pub mod key;
pub mod manager;
pub mod observability;
pub mod path;
pub mod relationship;
pub mod resource;
pub mod response;
pub mod serialization;
pub mod service;
pub mod strategy;
pub mod transport;

// Re-exports for convenience
pub use backend::CacheBackend;
pub use conditions::Conditions;
pub use config::Config;
pub use entity::ResourceType;
pub use error::{Error, Result};
pub use key::CacheKey;
pub use manager::{QueryOptions, ResourceManager};
pub use relationship::{Ancestor, Relationship, RelationshipRegistry};
pub use resource::{Attributes, Resource, ValidationErrors};
pub use response::{Classified, RawResponse, ResponseStatus};
pub use service::{ResourceService, Scope};
pub use strategy::CacheStrategy;
pub use transport::{HttpMethod, RequestOptions, RestClient};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
