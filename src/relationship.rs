//! Parent/child relationships between resource types.
//!
//! A link declares that resources of one type own a nested collection of
//! another type, with a path template such as `dummies/:parent_id/children`.
//! A [`Relationship`] binds a link to a concrete parent instance, including
//! the chain of ancestors the parent itself was reached through.
//!
//! Resolution walks the ancestor chain from the root:
//!
//! ```text
//! registry:  dummy -> child     "dummies/:parent_id/children"
//!            child -> toy       "children/:parent_id/toys"
//!
//! chain [dummy#1, child#3], child type toy
//!   dummies/1                   root parent segment
//!   dummies/1/children/3        each following ancestor
//!   dummies/1/children/3/toys   child segment of the last link
//! ```

use crate::entity::ResourceType;
use crate::error::{Error, Result};
use crate::resource::Resource;
use dashmap::DashMap;
use std::sync::Arc;

const PARENT_ID: &str = ":parent_id";

/// One step of a parent chain: a resource type and, once persisted, its id.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Ancestor {
    pub resource_type: String,
    pub id: Option<String>,
}

impl Ancestor {
    pub fn new(resource_type: impl Into<String>, id: Option<String>) -> Self {
        Ancestor {
            resource_type: resource_type.into(),
            id,
        }
    }
}

/// A child collection bound to a concrete parent.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Relationship {
    chain: Vec<Ancestor>,
    child_type: String,
}

impl Relationship {
    /// Children of `child_type` under `parent`.
    ///
    /// The parent's own ancestry is carried along, so a grandchild path is
    /// resolved through the full chain.
    pub fn new(parent: &Resource, child_type: impl Into<String>) -> Self {
        let mut chain = parent.ancestry().to_vec();
        chain.push(Ancestor::new(parent.resource_type().name(), parent.id()));
        Relationship {
            chain,
            child_type: child_type.into(),
        }
    }

    /// Build from an explicit chain. Returns `None` for an empty chain.
    pub fn from_chain(chain: Vec<Ancestor>, child_type: impl Into<String>) -> Option<Self> {
        if chain.is_empty() {
            return None;
        }
        Some(Relationship {
            chain,
            child_type: child_type.into(),
        })
    }

    /// Ancestors from the root down to the direct parent.
    pub fn chain(&self) -> &[Ancestor] {
        &self.chain
    }

    /// The direct parent.
    pub fn parent(&self) -> &Ancestor {
        // `new` and `from_chain` never build an empty chain.
        &self.chain[self.chain.len() - 1]
    }

    pub fn child_type(&self) -> &str {
        &self.child_type
    }
}

/// A registered template split around `:parent_id`.
#[derive(Clone, Debug, PartialEq, Eq)]
struct Link {
    /// Everything up to and including `:parent_id`, e.g. `dummies/:parent_id`.
    parent_segment: String,
    /// Everything after it, e.g. `children`.
    child_segment: String,
}

impl Link {
    fn parse(template: &str) -> Result<Self> {
        let trimmed = template.trim_matches('/');
        let at = trimmed.find(PARENT_ID).ok_or_else(|| {
            Error::ConfigurationInvalid(format!(
                "Relationship template {:?} has no {} placeholder",
                template, PARENT_ID
            ))
        })?;

        let split = at + PARENT_ID.len();
        let parent_segment = &trimmed[..split];
        let child_segment = trimmed[split..].trim_start_matches('/');

        if parent_segment == PARENT_ID || child_segment.is_empty() {
            return Err(Error::ConfigurationInvalid(format!(
                "Relationship template {:?} must look like 'parents/{}/children'",
                template, PARENT_ID
            )));
        }

        Ok(Link {
            parent_segment: parent_segment.to_string(),
            child_segment: child_segment.to_string(),
        })
    }

    fn root_location(&self, parent_id: &str) -> String {
        self.parent_segment.replace(PARENT_ID, parent_id)
    }
}

/// Registry of parent → child links, keyed by resource type name.
///
/// Cloning is cheap and clones share the same links. Links are meant to be
/// registered once at startup and only read afterwards.
#[derive(Clone, Default)]
pub struct RelationshipRegistry {
    links: Arc<DashMap<(String, String), Link>>,
}

impl RelationshipRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare that `parent_type` has children of `child_type`.
    ///
    /// # Errors
    ///
    /// Returns `Error::ConfigurationInvalid` if the template has no
    /// `:parent_id` placeholder between two path segments.
    pub fn register_child(
        &self,
        parent_type: &str,
        child_type: &str,
        path_template: &str,
    ) -> Result<()> {
        let link = Link::parse(path_template)?;
        debug!(
            "Registered relationship {} -> {} ({})",
            parent_type, child_type, path_template
        );
        self.links
            .insert((parent_type.to_string(), child_type.to_string()), link);
        Ok(())
    }

    /// Declare a link with the conventional `parents/:parent_id/children`
    /// template built from both types' plural names.
    pub fn register(&self, parent: &ResourceType, child: &ResourceType) -> Result<()> {
        let template = format!("{}/{}/{}", parent.plural(), PARENT_ID, child.plural());
        self.register_child(parent.name(), child.name(), &template)
    }

    pub fn is_registered(&self, parent_type: &str, child_type: &str) -> bool {
        self.links
            .contains_key(&(parent_type.to_string(), child_type.to_string()))
    }

    /// Child types registered under `parent_type`, sorted by name.
    pub fn children_of(&self, parent_type: &str) -> Vec<String> {
        let mut children: Vec<String> = self
            .links
            .iter()
            .filter(|entry| entry.key().0 == parent_type)
            .map(|entry| entry.key().1.clone())
            .collect();
        children.sort();
        children
    }

    fn link(&self, parent_type: &str, child_type: &str) -> Result<Link> {
        self.links
            .get(&(parent_type.to_string(), child_type.to_string()))
            .map(|link| link.value().clone())
            .ok_or_else(|| {
                Error::InvalidPath(format!(
                    "no relationship registered from {} to {}",
                    parent_type, child_type
                ))
            })
    }

    /// Concrete nested collection path for `relationship`, without leading
    /// slash, base URI or suffix.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidPath` if an ancestor has no identifier or a
    /// link along the chain is not registered.
    pub fn full_path(&self, relationship: &Relationship) -> Result<String> {
        let chain = relationship.chain();
        let ids = chain
            .iter()
            .map(|ancestor| {
                ancestor.id.as_deref().ok_or_else(|| {
                    Error::InvalidPath(format!(
                        "{} is not persisted and has no id",
                        ancestor.resource_type
                    ))
                })
            })
            .collect::<Result<Vec<&str>>>()?;

        let root = &chain[0];
        let first_child = chain
            .get(1)
            .map_or(relationship.child_type(), |a| a.resource_type.as_str());
        let mut path = self
            .link(&root.resource_type, first_child)?
            .root_location(ids[0]);

        for (i, pair) in chain.windows(2).enumerate() {
            let link = self.link(&pair[0].resource_type, &pair[1].resource_type)?;
            path = format!("{}/{}/{}", path, link.child_segment, ids[i + 1]);
        }

        let last = relationship.parent();
        let link = self.link(&last.resource_type, relationship.child_type())?;
        Ok(format!("{}/{}", path, link.child_segment))
    }
}
