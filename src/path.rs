//! REST path resolution.
//!
//! Collection paths are `/{plural}` (or the relationship's nested path),
//! wrapped in the effective base URI and resource suffix:
//!
//! ```text
//! resource_path(dummy)                 /api/dummies.json
//! find_path(dummy, 5)                  /api/dummies/5.json
//! find_path(child, 3) via dummy#1      /api/dummies/1/children/3.json
//! ```

use crate::config::Config;
use crate::entity::ResourceType;
use crate::error::{Error, Result};
use crate::relationship::{Relationship, RelationshipRegistry};
use std::fmt::Display;

/// Irregular singular → plural forms.
const IRREGULAR: &[(&str, &str)] = &[
    ("child", "children"),
    ("person", "people"),
    ("man", "men"),
    ("woman", "women"),
    ("mouse", "mice"),
    ("ox", "oxen"),
    ("tooth", "teeth"),
    ("foot", "feet"),
    ("goose", "geese"),
];

/// Words with identical singular and plural.
const UNCOUNTABLE: &[&str] = &[
    "equipment",
    "information",
    "rice",
    "money",
    "species",
    "series",
    "fish",
    "sheep",
    "news",
];

/// Pluralize a lowercase resource name.
///
/// Handles the common English rules (`-y` → `-ies`, sibilants → `-es`) plus a
/// short list of irregular and uncountable words. Types whose plural falls
/// outside these rules set it with [`ResourceType::with_plural`].
pub fn pluralize(word: &str) -> String {
    if word.is_empty() || UNCOUNTABLE.contains(&word) {
        return word.to_string();
    }
    if let Some((_, plural)) = IRREGULAR.iter().find(|(singular, _)| *singular == word) {
        return (*plural).to_string();
    }

    let (last_part, prefix) = match word.rfind('_') {
        Some(at) => (&word[at + 1..], &word[..=at]),
        None => (word, ""),
    };
    if !prefix.is_empty() {
        return format!("{}{}", prefix, pluralize(last_part));
    }

    if let Some(stem) = word.strip_suffix('y') {
        if !stem.ends_with(['a', 'e', 'i', 'o', 'u']) {
            return format!("{}ies", stem);
        }
    }
    if ["s", "x", "z", "ch", "sh"].iter().any(|end| word.ends_with(end)) {
        return format!("{}es", word);
    }
    format!("{}s", word)
}

/// Options for building a path.
#[derive(Clone, Copy, Debug, Default)]
pub struct PathOptions<'a> {
    /// Leave out the base URI.
    pub no_base_uri: bool,
    /// Leave out the resource suffix.
    pub no_resource_suffix: bool,
    /// Resolve through this relationship instead of the flat collection.
    pub relationship: Option<&'a Relationship>,
}

impl<'a> PathOptions<'a> {
    pub fn through(relationship: Option<&'a Relationship>) -> Self {
        PathOptions {
            relationship,
            ..Default::default()
        }
    }

    /// Options for a bare path, without base URI or suffix.
    pub fn bare(relationship: Option<&'a Relationship>) -> Self {
        PathOptions {
            no_base_uri: true,
            no_resource_suffix: true,
            relationship,
        }
    }
}

/// Builds paths from the global config and the relationship registry.
#[derive(Clone, Copy)]
pub struct PathResolver<'a> {
    config: &'a Config,
    registry: &'a RelationshipRegistry,
}

impl<'a> PathResolver<'a> {
    pub fn new(config: &'a Config, registry: &'a RelationshipRegistry) -> Self {
        PathResolver { config, registry }
    }

    /// Relative collection path, without leading slash: `dummies` or
    /// `dummies/1/children`. Used as the cache key scope.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidPath` if the relationship cannot be resolved.
    pub fn scope(
        &self,
        kind: &ResourceType,
        relationship: Option<&Relationship>,
    ) -> Result<String> {
        match relationship {
            Some(rel) => self.registry.full_path(rel),
            None => Ok(kind.plural().to_string()),
        }
    }

    /// Collection path for `kind`.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidPath` if the relationship cannot be resolved.
    pub fn resource_path(&self, kind: &ResourceType, options: &PathOptions<'_>) -> Result<String> {
        let path = format!("/{}", self.scope(kind, options.relationship)?);
        Ok(self.decorate(kind, path, options))
    }

    /// Member path for `kind` with identifier `id`.
    ///
    /// # Errors
    ///
    /// Returns `Error::MissingIdentifier` for an empty id and
    /// `Error::InvalidPath` if the relationship cannot be resolved.
    pub fn find_path(
        &self,
        kind: &ResourceType,
        id: impl Display,
        options: &PathOptions<'_>,
    ) -> Result<String> {
        let id = id.to_string();
        if id.is_empty() {
            return Err(Error::MissingIdentifier(kind.name().to_string()));
        }

        let collection = self.resource_path(kind, &PathOptions::bare(options.relationship))?;
        Ok(self.decorate(kind, format!("{}/{}", collection, id), options))
    }

    fn decorate(&self, kind: &ResourceType, path: String, options: &PathOptions<'_>) -> String {
        let mut result = path;
        if !options.no_base_uri {
            result = format!("{}{}", kind.base_uri(self.config), result);
        }
        if !options.no_resource_suffix {
            result.push_str(kind.resource_suffix(self.config));
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relationship::Ancestor;

    fn config() -> Config {
        Config::builder()
            .base_uri("/api")
            .resource_suffix(".json")
            .build()
            .expect("config")
    }

    #[test]
    fn test_pluralize() {
        assert_eq!(pluralize("dummy"), "dummies");
        assert_eq!(pluralize("child"), "children");
        assert_eq!(pluralize("day"), "days");
        assert_eq!(pluralize("box"), "boxes");
        assert_eq!(pluralize("match"), "matches");
        assert_eq!(pluralize("status"), "statuses");
        assert_eq!(pluralize("post"), "posts");
        assert_eq!(pluralize("sheep"), "sheep");
        assert_eq!(pluralize("line_item"), "line_items");
        assert_eq!(pluralize("sales_person"), "sales_people");
    }

    #[test]
    fn test_find_path_with_defaults() {
        let config = config();
        let registry = RelationshipRegistry::new();
        let paths = PathResolver::new(&config, &registry);
        let dummy = ResourceType::new("dummy");

        assert_eq!(
            paths
                .find_path(&dummy, 5, &PathOptions::default())
                .expect("path"),
            "/api/dummies/5.json"
        );
        assert_eq!(
            paths
                .resource_path(&dummy, &PathOptions::default())
                .expect("path"),
            "/api/dummies.json"
        );
    }

    #[test]
    fn test_suppressed_base_and_suffix() {
        let config = config();
        let registry = RelationshipRegistry::new();
        let paths = PathResolver::new(&config, &registry);
        let dummy = ResourceType::new("dummy");

        let options = PathOptions {
            no_base_uri: true,
            ..Default::default()
        };
        assert_eq!(
            paths.find_path(&dummy, "7", &options).expect("path"),
            "/dummies/7.json"
        );
        assert_eq!(
            paths
                .find_path(&dummy, "7", &PathOptions::bare(None))
                .expect("path"),
            "/dummies/7"
        );
    }

    #[test]
    fn test_nested_paths() {
        let config = config();
        let registry = RelationshipRegistry::new();
        let dummy = ResourceType::new("dummy");
        let child = ResourceType::new("child");
        registry.register(&dummy, &child).expect("register");
        let paths = PathResolver::new(&config, &registry);

        let rel = Relationship::from_chain(
            vec![Ancestor::new("dummy", Some("1".to_string()))],
            "child",
        )
        .expect("chain");

        assert_eq!(
            paths
                .resource_path(&child, &PathOptions::through(Some(&rel)))
                .expect("path"),
            "/api/dummies/1/children.json"
        );
        assert_eq!(
            paths
                .find_path(&child, 3, &PathOptions::through(Some(&rel)))
                .expect("path"),
            "/api/dummies/1/children/3.json"
        );
    }

    #[test]
    fn test_empty_id_is_rejected() {
        let config = config();
        let registry = RelationshipRegistry::new();
        let paths = PathResolver::new(&config, &registry);

        let result = paths.find_path(&ResourceType::new("dummy"), "", &PathOptions::default());
        assert!(matches!(result, Err(Error::MissingIdentifier(_))));
    }
}
