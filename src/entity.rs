//! Resource type descriptors.

use crate::config::{validate_base_uri, validate_resource_suffix, Config};
use crate::error::Result;
use crate::path::pluralize;
use crate::resource::{Attributes, ValidationErrors};

/// Validation hook run before a resource is sent to the remote API.
///
/// Push messages onto `errors` for every invalid attribute; a resource with
/// any error is not saved.
pub type Validator = fn(&Attributes, &mut ValidationErrors);

/// Describes one kind of remote resource.
///
/// Holds the singular name (used for cache keys and JSON root wrapping), the
/// plural name (used in paths), and per-type overrides of the global
/// [`Config`].
///
/// # Example
///
/// ```
/// use resource_kit::ResourceType;
///
/// let dummy = ResourceType::new("Dummy")
///     .with_resource_suffix(".xml")
///     .expect("valid suffix");
///
/// assert_eq!(dummy.name(), "dummy");
/// assert_eq!(dummy.plural(), "dummies");
/// ```
#[derive(Clone, Debug)]
pub struct ResourceType {
    name: String,
    plural: String,
    base_uri: Option<String>,
    resource_suffix: Option<String>,
    disable_caching: bool,
    validators: Vec<Validator>,
}

impl ResourceType {
    /// Create a descriptor; the name is lowercased and pluralized.
    pub fn new(name: impl AsRef<str>) -> Self {
        let name = name.as_ref().to_lowercase();
        ResourceType {
            plural: pluralize(&name),
            name,
            base_uri: None,
            resource_suffix: None,
            disable_caching: false,
            validators: Vec::new(),
        }
    }

    /// Override the plural used in paths.
    pub fn with_plural(mut self, plural: impl Into<String>) -> Self {
        self.plural = plural.into();
        self
    }

    /// Override the global base URI for this type.
    ///
    /// # Errors
    ///
    /// Returns `Error::ConfigurationInvalid` for a malformed URI.
    pub fn with_base_uri(mut self, uri: impl Into<String>) -> Result<Self> {
        let uri = uri.into();
        validate_base_uri(&uri)?;
        self.base_uri = Some(uri);
        Ok(self)
    }

    /// Override the global resource suffix for this type.
    ///
    /// # Errors
    ///
    /// Returns `Error::ConfigurationInvalid` for a malformed suffix.
    pub fn with_resource_suffix(mut self, suffix: impl Into<String>) -> Result<Self> {
        let suffix = suffix.into();
        validate_resource_suffix(&suffix)?;
        self.resource_suffix = Some(suffix);
        Ok(self)
    }

    /// Turn caching off for this type only.
    pub fn without_caching(mut self) -> Self {
        self.disable_caching = true;
        self
    }

    pub fn with_validator(mut self, validator: Validator) -> Self {
        self.validators.push(validator);
        self
    }

    /// Singular lowercase name, e.g. `dummy`.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Plural name used in paths, e.g. `dummies`.
    pub fn plural(&self) -> &str {
        &self.plural
    }

    /// Effective base URI: the override, else the global value.
    pub fn base_uri<'a>(&'a self, config: &'a Config) -> &'a str {
        self.base_uri.as_deref().unwrap_or(config.base_uri())
    }

    /// Effective resource suffix: the override, else the global value.
    pub fn resource_suffix<'a>(&'a self, config: &'a Config) -> &'a str {
        self.resource_suffix
            .as_deref()
            .unwrap_or(config.resource_suffix())
    }

    /// Caching applies only when neither this type nor the global config
    /// disabled it.
    pub fn cacheable(&self, config: &Config) -> bool {
        !self.disable_caching && config.caching_enabled()
    }

    /// Run every validator against `attributes`.
    pub fn validate(&self, attributes: &Attributes, errors: &mut ValidationErrors) {
        for validator in &self.validators {
            validator(attributes, errors);
        }
    }
}
