//! Process-wide configuration.
//!
//! A [`Config`] is built once at startup and then shared read-only by the
//! [`ResourceManager`](crate::ResourceManager). Per-type overrides live on
//! [`ResourceType`](crate::ResourceType) and take precedence over the values
//! here.
//!
//! ```
//! use resource_kit::Config;
//!
//! let config = Config::builder()
//!     .base_uri("/api")
//!     .resource_suffix(".json")
//!     .build()
//!     .expect("valid config");
//!
//! assert_eq!(config.base_uri(), "/api");
//! assert!(config.caching_enabled());
//! ```

use crate::error::{Error, Result};

/// Environment variable holding the base URI.
pub const ENV_BASE_URI: &str = "RESOURCE_KIT_BASE_URI";
/// Environment variable holding the resource suffix.
pub const ENV_RESOURCE_SUFFIX: &str = "RESOURCE_KIT_RESOURCE_SUFFIX";
/// Environment variable disabling caching when set to `1` or `true`.
pub const ENV_DISABLE_CACHING: &str = "RESOURCE_KIT_DISABLE_CACHING";

/// Global configuration shared by every resource type.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Config {
    base_uri: String,
    resource_suffix: String,
    disable_caching: bool,
}

impl Config {
    /// Start building a configuration.
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Build configuration from `RESOURCE_KIT_*` environment variables.
    ///
    /// Unset variables fall back to the defaults (empty base URI, empty
    /// suffix, caching enabled).
    ///
    /// # Errors
    ///
    /// Returns `Error::ConfigurationInvalid` if a variable holds an invalid
    /// value.
    pub fn from_env() -> Result<Self> {
        let mut builder = Config::builder();

        if let Ok(uri) = std::env::var(ENV_BASE_URI) {
            builder = builder.base_uri(uri);
        }
        if let Ok(suffix) = std::env::var(ENV_RESOURCE_SUFFIX) {
            builder = builder.resource_suffix(suffix);
        }
        if let Ok(flag) = std::env::var(ENV_DISABLE_CACHING) {
            builder = builder.disable_caching(parse_flag(&flag)?);
        }

        builder.build()
    }

    pub fn base_uri(&self) -> &str {
        &self.base_uri
    }

    pub fn resource_suffix(&self) -> &str {
        &self.resource_suffix
    }

    /// `false` when caching was disabled globally.
    pub fn caching_enabled(&self) -> bool {
        !self.disable_caching
    }
}

/// Builder for [`Config`]. Values are checked in [`ConfigBuilder::build`].
#[derive(Clone, Debug, Default)]
pub struct ConfigBuilder {
    base_uri: Option<String>,
    resource_suffix: Option<String>,
    disable_caching: bool,
}

impl ConfigBuilder {
    pub fn base_uri(mut self, uri: impl Into<String>) -> Self {
        self.base_uri = Some(uri.into());
        self
    }

    pub fn resource_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.resource_suffix = Some(suffix.into());
        self
    }

    pub fn disable_caching(mut self, disabled: bool) -> Self {
        self.disable_caching = disabled;
        self
    }

    /// Validate and build.
    ///
    /// # Errors
    ///
    /// Returns `Error::ConfigurationInvalid` for a malformed base URI or
    /// resource suffix.
    pub fn build(self) -> Result<Config> {
        let base_uri = self.base_uri.unwrap_or_default();
        let resource_suffix = self.resource_suffix.unwrap_or_default();

        validate_base_uri(&base_uri)?;
        validate_resource_suffix(&resource_suffix)?;

        Ok(Config {
            base_uri,
            resource_suffix,
            disable_caching: self.disable_caching,
        })
    }
}

/// A base URI is empty, an absolute path (`/api`) or a URL, without a
/// trailing slash.
pub(crate) fn validate_base_uri(uri: &str) -> Result<()> {
    if uri.is_empty() {
        return Ok(());
    }
    if uri.chars().any(char::is_whitespace) {
        return Err(Error::ConfigurationInvalid(format!(
            "Invalid value for base uri: {:?} contains whitespace",
            uri
        )));
    }
    if !(uri.starts_with('/') || uri.contains("://")) {
        return Err(Error::ConfigurationInvalid(format!(
            "Invalid value for base uri: {:?} must start with '/' or a scheme",
            uri
        )));
    }
    if uri.ends_with('/') {
        return Err(Error::ConfigurationInvalid(format!(
            "Invalid value for base uri: {:?} must not end with '/'",
            uri
        )));
    }
    Ok(())
}

/// A resource suffix is empty or a format extension such as `.json`.
pub(crate) fn validate_resource_suffix(suffix: &str) -> Result<()> {
    if suffix.is_empty() {
        return Ok(());
    }
    if !suffix.starts_with('.') || suffix.len() == 1 || suffix.contains('/') {
        return Err(Error::ConfigurationInvalid(format!(
            "Invalid value for resource suffix: {:?}",
            suffix
        )));
    }
    Ok(())
}

fn parse_flag(value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => Ok(true),
        "0" | "false" | "no" | "" => Ok(false),
        other => Err(Error::ConfigurationInvalid(format!(
            "Invalid value for {}: {:?}",
            ENV_DISABLE_CACHING, other
        ))),
    }
}
