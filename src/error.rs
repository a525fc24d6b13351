//! Error types for resource operations.

use std::fmt;

/// Result type for resource operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for resource-kit.
///
/// Configuration and precondition errors are returned as soon as they are
/// detected. Validation failures reported by the remote API (HTTP 422) are
/// *not* errors: they are collected on the resource and `save` returns
/// `Ok(false)`.
#[derive(Debug, Clone)]
pub enum Error {
    /// A relationship path could not be resolved.
    ///
    /// Raised when an ancestor in the chain has no identifier yet, or when no
    /// link is registered between two resource types.
    InvalidPath(String),

    /// Invalid configuration value (base URI, resource suffix, path template,
    /// missing transport).
    ConfigurationInvalid(String),

    /// A verb outside get/post/put/delete was requested.
    UnknownRestMethod(String),

    /// The remote API answered 404.
    RecordNotFound {
        /// Request path that produced the 404.
        path: String,
    },

    /// A payload fed into object construction is missing, not a map, or has
    /// no identifier. Also raised for cache entries with a foreign envelope.
    InvalidCacheData(String),

    /// Reserved for condition matching strategies that do not exist yet.
    MatcherNotImplemented(String),

    /// The transport returned a status code outside the known set.
    UnknownResponseStatus(u16),

    /// A read was answered with a known, non-success status (422, 406, 500).
    RequestFailed {
        path: String,
        code: u16,
    },

    /// An operation that needs an identifier was called on a resource without
    /// one.
    MissingIdentifier(String),

    /// Cache-only lookup found nothing.
    ///
    /// Only returned with `CacheStrategy::Fresh`.
    CacheMiss,

    /// Cache backend unavailable or failing.
    ///
    /// The manager treats this as a forced cache miss on reads.
    BackendError(String),

    /// Converting a resource into cache or request bytes failed.
    SerializationError(String),

    /// Parsing a response body or cache entry failed.
    DeserializationError(String),

    /// Transport-level failure, propagated unchanged from the client.
    Transport(String),
}

impl Error {
    /// Returns `true` for a 404 escalation.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::RecordNotFound { .. })
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidPath(msg) => write!(f, "Invalid path: {}", msg),
            Error::ConfigurationInvalid(msg) => write!(f, "Configuration invalid: {}", msg),
            Error::UnknownRestMethod(method) => write!(
                f,
                "Unknown REST method '{}': only get, post, put and delete are handled",
                method
            ),
            Error::RecordNotFound { path } => write!(f, "Record not found: {}", path),
            Error::InvalidCacheData(msg) => write!(f, "Invalid cache data: {}", msg),
            Error::MatcherNotImplemented(msg) => write!(f, "Matcher not implemented: {}", msg),
            Error::UnknownResponseStatus(code) => {
                write!(f, "Unknown response status: {}", code)
            }
            Error::RequestFailed { path, code } => {
                write!(f, "Request to {} failed with status {}", path, code)
            }
            Error::MissingIdentifier(resource) => {
                write!(f, "Missing identifier for {}", resource)
            }
            Error::CacheMiss => write!(f, "Cache miss"),
            Error::BackendError(msg) => write!(f, "Backend error: {}", msg),
            Error::SerializationError(msg) => write!(f, "Serialization error: {}", msg),
            Error::DeserializationError(msg) => write!(f, "Deserialization error: {}", msg),
            Error::Transport(msg) => write!(f, "Transport error: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

// ============================================================================
// Conversions from other error types
// ============================================================================

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        if e.is_io() {
            Error::BackendError(e.to_string())
        } else if e.is_syntax() || e.is_eof() {
            Error::DeserializationError(e.to_string())
        } else {
            Error::SerializationError(e.to_string())
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::BackendError(e.to_string())
    }
}

#[cfg(feature = "http")]
impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Transport(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::InvalidPath("dummy has no id".to_string());
        assert_eq!(err.to_string(), "Invalid path: dummy has no id");

        let err = Error::UnknownResponseStatus(418);
        assert_eq!(err.to_string(), "Unknown response status: 418");

        let err = Error::RequestFailed {
            path: "/dummies/1".to_string(),
            code: 500,
        };
        assert_eq!(err.to_string(), "Request to /dummies/1 failed with status 500");
    }

    #[test]
    fn test_record_not_found_predicate() {
        let err = Error::RecordNotFound {
            path: "/api/dummies/1.json".to_string(),
        };
        assert!(err.is_not_found());
        assert!(!Error::CacheMiss.is_not_found());
    }

    #[test]
    fn test_error_from_json_syntax() {
        let parse: std::result::Result<serde_json::Value, _> = serde_json::from_str("{nope");
        let err: Error = parse.unwrap_err().into();
        assert!(matches!(err, Error::DeserializationError(_)));
    }
}
