//! Query conditions for collection and member lookups.
//!
//! Conditions are sent to the remote API as query parameters and folded into
//! cache keys. Two condition sets that are structurally equal always produce
//! the same canonical form, whatever order their entries were inserted in.

use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Attribute → expected value pairs for a query.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Conditions {
    entries: BTreeMap<String, Value>,
}

impl Conditions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a condition, replacing any previous value for `attribute`.
    pub fn insert(&mut self, attribute: impl Into<String>, value: impl Into<Value>) {
        self.entries
            .insert(attribute.into(), canonicalize(value.into()));
    }

    /// Builder form of [`Conditions::insert`].
    pub fn with(mut self, attribute: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(attribute, value);
        self
    }

    pub fn get(&self, attribute: &str) -> Option<&Value> {
        self.entries.get(attribute)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Canonical string form used in cache keys.
    ///
    /// Entries are ordered by attribute name. Names and values are rendered
    /// as JSON, values with recursively sorted object keys:
    /// `"title"="Dummy"&"user_id"=4`.
    pub fn canonical(&self) -> String {
        self.entries
            .iter()
            .map(|(attribute, value)| {
                format!("{}={}", Value::String(attribute.clone()), value)
            })
            .collect::<Vec<_>>()
            .join("&")
    }

    /// Query parameters for the transport. Strings are sent verbatim, other
    /// values as JSON text.
    pub fn to_query(&self) -> BTreeMap<String, String> {
        self.entries
            .iter()
            .map(|(attribute, value)| {
                let rendered = match value {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                (attribute.clone(), rendered)
            })
            .collect()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Conditions {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut conditions = Conditions::new();
        for (attribute, value) in iter {
            conditions.insert(attribute, value);
        }
        conditions
    }
}

impl From<Map<String, Value>> for Conditions {
    fn from(map: Map<String, Value>) -> Self {
        map.into_iter().collect()
    }
}

/// Rebuild `value` with every object's keys in sorted order.
///
/// `serde_json::Map` keeps insertion order when the `preserve_order` feature
/// is enabled anywhere in the dependency graph, so the order is forced here.
pub fn canonicalize(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let sorted: BTreeMap<String, Value> = map
                .into_iter()
                .map(|(k, v)| (k, canonicalize(v)))
                .collect();
            Value::Object(sorted.into_iter().collect())
        }
        Value::Array(items) => Value::Array(items.into_iter().map(canonicalize).collect()),
        other => other,
    }
}
