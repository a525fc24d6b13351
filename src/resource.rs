//! Resource objects: an attribute bag plus lifecycle state.

use crate::entity::ResourceType;
use crate::error::{Error, Result};
use crate::relationship::{Ancestor, Relationship};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Attribute name → value mapping of a resource.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Attributes(Map<String, Value>);

impl Attributes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(name.into(), value.into());
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.0.remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    /// Identifier as a string. Numbers are stringified; `null` counts as
    /// absent.
    pub fn id(&self) -> Option<String> {
        match self.0.get("id")? {
            Value::Null => None,
            Value::String(s) if s.is_empty() => None,
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// Overwrite every attribute present in `other`.
    pub fn merge(&mut self, other: Map<String, Value>) {
        for (name, value) in other {
            self.0.insert(name, value);
        }
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }
}

impl From<Map<String, Value>> for Attributes {
    fn from(map: Map<String, Value>) -> Self {
        Attributes(map)
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Attributes {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Attributes(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// Validation messages per attribute, as reported by a 422 response or a
/// local validator.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ValidationErrors {
    messages: BTreeMap<String, Vec<String>>,
}

impl ValidationErrors {
    pub fn add(&mut self, attribute: impl Into<String>, message: impl Into<String>) {
        self.messages
            .entry(attribute.into())
            .or_default()
            .push(message.into());
    }

    /// Messages for `attribute`; empty when it has none.
    pub fn get(&self, attribute: &str) -> &[String] {
        self.messages
            .get(attribute)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Number of attributes with at least one message.
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Vec<String>)> {
        self.messages.iter()
    }

    /// `"title can't be blank"` style messages, ordered by attribute.
    pub fn full_messages(&self) -> Vec<String> {
        self.messages
            .iter()
            .flat_map(|(attribute, messages)| {
                messages
                    .iter()
                    .map(move |message| format!("{} {}", attribute, message))
            })
            .collect()
    }

    /// Collect messages from an error response body.
    ///
    /// Accepts `{"attr": ["msg", ...]}`, `{"attr": "msg"}` and the same maps
    /// wrapped in an `"errors"` key. Anything else is ignored.
    pub fn extend_from_body(&mut self, body: &Value) {
        let map = match body.get("errors") {
            Some(Value::Object(inner)) => inner,
            _ => match body {
                Value::Object(map) => map,
                _ => return,
            },
        };

        for (attribute, messages) in map {
            match messages {
                Value::Array(items) => {
                    for item in items {
                        match item {
                            Value::String(message) => self.add(attribute.as_str(), message.as_str()),
                            other => self.add(attribute.as_str(), other.to_string()),
                        }
                    }
                }
                Value::String(message) => self.add(attribute.as_str(), message.as_str()),
                _ => {}
            }
        }
    }
}

/// A local copy of a remote resource.
///
/// Tracks whether the remote side knows the object (`persisted`), the cache
/// key of the query that produced it (its provenance, used to invalidate on
/// destroy), the ancestor chain it lives under, and validation errors from the
/// last save.
///
/// Equality compares type, identifier and attributes, never lifecycle state.
#[derive(Clone, Debug)]
pub struct Resource {
    kind: Arc<ResourceType>,
    attributes: Attributes,
    persisted: bool,
    cache_key: Option<String>,
    ancestry: Vec<Ancestor>,
    errors: ValidationErrors,
}

impl Resource {
    /// A new, unsaved resource.
    pub fn new(kind: Arc<ResourceType>, attributes: Attributes) -> Self {
        Resource {
            kind,
            attributes,
            persisted: false,
            cache_key: None,
            ancestry: Vec::new(),
            errors: ValidationErrors::default(),
        }
    }

    /// A new, unsaved resource living under `relationship`.
    pub fn nested(
        kind: Arc<ResourceType>,
        attributes: Attributes,
        relationship: &Relationship,
    ) -> Self {
        let mut resource = Resource::new(kind, attributes);
        resource.ancestry = relationship.chain().to_vec();
        resource
    }

    /// Build a persisted resource from a cache entry or response payload.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidCacheData` when the payload is absent, not a
    /// map, or has no identifier.
    pub fn from_payload(
        kind: Arc<ResourceType>,
        payload: Option<Value>,
        cache_key: Option<String>,
        ancestry: Vec<Ancestor>,
    ) -> Result<Self> {
        let attributes = normalize_payload(&kind, payload)?;
        Ok(Resource {
            kind,
            attributes: Attributes(attributes),
            persisted: true,
            cache_key,
            ancestry,
            errors: ValidationErrors::default(),
        })
    }

    pub fn resource_type(&self) -> &Arc<ResourceType> {
        &self.kind
    }

    pub fn id(&self) -> Option<String> {
        self.attributes.id()
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }

    /// Set an attribute. The identifier is owned by the remote API and only
    /// changes through responses.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        let name = name.into();
        if name == "id" {
            warn!("Ignoring local assignment of id on {}", self.kind.name());
            return;
        }
        self.attributes.set(name, value);
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    pub fn is_persisted(&self) -> bool {
        self.persisted
    }

    /// Cache key this resource was retrieved under, if any.
    pub fn cache_key(&self) -> Option<&str> {
        self.cache_key.as_deref()
    }

    /// Ancestors from the root down to the direct parent.
    pub fn ancestry(&self) -> &[Ancestor] {
        &self.ancestry
    }

    /// The relationship this resource lives under, if nested.
    pub fn relationship(&self) -> Option<Relationship> {
        Relationship::from_chain(self.ancestry.clone(), self.kind.name())
    }

    pub fn errors(&self) -> &ValidationErrors {
        &self.errors
    }

    pub(crate) fn errors_mut(&mut self) -> &mut ValidationErrors {
        &mut self.errors
    }

    /// Clear previous errors and run the type's validators.
    pub fn is_valid(&mut self) -> bool {
        self.errors.clear();
        self.kind.validate(&self.attributes, &mut self.errors);
        self.errors.is_empty()
    }

    /// Attributes as a JSON object.
    pub fn to_json(&self) -> Value {
        Value::Object(self.attributes.as_map().clone())
    }

    /// Attributes wrapped under the type name: `{"dummy": {...}}`.
    pub fn to_json_with_root(&self) -> Value {
        let mut root = Map::new();
        root.insert(self.kind.name().to_string(), self.to_json());
        Value::Object(root)
    }

    /// Apply attributes from a save response.
    ///
    /// Only a body that nests a map under this resource's type name is used;
    /// any other body leaves the attributes unchanged. Returns whether the
    /// attributes were updated.
    pub fn update_attributes_from_response(&mut self, body: &Value) -> bool {
        match body.get(self.kind.name()) {
            Some(Value::Object(fields)) => {
                self.attributes.merge(fields.clone());
                true
            }
            _ => false,
        }
    }

    pub(crate) fn mark_persisted(&mut self) {
        self.persisted = true;
    }

    pub(crate) fn mark_destroyed(&mut self) {
        self.persisted = false;
        self.cache_key = None;
    }
}

impl PartialEq for Resource {
    fn eq(&self, other: &Self) -> bool {
        self.kind.name() == other.kind.name()
            && self.id() == other.id()
            && self.attributes == other.attributes
    }
}

/// Cache corruption guard: unwrap a root-wrapped payload and insist on a map
/// with an identifier.
fn normalize_payload(kind: &ResourceType, payload: Option<Value>) -> Result<Map<String, Value>> {
    let map = match payload {
        None | Some(Value::Null) => {
            return Err(Error::InvalidCacheData("Empty data".to_string()));
        }
        Some(Value::Object(map)) => map,
        Some(other) => {
            return Err(Error::InvalidCacheData(format!("Invalid data: {}", other)));
        }
    };

    let nested = match map.get(kind.name()) {
        Some(Value::Object(inner)) => Some(inner.clone()),
        _ => None,
    };
    let attributes = Attributes(nested.unwrap_or(map));

    if attributes.id().is_none() {
        return Err(Error::InvalidCacheData(format!(
            "No object or ID for {}: {}",
            kind.name(),
            Value::Object(attributes.into_map())
        )));
    }
    Ok(attributes.into_map())
}
