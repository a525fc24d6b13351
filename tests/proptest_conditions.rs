//! Property-based tests for cache key canonicalization using proptest.
//!
//! These tests verify:
//! - Conditions built in any insertion order yield the same key
//! - Nested object values are ordered recursively
//! - Distinct conditions never share a key
//! - Keys round-trip through the cache envelope unchanged

use proptest::prelude::*;
use resource_kit::serialization::{deserialize_from_cache, serialize_for_cache};
use resource_kit::{CacheKey, Conditions};
use serde_json::{json, Map, Value};

fn condition_value() -> impl Strategy<Value = Value> {
    prop_oneof![
        any::<i64>().prop_map(Value::from),
        "[a-zA-Z0-9 ]{0,12}".prop_map(Value::from),
        any::<bool>().prop_map(Value::from),
        Just(Value::Null),
    ]
}

fn condition_entries() -> impl Strategy<Value = Vec<(String, Value)>> {
    prop::collection::btree_map("[a-z_]{1,10}", condition_value(), 0..6)
        .prop_map(|map| map.into_iter().collect())
}

proptest! {
    /// Property: insertion order never changes the canonical form
    #[test]
    fn prop_insertion_order_is_irrelevant(entries in condition_entries()) {
        let forward: Conditions = entries.iter().cloned().collect();
        let backward: Conditions = entries.iter().rev().cloned().collect();

        prop_assert_eq!(forward.canonical(), backward.canonical());
        prop_assert_eq!(
            CacheKey::collection("dummy", "dummies", &forward).to_string(),
            CacheKey::collection("dummy", "dummies", &backward).to_string()
        );
    }

    /// Property: nested maps are ordered at every level
    #[test]
    fn prop_nested_values_are_canonical(entries in condition_entries()) {
        let mut forward = Map::new();
        for (k, v) in &entries {
            forward.insert(k.clone(), v.clone());
        }
        let mut backward = Map::new();
        for (k, v) in entries.iter().rev() {
            backward.insert(k.clone(), v.clone());
        }

        let a = Conditions::new().with("filter", Value::Object(forward));
        let b = Conditions::new().with("filter", Value::Object(backward));
        prop_assert_eq!(a.canonical(), b.canonical());
    }

    /// Property: a different value for the same attribute gives a different key
    #[test]
    fn prop_distinct_values_distinct_keys(a in any::<i64>(), b in any::<i64>()) {
        prop_assume!(a != b);
        let first = Conditions::new().with("user_id", a);
        let second = Conditions::new().with("user_id", b);

        prop_assert_ne!(
            CacheKey::member("dummy", "dummies", "1", &first).to_string(),
            CacheKey::member("dummy", "dummies", "1", &second).to_string()
        );
    }

    /// Property: query parameters carry one entry per condition
    #[test]
    fn prop_query_matches_conditions(entries in condition_entries()) {
        let conditions: Conditions = entries.iter().cloned().collect();
        let query = conditions.to_query();

        prop_assert_eq!(query.len(), conditions.len());
        for (attribute, value) in &entries {
            if let Value::String(s) = value {
                prop_assert_eq!(query.get(attribute), Some(s));
            }
        }
    }

    /// Property: any attribute map survives the cache envelope
    #[test]
    fn prop_payload_survives_envelope(entries in condition_entries(), id in 1u64..10_000) {
        let mut payload: Map<String, Value> = entries.into_iter().collect();
        payload.insert("id".to_string(), json!(id));
        let payload = Value::Object(payload);

        let bytes = serialize_for_cache(&payload).expect("Serialization should succeed");
        let back: Value = deserialize_from_cache(&bytes).expect("Deserialization should succeed");
        prop_assert_eq!(back, payload);
    }
}

/// Canonical form for a known input
#[test]
fn test_canonical_example() {
    let conditions = Conditions::new()
        .with("user_id", 4)
        .with("title", "Dummy")
        .with("filter", json!({"b": 2, "a": 1}));

    assert_eq!(
        conditions.canonical(),
        r#""filter"={"a":1,"b":2}&"title"="Dummy"&"user_id"=4"#
    );
}
