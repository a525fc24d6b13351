//! Memcached Backend Integration Tests
//!
//! These tests require a running Memcached instance:
//!
//! ```bash
//! docker run -d -p 11211:11211 memcached
//! cargo test --features memcached --test memcached_integration_test
//! ```
//!
//! Each test runs under its own key namespace so they can run in parallel.
//! When no server answers, the tests print a notice and return.
//!
//! ## Environment Variables
//!
//! - `TEST_MEMCACHED_URL`: Memcached server address (default: "localhost:11211")

#![cfg(feature = "memcached")]

use resource_kit::backend::{CacheBackend, MemcachedBackend, MemcachedConfig};
use resource_kit::transport::StubTransport;
use resource_kit::{HttpMethod, QueryOptions, ResourceManager, ResourceService, ResourceType};
use serde_json::json;
use std::env;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

static NAMESPACES: AtomicUsize = AtomicUsize::new(0);

fn get_memcached_url() -> String {
    env::var("TEST_MEMCACHED_URL").unwrap_or_else(|_| "localhost:11211".to_string())
}

/// Namespace unique to this process and call.
fn unique_namespace() -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    format!(
        "test_{}_{}_{}",
        std::process::id(),
        nanos,
        NAMESPACES.fetch_add(1, Ordering::SeqCst)
    )
}

/// Connect, or `None` when no server is reachable.
async fn test_backend() -> Option<MemcachedBackend> {
    let config = MemcachedConfig {
        servers: vec![get_memcached_url()],
        pool_size: 8,
        namespace: Some(unique_namespace()),
    };
    let backend = MemcachedBackend::new(config).await.ok()?;
    match backend.exists("availability-check").await {
        Ok(_) => Some(backend),
        Err(e) => {
            println!("⚠ Memcached not available, skipping test: {}", e);
            None
        }
    }
}

/// Test 1: Basic set/get/delete
#[tokio::test]
async fn test_memcached_set_get_delete() {
    let Some(backend) = test_backend().await else {
        return;
    };

    backend
        .set("dummy:dummies/1", b"payload".to_vec(), None)
        .await
        .expect("Set should succeed");
    assert_eq!(
        backend.get("dummy:dummies/1").await.expect("Get should succeed"),
        Some(b"payload".to_vec())
    );

    backend
        .delete("dummy:dummies/1")
        .await
        .expect("Delete should succeed");
    assert!(!backend
        .exists("dummy:dummies/1")
        .await
        .expect("Exists should succeed"));

    // Deleting a missing key is not an error.
    backend
        .delete("dummy:dummies/1")
        .await
        .expect("Second delete should succeed");
}

/// Test 2: Keys with spaces, quotes and long conditions
#[tokio::test]
async fn test_memcached_unsafe_keys() {
    let Some(backend) = test_backend().await else {
        return;
    };

    let spaced = r#"dummy:dummies?title="Hello world""#;
    let long = format!("dummy:dummies?title=\"{}\"", "x".repeat(400));

    for key in [spaced.to_string(), long] {
        backend
            .set(&key, b"value".to_vec(), None)
            .await
            .expect("Set should succeed");
        assert_eq!(
            backend.get(&key).await.expect("Get should succeed"),
            Some(b"value".to_vec())
        );
    }
}

/// Test 3: TTL expiration
#[tokio::test]
async fn test_memcached_ttl() {
    let Some(backend) = test_backend().await else {
        return;
    };

    backend
        .set("dummy:dummies/2", b"short".to_vec(), Some(Duration::from_secs(1)))
        .await
        .expect("Set should succeed");
    assert!(backend
        .exists("dummy:dummies/2")
        .await
        .expect("Exists should succeed"));

    tokio::time::sleep(Duration::from_millis(2100)).await;

    assert_eq!(
        backend.get("dummy:dummies/2").await.expect("Get should succeed"),
        None
    );
}

/// Test 4: Read-through and invalidation over memcached
#[tokio::test]
async fn test_memcached_resource_roundtrip() {
    let Some(backend) = test_backend().await else {
        return;
    };

    let transport = StubTransport::new();
    transport.stub_json(
        HttpMethod::Get,
        "/dummies.json",
        200,
        &json!([{"id": 1, "title": "Hello world"}]),
    );
    transport.stub_json(
        HttpMethod::Delete,
        "/dummies/1.json",
        200,
        &json!({}),
    );

    let config = resource_kit::Config::builder()
        .resource_suffix(".json")
        .build()
        .expect("Config should be valid");
    let service = ResourceService::new(ResourceManager::new(config, backend, transport.clone()));
    let dummy = Arc::new(ResourceType::new("dummy"));
    let query = QueryOptions::new().condition("title", "Hello world");

    let found = service.scope(&dummy).all(&query).await.expect("First all");
    service.scope(&dummy).all(&query).await.expect("Cached all");
    assert_eq!(transport.call_count(), 1);

    let mut first = found[0].clone();
    assert!(service.is_cached(&first).await);
    assert!(service.destroy(&mut first).await.expect("Destroy"));

    service.scope(&dummy).all(&query).await.expect("Refetched all");
    assert_eq!(transport.calls_to(HttpMethod::Get, "/dummies.json"), 2);
}
