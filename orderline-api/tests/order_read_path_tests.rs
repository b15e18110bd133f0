//! Read path tests for `GET /order/:id`
//!
//! Cache-aside behavior against the mock store: first read from the store,
//! later reads from the cache, identifier validation before any lookup,
//! and rehydration of the cache across a restart.

use std::sync::Arc;

use axum::http::StatusCode;
use orderline_api::cache_restore_task;
use orderline_core::Order;
use orderline_storage::{CacheConfig, MockStore, OrderCache, OrderStore, KEY_INDEX_FILE};
use orderline_test_utils::fixtures::sample_order;
use orderline_test_utils::generators::arb_order;
use proptest::prelude::*;
use serde_json::json;
use tokio::runtime::Runtime;
use tokio::sync::watch;

#[path = "support/app.rs"]
mod test_app_support;
use test_app_support::TestApp;

fn order_from(body: &serde_json::Value) -> Order {
    serde_json::from_value(body["order"].clone()).expect("order in response")
}

#[tokio::test]
async fn test_first_read_from_database_then_cache() {
    let store = MockStore::new();
    store.seed(sample_order("b563feb7b2b84b6test")).unwrap();
    let app = TestApp::new(store);

    let (status, body) = app.get("/order/b563feb7b2b84b6test").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["source"], "database");
    assert!(body["duration_ms"].is_u64());
    assert_eq!(order_from(&body), sample_order("b563feb7b2b84b6test"));
    assert_eq!(app.store.get_calls(), 1);

    let (status, body) = app.get("/order/b563feb7b2b84b6test").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["source"], "cache");
    assert_eq!(order_from(&body), sample_order("b563feb7b2b84b6test"));
    assert_eq!(app.store.get_calls(), 1, "cache hit must not reach the store");
}

#[tokio::test]
async fn test_database_read_updates_key_index() {
    let store = MockStore::new();
    store.seed(sample_order("A1000")).unwrap();
    store.seed(sample_order("B2000")).unwrap();
    let app = TestApp::new(store);

    app.get("/order/B2000").await;
    app.get("/order/A1000").await;

    let raw = std::fs::read_to_string(app.cache_dir.path().join(KEY_INDEX_FILE)).unwrap();
    let keys: Vec<String> = serde_json::from_str(&raw).unwrap();
    assert_eq!(keys, vec!["A1000".to_string(), "B2000".to_string()]);
}

#[tokio::test]
async fn test_missing_id_is_bad_request() {
    let app = TestApp::new(MockStore::new());

    for uri in ["/order/", "/order"] {
        let (status, body) = app.get(uri).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{}", uri);
        assert_eq!(body, json!({"error": "Order ID not specified"}));
    }
    assert_eq!(app.store.get_calls(), 0);
}

#[tokio::test]
async fn test_identifier_length_bounds() {
    let store = MockStore::new();
    store.seed(sample_order("abcde")).unwrap();
    let app = TestApp::new(store);

    let (status, body) = app.get("/order/abc").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({"error": "Invalid order ID length"}));

    let too_long = "x".repeat(51);
    let (status, _) = app.get(&format!("/order/{}", too_long)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(app.store.get_calls(), 0, "invalid ids never reach the store");

    let (status, _) = app.get("/order/abcde").await;
    assert_eq!(status, StatusCode::OK);

    let longest = "y".repeat(50);
    let (status, _) = app.get(&format!("/order/{}", longest)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_undecodable_identifier_is_json_bad_request() {
    let app = TestApp::new(MockStore::new());

    let (status, body) = app.get("/order/%FF%FE%FD%FC%FB").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({"error": "Invalid order ID length"}));
    assert_eq!(app.store.get_calls(), 0);
}

#[tokio::test]
async fn test_unknown_order_is_not_cached() {
    let app = TestApp::new(MockStore::new());

    let (status, body) = app.get("/order/unknown-order").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({"error": "Order not found"}));
    assert!(!app.cache.contains("unknown-order"));

    app.get("/order/unknown-order").await;
    assert_eq!(app.store.get_calls(), 2, "misses are retried against the store");
    assert!(!app.cache_dir.path().join(KEY_INDEX_FILE).exists());
}

#[tokio::test]
async fn test_store_failure_is_internal_error() {
    let store = MockStore::new();
    store.seed(sample_order("A1000")).unwrap();
    store.set_fail_gets(true);
    let app = TestApp::new(store);

    let (status, body) = app.get("/order/A1000").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, json!({"error": "Database error"}));
    assert!(!app.cache.contains("A1000"));
}

#[tokio::test]
async fn test_cache_survives_restart() {
    let store = MockStore::new();
    store.seed(sample_order("A1000")).unwrap();
    store.seed(sample_order("B2000")).unwrap();

    let first = TestApp::new(store.clone());
    first.get("/order/A1000").await;
    assert_eq!(store.get_calls(), 1);

    let cache_dir = first.cache_dir;
    let restarted = TestApp::with_cache_dir(store.clone(), cache_dir);
    assert!(restarted.cache.is_empty());

    let (_tx, rx) = watch::channel(false);
    let report = cache_restore_task(
        Arc::clone(&restarted.cache),
        Arc::new(store.clone()) as Arc<dyn OrderStore>,
        rx,
    )
    .await
    .expect("restore completes");
    assert_eq!(report.restored, 1);
    assert_eq!(store.get_calls(), 2);

    let (status, body) = restarted.get("/order/A1000").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["source"], "cache");
    assert_eq!(store.get_calls(), 2, "rehydrated order is served without the store");

    let (_, body) = restarted.get("/order/B2000").await;
    assert_eq!(body["source"], "database");
}

#[tokio::test]
async fn test_cache_capacity_bounds_entries() {
    let store = MockStore::new();
    for uid in ["A1000", "B2000", "C3000"] {
        store.seed(sample_order(uid)).unwrap();
    }
    let dir = tempfile::tempdir().unwrap();
    let cache = OrderCache::new(CacheConfig::new().with_cache_dir(dir.path()).with_capacity(2));

    for uid in ["A1000", "B2000", "C3000"] {
        cache.set(store.get_order_by_uid(uid).await.unwrap()).await.unwrap();
    }
    assert_eq!(cache.len(), 2);
}

fn test_runtime() -> Result<Runtime, TestCaseError> {
    Runtime::new().map_err(|e| TestCaseError::fail(format!("Failed to create runtime: {}", e)))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Any stored order is returned unchanged, first from the store and
    /// then from the cache.
    #[test]
    fn prop_stored_order_reads_back(order in arb_order()) {
        let rt = test_runtime()?;
        rt.block_on(async {
            let store = MockStore::new();
            store.save_order(&order).await?;
            let app = TestApp::new(store);
            let uri = format!("/order/{}", order.order_uid);

            let (status, body) = app.get(&uri).await;
            prop_assert_eq!(status, StatusCode::OK);
            prop_assert_eq!(&body["source"], "database");
            prop_assert_eq!(&order_from(&body), &order);

            let (_, body) = app.get(&uri).await;
            prop_assert_eq!(&body["source"], "cache");
            prop_assert_eq!(&order_from(&body), &order);
            Ok(())
        })?;
    }
}
