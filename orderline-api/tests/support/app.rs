#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use orderline_api::ingest::{channel, ChannelSource, MessagePublisher};
use orderline_api::{create_router, AppState};
use orderline_storage::{CacheConfig, MockStore, OrderCache};
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

/// A router over a mock store and a cache rooted in a temp directory.
pub struct TestApp {
    pub router: Router,
    pub store: MockStore,
    pub cache: Arc<OrderCache>,
    pub publisher: MessagePublisher,
    pub source: Option<ChannelSource>,
    pub cache_dir: TempDir,
}

impl TestApp {
    pub fn new(store: MockStore) -> Self {
        let cache_dir = tempfile::tempdir().expect("Failed to create cache dir");
        Self::with_cache_dir(store, cache_dir)
    }

    pub fn with_cache_dir(store: MockStore, cache_dir: TempDir) -> Self {
        let cache = Arc::new(OrderCache::new(
            CacheConfig::new().with_cache_dir(cache_dir.path()),
        ));
        let (publisher, source) = channel(16);
        let state = AppState::new(
            Arc::new(store.clone()),
            Arc::clone(&cache),
            publisher.clone(),
        );
        Self {
            router: create_router(state),
            store,
            cache,
            publisher,
            source: Some(source),
            cache_dir,
        }
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, Value) {
        let request = Request::get(uri).body(Body::empty()).expect("request");
        self.send(request).await
    }

    pub async fn post(&self, uri: &str, body: Vec<u8>) -> (StatusCode, Value) {
        let request = Request::post(uri)
            .header("content-type", "application/json")
            .body(Body::from(body))
            .expect("request");
        self.send(request).await
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible");
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }
}
