//! Shared application state for Axum routers.

use std::sync::Arc;
use std::time::Instant;

use orderline_storage::{OrderCache, OrderStore};

use crate::ingest::MessagePublisher;

/// Application-wide state shared across all routes.
#[derive(Clone)]
pub struct AppState {
    /// Durable order store, consulted on cache misses.
    pub store: Arc<dyn OrderStore>,
    /// Read-through cache for `GET /order/:id`.
    pub cache: Arc<OrderCache>,
    /// Sending half of the ingestion stream, used by `POST /ingest`.
    pub publisher: MessagePublisher,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(
        store: Arc<dyn OrderStore>,
        cache: Arc<OrderCache>,
        publisher: MessagePublisher,
    ) -> Self {
        Self {
            store,
            cache,
            publisher,
            start_time: Instant::now(),
        }
    }
}

crate::impl_from_ref!(Arc<dyn OrderStore>, store);
crate::impl_from_ref!(Arc<OrderCache>, cache);
crate::impl_from_ref!(MessagePublisher, publisher);
crate::impl_from_ref!(Instant, start_time);
