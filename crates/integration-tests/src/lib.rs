//! Integration tests for Tamarind order fulfillment.
//!
//! Every test drives the real services against the in-memory store, so the
//! suite runs with plain `cargo test` and no database. The Postgres store
//! shares the `FulfillmentStore` seam these tests exercise.
//!
//! # Test Categories
//!
//! - `checkout` - Cart-to-order assembly
//! - `lifecycle` - Status transitions and their side effects
//! - `discounts` - Redemption caps across orders
//! - `reporting` - Revenue and count aggregates

use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::sync::mpsc::UnboundedReceiver;

use tamarind_fulfillment::db::MemoryStore;
use tamarind_fulfillment::services::{
    DiscountEngine, NotificationDispatcher, OrderEvent, OrderLifecycle, OrderService,
    ReportService,
};

/// All services wired over one shared in-memory store, with the
/// notification channel's receiving end kept for assertions.
pub struct TestContext {
    pub store: Arc<MemoryStore>,
    pub orders: OrderService<MemoryStore>,
    pub lifecycle: OrderLifecycle<MemoryStore>,
    pub discounts: DiscountEngine<MemoryStore>,
    pub reports: ReportService<MemoryStore>,
    events: Mutex<UnboundedReceiver<OrderEvent>>,
}

impl TestContext {
    #[must_use]
    pub fn new() -> Self {
        init_tracing();
        let store = Arc::new(MemoryStore::new());
        let (dispatcher, receiver) = NotificationDispatcher::channel();
        Self {
            orders: OrderService::new(Arc::clone(&store), dispatcher.clone()),
            lifecycle: OrderLifecycle::new(Arc::clone(&store), dispatcher),
            discounts: DiscountEngine::new(Arc::clone(&store)),
            reports: ReportService::new(Arc::clone(&store)),
            store,
            events: Mutex::new(receiver),
        }
    }

    /// Every event dispatched so far, in dispatch order.
    pub async fn drain_events(&self) -> Vec<OrderEvent> {
        let mut receiver = self.events.lock().await;
        let mut events = Vec::new();
        while let Ok(event) = receiver.try_recv() {
            events.push(event);
        }
        events
    }
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Honor `RUST_LOG` when running the suite; repeated calls are fine.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
