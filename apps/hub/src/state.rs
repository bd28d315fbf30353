use std::sync::Arc;
use road_store_core::{RecordStore, SubscriptionRegistry};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn RecordStore>,
    pub subscriptions: Arc<SubscriptionRegistry>,
    pub broadcast_inserts: bool,
}

impl AppState {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self {
            store,
            subscriptions: Arc::new(SubscriptionRegistry::new()),
            broadcast_inserts: false,
        }
    }

    pub fn with_broadcast_inserts(mut self, on: bool) -> Self {
        self.broadcast_inserts = on;
        self
    }
}
