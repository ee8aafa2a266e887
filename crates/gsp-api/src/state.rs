//! Shared application state for axum handlers.

use std::sync::Arc;

use gsp_orchestrator::Orchestrator;
use gsp_queue::WorkQueue;
use gsp_store::Store;

use crate::config::ApiConfig;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub queue: Arc<dyn WorkQueue>,
    pub orchestrator: Arc<Orchestrator>,
    pub config: ApiConfig,
}

impl AppState {
    #[must_use]
    pub fn new(store: Arc<dyn Store>, queue: Arc<dyn WorkQueue>, config: ApiConfig) -> Self {
        let orchestrator = Arc::new(Orchestrator::new(store.clone(), queue.clone()));
        Self {
            store,
            queue,
            orchestrator,
            config,
        }
    }
}
