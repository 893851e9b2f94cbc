use std::sync::Arc;
use std::time::Instant;

use alchemy_engine::PhaseEngine;
use alchemy_providers::ProviderRegistry;
use alchemy_storage::Store;
use tokio::sync::Semaphore;

use crate::config::Config;
use crate::metrics::Metrics;

/// Everything a request handler needs, shared behind `Arc`s and cloned
/// per-request the way axum's `State` expects. The storage engine is the
/// only mutator of persistent state (§5); the engine and registry are
/// read-mostly after startup.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<PhaseEngine>,
    pub storage: Arc<Store>,
    pub providers: Arc<ProviderRegistry>,
    pub metrics: Arc<Metrics>,
    pub config: Arc<Config>,
    /// Caps concurrent `/prompts/generate` and `/prompts/select` calls
    /// (§5 backpressure); acquired for the duration of the request.
    pub generation_limiter: Arc<Semaphore>,
    pub started_at: Instant,
}
