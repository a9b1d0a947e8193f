//! Application state shared across handlers.

use kiln_core::ports::PipelineStore;
use kiln_core::rate_limit::RateLimiter;
use kiln_scheduler::Scheduler;
use std::sync::Arc;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub scheduler: Arc<Scheduler>,
    pub store: Arc<dyn PipelineStore>,
    pub rate_limiter: Arc<RateLimiter>,
}

impl AppState {
    pub fn new(
        scheduler: Arc<Scheduler>,
        store: Arc<dyn PipelineStore>,
        rate_limiter: Arc<RateLimiter>,
    ) -> Self {
        Self {
            scheduler,
            store,
            rate_limiter,
        }
    }
}
