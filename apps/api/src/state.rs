use std::sync::{Arc, Mutex};

use crate::config::Config;
use crate::llm_client::LlmClient;
use crate::rate_limit::KeyedRateLimiter;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub llm: LlmClient,
    pub config: Config,
    /// Per-caller request windows. Constructed with the state and lives as
    /// long as the server; never held across an await.
    pub rate_limiter: Arc<Mutex<KeyedRateLimiter>>,
}

impl AppState {
    pub fn new(llm: LlmClient, config: Config) -> Self {
        let rate_limiter = Arc::new(Mutex::new(KeyedRateLimiter::new(config.rate_limit)));
        Self {
            llm,
            config,
            rate_limiter,
        }
    }
}
