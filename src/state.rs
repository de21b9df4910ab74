// src/state.rs
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;

use crate::config::RelayConfig;
use crate::services::completion::CompletionClient;
use crate::services::rate_limiter::RateLimiter;

pub type SharedState = Arc<AppState>;

pub struct AppState {
    pub completion: Arc<dyn CompletionClient>,
    pub limiter: RateLimiter,
    pub allowed_origins: BTreeSet<String>,
    pub allow_any_origin: bool,
    pub trust_proxy: bool,
    pub public_dir: PathBuf,
}

impl AppState {
    pub fn new(config: &RelayConfig, completion: Arc<dyn CompletionClient>) -> Self {
        Self {
            completion,
            limiter: RateLimiter::new(config.rate_limit_window, config.rate_limit_max),
            allowed_origins: config.allowed_origins.clone(),
            allow_any_origin: config.debug_allow_any_origin,
            trust_proxy: config.trust_proxy,
            public_dir: config.public_dir.clone(),
        }
    }

    /// Whether a request carrying this `Origin` header may proceed.
    pub fn origin_allowed(&self, origin: Option<&str>) -> bool {
        match origin {
            None => true,
            Some(_) if self.allow_any_origin => true,
            Some(origin) => self.allowed_origins.contains(origin),
        }
    }
}
