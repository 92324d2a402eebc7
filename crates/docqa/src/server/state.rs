//! Application state for the HTTP server

use std::sync::Arc;

use crate::config::RagConfig;
use crate::pipeline::Orchestrator;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: RagConfig,
    orchestrator: Arc<Orchestrator>,
}

impl AppState {
    pub fn new(config: RagConfig, orchestrator: Arc<Orchestrator>) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                config,
                orchestrator,
            }),
        }
    }

    /// Get configuration
    pub fn config(&self) -> &RagConfig {
        &self.inner.config
    }

    /// Get the pipeline
    pub fn orchestrator(&self) -> &Arc<Orchestrator> {
        &self.inner.orchestrator
    }
}
