use crate::config::ServerConfig;
use crate::error::ServerResult;
use centroid::{Accumulator, AggregateStore};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;

/// Shared application state
#[derive(Clone)]
pub struct ServerState {
    /// Server configuration
    pub config: Arc<ServerConfig>,

    /// Accumulator over the configured store (shared across requests)
    pub accumulator: Arc<Accumulator>,

    /// Prometheus handle backing `/metrics`, when a recorder is installed
    pub metrics: Option<PrometheusHandle>,
}

impl ServerState {
    /// Create new server state, opening the configured store
    pub fn new(config: ServerConfig) -> ServerResult<Self> {
        let store = config.store_config().build()?;
        Self::with_store(config, store)
    }

    /// Create server state over an already opened store
    pub fn with_store(config: ServerConfig, store: Arc<dyn AggregateStore>) -> ServerResult<Self> {
        let accumulator = Accumulator::new(store, config.accumulator.clone())?;
        Ok(Self {
            config: Arc::new(config),
            accumulator: Arc::new(accumulator),
            metrics: None,
        })
    }

    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }
}
