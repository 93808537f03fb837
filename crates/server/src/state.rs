use crate::config::ServerConfig;
use gateway::{DialogueCoordinator, IngestionCoordinator};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;

/// Shared application state
#[derive(Clone)]
pub struct ServerState {
    /// Server configuration
    pub config: Arc<ServerConfig>,

    pub dialogue: DialogueCoordinator,

    pub ingestion: Arc<IngestionCoordinator>,

    /// Renders `/metrics`; absent when metrics are disabled
    pub metrics: Option<PrometheusHandle>,
}

impl ServerState {
    pub fn new(
        config: ServerConfig,
        dialogue: DialogueCoordinator,
        ingestion: IngestionCoordinator,
    ) -> Self {
        Self {
            config: Arc::new(config),
            dialogue,
            ingestion: Arc::new(ingestion),
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, handle: Option<PrometheusHandle>) -> Self {
        self.metrics = handle;
        self
    }
}
