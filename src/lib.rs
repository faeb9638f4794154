pub mod api;
pub mod cli;
pub mod config;
pub mod github;
pub mod reconcile;

use config::Config;
use metrics_exporter_prometheus::PrometheusHandle;

use crate::reconcile::Reconciler;

pub struct AppState {
    pub config: Config,
    pub reconciler: Reconciler,
    pub metrics_handle: Option<PrometheusHandle>,
}

impl AppState {
    pub fn new(config: Config, reconciler: Reconciler) -> Self {
        Self {
            config,
            reconciler,
            metrics_handle: None,
        }
    }

    /// Set the Prometheus metrics handle
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics_handle = Some(handle);
        self
    }
}
