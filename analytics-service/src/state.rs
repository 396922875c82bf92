//! Application state for the analytics service.

use std::sync::Arc;
use std::time::Duration;

use common::config::AppConfig;
use data_access::MetricSource;

use crate::service::MetricService;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub metrics: Arc<MetricService>,
}

impl AppState {
    /// Creates a new application state around a metric source.
    pub fn new(config: AppConfig, source: Arc<dyn MetricSource>) -> Self {
        let ttl = Duration::from_secs(config.cache_ttl_secs);
        Self {
            metrics: Arc::new(MetricService::new(source, ttl)),
            config,
        }
    }
}
