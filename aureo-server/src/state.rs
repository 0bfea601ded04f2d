//! Application state module
//!
//! Defines shared state accessible across all request handlers.

use std::sync::Arc;
use std::time::Duration;

use aureo_core::{
    DetectorConfig, InMemoryMetrics, MetricsSink, SealConfig, SealPool, Sealer, SpiralDetector,
};

use crate::config::Config;

/// Application state containing shared resources.
#[derive(Clone)]
pub struct AppState {
    /// Embeds seals with the configured salt
    pub sealer: Arc<Sealer>,
    /// Blind seal detector
    pub detector: Arc<SpiralDetector>,
    /// Bounded worker pool running seal and detect jobs off the async runtime
    pub pool: Arc<SealPool>,
    /// Counters reported by /health
    pub metrics: Arc<InMemoryMetrics>,
    /// Upper bound for a single uploaded file, in bytes
    pub max_file_size: usize,
    /// Budget for one detection
    pub seal_timeout: Duration,
    /// Budget for one embed
    pub request_timeout: Duration,
}

impl AppState {
    pub fn new(config: &Config) -> Self {
        let metrics = Arc::new(InMemoryMetrics::new());
        let sink: Arc<dyn MetricsSink> = metrics.clone();
        let detector = DetectorConfig::default();

        Self {
            sealer: Arc::new(
                Sealer::new(SealConfig::default(), config.salt.clone())
                    .with_detector_config(&detector)
                    .with_metrics(sink.clone()),
            ),
            detector: Arc::new(SpiralDetector::new(detector).with_metrics(sink)),
            pool: Arc::new(SealPool::new(config.pool())),
            metrics,
            max_file_size: config.max_file_size(),
            seal_timeout: config.seal_timeout(),
            request_timeout: Duration::from_secs(config.timeout_secs),
        }
    }
}
