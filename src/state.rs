//! # Application State Management
//!
//! Shared state handed to every HTTP request handler. Two kinds of data live
//! here:
//!
//! - The **engine handle**: constructed once in `main` from the resolver's
//!   choice and read-only thereafter. It is injected explicitly rather than
//!   living in a global, so tests can substitute a stub engine.
//! - **Configuration and metrics** behind `Arc<RwLock<..>>`: many readers or
//!   one writer, the standard pattern for request-shared mutable data.

use crate::config::AppConfig;
use crate::engine::{EngineKind, SpeechEngine};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Instant;

/// The main application state shared across all HTTP request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration (readable by all handlers).
    pub config: Arc<RwLock<AppConfig>>,

    /// The speech engine selected at startup. Read-only for the remainder of
    /// the process lifetime; engines are safe for concurrent inference calls
    /// by their own contracts.
    engine: Arc<dyn SpeechEngine>,

    /// Performance metrics (updated by every request).
    pub metrics: Arc<RwLock<AppMetrics>>,

    /// When the server started.
    pub start_time: Instant,
}

/// Performance metrics collected across all HTTP requests.
#[derive(Debug, Default)]
pub struct AppMetrics {
    /// Total number of HTTP requests processed since server start.
    pub request_count: u64,

    /// Total number of errors encountered since server start.
    pub error_count: u64,

    /// Completed transcriptions since server start.
    pub transcription_count: u64,

    /// Detailed metrics for each API endpoint.
    pub endpoint_metrics: HashMap<String, EndpointMetric>,
}

/// Detailed performance metrics for a specific API endpoint.
#[derive(Debug, Default, Clone)]
pub struct EndpointMetric {
    pub request_count: u64,
    pub total_duration_ms: u64,
    pub error_count: u64,
}

impl AppState {
    /// Create the shared state from the loaded configuration and the engine
    /// the resolver produced.
    pub fn new(config: AppConfig, engine: Arc<dyn SpeechEngine>) -> Self {
        Self {
            config: Arc::new(RwLock::new(config)),
            engine,
            metrics: Arc::new(RwLock::new(AppMetrics::default())),
            start_time: Instant::now(),
        }
    }

    /// Get a copy of the current configuration.
    ///
    /// Cloning releases the read lock immediately so other requests are not
    /// blocked while the caller works with the snapshot.
    pub fn get_config(&self) -> AppConfig {
        self.config.read().unwrap().clone()
    }

    /// A shared handle to the resolved speech engine.
    pub fn engine(&self) -> Arc<dyn SpeechEngine> {
        Arc::clone(&self.engine)
    }

    /// The engine tag fixed at startup; every response carries it.
    pub fn engine_kind(&self) -> EngineKind {
        self.engine.kind()
    }

    pub fn increment_request_count(&self) {
        let mut metrics = self.metrics.write().unwrap();
        metrics.request_count += 1;
    }

    pub fn increment_error_count(&self) {
        let mut metrics = self.metrics.write().unwrap();
        metrics.error_count += 1;
    }

    /// Count one completed transcription.
    pub fn record_transcription(&self) {
        let mut metrics = self.metrics.write().unwrap();
        metrics.transcription_count += 1;
    }

    /// Record per-endpoint request metrics (called by middleware).
    pub fn record_endpoint_request(&self, endpoint: &str, duration_ms: u64, is_error: bool) {
        let mut metrics = self.metrics.write().unwrap();

        let endpoint_metric = metrics.endpoint_metrics.entry(endpoint.to_string()).or_default();
        endpoint_metric.request_count += 1;
        endpoint_metric.total_duration_ms += duration_ms;

        if is_error {
            endpoint_metric.error_count += 1;
        }
    }

    /// Get a snapshot of current metrics for the metrics endpoint.
    pub fn get_metrics_snapshot(&self) -> AppMetrics {
        let metrics = self.metrics.read().unwrap();
        AppMetrics {
            request_count: metrics.request_count,
            error_count: metrics.error_count,
            transcription_count: metrics.transcription_count,
            endpoint_metrics: metrics.endpoint_metrics.clone(),
        }
    }

    /// Get server uptime in seconds.
    pub fn get_uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

impl EndpointMetric {
    /// Average response time for this endpoint in milliseconds.
    pub fn average_duration_ms(&self) -> f64 {
        if self.request_count > 0 {
            self.total_duration_ms as f64 / self.request_count as f64
        } else {
            0.0
        }
    }

    /// Error rate for this endpoint (0.0 to 1.0).
    pub fn error_rate(&self) -> f64 {
        if self.request_count > 0 {
            self.error_count as f64 / self.request_count as f64
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::EngineError;
    use std::path::Path;

    struct StubEngine;

    impl SpeechEngine for StubEngine {
        fn kind(&self) -> EngineKind {
            EngineKind::Faster
        }

        fn model_name(&self) -> &str {
            "stub"
        }

        fn transcribe(&self, _path: &Path) -> Result<String, EngineError> {
            Ok("stub transcript".to_string())
        }
    }

    fn test_state() -> AppState {
        AppState::new(AppConfig::default(), Arc::new(StubEngine))
    }

    #[test]
    fn test_engine_kind_is_fixed() {
        let state = test_state();
        assert_eq!(state.engine_kind(), EngineKind::Faster);
        // The handle handed to callers reports the same tag.
        assert_eq!(state.engine().kind(), EngineKind::Faster);
    }

    #[test]
    fn test_request_counters() {
        let state = test_state();
        state.increment_request_count();
        state.increment_request_count();
        state.increment_error_count();
        state.record_transcription();

        let snapshot = state.get_metrics_snapshot();
        assert_eq!(snapshot.request_count, 2);
        assert_eq!(snapshot.error_count, 1);
        assert_eq!(snapshot.transcription_count, 1);
    }

    #[test]
    fn test_endpoint_metrics() {
        let state = test_state();
        state.record_endpoint_request("POST /transcribe", 100, false);
        state.record_endpoint_request("POST /transcribe", 300, true);

        let snapshot = state.get_metrics_snapshot();
        let metric = &snapshot.endpoint_metrics["POST /transcribe"];
        assert_eq!(metric.request_count, 2);
        assert_eq!(metric.average_duration_ms(), 200.0);
        assert_eq!(metric.error_rate(), 0.5);
    }
}
