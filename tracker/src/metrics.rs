//! Prometheus metrics for JALKI
//!
//! A process-global registry behind a `OnceLock`. Everything here is
//! best-effort: code paths call `Metrics::get()` and skip recording when
//! metrics were never initialized (tests, embedded use).

use crate::error::TrackerError;
use jalki_core::Outcome;
use prometheus::{
    register_counter_vec, register_gauge_vec, register_histogram_vec, CounterVec, Encoder,
    GaugeVec, HistogramVec, TextEncoder,
};
use std::sync::OnceLock;

/// Global metrics instance
static METRICS: OnceLock<Metrics> = OnceLock::new();

/// All JALKI metrics
pub struct Metrics {
    /// Records accepted by the sink (by entity, action, outcome)
    pub records_submitted: CounterVec,

    /// Records lost before reaching the sink (by reason)
    pub records_dropped: CounterVec,

    /// Sink record() failures (by sink)
    pub sink_failures: CounterVec,

    /// Extractor overrides that failed and fell back (by entity)
    pub extractor_failures: CounterVec,

    /// Wrapped handler latency in seconds (by entity, method)
    pub handler_latency_seconds: HistogramVec,

    /// Per-sink health (1 = healthy, 0 = unhealthy)
    pub sink_health: GaugeVec,
}

fn registration(e: prometheus::Error) -> TrackerError {
    TrackerError::Metrics(e.to_string())
}

impl Metrics {
    /// Initialize metrics (call once at startup)
    ///
    /// Idempotent: returns the existing instance when already initialized.
    /// Registration is serialized so concurrent first calls can't trip
    /// over duplicate-collector errors.
    pub fn init() -> Result<&'static Metrics, TrackerError> {
        static INIT_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());

        if let Some(metrics) = METRICS.get() {
            return Ok(metrics);
        }

        let _guard = INIT_LOCK
            .lock()
            .map_err(|_| TrackerError::Metrics("metrics init lock poisoned".to_string()))?;
        if let Some(metrics) = METRICS.get() {
            return Ok(metrics);
        }

        let metrics = Metrics {
            records_submitted: register_counter_vec!(
                "jalki_records_submitted_total",
                "Audit records accepted by the sink",
                &["entity", "action", "outcome"]
            )
            .map_err(registration)?,

            records_dropped: register_counter_vec!(
                "jalki_records_dropped_total",
                "Audit records lost before reaching the sink",
                &["reason"]
            )
            .map_err(registration)?,

            sink_failures: register_counter_vec!(
                "jalki_sink_failures_total",
                "Sink record failures",
                &["sink"]
            )
            .map_err(registration)?,

            extractor_failures: register_counter_vec!(
                "jalki_extractor_failures_total",
                "Extractor overrides that fell back to the generic descriptor",
                &["entity"]
            )
            .map_err(registration)?,

            handler_latency_seconds: register_histogram_vec!(
                "jalki_handler_latency_seconds",
                "Wrapped handler latency",
                &["entity", "method"]
            )
            .map_err(registration)?,

            sink_health: register_gauge_vec!(
                "jalki_sink_health",
                "Per-sink health (1 = healthy, 0 = unhealthy)",
                &["sink"]
            )
            .map_err(registration)?,
        };

        let _ = METRICS.set(metrics);
        METRICS
            .get()
            .ok_or_else(|| TrackerError::Metrics("metrics init raced and lost".to_string()))
    }

    /// Get the global metrics instance, if initialized
    pub fn get() -> Option<&'static Metrics> {
        METRICS.get()
    }

    /// Record an accepted audit record
    pub fn record_submitted(&self, entity: &str, action: &str, outcome: Outcome) {
        self.records_submitted
            .with_label_values(&[entity, action, outcome.as_str()])
            .inc();
    }

    /// Record a lost audit record
    pub fn record_dropped(&self, reason: &str) {
        self.records_dropped.with_label_values(&[reason]).inc();
    }

    /// Record a sink failure
    pub fn record_sink_failure(&self, sink: &str) {
        self.sink_failures.with_label_values(&[sink]).inc();
    }

    /// Record an extractor failure
    pub fn record_extractor_failure(&self, entity: &str) {
        self.extractor_failures.with_label_values(&[entity]).inc();
    }

    /// Observe wrapped handler latency
    pub fn observe_latency(&self, entity: &str, method: &str, seconds: f64) {
        self.handler_latency_seconds
            .with_label_values(&[entity, method])
            .observe(seconds);
    }

    /// Update a sink's health gauge
    pub fn set_sink_health(&self, sink: &str, healthy: bool) {
        self.sink_health
            .with_label_values(&[sink])
            .set(if healthy { 1.0 } else { 0.0 });
    }
}

/// Gather all metrics in Prometheus text exposition format
pub fn gather() -> String {
    let encoder = TextEncoder::new();
    let families = prometheus::gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&families, &mut buffer) {
        tracing::error!(error = %e, "Failed to encode metrics");
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}
