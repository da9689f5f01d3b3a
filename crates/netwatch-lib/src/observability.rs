//! Observability infrastructure for the ingestion server
//!
//! Provides:
//! - Prometheus metrics (ingestion outcomes, anomalies, storage latency, baseline cardinality)
//! - Structured JSON logging with tracing

use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, register_int_gauge,
    Histogram, IntCounter, IntCounterVec, IntGauge,
};
use std::sync::OnceLock;
use tracing::{debug, info, warn};

/// Histogram buckets for storage write latency (in seconds)
const LATENCY_BUCKETS: &[f64] = &[
    0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0,
];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<IngestMetricsInner> = OnceLock::new();

struct IngestMetricsInner {
    samples_received: IntCounter,
    samples_stored: IntCounter,
    samples_rejected: IntCounterVec,
    latency_spikes: IntCounter,
    packet_loss_events: IntCounter,
    alerts_raised: IntCounter,
    storage_latency_seconds: Histogram,
    baselines_tracked: IntGauge,
    baseline_evictions: IntCounter,
}

impl IngestMetricsInner {
    fn new() -> Self {
        Self {
            samples_received: register_int_counter!(
                "netwatch_samples_received_total",
                "Total number of samples submitted"
            )
            .expect("Failed to register samples_received"),

            samples_stored: register_int_counter!(
                "netwatch_samples_stored_total",
                "Total number of samples durably stored"
            )
            .expect("Failed to register samples_stored"),

            samples_rejected: register_int_counter_vec!(
                "netwatch_samples_rejected_total",
                "Total number of rejected submissions by reason",
                &["reason"]
            )
            .expect("Failed to register samples_rejected"),

            latency_spikes: register_int_counter!(
                "netwatch_latency_spikes_total",
                "Total number of samples classified as latency spikes"
            )
            .expect("Failed to register latency_spikes"),

            packet_loss_events: register_int_counter!(
                "netwatch_packet_loss_events_total",
                "Total number of samples classified as packet loss events"
            )
            .expect("Failed to register packet_loss_events"),

            alerts_raised: register_int_counter!(
                "netwatch_alerts_raised_total",
                "Total number of alerts forwarded to the alert sink"
            )
            .expect("Failed to register alerts_raised"),

            storage_latency_seconds: register_histogram!(
                "netwatch_storage_latency_seconds",
                "Time spent writing a sample to storage",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register storage_latency_seconds"),

            baselines_tracked: register_int_gauge!(
                "netwatch_baselines_tracked",
                "Number of (node, metric) baselines held in memory"
            )
            .expect("Failed to register baselines_tracked"),

            baseline_evictions: register_int_counter!(
                "netwatch_baseline_evictions_total",
                "Number of baselines evicted to stay within capacity"
            )
            .expect("Failed to register baseline_evictions"),
        }
    }
}

/// Ingestion metrics for Prometheus exposition
///
/// This is a lightweight handle to the global metrics instance.
/// Multiple clones share the same underlying metrics.
#[derive(Clone)]
pub struct IngestMetrics {
    _private: (),
}

impl Default for IngestMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl IngestMetrics {
    /// Create a new metrics handle (initializes global metrics if needed)
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(IngestMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &IngestMetricsInner {
        GLOBAL_METRICS.get_or_init(IngestMetricsInner::new)
    }

    pub fn inc_received(&self) {
        self.inner().samples_received.inc();
    }

    pub fn inc_stored(&self) {
        self.inner().samples_stored.inc();
    }

    pub fn inc_rejected(&self, reason: &str) {
        self.inner()
            .samples_rejected
            .with_label_values(&[reason])
            .inc();
    }

    pub fn inc_latency_spikes(&self) {
        self.inner().latency_spikes.inc();
    }

    pub fn inc_packet_loss_events(&self) {
        self.inner().packet_loss_events.inc();
    }

    pub fn inc_alerts_raised(&self) {
        self.inner().alerts_raised.inc();
    }

    pub fn observe_storage_latency(&self, duration_secs: f64) {
        self.inner().storage_latency_seconds.observe(duration_secs);
    }

    pub fn set_baselines_tracked(&self, tracked: usize) {
        self.inner().baselines_tracked.set(tracked as i64);
    }

    pub fn inc_baseline_evictions(&self, evicted: u64) {
        self.inner().baseline_evictions.inc_by(evicted);
    }

    pub fn baseline_evictions(&self) -> u64 {
        self.inner().baseline_evictions.get()
    }

    pub fn latency_spikes(&self) -> u64 {
        self.inner().latency_spikes.get()
    }

    pub fn rejected_count(&self, reason: &str) -> u64 {
        self.inner()
            .samples_rejected
            .with_label_values(&[reason])
            .get()
    }
}

/// Structured logger for ingestion events
///
/// Provides consistent JSON-formatted logging for anomalies, rejections,
/// and lifecycle events.
#[derive(Clone)]
pub struct StructuredLogger {
    instance: String,
}

impl StructuredLogger {
    pub fn new(instance: impl Into<String>) -> Self {
        Self {
            instance: instance.into(),
        }
    }

    /// Log a latency spike detection
    pub fn log_latency_spike(
        &self,
        node_id: &str,
        latency: f64,
        expected_latency: f64,
        z_score: f64,
        severity: &str,
    ) {
        warn!(
            event = "latency_spike_detected",
            instance = %self.instance,
            node_id = %node_id,
            anomaly_type = "latency_spike",
            severity = %severity,
            latency = latency,
            expected_latency = expected_latency,
            z_score = z_score,
            "Latency spike detected"
        );
    }

    /// Log a packet loss event
    pub fn log_packet_loss(&self, node_id: &str, packet_loss: f64, threshold: f64) {
        warn!(
            event = "packet_loss_detected",
            instance = %self.instance,
            node_id = %node_id,
            anomaly_type = "packet_loss",
            packet_loss = packet_loss,
            threshold = threshold,
            "Packet loss above threshold"
        );
    }

    /// Log a rejected submission
    pub fn log_rejection(&self, node_id: &str, reason: &str, details: &str) {
        warn!(
            event = "sample_rejected",
            instance = %self.instance,
            node_id = %node_id,
            reason = %reason,
            details = %details,
            "Sample rejected"
        );
    }

    /// Log storage leaving the healthy state
    pub fn log_storage_degraded(&self, error: &str) {
        warn!(
            event = "storage_degraded",
            instance = %self.instance,
            error = %error,
            "Storage writes failing, samples are not being persisted"
        );
    }

    /// Log storage returning to healthy after failures
    pub fn log_storage_recovered(&self) {
        info!(
            event = "storage_recovered",
            instance = %self.instance,
            "Storage writes succeeding again"
        );
    }

    /// Log a stored sample
    pub fn log_stored(&self, node_id: &str, timestamp: i64, baseline_count: u64) {
        debug!(
            event = "sample_stored",
            instance = %self.instance,
            node_id = %node_id,
            timestamp = timestamp,
            baseline_count = baseline_count,
            "Sample stored"
        );
    }

    /// Log server startup
    pub fn log_startup(&self, version: &str, grpc_addr: &str, storage_backend: &str) {
        info!(
            event = "server_started",
            instance = %self.instance,
            version = %version,
            grpc_addr = %grpc_addr,
            storage_backend = %storage_backend,
            "Netwatch ingestion server started"
        );
    }

    /// Log server shutdown
    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "server_shutdown",
            instance = %self.instance,
            reason = %reason,
            "Netwatch ingestion server shutting down"
        );
    }
}
