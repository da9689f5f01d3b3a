//! Alert emission for anomalous samples
//!
//! Handles:
//! - Formatting alerts for the Alertmanager webhook format
//! - Deduplication per node and alert type within a configurable window
//! - Forwarding alerts to a pluggable sink

use std::collections::HashMap;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::warn;

use super::{AnomalyVerdict, SpikeSeverity};
use crate::models::Sample;

/// Default deduplication window (15 minutes)
pub const DEFAULT_DEDUP_WINDOW_SECS: u64 = 15 * 60;

/// Alert severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    Warning,
    Critical,
}

impl std::fmt::Display for AlertSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AlertSeverity::Warning => write!(f, "warning"),
            AlertSeverity::Critical => write!(f, "critical"),
        }
    }
}

/// Alert type classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertType {
    LatencySpike,
    PacketLoss,
}

impl std::fmt::Display for AlertType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AlertType::LatencySpike => write!(f, "NodeLatencySpike"),
            AlertType::PacketLoss => write!(f, "NodePacketLoss"),
        }
    }
}

/// Alertmanager webhook alert format
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertmanagerAlert {
    /// Alert status (firing or resolved)
    pub status: String,
    /// Alert labels for routing and grouping
    pub labels: HashMap<String, String>,
    /// Alert annotations with details
    pub annotations: HashMap<String, String>,
    /// Start time in RFC3339 format
    pub starts_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ends_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generator_url: Option<String>,
}

/// Alertmanager webhook payload (array of alerts)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertmanagerPayload {
    pub alerts: Vec<AlertmanagerAlert>,
}

/// Destination for alerts raised during ingestion
pub trait AlertSink: Send + Sync {
    fn send(&self, alert: AlertmanagerAlert);
}

/// Sink that writes alerts to the structured log
#[derive(Debug, Clone, Default)]
pub struct LogAlertSink;

impl AlertSink for LogAlertSink {
    fn send(&self, alert: AlertmanagerAlert) {
        let label = |name: &str| alert.labels.get(name).cloned().unwrap_or_default();
        warn!(
            event = "alert_raised",
            alertname = %label("alertname"),
            node = %label("node"),
            severity = %label("severity"),
            summary = %alert.annotations.get("summary").cloned().unwrap_or_default(),
            "Alert raised"
        );
    }
}

/// Sink that forwards alerts over a bounded channel
///
/// Alerts are dropped with a warning when the receiver falls behind, so a
/// slow consumer never stalls ingestion.
#[derive(Debug, Clone)]
pub struct ChannelAlertSink {
    tx: mpsc::Sender<AlertmanagerAlert>,
}

impl ChannelAlertSink {
    pub fn new(buffer: usize) -> (Self, mpsc::Receiver<AlertmanagerAlert>) {
        let (tx, rx) = mpsc::channel(buffer);
        (Self { tx }, rx)
    }
}

impl AlertSink for ChannelAlertSink {
    fn send(&self, alert: AlertmanagerAlert) {
        if let Err(e) = self.tx.try_send(alert) {
            warn!(error = %e, "Dropping alert, sink channel unavailable");
        }
    }
}

/// Key for deduplication
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct DedupKey {
    alert_type: AlertType,
    node_id: String,
}

/// Alert builder with deduplication
pub struct Alerter {
    dedup_window: Duration,
    /// Recent alerts for deduplication (key -> last emission time)
    recent_alerts: RwLock<HashMap<DedupKey, Instant>>,
    component_name: String,
}

impl Default for Alerter {
    fn default() -> Self {
        Self::new()
    }
}

impl Alerter {
    /// Create a new alerter with default 15-minute deduplication window
    pub fn new() -> Self {
        Self {
            dedup_window: Duration::from_secs(DEFAULT_DEDUP_WINDOW_SECS),
            recent_alerts: RwLock::new(HashMap::new()),
            component_name: "netwatch".to_string(),
        }
    }

    pub fn with_dedup_window(mut self, window: Duration) -> Self {
        self.dedup_window = window;
        self
    }

    /// Check if an alert should be suppressed due to deduplication
    pub fn should_suppress(&self, alert_type: AlertType, node_id: &str) -> bool {
        let key = DedupKey {
            alert_type,
            node_id: node_id.to_string(),
        };

        self.recent_alerts
            .read()
            .get(&key)
            .map(|last| last.elapsed() < self.dedup_window)
            .unwrap_or(false)
    }

    /// Record an emission unless one is still inside the window
    ///
    /// Check and record happen under one write lock, so concurrent
    /// submissions for a node raise at most one alert of each type.
    fn try_claim(&self, alert_type: AlertType, node_id: &str) -> bool {
        let key = DedupKey {
            alert_type,
            node_id: node_id.to_string(),
        };

        let mut alerts = self.recent_alerts.write();
        if let Some(last) = alerts.get(&key) {
            if last.elapsed() < self.dedup_window {
                return false;
            }
        }
        alerts.insert(key, Instant::now());
        alerts.retain(|_, time| time.elapsed() < self.dedup_window);
        true
    }

    /// Build alerts for every anomaly in `verdict` that is not suppressed
    pub fn alerts_for(&self, sample: &Sample, verdict: &AnomalyVerdict) -> Vec<AlertmanagerAlert> {
        let mut alerts = Vec::new();
        let node_id = sample.node_id();

        if verdict.is_latency_spike && self.try_claim(AlertType::LatencySpike, node_id) {
            alerts.push(self.create_spike_alert(sample, verdict));
        }

        if verdict.is_packet_loss && self.try_claim(AlertType::PacketLoss, node_id) {
            alerts.push(self.create_packet_loss_alert(sample));
        }

        alerts
    }

    /// Create an Alertmanager alert for a latency spike
    pub fn create_spike_alert(&self, sample: &Sample, verdict: &AnomalyVerdict) -> AlertmanagerAlert {
        let severity = match SpikeSeverity::from_z_score(verdict.z_score) {
            SpikeSeverity::Critical => AlertSeverity::Critical,
            SpikeSeverity::High | SpikeSeverity::Warning => AlertSeverity::Warning,
        };

        let mut labels = self.base_labels(AlertType::LatencySpike, sample.node_id());
        labels.insert("severity".to_string(), severity.to_string());

        let mut annotations = HashMap::new();
        annotations.insert(
            "summary".to_string(),
            format!("Latency spike detected on node {}", sample.node_id()),
        );
        annotations.insert(
            "description".to_string(),
            format!(
                "Latency {:.2} ms against a baseline of {:.2} ms (stddev {:.2}, {} samples). Z-score: {:.1}.",
                sample.latency(),
                verdict.baseline.mean,
                verdict.baseline.stddev,
                verdict.baseline.count,
                verdict.z_score
            ),
        );
        annotations.insert("z_score".to_string(), format!("{:.2}", verdict.z_score));
        annotations.insert("latency_ms".to_string(), format!("{:.3}", sample.latency()));
        annotations.insert(
            "expected_latency_ms".to_string(),
            format!("{:.3}", verdict.baseline.mean),
        );

        self.firing(labels, annotations, sample.timestamp())
    }

    /// Create an Alertmanager alert for a packet loss event
    pub fn create_packet_loss_alert(&self, sample: &Sample) -> AlertmanagerAlert {
        let severity = if sample.packet_loss() >= 50.0 {
            AlertSeverity::Critical
        } else {
            AlertSeverity::Warning
        };

        let mut labels = self.base_labels(AlertType::PacketLoss, sample.node_id());
        labels.insert("severity".to_string(), severity.to_string());

        let mut annotations = HashMap::new();
        annotations.insert(
            "summary".to_string(),
            format!("Packet loss detected on node {}", sample.node_id()),
        );
        annotations.insert(
            "description".to_string(),
            format!("Node reported {:.2}% packet loss.", sample.packet_loss()),
        );
        annotations.insert(
            "packet_loss_percent".to_string(),
            format!("{:.2}", sample.packet_loss()),
        );

        self.firing(labels, annotations, sample.timestamp())
    }

    pub fn create_alertmanager_payload(alerts: Vec<AlertmanagerAlert>) -> AlertmanagerPayload {
        AlertmanagerPayload { alerts }
    }

    fn base_labels(&self, alert_type: AlertType, node_id: &str) -> HashMap<String, String> {
        let mut labels = HashMap::new();
        labels.insert("alertname".to_string(), alert_type.to_string());
        labels.insert("node".to_string(), node_id.to_string());
        labels.insert("component".to_string(), self.component_name.clone());
        labels
    }

    fn firing(
        &self,
        labels: HashMap<String, String>,
        annotations: HashMap<String, String>,
        timestamp: i64,
    ) -> AlertmanagerAlert {
        let starts_at = DateTime::<Utc>::from_timestamp(timestamp, 0)
            .unwrap_or_else(Utc::now)
            .to_rfc3339();

        AlertmanagerAlert {
            status: "firing".to_string(),
            labels,
            annotations,
            starts_at,
            ends_at: None,
            generator_url: None,
        }
    }
}
