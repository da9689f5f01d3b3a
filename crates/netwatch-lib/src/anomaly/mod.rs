//! Anomaly detection for network-health samples
//!
//! This module provides:
//! - Rolling per-node baselines (Welford mean/stddev)
//! - Latency spike (z-score) and packet loss classification
//! - Alert emission with deduplication

mod alerter;
mod baseline;
mod classifier;

pub use alerter::{
    AlertSeverity, AlertSink, AlertType, Alerter, AlertmanagerAlert, AlertmanagerPayload,
    ChannelAlertSink, LogAlertSink, DEFAULT_DEDUP_WINDOW_SECS,
};
pub use baseline::{BaselineEstimator, BaselineSnapshot, RollingStats, DEFAULT_MAX_TRACKED_KEYS};
pub use classifier::{
    z_score, AnomalyClassifier, AnomalyVerdict, ClassifierConfig, SpikeSeverity,
    DEFAULT_PACKET_LOSS_THRESHOLD, DEFAULT_SPIKE_Z_THRESHOLD,
};
