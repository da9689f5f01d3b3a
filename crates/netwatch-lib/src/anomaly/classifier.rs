//! Latency spike and packet loss classification
//!
//! Latency is judged statistically against the node's rolling baseline.
//! Packet loss is bursty and far from Gaussian, so it is judged against an
//! absolute policy threshold instead.

use super::BaselineSnapshot;
use crate::error::ConfigurationError;
use crate::models::{Sample, MAX_PACKET_LOSS_PERCENT};
use serde::{Deserialize, Serialize};

/// Default number of standard deviations that counts as a spike
pub const DEFAULT_SPIKE_Z_THRESHOLD: f64 = 3.0;

/// Default packet loss threshold in percent
pub const DEFAULT_PACKET_LOSS_THRESHOLD: f64 = 5.0;

/// Classifier thresholds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassifierConfig {
    /// |z| strictly above this is a latency spike
    pub spike_z_threshold: f64,
    /// Packet loss percentage strictly above this is a loss event
    pub packet_loss_threshold: f64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            spike_z_threshold: DEFAULT_SPIKE_Z_THRESHOLD,
            packet_loss_threshold: DEFAULT_PACKET_LOSS_THRESHOLD,
        }
    }
}

impl ClassifierConfig {
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if !self.spike_z_threshold.is_finite() || self.spike_z_threshold <= 0.0 {
            return Err(ConfigurationError::InvalidZThreshold(self.spike_z_threshold));
        }
        if !(0.0..=MAX_PACKET_LOSS_PERCENT).contains(&self.packet_loss_threshold) {
            return Err(ConfigurationError::InvalidPacketLossThreshold(
                self.packet_loss_threshold,
            ));
        }
        Ok(())
    }
}

/// Normalized deviation of `value` from `mean`
///
/// Returns 0 when `stddev` is 0, so a node whose baseline has no spread yet
/// (including its first two samples) is never flagged as spiking.
pub fn z_score(value: f64, mean: f64, stddev: f64) -> f64 {
    if stddev == 0.0 {
        return 0.0;
    }
    (value - mean) / stddev
}

/// Outcome of classifying one sample
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AnomalyVerdict {
    pub is_latency_spike: bool,
    pub is_packet_loss: bool,
    /// Latency z-score against the pre-sample baseline
    pub z_score: f64,
    /// Latency baseline the sample was judged against
    pub baseline: BaselineSnapshot,
}

impl AnomalyVerdict {
    pub fn is_anomalous(&self) -> bool {
        self.is_latency_spike || self.is_packet_loss
    }

    pub fn spike_severity(&self) -> Option<SpikeSeverity> {
        self.is_latency_spike
            .then(|| SpikeSeverity::from_z_score(self.z_score))
    }
}

/// Severity levels for latency spikes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SpikeSeverity {
    Warning,
    High,
    Critical,
}

impl SpikeSeverity {
    pub fn from_z_score(z_score: f64) -> Self {
        let magnitude = z_score.abs();
        if magnitude >= 5.0 {
            SpikeSeverity::Critical
        } else if magnitude >= 4.0 {
            SpikeSeverity::High
        } else {
            SpikeSeverity::Warning
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SpikeSeverity::Warning => "warning",
            SpikeSeverity::High => "high",
            SpikeSeverity::Critical => "critical",
        }
    }
}

/// Stateless classifier applying the configured thresholds
#[derive(Debug, Clone, Default)]
pub struct AnomalyClassifier {
    config: ClassifierConfig,
}

impl AnomalyClassifier {
    pub fn new(config: ClassifierConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    /// True iff the latency z-score magnitude strictly exceeds the threshold
    pub fn is_latency_spike(&self, sample: &Sample, mean: f64, stddev: f64) -> bool {
        z_score(sample.latency(), mean, stddev).abs() > self.config.spike_z_threshold
    }

    /// True iff packet loss strictly exceeds `threshold`
    pub fn is_packet_loss_event(&self, sample: &Sample, threshold: f64) -> bool {
        sample.packet_loss() > threshold
    }

    /// Classify a sample against the latency baseline taken before it
    pub fn classify(&self, sample: &Sample, baseline: BaselineSnapshot) -> AnomalyVerdict {
        AnomalyVerdict {
            is_latency_spike: self.is_latency_spike(sample, baseline.mean, baseline.stddev),
            is_packet_loss: self.is_packet_loss_event(sample, self.config.packet_loss_threshold),
            z_score: z_score(sample.latency(), baseline.mean, baseline.stddev),
            baseline,
        }
    }
}
