//! Core data models for network-health ingestion

use crate::error::ValidationError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Upper bound for packet loss. Loss is reported as a percentage.
pub const MAX_PACKET_LOSS_PERCENT: f64 = 100.0;

/// Metric carried by a sample
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    Latency,
    Jitter,
    PacketLoss,
    Bandwidth,
}

impl Metric {
    pub const ALL: [Metric; 4] = [
        Metric::Latency,
        Metric::Jitter,
        Metric::PacketLoss,
        Metric::Bandwidth,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Metric::Latency => "latency",
            Metric::Jitter => "jitter",
            Metric::PacketLoss => "packet_loss",
            Metric::Bandwidth => "bandwidth",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unvalidated sample fields as received from a transport request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleInput {
    pub node_id: String,
    pub latency: f64,
    pub jitter: f64,
    pub packet_loss: f64,
    pub bandwidth: f64,
    pub timestamp: i64,
}

/// One validated network-health observation from a node
///
/// Fields are private so a `Sample` can only be obtained through
/// [`Sample::new`] and never changes afterwards.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Sample {
    node_id: String,
    latency: f64,
    jitter: f64,
    packet_loss: f64,
    bandwidth: f64,
    timestamp: i64,
}

impl Sample {
    /// Validate and construct a sample
    ///
    /// Latency and jitter are milliseconds, bandwidth is Mbps, packet loss is
    /// a percentage in `[0, 100]` and the timestamp is unix epoch seconds.
    pub fn new(
        node_id: impl Into<String>,
        latency: f64,
        jitter: f64,
        packet_loss: f64,
        bandwidth: f64,
        timestamp: i64,
    ) -> Result<Self, ValidationError> {
        let node_id = node_id.into();
        if node_id.trim().is_empty() {
            return Err(ValidationError::EmptyNodeId);
        }

        check_non_negative(Metric::Latency, latency)?;
        check_non_negative(Metric::Jitter, jitter)?;
        check_non_negative(Metric::Bandwidth, bandwidth)?;
        check_non_negative(Metric::PacketLoss, packet_loss)?;
        if packet_loss > MAX_PACKET_LOSS_PERCENT {
            return Err(ValidationError::PacketLossOutOfRange(packet_loss));
        }

        if timestamp <= 0 {
            return Err(ValidationError::NonPositiveTimestamp(timestamp));
        }

        Ok(Self {
            node_id,
            latency,
            jitter,
            packet_loss,
            bandwidth,
            timestamp,
        })
    }

    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    pub fn latency(&self) -> f64 {
        self.latency
    }

    pub fn jitter(&self) -> f64 {
        self.jitter
    }

    pub fn packet_loss(&self) -> f64 {
        self.packet_loss
    }

    pub fn bandwidth(&self) -> f64 {
        self.bandwidth
    }

    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    /// Value of the given metric in this sample
    pub fn value(&self, metric: Metric) -> f64 {
        match metric {
            Metric::Latency => self.latency,
            Metric::Jitter => self.jitter,
            Metric::PacketLoss => self.packet_loss,
            Metric::Bandwidth => self.bandwidth,
        }
    }
}

impl TryFrom<SampleInput> for Sample {
    type Error = ValidationError;

    fn try_from(input: SampleInput) -> Result<Self, Self::Error> {
        Sample::new(
            input.node_id,
            input.latency,
            input.jitter,
            input.packet_loss,
            input.bandwidth,
            input.timestamp,
        )
    }
}

fn check_non_negative(metric: Metric, value: f64) -> Result<(), ValidationError> {
    if !value.is_finite() {
        return Err(ValidationError::NotFinite { metric, value });
    }
    if value < 0.0 {
        return Err(ValidationError::Negative { metric, value });
    }
    Ok(())
}
