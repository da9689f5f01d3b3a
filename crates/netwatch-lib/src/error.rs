//! Error types for ingestion, storage and configuration

use crate::models::Metric;
use std::time::Duration;
use thiserror::Error;

/// Malformed or out-of-range sample input
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("node_id must not be empty")]
    EmptyNodeId,

    #[error("{metric} must be a finite number, got {value}")]
    NotFinite { metric: Metric, value: f64 },

    #[error("{metric} must not be negative, got {value}")]
    Negative { metric: Metric, value: f64 },

    #[error("packet_loss must be a percentage in [0, 100], got {0}")]
    PacketLossOutOfRange(f64),

    #[error("timestamp must be a positive epoch value, got {0}")]
    NonPositiveTimestamp(i64),
}

/// Persistence failure reported by a sample store
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("storage unavailable: {0}")]
    Unavailable(String),

    #[error("stored row is not a valid sample: {0}")]
    InvalidRow(String),
}

/// Invalid configuration detected at startup
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigurationError {
    #[error("spike_z_threshold must be finite and greater than zero, got {0}")]
    InvalidZThreshold(f64),

    #[error("packet_loss_threshold must be within [0, 100], got {0}")]
    InvalidPacketLossThreshold(f64),

    #[error("unknown storage backend '{0}' (expected 'postgres' or 'memory')")]
    UnknownStorageBackend(String),

    #[error("{0} is required")]
    Missing(&'static str),
}

/// Failure outcome of one ingestion call
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("invalid sample: {0}")]
    Validation(#[from] ValidationError),

    #[error("failed to persist sample: {0}")]
    Storage(#[from] StorageError),

    #[error("storage write exceeded deadline of {0:?}")]
    Timeout(Duration),
}

impl IngestError {
    /// Short label used for metrics and logs
    pub fn reason(&self) -> &'static str {
        match self {
            IngestError::Validation(_) => "validation",
            IngestError::Storage(_) => "storage",
            IngestError::Timeout(_) => "timeout",
        }
    }
}
