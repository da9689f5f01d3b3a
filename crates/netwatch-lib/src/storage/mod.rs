//! Durable sample storage
//!
//! The ingestion pipeline only needs an append-only write; the HTTP API and
//! `nw samples`/`nw chart` read a node's most recent rows back. `PgSampleStore`
//! uses PostgreSQL through a shared connection pool and `MemorySampleStore`
//! keeps rows in process for development and tests.

mod memory;
mod postgres;

pub use memory::MemorySampleStore;
pub use postgres::{PgSampleStore, DEFAULT_MAX_CONNECTIONS};

use crate::anomaly::AnomalyVerdict;
use crate::error::StorageError;
use crate::models::Sample;
use serde::Serialize;

pub use async_trait::async_trait;

/// Most rows a single history query returns
pub const MAX_HISTORY_ROWS: usize = 1000;

/// A persisted sample with the classification stored alongside it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredSample {
    #[serde(flatten)]
    pub sample: Sample,
    pub is_latency_spike: bool,
    pub is_packet_loss: bool,
    pub z_score: f64,
}

impl StoredSample {
    pub fn new(sample: Sample, verdict: &AnomalyVerdict) -> Self {
        Self {
            sample,
            is_latency_spike: verdict.is_latency_spike,
            is_packet_loss: verdict.is_packet_loss,
            z_score: verdict.z_score,
        }
    }
}

/// Append-only sample persistence
#[async_trait]
pub trait SampleStore: Send + Sync {
    /// Durably append one sample together with its classification
    async fn insert_sample(
        &self,
        sample: &Sample,
        verdict: &AnomalyVerdict,
    ) -> Result<(), StorageError>;

    /// The latest `limit` rows for a node, oldest first
    ///
    /// Write-only backends keep the default, which reports no history.
    async fn recent_samples(
        &self,
        _node_id: &str,
        _limit: usize,
    ) -> Result<Vec<StoredSample>, StorageError> {
        Err(StorageError::Unavailable(format!(
            "{} backend does not keep history",
            self.backend()
        )))
    }

    /// Check that the backend is reachable
    async fn ping(&self) -> Result<(), StorageError> {
        Ok(())
    }

    /// Backend name for logs and health output
    fn backend(&self) -> &'static str;
}
