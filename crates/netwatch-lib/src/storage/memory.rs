//! In-process sample store

use super::{async_trait, SampleStore, StoredSample};
use crate::anomaly::AnomalyVerdict;
use crate::error::StorageError;
use crate::models::Sample;
use parking_lot::RwLock;
use std::sync::Arc;

/// Sample store keeping rows in memory
///
/// Clones share the same rows.
#[derive(Debug, Clone, Default)]
pub struct MemorySampleStore {
    rows: Arc<RwLock<Vec<StoredSample>>>,
}

impl MemorySampleStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.rows.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.read().is_empty()
    }

    /// Rows for one node in insertion order
    pub fn samples_for(&self, node_id: &str) -> Vec<StoredSample> {
        self.rows
            .read()
            .iter()
            .filter(|row| row.sample.node_id() == node_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl SampleStore for MemorySampleStore {
    async fn insert_sample(
        &self,
        sample: &Sample,
        verdict: &AnomalyVerdict,
    ) -> Result<(), StorageError> {
        self.rows
            .write()
            .push(StoredSample::new(sample.clone(), verdict));
        Ok(())
    }

    async fn recent_samples(
        &self,
        node_id: &str,
        limit: usize,
    ) -> Result<Vec<StoredSample>, StorageError> {
        let rows = self.rows.read();
        let mut recent: Vec<StoredSample> = rows
            .iter()
            .rev()
            .filter(|row| row.sample.node_id() == node_id)
            .take(limit)
            .cloned()
            .collect();
        recent.reverse();
        Ok(recent)
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anomaly::BaselineSnapshot;

    fn verdict() -> AnomalyVerdict {
        AnomalyVerdict {
            is_latency_spike: false,
            is_packet_loss: false,
            z_score: 0.0,
            baseline: BaselineSnapshot::default(),
        }
    }

    #[tokio::test]
    async fn test_insert_and_filter_by_node() {
        let store = MemorySampleStore::new();
        let a = Sample::new("a", 10.0, 1.0, 0.0, 50.0, 1).unwrap();
        let b = Sample::new("b", 20.0, 1.0, 0.0, 50.0, 2).unwrap();

        store.insert_sample(&a, &verdict()).await.unwrap();
        store.insert_sample(&b, &verdict()).await.unwrap();
        store.insert_sample(&a, &verdict()).await.unwrap();

        assert_eq!(store.len(), 3);
        assert_eq!(store.samples_for("a").len(), 2);
        assert_eq!(store.samples_for("b")[0].sample.latency(), 20.0);
        assert!(store.ping().await.is_ok());
    }

    #[tokio::test]
    async fn test_recent_samples_keeps_latest_in_order() {
        let store = MemorySampleStore::new();
        for ts in 1..=5 {
            let sample = Sample::new("a", ts as f64, 1.0, 0.0, 50.0, ts).unwrap();
            store.insert_sample(&sample, &verdict()).await.unwrap();
        }
        let other = Sample::new("b", 99.0, 1.0, 0.0, 50.0, 6).unwrap();
        store.insert_sample(&other, &verdict()).await.unwrap();

        let recent = store.recent_samples("a", 3).await.unwrap();
        let timestamps: Vec<i64> = recent.iter().map(|r| r.sample.timestamp()).collect();
        assert_eq!(timestamps, vec![3, 4, 5]);

        assert!(store.recent_samples("ghost", 10).await.unwrap().is_empty());
        assert!(store.recent_samples("a", 0).await.unwrap().is_empty());
    }

    #[test]
    fn test_clones_share_rows() {
        let store = MemorySampleStore::new();
        let clone = store.clone();
        let sample = Sample::new("a", 10.0, 1.0, 0.0, 50.0, 1).unwrap();
        tokio_test::assert_ok!(tokio_test::block_on(
            clone.insert_sample(&sample, &verdict())
        ));
        assert!(!store.is_empty());
    }
}
