//! End-to-end tests for the ingestion pipeline
//!
//! These tests drive `IngestionPipeline::submit` against in-memory and
//! failing stores to verify:
//! - Classification against the pre-sample baseline
//! - Rejection without side effects on invalid input
//! - Storage failure and deadline handling

use super::*;
use crate::anomaly::{AnomalyVerdict, ChannelAlertSink, ClassifierConfig};
use crate::error::{ConfigurationError, IngestError, StorageError, ValidationError};
use crate::health::{components, ComponentStatus, HealthRegistry};
use crate::models::{Metric, Sample, SampleInput};
use crate::observability::IngestMetrics;
use crate::storage::{async_trait, MemorySampleStore, SampleStore};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// Serializes tests that assert on the shared anomaly counters
static ANOMALY_COUNTERS: Mutex<()> = Mutex::new(());

fn lock_anomaly_counters() -> MutexGuard<'static, ()> {
    ANOMALY_COUNTERS
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Store whose writes always fail
struct FailingStore;

#[async_trait]
impl SampleStore for FailingStore {
    async fn insert_sample(&self, _: &Sample, _: &AnomalyVerdict) -> Result<(), StorageError> {
        Err(StorageError::Unavailable("connection refused".to_string()))
    }

    fn backend(&self) -> &'static str {
        "failing"
    }
}

/// Store whose writes take longer than any test deadline
struct SlowStore;

#[async_trait]
impl SampleStore for SlowStore {
    async fn insert_sample(&self, _: &Sample, _: &AnomalyVerdict) -> Result<(), StorageError> {
        tokio::time::sleep(Duration::from_millis(500)).await;
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "slow"
    }
}

/// Store whose writes fail while `failing` is set
#[derive(Default)]
struct FlakyStore {
    failing: AtomicBool,
    inner: MemorySampleStore,
}

#[async_trait]
impl SampleStore for FlakyStore {
    async fn insert_sample(&self, sample: &Sample, verdict: &AnomalyVerdict) -> Result<(), StorageError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable("connection reset".to_string()));
        }
        self.inner.insert_sample(sample, verdict).await
    }

    fn backend(&self) -> &'static str {
        "flaky"
    }
}

fn input(node_id: &str, latency: f64) -> SampleInput {
    SampleInput {
        node_id: node_id.to_string(),
        latency,
        jitter: 1.5,
        packet_loss: 0.0,
        bandwidth: 80.0,
        timestamp: 1_700_000_000,
    }
}

fn memory_pipeline() -> (IngestionPipeline, MemorySampleStore) {
    let store = MemorySampleStore::new();
    let pipeline = IngestionPipeline::builder(Arc::new(store.clone()))
        .max_tracked_keys(0)
        .build()
        .unwrap();
    (pipeline, store)
}

mod classification_tests {
    use super::*;

    #[tokio::test]
    async fn test_flat_baseline_never_spikes() {
        let (pipeline, store) = memory_pipeline();

        for _ in 0..5 {
            let outcome = pipeline.submit(input("n1", 10.0), None).await.unwrap();
            assert!(!outcome.verdict.is_latency_spike);
        }

        let baseline = pipeline.latency_baseline("n1").unwrap();
        assert!((baseline.mean - 10.0).abs() < 1e-9);
        assert_eq!(baseline.stddev, 0.0);

        // A zero-spread baseline cannot produce a z-score
        let outcome = pipeline.submit(input("n1", 100.0), None).await.unwrap();
        assert_eq!(outcome.verdict.baseline.count, 5);
        assert_eq!(outcome.verdict.z_score, 0.0);
        assert!(!outcome.verdict.is_latency_spike);
        assert_eq!(store.len(), 6);
    }

    #[tokio::test]
    async fn test_jittered_baseline_flags_spike() {
        let _counters = lock_anomaly_counters();
        let (pipeline, store) = memory_pipeline();

        for latency in [10.0, 11.0, 9.0, 10.0, 11.0, 9.0, 10.0] {
            pipeline.submit(input("n1", latency), None).await.unwrap();
        }

        let outcome = pipeline.submit(input("n1", 100.0), None).await.unwrap();
        assert!(outcome.verdict.z_score > 3.0);
        assert!(outcome.verdict.is_latency_spike);
        assert_eq!(outcome.alerts_raised, 1);

        let rows = store.samples_for("n1");
        assert!(rows.last().unwrap().is_latency_spike);
    }

    #[tokio::test]
    async fn test_verdict_uses_baseline_before_sample() {
        let (pipeline, _store) = memory_pipeline();

        for k in 0..10u64 {
            let outcome = pipeline
                .submit(input("n1", 10.0 + k as f64), None)
                .await
                .unwrap();
            assert_eq!(outcome.verdict.baseline.count, k);
        }
        assert_eq!(pipeline.latency_baseline("n1").unwrap().count, 10);
    }

    #[tokio::test]
    async fn test_packet_loss_event_forwarded_to_sink() {
        let (sink, mut alerts) = ChannelAlertSink::new(8);
        let pipeline = IngestionPipeline::builder(Arc::new(MemorySampleStore::new()))
            .classifier_config(ClassifierConfig {
                packet_loss_threshold: 2.0,
                ..Default::default()
            })
            .alert_sink(Arc::new(sink))
            .build()
            .unwrap();

        let mut lossy = input("n1", 10.0);
        lossy.packet_loss = 4.0;

        let outcome = pipeline.submit(lossy.clone(), None).await.unwrap();
        assert!(outcome.verdict.is_packet_loss);
        assert_eq!(outcome.alerts_raised, 1);

        let alert = alerts.recv().await.unwrap();
        assert_eq!(alert.labels.get("alertname").unwrap(), "NodePacketLoss");

        // Deduplicated within the window
        let outcome = pipeline.submit(lossy, None).await.unwrap();
        assert!(outcome.verdict.is_packet_loss);
        assert_eq!(outcome.alerts_raised, 0);
    }
}

mod rejection_tests {
    use super::*;

    #[tokio::test]
    async fn test_empty_node_id_rejected_without_side_effects() {
        let (pipeline, store) = memory_pipeline();

        let result = pipeline.submit(input("", 10.0), None).await;
        assert!(matches!(
            result,
            Err(IngestError::Validation(ValidationError::EmptyNodeId))
        ));
        assert_eq!(pipeline.baselines().tracked_keys(), 0);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_sample_leaves_existing_baseline_untouched() {
        let (pipeline, _store) = memory_pipeline();
        pipeline.submit(input("n1", 10.0), None).await.unwrap();

        let mut bad = input("n1", 10.0);
        bad.latency = f64::NAN;
        assert!(pipeline.submit(bad, None).await.is_err());

        assert_eq!(pipeline.latency_baseline("n1").unwrap().count, 1);
    }

    #[tokio::test]
    async fn test_storage_failure_keeps_baseline_update() {
        let health = HealthRegistry::new();
        health.register(components::STORAGE).await;

        let pipeline = IngestionPipeline::builder(Arc::new(FailingStore))
            .health_registry(health.clone())
            .build()
            .unwrap();

        let result = pipeline.submit(input("n1", 42.0), None).await;
        assert!(matches!(result, Err(IngestError::Storage(_))));

        let baseline = pipeline.latency_baseline("n1").unwrap();
        assert_eq!(baseline.count, 1);
        assert_eq!(baseline.mean, 42.0);

        assert_eq!(
            health.status(components::STORAGE).await,
            Some(ComponentStatus::Degraded)
        );
        let storage = health.storage().await;
        assert_eq!(storage.consecutive_failures, 1);
        assert!(storage
            .last_error
            .as_deref()
            .is_some_and(|e| e.contains("connection refused")));
    }

    #[tokio::test]
    async fn test_unstored_spike_not_counted_or_alerted() {
        let _counters = lock_anomaly_counters();
        let metrics = IngestMetrics::new();
        let health = HealthRegistry::new();
        health.register(components::STORAGE).await;

        let store = Arc::new(FlakyStore::default());
        let (sink, mut alerts) = ChannelAlertSink::new(8);
        let pipeline = IngestionPipeline::builder(store.clone())
            .alert_sink(Arc::new(sink))
            .health_registry(health.clone())
            .build()
            .unwrap();

        for latency in [10.0, 11.0, 9.0, 10.0, 11.0, 9.0, 10.0] {
            pipeline.submit(input("n1", latency), None).await.unwrap();
        }

        store.failing.store(true, Ordering::SeqCst);
        let spikes_before = metrics.latency_spikes();
        let result = pipeline.submit(input("n1", 100.0), None).await;

        assert!(matches!(result, Err(IngestError::Storage(_))));
        assert_eq!(metrics.latency_spikes(), spikes_before);
        assert!(alerts.try_recv().is_err());
        assert_eq!(store.inner.len(), 7);

        store.failing.store(false, Ordering::SeqCst);
        pipeline.submit(input("n1", 10.0), None).await.unwrap();
        assert_eq!(
            health.status(components::STORAGE).await,
            Some(ComponentStatus::Healthy)
        );
        assert_eq!(health.storage().await.consecutive_failures, 0);
    }

    #[tokio::test]
    async fn test_storage_deadline_exceeded() {
        let pipeline = IngestionPipeline::builder(Arc::new(SlowStore))
            .build()
            .unwrap();

        let result = pipeline
            .submit(input("n1", 10.0), Some(Duration::from_millis(20)))
            .await;
        assert!(matches!(result, Err(IngestError::Timeout(_))));
        assert_eq!(pipeline.latency_baseline("n1").unwrap().count, 1);
    }

    #[tokio::test]
    async fn test_default_timeout_applies() {
        let pipeline = IngestionPipeline::builder(Arc::new(SlowStore))
            .default_timeout(Duration::from_millis(20))
            .build()
            .unwrap();

        let result = pipeline.submit(input("n1", 10.0), None).await;
        assert_eq!(result.unwrap_err().reason(), "timeout");
    }

    #[test]
    fn test_build_rejects_invalid_thresholds() {
        let result = IngestionPipeline::builder(Arc::new(MemorySampleStore::new()))
            .classifier_config(ClassifierConfig {
                spike_z_threshold: 0.0,
                ..Default::default()
            })
            .build();
        assert!(matches!(
            result,
            Err(ConfigurationError::InvalidZThreshold(_))
        ));
    }
}

mod concurrency_tests {
    use super::*;

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_submissions_across_nodes() {
        let (pipeline, store) = memory_pipeline();
        let pipeline = Arc::new(pipeline);

        let mut handles = Vec::new();
        for node in 0..4 {
            for i in 0..50 {
                let pipeline = Arc::clone(&pipeline);
                handles.push(tokio::spawn(async move {
                    let sample = input(&format!("node-{}", node), 10.0 + (i % 5) as f64);
                    pipeline.submit(sample, None).await
                }));
            }
        }
        for handle in handles {
            assert!(handle.await.unwrap().is_ok());
        }

        assert_eq!(store.len(), 200);
        for node in 0..4 {
            let node_id = format!("node-{}", node);
            let baseline = pipeline.latency_baseline(&node_id).unwrap();
            assert_eq!(baseline.count, 50);
            assert!((baseline.mean - 12.0).abs() < 1e-9);
            assert!(pipeline
                .baselines()
                .snapshot(&node_id, Metric::Jitter)
                .is_none());
        }
    }
}
