use crate::anomaly::{
    AlertSink, Alerter, AnomalyClassifier, AnomalyVerdict, BaselineEstimator, BaselineSnapshot,
    ClassifierConfig, LogAlertSink, DEFAULT_MAX_TRACKED_KEYS,
};
use crate::error::{ConfigurationError, IngestError};
use crate::health::{HealthRegistry, StorageTransition};
use crate::models::{Metric, Sample, SampleInput};
use crate::observability::{IngestMetrics, StructuredLogger};
use crate::storage::SampleStore;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

/// Result of a stored submission
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IngestOutcome {
    pub verdict: AnomalyVerdict,
    /// Alerts forwarded to the sink for this sample (after deduplication)
    pub alerts_raised: usize,
}

/// Builder for [`IngestionPipeline`]
pub struct IngestionPipelineBuilder {
    store: Arc<dyn SampleStore>,
    classifier: ClassifierConfig,
    max_tracked_keys: usize,
    alert_sink: Arc<dyn AlertSink>,
    dedup_window: Option<Duration>,
    health: Option<HealthRegistry>,
    default_timeout: Option<Duration>,
    instance: String,
}

impl IngestionPipelineBuilder {
    pub fn classifier_config(mut self, config: ClassifierConfig) -> Self {
        self.classifier = config;
        self
    }

    /// Bound on tracked `(node, metric)` baselines, 0 for unbounded
    pub fn max_tracked_keys(mut self, max: usize) -> Self {
        self.max_tracked_keys = max;
        self
    }

    pub fn alert_sink(mut self, sink: Arc<dyn AlertSink>) -> Self {
        self.alert_sink = sink;
        self
    }

    pub fn dedup_window(mut self, window: Duration) -> Self {
        self.dedup_window = Some(window);
        self
    }

    pub fn health_registry(mut self, registry: HealthRegistry) -> Self {
        self.health = Some(registry);
        self
    }

    /// Storage deadline applied when the caller supplies none
    pub fn default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = Some(timeout);
        self
    }

    pub fn instance(mut self, instance: impl Into<String>) -> Self {
        self.instance = instance.into();
        self
    }

    pub fn build(self) -> Result<IngestionPipeline, ConfigurationError> {
        self.classifier.validate()?;

        let alerter = match self.dedup_window {
            Some(window) => Alerter::new().with_dedup_window(window),
            None => Alerter::new(),
        };

        Ok(IngestionPipeline {
            baselines: Arc::new(BaselineEstimator::new(self.max_tracked_keys)),
            classifier: AnomalyClassifier::new(self.classifier),
            store: self.store,
            alerter,
            alert_sink: self.alert_sink,
            metrics: IngestMetrics::new(),
            logger: StructuredLogger::new(self.instance),
            health: self.health,
            reported_evictions: AtomicU64::new(0),
            default_timeout: self.default_timeout,
        })
    }
}

/// Validates, classifies and persists submitted samples
///
/// Shared across request tasks behind an `Arc`; all methods take `&self`.
pub struct IngestionPipeline {
    baselines: Arc<BaselineEstimator>,
    classifier: AnomalyClassifier,
    store: Arc<dyn SampleStore>,
    alerter: Alerter,
    alert_sink: Arc<dyn AlertSink>,
    metrics: IngestMetrics,
    logger: StructuredLogger,
    health: Option<HealthRegistry>,
    /// Evictions already added to the eviction counter
    reported_evictions: AtomicU64,
    default_timeout: Option<Duration>,
}

impl IngestionPipeline {
    pub fn builder(store: Arc<dyn SampleStore>) -> IngestionPipelineBuilder {
        IngestionPipelineBuilder {
            store,
            classifier: ClassifierConfig::default(),
            max_tracked_keys: DEFAULT_MAX_TRACKED_KEYS,
            alert_sink: Arc::new(LogAlertSink),
            dedup_window: None,
            health: None,
            default_timeout: None,
            instance: "netwatch".to_string(),
        }
    }

    pub fn baselines(&self) -> &Arc<BaselineEstimator> {
        &self.baselines
    }

    pub fn classifier(&self) -> &AnomalyClassifier {
        &self.classifier
    }

    pub fn store(&self) -> &Arc<dyn SampleStore> {
        &self.store
    }

    /// Ingest one submission
    ///
    /// `deadline` bounds the storage write; without one the pipeline's
    /// default timeout applies, if configured.
    pub async fn submit(
        &self,
        input: SampleInput,
        deadline: Option<Duration>,
    ) -> Result<IngestOutcome, IngestError> {
        self.metrics.inc_received();

        let node_id = input.node_id.clone();
        let sample = match Sample::try_from(input) {
            Ok(sample) => sample,
            Err(e) => return Err(self.reject(&node_id, e.into()).await),
        };

        // The only baseline mutation for this call. The per-key lock is
        // released before the storage write below.
        let baseline = self
            .baselines
            .observe(sample.node_id(), Metric::Latency, sample.latency());
        self.record_baseline_cardinality();

        let verdict = self.classifier.classify(&sample, baseline);

        if let Err(e) = self.persist(&sample, &verdict, deadline).await {
            return Err(self.reject(sample.node_id(), e).await);
        }

        // Anomaly counters and logs only cover stored samples
        self.metrics.inc_stored();
        self.record_verdict(&sample, &verdict);
        self.logger
            .log_stored(sample.node_id(), sample.timestamp(), baseline.count + 1);
        if let Some(health) = &self.health {
            if health.record_storage_success().await == Some(StorageTransition::Recovered) {
                self.logger.log_storage_recovered();
            }
        }

        let alerts = self.alerter.alerts_for(&sample, &verdict);
        let alerts_raised = alerts.len();
        for alert in alerts {
            self.metrics.inc_alerts_raised();
            self.alert_sink.send(alert);
        }

        Ok(IngestOutcome {
            verdict,
            alerts_raised,
        })
    }

    /// Current latency baseline for a node
    pub fn latency_baseline(&self, node_id: &str) -> Option<BaselineSnapshot> {
        self.baselines.snapshot(node_id, Metric::Latency)
    }

    async fn persist(
        &self,
        sample: &Sample,
        verdict: &AnomalyVerdict,
        deadline: Option<Duration>,
    ) -> Result<(), IngestError> {
        let started = Instant::now();
        let write = self.store.insert_sample(sample, verdict);

        let result = match deadline.or(self.default_timeout) {
            Some(limit) => match tokio::time::timeout(limit, write).await {
                Ok(result) => result.map_err(IngestError::from),
                Err(_) => Err(IngestError::Timeout(limit)),
            },
            None => write.await.map_err(IngestError::from),
        };

        self.metrics
            .observe_storage_latency(started.elapsed().as_secs_f64());
        result
    }

    fn record_verdict(&self, sample: &Sample, verdict: &AnomalyVerdict) {
        if let Some(severity) = verdict.spike_severity() {
            self.metrics.inc_latency_spikes();
            self.logger.log_latency_spike(
                sample.node_id(),
                sample.latency(),
                verdict.baseline.mean,
                verdict.z_score,
                severity.as_str(),
            );
        }
        if verdict.is_packet_loss {
            self.metrics.inc_packet_loss_events();
            self.logger.log_packet_loss(
                sample.node_id(),
                sample.packet_loss(),
                self.classifier.config().packet_loss_threshold,
            );
        }
        debug!(
            node_id = %sample.node_id(),
            z_score = verdict.z_score,
            baseline_count = verdict.baseline.count,
            "Sample classified"
        );
    }

    async fn reject(&self, node_id: &str, error: IngestError) -> IngestError {
        self.metrics.inc_rejected(error.reason());
        self.logger
            .log_rejection(node_id, error.reason(), &error.to_string());

        if let (Some(health), IngestError::Storage(_) | IngestError::Timeout(_)) =
            (&self.health, &error)
        {
            if health.record_storage_failure(&error).await == Some(StorageTransition::Degraded) {
                self.logger.log_storage_degraded(&error.to_string());
            }
        }
        error
    }

    fn record_baseline_cardinality(&self) {
        self.metrics
            .set_baselines_tracked(self.baselines.tracked_keys());

        let total = self.baselines.evictions();
        let reported = self.reported_evictions.fetch_max(total, Ordering::Relaxed);
        if total > reported {
            self.metrics.inc_baseline_evictions(total - reported);
        }
    }
}
