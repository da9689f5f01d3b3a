//! End-to-end tests over a real gRPC connection

use netwatch_lib::{
    anomaly::AnomalyVerdict,
    health::{components, ComponentStatus, HealthRegistry},
    ingest::IngestionPipeline,
    models::Sample,
    proto::{ErrorKind, MetricsRequest, MetricsServiceClient},
    storage::{async_trait, MemorySampleStore, SampleStore},
    StorageError,
};
use netwatch_server::grpc;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::broadcast;

struct SlowStore;

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

#[async_trait]
impl SampleStore for SlowStore {
    async fn insert_sample(&self, _: &Sample, _: &AnomalyVerdict) -> Result<(), StorageError> {
        tokio::time::sleep(Duration::from_secs(2)).await;
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "slow"
    }
}

async fn start_server(
    store: Arc<dyn SampleStore>,
) -> (SocketAddr, Arc<IngestionPipeline>, broadcast::Sender<()>) {
    let pipeline = Arc::new(IngestionPipeline::builder(store).build().unwrap());
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    tokio::spawn(grpc::serve(
        listener,
        pipeline.clone(),
        HealthRegistry::new(),
        shutdown_rx,
    ));

    (addr, pipeline, shutdown_tx)
}

fn request(node_id: &str, latency: f64, packet_loss: f64) -> MetricsRequest {
    MetricsRequest {
        node_id: node_id.to_string(),
        latency,
        jitter: 3.0,
        packet_loss,
        bandwidth: 75.0,
        timestamp: 1_700_000_000,
    }
}

#[tokio::test]
async fn test_submit_and_classify_over_grpc() {
    let store = MemorySampleStore::new();
    let (addr, pipeline, shutdown) = start_server(Arc::new(store.clone())).await;

    let mut client = MetricsServiceClient::connect(format!("http://{}", addr))
        .await
        .unwrap();

    for latency in [20.0, 22.0, 18.0, 21.0, 19.0, 20.0] {
        let response = client
            .submit_metrics(request("edge-1", latency, 0.0))
            .await
            .unwrap()
            .into_inner();
        assert!(response.success);
        assert!(!response.is_latency_spike);
    }

    let response = client
        .submit_metrics(request("edge-1", 400.0, 12.0))
        .await
        .unwrap()
        .into_inner();
    assert!(response.success);
    assert!(response.is_latency_spike);
    assert!(response.is_packet_loss);
    assert!(response.z_score > 3.0);

    assert_eq!(store.len(), 7);
    assert_eq!(pipeline.latency_baseline("edge-1").unwrap().count, 7);

    let _ = shutdown.send(());
}

#[tokio::test]
async fn test_invalid_sample_reported_as_validation_error() {
    let store = MemorySampleStore::new();
    let (addr, pipeline, shutdown) = start_server(Arc::new(store.clone())).await;

    let mut client = MetricsServiceClient::connect(format!("http://{}", addr))
        .await
        .unwrap();

    let response = client
        .submit_metrics(request("edge-2", 10.0, 140.0))
        .await
        .unwrap()
        .into_inner();

    assert!(!response.success);
    assert_eq!(response.error_kind(), ErrorKind::Validation);
    assert!(store.is_empty());
    assert!(pipeline.latency_baseline("edge-2").is_none());

    let _ = shutdown.send(());
}

#[tokio::test]
async fn test_caller_deadline_bounds_storage_write() {
    let (addr, pipeline, shutdown) = start_server(Arc::new(SlowStore)).await;

    let mut client = MetricsServiceClient::connect(format!("http://{}", addr))
        .await
        .unwrap();

    let mut req = tonic::Request::new(request("edge-3", 10.0, 0.0));
    req.set_timeout(Duration::from_millis(100));

    // Either side of the connection may report the expired deadline first
    match client.submit_metrics(req).await {
        Ok(response) => {
            let response = response.into_inner();
            assert!(!response.success);
            assert_eq!(response.error_kind(), ErrorKind::Timeout);
        }
        Err(status) => assert!(matches!(
            status.code(),
            tonic::Code::Cancelled | tonic::Code::DeadlineExceeded
        )),
    }

    // The baseline was advanced before the write started
    assert_eq!(pipeline.latency_baseline("edge-3").unwrap().count, 1);

    let _ = shutdown.send(());
}

#[tokio::test]
async fn test_storage_failure_reported_to_caller() {
    let (addr, pipeline, shutdown) = start_server(Arc::new(FailingStore)).await;

    let mut client = MetricsServiceClient::connect(format!("http://{}", addr))
        .await
        .unwrap();

    let response = client
        .submit_metrics(request("edge-4", 25.0, 0.0))
        .await
        .unwrap()
        .into_inner();

    assert!(!response.success);
    assert_eq!(response.error_kind(), ErrorKind::Storage);
    assert!(response.message.contains("connection refused"));

    // The sample still counts toward the baseline
    let baseline = pipeline.latency_baseline("edge-4").unwrap();
    assert_eq!(baseline.count, 1);
    assert_eq!(baseline.mean, 25.0);

    let _ = shutdown.send(());
}

#[tokio::test]
async fn test_bind_failure_marks_transport_unhealthy() {
    let taken = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = taken.local_addr().unwrap().to_string();

    let health = HealthRegistry::new();
    health.register(components::TRANSPORT).await;

    let result = grpc::bind(&addr, &health).await;

    assert!(result.is_err());
    assert_eq!(
        health.status(components::TRANSPORT).await,
        Some(ComponentStatus::Unhealthy)
    );
    assert!(!health.readiness().await.ready);
}
