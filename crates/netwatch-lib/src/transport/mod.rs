//! gRPC transport for sample submission
//!
//! Exposes `IngestionPipeline::submit` as `metrics.MetricsService/SubmitMetrics`.
//! Every submission is answered with a `MetricsResponse`; rejections are
//! reported through `success = false` and `error_kind` rather than a gRPC
//! status so clients always receive a structured outcome.

mod deadline;

pub use deadline::parse_grpc_timeout;

use crate::error::IngestError;
use crate::ingest::IngestionPipeline;
use crate::models::SampleInput;
use crate::proto::{ErrorKind, MetricsRequest, MetricsResponse, MetricsService, MetricsServiceServer};
use std::sync::Arc;
use std::time::Duration;
use tonic::{Request, Response, Status};
use tracing::debug;

/// gRPC handler backed by an ingestion pipeline
#[derive(Clone)]
pub struct MetricsGrpcService {
    pipeline: Arc<IngestionPipeline>,
}

impl MetricsGrpcService {
    pub fn new(pipeline: Arc<IngestionPipeline>) -> Self {
        Self { pipeline }
    }

    /// Wrap in the generated tonic server type
    pub fn into_server(self) -> MetricsServiceServer<Self> {
        MetricsServiceServer::new(self)
    }
}

impl From<MetricsRequest> for SampleInput {
    fn from(req: MetricsRequest) -> Self {
        SampleInput {
            node_id: req.node_id,
            latency: req.latency,
            jitter: req.jitter,
            packet_loss: req.packet_loss,
            bandwidth: req.bandwidth,
            timestamp: req.timestamp,
        }
    }
}

fn error_kind(error: &IngestError) -> ErrorKind {
    match error {
        IngestError::Validation(_) => ErrorKind::Validation,
        IngestError::Storage(_) => ErrorKind::Storage,
        IngestError::Timeout(_) => ErrorKind::Timeout,
    }
}

fn request_deadline<T>(request: &Request<T>) -> Option<Duration> {
    request
        .metadata()
        .get("grpc-timeout")
        .and_then(|value| value.to_str().ok())
        .and_then(parse_grpc_timeout)
}

#[tonic::async_trait]
impl MetricsService for MetricsGrpcService {
    async fn submit_metrics(
        &self,
        request: Request<MetricsRequest>,
    ) -> Result<Response<MetricsResponse>, Status> {
        let deadline = request_deadline(&request);
        let input = SampleInput::from(request.into_inner());
        debug!(node_id = %input.node_id, ?deadline, "SubmitMetrics received");

        let response = match self.pipeline.submit(input, deadline).await {
            Ok(outcome) => MetricsResponse {
                success: true,
                message: String::new(),
                is_latency_spike: outcome.verdict.is_latency_spike,
                is_packet_loss: outcome.verdict.is_packet_loss,
                z_score: outcome.verdict.z_score,
                error_kind: ErrorKind::Unspecified as i32,
            },
            Err(e) => MetricsResponse {
                success: false,
                message: e.to_string(),
                error_kind: error_kind(&e) as i32,
                ..Default::default()
            },
        };

        Ok(Response::new(response))
    }
}
