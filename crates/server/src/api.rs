//! HTTP API for health checks, Prometheus metrics, baselines and sample history

use anyhow::Context;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use netwatch_lib::{
    anomaly::BaselineSnapshot,
    health::{ComponentStatus, HealthRegistry},
    ingest::IngestionPipeline,
    models::Metric,
    observability::IngestMetrics,
    storage::{StoredSample, MAX_HISTORY_ROWS},
};
use prometheus::{Encoder, TextEncoder};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tracing::{error, info};

/// Rows returned by `/v1/samples/:node_id` when no limit is given
const DEFAULT_HISTORY_ROWS: usize = 100;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub health_registry: HealthRegistry,
    pub metrics: IngestMetrics,
    pub pipeline: Arc<IngestionPipeline>,
}

impl AppState {
    pub fn new(
        health_registry: HealthRegistry,
        metrics: IngestMetrics,
        pipeline: Arc<IngestionPipeline>,
    ) -> Self {
        Self {
            health_registry,
            metrics,
            pipeline,
        }
    }
}

/// One metric's rolling baseline
#[derive(Debug, Serialize)]
pub struct MetricBaseline {
    pub metric: Metric,
    #[serde(flatten)]
    pub baseline: BaselineSnapshot,
}

/// Baselines tracked for one node
#[derive(Debug, Serialize)]
pub struct NodeBaselines {
    pub node_id: String,
    pub baselines: Vec<MetricBaseline>,
}

/// Stored history for one node, oldest first
#[derive(Debug, Serialize)]
pub struct NodeSamples {
    pub node_id: String,
    pub samples: Vec<StoredSample>,
}

#[derive(Debug, Deserialize)]
struct HistoryQuery {
    limit: Option<usize>,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

fn error_response(status: StatusCode, error: String) -> axum::response::Response {
    (status, Json(ErrorBody { error })).into_response()
}

/// Health check response - returns 200 if healthy, 503 if unhealthy
async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let health = state.health_registry.health().await;

    let status_code = match health.status {
        ComponentStatus::Healthy => StatusCode::OK,
        ComponentStatus::Degraded => StatusCode::OK, // Still accepting samples
        ComponentStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(health))
}

/// Readiness check response - returns 200 if ready, 503 if not ready
async fn readyz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let readiness = state.health_registry.readiness().await;

    let status_code = if readiness.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(readiness))
}

/// Prometheus metrics endpoint
async fn metrics() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        error!(error = %e, "Failed to encode metrics");
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            [("content-type", "text/plain; charset=utf-8")],
            Vec::new(),
        );
    }

    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        buffer,
    )
}

/// Current baselines for a node, 404 if it has none
async fn node_baselines(
    State(state): State<Arc<AppState>>,
    Path(node_id): Path<String>,
) -> axum::response::Response {
    let mut baselines: Vec<MetricBaseline> = state
        .pipeline
        .baselines()
        .node_snapshots(&node_id)
        .into_iter()
        .map(|(metric, baseline)| MetricBaseline { metric, baseline })
        .collect();

    if baselines.is_empty() {
        return error_response(
            StatusCode::NOT_FOUND,
            format!("no baseline tracked for node '{}'", node_id),
        );
    }

    baselines.sort_by_key(|b| b.metric.as_str());
    Json(NodeBaselines { node_id, baselines }).into_response()
}

/// Most recent stored samples for a node
async fn node_samples(
    State(state): State<Arc<AppState>>,
    Path(node_id): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> axum::response::Response {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_HISTORY_ROWS)
        .clamp(1, MAX_HISTORY_ROWS);

    match state.pipeline.store().recent_samples(&node_id, limit).await {
        Ok(samples) if samples.is_empty() => error_response(
            StatusCode::NOT_FOUND,
            format!("no samples stored for node '{}'", node_id),
        ),
        Ok(samples) => Json(NodeSamples { node_id, samples }).into_response(),
        Err(e) => {
            error!(node_id = %node_id, error = %e, "Failed to read sample history");
            error_response(StatusCode::SERVICE_UNAVAILABLE, e.to_string())
        }
    }
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .route("/v1/baselines/:node_id", get(node_baselines))
        .route("/v1/samples/:node_id", get(node_samples))
        .with_state(state)
}

/// Bind the API listener on all interfaces
pub async fn bind(port: u16) -> anyhow::Result<TcpListener> {
    let addr = format!("0.0.0.0:{}", port);
    TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind API address {}", addr))
}

/// Serve the API on a bound listener, stopping when `shutdown` fires
pub async fn serve(
    listener: TcpListener,
    state: Arc<AppState>,
    mut shutdown: broadcast::Receiver<()>,
) -> anyhow::Result<()> {
    let app = create_router(state);
    info!(addr = %listener.local_addr()?, "Starting API server");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
        })
        .await?;

    Ok(())
}
