//! gRPC listener for sample submission

use anyhow::Context;
use netwatch_lib::{
    health::{components, HealthRegistry},
    ingest::IngestionPipeline,
    transport::MetricsGrpcService,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::transport::Server;
use tracing::{error, info};

/// Bind the gRPC address, marking transport unhealthy if it cannot be bound
pub async fn bind(addr: &str, health: &HealthRegistry) -> anyhow::Result<TcpListener> {
    match TcpListener::bind(addr).await {
        Ok(listener) => Ok(listener),
        Err(e) => {
            error!(addr = %addr, error = %e, "Failed to bind gRPC address");
            health
                .mark_unhealthy(components::TRANSPORT, format!("bind {}: {}", addr, e))
                .await;
            Err(e).with_context(|| format!("failed to bind gRPC address {}", addr))
        }
    }
}

/// Serve on a bound listener until `shutdown` fires
pub async fn serve(
    listener: TcpListener,
    pipeline: Arc<IngestionPipeline>,
    health: HealthRegistry,
    mut shutdown: broadcast::Receiver<()>,
) -> anyhow::Result<()> {
    let local_addr = listener.local_addr()?;
    info!(addr = %local_addr, "Starting gRPC server");

    let service = MetricsGrpcService::new(pipeline).into_server();
    let result = Server::builder()
        .add_service(service)
        .serve_with_incoming_shutdown(TcpListenerStream::new(listener), async move {
            let _ = shutdown.recv().await;
        })
        .await;

    if let Err(e) = &result {
        error!(error = %e, "gRPC server failed");
        health
            .mark_unhealthy(components::TRANSPORT, e.to_string())
            .await;
    }
    result.context("gRPC server failed")
}
