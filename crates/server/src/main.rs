//! Netwatch server - network-health sample ingestion
//!
//! Accepts samples over gRPC, classifies them against per-node
//! baselines and persists them with their verdict.

use anyhow::{Context, Result};
use netwatch_lib::{
    health::{components, HealthRegistry},
    ingest::IngestionPipeline,
    observability::{IngestMetrics, StructuredLogger},
    storage::{MemorySampleStore, PgSampleStore, SampleStore},
};
use netwatch_server::{
    api,
    config::{ServerConfig, StorageBackend},
    grpc, runtime,
};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!("Starting netwatch-server");

    let config = ServerConfig::load()?;
    info!(instance = %config.instance, "Server configured");

    let health_registry = HealthRegistry::new();
    health_registry.register(components::INGEST).await;
    health_registry.register(components::STORAGE).await;
    health_registry.register(components::TRANSPORT).await;

    let metrics = IngestMetrics::new();
    let logger = StructuredLogger::new(&config.instance);

    let store = open_store(&config).await?;
    store
        .ping()
        .await
        .with_context(|| format!("{} storage is not reachable", store.backend()))?;

    let mut builder = IngestionPipeline::builder(store.clone())
        .classifier_config(config.classifier_config())
        .max_tracked_keys(config.max_tracked_keys)
        .dedup_window(config.dedup_window())
        .health_registry(health_registry.clone())
        .instance(config.instance.clone());
    if let Some(timeout) = config.default_request_timeout() {
        builder = builder.default_timeout(timeout);
    }
    let pipeline = Arc::new(builder.build()?);

    // Bind both listeners before reporting ready so an address in use stops
    // startup instead of leaving the process up without an ingestion endpoint.
    let grpc_listener = grpc::bind(&config.grpc_addr, &health_registry).await?;
    let api_listener = api::bind(config.api_port).await?;

    let (shutdown_tx, _) = broadcast::channel(1);
    let app_state = Arc::new(api::AppState::new(
        health_registry.clone(),
        metrics.clone(),
        pipeline.clone(),
    ));

    let mut tasks = runtime::ServerTasks::new();
    tasks.spawn({
        let shutdown = shutdown_tx.subscribe();
        async move { ("api", api::serve(api_listener, app_state, shutdown).await) }
    });
    tasks.spawn({
        let pipeline = pipeline.clone();
        let health = health_registry.clone();
        let shutdown = shutdown_tx.subscribe();
        async move {
            (
                components::TRANSPORT,
                grpc::serve(grpc_listener, pipeline, health, shutdown).await,
            )
        }
    });

    health_registry.set_ready(true).await;
    logger.log_startup(SERVER_VERSION, &config.grpc_addr, store.backend());

    let signal = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => logger.log_shutdown("SIGINT received"),
            Err(e) => {
                warn!(error = %e, "Failed to listen for SIGINT");
                std::future::pending::<()>().await
            }
        }
    };
    runtime::supervise(tasks, shutdown_tx, &health_registry, signal).await?;

    info!("Shutdown complete");
    Ok(())
}

async fn open_store(config: &ServerConfig) -> Result<Arc<dyn SampleStore>> {
    match config.backend()? {
        StorageBackend::Postgres => {
            let url = config
                .database_url
                .as_deref()
                .context("database_url is required for the postgres backend")?;
            let store = PgSampleStore::connect(url, config.db_max_connections)
                .await
                .context("failed to connect to PostgreSQL")?;
            store
                .ensure_schema()
                .await
                .context("failed to prepare database schema")?;
            info!(max_connections = config.db_max_connections, "Connected to PostgreSQL");
            Ok(Arc::new(store))
        }
        StorageBackend::Memory => {
            warn!("Using in-memory storage; samples are lost on restart");
            Ok(Arc::new(MemorySampleStore::new()))
        }
    }
}
