//! Network-health ingestion library
//!
//! This crate provides the core functionality for:
//! - Validating network-health samples submitted by remote nodes
//! - Rolling per-node baselines and anomaly classification
//! - The ingestion pipeline and its storage backends
//! - The gRPC transport, health checks and observability

pub mod anomaly;
pub mod error;
pub mod health;
pub mod ingest;
pub mod models;
pub mod observability;
pub mod proto;
pub mod storage;
pub mod transport;

pub use error::{ConfigurationError, IngestError, StorageError, ValidationError};
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
    StorageHealth, StorageTransition,
};
pub use ingest::{IngestOutcome, IngestionPipeline, IngestionPipelineBuilder};
pub use models::*;
pub use observability::{IngestMetrics, StructuredLogger};
