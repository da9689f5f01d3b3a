//! Component health for the ingestion server
//!
//! Transport and ingest components are marked directly by whoever owns them.
//! Storage health is derived from write outcomes: the pipeline reports every
//! failed or successful write and the registry decides when storage moves
//! between healthy and degraded.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Display;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Component names for health tracking
pub mod components {
    pub const INGEST: &str = "ingest";
    pub const STORAGE: &str = "storage";
    pub const TRANSPORT: &str = "transport";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentStatus {
    Healthy,
    /// Samples are still accepted but some are not being stored
    Degraded,
    Unhealthy,
}

impl ComponentStatus {
    pub fn is_operational(&self) -> bool {
        *self != ComponentStatus::Unhealthy
    }
}

/// Status of one component and when it entered that status
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub status: ComponentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Unix seconds of the last status change
    pub since: i64,
}

impl ComponentHealth {
    fn new(status: ComponentStatus, message: Option<String>) -> Self {
        Self {
            status,
            message,
            since: chrono::Utc::now().timestamp(),
        }
    }
}

/// Outcome history of storage writes
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageHealth {
    /// Failed writes since the last successful one
    pub consecutive_failures: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    /// Unix seconds of the last failed write
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error_at: Option<i64>,
}

/// Storage status change caused by a reported write outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageTransition {
    Degraded,
    Recovered,
}

/// Body of `/healthz`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Worst status across all components
    pub status: ComponentStatus,
    pub components: BTreeMap<String, ComponentHealth>,
    pub storage: StorageHealth,
}

/// Body of `/readyz`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Default)]
struct RegistryState {
    components: BTreeMap<String, ComponentHealth>,
    storage: StorageHealth,
    ready: bool,
}

impl RegistryState {
    fn overall(&self) -> ComponentStatus {
        self.components
            .values()
            .map(|c| c.status)
            .max()
            .unwrap_or(ComponentStatus::Healthy)
    }
}

/// Shared component health, cloned into every task that reports or serves it
///
/// All state sits behind one lock so a storage outcome updates the failure
/// history and the component status together.
#[derive(Debug, Clone, Default)]
pub struct HealthRegistry {
    state: Arc<RwLock<RegistryState>>,
}

impl HealthRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a component as healthy
    pub async fn register(&self, name: &str) {
        self.state.write().await.components.insert(
            name.to_string(),
            ComponentHealth::new(ComponentStatus::Healthy, None),
        );
    }

    /// Mark a component as failed
    pub async fn mark_unhealthy(&self, name: &str, message: impl Into<String>) {
        self.state.write().await.components.insert(
            name.to_string(),
            ComponentHealth::new(ComponentStatus::Unhealthy, Some(message.into())),
        );
    }

    /// Report a failed storage write
    ///
    /// Returns `Some(Degraded)` only for the failure that moved storage out
    /// of the healthy state. An unhealthy storage component stays unhealthy.
    pub async fn record_storage_failure(&self, error: impl Display) -> Option<StorageTransition> {
        let message = error.to_string();
        let mut state = self.state.write().await;

        state.storage.consecutive_failures += 1;
        state.storage.last_error = Some(message.clone());
        state.storage.last_error_at = Some(chrono::Utc::now().timestamp());

        let current = state.components.get(components::STORAGE).map(|c| c.status);
        match current {
            Some(ComponentStatus::Unhealthy) => None,
            Some(ComponentStatus::Degraded) => {
                if let Some(storage) = state.components.get_mut(components::STORAGE) {
                    storage.message = Some(message);
                }
                None
            }
            Some(ComponentStatus::Healthy) | None => {
                state.components.insert(
                    components::STORAGE.to_string(),
                    ComponentHealth::new(ComponentStatus::Degraded, Some(message)),
                );
                Some(StorageTransition::Degraded)
            }
        }
    }

    /// Report a successful storage write
    ///
    /// Returns `Some(Recovered)` only for the write that ended a degraded
    /// period.
    pub async fn record_storage_success(&self) -> Option<StorageTransition> {
        {
            let state = self.state.read().await;
            let degraded = state
                .components
                .get(components::STORAGE)
                .is_some_and(|c| c.status == ComponentStatus::Degraded);
            if state.storage.consecutive_failures == 0 && !degraded {
                return None;
            }
        }

        let mut state = self.state.write().await;
        state.storage.consecutive_failures = 0;
        match state.components.get(components::STORAGE) {
            Some(storage) if storage.status == ComponentStatus::Degraded => {
                state.components.insert(
                    components::STORAGE.to_string(),
                    ComponentHealth::new(ComponentStatus::Healthy, None),
                );
                Some(StorageTransition::Recovered)
            }
            _ => None,
        }
    }

    pub async fn storage(&self) -> StorageHealth {
        self.state.read().await.storage.clone()
    }

    /// Current status of one component
    pub async fn status(&self, name: &str) -> Option<ComponentStatus> {
        self.state.read().await.components.get(name).map(|c| c.status)
    }

    pub async fn set_ready(&self, ready: bool) {
        self.state.write().await.ready = ready;
    }

    pub async fn health(&self) -> HealthResponse {
        let state = self.state.read().await;
        HealthResponse {
            status: state.overall(),
            components: state.components.clone(),
            storage: state.storage.clone(),
        }
    }

    pub async fn readiness(&self) -> ReadinessResponse {
        let state = self.state.read().await;
        let reason = if !state.ready {
            Some("Server not accepting samples")
        } else if state.overall() == ComponentStatus::Unhealthy {
            Some("Critical component unhealthy")
        } else {
            None
        };

        ReadinessResponse {
            ready: reason.is_none(),
            reason: reason.map(str::to_string),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn registry() -> HealthRegistry {
        let registry = HealthRegistry::new();
        for name in [components::INGEST, components::STORAGE, components::TRANSPORT] {
            registry.register(name).await;
        }
        registry
    }

    #[tokio::test]
    async fn test_initial_state() {
        let registry = HealthRegistry::new();
        let health = registry.health().await;

        assert_eq!(health.status, ComponentStatus::Healthy);
        assert!(health.components.is_empty());
        assert_eq!(health.storage, StorageHealth::default());
    }

    #[tokio::test]
    async fn test_first_storage_failure_degrades() {
        let registry = registry().await;

        let first = registry.record_storage_failure("connection refused").await;
        let second = registry.record_storage_failure("pool timed out").await;

        assert_eq!(first, Some(StorageTransition::Degraded));
        assert_eq!(second, None);

        let health = registry.health().await;
        assert_eq!(health.status, ComponentStatus::Degraded);
        assert!(health.status.is_operational());
        assert_eq!(health.storage.consecutive_failures, 2);
        assert_eq!(health.storage.last_error.as_deref(), Some("pool timed out"));
        assert!(health.storage.last_error_at.is_some());
        assert_eq!(
            health.components[components::STORAGE].message.as_deref(),
            Some("pool timed out")
        );
    }

    #[tokio::test]
    async fn test_success_recovers_once() {
        let registry = registry().await;
        assert_eq!(registry.record_storage_success().await, None);

        registry.record_storage_failure("connection refused").await;
        assert_eq!(
            registry.record_storage_success().await,
            Some(StorageTransition::Recovered)
        );
        assert_eq!(registry.record_storage_success().await, None);

        let storage = registry.storage().await;
        assert_eq!(storage.consecutive_failures, 0);
        // The last error is kept after recovery
        assert_eq!(storage.last_error.as_deref(), Some("connection refused"));
        assert_eq!(
            registry.status(components::STORAGE).await,
            Some(ComponentStatus::Healthy)
        );
    }

    #[tokio::test]
    async fn test_unhealthy_storage_not_downgraded_by_failures() {
        let registry = registry().await;
        registry
            .mark_unhealthy(components::STORAGE, "schema missing")
            .await;

        assert_eq!(registry.record_storage_failure("insert failed").await, None);
        assert_eq!(registry.record_storage_success().await, None);
        assert_eq!(
            registry.status(components::STORAGE).await,
            Some(ComponentStatus::Unhealthy)
        );
    }

    #[tokio::test]
    async fn test_concurrent_failures_report_one_transition() {
        let registry = registry().await;

        let tasks: Vec<_> = (0..32)
            .map(|i| {
                let registry = registry.clone();
                tokio::spawn(async move { registry.record_storage_failure(format!("e{}", i)).await })
            })
            .collect();

        let mut transitions = 0;
        for task in tasks {
            if task.await.unwrap().is_some() {
                transitions += 1;
            }
        }

        assert_eq!(transitions, 1);
        assert_eq!(registry.storage().await.consecutive_failures, 32);
    }

    #[tokio::test]
    async fn test_transport_failure_is_unhealthy() {
        let registry = registry().await;
        registry
            .mark_unhealthy(components::TRANSPORT, "gRPC listener stopped")
            .await;

        let health = registry.health().await;
        assert_eq!(health.status, ComponentStatus::Unhealthy);
        assert!(!health.status.is_operational());
    }

    #[tokio::test]
    async fn test_readiness() {
        let registry = registry().await;
        assert!(!registry.readiness().await.ready);

        registry.set_ready(true).await;
        assert!(registry.readiness().await.ready);

        registry.record_storage_failure("connection refused").await;
        assert!(registry.readiness().await.ready);

        registry.mark_unhealthy(components::TRANSPORT, "bind failed").await;
        let readiness = registry.readiness().await;
        assert!(!readiness.ready);
        assert_eq!(readiness.reason.as_deref(), Some("Critical component unhealthy"));
    }
}
