//! Server configuration

use anyhow::{Context, Result};
use netwatch_lib::anomaly::{
    ClassifierConfig, DEFAULT_DEDUP_WINDOW_SECS, DEFAULT_MAX_TRACKED_KEYS,
    DEFAULT_PACKET_LOSS_THRESHOLD, DEFAULT_SPIKE_Z_THRESHOLD,
};
use netwatch_lib::storage::DEFAULT_MAX_CONNECTIONS;
use netwatch_lib::ConfigurationError;
use serde::Deserialize;
use std::str::FromStr;
use std::time::Duration;

/// Environment variable naming an explicit config file
pub const CONFIG_PATH_ENV: &str = "NETWATCH_CONFIG";

/// Config file looked up in the working directory when none is named
const DEFAULT_CONFIG_FILE: &str = "netwatch.toml";

/// Where accepted samples are persisted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Postgres,
    Memory,
}

impl FromStr for StorageBackend {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(StorageBackend::Postgres),
            "memory" => Ok(StorageBackend::Memory),
            other => Err(ConfigurationError::UnknownStorageBackend(other.to_string())),
        }
    }
}

/// Server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Instance name attached to structured logs
    #[serde(default = "default_instance")]
    pub instance: String,

    /// gRPC listen address
    #[serde(default = "default_grpc_addr")]
    pub grpc_addr: String,

    /// API server port for health/metrics/baselines
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    #[serde(default)]
    pub database_url: Option<String>,

    /// `postgres` or `memory`
    #[serde(default = "default_storage_backend")]
    pub storage_backend: String,

    #[serde(default = "default_db_max_connections")]
    pub db_max_connections: u32,

    #[serde(default = "default_spike_z_threshold")]
    pub spike_z_threshold: f64,

    /// Packet loss percentage above which a sample is a loss event
    #[serde(default = "default_packet_loss_threshold")]
    pub packet_loss_threshold: f64,

    /// Bound on tracked baselines, 0 for unbounded
    #[serde(default = "default_max_tracked_keys")]
    pub max_tracked_keys: usize,

    #[serde(default = "default_alert_dedup_window")]
    pub alert_dedup_window_secs: u64,

    /// Storage deadline for callers that send no `grpc-timeout`
    #[serde(default = "default_request_timeout")]
    pub default_request_timeout_ms: u64,
}

fn default_instance() -> String {
    std::env::var("HOSTNAME").unwrap_or_else(|_| "netwatch".to_string())
}

fn default_grpc_addr() -> String {
    "0.0.0.0:50051".to_string()
}

fn default_api_port() -> u16 {
    8080
}

fn default_storage_backend() -> String {
    "postgres".to_string()
}

fn default_db_max_connections() -> u32 {
    DEFAULT_MAX_CONNECTIONS
}

fn default_spike_z_threshold() -> f64 {
    DEFAULT_SPIKE_Z_THRESHOLD
}

fn default_packet_loss_threshold() -> f64 {
    DEFAULT_PACKET_LOSS_THRESHOLD
}

fn default_max_tracked_keys() -> usize {
    DEFAULT_MAX_TRACKED_KEYS
}

fn default_alert_dedup_window() -> u64 {
    DEFAULT_DEDUP_WINDOW_SECS
}

fn default_request_timeout() -> u64 {
    5000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            instance: default_instance(),
            grpc_addr: default_grpc_addr(),
            api_port: default_api_port(),
            database_url: None,
            storage_backend: default_storage_backend(),
            db_max_connections: default_db_max_connections(),
            spike_z_threshold: default_spike_z_threshold(),
            packet_loss_threshold: default_packet_loss_threshold(),
            max_tracked_keys: default_max_tracked_keys(),
            alert_dedup_window_secs: default_alert_dedup_window(),
            default_request_timeout_ms: default_request_timeout(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from an optional TOML file and `NETWATCH_*` env vars
    ///
    /// Environment values override file values.
    pub fn load() -> Result<Self> {
        let (path, required) = match std::env::var(CONFIG_PATH_ENV) {
            Ok(path) => (path, true),
            Err(_) => (DEFAULT_CONFIG_FILE.to_string(), false),
        };

        let config = config::Config::builder()
            .add_source(config::File::with_name(&path).required(required))
            .add_source(config::Environment::with_prefix("NETWATCH").try_parsing(true))
            .build()
            .with_context(|| format!("failed to read configuration from {}", path))?;

        let config: ServerConfig = config
            .try_deserialize()
            .context("invalid configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        self.classifier_config().validate()?;
        if self.backend()? == StorageBackend::Postgres
            && self
                .database_url
                .as_deref()
                .map_or(true, |url| url.trim().is_empty())
        {
            return Err(ConfigurationError::Missing("database_url"));
        }
        Ok(())
    }

    pub fn backend(&self) -> Result<StorageBackend, ConfigurationError> {
        self.storage_backend.parse()
    }

    pub fn classifier_config(&self) -> ClassifierConfig {
        ClassifierConfig {
            spike_z_threshold: self.spike_z_threshold,
            packet_loss_threshold: self.packet_loss_threshold,
        }
    }

    pub fn dedup_window(&self) -> Duration {
        Duration::from_secs(self.alert_dedup_window_secs)
    }

    /// `None` when set to 0
    pub fn default_request_timeout(&self) -> Option<Duration> {
        (self.default_request_timeout_ms > 0)
            .then(|| Duration::from_millis(self.default_request_timeout_ms))
    }
}
