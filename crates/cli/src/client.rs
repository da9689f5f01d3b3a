//! Clients for the netwatch server: gRPC for submissions, HTTP for queries

use anyhow::{Context, Result};
use netwatch_lib::proto::{MetricsRequest, MetricsResponse, MetricsServiceClient};
use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tonic::transport::{Channel, Endpoint};
use url::Url;

/// HTTP client for the server's query API
pub struct ApiClient {
    client: Client,
    base_url: Url,
}

impl ApiClient {
    /// Create a new API client
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        let base_url = Url::parse(base_url).context("Invalid API URL")?;

        Ok(Self { client, base_url })
    }

    /// Make a GET request
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.base_url.join(path).context("Invalid path")?;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .context("Failed to send request")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("API error ({}): {}", status, body);
        }

        response.json().await.context("Failed to parse response")
    }

    pub async fn node_baselines(&self, node_id: &str) -> Result<NodeBaselines> {
        self.get(&format!("v1/baselines/{}", node_id)).await
    }

    /// Up to `limit` of a node's most recent stored samples, oldest first
    pub async fn node_samples(&self, node_id: &str, limit: usize) -> Result<NodeSamples> {
        self.get(&format!("v1/samples/{}?limit={}", node_id, limit))
            .await
    }

    /// Server health; a 503 still carries a readable body
    pub async fn health(&self) -> Result<HealthReport> {
        let url = self.base_url.join("healthz").context("Invalid path")?;
        let response = self
            .client
            .get(url)
            .send()
            .await
            .context("Failed to send request")?;
        response.json().await.context("Failed to parse response")
    }
}

/// gRPC client for sample submission
pub struct IngestClient {
    inner: MetricsServiceClient<Channel>,
    timeout: Option<Duration>,
}

impl IngestClient {
    /// Connect to the server; `timeout` is sent as the per-call deadline
    pub async fn connect(grpc_url: &str, timeout: Option<Duration>) -> Result<Self> {
        let endpoint = Endpoint::from_shared(grpc_url.to_string())
            .context("Invalid gRPC URL")?
            .connect_timeout(Duration::from_secs(5));
        let channel = endpoint
            .connect()
            .await
            .with_context(|| format!("Failed to connect to {}", grpc_url))?;

        Ok(Self {
            inner: MetricsServiceClient::new(channel),
            timeout,
        })
    }

    pub async fn submit(&mut self, sample: MetricsRequest) -> Result<MetricsResponse> {
        let mut request = tonic::Request::new(sample);
        if let Some(timeout) = self.timeout {
            request.set_timeout(timeout);
        }

        let response = self
            .inner
            .submit_metrics(request)
            .await
            .context("SubmitMetrics failed")?;
        Ok(response.into_inner())
    }
}

// API response types

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricBaseline {
    pub metric: String,
    pub mean: f64,
    pub stddev: f64,
    pub count: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeBaselines {
    pub node_id: String,
    pub baselines: Vec<MetricBaseline>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentReport {
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub since: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredSample {
    pub node_id: String,
    pub latency: f64,
    pub jitter: f64,
    pub packet_loss: f64,
    pub bandwidth: f64,
    pub timestamp: i64,
    pub is_latency_spike: bool,
    pub is_packet_loss: bool,
    pub z_score: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeSamples {
    pub node_id: String,
    pub samples: Vec<StoredSample>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageReport {
    #[serde(default)]
    pub consecutive_failures: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error_at: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: String,
    pub components: HashMap<String, ComponentReport>,
    #[serde(default)]
    pub storage: StorageReport,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_node_baselines_parsed() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/v1/baselines/edge-1")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"node_id":"edge-1","baselines":[{"metric":"latency","mean":12.5,"stddev":1.5,"count":40}]}"#,
            )
            .create_async()
            .await;

        let client = ApiClient::new(&server.url()).unwrap();
        let view = client.node_baselines("edge-1").await.unwrap();

        mock.assert_async().await;
        assert_eq!(view.node_id, "edge-1");
        assert_eq!(view.baselines[0].metric, "latency");
        assert_eq!(view.baselines[0].count, 40);
    }

    #[tokio::test]
    async fn test_node_samples_passes_limit() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/v1/samples/edge-1?limit=2")
            .with_status(200)
            .with_body(
                r#"{"node_id":"edge-1","samples":[
                    {"node_id":"edge-1","latency":10.0,"jitter":1.0,"packet_loss":0.0,"bandwidth":50.0,"timestamp":1,"is_latency_spike":false,"is_packet_loss":false,"z_score":0.0},
                    {"node_id":"edge-1","latency":90.0,"jitter":1.0,"packet_loss":9.0,"bandwidth":50.0,"timestamp":2,"is_latency_spike":true,"is_packet_loss":true,"z_score":5.5}
                ]}"#,
            )
            .create_async()
            .await;

        let client = ApiClient::new(&server.url()).unwrap();
        let view = client.node_samples("edge-1", 2).await.unwrap();

        mock.assert_async().await;
        assert_eq!(view.samples.len(), 2);
        assert!(view.samples[1].is_latency_spike);
        assert_eq!(view.samples[1].z_score, 5.5);
    }

    #[tokio::test]
    async fn test_not_found_is_an_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/v1/baselines/ghost")
            .with_status(404)
            .with_body(r#"{"error":"no baseline tracked for node 'ghost'"}"#)
            .create_async()
            .await;

        let client = ApiClient::new(&server.url()).unwrap();
        let err = client.node_baselines("ghost").await.unwrap_err();
        assert!(err.to_string().contains("404"));
    }

    #[tokio::test]
    async fn test_health_reads_unavailable_body() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/healthz")
            .with_status(503)
            .with_body(
                r#"{"status":"unhealthy","components":{"transport":{"status":"unhealthy","message":"bind failed","since":1}},"storage":{"consecutive_failures":2,"last_error":"connection refused","last_error_at":5}}"#,
            )
            .create_async()
            .await;

        let client = ApiClient::new(&server.url()).unwrap();
        let report = client.health().await.unwrap();
        assert_eq!(report.status, "unhealthy");
        assert_eq!(
            report.components["transport"].message.as_deref(),
            Some("bind failed")
        );
        assert_eq!(report.storage.consecutive_failures, 2);
        assert_eq!(report.storage.last_error.as_deref(), Some("connection refused"));
    }

    #[test]
    fn test_invalid_api_url_rejected() {
        assert!(ApiClient::new("not a url").is_err());
    }
}
