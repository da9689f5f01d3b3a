//! Netwatch CLI
//!
//! Submits network-health samples to the ingestion server, either by hand,
//! from a synthetic stream or from real `ping`/`iperf3` measurements, and
//! queries server-side baselines, sample history and health.

mod client;
mod commands;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{agent, baseline, chart, health, samples, simulate, submit};
use netwatch_lib::proto::MetricsRequest;
use std::path::PathBuf;
use std::time::Duration;

/// History rows fetched by `samples` and `chart` when no limit is given
const DEFAULT_HISTORY_LIMIT: usize = 100;

/// Netwatch CLI
#[derive(Parser)]
#[command(name = "nw")]
#[command(author, version, about = "CLI for the netwatch ingestion server", long_about = None)]
pub struct Cli {
    /// HTTP API URL (can also be set via NW_API_URL env var)
    #[arg(long, env = "NW_API_URL", default_value = "http://localhost:8080")]
    pub api_url: String,

    /// gRPC endpoint URL (can also be set via NW_GRPC_URL env var)
    #[arg(long, env = "NW_GRPC_URL", default_value = "http://localhost:50051")]
    pub grpc_url: String,

    /// Per-call deadline sent with submissions, in milliseconds
    #[arg(long, env = "NW_TIMEOUT_MS")]
    pub timeout_ms: Option<u64>,

    /// Output format
    #[arg(long, short, default_value = "table")]
    pub format: output::OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Submit one sample
    Submit {
        /// Reporting node
        #[arg(long, short)]
        node_id: String,

        /// Round-trip latency in milliseconds
        #[arg(long)]
        latency: f64,

        /// Jitter in milliseconds
        #[arg(long, default_value_t = 0.0)]
        jitter: f64,

        /// Packet loss percentage (0-100)
        #[arg(long, default_value_t = 0.0)]
        packet_loss: f64,

        /// Bandwidth in Mbps
        #[arg(long, default_value_t = 0.0)]
        bandwidth: f64,

        /// Unix timestamp in seconds (defaults to now)
        #[arg(long)]
        timestamp: Option<i64>,
    },

    /// Stream random samples like a fake agent
    Simulate {
        /// Reporting node
        #[arg(long, short, default_value = "test-node")]
        node_id: String,

        /// Number of samples to send, 0 to run until interrupted
        #[arg(long, short, default_value_t = 0)]
        count: u64,

        /// Delay between samples in milliseconds
        #[arg(long, default_value_t = 1000)]
        interval_ms: u64,

        /// Seed for a reproducible sample stream
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Measure with ping (and iperf3 if configured) and submit on an interval
    Agent {
        /// Reporting node (defaults to $HOSTNAME)
        #[arg(long, short, env = "NW_NODE_ID")]
        node_id: Option<String>,

        /// Host to ping
        #[arg(long, default_value = "8.8.8.8")]
        ping_target: String,

        /// Echo requests per measurement
        #[arg(long, default_value_t = 2)]
        ping_count: u32,

        /// Seconds to wait for each reply
        #[arg(long, default_value_t = 2)]
        ping_timeout: u32,

        /// iperf3 server as host[:port]; bandwidth is reported as 0 without one
        #[arg(long)]
        iperf_server: Option<String>,

        /// Seconds between measurements
        #[arg(long, default_value_t = 10)]
        interval_secs: u64,

        /// Number of measurements, 0 to run until interrupted
        #[arg(long, short, default_value_t = 0)]
        count: u64,
    },

    /// Show a node's rolling baselines
    Baseline {
        /// Node to inspect
        node_id: String,
    },

    /// List a node's most recent stored samples
    Samples {
        /// Node to inspect
        node_id: String,

        /// Maximum rows to fetch
        #[arg(long, short, default_value_t = DEFAULT_HISTORY_LIMIT)]
        limit: usize,
    },

    /// Render SVG time series of a node's stored samples, one per metric
    Chart {
        /// Node to chart
        node_id: String,

        /// Maximum samples to plot
        #[arg(long, short, default_value_t = DEFAULT_HISTORY_LIMIT)]
        limit: usize,

        /// Directory the SVG files are written to
        #[arg(long, short, default_value = ".")]
        output_dir: PathBuf,
    },

    /// Show server health
    Health,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let timeout = cli.timeout_ms.map(Duration::from_millis);

    match cli.command {
        Commands::Submit {
            node_id,
            latency,
            jitter,
            packet_loss,
            bandwidth,
            timestamp,
        } => {
            let request = MetricsRequest {
                node_id,
                latency,
                jitter,
                packet_loss,
                bandwidth,
                timestamp: timestamp.unwrap_or_else(|| chrono::Utc::now().timestamp()),
            };
            let mut client = client::IngestClient::connect(&cli.grpc_url, timeout).await?;
            submit::submit_sample(&mut client, request, cli.format).await?;
        }
        Commands::Simulate {
            node_id,
            count,
            interval_ms,
            seed,
        } => {
            let mut client = client::IngestClient::connect(&cli.grpc_url, timeout).await?;
            simulate::run_simulation(
                &mut client,
                &node_id,
                count,
                Duration::from_millis(interval_ms.max(1)),
                seed,
                cli.format,
                commands::ctrl_c(),
            )
            .await?;
        }
        Commands::Agent {
            node_id,
            ping_target,
            ping_count,
            ping_timeout,
            iperf_server,
            interval_secs,
            count,
        } => {
            let config = agent::AgentConfig {
                node_id: node_id.unwrap_or_else(|| {
                    std::env::var("HOSTNAME").unwrap_or_else(|_| "netwatch-agent".to_string())
                }),
                ping_target,
                ping_count: ping_count.max(1),
                ping_timeout_secs: ping_timeout,
                iperf_server,
                interval: Duration::from_secs(interval_secs.max(1)),
                count,
            };
            let mut client = client::IngestClient::connect(&cli.grpc_url, timeout).await?;
            agent::run_agent(&mut client, &config, cli.format, commands::ctrl_c()).await?;
        }
        Commands::Baseline { node_id } => {
            let client = client::ApiClient::new(&cli.api_url)?;
            baseline::show_baseline(&client, &node_id, cli.format).await?;
        }
        Commands::Samples { node_id, limit } => {
            let client = client::ApiClient::new(&cli.api_url)?;
            samples::show_samples(&client, &node_id, limit, cli.format).await?;
        }
        Commands::Chart {
            node_id,
            limit,
            output_dir,
        } => {
            let client = client::ApiClient::new(&cli.api_url)?;
            chart::generate_charts(&client, &node_id, limit, &output_dir).await?;
        }
        Commands::Health => {
            let client = client::ApiClient::new(&cli.api_url)?;
            health::show_health(&client, cli.format).await?;
        }
    }

    Ok(())
}
