//! Measurement agent: runs `ping` and optionally `iperf3` on an interval and
//! submits the results

use anyhow::Result;
use colored::Colorize;
use netwatch_lib::proto::MetricsRequest;
use regex::Regex;
use serde::Deserialize;
use std::future::Future;
use std::sync::OnceLock;
use std::time::Duration;
use tokio::process::Command;

use crate::client::IngestClient;
use crate::commands::simulate::{print_line, print_summary, SubmissionSummary};
use crate::output::{print_error, print_info, print_json, print_warning, OutputFormat, SubmissionReport};

/// Loss reported when ping produced no usable summary
const TOTAL_LOSS_PERCENT: f64 = 100.0;

/// Bandwidth test length in seconds
const IPERF_DURATION_SECS: u64 = 1;

/// What the agent measures and how often
#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub node_id: String,
    pub ping_target: String,
    pub ping_count: u32,
    /// Per-reply wait passed to `ping -W`, in seconds
    pub ping_timeout_secs: u32,
    /// `host[:port]` of an iperf3 server; bandwidth is 0 without one
    pub iperf_server: Option<String>,
    pub interval: Duration,
    /// Rounds to run, 0 for no limit
    pub count: u64,
}

/// Latency figures from one ping run
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PingStats {
    /// Mean round-trip time in milliseconds
    pub latency: f64,
    /// Population standard deviation of round-trip times
    pub jitter: f64,
    pub packet_loss: f64,
}

impl PingStats {
    fn unreachable() -> Self {
        Self {
            latency: 0.0,
            jitter: 0.0,
            packet_loss: TOTAL_LOSS_PERCENT,
        }
    }
}

fn rtt_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"time[=<]([0-9]+(?:\.[0-9]+)?)").expect("valid regex"))
}

fn loss_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"([0-9]+(?:\.[0-9]+)?)% packet loss").expect("valid regex")
    })
}

/// Extract latency, jitter and loss from `ping` output
pub fn parse_ping_output(output: &str) -> PingStats {
    let times: Vec<f64> = rtt_pattern()
        .captures_iter(output)
        .filter_map(|c| c[1].parse().ok())
        .collect();

    let packet_loss = loss_pattern()
        .captures(output)
        .and_then(|c| c[1].parse().ok())
        .unwrap_or(TOTAL_LOSS_PERCENT);

    if times.is_empty() {
        return PingStats {
            latency: 0.0,
            jitter: 0.0,
            packet_loss,
        };
    }

    let n = times.len() as f64;
    let mean = times.iter().sum::<f64>() / n;
    let variance = times.iter().map(|t| (t - mean).powi(2)).sum::<f64>() / n;

    PingStats {
        latency: mean,
        jitter: variance.sqrt(),
        packet_loss,
    }
}

/// Ping `target`; an unrunnable ping reports total loss
pub async fn run_ping(target: &str, count: u32, timeout_secs: u32) -> PingStats {
    let output = Command::new("ping")
        .args([
            "-c",
            &count.to_string(),
            "-W",
            &timeout_secs.to_string(),
            target,
        ])
        .output()
        .await;

    match output {
        // ping exits non-zero on partial loss but still prints a summary
        Ok(output) => parse_ping_output(&String::from_utf8_lossy(&output.stdout)),
        Err(e) => {
            print_warning(&format!("Failed to run ping: {}", e));
            PingStats::unreachable()
        }
    }
}

#[derive(Deserialize)]
struct IperfReport {
    end: IperfEnd,
}

#[derive(Deserialize)]
struct IperfEnd {
    sum_received: IperfSum,
}

#[derive(Deserialize)]
struct IperfSum {
    bits_per_second: f64,
}

/// Received throughput in Mbps from `iperf3 -J` output
pub fn parse_iperf_json(output: &str) -> Option<f64> {
    let report: IperfReport = serde_json::from_str(output).ok()?;
    Some(report.end.sum_received.bits_per_second / 1_000_000.0)
}

/// Measure bandwidth against an iperf3 server, 0 on any failure
pub async fn run_iperf(server: &str) -> f64 {
    let (host, port) = match server.rsplit_once(':') {
        Some((host, port)) => (host, Some(port)),
        None => (server, None),
    };

    let mut command = Command::new("iperf3");
    command
        .args(["-c", host, "-t", &IPERF_DURATION_SECS.to_string(), "-J"])
        .kill_on_drop(true);
    if let Some(port) = port {
        command.args(["-p", port]);
    }

    let limit = Duration::from_secs(IPERF_DURATION_SECS + 2);
    match tokio::time::timeout(limit, command.output()).await {
        Ok(Ok(output)) if output.status.success() => {
            parse_iperf_json(&String::from_utf8_lossy(&output.stdout)).unwrap_or(0.0)
        }
        Ok(Ok(output)) => {
            print_warning(&format!("iperf3 exited with {}", output.status));
            0.0
        }
        Ok(Err(e)) => {
            print_warning(&format!("Failed to run iperf3: {}", e));
            0.0
        }
        Err(_) => {
            print_warning("iperf3 timed out");
            0.0
        }
    }
}

/// Take one set of measurements
pub async fn collect(config: &AgentConfig) -> MetricsRequest {
    let ping = run_ping(&config.ping_target, config.ping_count, config.ping_timeout_secs).await;
    let bandwidth = match &config.iperf_server {
        Some(server) => run_iperf(server).await,
        None => 0.0,
    };

    MetricsRequest {
        node_id: config.node_id.clone(),
        latency: ping.latency,
        jitter: ping.jitter,
        packet_loss: ping.packet_loss,
        bandwidth,
        timestamp: chrono::Utc::now().timestamp(),
    }
}

/// Measure and submit every interval until done or `interrupt` resolves
pub async fn run_agent(
    client: &mut IngestClient,
    config: &AgentConfig,
    format: OutputFormat,
    interrupt: impl Future<Output = ()>,
) -> Result<SubmissionSummary> {
    tokio::pin!(interrupt);
    let mut summary = SubmissionSummary::default();
    let mut ticker = tokio::time::interval(config.interval);

    if matches!(format, OutputFormat::Table) {
        print_info(&format!(
            "Measuring {} for node {} every {:?}; press Ctrl-C to stop",
            config.ping_target,
            config.node_id.cyan(),
            config.interval
        ));
    }

    loop {
        if config.count > 0 && summary.sent >= config.count {
            break;
        }

        let round = async {
            ticker.tick().await;
            let request = collect(config).await;
            let result = client.submit(request.clone()).await;
            (request, result)
        };

        let (request, result) = tokio::select! {
            round = round => round,
            _ = &mut interrupt => {
                print_warning("Interrupted");
                break;
            }
        };

        match result {
            Ok(response) => {
                let report = SubmissionReport::new(&request, &response);
                summary.record(&report);
                match format {
                    OutputFormat::Json => print_json(&report)?,
                    OutputFormat::Table => print_line(&report),
                }
            }
            Err(e) => {
                summary.record_failure();
                print_error(&format!("{:#}", e));
            }
        }
    }

    if matches!(format, OutputFormat::Table) {
        print_summary(&summary);
    }
    Ok(summary)
}
