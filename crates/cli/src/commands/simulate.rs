//! Synthetic agent that streams random samples

use anyhow::Result;
use colored::Colorize;
use netwatch_lib::proto::MetricsRequest;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::future::Future;
use std::ops::Range;
use std::time::Duration;

use crate::client::IngestClient;
use crate::output::{
    color_z_score, format_ms, format_percent, print_error, print_info, print_json, print_warning,
    OutputFormat, SubmissionReport,
};

pub const LATENCY_RANGE_MS: Range<f64> = 10.0..150.0;
pub const JITTER_RANGE_MS: Range<f64> = 0.0..20.0;
pub const PACKET_LOSS_RANGE_PERCENT: Range<f64> = 0.0..5.0;
pub const BANDWIDTH_RANGE_MBPS: Range<f64> = 5.0..150.0;

/// Random sample source
pub struct SampleGenerator {
    rng: StdRng,
}

impl SampleGenerator {
    /// A fixed seed makes the stream reproducible
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self { rng }
    }

    pub fn next_request(&mut self, node_id: &str, timestamp: i64) -> MetricsRequest {
        MetricsRequest {
            node_id: node_id.to_string(),
            latency: self.rng.gen_range(LATENCY_RANGE_MS),
            jitter: self.rng.gen_range(JITTER_RANGE_MS),
            packet_loss: self.rng.gen_range(PACKET_LOSS_RANGE_PERCENT),
            bandwidth: self.rng.gen_range(BANDWIDTH_RANGE_MBPS),
            timestamp,
        }
    }
}

/// Running totals for a stream of submissions
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SubmissionSummary {
    pub sent: u64,
    pub accepted: u64,
    pub rejected: u64,
    pub failed: u64,
    pub latency_spikes: u64,
    pub packet_loss_events: u64,
}

impl SubmissionSummary {
    pub fn record(&mut self, report: &SubmissionReport) {
        self.sent += 1;
        if !report.success {
            self.rejected += 1;
            return;
        }
        self.accepted += 1;
        if report.is_latency_spike {
            self.latency_spikes += 1;
        }
        if report.is_packet_loss {
            self.packet_loss_events += 1;
        }
    }

    pub fn record_failure(&mut self) {
        self.sent += 1;
        self.failed += 1;
    }
}

/// Stream `count` samples (0 for no limit) until done or `interrupt` resolves
///
/// An interrupt also abandons a submission that is still in flight.
pub async fn run_simulation(
    client: &mut IngestClient,
    node_id: &str,
    count: u64,
    interval: Duration,
    seed: Option<u64>,
    format: OutputFormat,
    interrupt: impl Future<Output = ()>,
) -> Result<SubmissionSummary> {
    tokio::pin!(interrupt);
    let mut generator = SampleGenerator::new(seed);
    let mut summary = SubmissionSummary::default();
    let mut ticker = tokio::time::interval(interval);

    if matches!(format, OutputFormat::Table) {
        print_info(&format!(
            "Simulating node {} every {:?}; press Ctrl-C to stop",
            node_id.cyan(),
            interval
        ));
    }

    loop {
        if count > 0 && summary.sent >= count {
            break;
        }

        tokio::select! {
            _ = ticker.tick() => {}
            _ = &mut interrupt => {
                print_warning("Interrupted");
                break;
            }
        }

        let request = generator.next_request(node_id, chrono::Utc::now().timestamp());
        let result = tokio::select! {
            result = client.submit(request.clone()) => result,
            _ = &mut interrupt => {
                print_warning("Interrupted while submitting");
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

pub(crate) fn print_line(report: &SubmissionReport) {
    let status = if report.success {
        "✓".green()
    } else {
        "✗".red()
    };
    println!(
        "{} [{}] latency={} jitter={} loss={} z={} {}",
        status,
        report.timestamp,
        format_ms(report.latency),
        format_ms(report.jitter),
        format_percent(report.packet_loss),
        color_z_score(report.z_score),
        report.verdict_label()
    );
}

pub(crate) fn print_summary(summary: &SubmissionSummary) {
    println!();
    println!("{}", "Submission Summary".bold());
    println!("{}", "=".repeat(40));
    println!("Sent:                {}", summary.sent);
    println!("Accepted:            {}", summary.accepted.to_string().green());
    println!("Rejected:            {}", summary.rejected);
    println!("Transport Failures:  {}", summary.failed);
    println!("Latency Spikes:      {}", summary.latency_spikes);
    println!("Packet Loss Events:  {}", summary.packet_loss_events);
}

#[cfg(test)]
mod tests {
    use super::*;
    use netwatch_lib::anomaly::AnomalyVerdict;
    use netwatch_lib::ingest::IngestionPipeline;
    use netwatch_lib::models::Sample;
    use netwatch_lib::proto::MetricsResponse;
    use netwatch_lib::storage::{async_trait, SampleStore};
    use netwatch_lib::transport::MetricsGrpcService;
    use netwatch_lib::StorageError;
    use std::sync::Arc;
    use tokio::net::TcpListener;
    use tokio_stream::wrappers::TcpListenerStream;

    /// Store whose writes never finish
    struct StalledStore;

    #[async_trait]
    impl SampleStore for StalledStore {
        async fn insert_sample(&self, _: &Sample, _: &AnomalyVerdict) -> Result<(), StorageError> {
            std::future::pending().await
        }

        fn backend(&self) -> &'static str {
            "stalled"
        }
    }

    async fn stalled_server() -> String {
        let pipeline = IngestionPipeline::builder(Arc::new(StalledStore)).build().unwrap();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(
            tonic::transport::Server::builder()
                .add_service(MetricsGrpcService::new(Arc::new(pipeline)).into_server())
                .serve_with_incoming(TcpListenerStream::new(listener)),
        );
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn test_interrupt_during_submit_stops_simulation() {
        let url = stalled_server().await;
        let mut client = IngestClient::connect(&url, None).await.unwrap();

        let interrupt = tokio::time::sleep(Duration::from_millis(200));
        let summary = tokio::time::timeout(
            Duration::from_secs(5),
            run_simulation(
                &mut client,
                "sim",
                0,
                Duration::from_millis(1),
                Some(3),
                OutputFormat::Json,
                interrupt,
            ),
        )
        .await
        .expect("interrupt was lost while a submission was in flight")
        .unwrap();

        assert_eq!(summary.accepted, 0);
        assert_eq!(summary.sent, 0);
    }

    #[test]
    fn test_generated_values_within_ranges() {
        let mut generator = SampleGenerator::new(Some(7));
        for ts in 0..500 {
            let req = generator.next_request("sim", 1_700_000_000 + ts);
            assert!(LATENCY_RANGE_MS.contains(&req.latency));
            assert!(JITTER_RANGE_MS.contains(&req.jitter));
            assert!(PACKET_LOSS_RANGE_PERCENT.contains(&req.packet_loss));
            assert!(BANDWIDTH_RANGE_MBPS.contains(&req.bandwidth));
            assert_eq!(req.node_id, "sim");
        }
    }

    #[test]
    fn test_seeded_generator_is_reproducible() {
        let mut a = SampleGenerator::new(Some(42));
        let mut b = SampleGenerator::new(Some(42));
        for _ in 0..10 {
            assert_eq!(a.next_request("n", 1), b.next_request("n", 1));
        }
    }

    #[test]
    fn test_summary_counts() {
        let request = SampleGenerator::new(Some(1)).next_request("n", 1);
        let mut summary = SubmissionSummary::default();

        let spike = MetricsResponse {
            success: true,
            is_latency_spike: true,
            z_score: 4.2,
            ..Default::default()
        };
        let rejected = MetricsResponse {
            success: false,
            ..Default::default()
        };
        summary.record(&SubmissionReport::new(&request, &spike));
        summary.record(&SubmissionReport::new(&request, &rejected));
        summary.record_failure();

        assert_eq!(
            summary,
            SubmissionSummary {
                sent: 3,
                accepted: 1,
                rejected: 1,
                failed: 1,
                latency_spikes: 1,
                packet_loss_events: 0,
            }
        );
    }
}
