//! Stored sample history

use anyhow::Result;
use colored::Colorize;
use tabled::Tabled;

use crate::client::{ApiClient, NodeSamples};
use crate::output::{
    format_mbps, format_ms, format_percent, format_timestamp, print_json, OutputFormat,
};

#[derive(Tabled)]
struct SampleRow {
    #[tabled(rename = "Time")]
    time: String,
    #[tabled(rename = "Latency")]
    latency: String,
    #[tabled(rename = "Jitter")]
    jitter: String,
    #[tabled(rename = "Loss")]
    packet_loss: String,
    #[tabled(rename = "Bandwidth")]
    bandwidth: String,
    #[tabled(rename = "Z")]
    z_score: String,
    #[tabled(rename = "Flags")]
    flags: String,
}

fn rows(view: &NodeSamples) -> Vec<SampleRow> {
    view.samples
        .iter()
        .map(|s| {
            let mut flags = Vec::new();
            if s.is_latency_spike {
                flags.push("spike");
            }
            if s.is_packet_loss {
                flags.push("loss");
            }
            SampleRow {
                time: format_timestamp(s.timestamp),
                latency: format_ms(s.latency),
                jitter: format_ms(s.jitter),
                packet_loss: format_percent(s.packet_loss),
                bandwidth: format_mbps(s.bandwidth),
                z_score: format!("{:+.2}", s.z_score),
                flags: flags.join(","),
            }
        })
        .collect()
}

/// List a node's most recent stored samples
pub async fn show_samples(
    client: &ApiClient,
    node_id: &str,
    limit: usize,
    format: OutputFormat,
) -> Result<()> {
    let view = client.node_samples(node_id, limit).await?;

    match format {
        OutputFormat::Json => print_json(&view)?,
        OutputFormat::Table => {
            println!("{}", "Stored Samples".bold());
            println!("{}", "=".repeat(50));
            println!("Node: {} ({} rows)", view.node_id.cyan(), view.samples.len());
            println!();

            let table = tabled::Table::new(rows(&view))
                .with(tabled::settings::Style::rounded())
                .to_string();
            println!("{}", table);
        }
    }

    Ok(())
}
