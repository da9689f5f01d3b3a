//! Single-sample submission

use anyhow::Result;
use colored::Colorize;
use netwatch_lib::proto::MetricsRequest;

use crate::client::IngestClient;
use crate::output::{
    color_z_score, format_mbps, format_ms, format_percent, format_timestamp, print_error,
    print_json, print_success, OutputFormat, SubmissionReport,
};

/// Send one sample and print the server's verdict
pub async fn submit_sample(
    client: &mut IngestClient,
    request: MetricsRequest,
    format: OutputFormat,
) -> Result<()> {
    let response = client.submit(request.clone()).await?;
    let report = SubmissionReport::new(&request, &response);

    match format {
        OutputFormat::Json => print_json(&report)?,
        OutputFormat::Table => print_report(&report),
    }

    if !report.success {
        anyhow::bail!("sample rejected by server");
    }
    Ok(())
}

fn print_report(report: &SubmissionReport) {
    println!("{}", "Sample".bold());
    println!("{}", "=".repeat(50));
    println!("Node:         {}", report.node_id.cyan());
    println!("Timestamp:    {}", format_timestamp(report.timestamp));
    println!("Latency:      {}", format_ms(report.latency));
    println!("Jitter:       {}", format_ms(report.jitter));
    println!("Packet Loss:  {}", format_percent(report.packet_loss));
    println!("Bandwidth:    {}", format_mbps(report.bandwidth));
    println!();

    if !report.success {
        let kind = report.error_kind.as_deref().unwrap_or("ERROR_KIND_UNSPECIFIED");
        print_error(&format!("{}: {}", kind, report.message));
        return;
    }

    println!("{}", "Verdict".bold());
    println!("{}", "-".repeat(50));
    println!("Classification: {}", report.verdict_label());
    println!("Z-Score:        {}", color_z_score(report.z_score));
    println!();
    print_success("Sample stored");
}
