//! Baseline inspection

use anyhow::Result;
use colored::Colorize;
use tabled::Tabled;

use crate::client::{ApiClient, NodeBaselines};
use crate::output::{print_json, print_warning, OutputFormat};

/// Row for baselines table
#[derive(Tabled)]
struct BaselineRow {
    #[tabled(rename = "Metric")]
    metric: String,
    #[tabled(rename = "Mean")]
    mean: String,
    #[tabled(rename = "Std Dev")]
    stddev: String,
    #[tabled(rename = "Samples")]
    count: u64,
}

fn rows(view: &NodeBaselines) -> Vec<BaselineRow> {
    view.baselines
        .iter()
        .map(|b| BaselineRow {
            metric: b.metric.clone(),
            mean: format!("{:.3}", b.mean),
            stddev: format!("{:.3}", b.stddev),
            count: b.count,
        })
        .collect()
}

/// Show the rolling baselines the server holds for a node
pub async fn show_baseline(client: &ApiClient, node_id: &str, format: OutputFormat) -> Result<()> {
    let view = client.node_baselines(node_id).await?;

    match format {
        OutputFormat::Json => print_json(&view)?,
        OutputFormat::Table => {
            println!("{}", "Node Baselines".bold());
            println!("{}", "=".repeat(50));
            println!("Node: {}", view.node_id.cyan());
            println!();

            if view.baselines.is_empty() {
                print_warning("No baselines tracked for this node");
                return Ok(());
            }

            let table = tabled::Table::new(rows(&view))
                .with(tabled::settings::Style::rounded())
                .to_string();
            println!("{}", table);
        }
    }

    Ok(())
}
