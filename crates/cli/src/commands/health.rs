//! Server health

use anyhow::Result;
use colored::Colorize;
use tabled::Tabled;

use crate::client::ApiClient;
use crate::output::{color_status, format_timestamp, print_json, OutputFormat};

#[derive(Tabled)]
struct ComponentRow {
    #[tabled(rename = "Component")]
    name: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Message")]
    message: String,
    #[tabled(rename = "Since")]
    since: String,
}

pub async fn show_health(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let report = client.health().await?;

    match format {
        OutputFormat::Json => print_json(&report)?,
        OutputFormat::Table => {
            println!("{}", "Server Health".bold());
            println!("{}", "=".repeat(50));
            println!("Status: {}", color_status(&report.status));
            println!();

            let mut rows: Vec<ComponentRow> = report
                .components
                .iter()
                .map(|(name, c)| ComponentRow {
                    name: name.clone(),
                    status: color_status(&c.status),
                    message: c.message.clone().unwrap_or_default(),
                    since: format_timestamp(c.since),
                })
                .collect();
            rows.sort_by(|a, b| a.name.cmp(&b.name));

            let table = tabled::Table::new(rows)
                .with(tabled::settings::Style::rounded())
                .to_string();
            println!("{}", table);

            let storage = &report.storage;
            if let (Some(error), Some(at)) = (&storage.last_error, storage.last_error_at) {
                println!();
                println!(
                    "Last storage error ({}, {} consecutive failures): {}",
                    format_timestamp(at),
                    storage.consecutive_failures,
                    error
                );
            }
        }
    }

    Ok(())
}
