//! Output formatting utilities

use clap::ValueEnum;
use colored::Colorize;
use netwatch_lib::proto::{MetricsRequest, MetricsResponse};
use serde::Serialize;

/// Output format for CLI commands
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    /// Table format (default)
    #[default]
    Table,
    /// JSON format
    Json,
}

/// Print a success message
pub fn print_success(message: &str) {
    println!("{} {}", "✓".green().bold(), message);
}

/// Print an error message
pub fn print_error(message: &str) {
    eprintln!("{} {}", "✗".red().bold(), message);
}

/// Print a warning message
pub fn print_warning(message: &str) {
    println!("{} {}", "⚠".yellow().bold(), message);
}

/// Print an info message
pub fn print_info(message: &str) {
    println!("{} {}", "ℹ".blue().bold(), message);
}

/// Print any serializable value as pretty JSON
pub fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn format_ms(value: f64) -> String {
    format!("{:.2} ms", value)
}

pub fn format_percent(value: f64) -> String {
    format!("{:.2}%", value)
}

pub fn format_mbps(value: f64) -> String {
    format!("{:.2} Mbps", value)
}

/// Format a Unix timestamp in seconds as RFC 3339
pub fn format_timestamp(ts: i64) -> String {
    chrono::DateTime::<chrono::Utc>::from_timestamp(ts, 0)
        .map(|dt| dt.to_rfc3339())
        .unwrap_or_else(|| ts.to_string())
}

/// Color status based on value
pub fn color_status(status: &str) -> String {
    match status.to_lowercase().as_str() {
        "healthy" | "ok" => status.green().to_string(),
        "degraded" | "warning" => status.yellow().to_string(),
        "unhealthy" | "error" | "failed" => status.red().to_string(),
        _ => status.to_string(),
    }
}

/// Color a z-score by how far it sits from the baseline
pub fn color_z_score(z: f64) -> String {
    let formatted = format!("{:+.2}", z);
    if z.abs() > 3.0 {
        formatted.red().to_string()
    } else if z.abs() > 2.0 {
        formatted.yellow().to_string()
    } else {
        formatted.green().to_string()
    }
}

/// One submission and the server's verdict, for JSON output
#[derive(Debug, Clone, Serialize)]
pub struct SubmissionReport {
    pub node_id: String,
    pub timestamp: i64,
    pub latency: f64,
    pub jitter: f64,
    pub packet_loss: f64,
    pub bandwidth: f64,
    pub success: bool,
    pub is_latency_spike: bool,
    pub is_packet_loss: bool,
    pub z_score: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<String>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub message: String,
}

impl SubmissionReport {
    pub fn new(request: &MetricsRequest, response: &MetricsResponse) -> Self {
        let error_kind = (!response.success).then(|| response.error_kind().as_str_name().to_string());
        Self {
            node_id: request.node_id.clone(),
            timestamp: request.timestamp,
            latency: request.latency,
            jitter: request.jitter,
            packet_loss: request.packet_loss,
            bandwidth: request.bandwidth,
            success: response.success,
            is_latency_spike: response.is_latency_spike,
            is_packet_loss: response.is_packet_loss,
            z_score: response.z_score,
            error_kind,
            message: response.message.clone(),
        }
    }

    /// Short verdict label for table output
    pub fn verdict_label(&self) -> String {
        if !self.success {
            return "rejected".red().to_string();
        }
        match (self.is_latency_spike, self.is_packet_loss) {
            (true, true) => "spike + loss".red().bold().to_string(),
            (true, false) => "latency spike".red().to_string(),
            (false, true) => "packet loss".yellow().to_string(),
            (false, false) => "normal".green().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use netwatch_lib::proto::ErrorKind;

    fn request() -> MetricsRequest {
        MetricsRequest {
            node_id: "n1".to_string(),
            latency: 10.0,
            jitter: 1.0,
            packet_loss: 0.0,
            bandwidth: 50.0,
            timestamp: 1_700_000_000,
        }
    }

    #[test]
    fn test_report_from_rejection() {
        let response = MetricsResponse {
            success: false,
            message: "node_id must not be empty".to_string(),
            error_kind: ErrorKind::Validation as i32,
            ..Default::default()
        };
        let report = SubmissionReport::new(&request(), &response);
        assert_eq!(report.error_kind.as_deref(), Some("ERROR_KIND_VALIDATION"));

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["message"], "node_id must not be empty");
    }

    #[test]
    fn test_report_from_success_omits_error_fields() {
        let response = MetricsResponse {
            success: true,
            z_score: 1.25,
            ..Default::default()
        };
        let json = serde_json::to_value(SubmissionReport::new(&request(), &response)).unwrap();
        assert!(json.get("error_kind").is_none());
        assert!(json.get("message").is_none());
        assert_eq!(json["z_score"], 1.25);
    }

    #[test]
    fn test_format_timestamp() {
        assert_eq!(format_timestamp(0), "1970-01-01T00:00:00+00:00");
        assert_eq!(format_ms(12.345), "12.35 ms");
        assert_eq!(format_percent(1.5), "1.50%");
    }
}
