//! SVG time-series charts of a node's stored samples

use anyhow::{Context, Result};
use netwatch_lib::models::Metric;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use crate::client::{ApiClient, StoredSample};
use crate::output::{print_info, print_success, print_warning};

const SVG_WIDTH: f64 = 800.0;
const SVG_HEIGHT: f64 = 300.0;
const MARGIN: f64 = 10.0;

fn metric_value(sample: &StoredSample, metric: Metric) -> f64 {
    match metric {
        Metric::Latency => sample.latency,
        Metric::Jitter => sample.jitter,
        Metric::PacketLoss => sample.packet_loss,
        Metric::Bandwidth => sample.bandwidth,
    }
}

/// Render `values` as a polyline scaled to fill the chart
///
/// Returns `None` for an empty series. A flat series is drawn along the
/// bottom edge.
pub fn render_svg(title: &str, values: &[f64]) -> Option<String> {
    let (first, rest) = values.split_first()?;
    let (min, max) = rest
        .iter()
        .fold((*first, *first), |(lo, hi), v| (lo.min(*v), hi.max(*v)));
    let range = if max > min { max - min } else { 1.0 };

    let plot_w = SVG_WIDTH - 2.0 * MARGIN;
    let plot_h = SVG_HEIGHT - 2.0 * MARGIN;
    let step = if values.len() > 1 {
        plot_w / (values.len() - 1) as f64
    } else {
        0.0
    };

    let mut points = String::new();
    for (i, value) in values.iter().enumerate() {
        let x = MARGIN + i as f64 * step;
        let y = MARGIN + (1.0 - (value - min) / range) * plot_h;
        let _ = write!(points, "{:.1},{:.1} ", x, y);
    }

    Some(format!(
        concat!(
            "<svg width=\"{w}\" height=\"{h}\" xmlns=\"http://www.w3.org/2000/svg\">\n",
            "<title>{title}</title>\n",
            "<rect x=\"0\" y=\"0\" width=\"{w}\" height=\"{h}\" fill=\"white\" stroke=\"lightgray\" />\n",
            "<polyline fill=\"none\" stroke=\"blue\" stroke-width=\"2\" points=\"{points}\" />\n",
            "</svg>\n"
        ),
        w = SVG_WIDTH,
        h = SVG_HEIGHT,
        title = title,
        points = points.trim_end(),
    ))
}

/// Write one chart per metric and return the files written
pub fn write_charts(
    node_id: &str,
    samples: &[StoredSample],
    output_dir: &Path,
) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("Failed to create {}", output_dir.display()))?;

    let mut written = Vec::new();
    for metric in Metric::ALL {
        let values: Vec<f64> = samples.iter().map(|s| metric_value(s, metric)).collect();
        let Some(svg) = render_svg(&format!("{} {}", node_id, metric), &values) else {
            continue;
        };

        let path = output_dir.join(format!("{}_{}.svg", node_id, metric));
        std::fs::write(&path, svg)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        written.push(path);
    }
    Ok(written)
}

/// Fetch a node's history and chart every metric
pub async fn generate_charts(
    client: &ApiClient,
    node_id: &str,
    limit: usize,
    output_dir: &Path,
) -> Result<()> {
    let view = client.node_samples(node_id, limit).await?;
    if view.samples.is_empty() {
        print_warning("No samples to chart");
        return Ok(());
    }

    let written = write_charts(&view.node_id, &view.samples, output_dir)?;
    for path in &written {
        print_info(&format!("Wrote {}", path.display()));
    }
    print_success(&format!(
        "Generated {} charts from {} samples",
        written.len(),
        view.samples.len()
    ));
    Ok(())
}
