use anyhow::Result;
use plotters::prelude::*;
use std::path::Path;

use crate::benchmark::BenchmarkResults;

pub fn generate_plots(results: &BenchmarkResults, output_dir: &Path) -> Result<()> {
    std::fs::create_dir_all(output_dir)?;

    plot_latency_by_instance(results, &output_dir.join("latency_by_instance.png"))?;

    Ok(())
}

/// Bar per instance type: mean of its runs' average latency.
fn plot_latency_by_instance(results: &BenchmarkResults, path: &Path) -> Result<()> {
    if results.summaries.is_empty() {
        anyhow::bail!("No benchmark results to plot");
    }

    let root = BitMapBackend::new(path, (1000, 600)).into_drawing_area();
    root.fill(&WHITE)?;

    let labels: Vec<String> = results
        .summaries
        .iter()
        .map(|s| s.instance_type.clone())
        .collect();
    let max_latency = results
        .summaries
        .iter()
        .map(|s| s.mean_ms)
        .fold(0.0f64, f64::max)
        .max(1.0);

    let mut chart = ChartBuilder::on(&root)
        .caption("Average Latency by Instance Type (ms)", ("sans-serif", 30))
        .margin(10)
        .x_label_area_size(60)
        .y_label_area_size(70)
        .build_cartesian_2d(
            (0..labels.len()).into_segmented(),
            0f64..(max_latency * 1.2),
        )?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .y_desc("Latency (ms)")
        .x_desc("Instance type")
        .x_labels(labels.len())
        .x_label_formatter(&|v| match v {
            SegmentValue::CenterOf(i) => labels.get(*i).cloned().unwrap_or_default(),
            _ => String::new(),
        })
        .draw()?;

    chart.draw_series(
        Histogram::vertical(&chart)
            .style(BLUE.filled())
            .margin(20)
            .data(results.summaries.iter().enumerate().map(|(i, s)| (i, s.mean_ms))),
    )?;

    root.present()?;
    println!("Saved latency plot to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_results_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let results = BenchmarkResults::from_records(Vec::new());

        assert!(generate_plots(&results, dir.path()).is_err());
    }
}
