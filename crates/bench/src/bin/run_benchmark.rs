use anyhow::Result;
use bench::{
    AwsCli, AwsCliCredentials, AwsCliDeployer, BenchmarkConfig, BenchmarkResults, Benchmarker,
    LoadTool, deploy_all, finish, generate_plots, prepare_dataset, teardown,
};
use clap::Parser;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Deploy a model to several instance types and compare their latency
#[derive(Parser)]
#[command(version, about)]
struct Args {
    /// JSON benchmark config; defaults are used for omitted fields
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// Overrides the config's output directory
    #[arg(long, short)]
    output_dir: Option<PathBuf>,

    /// Leave endpoints running after the benchmark
    #[arg(long)]
    keep_endpoints: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => BenchmarkConfig::from_file(path)?,
        None => {
            let config = BenchmarkConfig::default();
            config.validate()?;
            config
        }
    };
    if let Some(dir) = args.output_dir {
        config.output_dir = dir;
    }

    println!("=== Endpoint Latency Benchmark ===\n");
    println!("Model: {}", config.deployment.model_id);
    println!("Instance types: {}\n", config.instance_types.join(", "));

    let payloads = prepare_dataset(&config.dataset).await?;
    println!("Dataset: {} payloads in {}\n", payloads.len(), config.dataset.output_dir.display());

    let aws = AwsCli::new(config.region.clone()).with_profile(config.profile.clone());
    let deployer = AwsCliDeployer::new(aws.clone());

    // A failure here leaves earlier endpoints running; they are named in the log.
    let deployment = deploy_all(&deployer, &config.deployment, &config.instance_types).await?;

    let benchmarker = Benchmarker::new(
        LoadTool::new(config.load_tool.clone()),
        AwsCliCredentials::new(aws),
        config.metric_field.clone(),
    )
    .with_repetitions(config.repetitions);

    let outcome = benchmarker
        .run(&deployment.endpoints, &config.dataset.output_dir)
        .await;

    let teardown_result = if args.keep_endpoints {
        println!("\nEndpoints left running:");
        for endpoint in &deployment.endpoints {
            println!("  {} ({})", endpoint.name, endpoint.instance_type);
        }
        Ok(())
    } else {
        let result = teardown(&deployer, &deployment).await;
        if result.is_ok() {
            println!("\n✅ Endpoints and model deleted");
        }
        result
    };

    // Measured results are written before a teardown failure is reported.
    finish(outcome, teardown_result, |results| save_results(results, &config))?;
    Ok(())
}

fn save_results(results: &BenchmarkResults, config: &BenchmarkConfig) -> Result<()> {
    print_results(results, &config.metric_field);

    std::fs::create_dir_all(&config.output_dir)?;
    let results_json = serde_json::to_string_pretty(results)?;
    std::fs::write(config.output_dir.join("benchmark_results.json"), results_json)?;
    println!("\n✅ Results saved to {}", config.output_dir.join("benchmark_results.json").display());

    generate_plots(results, &config.output_dir)?;
    println!("✅ Plots saved to {}", config.output_dir.display());

    generate_markdown(results, config, &config.output_dir)?;
    println!("✅ Summary saved to {}", config.output_dir.join("BENCHMARK.md").display());

    Ok(())
}

fn print_results(results: &BenchmarkResults, metric: &str) {
    println!("\n=== RESULTS ({}) ===\n", metric);

    for summary in &results.summaries {
        println!("📊 {}:", summary.instance_type);
        println!("  Runs:   {}", summary.runs);
        println!("  Mean:   {:.2} ms", summary.mean_ms);
        println!("  Median: {:.2} ms", summary.median_ms);
        println!("  Range:  {:.2} - {:.2} ms", summary.min_ms, summary.max_ms);
    }

    if let Some(fastest) = results
        .summaries
        .iter()
        .min_by(|a, b| a.mean_ms.total_cmp(&b.mean_ms))
    {
        println!("\n🏆 Fastest: {} ({:.2} ms)", fastest.instance_type, fastest.mean_ms);
    }
}

fn generate_markdown(results: &BenchmarkResults, config: &BenchmarkConfig, output_dir: &Path) -> Result<()> {
    let mut rows = String::new();
    for s in &results.summaries {
        rows.push_str(&format!(
            "| {} | {} | {:.2} ms | {:.2} ms | {:.2} ms | {:.2} ms |\n",
            s.instance_type, s.runs, s.mean_ms, s.median_ms, s.min_ms, s.max_ms
        ));
    }

    let content = format!(
r#"# Benchmark Results

## {} by Instance Type

| Instance Type | Runs | Mean | Median | Min | Max |
|---------------|------|------|--------|-----|-----|
{}
![Latency by Instance](latency_by_instance.png)

## Test Environment
- Model: {}
- Container: {}
- Load: {} concurrent clients x {} requests
- Dataset: {} prompts per image
"#,
        config.metric_field,
        rows,
        config.deployment.model_id,
        config.deployment.image,
        config.load_tool.concurrency,
        config.load_tool.iterations,
        config.dataset.prompts.len(),
    );

    std::fs::write(output_dir.join("BENCHMARK.md"), content)?;
    Ok(())
}
