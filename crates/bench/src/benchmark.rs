use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

use crate::credentials::CredentialSource;
use crate::deploy::Endpoint;
use crate::loadtool::LoadTool;
use crate::report::{extract_metric, parse_report};

/// One completed load-tool run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkRecord {
    pub instance_type: String,
    pub endpoint: String,
    /// 1-based repetition index for this endpoint.
    pub run: usize,
    pub avg_latency_ms: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceSummary {
    pub instance_type: String,
    pub runs: usize,
    pub mean_ms: f64,
    pub median_ms: f64,
    pub min_ms: f64,
    pub max_ms: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkResults {
    /// In run order: endpoint order, then repetition order.
    pub records: Vec<BenchmarkRecord>,
    /// One per instance type, in first-run order.
    pub summaries: Vec<InstanceSummary>,
}

impl BenchmarkResults {
    pub fn from_records(records: Vec<BenchmarkRecord>) -> Self {
        let mut groups: Vec<(String, Vec<f64>)> = Vec::new();
        for record in &records {
            match groups.iter_mut().find(|(t, _)| *t == record.instance_type) {
                Some((_, latencies)) => latencies.push(record.avg_latency_ms),
                None => groups.push((record.instance_type.clone(), vec![record.avg_latency_ms])),
            }
        }

        let summaries = groups
            .into_iter()
            .map(|(instance_type, latencies)| summarize(instance_type, &latencies))
            .collect();

        Self { records, summaries }
    }
}

fn summarize(instance_type: String, latencies: &[f64]) -> InstanceSummary {
    let min_ms = latencies.iter().copied().fold(f64::INFINITY, f64::min);
    let max_ms = latencies.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    InstanceSummary {
        instance_type,
        runs: latencies.len(),
        mean_ms: statistical::mean(latencies),
        median_ms: statistical::median(latencies),
        min_ms,
        max_ms,
    }
}

pub struct Benchmarker<C> {
    load_tool: LoadTool,
    credentials: C,
    metric_field: String,
    repetitions: usize,
}

impl<C: CredentialSource> Benchmarker<C> {
    pub fn new(load_tool: LoadTool, credentials: C, metric_field: impl Into<String>) -> Self {
        Self {
            load_tool,
            credentials,
            metric_field: metric_field.into(),
            repetitions: 1,
        }
    }

    pub fn with_repetitions(mut self, repetitions: usize) -> Self {
        self.repetitions = repetitions.max(1);
        self
    }

    /// Run every endpoint against the same dataset, one run at a time.
    ///
    /// The first failing run aborts the whole benchmark.
    pub async fn run(&self, endpoints: &[Endpoint], dataset_dir: &Path) -> Result<BenchmarkResults> {
        println!(
            "Running benchmark on {} endpoints x {} runs...",
            endpoints.len(),
            self.repetitions
        );

        let mut records = Vec::with_capacity(endpoints.len() * self.repetitions);
        for endpoint in endpoints {
            println!("Testing {} ({})...", endpoint.instance_type, endpoint.name);

            for run in 1..=self.repetitions {
                let latency = self
                    .run_once(endpoint, dataset_dir)
                    .await
                    .context(format!("Run {} against {} failed", run, endpoint.name))?;

                info!(
                    instance_type = %endpoint.instance_type,
                    run,
                    avg_latency_ms = latency,
                    "Benchmark run complete"
                );
                records.push(BenchmarkRecord {
                    instance_type: endpoint.instance_type.clone(),
                    endpoint: endpoint.name.clone(),
                    run,
                    avg_latency_ms: latency,
                });
            }
        }

        Ok(BenchmarkResults::from_records(records))
    }

    async fn run_once(&self, endpoint: &Endpoint, dataset_dir: &Path) -> Result<f64> {
        // Session credentials may have expired during the previous run.
        let credentials = self
            .credentials
            .refresh()
            .await
            .context("Failed to refresh credentials")?;

        let output = self
            .load_tool
            .run(&endpoint.url, dataset_dir, &credentials)
            .await?;

        for (label, value) in parse_report(&output) {
            tracing::debug!(metric = %label, value, "Report metric");
        }

        extract_metric(&output, &self.metric_field)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::{SessionCredentials, StaticCredentials};
    use crate::loadtool::LoadToolConfig;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn record(instance_type: &str, run: usize, latency: f64) -> BenchmarkRecord {
        BenchmarkRecord {
            instance_type: instance_type.to_string(),
            endpoint: format!("ep-{}", instance_type),
            run,
            avg_latency_ms: latency,
        }
    }

    fn endpoint(instance_type: &str, latency: &str) -> Endpoint {
        // The URL doubles as the latency the fake tool reports.
        Endpoint {
            name: format!("ep-{}", instance_type),
            instance_type: instance_type.to_string(),
            url: latency.to_string(),
        }
    }

    fn static_creds() -> StaticCredentials {
        StaticCredentials(SessionCredentials {
            access_key_id: "a".to_string(),
            secret_access_key: "b".to_string(),
            session_token: None,
            expiration: None,
        })
    }

    /// Prints "Average Latency: <url> ms"; the URL lands in `$9` after the launcher args.
    fn echo_tool() -> LoadTool {
        LoadTool::new(LoadToolConfig {
            program: "sh".to_string(),
            launcher_args: vec![
                "-c".to_string(),
                r#"echo "TPS: 1.0/s"; echo "Average Latency: $9 ms""#.to_string(),
                "loadtool".to_string(),
            ],
            ..LoadToolConfig::default()
        })
    }

    struct CountingCredentials {
        refreshes: AtomicUsize,
    }

    impl CredentialSource for CountingCredentials {
        async fn refresh(&self) -> Result<SessionCredentials> {
            self.refreshes.fetch_add(1, Ordering::SeqCst);
            Ok(static_creds().0)
        }
    }

    #[test]
    fn summaries_group_by_instance_type_in_first_seen_order() {
        let results = BenchmarkResults::from_records(vec![
            record("ml.g5.2xlarge", 1, 100.0),
            record("ml.g6.2xlarge", 1, 80.0),
            record("ml.g5.2xlarge", 2, 300.0),
            record("ml.g5.2xlarge", 3, 200.0),
        ]);

        assert_eq!(results.records.len(), 4);
        assert_eq!(results.summaries.len(), 2);

        let g5 = &results.summaries[0];
        assert_eq!(g5.instance_type, "ml.g5.2xlarge");
        assert_eq!(g5.runs, 3);
        assert_eq!(g5.mean_ms, 200.0);
        assert_eq!(g5.median_ms, 200.0);
        assert_eq!(g5.min_ms, 100.0);
        assert_eq!(g5.max_ms, 300.0);

        assert_eq!(results.summaries[1].instance_type, "ml.g6.2xlarge");
    }

    #[tokio::test]
    async fn records_follow_endpoint_then_run_order() {
        let benchmarker = Benchmarker::new(echo_tool(), static_creds(), "Average Latency")
            .with_repetitions(2);
        let endpoints = vec![endpoint("ml.g5.2xlarge", "123.45"), endpoint("ml.g6.2xlarge", "99")];

        let results = benchmarker.run(&endpoints, Path::new("dataset")).await.unwrap();

        assert_eq!(
            results.records,
            vec![
                record("ml.g5.2xlarge", 1, 123.45),
                record("ml.g5.2xlarge", 2, 123.45),
                record("ml.g6.2xlarge", 1, 99.0),
                record("ml.g6.2xlarge", 2, 99.0),
            ]
        );
    }

    #[tokio::test]
    async fn credentials_are_refreshed_before_every_run() {
        let creds = CountingCredentials {
            refreshes: AtomicUsize::new(0),
        };
        let benchmarker = Benchmarker::new(echo_tool(), creds, "Average Latency").with_repetitions(3);

        benchmarker
            .run(&[endpoint("a", "1"), endpoint("b", "2")], Path::new("dataset"))
            .await
            .unwrap();

        assert_eq!(benchmarker.credentials.refreshes.load(Ordering::SeqCst), 6);
    }

    #[tokio::test]
    async fn missing_metric_aborts_the_benchmark() {
        let benchmarker = Benchmarker::new(echo_tool(), static_creds(), "P99 Latency");
        let err = benchmarker
            .run(&[endpoint("a", "1")], Path::new("dataset"))
            .await
            .unwrap_err();

        assert!(format!("{:#}", err).contains("P99 Latency"));
    }
}
