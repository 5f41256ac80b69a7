use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::dataset::DatasetConfig;
use crate::deploy::DeploymentConfig;
use crate::loadtool::LoadToolConfig;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BenchmarkConfig {
    pub region: String,
    pub profile: Option<String>,
    pub deployment: DeploymentConfig,
    pub instance_types: Vec<String>,
    pub load_tool: LoadToolConfig,
    pub dataset: DatasetConfig,
    /// Load-tool runs per endpoint.
    pub repetitions: usize,
    /// Report line whose value is recorded, e.g. `Average Latency`.
    pub metric_field: String,
    pub output_dir: PathBuf,
}

impl Default for BenchmarkConfig {
    fn default() -> Self {
        Self {
            region: "us-east-1".to_string(),
            profile: None,
            deployment: DeploymentConfig::default(),
            instance_types: vec![
                "ml.g5.2xlarge".to_string(),
                "ml.g5.12xlarge".to_string(),
                "ml.g6.12xlarge".to_string(),
            ],
            load_tool: LoadToolConfig::default(),
            dataset: DatasetConfig::default(),
            repetitions: 1,
            metric_field: "Average Latency".to_string(),
            output_dir: PathBuf::from("results"),
        }
    }
}

impl BenchmarkConfig {
    /// Load a JSON config. Omitted fields take their defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).context(format!("Failed to read {:?}", path))?;
        let config: Self =
            serde_json::from_str(&raw).context(format!("Invalid benchmark config {:?}", path))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.instance_types.is_empty() {
            anyhow::bail!("instance_types must not be empty");
        }
        if self.repetitions == 0 {
            anyhow::bail!("repetitions must be at least 1");
        }
        if self.deployment.execution_role_arn.is_empty() {
            anyhow::bail!("deployment.execution_role_arn is required");
        }
        if self.load_tool.concurrency == 0 || self.load_tool.iterations == 0 {
            anyhow::bail!("load_tool.concurrency and load_tool.iterations must be positive");
        }
        if self.metric_field.trim().is_empty() {
            anyhow::bail!("metric_field must not be empty");
        }
        Ok(())
    }
}
