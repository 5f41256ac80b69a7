use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Instant;
use tokio::process::Command;
use tracing::{debug, info};

use crate::credentials::SessionCredentials;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadToolConfig {
    pub program: String,
    /// Arguments placed before the tool's own, e.g. `["-jar", "awscurl.jar"]` with `java`.
    pub launcher_args: Vec<String>,
    pub concurrency: u32,
    /// Requests per concurrent client.
    pub iterations: u32,
    pub connect_timeout_secs: u64,
    /// Signing service name passed with `-n`.
    pub service: Option<String>,
    pub extra_args: Vec<String>,
}

impl Default for LoadToolConfig {
    fn default() -> Self {
        Self {
            program: "awscurl".to_string(),
            launcher_args: Vec::new(),
            concurrency: 4,
            iterations: 10,
            connect_timeout_secs: 60,
            service: Some("sagemaker".to_string()),
            extra_args: Vec::new(),
        }
    }
}

/// External HTTP load generator, run once per benchmark repetition.
#[derive(Debug, Clone)]
pub struct LoadTool {
    config: LoadToolConfig,
}

impl LoadTool {
    pub fn new(config: LoadToolConfig) -> Self {
        Self { config }
    }

    pub fn args(&self, url: &str, dataset_dir: &Path) -> Vec<String> {
        let c = &self.config;
        let mut args = c.launcher_args.clone();
        args.extend([
            "-c".to_string(),
            c.concurrency.to_string(),
            "-N".to_string(),
            c.iterations.to_string(),
            "-X".to_string(),
            "POST".to_string(),
        ]);
        if let Some(service) = &c.service {
            args.extend(["-n".to_string(), service.clone()]);
        }
        args.extend([
            url.to_string(),
            "--connect-timeout".to_string(),
            c.connect_timeout_secs.to_string(),
            "--dataset".to_string(),
            dataset_dir.to_string_lossy().into_owned(),
            "-H".to_string(),
            "Content-Type: application/json".to_string(),
        ]);
        args.extend(c.extra_args.iter().cloned());
        args
    }

    /// Run against `url` and return the text report from stdout.
    ///
    /// `credentials` only reach the child's environment. A non-zero exit,
    /// including an authentication failure, is returned as an error.
    pub async fn run(
        &self,
        url: &str,
        dataset_dir: &Path,
        credentials: &SessionCredentials,
    ) -> Result<String> {
        let args = self.args(url, dataset_dir);
        debug!(program = %self.config.program, args = ?args, "Starting load tool");

        let start = Instant::now();
        let output = Command::new(&self.config.program)
            .args(&args)
            .envs(credentials.env_vars())
            .kill_on_drop(true)
            .output()
            .await
            .context(format!("Failed to start {}", self.config.program))?;

        if !output.status.success() {
            anyhow::bail!(
                "{} exited with {}: {}",
                self.config.program,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }

        info!(
            url = %url,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Load tool finished"
        );
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}
