use anyhow::{Context, Result};
use serde_json::Value;
use tokio::process::Command;
use tracing::debug;

/// Thin wrapper around the `aws` command line client.
#[derive(Debug, Clone)]
pub struct AwsCli {
    program: String,
    launcher_args: Vec<String>,
    region: String,
    profile: Option<String>,
}

impl AwsCli {
    pub fn new(region: impl Into<String>) -> Self {
        Self {
            program: "aws".to_string(),
            launcher_args: Vec::new(),
            region: region.into(),
            profile: None,
        }
    }

    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    /// Arguments placed before the aws arguments, e.g. `["-c", script, "aws"]` for `sh`.
    pub fn with_launcher_args(mut self, args: Vec<String>) -> Self {
        self.launcher_args = args;
        self
    }

    pub fn with_profile(mut self, profile: Option<String>) -> Self {
        self.profile = profile;
        self
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    /// Full argument vector for one invocation, global options appended.
    pub fn command_args(&self, args: &[&str]) -> Vec<String> {
        let mut full: Vec<String> = args.iter().map(|a| a.to_string()).collect();
        full.extend(["--region".to_string(), self.region.clone()]);
        if let Some(profile) = &self.profile {
            full.extend(["--profile".to_string(), profile.clone()]);
        }
        full.extend(["--output".to_string(), "json".to_string()]);
        full
    }

    /// Run a command and return its stdout. A non-zero exit is an error carrying stderr.
    pub async fn run(&self, args: &[&str]) -> Result<String> {
        let full = self.command_args(args);
        let label = args.iter().take(2).cloned().collect::<Vec<_>>().join(" ");
        debug!(command = %label, "Running aws cli");

        let output = Command::new(&self.program)
            .args(&self.launcher_args)
            .args(&full)
            .output()
            .await
            .context(format!("Failed to spawn {} {}", self.program, label))?;

        if !output.status.success() {
            anyhow::bail!(
                "{} {} failed ({}): {}",
                self.program,
                label,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// Like [`run`](Self::run), parsing stdout as JSON. Empty output is `null`.
    pub async fn run_json(&self, args: &[&str]) -> Result<Value> {
        let stdout = self.run(args).await?;
        if stdout.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&stdout).context("Failed to parse aws cli output as JSON")
    }
}
