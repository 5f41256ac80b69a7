//! Short-lived credentials handed to the load tool.
//!
//! Credentials are fetched again before every run. A run that outlives
//! them fails inside the load tool; nothing here retries.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fmt;
use std::future::Future;
use tracing::debug;

use crate::aws::AwsCli;

#[derive(Clone, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SessionCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    #[serde(default)]
    pub session_token: Option<String>,
    #[serde(default)]
    pub expiration: Option<String>,
}

impl SessionCredentials {
    /// Environment variables understood by AWS SDKs and CLIs.
    pub fn env_vars(&self) -> Vec<(&'static str, &str)> {
        let mut vars = vec![
            ("AWS_ACCESS_KEY_ID", self.access_key_id.as_str()),
            ("AWS_SECRET_ACCESS_KEY", self.secret_access_key.as_str()),
        ];
        if let Some(token) = &self.session_token {
            vars.push(("AWS_SESSION_TOKEN", token.as_str()));
        }
        vars
    }
}

impl fmt::Debug for SessionCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionCredentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field("session_token", &self.session_token.as_ref().map(|_| "<redacted>"))
            .field("expiration", &self.expiration)
            .finish()
    }
}

pub trait CredentialSource {
    fn refresh(&self) -> impl Future<Output = Result<SessionCredentials>> + Send;
}

/// Exports the CLI's resolved credentials (`aws configure export-credentials`).
#[derive(Debug, Clone)]
pub struct AwsCliCredentials {
    aws: AwsCli,
}

impl AwsCliCredentials {
    pub fn new(aws: AwsCli) -> Self {
        Self { aws }
    }
}

impl CredentialSource for AwsCliCredentials {
    async fn refresh(&self) -> Result<SessionCredentials> {
        let value = self
            .aws
            .run_json(&["configure", "export-credentials", "--format", "process"])
            .await
            .context("Failed to export credentials")?;

        let creds: SessionCredentials =
            serde_json::from_value(value).context("Unexpected credential format")?;
        debug!(expiration = ?creds.expiration, "Refreshed credentials");
        Ok(creds)
    }
}

/// Fixed credentials, for long-lived keys and tests.
#[derive(Debug, Clone)]
pub struct StaticCredentials(pub SessionCredentials);

impl CredentialSource for StaticCredentials {
    async fn refresh(&self) -> Result<SessionCredentials> {
        Ok(self.0.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_process_credential_format() {
        let creds: SessionCredentials = serde_json::from_str(
            r#"{
                "Version": 1,
                "AccessKeyId": "AKIAEXAMPLE",
                "SecretAccessKey": "secret",
                "SessionToken": "token",
                "Expiration": "2026-10-18T12:00:00+00:00"
            }"#,
        )
        .unwrap();

        assert_eq!(
            creds.env_vars(),
            vec![
                ("AWS_ACCESS_KEY_ID", "AKIAEXAMPLE"),
                ("AWS_SECRET_ACCESS_KEY", "secret"),
                ("AWS_SESSION_TOKEN", "token"),
            ]
        );
    }

    #[test]
    fn long_lived_keys_have_no_token() {
        let creds: SessionCredentials =
            serde_json::from_str(r#"{"AccessKeyId": "a", "SecretAccessKey": "b"}"#).unwrap();
        assert_eq!(creds.env_vars().len(), 2);
    }

    #[test]
    fn debug_output_hides_secrets() {
        let creds = SessionCredentials {
            access_key_id: "AKIA".to_string(),
            secret_access_key: "very-secret".to_string(),
            session_token: Some("also-secret".to_string()),
            expiration: None,
        };
        let debug = format!("{:?}", creds);
        assert!(!debug.contains("very-secret"));
        assert!(!debug.contains("also-secret"));
    }

    const EXPORTED: &str = r#"{"Version": 1, "AccessKeyId": "AKIAEXAMPLE", "SecretAccessKey": "secret", "SessionToken": "token", "Expiration": "2026-10-18T12:00:00+00:00"}"#;

    #[tokio::test]
    async fn aws_cli_source_parses_exported_credentials() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("aws.log");
        let script = format!(
            r#"printf '%s\n' "$*" > '{}'; printf '%s' '{}'"#,
            log.display(),
            EXPORTED
        );
        let aws = AwsCli::new("us-east-1")
            .with_program("sh")
            .with_launcher_args(vec!["-c".to_string(), script, "aws".to_string()]);

        let creds = AwsCliCredentials::new(aws).refresh().await.unwrap();

        assert_eq!(creds.access_key_id, "AKIAEXAMPLE");
        assert_eq!(creds.session_token.as_deref(), Some("token"));
        assert_eq!(creds.expiration.as_deref(), Some("2026-10-18T12:00:00+00:00"));
        assert_eq!(
            std::fs::read_to_string(&log).unwrap().trim(),
            "configure export-credentials --format process --region us-east-1 --output json"
        );
    }

    #[tokio::test]
    async fn aws_cli_source_rejects_unexpected_output() {
        let aws = AwsCli::new("us-east-1").with_program("sh").with_launcher_args(vec![
            "-c".to_string(),
            r#"printf '%s' '{"Token": "x"}'"#.to_string(),
            "aws".to_string(),
        ]);

        let err = AwsCliCredentials::new(aws).refresh().await.unwrap_err();
        assert!(err.to_string().contains("Unexpected credential format"));
    }
}
