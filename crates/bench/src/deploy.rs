use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;
use std::future::Future;
use tracing::{info, warn};

use crate::aws::AwsCli;

/// One model package, deployed identically to every instance type.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeploymentConfig {
    pub name_prefix: String,
    /// Serving container image URI.
    pub image: String,
    pub model_id: String,
    /// Inference engine selected inside the container, e.g. `vllm`.
    pub engine: String,
    /// `None` shards across every GPU on the instance.
    pub tensor_parallel_degree: Option<u32>,
    pub max_images_per_prompt: u32,
    pub max_model_len: Option<u32>,
    pub extra_env: BTreeMap<String, String>,
    pub instance_count: u32,
    pub execution_role_arn: String,
    pub startup_timeout_secs: u64,
}

impl Default for DeploymentConfig {
    fn default() -> Self {
        Self {
            name_prefix: "vlm-bench".to_string(),
            image: "763104351884.dkr.ecr.us-east-1.amazonaws.com/djl-inference:0.29.0-lmi11.0.0-cu124"
                .to_string(),
            model_id: "Qwen/Qwen2-VL-7B-Instruct".to_string(),
            engine: "vllm".to_string(),
            tensor_parallel_degree: None,
            max_images_per_prompt: 1,
            max_model_len: Some(8192),
            extra_env: BTreeMap::new(),
            instance_count: 1,
            execution_role_arn: String::new(),
            startup_timeout_secs: 900,
        }
    }
}

impl DeploymentConfig {
    /// Container environment. `extra_env` wins over the derived entries.
    pub fn environment(&self) -> BTreeMap<String, String> {
        let mut env = BTreeMap::new();
        env.insert("HF_MODEL_ID".to_string(), self.model_id.clone());
        env.insert("OPTION_ROLLING_BATCH".to_string(), self.engine.clone());
        env.insert(
            "TENSOR_PARALLEL_DEGREE".to_string(),
            self.tensor_parallel_degree
                .map(|d| d.to_string())
                .unwrap_or_else(|| "max".to_string()),
        );
        env.insert(
            "OPTION_LIMIT_MM_PER_PROMPT".to_string(),
            format!("image={}", self.max_images_per_prompt),
        );
        if let Some(len) = self.max_model_len {
            env.insert("OPTION_MAX_MODEL_LEN".to_string(), len.to_string());
        }
        env.extend(self.extra_env.clone());
        env
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Endpoint {
    pub name: String,
    pub instance_type: String,
    pub url: String,
}

/// Endpoints created in one session, plus the model package behind them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Deployment {
    pub model_name: String,
    pub endpoints: Vec<Endpoint>,
}

pub trait EndpointDeployer {
    /// Register the model package; returns its name.
    fn create_model(&self, config: &DeploymentConfig) -> impl Future<Output = Result<String>> + Send;

    /// Deploy the model to one instance type and wait until it serves.
    fn deploy(
        &self,
        model_name: &str,
        config: &DeploymentConfig,
        instance_type: &str,
    ) -> impl Future<Output = Result<Endpoint>> + Send;

    fn delete_endpoint(&self, endpoint: &Endpoint) -> impl Future<Output = Result<()>> + Send;

    fn delete_model(&self, model_name: &str) -> impl Future<Output = Result<()>> + Send;
}

/// Deploy to each instance type in order.
///
/// Stops at the first failure. Endpoints created before it keep running
/// and are named in the log; call [`teardown`] on them yourself.
pub async fn deploy_all<D: EndpointDeployer>(
    deployer: &D,
    config: &DeploymentConfig,
    instance_types: &[String],
) -> Result<Deployment> {
    let model_name = deployer
        .create_model(config)
        .await
        .context("Failed to create model")?;
    info!(model = %model_name, "Created model");

    let mut endpoints = Vec::with_capacity(instance_types.len());
    for instance_type in instance_types {
        info!(instance_type = %instance_type, "Deploying endpoint");
        match deployer.deploy(&model_name, config, instance_type).await {
            Ok(endpoint) => {
                info!(endpoint = %endpoint.name, instance_type = %instance_type, "Endpoint in service");
                endpoints.push(endpoint);
            }
            Err(e) => {
                let running: Vec<&str> = endpoints.iter().map(|ep| ep.name.as_str()).collect();
                warn!(
                    instance_type = %instance_type,
                    model = %model_name,
                    still_running = ?running,
                    "Deployment failed; earlier endpoints are left running"
                );
                return Err(e.context(format!("Failed to deploy to {}", instance_type)));
            }
        }
    }

    Ok(Deployment {
        model_name,
        endpoints,
    })
}

/// Delete every endpoint, then the model. Attempts all deletions before
/// reporting a failure.
pub async fn teardown<D: EndpointDeployer>(deployer: &D, deployment: &Deployment) -> Result<()> {
    let mut failures = Vec::new();

    for endpoint in &deployment.endpoints {
        match deployer.delete_endpoint(endpoint).await {
            Ok(()) => info!(endpoint = %endpoint.name, "Deleted endpoint"),
            Err(e) => {
                warn!(endpoint = %endpoint.name, error = %e, "Failed to delete endpoint");
                failures.push(endpoint.name.clone());
            }
        }
    }

    match deployer.delete_model(&deployment.model_name).await {
        Ok(()) => info!(model = %deployment.model_name, "Deleted model"),
        Err(e) => {
            warn!(model = %deployment.model_name, error = %e, "Failed to delete model");
            failures.push(deployment.model_name.clone());
        }
    }

    if !failures.is_empty() {
        anyhow::bail!("Teardown incomplete, still present: {}", failures.join(", "));
    }
    Ok(())
}

/// Settle a benchmark session after teardown.
///
/// Measured results are persisted even when teardown failed; the teardown
/// error is returned afterwards. A failed run reports its own error, with
/// any teardown failure logged.
pub fn finish<T, F>(outcome: Result<T>, teardown_result: Result<()>, persist: F) -> Result<T>
where
    F: FnOnce(&T) -> Result<()>,
{
    let results = match outcome {
        Ok(results) => results,
        Err(e) => {
            if let Err(cleanup) = teardown_result {
                warn!(error = %cleanup, "Teardown failed after a failed run");
            }
            return Err(e);
        }
    };

    if let Err(e) = persist(&results) {
        if let Err(cleanup) = teardown_result {
            warn!(error = %cleanup, "Teardown failed");
        }
        return Err(e.context("Failed to save results"));
    }

    teardown_result.context("Results saved, but teardown failed")?;
    Ok(results)
}

/// Drives SageMaker through the `aws sagemaker` CLI.
#[derive(Debug, Clone)]
pub struct AwsCliDeployer {
    aws: AwsCli,
}

impl AwsCliDeployer {
    pub fn new(aws: AwsCli) -> Self {
        Self { aws }
    }

    pub fn invocation_url(&self, endpoint_name: &str) -> String {
        format!(
            "https://runtime.sagemaker.{}.amazonaws.com/endpoints/{}/invocations",
            self.aws.region(),
            endpoint_name
        )
    }
}

/// `ml.g5.2xlarge` -> `ml-g5-2xlarge`; resource names only allow `[a-zA-Z0-9-]`.
pub fn resource_name(prefix: &str, instance_type: Option<&str>) -> String {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    let mut parts = vec![prefix.to_string()];
    if let Some(instance_type) = instance_type {
        parts.push(instance_type.to_string());
    }
    parts.push(suffix[..8].to_string());

    let name: String = parts
        .join("-")
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect();
    // 63 is the service limit; keep the random suffix.
    if name.len() > 63 {
        format!("{}{}", &name[..54], &name[name.len() - 9..])
    } else {
        name
    }
}

impl EndpointDeployer for AwsCliDeployer {
    async fn create_model(&self, config: &DeploymentConfig) -> Result<String> {
        let model_name = resource_name(&config.name_prefix, None);
        let container = json!({
            "Image": config.image,
            "Environment": config.environment(),
        })
        .to_string();

        self.aws
            .run(&[
                "sagemaker",
                "create-model",
                "--model-name",
                &model_name,
                "--execution-role-arn",
                &config.execution_role_arn,
                "--primary-container",
                &container,
            ])
            .await
            .context(format!("Failed to create model {}", model_name))?;

        Ok(model_name)
    }

    async fn deploy(
        &self,
        model_name: &str,
        config: &DeploymentConfig,
        instance_type: &str,
    ) -> Result<Endpoint> {
        let name = resource_name(&config.name_prefix, Some(instance_type));
        let variants = json!([{
            "VariantName": "AllTraffic",
            "ModelName": model_name,
            "InstanceType": instance_type,
            "InitialInstanceCount": config.instance_count,
            "ContainerStartupHealthCheckTimeoutInSeconds": config.startup_timeout_secs,
        }])
        .to_string();

        self.aws
            .run(&[
                "sagemaker",
                "create-endpoint-config",
                "--endpoint-config-name",
                &name,
                "--production-variants",
                &variants,
            ])
            .await
            .context(format!("Failed to create endpoint config {}", name))?;

        self.aws
            .run(&[
                "sagemaker",
                "create-endpoint",
                "--endpoint-name",
                &name,
                "--endpoint-config-name",
                &name,
            ])
            .await
            .context(format!("Failed to create endpoint {} (endpoint config {} exists)", name, name))?;

        self.aws
            .run(&["sagemaker", "wait", "endpoint-in-service", "--endpoint-name", &name])
            .await
            .context(format!("Endpoint {} never reached InService", name))?;

        Ok(Endpoint {
            url: self.invocation_url(&name),
            name,
            instance_type: instance_type.to_string(),
        })
    }

    async fn delete_endpoint(&self, endpoint: &Endpoint) -> Result<()> {
        self.aws
            .run(&["sagemaker", "delete-endpoint", "--endpoint-name", &endpoint.name])
            .await
            .context(format!("Failed to delete endpoint {}", endpoint.name))?;
        // Endpoint configs share the endpoint's name.
        self.aws
            .run(&[
                "sagemaker",
                "delete-endpoint-config",
                "--endpoint-config-name",
                &endpoint.name,
            ])
            .await
            .context(format!("Failed to delete endpoint config {}", endpoint.name))?;
        Ok(())
    }

    async fn delete_model(&self, model_name: &str) -> Result<()> {
        self.aws
            .run(&["sagemaker", "delete-model", "--model-name", model_name])
            .await
            .context(format!("Failed to delete model {}", model_name))?;
        Ok(())
    }
}
