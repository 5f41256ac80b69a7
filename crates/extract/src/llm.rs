use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::time::Duration;
use tracing::{debug, info};

use crate::config::LlmConfig;
use crate::errors::ToolUseError;
use crate::tools::ToolSpec;

/// Sampling parameters sent with every tool request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationParams {
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            max_tokens: 2048,
            temperature: 0.0,
        }
    }
}

/// Client for a Converse-style generation API that returns tool invocations.
#[derive(Clone)]
pub struct ToolUseClient {
    base_url: String,
    model_id: String,
    api_key: Option<String>,
    params: GenerationParams,
    client: reqwest::Client,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: Vec<ContentBlock>,
}

/// One block of a message. Blocks of kinds this client does not use
/// (images, reasoning) decode with both fields empty.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentBlock {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_use: Option<ToolUse>,
}

/// A tool selected by the model, with its populated field mapping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolUse {
    pub tool_use_id: String,
    pub name: String,
    pub input: Value,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ConverseRequest<'a> {
    messages: Vec<Message>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    system: Vec<SystemBlock<'a>>,
    inference_config: InferenceConfig,
    tool_config: ToolConfig<'a>,
}

#[derive(Serialize)]
struct SystemBlock<'a> {
    text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct InferenceConfig {
    max_tokens: u32,
    temperature: f32,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ToolConfig<'a> {
    tools: Vec<ToolEntry<'a>>,
    tool_choice: Value,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ToolEntry<'a> {
    tool_spec: WireToolSpec<'a>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct WireToolSpec<'a> {
    name: &'a str,
    description: &'a str,
    input_schema: WireSchema<'a>,
}

#[derive(Serialize)]
struct WireSchema<'a> {
    json: &'a Value,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConverseResponse {
    pub output: ConverseOutput,
    #[serde(default)]
    pub stop_reason: String,
    #[serde(default)]
    pub usage: Option<Usage>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConverseOutput {
    #[serde(default)]
    pub message: Option<Message>,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Usage {
    #[serde(default)]
    pub input_tokens: u64,
    #[serde(default)]
    pub output_tokens: u64,
}

impl ConverseResponse {
    /// The first tool invocation in the output message.
    pub fn into_tool_use(self) -> Result<ToolUse, ToolUseError> {
        let stop_reason = self.stop_reason;
        self.output
            .message
            .into_iter()
            .flat_map(|m| m.content)
            .find_map(|block| block.tool_use)
            .ok_or(ToolUseError::NoToolUse { stop_reason })
    }
}

impl ToolUseClient {
    pub fn new(config: &LlmConfig) -> Result<Self, ToolUseError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|source| ToolUseError::Transport {
                url: config.base_url.clone(),
                source,
            })?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model_id: config.model_id.clone(),
            api_key: config.api_key.clone(),
            params: GenerationParams {
                max_tokens: config.max_tokens,
                temperature: config.temperature,
            },
            client,
        })
    }

    pub fn params(&self) -> GenerationParams {
        self.params
    }

    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    /// Send `prompt` with the declared tools and return the one the model invoked.
    ///
    /// A single declared tool is forced; with several, the model picks one
    /// and the caller branches on [`ToolUse::name`].
    pub async fn invoke_tools(
        &self,
        prompt: &str,
        tools: &[ToolSpec],
        params: &GenerationParams,
    ) -> Result<ToolUse, ToolUseError> {
        self.invoke_tools_with_system(None, prompt, tools, params)
            .await
    }

    pub async fn invoke_tools_with_system(
        &self,
        system: Option<&str>,
        prompt: &str,
        tools: &[ToolSpec],
        params: &GenerationParams,
    ) -> Result<ToolUse, ToolUseError> {
        if tools.is_empty() {
            return Err(ToolUseError::NoToolsDeclared);
        }

        let url = format!("{}/model/{}/converse", self.base_url, self.model_id);
        let request = build_request(system, prompt, tools, params);

        debug!(
            model = %self.model_id,
            tools = tools.len(),
            max_tokens = params.max_tokens,
            "Sending tool request"
        );

        let mut builder = self.client.post(&url).json(&request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder
            .send()
            .await
            .map_err(|source| ToolUseError::Transport {
                url: url.clone(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ToolUseError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let converse: ConverseResponse = response.json().await.map_err(ToolUseError::Decode)?;
        if let Some(usage) = converse.usage {
            debug!(
                input_tokens = usage.input_tokens,
                output_tokens = usage.output_tokens,
                "Token usage"
            );
        }

        let tool_use = converse.into_tool_use()?;
        info!(tool = %tool_use.name, "Model invoked tool");
        Ok(tool_use)
    }
}

fn build_request<'a>(
    system: Option<&'a str>,
    prompt: &str,
    tools: &'a [ToolSpec],
    params: &GenerationParams,
) -> ConverseRequest<'a> {
    let tool_choice = match tools {
        [only] => json!({ "tool": { "name": only.name } }),
        _ => json!({ "any": {} }),
    };

    ConverseRequest {
        messages: vec![Message {
            role: Role::User,
            content: vec![ContentBlock {
                text: Some(prompt.to_string()),
                tool_use: None,
            }],
        }],
        system: system.map(|text| SystemBlock { text }).into_iter().collect(),
        inference_config: InferenceConfig {
            max_tokens: params.max_tokens,
            temperature: params.temperature,
        },
        tool_config: ToolConfig {
            tools: tools
                .iter()
                .map(|t| ToolEntry {
                    tool_spec: WireToolSpec {
                        name: &t.name,
                        description: &t.description,
                        input_schema: WireSchema {
                            json: &t.input_schema,
                        },
                    },
                })
                .collect(),
            tool_choice,
        },
    }
}
