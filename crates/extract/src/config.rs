use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub base_url: String,
    pub model_id: String,
    /// Bearer token for the generation endpoint. Never written back out.
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub max_tokens: u32,
    pub temperature: f32,
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "https://bedrock-runtime.us-east-1.amazonaws.com".to_string(),
            model_id: "meta.llama3-1-70b-instruct-v1:0".to_string(),
            api_key: None,
            max_tokens: 2048,
            temperature: 0.0,
            timeout_secs: 120,
        }
    }
}

impl LlmConfig {
    /// Defaults overridden by `LLM_BASE_URL`, `LLM_MODEL_ID` and `LLM_API_KEY`.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(url) = std::env::var("LLM_BASE_URL") {
            config.base_url = url;
        }
        if let Ok(model) = std::env::var("LLM_MODEL_ID") {
            config.model_id = model;
        }
        config.api_key = std::env::var("LLM_API_KEY").ok().filter(|k| !k.is_empty());
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let config: LlmConfig =
            serde_json::from_str(r#"{"model_id": "my-model", "temperature": 0.5}"#).unwrap();

        assert_eq!(config.model_id, "my-model");
        assert_eq!(config.temperature, 0.5);
        assert_eq!(config.max_tokens, 2048);
        assert!(config.api_key.is_none());
    }

    #[test]
    fn api_key_is_not_serialized() {
        let config = LlmConfig {
            api_key: Some("secret".to_string()),
            ..LlmConfig::default()
        };
        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("secret"));
    }
}
