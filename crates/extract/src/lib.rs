pub mod config;
pub mod errors;
pub mod llm;
pub mod prompt;
pub mod property;
pub mod schema;
pub mod tools;

pub use config::LlmConfig;
pub use errors::ToolUseError;
pub use llm::{GenerationParams, ToolUse, ToolUseClient};
pub use property::{AddProperty, PropertyIntent, SearchProperty};
pub use schema::{Entity, EntityType, ExtractionResult, RelationshipRecord, Relationships};
pub use tools::ToolSpec;

use anyhow::{Context, Result};
use tracing::{info, warn};

use schema::EntityExtraction;

/// Two-pass extraction: entities first, then relationships between them.
pub struct Extractor {
    client: ToolUseClient,
    params: GenerationParams,
}

impl Extractor {
    pub fn new(client: ToolUseClient) -> Self {
        let params = client.params();
        Self { client, params }
    }

    pub fn with_params(mut self, params: GenerationParams) -> Self {
        self.params = params;
        self
    }

    /// Run both passes over `text`. No retries; either call failing aborts.
    pub async fn extract_from_text(&self, text: &str) -> Result<ExtractionResult> {
        let entities = self.extract_entities(text).await?;
        let vocabulary = schema::vocabulary(&entities);

        let relationships = self.extract_relationships(text, &vocabulary).await?;

        Ok(ExtractionResult {
            entities,
            relationships: relationships.relationships,
        })
    }

    pub async fn extract_entities(&self, text: &str) -> Result<Vec<Entity>> {
        let prompt = prompt::build_entity_prompt(text);
        let tool_use = self
            .client
            .invoke_tools(&prompt, &[tools::entity_tool()], &self.params)
            .await
            .context("Entity extraction request failed")?;

        let extraction: EntityExtraction = decode(tool_use, tools::ENTITY_TOOL)?;

        let untyped = extraction.entities.iter().filter(|e| e.kind().is_none()).count();
        if untyped > 0 {
            warn!(count = untyped, "Entities returned with an unrecognised type");
        }
        info!(entities = extraction.entities.len(), "Extracted entities");

        Ok(extraction.entities)
    }

    /// Second pass. Endpoints are constrained to `vocabulary` in the schema
    /// only; records outside it are logged and kept.
    pub async fn extract_relationships(
        &self,
        text: &str,
        vocabulary: &[String],
    ) -> Result<Relationships> {
        if vocabulary.is_empty() {
            warn!("Empty entity vocabulary, relationship schema will have an empty enum");
        }

        let prompt = prompt::build_relationship_prompt(text, vocabulary);
        let tool_use = self
            .client
            .invoke_tools(&prompt, &[tools::relationship_tool(vocabulary)], &self.params)
            .await
            .context("Relationship extraction request failed")?;

        let relationships: Relationships = decode(tool_use, tools::RELATIONSHIP_TOOL)?;

        let unknown = relationships.out_of_vocabulary(vocabulary).len();
        if unknown > 0 {
            warn!(count = unknown, "Relationships reference entities outside the vocabulary");
        }
        info!(relationships = relationships.relationships.len(), "Extracted relationships");

        Ok(relationships)
    }
}

fn decode<T: serde::de::DeserializeOwned>(tool_use: ToolUse, expected: &str) -> Result<T> {
    if tool_use.name != expected {
        return Err(ToolUseError::UnknownTool {
            name: tool_use.name,
        }
        .into());
    }

    serde_json::from_value(tool_use.input)
        .map_err(|source| ToolUseError::InvalidInput {
            name: expected.to_string(),
            source,
        })
        .context("Failed to parse tool input")
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use serde_json::{Value, json};

    fn converse_body(name: &str, input: Value) -> String {
        json!({
            "output": { "message": { "role": "assistant", "content": [
                { "toolUse": { "toolUseId": "tooluse_1", "name": name, "input": input } }
            ]}},
            "stopReason": "tool_use"
        })
        .to_string()
    }

    fn extractor_for(url: &str) -> Extractor {
        let client = ToolUseClient::new(&LlmConfig {
            base_url: url.to_string(),
            model_id: "test-model".to_string(),
            ..LlmConfig::default()
        })
        .unwrap();
        Extractor::new(client)
    }

    #[tokio::test]
    async fn two_passes_feed_vocabulary_forward() {
        let mut server = mockito::Server::new_async().await;

        let entities = server
            .mock("POST", "/model/test-model/converse")
            .match_body(Matcher::PartialJson(json!({
                "toolConfig": { "toolChoice": { "tool": { "name": tools::ENTITY_TOOL } } }
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(converse_body(
                tools::ENTITY_TOOL,
                json!({ "entities": [
                    { "entity_name": "Marie Curie", "entity_description": "physicist", "entity_type": "person" },
                    { "entity_name": "Sorbonne", "entity_description": "university", "entity_type": "organization" },
                    { "entity_name": "Warsaw", "entity_description": "city", "entity_type": "location" }
                ]}),
            ))
            .create_async()
            .await;

        let relationships = server
            .mock("POST", "/model/test-model/converse")
            .match_body(Matcher::PartialJson(json!({
                "toolConfig": { "toolChoice": { "tool": { "name": tools::RELATIONSHIP_TOOL } } }
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(converse_body(
                tools::RELATIONSHIP_TOOL,
                json!({ "relationships": [
                    { "entity_1": "Marie Curie", "entity_2": "Sorbonne", "relationship": "taught at" },
                    { "entity_1": "Marie Curie", "relationship": "born in" }
                ]}),
            ))
            .create_async()
            .await;

        let extractor = extractor_for(&server.url());
        let result = extractor
            .extract_from_text("Marie Curie, born in Warsaw, taught at the Sorbonne.")
            .await
            .unwrap();

        assert_eq!(result.vocabulary(), vec!["Marie Curie", "Sorbonne", "Warsaw"]);
        assert_eq!(result.relationships.len(), 2);
        assert_eq!(result.relationships[1].endpoints(), None);

        entities.assert_async().await;
        relationships.assert_async().await;
    }

    #[tokio::test]
    async fn missing_tool_invocation_fails_fast() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/model/test-model/converse")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "output": { "message": { "role": "assistant", "content": [{ "text": "Sorry." }] } },
                    "stopReason": "end_turn"
                })
                .to_string(),
            )
            .create_async()
            .await;

        let err = extractor_for(&server.url())
            .extract_entities("anything")
            .await
            .unwrap_err();

        let cause = err.downcast_ref::<ToolUseError>().unwrap();
        assert!(matches!(cause, ToolUseError::NoToolUse { .. }));
    }

    #[test]
    fn decode_rejects_unexpected_tool() {
        let tool_use = ToolUse {
            tool_use_id: "t".to_string(),
            name: "something_else".to_string(),
            input: json!({}),
        };
        let err = decode::<EntityExtraction>(tool_use, tools::ENTITY_TOOL).unwrap_err();
        assert!(err.to_string().contains("unknown tool"));
    }
}
