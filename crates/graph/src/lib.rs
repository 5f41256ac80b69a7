pub mod entity_graph;
pub mod graph_export;

pub use entity_graph::{AssemblyStats, EntityGraph};
pub use graph_export::{GraphSnapshot, export_graph, to_dot};

use anyhow::Result;
use extract::{ExtractionResult, Extractor};
use tracing::info;

/// Extraction followed by assembly: text in, entity graph out.
pub struct GraphBuilder {
    extractor: Extractor,
}

impl GraphBuilder {
    pub fn new(extractor: Extractor) -> Self {
        Self { extractor }
    }

    pub async fn build_from_text(&self, text: &str) -> Result<(ExtractionResult, EntityGraph)> {
        let extraction = self.extractor.extract_from_text(text).await?;
        let (graph, stats) = EntityGraph::from_extraction(&extraction);

        info!(
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            skipped = stats.skipped_records,
            duplicates = stats.duplicate_edges,
            "Built entity graph"
        );

        Ok((extraction, graph))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use extract::{LlmConfig, ToolUseClient, tools};
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

    async fn mock_tool(server: &mut mockito::ServerGuard, tool: &str, input: Value) -> mockito::Mock {
        server
            .mock("POST", "/model/test-model/converse")
            .match_body(Matcher::PartialJson(json!({
                "toolConfig": { "toolChoice": { "tool": { "name": tool } } }
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(converse_body(tool, input))
            .create_async()
            .await
    }

    #[tokio::test]
    async fn text_becomes_graph() {
        let mut server = mockito::Server::new_async().await;
        let entities = mock_tool(
            &mut server,
            tools::ENTITY_TOOL,
            json!({ "entities": [
                { "entity_name": "Ada Lovelace", "entity_description": "mathematician", "entity_type": "person" },
                { "entity_name": "Analytical Engine", "entity_description": "machine", "entity_type": "concept" },
                { "entity_name": "London", "entity_description": "city", "entity_type": "location" }
            ]}),
        )
        .await;
        let relationships = mock_tool(
            &mut server,
            tools::RELATIONSHIP_TOOL,
            json!({ "relationships": [
                { "entity_1": "Ada Lovelace", "entity_2": "Analytical Engine", "relationship": "wrote notes on" },
                { "entity_1": "Analytical Engine", "entity_2": "Ada Lovelace", "relationship": "described by" },
                { "entity_2": "London" }
            ]}),
        )
        .await;

        let client = ToolUseClient::new(&LlmConfig {
            base_url: server.url(),
            model_id: "test-model".to_string(),
            ..LlmConfig::default()
        })
        .unwrap();
        let builder = GraphBuilder::new(Extractor::new(client));

        let (extraction, graph) = builder
            .build_from_text("Ada Lovelace, of London, wrote notes on the Analytical Engine.")
            .await
            .unwrap();

        assert_eq!(extraction.relationships.len(), 3);
        assert_eq!(graph.node_count(), 3);
        assert_eq!(graph.edge_count(), 1);
        assert!(graph.has_edge("Analytical Engine", "Ada Lovelace"));
        assert_eq!(graph.isolated_nodes(), vec!["London"]);

        entities.assert_async().await;
        relationships.assert_async().await;
    }
}
