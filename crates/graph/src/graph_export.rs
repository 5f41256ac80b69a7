use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::path::Path;

use crate::entity_graph::EntityGraph;

/// Serializable view of an [`EntityGraph`], sorted so output is stable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphSnapshot {
    pub nodes: Vec<String>,
    pub edges: Vec<(String, String)>,
}

impl GraphSnapshot {
    pub fn from_graph(graph: &EntityGraph) -> Self {
        let mut nodes: Vec<String> = graph.nodes().map(str::to_string).collect();
        nodes.sort();

        let mut edges: Vec<(String, String)> = graph
            .edges()
            .map(|(a, b)| {
                if a <= b {
                    (a.to_string(), b.to_string())
                } else {
                    (b.to_string(), a.to_string())
                }
            })
            .collect();
        edges.sort();

        Self { nodes, edges }
    }
}

/// Graphviz rendering of the graph, one statement per line.
pub fn to_dot(graph: &EntityGraph) -> String {
    let snapshot = GraphSnapshot::from_graph(graph);
    let mut dot = String::from("graph entities {\n");

    for node in &snapshot.nodes {
        let _ = writeln!(dot, "    \"{}\";", escape(node));
    }
    for (a, b) in &snapshot.edges {
        let _ = writeln!(dot, "    \"{}\" -- \"{}\";", escape(a), escape(b));
    }

    dot.push_str("}\n");
    dot
}

fn escape(name: &str) -> String {
    name.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Write `graph.json` and `graph.dot` into `output_dir`.
pub async fn export_graph(graph: &EntityGraph, output_dir: &Path) -> Result<()> {
    tokio::fs::create_dir_all(output_dir)
        .await
        .context(format!("Failed to create {:?}", output_dir))?;

    let json = serde_json::to_string_pretty(&GraphSnapshot::from_graph(graph))?;
    tokio::fs::write(output_dir.join("graph.json"), json)
        .await
        .context("Failed to write graph.json")?;

    tokio::fs::write(output_dir.join("graph.dot"), to_dot(graph))
        .await
        .context("Failed to write graph.dot")?;

    tracing::info!(
        nodes = graph.node_count(),
        edges = graph.edge_count(),
        dir = %output_dir.display(),
        "Exported graph"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> EntityGraph {
        let mut graph = EntityGraph::new();
        graph.add_node("solo");
        graph.add_edge("b", "a");
        graph.add_edge("say \"hi\"", "a");
        graph
    }

    #[test]
    fn snapshot_orders_nodes_and_edge_endpoints() {
        let snapshot = GraphSnapshot::from_graph(&sample());

        assert_eq!(snapshot.nodes, vec!["a", "b", "say \"hi\"", "solo"]);
        assert_eq!(
            snapshot.edges,
            vec![
                ("a".to_string(), "b".to_string()),
                ("a".to_string(), "say \"hi\"".to_string()),
            ]
        );
    }

    #[test]
    fn dot_escapes_quotes() {
        let dot = to_dot(&sample());

        assert!(dot.starts_with("graph entities {"));
        assert!(dot.contains("\"a\" -- \"b\";"));
        assert!(dot.contains("\"say \\\"hi\\\"\""));
        assert!(dot.contains("\"solo\";"));
    }

    #[tokio::test]
    async fn export_writes_json_and_dot() {
        let dir = tempfile::tempdir().unwrap();
        let output_dir = dir.path().join("out");

        export_graph(&sample(), &output_dir).await.unwrap();

        let json = std::fs::read_to_string(output_dir.join("graph.json")).unwrap();
        let snapshot: GraphSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(snapshot, GraphSnapshot::from_graph(&sample()));

        let dot = std::fs::read_to_string(output_dir.join("graph.dot")).unwrap();
        assert_eq!(dot, to_dot(&sample()));
    }
}
