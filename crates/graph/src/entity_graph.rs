use extract::{Entity, ExtractionResult, RelationshipRecord};
use petgraph::graph::{NodeIndex, UnGraph};
use serde::Serialize;
use std::collections::HashMap;
use tracing::debug;

/// Undirected simple graph of entity names. Edges carry no data.
#[derive(Debug, Clone, Default)]
pub struct EntityGraph {
    graph: UnGraph<String, ()>,
    name_to_idx: HashMap<String, NodeIndex>,
}

/// What happened to the relationship records fed into the graph.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AssemblyStats {
    pub edges_added: usize,
    pub duplicate_edges: usize,
    pub skipped_records: usize,
}

impl EntityGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed with every entity, then fold in the relationships.
    pub fn from_extraction(result: &ExtractionResult) -> (Self, AssemblyStats) {
        Self::assemble(&result.entities, &result.relationships)
    }

    pub fn assemble(entities: &[Entity], relationships: &[RelationshipRecord]) -> (Self, AssemblyStats) {
        let mut graph = Self::new();
        for entity in entities {
            graph.add_node(&entity.name);
        }
        let stats = graph.add_relationships(relationships);

        debug!(
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            skipped = stats.skipped_records,
            "Assembled entity graph"
        );
        (graph, stats)
    }

    pub fn add_node(&mut self, name: &str) -> NodeIndex {
        if let Some(&idx) = self.name_to_idx.get(name) {
            return idx;
        }

        let idx = self.graph.add_node(name.to_string());
        self.name_to_idx.insert(name.to_string(), idx);
        idx
    }

    /// Returns false if the edge was already present.
    pub fn add_edge(&mut self, a: &str, b: &str) -> bool {
        let ia = self.add_node(a);
        let ib = self.add_node(b);
        if self.graph.find_edge(ia, ib).is_some() {
            return false;
        }
        self.graph.add_edge(ia, ib, ());
        true
    }

    /// Records without both `entity_1` and `entity_2` are skipped.
    pub fn add_relationships(&mut self, relationships: &[RelationshipRecord]) -> AssemblyStats {
        let mut stats = AssemblyStats::default();

        for record in relationships {
            match record.endpoints() {
                Some((a, b)) => {
                    if self.add_edge(a, b) {
                        stats.edges_added += 1;
                    } else {
                        stats.duplicate_edges += 1;
                    }
                }
                None => stats.skipped_records += 1,
            }
        }

        stats
    }

    pub fn contains_node(&self, name: &str) -> bool {
        self.name_to_idx.contains_key(name)
    }

    pub fn has_edge(&self, a: &str, b: &str) -> bool {
        match (self.name_to_idx.get(a), self.name_to_idx.get(b)) {
            (Some(&ia), Some(&ib)) => self.graph.find_edge(ia, ib).is_some(),
            _ => false,
        }
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Node names in insertion order.
    pub fn nodes(&self) -> impl Iterator<Item = &str> {
        self.graph.node_weights().map(String::as_str)
    }

    /// Each undirected edge once, endpoints in insertion order.
    pub fn edges(&self) -> impl Iterator<Item = (&str, &str)> {
        self.graph.edge_indices().filter_map(|e| {
            let (a, b) = self.graph.edge_endpoints(e)?;
            Some((self.graph[a].as_str(), self.graph[b].as_str()))
        })
    }

    pub fn neighbors(&self, name: &str) -> Vec<&str> {
        let Some(&idx) = self.name_to_idx.get(name) else {
            return Vec::new();
        };
        let mut names: Vec<&str> = self
            .graph
            .neighbors(idx)
            .map(|n| self.graph[n].as_str())
            .collect();
        names.sort_unstable();
        names.dedup();
        names
    }

    /// Nodes that no edge touches.
    pub fn isolated_nodes(&self) -> Vec<&str> {
        self.graph
            .node_indices()
            .filter(|&idx| self.graph.neighbors(idx).next().is_none())
            .map(|idx| self.graph[idx].as_str())
            .collect()
    }
}
