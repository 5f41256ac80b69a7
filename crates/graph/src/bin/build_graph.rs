use anyhow::{Context, Result};
use clap::Parser;
use extract::{Extractor, LlmConfig, ToolUseClient};
use graph::{GraphBuilder, export_graph};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Extract entities and relationships from a text file and build an entity graph
#[derive(Parser)]
#[command(version, about)]
struct Args {
    /// Text file to extract from
    input: PathBuf,

    /// Directory for graph.json, graph.dot and extraction.json
    #[arg(long, short, default_value = "output")]
    output_dir: PathBuf,

    /// Model identifier (overrides LLM_MODEL_ID)
    #[arg(long)]
    model: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let text = tokio::fs::read_to_string(&args.input)
        .await
        .context(format!("Failed to read {:?}", args.input))?;

    let mut config = LlmConfig::from_env();
    if let Some(model) = args.model {
        config.model_id = model;
    }

    let builder = GraphBuilder::new(Extractor::new(ToolUseClient::new(&config)?));
    let (extraction, graph) = builder.build_from_text(&text).await?;

    println!("=== Entity Graph ===\n");
    println!("Entities:      {}", extraction.entities.len());
    println!("Relationships: {}", extraction.relationships.len());
    println!("Nodes:         {}", graph.node_count());
    println!("Edges:         {}", graph.edge_count());

    let isolated = graph.isolated_nodes();
    if !isolated.is_empty() {
        println!("Isolated:      {}", isolated.join(", "));
    }

    println!();
    for (a, b) in graph.edges() {
        println!("  {} -- {}", a, b);
    }

    export_graph(&graph, &args.output_dir).await?;
    let extraction_json = serde_json::to_string_pretty(&extraction)?;
    tokio::fs::write(args.output_dir.join("extraction.json"), extraction_json).await?;

    println!("\n✅ Graph saved to {}", args.output_dir.display());
    Ok(())
}
