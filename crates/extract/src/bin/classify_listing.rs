use anyhow::Result;
use clap::Parser;
use extract::{LlmConfig, PropertyIntent, ToolUseClient, property};
use tracing_subscriber::EnvFilter;

/// Ask the model whether a listing request adds a property or searches for one
#[derive(Parser)]
#[command(version, about)]
struct Args {
    /// Free-text request, e.g. "Find apartments in London under 400000"
    text: String,

    /// Model identifier (overrides LLM_MODEL_ID)
    #[arg(long)]
    model: Option<String>,

    /// Sampling temperature
    #[arg(long, default_value_t = 0.0)]
    temperature: f32,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let mut config = LlmConfig::from_env();
    if let Some(model) = args.model {
        config.model_id = model;
    }
    config.temperature = args.temperature;

    let client = ToolUseClient::new(&config)?;
    let intent = property::classify(&client, &args.text, &client.params()).await?;

    match &intent {
        PropertyIntent::Add(add) => {
            println!("ADD {} in {}", add.property_type, add.location);
            println!("  size:  {} m2", add.size);
            println!("  price: {}", add.price);
            if let Some(bedrooms) = add.bedrooms {
                println!("  bedrooms: {}", bedrooms);
            }
        }
        PropertyIntent::Search(search) => {
            println!(
                "SEARCH {} in {}",
                search.property_type.as_deref().unwrap_or("any property"),
                search.location.as_deref().unwrap_or("any location")
            );
            if let Some(min) = search.minbedrooms {
                println!("  min bedrooms: {}", min);
            }
            if let Some(max) = search.maxprice {
                println!("  max price: {}", max);
            }
            if let Some(min) = search.minsize {
                println!("  min size: {} m2", min);
            }
        }
    }

    println!("{}", serde_json::to_string_pretty(&intent)?);
    Ok(())
}
