//! Listing intent classification: the model picks between an "add" schema
//! and a "search" schema, and the result is decoded into [`PropertyIntent`].

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

use crate::errors::ToolUseError;
use crate::llm::{GenerationParams, ToolUse, ToolUseClient};
use crate::tools::ToolSpec;

pub const ADD_TOOL: &str = "add_property";
pub const SEARCH_TOOL: &str = "search_property";

const PROPERTY_TYPES: [&str; 4] = ["house", "apartment", "studio", "villa"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddProperty {
    #[serde(rename = "type")]
    pub property_type: String,
    pub location: String,
    /// Square meters.
    pub size: f64,
    pub price: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bedrooms: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchProperty {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub property_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minbedrooms: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maxprice: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minsize: Option<f64>,
}

/// Which of the two declared schemas the model invoked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "intent", rename_all = "lowercase")]
pub enum PropertyIntent {
    Add(AddProperty),
    Search(SearchProperty),
}

impl PropertyIntent {
    pub fn tool_name(&self) -> &'static str {
        match self {
            PropertyIntent::Add(_) => ADD_TOOL,
            PropertyIntent::Search(_) => SEARCH_TOOL,
        }
    }

    pub fn tools() -> Vec<ToolSpec> {
        vec![add_property_tool(), search_property_tool()]
    }
}

impl TryFrom<ToolUse> for PropertyIntent {
    type Error = ToolUseError;

    fn try_from(tool_use: ToolUse) -> Result<Self, Self::Error> {
        let ToolUse { name, input, .. } = tool_use;
        let decoded = if name == ADD_TOOL {
            serde_json::from_value(input).map(PropertyIntent::Add)
        } else if name == SEARCH_TOOL {
            serde_json::from_value(input).map(PropertyIntent::Search)
        } else {
            return Err(ToolUseError::UnknownTool { name });
        };
        decoded.map_err(|source| ToolUseError::InvalidInput { name, source })
    }
}

/// Ask the model whether `text` adds a listing or searches for one.
pub async fn classify(
    client: &ToolUseClient,
    text: &str,
    params: &GenerationParams,
) -> Result<PropertyIntent, ToolUseError> {
    let tool_use = client
        .invoke_tools(text, &PropertyIntent::tools(), params)
        .await?;
    let intent = PropertyIntent::try_from(tool_use)?;
    info!(intent = intent.tool_name(), "Classified listing request");
    Ok(intent)
}

pub fn add_property_tool() -> ToolSpec {
    ToolSpec::new(
        ADD_TOOL,
        "Add a new property listing to the database.",
        json!({
            "type": "object",
            "properties": {
                "type": { "type": "string", "enum": PROPERTY_TYPES, "description": "Kind of property." },
                "location": { "type": "string", "description": "City or neighbourhood." },
                "size": { "type": "number", "description": "Living area in square meters." },
                "price": { "type": "number", "description": "Asking price." },
                "bedrooms": { "type": "integer", "description": "Number of bedrooms." },
                "description": { "type": "string", "description": "Free-text description." }
            },
            "required": ["type", "location", "size", "price"]
        }),
    )
}

pub fn search_property_tool() -> ToolSpec {
    ToolSpec::new(
        SEARCH_TOOL,
        "Search the database for properties matching the given criteria.",
        json!({
            "type": "object",
            "properties": {
                "type": { "type": "string", "enum": PROPERTY_TYPES, "description": "Kind of property." },
                "location": { "type": "string", "description": "City or neighbourhood." },
                "minbedrooms": { "type": "integer", "description": "Minimum number of bedrooms." },
                "maxprice": { "type": "number", "description": "Maximum price." },
                "minsize": { "type": "number", "description": "Minimum living area in square meters." }
            },
            "required": ["location"]
        }),
    )
}
