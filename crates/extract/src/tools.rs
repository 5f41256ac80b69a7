use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::schema::EntityType;

pub const ENTITY_TOOL: &str = "extract_entities";
pub const RELATIONSHIP_TOOL: &str = "extract_relationships";

/// A named JSON Schema the model is asked to fill in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

impl ToolSpec {
    pub fn new(name: impl Into<String>, description: impl Into<String>, input_schema: Value) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema,
        }
    }
}

/// Schema for the first pass: every entity mentioned in the text.
pub fn entity_tool() -> ToolSpec {
    let types: Vec<&str> = EntityType::ALL.iter().map(|t| t.as_str()).collect();

    ToolSpec::new(
        ENTITY_TOOL,
        "Extract every named entity mentioned in the text.",
        json!({
            "type": "object",
            "properties": {
                "entities": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "entity_name": {
                                "type": "string",
                                "description": "The name of the entity as written in the text."
                            },
                            "entity_description": {
                                "type": "string",
                                "description": "A short description of the entity."
                            },
                            "entity_type": {
                                "type": "string",
                                "enum": types,
                                "description": "The category the entity belongs to."
                            }
                        },
                        "required": ["entity_name", "entity_description", "entity_type"]
                    }
                }
            },
            "required": ["entities"]
        }),
    )
}

/// Schema for the second pass. Both endpoints are restricted to `vocabulary`.
///
/// An empty vocabulary yields an empty `enum`; the request is still built.
pub fn relationship_tool(vocabulary: &[String]) -> ToolSpec {
    ToolSpec::new(
        RELATIONSHIP_TOOL,
        "Extract the relationships between the given entities.",
        json!({
            "type": "object",
            "properties": {
                "relationships": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "entity_1": {
                                "type": "string",
                                "enum": vocabulary,
                                "description": "The first entity in the relationship."
                            },
                            "entity_2": {
                                "type": "string",
                                "enum": vocabulary,
                                "description": "The second entity in the relationship."
                            },
                            "relationship": {
                                "type": "string",
                                "description": "How the two entities are related."
                            }
                        },
                        "required": ["entity_1", "entity_2", "relationship"]
                    }
                }
            },
            "required": ["relationships"]
        }),
    )
}
