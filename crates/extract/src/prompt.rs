pub fn build_entity_prompt(text: &str) -> String {
    format!(
        r#"Extract the entities mentioned in the following text.

RULES:
- Use the entity name exactly as it appears in the text
- Each entity gets one short description
- Entity types must be one of: person, organization, location, event, concept
- List each entity only once

TEXT:
{}"#,
        text
    )
}

/// The vocabulary is embedded as a JSON array so names with commas survive.
pub fn build_relationship_prompt(text: &str, vocabulary: &[String]) -> String {
    let entities = serde_json::to_string(vocabulary).unwrap_or_else(|_| "[]".to_string());

    format!(
        r#"Extract the relationships between entities in the following text.

RULES:
- Only use entity names from this list: {}
- Each relationship connects exactly two entities
- Describe the relationship with a short phrase

TEXT:
{}"#,
        entities, text
    )
}
