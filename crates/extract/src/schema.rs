use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityType {
    Person,
    Organization,
    Location,
    Event,
    Concept,
}

impl EntityType {
    pub const ALL: [EntityType; 5] = [
        EntityType::Person,
        EntityType::Organization,
        EntityType::Location,
        EntityType::Event,
        EntityType::Concept,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Person => "person",
            EntityType::Organization => "organization",
            EntityType::Location => "location",
            EntityType::Event => "event",
            EntityType::Concept => "concept",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        Self::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s))
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    #[serde(rename = "entity_name")]
    pub name: String,
    #[serde(rename = "entity_description", default)]
    pub description: String,
    /// Kept as returned; the model is asked for an [`EntityType`] but not checked.
    #[serde(rename = "entity_type", default)]
    pub entity_type: String,
}

impl Entity {
    pub fn kind(&self) -> Option<EntityType> {
        EntityType::parse(&self.entity_type)
    }
}

/// Tool input of the entity pass.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EntityExtraction {
    #[serde(default)]
    pub entities: Vec<Entity>,
}

/// One relationship as returned by the model. Endpoints may be missing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RelationshipRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_1: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_2: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relationship: Option<String>,
}

impl RelationshipRecord {
    pub fn new(a: &str, b: &str, relationship: &str) -> Self {
        Self {
            entity_1: Some(a.to_string()),
            entity_2: Some(b.to_string()),
            relationship: Some(relationship.to_string()),
        }
    }

    /// Both endpoints, if the record has them.
    pub fn endpoints(&self) -> Option<(&str, &str)> {
        match (&self.entity_1, &self.entity_2) {
            (Some(a), Some(b)) => Some((a.as_str(), b.as_str())),
            _ => None,
        }
    }
}

/// Tool input of the relationship pass.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Relationships {
    #[serde(default)]
    pub relationships: Vec<RelationshipRecord>,
}

impl Relationships {
    /// Records naming an endpoint that is not in `vocabulary`.
    pub fn out_of_vocabulary<'a>(&'a self, vocabulary: &[String]) -> Vec<&'a RelationshipRecord> {
        let known: HashSet<&str> = vocabulary.iter().map(String::as_str).collect();
        self.relationships
            .iter()
            .filter(|r| match r.endpoints() {
                Some((a, b)) => !known.contains(a) || !known.contains(b),
                None => false,
            })
            .collect()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub entities: Vec<Entity>,
    pub relationships: Vec<RelationshipRecord>,
}

impl ExtractionResult {
    pub fn vocabulary(&self) -> Vec<String> {
        vocabulary(&self.entities)
    }
}

/// Entity names in first-seen order, without duplicates.
pub fn vocabulary(entities: &[Entity]) -> Vec<String> {
    let mut seen = HashSet::new();
    entities
        .iter()
        .filter(|e| seen.insert(e.name.as_str()))
        .map(|e| e.name.clone())
        .collect()
}
