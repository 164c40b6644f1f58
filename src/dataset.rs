// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 kgpipe contributors

//! Source dataset and schema catalog
//!
//! The dataset file declares every entity and relationship type (natural key,
//! endpoint labels, write policy) next to the records the stages load.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::OnceLock;

use crate::errors::{KgError, KgResult};
use crate::model::{Entity, NodeRef, Relationship, WritePolicy};

/// Reference dengue knowledge graph, used when a pipeline names no dataset
pub const BUILTIN_DATASET: &str = include_str!("../data/dengue.yaml");

/// Declared entity type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityType {
    pub label: String,

    /// Natural key attribute
    pub key: String,

    #[serde(default)]
    pub policy: WritePolicy,
}

/// Declared relationship type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationshipType {
    #[serde(rename = "type")]
    pub rel_type: String,

    /// Labels allowed at the source end
    pub sources: Vec<String>,

    /// Labels allowed at the target end
    pub targets: Vec<String>,

    #[serde(default)]
    pub policy: WritePolicy,
}

/// Dataset file contents
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Dataset {
    #[serde(default)]
    pub entity_types: Vec<EntityType>,

    #[serde(default)]
    pub relationship_types: Vec<RelationshipType>,

    #[serde(default)]
    pub entities: Vec<Entity>,

    #[serde(default)]
    pub relationships: Vec<Relationship>,

    /// blake3 digest of the source text
    #[serde(skip)]
    pub digest: String,
}

fn label_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Z][A-Za-z0-9]*$").expect("valid label regex"))
}

fn rel_type_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Z][A-Z0-9_]*$").expect("valid type regex"))
}

fn attribute_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[a-z_][a-z0-9_]*$").expect("valid attribute regex"))
}

/// Whether `label` is a valid entity label (`PascalCase`)
pub fn is_valid_label(label: &str) -> bool {
    label_pattern().is_match(label)
}

/// Whether `rel_type` is a valid relationship type (`UPPER_SNAKE`)
pub fn is_valid_rel_type(rel_type: &str) -> bool {
    rel_type_pattern().is_match(rel_type)
}

impl Dataset {
    /// The built-in dengue dataset
    pub fn builtin() -> KgResult<Self> {
        Self::from_yaml(BUILTIN_DATASET)
    }

    /// Load and validate a dataset file
    pub fn from_file(path: &Path) -> KgResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| KgError::FileReadError {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        Self::from_yaml(&content)
    }

    /// Parse and validate a dataset
    pub fn from_yaml(yaml: &str) -> KgResult<Self> {
        let mut dataset: Dataset = serde_yaml::from_str(yaml)?;
        dataset.digest = blake3::hash(yaml.as_bytes()).to_hex().to_string();
        dataset.validate()?;
        Ok(dataset)
    }

    pub fn entity_type(&self, label: &str) -> Option<&EntityType> {
        self.entity_types.iter().find(|t| t.label == label)
    }

    pub fn relationship_type(&self, rel_type: &str) -> Option<&RelationshipType> {
        self.relationship_types.iter().find(|t| t.rel_type == rel_type)
    }

    /// Write policy declared for a label (create-only when undeclared)
    pub fn entity_policy(&self, label: &str) -> WritePolicy {
        self.entity_type(label).map(|t| t.policy).unwrap_or_default()
    }

    /// Write policy declared for a relationship type
    pub fn relationship_policy(&self, rel_type: &str) -> WritePolicy {
        self.relationship_type(rel_type)
            .map(|t| t.policy)
            .unwrap_or_default()
    }

    pub fn labels(&self) -> Vec<&str> {
        self.entity_types.iter().map(|t| t.label.as_str()).collect()
    }

    pub fn entities_with_label<'a>(&'a self, label: &'a str) -> impl Iterator<Item = &'a Entity> + 'a {
        self.entities.iter().filter(move |e| e.label == label)
    }

    pub fn relationships_of_type<'a>(
        &'a self,
        rel_type: &'a str,
    ) -> impl Iterator<Item = &'a Relationship> + 'a {
        self.relationships.iter().filter(move |r| r.rel_type == rel_type)
    }

    /// Check identifiers, declarations and referential integrity
    pub fn validate(&self) -> KgResult<()> {
        let invalid = |reason: String| -> KgResult<()> { Err(KgError::InvalidDataset { reason }) };

        let mut labels = HashSet::new();
        for entity_type in &self.entity_types {
            if !is_valid_label(&entity_type.label) {
                return invalid(format!(
                    "label '{}' must be PascalCase alphanumeric",
                    entity_type.label
                ));
            }
            if !attribute_pattern().is_match(&entity_type.key) {
                return invalid(format!(
                    "key attribute '{}' of '{}' must be snake_case",
                    entity_type.key, entity_type.label
                ));
            }
            if !labels.insert(entity_type.label.as_str()) {
                return invalid(format!("entity type '{}' declared twice", entity_type.label));
            }
        }

        let mut rel_types = HashSet::new();
        for rel_type in &self.relationship_types {
            if !is_valid_rel_type(&rel_type.rel_type) {
                return invalid(format!(
                    "relationship type '{}' must be UPPER_SNAKE_CASE",
                    rel_type.rel_type
                ));
            }
            if !rel_types.insert(rel_type.rel_type.as_str()) {
                return invalid(format!(
                    "relationship type '{}' declared twice",
                    rel_type.rel_type
                ));
            }
            if rel_type.sources.is_empty() || rel_type.targets.is_empty() {
                return invalid(format!(
                    "relationship type '{}' must declare sources and targets",
                    rel_type.rel_type
                ));
            }
            for label in rel_type.sources.iter().chain(&rel_type.targets) {
                if !labels.contains(label.as_str()) {
                    return invalid(format!(
                        "relationship type '{}' uses undeclared label '{}'",
                        rel_type.rel_type, label
                    ));
                }
            }
        }

        let mut seen: HashMap<NodeRef, &Entity> = HashMap::new();
        for entity in &self.entities {
            let Some(entity_type) = self.entity_type(&entity.label) else {
                return invalid(format!(
                    "entity '{}' has undeclared label '{}'",
                    entity.key, entity.label
                ));
            };
            if entity.key.trim().is_empty() {
                return invalid(format!("a '{}' entity has an empty key", entity.label));
            }
            if let Some(value) = entity.attributes.get(&entity_type.key) {
                if value.as_str() != Some(entity.key.as_str()) {
                    return invalid(format!(
                        "{} attribute '{}' contradicts its key",
                        entity.node_ref(),
                        entity_type.key
                    ));
                }
            }
            if let Some(previous) = seen.insert(entity.node_ref(), entity) {
                if previous.attributes != entity.attributes {
                    return invalid(format!(
                        "{} is listed twice with different attributes",
                        entity.node_ref()
                    ));
                }
            }
        }

        for rel in &self.relationships {
            let Some(rel_type) = self.relationship_type(&rel.rel_type) else {
                return invalid(format!("undeclared relationship type '{}'", rel.rel_type));
            };
            if !rel_type.sources.contains(&rel.source.label) {
                return invalid(format!(
                    "{} cannot start a {} relationship",
                    rel.source, rel.rel_type
                ));
            }
            if !rel_type.targets.contains(&rel.target.label) {
                return invalid(format!(
                    "{} cannot end a {} relationship",
                    rel.target, rel.rel_type
                ));
            }
            for endpoint in [&rel.source, &rel.target] {
                if !seen.contains_key(endpoint) {
                    return invalid(format!(
                        "{} relationship refers to unknown {}",
                        rel.rel_type, endpoint
                    ));
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SMALL: &str = r#"
entity_types:
  - { label: Disease, key: name }
  - { label: Symptom, key: name, policy: refresh }
relationship_types:
  - { type: HAS_SYMPTOM, sources: [Disease], targets: [Symptom] }
entities:
  - { label: Disease, key: Dengue Fever, attributes: { icd10: A90 } }
  - { label: Symptom, key: Fever }
relationships:
  - type: HAS_SYMPTOM
    from: { label: Disease, key: Dengue Fever }
    to: { label: Symptom, key: Fever }
"#;

    #[test]
    fn test_parse_small_dataset() {
        let dataset = Dataset::from_yaml(SMALL).unwrap();
        assert_eq!(dataset.labels(), vec!["Disease", "Symptom"]);
        assert_eq!(dataset.entity_policy("Symptom"), WritePolicy::Refresh);
        assert_eq!(dataset.entity_policy("Disease"), WritePolicy::CreateOnly);
        assert_eq!(dataset.relationships_of_type("HAS_SYMPTOM").count(), 1);
        assert_eq!(dataset.digest.len(), 64);
    }

    #[test]
    fn test_builtin_dataset_is_valid() {
        let dataset = Dataset::builtin().unwrap();
        assert!(dataset.entity_type("Disease").is_some());
        assert!(dataset.entity_type("OntologyTerm").is_some());
        assert!(dataset.entities_with_label("Disease").count() >= 2);
    }

    #[test]
    fn test_rejects_dangling_relationship() {
        let yaml = SMALL.replace("to: { label: Symptom, key: Fever }", "to: { label: Symptom, key: Rash }");
        let err = Dataset::from_yaml(&yaml).unwrap_err();
        assert!(matches!(err, KgError::InvalidDataset { reason } if reason.contains("Rash")));
    }

    #[test]
    fn test_rejects_bad_identifiers() {
        let yaml = SMALL.replace("HAS_SYMPTOM, sources", "has-symptom, sources");
        assert!(matches!(
            Dataset::from_yaml(&yaml),
            Err(KgError::InvalidDataset { .. })
        ));

        assert!(is_valid_label("OntologyTerm"));
        assert!(!is_valid_label("ontology_term"));
        assert!(is_valid_rel_type("HAS_ONTOLOGY_TERM"));
    }

    #[test]
    fn test_rejects_conflicting_duplicates() {
        let yaml = SMALL.replace(
            "  - { label: Symptom, key: Fever }",
            "  - { label: Symptom, key: Fever }\n  - { label: Symptom, key: Fever, attributes: { severity: high } }",
        );
        assert!(matches!(
            Dataset::from_yaml(&yaml),
            Err(KgError::InvalidDataset { .. })
        ));
    }
}
