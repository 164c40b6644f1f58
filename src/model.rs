// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 kgpipe contributors

//! Property-graph data model
//!
//! Entities are identified by `(label, natural key)`, relationships by
//! `(source, type, target)`. Neither carries a store-generated identifier.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Named scalar attributes of an entity or relationship
pub type Attributes = BTreeMap<String, serde_json::Value>;

/// Reference to an entity by label and natural key
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeRef {
    pub label: String,
    pub key: String,
}

impl NodeRef {
    pub fn new(label: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            key: key.into(),
        }
    }
}

impl fmt::Display for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} '{}'", self.label, self.key)
    }
}

/// A typed node in the graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    /// Label (entity type), e.g. `Disease`
    pub label: String,

    /// Natural key value
    pub key: String,

    /// Attributes besides the natural key
    #[serde(default)]
    pub attributes: Attributes,
}

impl Entity {
    pub fn new(label: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            key: key.into(),
            attributes: Attributes::new(),
        }
    }

    /// Builder-style attribute setter
    pub fn with_attr(mut self, name: &str, value: impl Into<serde_json::Value>) -> Self {
        self.attributes.insert(name.to_string(), value.into());
        self
    }

    pub fn node_ref(&self) -> NodeRef {
        NodeRef::new(&self.label, &self.key)
    }
}

/// A typed, directed edge between two entities
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
    #[serde(rename = "type")]
    pub rel_type: String,

    #[serde(rename = "from")]
    pub source: NodeRef,

    #[serde(rename = "to")]
    pub target: NodeRef,

    #[serde(default)]
    pub attributes: Attributes,
}

impl Relationship {
    pub fn new(rel_type: impl Into<String>, source: NodeRef, target: NodeRef) -> Self {
        Self {
            rel_type: rel_type.into(),
            source,
            target,
            attributes: Attributes::new(),
        }
    }

    pub fn with_attr(mut self, name: &str, value: impl Into<serde_json::Value>) -> Self {
        self.attributes.insert(name.to_string(), value.into());
        self
    }

    /// Identity of the edge; attributes are not part of it
    pub fn identity(&self) -> RelationshipKey {
        RelationshipKey {
            source: self.source.clone(),
            rel_type: self.rel_type.clone(),
            target: self.target.clone(),
        }
    }
}

/// `(source, type, target)` triple identifying a relationship
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RelationshipKey {
    pub source: NodeRef,
    pub rel_type: String,
    pub target: NodeRef,
}

impl fmt::Display for RelationshipKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({})-[:{}]->({})", self.source, self.rel_type, self.target)
    }
}

/// What an upsert does to attributes of an element that already exists
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WritePolicy {
    /// Set attributes only when the element is first created
    #[default]
    CreateOnly,
    /// Overwrite the supplied attributes on every run
    Refresh,
}

impl fmt::Display for WritePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CreateOnly => write!(f, "create_only"),
            Self::Refresh => write!(f, "refresh"),
        }
    }
}

/// Edge direction relative to an entity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    Outgoing,
    Incoming,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Outgoing => write!(f, "outgoing"),
            Self::Incoming => write!(f, "incoming"),
        }
    }
}

/// Result of a single upsert
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Created,
    Updated,
    Unchanged,
}

/// Running tally of upsert outcomes for a stage
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteCounters {
    pub created: usize,
    pub updated: usize,
    pub unchanged: usize,
}

impl WriteCounters {
    pub fn record(&mut self, outcome: WriteOutcome) {
        match outcome {
            WriteOutcome::Created => self.created += 1,
            WriteOutcome::Updated => self.updated += 1,
            WriteOutcome::Unchanged => self.unchanged += 1,
        }
    }

    pub fn merge(&mut self, other: WriteCounters) {
        self.created += other.created;
        self.updated += other.updated;
        self.unchanged += other.unchanged;
    }

    pub fn total(&self) -> usize {
        self.created + self.updated + self.unchanged
    }
}

impl fmt::Display for WriteCounters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} created, {} updated, {} unchanged",
            self.created, self.updated, self.unchanged
        )
    }
}
