// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 kgpipe contributors

//! Structured validation reports

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Which family of checks produced a result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckCategory {
    Coverage,
    Count,
    Liveness,
}

impl fmt::Display for CheckCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Coverage => write!(f, "coverage"),
            Self::Count => write!(f, "count"),
            Self::Liveness => write!(f, "liveness"),
        }
    }
}

/// Outcome of one rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckResult {
    pub rule_id: String,
    pub category: CheckCategory,
    pub passed: bool,

    /// Natural keys of the entities breaking the rule, sorted
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub offending_keys: Vec<String>,

    pub detail: String,
}

impl CheckResult {
    pub fn pass(rule_id: &str, category: CheckCategory, detail: impl Into<String>) -> Self {
        Self {
            rule_id: rule_id.to_string(),
            category,
            passed: true,
            offending_keys: Vec::new(),
            detail: detail.into(),
        }
    }

    pub fn fail(rule_id: &str, category: CheckCategory, detail: impl Into<String>) -> Self {
        Self {
            passed: false,
            ..Self::pass(rule_id, category, detail)
        }
    }

    pub fn with_offending_keys(mut self, mut keys: Vec<String>) -> Self {
        keys.sort();
        self.offending_keys = keys;
        self
    }
}

/// Entity counts per label and relationship counts per type, with the most
/// connected entities and path lengths between entities of one label
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphSummary {
    pub entities: BTreeMap<String, usize>,
    pub relationships: BTreeMap<String, usize>,
    #[serde(default)]
    pub top_connected: Vec<ConnectedEntity>,
    #[serde(default)]
    pub paths: Vec<PathLength>,
}

/// An entity and its relationship count, all types and directions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectedEntity {
    pub label: String,
    pub key: String,
    pub connections: usize,
}

/// Shortest undirected path between two entities
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathLength {
    pub source: String,
    pub target: String,
    pub length: usize,
}

impl GraphSummary {
    pub fn entity_count(&self, label: &str) -> usize {
        self.entities.get(label).copied().unwrap_or(0)
    }

    pub fn relationship_count(&self, rel_type: &str) -> usize {
        self.relationships.get(rel_type).copied().unwrap_or(0)
    }

    pub fn total_entities(&self) -> usize {
        self.entities.values().sum()
    }

    pub fn total_relationships(&self) -> usize {
        self.relationships.values().sum()
    }

    /// Longest of the shortest paths, when any pair is connected
    pub fn diameter(&self) -> Option<usize> {
        self.paths.iter().map(|p| p.length).max()
    }
}

/// One `(rule, key)` pair of a failed check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    pub rule_id: String,
    /// Absent for checks that fail as a whole (counts, liveness)
    pub key: Option<String>,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.key {
            Some(key) => write!(f, "{}: '{}'", self.rule_id, key),
            None => write!(f, "{}", self.rule_id),
        }
    }
}

/// Results of a validation run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub checks: Vec<CheckResult>,
    pub summary: GraphSummary,
}

impl ValidationReport {
    /// True when every check passed
    pub fn passed(&self) -> bool {
        self.checks.iter().all(|c| c.passed)
    }

    pub fn failed_checks(&self) -> impl Iterator<Item = &CheckResult> {
        self.checks.iter().filter(|c| !c.passed)
    }

    /// Failed checks flattened into `(rule, key)` pairs
    pub fn violations(&self) -> Vec<Violation> {
        let mut violations = Vec::new();
        for check in self.failed_checks() {
            if check.offending_keys.is_empty() {
                violations.push(Violation {
                    rule_id: check.rule_id.clone(),
                    key: None,
                });
            } else {
                violations.extend(check.offending_keys.iter().map(|key| Violation {
                    rule_id: check.rule_id.clone(),
                    key: Some(key.clone()),
                }));
            }
        }
        violations
    }

    pub fn check(&self, rule_id: &str) -> Option<&CheckResult> {
        self.checks.iter().find(|c| c.rule_id == rule_id)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
