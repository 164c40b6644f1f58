// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 kgpipe contributors

//! Parameterized read queries and their tabular results

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::model::Direction;

/// Read query understood by every store
///
/// Each variant documents the columns of its result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReadQuery {
    /// `n` = 1
    Ping,

    /// `label`, `count` for every label holding entities
    CountByLabel,

    /// `type`, `count` for every relationship type in use
    CountByRelationshipType,

    /// `key`, `attributes` for every entity of a label
    Entities { label: String },

    /// `label`, `key`, `attributes`, `relationship` for every neighbour of an
    /// entity across `type` edges in `direction`
    Related {
        label: String,
        key: String,
        #[serde(rename = "type")]
        rel_type: String,
        #[serde(default)]
        direction: Direction,
    },

    /// `key`, `degree` for every entity of a label, counting `type` edges in
    /// `direction`
    Degree {
        label: String,
        #[serde(rename = "type")]
        rel_type: String,
        #[serde(default)]
        direction: Direction,
    },

    /// `label`, `key`, `connections` for the `limit` entities with the most
    /// relationships of any type and direction, most connected first
    MostConnected { limit: usize },

    /// `source`, `target`, `length` for every pair of distinct entities of a
    /// label joined by some path, ignoring relationship direction.
    /// Each pair appears once, with `source` ordered before `target`.
    ShortestPaths { label: String },
}

impl ReadQuery {
    /// Columns a result of this query carries
    pub fn columns(&self) -> &'static [&'static str] {
        match self {
            Self::Ping => &["n"],
            Self::CountByLabel => &["label", "count"],
            Self::CountByRelationshipType => &["type", "count"],
            Self::Entities { .. } => &["key", "attributes"],
            Self::Related { .. } => &["label", "key", "attributes", "relationship"],
            Self::Degree { .. } => &["key", "degree"],
            Self::MostConnected { .. } => &["label", "key", "connections"],
            Self::ShortestPaths { .. } => &["source", "target", "length"],
        }
    }
}

/// Tabular query result
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl QueryResult {
    /// Empty result with the given columns
    pub fn new(columns: &[&str]) -> Self {
        Self {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            rows: Vec::new(),
        }
    }

    /// Empty result shaped for a query
    pub fn for_query(query: &ReadQuery) -> Self {
        Self::new(query.columns())
    }

    pub fn push(&mut self, row: Vec<Value>) {
        self.rows.push(row);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Value of `column` in row `row`
    pub fn get(&self, row: usize, column: &str) -> Option<&Value> {
        let idx = self.column_index(column)?;
        self.rows.get(row)?.get(idx)
    }

    /// All string values of a column, skipping non-strings
    pub fn strings(&self, column: &str) -> Vec<String> {
        let Some(idx) = self.column_index(column) else {
            return Vec::new();
        };
        self.rows
            .iter()
            .filter_map(|row| row.get(idx).and_then(Value::as_str).map(String::from))
            .collect()
    }
}
