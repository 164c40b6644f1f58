// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 kgpipe contributors

//! Validation rule declarations, as written in the pipeline descriptor

use serde::{Deserialize, Serialize};

use crate::model::Direction;
use crate::store::ReadQuery;

/// Every entity of `label` has at least `min_degree` `type` edges in `direction`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoverageRule {
    pub id: String,

    pub label: String,

    #[serde(rename = "type")]
    pub rel_type: String,

    #[serde(default)]
    pub direction: Direction,

    #[serde(default = "default_min_degree")]
    pub min_degree: usize,
}

fn default_min_degree() -> usize {
    1
}

impl CoverageRule {
    pub fn new(id: &str, label: &str, rel_type: &str) -> Self {
        Self {
            id: id.to_string(),
            label: label.to_string(),
            rel_type: rel_type.to_string(),
            direction: Direction::Outgoing,
            min_degree: default_min_degree(),
        }
    }

    pub fn incoming(mut self) -> Self {
        self.direction = Direction::Incoming;
        self
    }
}

/// At least `min` entities carry `label`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountRule {
    pub id: String,
    pub label: String,
    pub min: usize,
}

/// A read query of the shape downstream consumers issue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LivenessProbe {
    pub id: String,

    pub query: ReadQuery,

    /// Columns the result must carry; all of the query's columns when empty
    #[serde(default)]
    pub expect_columns: Vec<String>,

    #[serde(default = "default_min_rows")]
    pub min_rows: usize,
}

fn default_min_rows() -> usize {
    1
}

impl LivenessProbe {
    pub fn new(id: &str, query: ReadQuery) -> Self {
        Self {
            id: id.to_string(),
            query,
            expect_columns: Vec::new(),
            min_rows: default_min_rows(),
        }
    }

    /// Columns checked against the result
    pub fn expected_columns(&self) -> Vec<String> {
        if self.expect_columns.is_empty() {
            self.query.columns().iter().map(|c| c.to_string()).collect()
        } else {
            self.expect_columns.clone()
        }
    }
}
