// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 kgpipe contributors

//! Pipeline definition structures
//!
//! Defines the schema for kgpipe.yaml files.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::config::StoreConfig;
use crate::dataset::Dataset;
use crate::errors::{KgError, KgResult};
use crate::model::NodeRef;
use crate::validator::{CountRule, CoverageRule, LivenessProbe};

/// Reference dengue pipeline, written by `kgpipe init`
pub const BUILTIN_PIPELINE: &str = include_str!("../../data/pipeline.yaml");

/// Pipeline definition from kgpipe.yaml
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pipeline {
    /// Pipeline version (for future compatibility)
    #[serde(default = "default_version")]
    pub version: String,

    /// Pipeline name
    pub name: String,

    /// Pipeline description
    #[serde(default)]
    pub description: Option<String>,

    /// Dataset file, relative to the descriptor; built-in dataset when absent
    #[serde(default)]
    pub dataset: Option<PathBuf>,

    /// Stages; order in the file is irrelevant, `depends_on` decides
    pub stages: Vec<Stage>,

    /// Global environment variables
    #[serde(default)]
    pub env: HashMap<String, String>,

    #[serde(default)]
    pub execution: ExecutionConfig,

    #[serde(default)]
    pub store: StoreConfig,
}

fn default_version() -> String {
    "1".to_string()
}

impl Pipeline {
    /// Load pipeline from a YAML file
    pub fn from_file(path: &Path) -> KgResult<Self> {
        if !path.exists() {
            return Err(KgError::PipelineNotFound {
                path: path.to_path_buf(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| KgError::FileReadError {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        Self::from_yaml(&content)
    }

    /// Parse pipeline from YAML string
    pub fn from_yaml(yaml: &str) -> KgResult<Self> {
        serde_yaml::from_str(yaml).map_err(Into::into)
    }

    /// The reference dengue pipeline
    pub fn builtin() -> KgResult<Self> {
        Self::from_yaml(BUILTIN_PIPELINE)
    }

    /// Get all stage names
    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.name.as_str()).collect()
    }

    /// Load the dataset this pipeline names, resolving it against `base_dir`
    pub fn load_dataset(&self, base_dir: &Path) -> KgResult<Dataset> {
        match &self.dataset {
            Some(path) => Dataset::from_file(&base_dir.join(path)),
            None => Dataset::builtin(),
        }
    }
}

/// Orchestrator settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionConfig {
    /// Stages of one batch running at the same time
    #[serde(default = "default_max_parallel")]
    pub max_parallel: usize,

    /// Directory for per-run stage logs
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
}

fn default_max_parallel() -> usize {
    2
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            max_parallel: default_max_parallel(),
            log_dir: None,
        }
    }
}

/// A single pipeline stage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stage {
    /// Stage name (must be unique within pipeline)
    pub name: String,

    /// Stage description
    #[serde(default)]
    pub description: Option<String>,

    /// What the stage does
    pub action: Action,

    /// Stage dependencies (other stage names)
    #[serde(default)]
    pub depends_on: Vec<String>,

    /// Environment variables for this stage
    #[serde(default)]
    pub env: HashMap<String, String>,
}

impl Stage {
    /// Get the action name for this stage
    pub fn action_name(&self) -> &'static str {
        self.action.name()
    }

    /// Pipeline environment overridden by the stage's own
    pub fn merged_env(&self, global: &HashMap<String, String>) -> HashMap<String, String> {
        let mut env = global.clone();
        env.extend(self.env.clone());
        env
    }
}

/// Stage action
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    /// Declare uniqueness constraints; every catalog label when `labels` is empty
    Schema {
        #[serde(default)]
        labels: Vec<String>,
    },

    /// Upsert every dataset entity carrying one of `labels`
    LoadEntities { labels: Vec<String> },

    /// Upsert every dataset relationship of the listed types
    Link {
        relationships: Vec<String>,

        #[serde(default)]
        fallbacks: Vec<LinkFallback>,
    },

    /// Load reference entities and attach them by title keywords
    AttachReferences {
        #[serde(default = "default_reference_label")]
        label: String,

        #[serde(default = "default_reference_relationship")]
        relationship: String,

        #[serde(default)]
        rules: Vec<ReferenceRule>,
    },

    /// Structural validation of the graph
    Validate {
        #[serde(default)]
        coverage: Vec<CoverageRule>,

        #[serde(default)]
        counts: Vec<CountRule>,

        /// Where to write the JSON report, relative to the working directory
        #[serde(default)]
        report: Option<PathBuf>,

        /// Label whose entities get pairwise path lengths in the report
        #[serde(default)]
        path_label: Option<String>,
    },

    /// Liveness probes
    SmokeCheck { probes: Vec<LivenessProbe> },
}

fn default_reference_label() -> String {
    "Reference".to_string()
}

fn default_reference_relationship() -> String {
    "HAS_REFERENCE".to_string()
}

impl Action {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Schema { .. } => "schema",
            Self::LoadEntities { .. } => "load_entities",
            Self::Link { .. } => "link",
            Self::AttachReferences { .. } => "attach_references",
            Self::Validate { .. } => "validate",
            Self::SmokeCheck { .. } => "smoke_check",
        }
    }

    /// Whether the action writes to the store
    pub fn is_mutating(&self) -> bool {
        !matches!(self, Self::Validate { .. } | Self::SmokeCheck { .. })
    }

    /// Labels whose entities this action creates
    pub fn created_labels(&self) -> Vec<&str> {
        match self {
            Self::LoadEntities { labels } => labels.iter().map(String::as_str).collect(),
            Self::AttachReferences { label, .. } => vec![label.as_str()],
            _ => Vec::new(),
        }
    }

    /// Relationship types this action links
    pub fn linked_types(&self) -> Vec<&str> {
        match self {
            Self::Link { relationships, .. } => relationships.iter().map(String::as_str).collect(),
            Self::AttachReferences { relationship, .. } => vec![relationship.as_str()],
            _ => Vec::new(),
        }
    }

    /// Whether a schema action declares the constraint of `label`
    pub fn declares_schema_for(&self, label: &str) -> bool {
        match self {
            Self::Schema { labels } => labels.is_empty() || labels.iter().any(|l| l == label),
            _ => false,
        }
    }
}

/// Default target for entities a link stage left without a relationship
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkFallback {
    pub source_label: String,

    #[serde(rename = "type")]
    pub rel_type: String,

    pub target: NodeRef,
}

/// Attach entities of `label` to references whose title mentions a keyword
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceRule {
    pub label: String,

    pub keywords: Vec<String>,

    /// Used only when no reference matches `keywords`
    #[serde(default)]
    pub fallback_keywords: Vec<String>,
}
