// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 kgpipe contributors

//! Error types
//!
//! Every failure carries enough context (stage, label, key) for the final
//! pipeline report, and the common ones come with a recovery suggestion.

mod recovery;

pub use recovery::RecoverySuggestion;

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

use crate::validator::ValidationReport;

/// Result type for kgpipe operations
pub type KgResult<T> = Result<T, KgError>;

/// Main error type for kgpipe
#[derive(Error, Debug, Diagnostic)]
pub enum KgError {
    // ─────────────────────────────────────────────────────────────────────────
    // Graph Store Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("Could not connect to graph store at '{uri}': {reason}")]
    #[diagnostic(
        code(kgpipe::connection_error),
        help("Check that the graph store is running and GRAPH_STORE_URI points at it")
    )]
    Connection { uri: String, reason: String },

    #[error("Unsupported graph store URI: {uri}")]
    #[diagnostic(
        code(kgpipe::unsupported_store),
        help("Supported stores: memory:// and file://<path-to-snapshot.json>")
    )]
    UnsupportedStore { uri: String },

    #[error("Constraint violation on label '{label}': {reason}")]
    #[diagnostic(code(kgpipe::constraint_violation))]
    ConstraintViolation { label: String, reason: String },

    #[error("Label '{label}' has no uniqueness constraint declared")]
    #[diagnostic(
        code(kgpipe::schema_missing),
        help("Run the schema stage (with '{label}' among its labels) before loading data")
    )]
    SchemaMissing { label: String },

    #[error("Write conflict on {label} '{key}': {reason}")]
    #[diagnostic(code(kgpipe::write_conflict))]
    WriteConflict {
        label: String,
        key: String,
        reason: String,
    },

    #[error("Cannot link {rel_type}: {endpoint} {label} '{key}' does not exist")]
    #[diagnostic(
        code(kgpipe::missing_endpoint),
        help("The stage creating '{label}' entities must complete before this stage")
    )]
    MissingEndpoint {
        rel_type: String,
        endpoint: String,
        label: String,
        key: String,
    },

    #[error("Graph validation failed with {violations} violation(s)")]
    #[diagnostic(code(kgpipe::validation_failed))]
    ValidationFailed {
        violations: usize,
        report: Box<ValidationReport>,
    },

    #[error("Graph store error: {message}")]
    #[diagnostic(code(kgpipe::store_error))]
    Store { message: String },

    // ─────────────────────────────────────────────────────────────────────────
    // Pipeline Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("Pipeline file not found: {path}")]
    #[diagnostic(
        code(kgpipe::pipeline_not_found),
        help("Create one with 'kgpipe init' or pass --pipeline")
    )]
    PipelineNotFound { path: PathBuf },

    #[error("Invalid pipeline configuration: {reason}")]
    #[diagnostic(code(kgpipe::invalid_pipeline))]
    InvalidPipeline {
        reason: String,
        #[help]
        help: Option<String>,
    },

    #[error("Circular dependency detected between stages: {}", .stages.join(", "))]
    #[diagnostic(
        code(kgpipe::circular_dependency),
        help("Review your stage dependencies to remove the cycle")
    )]
    CircularDependency { stages: Vec<String> },

    #[error("Stage '{stage}' depends on unknown stage '{dependency}'")]
    #[diagnostic(
        code(kgpipe::unknown_dependency),
        help("Check that '{dependency}' is defined in your pipeline")
    )]
    UnknownDependency { stage: String, dependency: String },

    #[error("Stages not reachable from any source stage: {}", .stages.join(", "))]
    #[diagnostic(code(kgpipe::unreachable_stages))]
    UnreachableStages { stages: Vec<String> },

    #[error("Stage '{stage}' not found in pipeline")]
    #[diagnostic(code(kgpipe::stage_not_found))]
    StageNotFound { stage: String },

    #[error("No executor registered for action: {action}")]
    #[diagnostic(
        code(kgpipe::executor_not_found),
        help("Available actions: schema, load_entities, link, attach_references, validate, smoke_check")
    )]
    ExecutorNotFound { action: String },

    #[error("Stage '{stage}' is invalid: {reason}")]
    #[diagnostic(code(kgpipe::invalid_stage))]
    InvalidStage { stage: String, reason: String },

    #[error("Invalid dataset: {reason}")]
    #[diagnostic(code(kgpipe::invalid_dataset))]
    InvalidDataset { reason: String },

    // ─────────────────────────────────────────────────────────────────────────
    // IO/System Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("Failed to read file '{path}': {error}")]
    #[diagnostic(code(kgpipe::file_read_error))]
    FileReadError { path: PathBuf, error: String },

    #[error("Failed to write file '{path}': {error}")]
    #[diagnostic(code(kgpipe::file_write_error))]
    FileWriteError { path: PathBuf, error: String },

    #[error("IO error: {message}")]
    #[diagnostic(code(kgpipe::io_error))]
    Io { message: String },

    #[error("YAML parsing error: {message}")]
    #[diagnostic(code(kgpipe::yaml_error))]
    Yaml { message: String },

    #[error("JSON parsing error: {message}")]
    #[diagnostic(code(kgpipe::json_error))]
    Json { message: String },
}

impl From<std::io::Error> for KgError {
    fn from(e: std::io::Error) -> Self {
        Self::Io { message: e.to_string() }
    }
}

impl From<serde_yaml::Error> for KgError {
    fn from(e: serde_yaml::Error) -> Self {
        Self::Yaml { message: e.to_string() }
    }
}

impl From<serde_json::Error> for KgError {
    fn from(e: serde_json::Error) -> Self {
        Self::Json { message: e.to_string() }
    }
}

impl KgError {
    /// Classify this error for the per-stage failure report
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            Self::Connection { .. } | Self::UnsupportedStore { .. } => FailureKind::Connection,
            Self::ConstraintViolation { .. } => FailureKind::ConstraintViolation,
            Self::WriteConflict { .. } => FailureKind::WriteConflict,
            Self::MissingEndpoint { .. } => FailureKind::MissingEndpoint,
            Self::SchemaMissing { .. } => FailureKind::SchemaMissing,
            Self::ValidationFailed { .. } => FailureKind::ValidationFailure,
            _ => FailureKind::Internal,
        }
    }

    /// Build a validation failure from a report with at least one failed check
    pub fn validation_failed(report: ValidationReport) -> Self {
        Self::ValidationFailed {
            violations: report.violations().len(),
            report: Box::new(report),
        }
    }

    pub fn missing_endpoint(rel_type: &str, endpoint: &str, node: &crate::model::NodeRef) -> Self {
        Self::MissingEndpoint {
            rel_type: rel_type.to_string(),
            endpoint: endpoint.to_string(),
            label: node.label.clone(),
            key: node.key.clone(),
        }
    }
}

/// Kind of a stage failure, as shown in the pipeline report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Store unreachable
    Connection,
    /// Schema could not be declared as requested
    ConstraintViolation,
    /// An upsert found conflicting data under the same key
    WriteConflict,
    /// A relationship endpoint does not exist yet
    MissingEndpoint,
    /// A label was written before its constraint was declared
    SchemaMissing,
    /// The graph is live but structurally incomplete
    ValidationFailure,
    /// Anything else (IO, configuration)
    Internal,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Connection => "connection error",
            Self::ConstraintViolation => "constraint violation",
            Self::WriteConflict => "write conflict",
            Self::MissingEndpoint => "missing endpoint",
            Self::SchemaMissing => "schema missing",
            Self::ValidationFailure => "validation failure",
            Self::Internal => "internal error",
        };
        write!(f, "{}", name)
    }
}
