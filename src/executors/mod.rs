// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 kgpipe contributors

//! Stage executors
//!
//! This module provides the executor trait and one implementation per
//! stage action (schema, load, link, references, validation).

mod link;
mod load;
mod references;
mod schema;
mod validate;

pub use link::LinkExecutor;
pub use load::LoadEntitiesExecutor;
pub use references::ReferencesExecutor;
pub use schema::SchemaExecutor;
pub use validate::{SmokeCheckExecutor, ValidateExecutor};

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;
use tracing::info;

use crate::dataset::Dataset;
use crate::errors::{KgError, KgResult};
use crate::model::{WriteCounters, WritePolicy};
use crate::pipeline::Stage;
use crate::store::GraphSession;
use crate::validator::ValidationReport;

/// Environment flag forcing the `refresh` policy for every write
pub const FORCE_REFRESH_ENV: &str = "KGPIPE_FORCE_REFRESH";

/// What a successful stage reports back
#[derive(Debug, Clone, Default)]
pub struct StageSummary {
    /// One-line outcome
    pub message: String,

    /// Upsert outcomes
    pub writes: WriteCounters,

    /// Set by validation stages
    pub report: Option<ValidationReport>,
}

impl StageSummary {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Default::default()
        }
    }

    pub fn with_writes(mut self, writes: WriteCounters) -> Self {
        self.writes = writes;
        self
    }
}

/// Everything a stage may use while it runs
pub struct StageContext<'a> {
    pub stage: &'a Stage,
    pub dataset: &'a Dataset,

    /// Pipeline environment merged with the stage's own
    pub env: HashMap<String, String>,

    pub working_dir: &'a Path,

    /// Session opened for this stage only
    pub session: &'a mut dyn GraphSession,

    notes: Vec<String>,
}

impl<'a> StageContext<'a> {
    pub fn new(
        stage: &'a Stage,
        dataset: &'a Dataset,
        env: HashMap<String, String>,
        working_dir: &'a Path,
        session: &'a mut dyn GraphSession,
    ) -> Self {
        Self {
            stage,
            dataset,
            env,
            working_dir,
            session,
            notes: Vec::new(),
        }
    }

    /// Record a line in the stage log
    pub fn note(&mut self, message: impl Into<String>) {
        let message = message.into();
        info!(stage = %self.stage.name, "{}", message);
        self.notes.push(message);
    }

    /// Lines recorded so far
    pub fn notes(&self) -> &[String] {
        &self.notes
    }

    /// Whether an environment flag is set to a true value
    pub fn flag(&self, name: &str) -> bool {
        self.env
            .get(name)
            .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
            .unwrap_or(false)
    }

    /// Policy to write with, given the one the catalog declares
    pub fn policy_for(&self, declared: WritePolicy) -> WritePolicy {
        if self.flag(FORCE_REFRESH_ENV) {
            WritePolicy::Refresh
        } else {
            declared
        }
    }
}

/// Error for a stage handed to the wrong executor
fn wrong_action(stage: &Stage, expected: &str) -> KgError {
    KgError::InvalidStage {
        stage: stage.name.clone(),
        reason: format!("expected a {} action, got {}", expected, stage.action_name()),
    }
}

/// Trait for stage executors
#[async_trait]
pub trait Executor: Send + Sync {
    /// Execute a stage
    ///
    /// A failing stage may have written part of its data; every write is an
    /// upsert, so re-running it converges.
    async fn execute(&self, ctx: &mut StageContext<'_>) -> KgResult<StageSummary>;

    /// Validate stage configuration
    fn validate_stage(&self, stage: &Stage) -> KgResult<()>;
}

/// Create a standard executor setup with all built-in executors
pub fn create_default_executors() -> HashMap<String, Box<dyn Executor>> {
    let mut executors: HashMap<String, Box<dyn Executor>> = HashMap::new();

    executors.insert("schema".to_string(), Box::new(SchemaExecutor));
    executors.insert("load_entities".to_string(), Box::new(LoadEntitiesExecutor));
    executors.insert("link".to_string(), Box::new(LinkExecutor));
    executors.insert("attach_references".to_string(), Box::new(ReferencesExecutor));
    executors.insert("validate".to_string(), Box::new(ValidateExecutor));
    executors.insert("smoke_check".to_string(), Box::new(SmokeCheckExecutor));

    executors
}
