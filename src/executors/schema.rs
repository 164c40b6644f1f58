// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 kgpipe contributors

//! Schema executor
//!
//! Declares one uniqueness constraint per label on its natural key.

use async_trait::async_trait;

use super::{wrong_action, Executor, StageContext, StageSummary};
use crate::errors::{KgError, KgResult};
use crate::pipeline::{Action, Stage};
use crate::store::ConstraintOutcome;

/// Schema executor
pub struct SchemaExecutor;

#[async_trait]
impl Executor for SchemaExecutor {
    async fn execute(&self, ctx: &mut StageContext<'_>) -> KgResult<StageSummary> {
        let (stage, dataset) = (ctx.stage, ctx.dataset);
        let Action::Schema { labels } = &stage.action else {
            return Err(wrong_action(stage, "schema"));
        };

        let labels: Vec<String> = if labels.is_empty() {
            dataset.labels().into_iter().map(String::from).collect()
        } else {
            labels.clone()
        };

        let mut declared = 0;
        let mut present = 0;
        for label in &labels {
            let entity_type = dataset.entity_type(label).ok_or_else(|| KgError::InvalidStage {
                stage: stage.name.clone(),
                reason: format!("label '{}' is not in the dataset catalog", label),
            })?;

            match ctx.session.declare_constraint(label, &entity_type.key).await? {
                ConstraintOutcome::Declared => {
                    declared += 1;
                    ctx.note(format!("declared {}.{} unique", label, entity_type.key));
                }
                ConstraintOutcome::AlreadyDeclared => present += 1,
            }
        }

        Ok(StageSummary::new(format!(
            "{} constraint(s) declared, {} already present",
            declared, present
        )))
    }

    fn validate_stage(&self, stage: &Stage) -> KgResult<()> {
        match &stage.action {
            Action::Schema { .. } => Ok(()),
            _ => Err(wrong_action(stage, "schema")),
        }
    }
}
