// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 kgpipe contributors

//! Entity load executor

use async_trait::async_trait;

use super::{wrong_action, Executor, StageContext, StageSummary};
use crate::errors::KgResult;
use crate::model::WriteCounters;
use crate::pipeline::{Action, Stage};

/// Upserts the dataset's entities of the stage's labels
pub struct LoadEntitiesExecutor;

#[async_trait]
impl Executor for LoadEntitiesExecutor {
    async fn execute(&self, ctx: &mut StageContext<'_>) -> KgResult<StageSummary> {
        let (stage, dataset) = (ctx.stage, ctx.dataset);
        let Action::LoadEntities { labels } = &stage.action else {
            return Err(wrong_action(stage, "load_entities"));
        };

        let mut writes = WriteCounters::default();
        for label in labels {
            let policy = ctx.policy_for(dataset.entity_policy(label));

            let mut per_label = WriteCounters::default();
            for entity in dataset.entities_with_label(label) {
                per_label.record(ctx.session.upsert_entity(entity, policy).await?);
            }

            ctx.note(format!("{} ({}): {}", label, policy, per_label));
            writes.merge(per_label);
        }

        Ok(StageSummary::new(format!(
            "{} entities across {} label(s): {}",
            writes.total(),
            labels.len(),
            writes
        ))
        .with_writes(writes))
    }

    fn validate_stage(&self, stage: &Stage) -> KgResult<()> {
        match &stage.action {
            Action::LoadEntities { .. } => Ok(()),
            _ => Err(wrong_action(stage, "load_entities")),
        }
    }
}
