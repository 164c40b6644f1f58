// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 kgpipe contributors

//! Relationship link executor
//!
//! Links every dataset relationship of the stage's types, then applies
//! fallbacks: entities still without a relationship of the fallback's type
//! are linked to its default target.

use async_trait::async_trait;
use serde_json::Value;

use super::{wrong_action, Executor, StageContext, StageSummary};
use crate::errors::KgResult;
use crate::model::{Direction, NodeRef, Relationship, WriteCounters};
use crate::pipeline::{Action, LinkFallback, Stage};
use crate::store::ReadQuery;

/// Link executor
pub struct LinkExecutor;

impl LinkExecutor {
    /// Keys of `source_label` entities with no outgoing edge of the fallback's type
    async fn unlinked(ctx: &mut StageContext<'_>, fallback: &LinkFallback) -> KgResult<Vec<String>> {
        let degrees = ctx
            .session
            .run_read_query(&ReadQuery::Degree {
                label: fallback.source_label.clone(),
                rel_type: fallback.rel_type.clone(),
                direction: Direction::Outgoing,
            })
            .await?;

        Ok((0..degrees.len())
            .filter(|&row| degrees.get(row, "degree").and_then(Value::as_u64) == Some(0))
            .filter_map(|row| degrees.get(row, "key").and_then(Value::as_str).map(String::from))
            .collect())
    }
}

#[async_trait]
impl Executor for LinkExecutor {
    async fn execute(&self, ctx: &mut StageContext<'_>) -> KgResult<StageSummary> {
        let (stage, dataset) = (ctx.stage, ctx.dataset);
        let Action::Link {
            relationships,
            fallbacks,
        } = &stage.action
        else {
            return Err(wrong_action(stage, "link"));
        };

        let mut writes = WriteCounters::default();
        for rel_type in relationships {
            let policy = ctx.policy_for(dataset.relationship_policy(rel_type));

            let mut per_type = WriteCounters::default();
            for relationship in dataset.relationships_of_type(rel_type) {
                per_type.record(ctx.session.upsert_relationship(relationship, policy).await?);
            }

            ctx.note(format!("{} ({}): {}", rel_type, policy, per_type));
            writes.merge(per_type);
        }

        for fallback in fallbacks {
            let policy = ctx.policy_for(dataset.relationship_policy(&fallback.rel_type));
            let unlinked = Self::unlinked(ctx, fallback).await?;

            for key in &unlinked {
                let relationship = Relationship::new(
                    &fallback.rel_type,
                    NodeRef::new(&fallback.source_label, key),
                    fallback.target.clone(),
                );
                writes.record(ctx.session.upsert_relationship(&relationship, policy).await?);
            }

            if !unlinked.is_empty() {
                ctx.note(format!(
                    "{} {} entities defaulted to {} via {}",
                    unlinked.len(),
                    fallback.source_label,
                    fallback.target,
                    fallback.rel_type
                ));
            }
        }

        Ok(StageSummary::new(format!(
            "{} relationships across {} type(s): {}",
            writes.total(),
            relationships.len(),
            writes
        ))
        .with_writes(writes))
    }

    fn validate_stage(&self, stage: &Stage) -> KgResult<()> {
        match &stage.action {
            Action::Link { .. } => Ok(()),
            _ => Err(wrong_action(stage, "link")),
        }
    }
}
