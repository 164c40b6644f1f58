// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 kgpipe contributors

//! Reference attachment executor
//!
//! Loads the reference entities, links the dataset's explicit citations and
//! then attaches entities to references by keywords found in the reference
//! title. A rule falls back to its fallback keywords only when its primary
//! keywords match nothing.

use async_trait::async_trait;
use serde_json::Value;

use super::{wrong_action, Executor, StageContext, StageSummary};
use crate::errors::KgResult;
use crate::model::{NodeRef, Relationship, WriteCounters};
use crate::pipeline::{Action, ReferenceRule, Stage};
use crate::store::{QueryResult, ReadQuery};

/// Reference attachment executor
pub struct ReferencesExecutor;

/// `(key, lowercase title)` of a reference
type TitledReference = (String, String);

/// References whose title contains any of `keywords`
fn matching<'r>(references: &'r [TitledReference], keywords: &[String]) -> Vec<&'r str> {
    let keywords: Vec<String> = keywords
        .iter()
        .map(|k| k.trim().to_lowercase())
        .filter(|k| !k.is_empty())
        .collect();

    references
        .iter()
        .filter(|(_, title)| keywords.iter().any(|k| title.contains(k.as_str())))
        .map(|(key, _)| key.as_str())
        .collect()
}

/// Targets for one rule
fn select<'r>(references: &'r [TitledReference], rule: &ReferenceRule) -> Vec<&'r str> {
    let primary = matching(references, &rule.keywords);
    if primary.is_empty() {
        matching(references, &rule.fallback_keywords)
    } else {
        primary
    }
}

fn titled(result: &QueryResult) -> Vec<TitledReference> {
    (0..result.len())
        .filter_map(|row| {
            let key = result.get(row, "key")?.as_str()?;
            let title = result
                .get(row, "attributes")
                .and_then(|a| a.get("title"))
                .and_then(Value::as_str)
                .unwrap_or_default();
            Some((key.to_string(), title.to_lowercase()))
        })
        .collect()
}

#[async_trait]
impl Executor for ReferencesExecutor {
    async fn execute(&self, ctx: &mut StageContext<'_>) -> KgResult<StageSummary> {
        let (stage, dataset) = (ctx.stage, ctx.dataset);
        let Action::AttachReferences {
            label,
            relationship,
            rules,
        } = &stage.action
        else {
            return Err(wrong_action(stage, "attach_references"));
        };

        let mut writes = WriteCounters::default();

        let entity_policy = ctx.policy_for(dataset.entity_policy(label));
        for reference in dataset.entities_with_label(label) {
            writes.record(ctx.session.upsert_entity(reference, entity_policy).await?);
        }
        ctx.note(format!("{} ({}): {}", label, entity_policy, writes));

        let link_policy = ctx.policy_for(dataset.relationship_policy(relationship));
        let mut links = WriteCounters::default();
        for citation in dataset.relationships_of_type(relationship) {
            links.record(ctx.session.upsert_relationship(citation, link_policy).await?);
        }
        ctx.note(format!("explicit {}: {}", relationship, links));

        let references = titled(
            &ctx.session
                .run_read_query(&ReadQuery::Entities { label: label.clone() })
                .await?,
        );

        for rule in rules {
            let targets = select(&references, rule);
            if targets.is_empty() {
                ctx.note(format!("no {} matches the rule for {}", label, rule.label));
                continue;
            }

            let sources = ctx
                .session
                .run_read_query(&ReadQuery::Entities {
                    label: rule.label.clone(),
                })
                .await?
                .strings("key");

            let mut per_rule = WriteCounters::default();
            for source in &sources {
                for target in &targets {
                    let citation = Relationship::new(
                        relationship,
                        NodeRef::new(&rule.label, source),
                        NodeRef::new(label, *target),
                    );
                    per_rule.record(ctx.session.upsert_relationship(&citation, link_policy).await?);
                }
            }

            ctx.note(format!(
                "{} {} entities -> [{}]: {}",
                sources.len(),
                rule.label,
                targets.join(", "),
                per_rule
            ));
            links.merge(per_rule);
        }

        writes.merge(links);
        Ok(StageSummary::new(format!(
            "{} reference(s), {} citation(s): {}",
            references.len(),
            links.total(),
            writes
        ))
        .with_writes(writes))
    }

    fn validate_stage(&self, stage: &Stage) -> KgResult<()> {
        match &stage.action {
            Action::AttachReferences { .. } => Ok(()),
            _ => Err(wrong_action(stage, "attach_references")),
        }
    }
}
