// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 kgpipe contributors

//! Validation executors
//!
//! Both are read-only. A failed check fails the stage with a
//! `ValidationFailed` error carrying the full report.

use async_trait::async_trait;
use tracing::warn;

use super::{wrong_action, Executor, StageContext, StageSummary};
use crate::errors::{KgError, KgResult};
use crate::pipeline::{Action, Stage};
use crate::validator::{ValidationReport, Validator};

fn conclude(ctx: &mut StageContext<'_>, report: ValidationReport) -> KgResult<StageSummary> {
    for check in &report.checks {
        let mark = if check.passed { "pass" } else { "FAIL" };
        ctx.note(format!("[{}] {} ({}): {}", mark, check.rule_id, check.category, check.detail));
    }

    if !report.passed() {
        for violation in report.violations() {
            warn!(stage = %ctx.stage.name, "Violation {}", violation);
        }
        return Err(KgError::validation_failed(report));
    }

    Ok(StageSummary {
        message: format!(
            "{} check(s) passed ({} entities, {} relationships)",
            report.checks.len(),
            report.summary.total_entities(),
            report.summary.total_relationships()
        ),
        report: Some(report),
        ..Default::default()
    })
}

/// Coverage and count checks
pub struct ValidateExecutor;

#[async_trait]
impl Executor for ValidateExecutor {
    async fn execute(&self, ctx: &mut StageContext<'_>) -> KgResult<StageSummary> {
        let stage = ctx.stage;
        let Action::Validate {
            coverage,
            counts,
            report: report_path,
            path_label,
        } = &stage.action
        else {
            return Err(wrong_action(stage, "validate"));
        };

        let report = Validator::new()
            .with_coverage(coverage.clone())
            .with_counts(counts.clone())
            .with_path_label(path_label.clone())
            .run(ctx.session)
            .await?;

        if let Some(path) = report_path {
            let path = ctx.working_dir.join(path);
            tokio::fs::write(&path, report.to_json()?)
                .await
                .map_err(|e| KgError::FileWriteError {
                    path: path.clone(),
                    error: e.to_string(),
                })?;
            ctx.note(format!("report written to {}", path.display()));
        }

        conclude(ctx, report)
    }

    fn validate_stage(&self, stage: &Stage) -> KgResult<()> {
        match &stage.action {
            Action::Validate { .. } => Ok(()),
            _ => Err(wrong_action(stage, "validate")),
        }
    }
}

/// Liveness probes
pub struct SmokeCheckExecutor;

#[async_trait]
impl Executor for SmokeCheckExecutor {
    async fn execute(&self, ctx: &mut StageContext<'_>) -> KgResult<StageSummary> {
        let stage = ctx.stage;
        let Action::SmokeCheck { probes } = &stage.action else {
            return Err(wrong_action(stage, "smoke_check"));
        };

        let report = Validator::new()
            .with_probes(probes.clone())
            .run(ctx.session)
            .await?;

        conclude(ctx, report)
    }

    fn validate_stage(&self, stage: &Stage) -> KgResult<()> {
        match &stage.action {
            Action::SmokeCheck { .. } => Ok(()),
            _ => Err(wrong_action(stage, "smoke_check")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::Dataset;
    use crate::errors::FailureKind;
    use crate::executors::{testing, LoadEntitiesExecutor, SchemaExecutor};
    use crate::store::{MemoryGraphStore, ReadQuery};
    use crate::validator::{CountRule, CoverageRule, LivenessProbe};

    async fn diseases_only() -> (Dataset, MemoryGraphStore) {
        let dataset = Dataset::builtin().unwrap();
        let store = MemoryGraphStore::new();
        let schema = testing::stage(Action::Schema { labels: vec![] });
        testing::run(&SchemaExecutor, &schema, &dataset, &store).await.unwrap();
        let load = testing::stage(Action::LoadEntities {
            labels: vec!["Disease".into()],
        });
        testing::run(&LoadEntitiesExecutor, &load, &dataset, &store).await.unwrap();
        (dataset, store)
    }

    #[tokio::test]
    async fn test_validation_failure_carries_report() {
        let (dataset, store) = diseases_only().await;
        let stage = testing::stage(Action::Validate {
            coverage: vec![CoverageRule::new("disease-has-symptom", "Disease", "HAS_SYMPTOM")],
            counts: vec![CountRule {
                id: "disease-count".into(),
                label: "Disease".into(),
                min: 2,
            }],
            report: None,
            path_label: None,
        });

        let err = testing::run(&ValidateExecutor, &stage, &dataset, &store)
            .await
            .unwrap_err();

        assert_eq!(err.failure_kind(), FailureKind::ValidationFailure);
        match err {
            KgError::ValidationFailed { violations, report } => {
                assert_eq!(violations, 2);
                assert!(report.check("disease-count").unwrap().passed);
                assert_eq!(
                    report.check("disease-has-symptom").unwrap().offending_keys,
                    vec!["Dengue Fever", "Severe Dengue"]
                );
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[tokio::test]
    async fn test_validation_writes_report() {
        let (dataset, store) = diseases_only().await;
        let dir = tempfile::tempdir().unwrap();
        let stage = testing::stage(Action::Validate {
            coverage: vec![],
            counts: vec![CountRule {
                id: "disease-count".into(),
                label: "Disease".into(),
                min: 2,
            }],
            report: Some(dir.path().join("validation_results.json")),
            path_label: Some("Disease".into()),
        });

        let summary = testing::run(&ValidateExecutor, &stage, &dataset, &store).await.unwrap();
        assert!(summary.report.unwrap().passed());

        let written: ValidationReport = serde_json::from_str(
            &std::fs::read_to_string(dir.path().join("validation_results.json")).unwrap(),
        )
        .unwrap();
        assert_eq!(written.summary.entity_count("Disease"), 2);
        // Diseases alone share no relationships
        assert!(written.summary.paths.is_empty());
        assert_eq!(written.summary.top_connected.len(), 2);
    }

    #[tokio::test]
    async fn test_smoke_check() {
        let (dataset, store) = diseases_only().await;
        let stage = testing::stage(Action::SmokeCheck {
            probes: vec![
                LivenessProbe::new("ping", ReadQuery::Ping),
                LivenessProbe::new(
                    "diseases",
                    ReadQuery::Entities {
                        label: "Disease".into(),
                    },
                ),
            ],
        });

        let summary = testing::run(&SmokeCheckExecutor, &stage, &dataset, &store).await.unwrap();
        assert!(summary.message.starts_with("2 check(s) passed"));
    }
}
