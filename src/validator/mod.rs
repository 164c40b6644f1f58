// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 kgpipe contributors

//! Graph validation
//!
//! Certifies that a populated graph is structurally complete before anything
//! downstream trusts it. Three families of checks run against a read-only
//! session:
//!
//! - **coverage**: every entity of a label has the required relationships
//! - **count**: a label holds at least a minimum number of entities
//! - **liveness**: a representative read query returns well-formed rows
//!
//! Each check passes or fails on its own; store errors abort the run.

mod report;
mod rules;

pub use report::{
    CheckCategory, CheckResult, ConnectedEntity, GraphSummary, PathLength, ValidationReport,
    Violation,
};
pub use rules::{CountRule, CoverageRule, LivenessProbe};

use serde_json::Value;
use tracing::{debug, info};

use crate::errors::KgResult;
use crate::store::{GraphSession, ReadQuery};

/// A set of rules to check a graph against
#[derive(Debug, Clone, Default)]
pub struct Validator {
    pub coverage: Vec<CoverageRule>,
    pub counts: Vec<CountRule>,
    pub probes: Vec<LivenessProbe>,
    /// Label whose entities get pairwise path lengths in the summary
    pub path_label: Option<String>,
}

/// Entities listed in `GraphSummary::top_connected`
pub const TOP_CONNECTED: usize = 10;

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_coverage(mut self, rules: Vec<CoverageRule>) -> Self {
        self.coverage = rules;
        self
    }

    pub fn with_counts(mut self, rules: Vec<CountRule>) -> Self {
        self.counts = rules;
        self
    }

    pub fn with_probes(mut self, probes: Vec<LivenessProbe>) -> Self {
        self.probes = probes;
        self
    }

    pub fn with_path_label(mut self, label: Option<String>) -> Self {
        self.path_label = label;
        self
    }

    /// Run every rule and collect the results
    pub async fn run(&self, session: &mut dyn GraphSession) -> KgResult<ValidationReport> {
        let summary = summarize(session, self.path_label.as_deref()).await?;
        let mut checks = Vec::new();

        for rule in &self.coverage {
            checks.push(check_coverage(session, rule).await?);
        }
        for rule in &self.counts {
            checks.push(check_count(&summary, rule));
        }
        for probe in &self.probes {
            checks.push(check_liveness(session, probe).await?);
        }

        let report = ValidationReport { checks, summary };
        info!(
            checks = report.checks.len(),
            violations = report.violations().len(),
            "Validation finished"
        );
        Ok(report)
    }
}

/// Counts of the whole graph, its most connected entities and, when
/// `path_label` is given, shortest path lengths between entities of that label
pub async fn summarize(
    session: &mut dyn GraphSession,
    path_label: Option<&str>,
) -> KgResult<GraphSummary> {
    let mut summary = GraphSummary::default();

    let labels = session.run_read_query(&ReadQuery::CountByLabel).await?;
    for row in 0..labels.len() {
        if let (Some(label), Some(count)) = (
            labels.get(row, "label").and_then(Value::as_str),
            labels.get(row, "count").and_then(Value::as_u64),
        ) {
            summary.entities.insert(label.to_string(), count as usize);
        }
    }

    let types = session
        .run_read_query(&ReadQuery::CountByRelationshipType)
        .await?;
    for row in 0..types.len() {
        if let (Some(rel_type), Some(count)) = (
            types.get(row, "type").and_then(Value::as_str),
            types.get(row, "count").and_then(Value::as_u64),
        ) {
            summary.relationships.insert(rel_type.to_string(), count as usize);
        }
    }

    let top = session
        .run_read_query(&ReadQuery::MostConnected { limit: TOP_CONNECTED })
        .await?;
    for row in 0..top.len() {
        if let (Some(label), Some(key), Some(connections)) = (
            top.get(row, "label").and_then(Value::as_str),
            top.get(row, "key").and_then(Value::as_str),
            top.get(row, "connections").and_then(Value::as_u64),
        ) {
            summary.top_connected.push(ConnectedEntity {
                label: label.to_string(),
                key: key.to_string(),
                connections: connections as usize,
            });
        }
    }

    if let Some(label) = path_label {
        let paths = session
            .run_read_query(&ReadQuery::ShortestPaths {
                label: label.to_string(),
            })
            .await?;
        for row in 0..paths.len() {
            if let (Some(source), Some(target), Some(length)) = (
                paths.get(row, "source").and_then(Value::as_str),
                paths.get(row, "target").and_then(Value::as_str),
                paths.get(row, "length").and_then(Value::as_u64),
            ) {
                summary.paths.push(PathLength {
                    source: source.to_string(),
                    target: target.to_string(),
                    length: length as usize,
                });
            }
        }
        debug!(label, pairs = summary.paths.len(), diameter = ?summary.diameter(), "Path statistics");
    }

    Ok(summary)
}

/// Every entity of the rule's label has enough matching relationships.
///
/// A label without entities passes; pair the rule with a count rule to
/// require entities as well.
pub async fn check_coverage(
    session: &mut dyn GraphSession,
    rule: &CoverageRule,
) -> KgResult<CheckResult> {
    let degrees = session
        .run_read_query(&ReadQuery::Degree {
            label: rule.label.clone(),
            rel_type: rule.rel_type.clone(),
            direction: rule.direction,
        })
        .await?;

    let mut offending = Vec::new();
    for row in 0..degrees.len() {
        let key = degrees
            .get(row, "key")
            .and_then(Value::as_str)
            .unwrap_or_default();
        let degree = degrees
            .get(row, "degree")
            .and_then(Value::as_u64)
            .unwrap_or(0) as usize;
        if degree < rule.min_degree {
            offending.push(key.to_string());
        }
    }

    debug!(rule = %rule.id, checked = degrees.len(), offending = offending.len(), "Coverage check");

    let relation = format!("{} {} edge(s) ({})", rule.min_degree, rule.rel_type, rule.direction);
    if offending.is_empty() {
        Ok(CheckResult::pass(
            &rule.id,
            CheckCategory::Coverage,
            format!("all {} {} entities have at least {}", degrees.len(), rule.label, relation),
        ))
    } else {
        Ok(CheckResult::fail(
            &rule.id,
            CheckCategory::Coverage,
            format!(
                "{} of {} {} entities have fewer than {}",
                offending.len(),
                degrees.len(),
                rule.label,
                relation
            ),
        )
        .with_offending_keys(offending))
    }
}

/// The rule's label holds at least `min` entities
pub fn check_count(summary: &GraphSummary, rule: &CountRule) -> CheckResult {
    let count = summary.entity_count(&rule.label);
    let detail = format!("{} {} entities (minimum {})", count, rule.label, rule.min);

    if count >= rule.min {
        CheckResult::pass(&rule.id, CheckCategory::Count, detail)
    } else {
        CheckResult::fail(&rule.id, CheckCategory::Count, detail)
    }
}

/// The probe's query returns enough well-formed rows
pub async fn check_liveness(
    session: &mut dyn GraphSession,
    probe: &LivenessProbe,
) -> KgResult<CheckResult> {
    let result = session.run_read_query(&probe.query).await?;
    let fail = |detail: String| -> KgResult<CheckResult> {
        Ok(CheckResult::fail(&probe.id, CheckCategory::Liveness, detail))
    };

    let missing: Vec<String> = probe
        .expected_columns()
        .into_iter()
        .filter(|c| result.column_index(c).is_none())
        .collect();
    if !missing.is_empty() {
        return fail(format!("result lacks column(s): {}", missing.join(", ")));
    }

    if result.len() < probe.min_rows {
        return fail(format!(
            "returned {} row(s), expected at least {}",
            result.len(),
            probe.min_rows
        ));
    }

    if let Some(row) = result.rows.iter().position(|r| r.len() != result.columns.len()) {
        return fail(format!(
            "row {} has {} value(s) for {} column(s)",
            row,
            result.rows[row].len(),
            result.columns.len()
        ));
    }

    if result.column_index("key").is_some() {
        let blank = (0..result.len()).find(|&row| {
            result
                .get(row, "key")
                .and_then(Value::as_str)
                .map_or(true, |key| key.trim().is_empty())
        });
        if let Some(row) = blank {
            return fail(format!("row {} has no usable key", row));
        }
    }

    Ok(CheckResult::pass(
        &probe.id,
        CheckCategory::Liveness,
        format!("returned {} well-formed row(s)", result.len()),
    ))
}
