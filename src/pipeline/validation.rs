// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 kgpipe contributors

//! Pipeline validation
//!
//! Validates pipeline configuration before execution. Besides the DAG shape,
//! the ordering rules of graph construction are checked statically:
//!
//! - every label and relationship type has exactly one creating stage
//! - a schema stage declaring a label runs before any stage touching it
//! - a link stage runs after the stages creating both endpoint labels
//! - validation stages run after every mutating stage

use std::collections::{BTreeMap, BTreeSet, HashSet};

use crate::dataset::Dataset;
use crate::errors::KgResult;
use crate::pipeline::{Action, DagBuilder, Pipeline, Stage};

/// Pipeline validator
pub struct PipelineValidator;

impl PipelineValidator {
    /// Validate a pipeline configuration, against its dataset when given
    pub fn validate(pipeline: &Pipeline, dataset: Option<&Dataset>) -> KgResult<ValidationResult> {
        let mut result = ValidationResult::new();

        if pipeline.stages.is_empty() {
            result.add_error("Pipeline has no stages defined");
        }

        let mut seen_names = HashSet::new();
        for stage in &pipeline.stages {
            if !seen_names.insert(&stage.name) {
                result.add_error(&format!("Duplicate stage name: '{}'", stage.name));
            }
        }

        if pipeline.execution.max_parallel == 0 {
            result.add_error("execution.max_parallel must be at least 1");
        }

        for stage in &pipeline.stages {
            Self::validate_stage(stage, &mut result);
            if let Some(dataset) = dataset {
                Self::validate_against_dataset(stage, dataset, &mut result);
            }
        }

        let creators = Creators::collect(pipeline, &mut result);

        // Ordering checks need a well-formed DAG
        match DagBuilder::build(pipeline) {
            Ok(dag) if result.is_valid() => {
                Self::validate_ordering(pipeline, &dag, &creators, dataset, &mut result);
            }
            Ok(_) => {}
            Err(e) => result.add_error(&e.to_string()),
        }

        if let Some(dataset) = dataset {
            for label in dataset.labels() {
                if !creators.labels.contains_key(label) {
                    result.add_warning(&format!("Label '{}' is never loaded by any stage", label));
                }
            }
            for declared in &dataset.relationship_types {
                if !creators.types.contains_key(&declared.rel_type) {
                    result.add_warning(&format!(
                        "Relationship type '{}' is never linked by any stage",
                        declared.rel_type
                    ));
                }
            }
        }

        Ok(result)
    }

    /// Checks that need only the stage itself
    fn validate_stage(stage: &Stage, result: &mut ValidationResult) {
        match &stage.action {
            Action::LoadEntities { labels } if labels.is_empty() => {
                result.add_error(&format!("Stage '{}': no labels to load", stage.name));
            }
            Action::Link {
                relationships,
                fallbacks,
            } => {
                if relationships.is_empty() {
                    result.add_error(&format!("Stage '{}': no relationships to link", stage.name));
                }
                for fallback in fallbacks {
                    if !relationships.contains(&fallback.rel_type) {
                        result.add_error(&format!(
                            "Stage '{}': fallback uses '{}', which the stage does not link",
                            stage.name, fallback.rel_type
                        ));
                    }
                }
            }
            Action::AttachReferences { rules, .. } => {
                for rule in rules {
                    if rule.keywords.iter().all(|k| k.trim().is_empty()) {
                        result.add_error(&format!(
                            "Stage '{}': reference rule for '{}' has no keywords",
                            stage.name, rule.label
                        ));
                    }
                }
            }
            Action::Validate {
                coverage, counts, ..
            } if coverage.is_empty() && counts.is_empty() => {
                result.add_warning(&format!("Stage '{}': validation without rules", stage.name));
            }
            Action::SmokeCheck { probes } if probes.is_empty() => {
                result.add_warning(&format!("Stage '{}': smoke check without probes", stage.name));
            }
            _ => {}
        }
    }

    /// Labels and types a stage names must exist in the dataset catalog
    fn validate_against_dataset(stage: &Stage, dataset: &Dataset, result: &mut ValidationResult) {
        let unknown_label = |label: &str, result: &mut ValidationResult| {
            if dataset.entity_type(label).is_none() {
                result.add_error(&format!(
                    "Stage '{}': unknown label '{}'",
                    stage.name, label
                ));
            }
        };

        match &stage.action {
            Action::Schema { labels } | Action::LoadEntities { labels } => {
                for label in labels {
                    unknown_label(label, result);
                }
            }
            Action::Link {
                relationships,
                fallbacks,
            } => {
                for rel_type in relationships {
                    if dataset.relationship_type(rel_type).is_none() {
                        result.add_error(&format!(
                            "Stage '{}': unknown relationship type '{}'",
                            stage.name, rel_type
                        ));
                    }
                }
                for fallback in fallbacks {
                    let Some(declared) = dataset.relationship_type(&fallback.rel_type) else {
                        continue;
                    };
                    if !declared.sources.contains(&fallback.source_label)
                        || !declared.targets.contains(&fallback.target.label)
                    {
                        result.add_error(&format!(
                            "Stage '{}': {} does not connect '{}' to '{}'",
                            stage.name, fallback.rel_type, fallback.source_label, fallback.target.label
                        ));
                    }
                }
            }
            Action::AttachReferences {
                label,
                relationship,
                rules,
            } => {
                unknown_label(label, result);
                match dataset.relationship_type(relationship) {
                    None => result.add_error(&format!(
                        "Stage '{}': unknown relationship type '{}'",
                        stage.name, relationship
                    )),
                    Some(declared) => {
                        if !declared.targets.contains(label) {
                            result.add_error(&format!(
                                "Stage '{}': {} cannot end at '{}'",
                                stage.name, relationship, label
                            ));
                        }
                        for rule in rules {
                            if !declared.sources.contains(&rule.label) {
                                result.add_error(&format!(
                                    "Stage '{}': {} cannot start at '{}'",
                                    stage.name, relationship, rule.label
                                ));
                            }
                        }
                    }
                }
            }
            Action::Validate {
                coverage,
                counts,
                path_label,
                ..
            } => {
                for label in coverage
                    .iter()
                    .map(|r| &r.label)
                    .chain(counts.iter().map(|r| &r.label))
                    .chain(path_label)
                {
                    unknown_label(label, result);
                }
            }
            Action::SmokeCheck { .. } => {}
        }
    }

    fn validate_ordering(
        pipeline: &Pipeline,
        dag: &DagBuilder,
        creators: &Creators,
        dataset: Option<&Dataset>,
        result: &mut ValidationResult,
    ) {
        let schema_stages: Vec<&Stage> = pipeline
            .stages
            .iter()
            .filter(|s| matches!(s.action, Action::Schema { .. }))
            .collect();

        for stage in &pipeline.stages {
            if !stage.action.is_mutating() {
                for writer in pipeline.stages.iter().filter(|s| s.action.is_mutating()) {
                    if !dag.depends_on(&stage.name, &writer.name) {
                        result.add_warning(&format!(
                            "Stage '{}' does not run after mutating stage '{}'",
                            stage.name, writer.name
                        ));
                    }
                }
                continue;
            }

            if matches!(stage.action, Action::Schema { .. }) {
                continue;
            }

            for label in touched_labels(stage, dataset) {
                let declared = schema_stages
                    .iter()
                    .any(|s| s.action.declares_schema_for(&label) && dag.depends_on(&stage.name, &s.name));
                if !declared {
                    result.add_error(&format!(
                        "Stage '{}' writes '{}' before any schema stage declares it",
                        stage.name, label
                    ));
                }
            }

            for label in endpoint_labels(stage, dataset) {
                match creators.labels.get(&label) {
                    None => result.add_error(&format!(
                        "Stage '{}' links '{}' entities, but no stage loads them",
                        stage.name, label
                    )),
                    Some(creator) if creator == &stage.name => {}
                    Some(creator) => {
                        if !dag.depends_on(&stage.name, creator) {
                            result.add_error(&format!(
                                "Stage '{}' links '{}' entities, so it must depend on '{}'",
                                stage.name, label, creator
                            ));
                        }
                    }
                }
            }
        }
    }
}

/// The single stage creating each label and linking each relationship type
#[derive(Debug, Default)]
struct Creators {
    labels: BTreeMap<String, String>,
    types: BTreeMap<String, String>,
}

impl Creators {
    fn collect(pipeline: &Pipeline, result: &mut ValidationResult) -> Self {
        let mut labels: BTreeMap<String, Vec<&str>> = BTreeMap::new();
        let mut types: BTreeMap<String, Vec<&str>> = BTreeMap::new();

        for stage in &pipeline.stages {
            for label in stage.action.created_labels() {
                labels.entry(label.to_string()).or_default().push(&stage.name);
            }
            for rel_type in stage.action.linked_types() {
                types.entry(rel_type.to_string()).or_default().push(&stage.name);
            }
        }

        for (label, stages) in labels.iter().filter(|(_, s)| s.len() > 1) {
            result.add_error(&format!(
                "Label '{}' is created by more than one stage: {}",
                label,
                stages.join(", ")
            ));
        }
        for (rel_type, stages) in types.iter().filter(|(_, s)| s.len() > 1) {
            result.add_error(&format!(
                "Relationship type '{}' is linked by more than one stage: {}",
                rel_type,
                stages.join(", ")
            ));
        }

        Self {
            labels: labels
                .into_iter()
                .map(|(label, stages)| (label, stages[0].to_string()))
                .collect(),
            types: types
                .into_iter()
                .map(|(rel_type, stages)| (rel_type, stages[0].to_string()))
                .collect(),
        }
    }
}

/// Labels a mutating stage writes entities or edges for
fn touched_labels(stage: &Stage, dataset: Option<&Dataset>) -> BTreeSet<String> {
    let mut labels: BTreeSet<String> = stage
        .action
        .created_labels()
        .into_iter()
        .map(String::from)
        .collect();
    labels.extend(endpoint_labels(stage, dataset));
    labels
}

/// Labels at either end of the relationships a stage links
fn endpoint_labels(stage: &Stage, dataset: Option<&Dataset>) -> BTreeSet<String> {
    let mut labels = BTreeSet::new();

    match &stage.action {
        Action::Link {
            relationships,
            fallbacks,
        } => {
            if let Some(dataset) = dataset {
                for declared in relationships.iter().filter_map(|t| dataset.relationship_type(t)) {
                    labels.extend(declared.sources.iter().cloned());
                    labels.extend(declared.targets.iter().cloned());
                }
            }
            for fallback in fallbacks {
                labels.insert(fallback.source_label.clone());
                labels.insert(fallback.target.label.clone());
            }
        }
        Action::AttachReferences {
            label,
            relationship,
            rules,
        } => {
            if let Some(declared) = dataset.and_then(|d| d.relationship_type(relationship)) {
                labels.extend(declared.sources.iter().cloned());
            }
            labels.insert(label.clone());
            labels.extend(rules.iter().map(|r| r.label.clone()));
        }
        _ => {}
    }

    labels
}

/// Result of pipeline validation
#[derive(Debug, Default)]
pub struct ValidationResult {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_error(&mut self, message: &str) {
        self.errors.push(message.to_string());
    }

    pub fn add_warning(&mut self, message: &str) {
        self.warnings.push(message.to_string());
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}
