// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 kgpipe contributors

//! Error recovery suggestions
//!
//! Provides actionable suggestions for recovering from errors.

use super::KgError;

/// A recovery suggestion with concrete steps
#[derive(Debug, Clone)]
pub struct RecoverySuggestion {
    /// Brief description of what to do
    pub action: String,
    /// Detailed steps
    pub steps: Vec<String>,
    /// Commands to run
    pub commands: Vec<String>,
}

impl RecoverySuggestion {
    /// Pick a suggestion for an error, if one applies
    pub fn for_error(error: &KgError) -> Option<Self> {
        match error {
            KgError::Connection { uri, .. } => Some(Self::check_connection(uri)),
            KgError::CircularDependency { stages } => Some(Self::fix_circular_dependency(stages)),
            KgError::PipelineNotFound { .. } => Some(Self::create_pipeline()),
            KgError::MissingEndpoint { label, .. } => Some(Self::reorder_stages(label)),
            KgError::SchemaMissing { label } => Some(Self::declare_schema(label)),
            KgError::ValidationFailed { .. } => Some(Self::rerun_after_fix()),
            _ => None,
        }
    }

    /// Suggest checking store connectivity
    pub fn check_connection(uri: &str) -> Self {
        Self {
            action: "Make the graph store reachable".into(),
            steps: vec![
                format!("The store at '{}' did not accept a connection", uri),
                "Start the store, or point GRAPH_STORE_URI at a running one".into(),
                "Raise --connect-attempts if the store is slow to start".into(),
            ],
            commands: vec![
                "# Use a local snapshot store:".into(),
                "kgpipe run --store-uri file://.kgpipe/graph.json".into(),
            ],
        }
    }

    /// Suggest fixing a circular dependency
    pub fn fix_circular_dependency(stages: &[String]) -> Self {
        Self {
            action: "Remove circular dependency".into(),
            steps: vec![
                format!("Detected cycle: {}", stages.join(" → ")),
                "Review your stage dependencies".into(),
                "Ensure stages form a directed acyclic graph (DAG)".into(),
            ],
            commands: vec![
                "# Visualize your pipeline:".into(),
                "kgpipe graph --format mermaid".into(),
            ],
        }
    }

    /// Suggest creating a pipeline file
    pub fn create_pipeline() -> Self {
        Self {
            action: "Create a pipeline descriptor".into(),
            steps: vec!["No kgpipe.yaml found in the current directory".into()],
            commands: vec![
                "# Write the reference pipeline and dataset:".into(),
                "kgpipe init".into(),
            ],
        }
    }

    /// Suggest ordering a link stage after the stage creating its endpoints
    pub fn reorder_stages(label: &str) -> Self {
        Self {
            action: format!("Load '{}' entities before linking them", label),
            steps: vec![
                format!(
                    "Add the stage that loads '{}' to this stage's depends_on",
                    label
                ),
                "Re-run the pipeline; completed stages reconcile without duplicates".into(),
            ],
            commands: vec!["kgpipe validate".into()],
        }
    }

    /// Suggest declaring the schema first
    pub fn declare_schema(label: &str) -> Self {
        Self {
            action: format!("Declare a uniqueness constraint for '{}'", label),
            steps: vec![
                format!("Add '{}' to the dataset's entity_types", label),
                "Make the schema stage an ancestor of every data stage".into(),
            ],
            commands: vec!["kgpipe run --stage schema".into()],
        }
    }

    /// Suggest re-running after completing the data
    pub fn rerun_after_fix() -> Self {
        Self {
            action: "Complete the graph and re-run".into(),
            steps: vec![
                "Writes already committed are kept; they are idempotent".into(),
                "Add the missing entities or relationships to the dataset".into(),
                "Re-run the whole pipeline to reconcile".into(),
            ],
            commands: vec!["kgpipe run".into()],
        }
    }
}

impl std::fmt::Display for RecoverySuggestion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "→ {}", self.action)?;

        for step in &self.steps {
            writeln!(f, "  {}", step)?;
        }

        if !self.commands.is_empty() {
            writeln!(f)?;
            for cmd in &self.commands {
                writeln!(f, "  {}", cmd)?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_suggestion_for_cycle() {
        let err = KgError::CircularDependency {
            stages: vec!["a".into(), "b".into()],
        };
        let suggestion = RecoverySuggestion::for_error(&err).unwrap();
        assert!(suggestion.to_string().contains("a → b"));
    }

    #[test]
    fn test_no_suggestion_for_io() {
        let err = KgError::Io { message: "x".into() };
        assert!(RecoverySuggestion::for_error(&err).is_none());
    }
}
