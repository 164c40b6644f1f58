// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 kgpipe contributors

//! DAG (Directed Acyclic Graph) builder for pipeline dependencies
//!
//! Builds and validates dependency graphs for pipeline stages,
//! ensuring proper execution order and detecting cycles.

use petgraph::algo::{has_path_connecting, tarjan_scc, toposort};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::{Bfs, EdgeRef};
use petgraph::Direction;
use std::collections::{HashMap, HashSet};

use crate::errors::{KgError, KgResult};
use crate::pipeline::Pipeline;

/// Builder for stage dependency DAGs
///
/// Node weights are indices into `Pipeline::stages`; an edge `a -> b` means
/// `b` depends on `a`.
pub struct DagBuilder {
    graph: DiGraph<usize, ()>,
    name_to_index: HashMap<String, NodeIndex>,
    index_to_name: HashMap<NodeIndex, String>,
}

impl DagBuilder {
    /// Create a new DAG builder
    pub fn new() -> Self {
        Self {
            graph: DiGraph::new(),
            name_to_index: HashMap::new(),
            index_to_name: HashMap::new(),
        }
    }

    /// Build a DAG from a pipeline
    pub fn build(pipeline: &Pipeline) -> KgResult<Self> {
        let mut builder = Self::new();

        for (idx, stage) in pipeline.stages.iter().enumerate() {
            let node = builder.graph.add_node(idx);
            builder.name_to_index.insert(stage.name.clone(), node);
            builder.index_to_name.insert(node, stage.name.clone());
        }

        for stage in &pipeline.stages {
            let stage_node = builder.name_to_index[&stage.name];

            for dep_name in &stage.depends_on {
                let dep_node = builder.name_to_index.get(dep_name).ok_or_else(|| {
                    KgError::UnknownDependency {
                        stage: stage.name.clone(),
                        dependency: dep_name.clone(),
                    }
                })?;

                if !builder.graph.contains_edge(*dep_node, stage_node) {
                    builder.graph.add_edge(*dep_node, stage_node, ());
                }
            }
        }

        builder.validate_acyclic()?;
        builder.validate_reachable()?;

        Ok(builder)
    }

    /// Validate that the graph is acyclic
    fn validate_acyclic(&self) -> KgResult<()> {
        if toposort(&self.graph, None).is_ok() {
            return Ok(());
        }

        Err(KgError::CircularDependency {
            stages: self.cycle_members(),
        })
    }

    /// Stages on a cycle, sorted by name
    fn cycle_members(&self) -> Vec<String> {
        let mut members: Vec<String> = tarjan_scc(&self.graph)
            .into_iter()
            .filter(|component| {
                component.len() > 1
                    || self.graph.contains_edge(component[0], component[0])
            })
            .flatten()
            .map(|node| self.index_to_name[&node].clone())
            .collect();
        members.sort();
        members
    }

    /// Every stage must be reachable from a stage without dependencies
    fn validate_reachable(&self) -> KgResult<()> {
        let mut reached = HashSet::new();
        for source in self.graph.externals(Direction::Incoming) {
            let mut bfs = Bfs::new(&self.graph, source);
            while let Some(node) = bfs.next(&self.graph) {
                reached.insert(node);
            }
        }

        let mut unreachable: Vec<String> = self
            .graph
            .node_indices()
            .filter(|node| !reached.contains(node))
            .map(|node| self.index_to_name[&node].clone())
            .collect();

        if unreachable.is_empty() {
            Ok(())
        } else {
            unreachable.sort();
            Err(KgError::UnreachableStages {
                stages: unreachable,
            })
        }
    }

    /// Get topologically sorted stage indices
    pub fn topological_order(&self) -> KgResult<Vec<usize>> {
        toposort(&self.graph, None)
            .map(|nodes| nodes.into_iter().map(|n| self.graph[n]).collect())
            .map_err(|_| KgError::CircularDependency {
                stages: self.cycle_members(),
            })
    }

    /// Stage indices grouped into rounds: each round holds the stages whose
    /// dependencies all sit in earlier rounds
    pub fn batches(&self) -> KgResult<Vec<Vec<usize>>> {
        let order = toposort(&self.graph, None).map_err(|_| KgError::CircularDependency {
            stages: self.cycle_members(),
        })?;

        let mut level: HashMap<NodeIndex, usize> = HashMap::new();
        for node in order {
            let depth = self
                .graph
                .neighbors_directed(node, Direction::Incoming)
                .map(|dep| level[&dep] + 1)
                .max()
                .unwrap_or(0);
            level.insert(node, depth);
        }

        let rounds = level.values().copied().max().map_or(0, |max| max + 1);
        let mut batches = vec![Vec::new(); rounds];
        for (node, depth) in level {
            batches[depth].push(self.graph[node]);
        }
        for batch in &mut batches {
            batch.sort_unstable();
        }

        Ok(batches)
    }

    /// Get dependencies for a stage (stages that must run before it)
    pub fn dependencies(&self, stage_name: &str) -> Option<Vec<String>> {
        let node = self.name_to_index.get(stage_name)?;
        let mut deps: Vec<(usize, String)> = self
            .graph
            .neighbors_directed(*node, Direction::Incoming)
            .map(|n| (self.graph[n], self.index_to_name[&n].clone()))
            .collect();
        deps.sort();
        Some(deps.into_iter().map(|(_, name)| name).collect())
    }

    /// Check if stage A depends (directly or transitively) on stage B
    pub fn depends_on(&self, stage_a: &str, stage_b: &str) -> bool {
        let Some(node_a) = self.name_to_index.get(stage_a) else {
            return false;
        };
        let Some(node_b) = self.name_to_index.get(stage_b) else {
            return false;
        };

        node_a != node_b && has_path_connecting(&self.graph, *node_b, *node_a, None)
    }

    /// Stage names in pipeline order
    fn names_in_order(&self) -> Vec<&str> {
        let mut nodes: Vec<NodeIndex> = self.graph.node_indices().collect();
        nodes.sort_by_key(|n| self.graph[*n]);
        nodes.iter().map(|n| self.index_to_name[n].as_str()).collect()
    }

    /// Edges as `(dependency, dependent)` names
    fn edge_names(&self) -> Vec<(&str, &str)> {
        self.graph
            .edge_references()
            .map(|edge| {
                (
                    self.index_to_name[&edge.source()].as_str(),
                    self.index_to_name[&edge.target()].as_str(),
                )
            })
            .collect()
    }

    /// Generate Mermaid diagram of the DAG
    pub fn to_mermaid(&self) -> String {
        let mut out = String::from("graph TD\n");

        for name in self.names_in_order() {
            out.push_str(&format!("    {}[{}]\n", mermaid_id(name), name));
        }

        for (from, to) in self.edge_names() {
            out.push_str(&format!("    {} --> {}\n", mermaid_id(from), mermaid_id(to)));
        }

        out
    }

    /// Generate DOT diagram of the DAG
    pub fn to_dot(&self) -> String {
        let mut out = String::from("digraph pipeline {\n");
        out.push_str("    rankdir=TB;\n");
        out.push_str("    node [shape=box, style=rounded];\n\n");

        for (from, to) in self.edge_names() {
            out.push_str(&format!("    \"{}\" -> \"{}\";\n", from, to));
        }

        for name in self.names_in_order() {
            let node = self.name_to_index[name];
            if self.graph.neighbors_undirected(node).count() == 0 {
                out.push_str(&format!("    \"{}\";\n", name));
            }
        }

        out.push_str("}\n");
        out
    }

    /// Generate text representation of execution order
    pub fn to_text(&self, pipeline: &Pipeline) -> KgResult<String> {
        let mut out = String::new();
        let mut position = 1;

        for (round, batch) in self.batches()?.iter().enumerate() {
            out.push_str(&format!("round {}:\n", round + 1));
            for idx in batch {
                let stage = &pipeline.stages[*idx];
                let deps = self.dependencies(&stage.name).unwrap_or_default();

                out.push_str(&format!("  {}. {} ({})", position, stage.name, stage.action_name()));
                if !deps.is_empty() {
                    out.push_str(&format!(" [depends: {}]", deps.join(", ")));
                }
                out.push('\n');
                position += 1;
            }
        }

        Ok(out)
    }
}

impl Default for DagBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Mermaid node ids cannot contain dashes
fn mermaid_id(name: &str) -> String {
    name.replace(|c: char| !c.is_ascii_alphanumeric(), "_")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{Action, Stage};

    fn make_test_pipeline(stages: Vec<(&str, Vec<&str>)>) -> Pipeline {
        Pipeline {
            version: "1".into(),
            name: "test".into(),
            description: None,
            dataset: None,
            stages: stages
                .into_iter()
                .map(|(name, deps)| Stage {
                    name: name.into(),
                    description: None,
                    action: Action::Schema { labels: vec![] },
                    depends_on: deps.into_iter().map(String::from).collect(),
                    env: HashMap::new(),
                })
                .collect(),
            env: HashMap::new(),
            execution: Default::default(),
            store: Default::default(),
        }
    }

    #[test]
    fn test_linear_dag() {
        let pipeline = make_test_pipeline(vec![
            ("a", vec![]),
            ("b", vec!["a"]),
            ("c", vec!["b"]),
        ]);

        let dag = DagBuilder::build(&pipeline).unwrap();
        assert_eq!(dag.topological_order().unwrap(), vec![0, 1, 2]);
        assert_eq!(dag.batches().unwrap(), vec![vec![0], vec![1], vec![2]]);
    }

    #[test]
    fn test_fan_out_batches() {
        let pipeline = make_test_pipeline(vec![
            ("schema", vec![]),
            ("references", vec!["schema"]),
            ("validate", vec!["references"]),
            ("smoke-check", vec!["references"]),
        ]);

        let dag = DagBuilder::build(&pipeline).unwrap();

        assert_eq!(dag.batches().unwrap(), vec![vec![0], vec![1], vec![2, 3]]);
        assert_eq!(dag.dependencies("smoke-check").unwrap(), vec!["references"]);
        assert!(!dag.depends_on("validate", "smoke-check"));
        assert!(!dag.depends_on("smoke-check", "validate"));
    }

    #[test]
    fn test_circular_dependency_lists_members() {
        let pipeline = make_test_pipeline(vec![
            ("root", vec![]),
            ("a", vec!["root", "c"]),
            ("b", vec!["a"]),
            ("c", vec!["b"]),
        ]);

        match DagBuilder::build(&pipeline) {
            Err(KgError::CircularDependency { stages }) => {
                assert_eq!(stages, vec!["a", "b", "c"]);
            }
            other => panic!("expected cycle, got {:?}", other.err()),
        }
    }

    #[test]
    fn test_self_dependency_is_a_cycle() {
        let pipeline = make_test_pipeline(vec![("a", vec!["a"])]);

        let result = DagBuilder::build(&pipeline);
        assert!(matches!(result, Err(KgError::CircularDependency { .. })));
    }

    #[test]
    fn test_unknown_dependency() {
        let pipeline = make_test_pipeline(vec![("a", vec!["nonexistent"])]);

        let result = DagBuilder::build(&pipeline);
        assert!(matches!(result, Err(KgError::UnknownDependency { .. })));
    }

    #[test]
    fn test_depends_on_check() {
        let pipeline = make_test_pipeline(vec![
            ("a", vec![]),
            ("b", vec!["a"]),
            ("c", vec!["b"]),
        ]);

        let dag = DagBuilder::build(&pipeline).unwrap();

        assert!(dag.depends_on("c", "a"));
        assert!(dag.depends_on("c", "b"));
        assert!(dag.depends_on("b", "a"));
        assert!(!dag.depends_on("a", "c"));
        assert!(!dag.depends_on("a", "b"));
        assert!(!dag.depends_on("a", "a"));
    }

    #[test]
    fn test_renderings() {
        let pipeline = make_test_pipeline(vec![("schema", vec![]), ("base-entities", vec!["schema"])]);

        let dag = DagBuilder::build(&pipeline).unwrap();

        let mermaid = dag.to_mermaid();
        assert!(mermaid.contains("graph TD"));
        assert!(mermaid.contains("schema --> base_entities"));

        assert!(dag.to_dot().contains("\"schema\" -> \"base-entities\";"));

        let text = dag.to_text(&pipeline).unwrap();
        assert!(text.contains("2. base-entities (schema) [depends: schema]"));
    }
}
