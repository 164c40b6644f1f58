// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 kgpipe contributors

//! In-memory graph store
//!
//! Keeps the whole graph in ordered maps keyed by natural identity, so a
//! second upsert of the same entity or relationship always lands on the
//! existing element.

use async_trait::async_trait;
use petgraph::algo::dijkstra;
use petgraph::graph::{NodeIndex, UnGraph};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

use super::{
    ConstraintOutcome, GraphSession, GraphStore, QueryResult, ReadQuery, StoreConnector,
};
use crate::errors::{KgError, KgResult};
use crate::model::{
    Attributes, Direction, Entity, NodeRef, Relationship, RelationshipKey, WriteOutcome,
    WritePolicy,
};

/// Graph contents
#[derive(Debug, Default, Clone)]
pub(crate) struct GraphState {
    /// label -> key attribute
    constraints: BTreeMap<String, String>,
    /// Full attributes, natural key attribute included
    nodes: BTreeMap<NodeRef, Attributes>,
    edges: BTreeMap<RelationshipKey, Attributes>,
}

impl GraphState {
    fn declare_constraint(&mut self, label: &str, key_attribute: &str) -> KgResult<ConstraintOutcome> {
        match self.constraints.get(label) {
            Some(existing) if existing == key_attribute => Ok(ConstraintOutcome::AlreadyDeclared),
            Some(existing) => Err(KgError::ConstraintViolation {
                label: label.to_string(),
                reason: format!(
                    "already unique on '{}', cannot redeclare on '{}'",
                    existing, key_attribute
                ),
            }),
            None => {
                self.constraints
                    .insert(label.to_string(), key_attribute.to_string());
                Ok(ConstraintOutcome::Declared)
            }
        }
    }

    fn upsert_entity(&mut self, entity: &Entity, policy: WritePolicy) -> KgResult<WriteOutcome> {
        let key_attribute = self
            .constraints
            .get(&entity.label)
            .ok_or_else(|| KgError::SchemaMissing {
                label: entity.label.clone(),
            })?;

        let conflict = |reason: String| KgError::WriteConflict {
            label: entity.label.clone(),
            key: entity.key.clone(),
            reason,
        };

        if entity.key.trim().is_empty() {
            return Err(conflict("natural key is empty".into()));
        }

        let key_value = Value::String(entity.key.clone());
        if let Some(supplied) = entity.attributes.get(key_attribute) {
            if supplied != &key_value {
                return Err(conflict(format!(
                    "attributes redefine natural key '{}' as {}",
                    key_attribute, supplied
                )));
            }
        }

        let mut attributes = entity.attributes.clone();
        attributes.insert(key_attribute.clone(), key_value);

        let node = entity.node_ref();
        let outcome = match self.nodes.get_mut(&node) {
            None => {
                self.nodes.insert(node, attributes);
                WriteOutcome::Created
            }
            Some(existing) => merge_attributes(existing, attributes, policy),
        };

        Ok(outcome)
    }

    fn upsert_relationship(
        &mut self,
        relationship: &Relationship,
        policy: WritePolicy,
    ) -> KgResult<WriteOutcome> {
        for (endpoint, node) in [("source", &relationship.source), ("target", &relationship.target)] {
            if !self.constraints.contains_key(&node.label) {
                return Err(KgError::SchemaMissing {
                    label: node.label.clone(),
                });
            }
            if !self.nodes.contains_key(node) {
                return Err(KgError::missing_endpoint(&relationship.rel_type, endpoint, node));
            }
        }

        let identity = relationship.identity();
        let outcome = match self.edges.get_mut(&identity) {
            None => {
                self.edges.insert(identity, relationship.attributes.clone());
                WriteOutcome::Created
            }
            Some(existing) => merge_attributes(existing, relationship.attributes.clone(), policy),
        };

        Ok(outcome)
    }

    fn run_read_query(&self, query: &ReadQuery) -> QueryResult {
        let mut result = QueryResult::for_query(query);

        match query {
            ReadQuery::Ping => result.push(vec![json!(1)]),

            ReadQuery::CountByLabel => {
                let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
                for node in self.nodes.keys() {
                    *counts.entry(node.label.as_str()).or_default() += 1;
                }
                for (label, count) in counts {
                    result.push(vec![json!(label), json!(count)]);
                }
            }

            ReadQuery::CountByRelationshipType => {
                let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
                for edge in self.edges.keys() {
                    *counts.entry(edge.rel_type.as_str()).or_default() += 1;
                }
                for (rel_type, count) in counts {
                    result.push(vec![json!(rel_type), json!(count)]);
                }
            }

            ReadQuery::Entities { label } => {
                for (node, attributes) in self.nodes_with_label(label) {
                    result.push(vec![json!(node.key), json!(attributes)]);
                }
            }

            ReadQuery::Related {
                label,
                key,
                rel_type,
                direction,
            } => {
                let anchor = NodeRef::new(label, key);
                for (edge, edge_attributes) in &self.edges {
                    if &edge.rel_type != rel_type {
                        continue;
                    }
                    let neighbour = match direction {
                        Direction::Outgoing if edge.source == anchor => &edge.target,
                        Direction::Incoming if edge.target == anchor => &edge.source,
                        _ => continue,
                    };
                    let attributes = self.nodes.get(neighbour).cloned().unwrap_or_default();
                    result.push(vec![
                        json!(neighbour.label),
                        json!(neighbour.key),
                        json!(attributes),
                        json!(edge_attributes),
                    ]);
                }
            }

            ReadQuery::Degree {
                label,
                rel_type,
                direction,
            } => {
                let mut degrees: HashMap<&NodeRef, usize> = HashMap::new();
                for edge in self.edges.keys().filter(|e| &e.rel_type == rel_type) {
                    let endpoint = match direction {
                        Direction::Outgoing => &edge.source,
                        Direction::Incoming => &edge.target,
                    };
                    *degrees.entry(endpoint).or_default() += 1;
                }
                for (node, _) in self.nodes_with_label(label) {
                    let degree = degrees.get(node).copied().unwrap_or(0);
                    result.push(vec![json!(node.key), json!(degree)]);
                }
            }

            ReadQuery::MostConnected { limit } => {
                let mut connections: HashMap<&NodeRef, usize> = HashMap::new();
                for edge in self.edges.keys() {
                    *connections.entry(&edge.source).or_default() += 1;
                    *connections.entry(&edge.target).or_default() += 1;
                }
                let mut ranked: Vec<(&NodeRef, usize)> = self
                    .nodes
                    .keys()
                    .map(|node| (node, connections.get(node).copied().unwrap_or(0)))
                    .collect();
                // Stable: ties stay in label, key order
                ranked.sort_by(|a, b| b.1.cmp(&a.1));
                for (node, count) in ranked.into_iter().take(*limit) {
                    result.push(vec![json!(node.label), json!(node.key), json!(count)]);
                }
            }

            ReadQuery::ShortestPaths { label } => {
                let mut graph: UnGraph<(), ()> = UnGraph::default();
                let index: HashMap<&NodeRef, NodeIndex> = self
                    .nodes
                    .keys()
                    .map(|node| (node, graph.add_node(())))
                    .collect();
                for edge in self.edges.keys() {
                    if let (Some(&a), Some(&b)) = (index.get(&edge.source), index.get(&edge.target)) {
                        graph.add_edge(a, b, ());
                    }
                }

                let members: Vec<&NodeRef> = self.nodes_with_label(label).map(|(node, _)| node).collect();
                for (i, source) in members.iter().enumerate() {
                    let lengths = dijkstra(&graph, index[*source], None, |_| 1usize);
                    for target in &members[i + 1..] {
                        if let Some(length) = lengths.get(&index[*target]) {
                            result.push(vec![json!(source.key), json!(target.key), json!(length)]);
                        }
                    }
                }
            }
        }

        result
    }

    fn nodes_with_label<'a>(
        &'a self,
        label: &'a str,
    ) -> impl Iterator<Item = (&'a NodeRef, &'a Attributes)> + 'a {
        self.nodes.iter().filter(move |(node, _)| node.label == label)
    }

    fn to_snapshot(&self) -> GraphSnapshot {
        GraphSnapshot {
            constraints: self.constraints.clone(),
            entities: self
                .nodes
                .iter()
                .map(|(node, attributes)| Entity {
                    label: node.label.clone(),
                    key: node.key.clone(),
                    attributes: attributes.clone(),
                })
                .collect(),
            relationships: self
                .edges
                .iter()
                .map(|(identity, attributes)| Relationship {
                    rel_type: identity.rel_type.clone(),
                    source: identity.source.clone(),
                    target: identity.target.clone(),
                    attributes: attributes.clone(),
                })
                .collect(),
        }
    }

    fn from_snapshot(snapshot: GraphSnapshot) -> Self {
        Self {
            constraints: snapshot.constraints,
            nodes: snapshot
                .entities
                .into_iter()
                .map(|e| (NodeRef::new(e.label, e.key), e.attributes))
                .collect(),
            edges: snapshot
                .relationships
                .into_iter()
                .map(|r| (r.identity(), r.attributes))
                .collect(),
        }
    }
}

/// Apply `supplied` to `existing` under `policy`. Attributes are never removed.
fn merge_attributes(existing: &mut Attributes, supplied: Attributes, policy: WritePolicy) -> WriteOutcome {
    if policy == WritePolicy::CreateOnly {
        return WriteOutcome::Unchanged;
    }

    let mut changed = false;
    for (name, value) in supplied {
        if existing.get(&name) != Some(&value) {
            existing.insert(name, value);
            changed = true;
        }
    }

    if changed {
        WriteOutcome::Updated
    } else {
        WriteOutcome::Unchanged
    }
}

/// Serializable, deterministically ordered copy of a graph
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphSnapshot {
    pub constraints: BTreeMap<String, String>,
    pub entities: Vec<Entity>,
    pub relationships: Vec<Relationship>,
}

/// Process-local graph store
#[derive(Clone, Default)]
pub struct MemoryGraphStore {
    state: Arc<RwLock<GraphState>>,
    open_sessions: Arc<AtomicUsize>,
}

impl std::fmt::Debug for MemoryGraphStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryGraphStore")
            .field("open_sessions", &self.open_sessions())
            .finish()
    }
}

impl MemoryGraphStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated from a snapshot
    pub fn from_snapshot(snapshot: GraphSnapshot) -> Self {
        Self {
            state: Arc::new(RwLock::new(GraphState::from_snapshot(snapshot))),
            open_sessions: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Copy of the current graph
    pub async fn snapshot(&self) -> GraphSnapshot {
        self.state.read().await.to_snapshot()
    }

    /// Number of sessions not yet closed or dropped
    pub fn open_sessions(&self) -> usize {
        self.open_sessions.load(Ordering::SeqCst)
    }

    pub(crate) fn open_session(&self) -> MemorySession {
        self.open_sessions.fetch_add(1, Ordering::SeqCst);
        MemorySession {
            state: Arc::clone(&self.state),
            _guard: SessionGuard(Arc::clone(&self.open_sessions)),
        }
    }
}

#[async_trait]
impl GraphStore for MemoryGraphStore {
    fn describe(&self) -> String {
        "memory://".to_string()
    }

    async fn ping(&self) -> KgResult<()> {
        Ok(())
    }

    async fn session(&self) -> KgResult<Box<dyn GraphSession>> {
        Ok(Box::new(self.open_session()))
    }
}

/// Decrements the open-session count when the session goes away
struct SessionGuard(Arc<AtomicUsize>);

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Session over a [`MemoryGraphStore`]
pub(crate) struct MemorySession {
    state: Arc<RwLock<GraphState>>,
    _guard: SessionGuard,
}

impl MemorySession {
    pub(crate) async fn snapshot(&self) -> GraphSnapshot {
        self.state.read().await.to_snapshot()
    }
}

#[async_trait]
impl GraphSession for MemorySession {
    async fn declare_constraint(
        &mut self,
        label: &str,
        key_attribute: &str,
    ) -> KgResult<ConstraintOutcome> {
        self.state
            .write()
            .await
            .declare_constraint(label, key_attribute)
    }

    async fn upsert_entity(&mut self, entity: &Entity, policy: WritePolicy) -> KgResult<WriteOutcome> {
        let outcome = self.state.write().await.upsert_entity(entity, policy)?;
        debug!(label = %entity.label, key = %entity.key, ?outcome, "Upserted entity");
        Ok(outcome)
    }

    async fn upsert_relationship(
        &mut self,
        relationship: &Relationship,
        policy: WritePolicy,
    ) -> KgResult<WriteOutcome> {
        let outcome = self
            .state
            .write()
            .await
            .upsert_relationship(relationship, policy)?;
        debug!(edge = %relationship.identity(), ?outcome, "Upserted relationship");
        Ok(outcome)
    }

    async fn run_read_query(&mut self, query: &ReadQuery) -> KgResult<QueryResult> {
        Ok(self.state.read().await.run_read_query(query))
    }

    async fn close(self: Box<Self>) -> KgResult<()> {
        Ok(())
    }
}

/// Hands out one shared in-memory store
pub struct MemoryConnector {
    store: MemoryGraphStore,
}

impl MemoryConnector {
    pub fn new(store: MemoryGraphStore) -> Self {
        Self { store }
    }
}

#[async_trait]
impl StoreConnector for MemoryConnector {
    fn uri(&self) -> &str {
        "memory://"
    }

    async fn connect(&self) -> KgResult<Arc<dyn GraphStore>> {
        Ok(Arc::new(self.store.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn store_with_schema() -> (MemoryGraphStore, Box<dyn GraphSession>) {
        let store = MemoryGraphStore::new();
        let mut session = store.session().await.unwrap();
        session.declare_constraint("Disease", "name").await.unwrap();
        session.declare_constraint("Symptom", "name").await.unwrap();
        (store, session)
    }

    fn has_symptom(disease: &str, symptom: &str) -> Relationship {
        Relationship::new(
            "HAS_SYMPTOM",
            NodeRef::new("Disease", disease),
            NodeRef::new("Symptom", symptom),
        )
    }

    #[tokio::test]
    async fn test_declare_constraint_is_idempotent() {
        let (_store, mut session) = store_with_schema().await;

        let outcome = session.declare_constraint("Disease", "name").await.unwrap();
        assert_eq!(outcome, ConstraintOutcome::AlreadyDeclared);

        let err = session.declare_constraint("Disease", "id").await.unwrap_err();
        assert!(matches!(err, KgError::ConstraintViolation { .. }));
    }

    #[tokio::test]
    async fn test_upsert_entity_create_only_keeps_first_attributes() {
        let (store, mut session) = store_with_schema().await;

        let first = Entity::new("Disease", "Dengue Fever").with_attr("icd10", "A90");
        let second = Entity::new("Disease", "Dengue Fever").with_attr("icd10", "A91");

        assert_eq!(
            session.upsert_entity(&first, WritePolicy::CreateOnly).await.unwrap(),
            WriteOutcome::Created
        );
        assert_eq!(
            session.upsert_entity(&second, WritePolicy::CreateOnly).await.unwrap(),
            WriteOutcome::Unchanged
        );

        let snapshot = store.snapshot().await;
        assert_eq!(snapshot.entities.len(), 1);
        assert_eq!(snapshot.entities[0].attributes["icd10"], "A90");
        assert_eq!(snapshot.entities[0].attributes["name"], "Dengue Fever");
    }

    #[tokio::test]
    async fn test_upsert_entity_refresh_overwrites() {
        let (store, mut session) = store_with_schema().await;

        let first = Entity::new("Disease", "Dengue Fever").with_attr("icd10", "A90");
        let second = Entity::new("Disease", "Dengue Fever").with_attr("icd10", "A91");

        session.upsert_entity(&first, WritePolicy::Refresh).await.unwrap();
        assert_eq!(
            session.upsert_entity(&second, WritePolicy::Refresh).await.unwrap(),
            WriteOutcome::Updated
        );
        assert_eq!(
            session.upsert_entity(&second, WritePolicy::Refresh).await.unwrap(),
            WriteOutcome::Unchanged
        );

        let snapshot = store.snapshot().await;
        assert_eq!(snapshot.entities[0].attributes["icd10"], "A91");
    }

    #[tokio::test]
    async fn test_upsert_entity_requires_constraint() {
        let (_store, mut session) = store_with_schema().await;
        let err = session
            .upsert_entity(&Entity::new("Vector", "Aedes aegypti"), WritePolicy::CreateOnly)
            .await
            .unwrap_err();
        assert!(matches!(err, KgError::SchemaMissing { label } if label == "Vector"));
    }

    #[tokio::test]
    async fn test_upsert_entity_rejects_key_redefinition() {
        let (_store, mut session) = store_with_schema().await;
        let entity = Entity::new("Disease", "Dengue Fever").with_attr("name", "Dengue");
        let err = session
            .upsert_entity(&entity, WritePolicy::Refresh)
            .await
            .unwrap_err();
        assert!(matches!(err, KgError::WriteConflict { .. }));
    }

    #[tokio::test]
    async fn test_relationship_requires_endpoints() {
        let (store, mut session) = store_with_schema().await;
        session
            .upsert_entity(&Entity::new("Disease", "Dengue Fever"), WritePolicy::CreateOnly)
            .await
            .unwrap();

        let err = session
            .upsert_relationship(&has_symptom("Dengue Fever", "Fever"), WritePolicy::CreateOnly)
            .await
            .unwrap_err();

        match err {
            KgError::MissingEndpoint { endpoint, key, .. } => {
                assert_eq!(endpoint, "target");
                assert_eq!(key, "Fever");
            }
            other => panic!("unexpected error: {}", other),
        }
        assert!(store.snapshot().await.relationships.is_empty());
    }

    #[tokio::test]
    async fn test_relationship_upsert_is_idempotent() {
        let (store, mut session) = store_with_schema().await;
        session
            .upsert_entity(&Entity::new("Disease", "Dengue Fever"), WritePolicy::CreateOnly)
            .await
            .unwrap();
        session
            .upsert_entity(&Entity::new("Symptom", "Fever"), WritePolicy::CreateOnly)
            .await
            .unwrap();

        let rel = has_symptom("Dengue Fever", "Fever").with_attr("frequency", "common");
        assert_eq!(
            session.upsert_relationship(&rel, WritePolicy::CreateOnly).await.unwrap(),
            WriteOutcome::Created
        );
        assert_eq!(
            session.upsert_relationship(&rel, WritePolicy::CreateOnly).await.unwrap(),
            WriteOutcome::Unchanged
        );

        assert_eq!(store.snapshot().await.relationships.len(), 1);
    }

    #[tokio::test]
    async fn test_degree_and_related_queries() {
        let (_store, mut session) = store_with_schema().await;
        for disease in ["Dengue Fever", "Severe Dengue"] {
            session
                .upsert_entity(&Entity::new("Disease", disease), WritePolicy::CreateOnly)
                .await
                .unwrap();
        }
        for symptom in ["Fever", "Headache"] {
            session
                .upsert_entity(&Entity::new("Symptom", symptom), WritePolicy::CreateOnly)
                .await
                .unwrap();
            session
                .upsert_relationship(&has_symptom("Dengue Fever", symptom), WritePolicy::CreateOnly)
                .await
                .unwrap();
        }

        let degrees = session
            .run_read_query(&ReadQuery::Degree {
                label: "Disease".into(),
                rel_type: "HAS_SYMPTOM".into(),
                direction: Direction::Outgoing,
            })
            .await
            .unwrap();
        assert_eq!(degrees.len(), 2);
        assert_eq!(degrees.rows[0], vec![json!("Dengue Fever"), json!(2)]);
        assert_eq!(degrees.rows[1], vec![json!("Severe Dengue"), json!(0)]);

        let related = session
            .run_read_query(&ReadQuery::Related {
                label: "Disease".into(),
                key: "Dengue Fever".into(),
                rel_type: "HAS_SYMPTOM".into(),
                direction: Direction::Outgoing,
            })
            .await
            .unwrap();
        assert_eq!(related.strings("key"), vec!["Fever", "Headache"]);

        let incoming = session
            .run_read_query(&ReadQuery::Degree {
                label: "Symptom".into(),
                rel_type: "HAS_SYMPTOM".into(),
                direction: Direction::Incoming,
            })
            .await
            .unwrap();
        assert_eq!(incoming.get(0, "degree"), Some(&json!(1)));
    }

    #[tokio::test]
    async fn test_most_connected_and_shortest_paths() {
        let (_store, mut session) = store_with_schema().await;
        for disease in ["Dengue Fever", "Severe Dengue", "Zika"] {
            session
                .upsert_entity(&Entity::new("Disease", disease), WritePolicy::CreateOnly)
                .await
                .unwrap();
        }
        for symptom in ["Fever", "Headache"] {
            session
                .upsert_entity(&Entity::new("Symptom", symptom), WritePolicy::CreateOnly)
                .await
                .unwrap();
        }
        for (disease, symptom) in [
            ("Dengue Fever", "Fever"),
            ("Dengue Fever", "Headache"),
            ("Severe Dengue", "Headache"),
        ] {
            session
                .upsert_relationship(&has_symptom(disease, symptom), WritePolicy::CreateOnly)
                .await
                .unwrap();
        }

        let top = session
            .run_read_query(&ReadQuery::MostConnected { limit: 3 })
            .await
            .unwrap();
        assert_eq!(top.len(), 3);
        assert_eq!(top.rows[0], vec![json!("Disease"), json!("Dengue Fever"), json!(2)]);
        assert_eq!(top.rows[1], vec![json!("Symptom"), json!("Headache"), json!(2)]);
        assert_eq!(top.get(2, "connections"), Some(&json!(1)));

        // Zika is isolated and pairs with nothing
        let paths = session
            .run_read_query(&ReadQuery::ShortestPaths {
                label: "Disease".into(),
            })
            .await
            .unwrap();
        assert_eq!(paths.len(), 1);
        assert_eq!(
            paths.rows[0],
            vec![json!("Dengue Fever"), json!("Severe Dengue"), json!(2)]
        );
    }

    #[tokio::test]
    async fn test_sessions_released_on_drop_and_close() {
        let store = MemoryGraphStore::new();
        let first = store.session().await.unwrap();
        let second = store.session().await.unwrap();
        assert_eq!(store.open_sessions(), 2);

        first.close().await.unwrap();
        assert_eq!(store.open_sessions(), 1);

        drop(second);
        assert_eq!(store.open_sessions(), 0);
    }
}
