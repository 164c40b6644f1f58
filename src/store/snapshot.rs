// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 kgpipe contributors

//! JSON snapshot store
//!
//! An in-memory graph that is loaded from a JSON file on connect and written
//! back whenever a session that wrote something is closed. Re-running the
//! pipeline against the same file exercises idempotence across processes.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

use super::memory::MemorySession;
use super::{
    ConstraintOutcome, GraphSession, GraphSnapshot, GraphStore, MemoryGraphStore, QueryResult,
    ReadQuery, StoreConnector,
};
use crate::errors::{KgError, KgResult};
use crate::model::{Entity, Relationship, WriteOutcome, WritePolicy};

/// Graph persisted to a JSON snapshot file
#[derive(Clone, Debug)]
pub struct SnapshotStore {
    path: PathBuf,
    inner: MemoryGraphStore,
    persist_lock: Arc<Mutex<()>>,
}

impl SnapshotStore {
    /// Load the snapshot at `path`, or start empty when the file does not
    /// exist yet. The parent directory must exist.
    pub async fn open(path: impl Into<PathBuf>) -> KgResult<Self> {
        let path = path.into();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            if !parent.is_dir() {
                return Err(KgError::Connection {
                    uri: format!("file://{}", path.display()),
                    reason: format!("directory '{}' does not exist", parent.display()),
                });
            }
        }

        let inner = if path.exists() {
            let content = tokio::fs::read(&path)
                .await
                .map_err(|e| KgError::FileReadError {
                    path: path.clone(),
                    error: e.to_string(),
                })?;
            let snapshot: GraphSnapshot = serde_json::from_slice(&content)?;
            MemoryGraphStore::from_snapshot(snapshot)
        } else {
            MemoryGraphStore::new()
        };

        Ok(Self {
            path,
            inner,
            persist_lock: Arc::new(Mutex::new(())),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Copy of the current (possibly not yet persisted) graph
    pub async fn snapshot(&self) -> GraphSnapshot {
        self.inner.snapshot().await
    }
}

#[async_trait]
impl GraphStore for SnapshotStore {
    fn describe(&self) -> String {
        format!("file://{}", self.path.display())
    }

    async fn ping(&self) -> KgResult<()> {
        Ok(())
    }

    async fn session(&self) -> KgResult<Box<dyn GraphSession>> {
        Ok(Box::new(SnapshotSession {
            inner: self.inner.open_session(),
            path: self.path.clone(),
            persist_lock: Arc::clone(&self.persist_lock),
            dirty: false,
        }))
    }
}

struct SnapshotSession {
    inner: MemorySession,
    path: PathBuf,
    persist_lock: Arc<Mutex<()>>,
    dirty: bool,
}

impl SnapshotSession {
    async fn persist(&self) -> KgResult<()> {
        let _guard = self.persist_lock.lock().await;

        let snapshot = self.inner.snapshot().await;
        let content = serde_json::to_vec_pretty(&snapshot)?;

        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, content)
            .await
            .map_err(|e| KgError::FileWriteError {
                path: tmp.clone(),
                error: e.to_string(),
            })?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| KgError::FileWriteError {
                path: self.path.clone(),
                error: e.to_string(),
            })?;

        debug!(path = %self.path.display(), "Persisted graph snapshot");
        Ok(())
    }
}

#[async_trait]
impl GraphSession for SnapshotSession {
    async fn declare_constraint(
        &mut self,
        label: &str,
        key_attribute: &str,
    ) -> KgResult<ConstraintOutcome> {
        let outcome = self.inner.declare_constraint(label, key_attribute).await?;
        self.dirty |= outcome == ConstraintOutcome::Declared;
        Ok(outcome)
    }

    async fn upsert_entity(&mut self, entity: &Entity, policy: WritePolicy) -> KgResult<WriteOutcome> {
        let outcome = self.inner.upsert_entity(entity, policy).await?;
        self.dirty |= outcome != WriteOutcome::Unchanged;
        Ok(outcome)
    }

    async fn upsert_relationship(
        &mut self,
        relationship: &Relationship,
        policy: WritePolicy,
    ) -> KgResult<WriteOutcome> {
        let outcome = self.inner.upsert_relationship(relationship, policy).await?;
        self.dirty |= outcome != WriteOutcome::Unchanged;
        Ok(outcome)
    }

    async fn run_read_query(&mut self, query: &ReadQuery) -> KgResult<QueryResult> {
        self.inner.run_read_query(query).await
    }

    async fn close(self: Box<Self>) -> KgResult<()> {
        if self.dirty {
            self.persist().await?;
        }
        Ok(())
    }
}

/// Opens a [`SnapshotStore`] at a file path
pub struct SnapshotConnector {
    uri: String,
    path: PathBuf,
}

impl SnapshotConnector {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        Self {
            uri: format!("file://{}", path.display()),
            path,
        }
    }
}

#[async_trait]
impl StoreConnector for SnapshotConnector {
    fn uri(&self) -> &str {
        &self.uri
    }

    async fn connect(&self) -> KgResult<Arc<dyn GraphStore>> {
        Ok(Arc::new(SnapshotStore::open(&self.path).await?))
    }
}
