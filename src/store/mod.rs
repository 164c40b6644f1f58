// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 kgpipe contributors

//! Graph store client contract
//!
//! Stages never see a concrete database. They get a [`GraphSession`] opened
//! from a [`GraphStore`], which itself comes from a [`StoreConnector`]. The
//! crate ships a process-local store and a JSON snapshot store; a network
//! driver plugs in by implementing the same three traits.

mod memory;
mod query;
mod snapshot;

pub use memory::{GraphSnapshot, MemoryConnector, MemoryGraphStore};
pub use query::{QueryResult, ReadQuery};
pub use snapshot::{SnapshotConnector, SnapshotStore};

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::config::StoreConfig;
use crate::errors::{KgError, KgResult};
use crate::model::{Entity, Relationship, WriteOutcome, WritePolicy};

/// Outcome of declaring a uniqueness constraint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintOutcome {
    Declared,
    AlreadyDeclared,
}

/// A connected graph store
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Human-readable description (scheme and location)
    fn describe(&self) -> String;

    /// Verify the store answers
    async fn ping(&self) -> KgResult<()>;

    /// Open a session scoped to one stage
    async fn session(&self) -> KgResult<Box<dyn GraphSession>>;
}

/// A unit of work against the store
///
/// Sessions are released when closed or dropped, whichever comes first.
#[async_trait]
pub trait GraphSession: Send {
    /// Declare `key_attribute` as the unique natural key of `label`.
    /// No-op when the same constraint already exists.
    async fn declare_constraint(
        &mut self,
        label: &str,
        key_attribute: &str,
    ) -> KgResult<ConstraintOutcome>;

    /// Match-or-create an entity on its natural key
    async fn upsert_entity(&mut self, entity: &Entity, policy: WritePolicy)
        -> KgResult<WriteOutcome>;

    /// Match-or-create a relationship on `(source, type, target)`.
    /// Both endpoints must already exist.
    async fn upsert_relationship(
        &mut self,
        relationship: &Relationship,
        policy: WritePolicy,
    ) -> KgResult<WriteOutcome>;

    /// Run a parameterized read query
    async fn run_read_query(&mut self, query: &ReadQuery) -> KgResult<QueryResult>;

    /// Flush and release the session
    async fn close(self: Box<Self>) -> KgResult<()>;
}

/// Opens connections to a store
#[async_trait]
pub trait StoreConnector: Send + Sync {
    /// URI this connector targets
    fn uri(&self) -> &str;

    /// Try once to connect
    async fn connect(&self) -> KgResult<Arc<dyn GraphStore>>;
}

/// Bounded wait-and-retry at connection level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub wait: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 5,
            wait: Duration::from_secs(5),
        }
    }
}

/// Connect and ping, retrying connection errors up to `policy.attempts` times.
///
/// Errors that are not connection errors are returned immediately.
pub async fn connect_with_retry(
    connector: &dyn StoreConnector,
    policy: &RetryPolicy,
) -> KgResult<Arc<dyn GraphStore>> {
    let attempts = policy.attempts.max(1);
    let mut last_reason = String::new();

    for attempt in 1..=attempts {
        let result = match connector.connect().await {
            Ok(store) => store.ping().await.map(|_| store),
            Err(e) => Err(e),
        };

        match result {
            Ok(store) => {
                info!(store = %store.describe(), attempt, "Connected to graph store");
                return Ok(store);
            }
            Err(KgError::Connection { reason, .. }) => {
                warn!(
                    uri = connector.uri(),
                    attempt,
                    attempts,
                    "Connection attempt failed: {}",
                    reason
                );
                last_reason = reason;
            }
            Err(e) => return Err(e),
        }

        if attempt < attempts {
            tokio::time::sleep(policy.wait).await;
        }
    }

    Err(KgError::Connection {
        uri: connector.uri().to_string(),
        reason: format!("gave up after {} attempt(s): {}", attempts, last_reason),
    })
}

/// Pick a connector for the configured URI
pub fn connector_for(config: &StoreConfig) -> KgResult<Box<dyn StoreConnector>> {
    let uri = config.uri.trim();

    if uri == "memory://" || uri == "memory" {
        return Ok(Box::new(MemoryConnector::new(MemoryGraphStore::new())));
    }

    if let Some(path) = uri.strip_prefix("file://") {
        if path.is_empty() {
            return Err(KgError::UnsupportedStore { uri: uri.to_string() });
        }
        return Ok(Box::new(SnapshotConnector::new(path)));
    }

    Err(KgError::UnsupportedStore { uri: uri.to_string() })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Fails with a connection error a fixed number of times, then connects
    struct FlakyConnector {
        failures: u32,
        calls: AtomicU32,
        store: MemoryGraphStore,
    }

    #[async_trait]
    impl StoreConnector for FlakyConnector {
        fn uri(&self) -> &str {
            "flaky://"
        }

        async fn connect(&self) -> KgResult<Arc<dyn GraphStore>> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if call <= self.failures {
                return Err(KgError::Connection {
                    uri: "flaky://".into(),
                    reason: format!("refused (call {})", call),
                });
            }
            Ok(Arc::new(self.store.clone()))
        }
    }

    fn quick_policy(attempts: u32) -> RetryPolicy {
        RetryPolicy {
            attempts,
            wait: Duration::from_millis(1),
        }
    }

    #[tokio::test]
    async fn test_retry_until_connected() {
        let connector = FlakyConnector {
            failures: 2,
            calls: AtomicU32::new(0),
            store: MemoryGraphStore::new(),
        };

        let store = connect_with_retry(&connector, &quick_policy(5)).await;
        assert!(store.is_ok());
        assert_eq!(connector.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_ceiling() {
        let connector = FlakyConnector {
            failures: u32::MAX,
            calls: AtomicU32::new(0),
            store: MemoryGraphStore::new(),
        };

        let result = connect_with_retry(&connector, &quick_policy(3)).await;
        match result {
            Err(KgError::Connection { reason, .. }) => {
                assert!(reason.contains("3 attempt"));
            }
            other => panic!("expected connection error, got {:?}", other.map(|s| s.describe())),
        }
        assert_eq!(connector.calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_connector_for_uri() {
        let mut config = StoreConfig::default();

        config.uri = "memory://".into();
        assert_eq!(connector_for(&config).unwrap().uri(), "memory://");

        config.uri = "file:///tmp/graph.json".into();
        assert_eq!(connector_for(&config).unwrap().uri(), "file:///tmp/graph.json");

        config.uri = "bolt://localhost:7687".into();
        assert!(matches!(
            connector_for(&config),
            Err(KgError::UnsupportedStore { .. })
        ));
    }
}
