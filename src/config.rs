// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 kgpipe contributors

//! Store connection configuration
//!
//! Values come from the pipeline descriptor's `store` section and may be
//! overridden from the command line or the environment.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::store::RetryPolicy;

/// Graph store connection settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Store URI (`memory://`, `file://<path>`)
    #[serde(default = "default_uri")]
    pub uri: String,

    /// User name for stores that authenticate
    #[serde(default)]
    pub user: Option<String>,

    /// Password; never read from the descriptor
    #[serde(skip)]
    pub password: Option<String>,

    /// Connect without credentials
    #[serde(default)]
    pub auth_disabled: bool,

    /// Connection attempts before startup fails
    #[serde(default = "default_connect_attempts")]
    pub connect_attempts: u32,

    /// Seconds between connection attempts
    #[serde(default = "default_connect_wait_secs")]
    pub connect_wait_secs: u64,
}

fn default_uri() -> String {
    "file://.kgpipe/graph.json".to_string()
}

fn default_connect_attempts() -> u32 {
    5
}

fn default_connect_wait_secs() -> u64 {
    5
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            uri: default_uri(),
            user: None,
            password: None,
            auth_disabled: false,
            connect_attempts: default_connect_attempts(),
            connect_wait_secs: default_connect_wait_secs(),
        }
    }
}

impl StoreConfig {
    /// Retry policy for the initial connection
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            attempts: self.connect_attempts.max(1),
            wait: Duration::from_secs(self.connect_wait_secs),
        }
    }

    /// Apply overrides; `None` keeps the current value
    pub fn apply(&mut self, overrides: StoreOverrides) {
        if let Some(uri) = overrides.uri {
            self.uri = uri;
        }
        if let Some(user) = overrides.user {
            self.user = Some(user);
        }
        if let Some(password) = overrides.password {
            self.password = Some(password);
        }
        if let Some(auth) = overrides.auth {
            self.auth_disabled = auth.eq_ignore_ascii_case("none");
        }
        if let Some(attempts) = overrides.connect_attempts {
            self.connect_attempts = attempts;
        }
        if let Some(wait) = overrides.connect_wait_secs {
            self.connect_wait_secs = wait;
        }
    }

    /// Whether credentials are expected but missing
    pub fn missing_credentials(&self) -> bool {
        !self.auth_disabled && self.user.is_some() && self.password.is_none()
    }
}

/// Command-line / environment overrides for [`StoreConfig`]
#[derive(Debug, Clone, Default)]
pub struct StoreOverrides {
    pub uri: Option<String>,
    pub user: Option<String>,
    pub password: Option<String>,
    /// `none` disables authentication, anything else keeps it
    pub auth: Option<String>,
    pub connect_attempts: Option<u32>,
    pub connect_wait_secs: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = StoreConfig::default();
        assert_eq!(config.uri, "file://.kgpipe/graph.json");
        assert_eq!(config.retry_policy(), RetryPolicy::default());
    }

    #[test]
    fn test_overrides_take_precedence() {
        let mut config: StoreConfig = serde_yaml::from_str("uri: memory://\nuser: neo4j\n").unwrap();
        assert_eq!(config.uri, "memory://");
        assert!(config.missing_credentials());

        config.apply(StoreOverrides {
            uri: Some("file:///data/graph.json".into()),
            auth: Some("NONE".into()),
            connect_attempts: Some(2),
            ..Default::default()
        });

        assert_eq!(config.uri, "file:///data/graph.json");
        assert!(config.auth_disabled);
        assert!(!config.missing_credentials());
        assert_eq!(config.retry_policy().attempts, 2);
        assert_eq!(config.user.as_deref(), Some("neo4j"));
    }
}
