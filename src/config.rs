//! Connection manager configuration.
//!
//! A manager is built from one [`ManagerConfig`]: the strategy to run, the
//! ordered list of resource entries handed to the driver, and a few flags.
//! The serialized form uses the camelCase keys of the configuration records
//! surrounding applications already write:
//!
//! ```json
//! {
//!     "kind": "contextSingleton",
//!     "resources": [{ "host": "db-1" }, { "host": "db-2" }],
//!     "enableStatistics": true,
//!     "checkStateWhenGetResource": true
//! }
//! ```

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{ConnError, ConnResult};

/// Strategy a connection manager runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ManagerKind {
    /// Every request opens a fresh, untracked connection that is closed on release.
    #[default]
    AlwaysNew,
    /// One tracked connection per request context, released when the context ends.
    ContextSingleton,
    /// A bounded set of connections recycled through an idle queue.
    BoundedPool,
}

/// Configuration for a [`ConnectionManager`](crate::ConnectionManager).
///
/// # Examples
///
/// ```
/// use ferrous_conn::{ManagerConfig, ManagerKind};
///
/// let config = ManagerConfig::new(ManagerKind::BoundedPool, vec!["db-1", "db-2"])
///     .with_statistics(true)
///     .with_max_connections(8);
///
/// assert_eq!(config.capacity(), 8);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManagerConfig<C> {
    /// Strategy to run
    #[serde(default)]
    pub kind: ManagerKind,
    /// Ordered resource entries, selected round-robin
    pub resources: Vec<C>,
    /// Keep a statistics block for this manager
    #[serde(default)]
    pub enable_statistics: bool,
    /// Ask the driver whether a reused instance is still connected
    #[serde(default)]
    pub check_state_when_get_resource: bool,
    /// Pool capacity override; defaults to the number of resources
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_connections: Option<usize>,
}

impl<C> ManagerConfig<C> {
    /// Creates a configuration with statistics and state checks disabled.
    pub fn new(kind: ManagerKind, resources: Vec<C>) -> Self {
        Self {
            kind,
            resources,
            enable_statistics: false,
            check_state_when_get_resource: false,
            max_connections: None,
        }
    }

    pub fn with_statistics(mut self, enabled: bool) -> Self {
        self.enable_statistics = enabled;
        self
    }

    pub fn with_check_state(mut self, enabled: bool) -> Self {
        self.check_state_when_get_resource = enabled;
        self
    }

    pub fn with_max_connections(mut self, max: usize) -> Self {
        self.max_connections = Some(max);
        self
    }

    /// Number of connections a bounded pool may track at once.
    pub fn capacity(&self) -> usize {
        self.max_connections.unwrap_or(self.resources.len())
    }

    /// Rejects configurations no manager can run with.
    pub fn validate(&self) -> ConnResult<()> {
        if self.resources.is_empty() {
            return Err(ConnError::Configuration(
                "at least one resource entry is required".to_string(),
            ));
        }
        if self.kind == ManagerKind::BoundedPool && self.capacity() == 0 {
            return Err(ConnError::Configuration(
                "maxConnections must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

impl<C: DeserializeOwned> ManagerConfig<C> {
    /// Parses and validates a JSON configuration record.
    pub fn from_json(json: &str) -> ConnResult<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| ConnError::Configuration(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }
}
