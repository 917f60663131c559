//! Engine configuration.

use serde::{Deserialize, Serialize};

/// Configuration for the authorization engine.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Maximum depth for relation graph traversal. Defaults to 10.
    pub max_graph_depth: usize,
    /// Enables role-based evaluation. Defaults to true.
    pub enable_rbac: bool,
    /// Enables relationship-based evaluation. Defaults to true.
    pub enable_rebac: bool,
    /// Enables attribute-based evaluation. Defaults to true.
    pub enable_abac: bool,
    /// Persists a check-log entry per decision. Best effort; a failed
    /// write never fails the check. Defaults to false.
    pub log_checks: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_graph_depth: 10,
            enable_rbac: true,
            enable_rebac: true,
            enable_abac: true,
            log_checks: false,
        }
    }
}
