//! The check audit log entity and its store contract.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::check::Decision;
use crate::error::StoreResult;
use crate::id::Id;

/// A single persisted authorization decision.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CheckLogEntry {
    /// Identifier (`chklog_` prefix).
    pub id: Id,
    /// Owning tenant.
    pub tenant_id: String,
    /// Owning application.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub app_id: String,
    /// Subject kind.
    pub subject_kind: String,
    /// Subject identifier.
    pub subject_id: String,
    /// Requested action.
    pub action: String,
    /// Resource type.
    pub resource_type: String,
    /// Resource identifier.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub resource_id: String,
    /// Decision code.
    pub decision: Decision,
    /// Human-readable reason, if any.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub reason: String,
    /// Evaluation time in nanoseconds.
    pub eval_time_ns: i64,
    /// Client IP the request originated from, if known.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub request_ip: String,
    /// Free-form metadata.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, Value>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// Filters for querying check logs.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct CheckLogFilter {
    /// Restrict to a tenant.
    #[serde(default)]
    pub tenant_id: String,
    /// Restrict to a subject kind.
    #[serde(default)]
    pub subject_kind: String,
    /// Restrict to a subject identifier.
    #[serde(default)]
    pub subject_id: String,
    /// Restrict to an action.
    #[serde(default)]
    pub action: String,
    /// Restrict to a resource type.
    #[serde(default)]
    pub resource_type: String,
    /// Restrict to a resource identifier.
    #[serde(default)]
    pub resource_id: String,
    /// Restrict to a decision code.
    #[serde(default)]
    pub decision: Option<Decision>,
    /// Only entries created at or after this instant.
    #[serde(default)]
    pub after: Option<DateTime<Utc>>,
    /// Only entries created at or before this instant.
    #[serde(default)]
    pub before: Option<DateTime<Utc>>,
    /// Page size; 0 means unlimited.
    #[serde(default)]
    pub limit: usize,
    /// Page offset.
    #[serde(default)]
    pub offset: usize,
}

/// Persistence operations for check audit logs.
#[async_trait]
pub trait CheckLogStore {
    /// Persists a new check log entry.
    async fn create_check_log(&self, entry: &CheckLogEntry) -> StoreResult<()>;

    /// Retrieves a check log entry by identifier.
    async fn get_check_log(&self, log_id: Id) -> StoreResult<CheckLogEntry>;

    /// Returns check log entries matching the filter.
    async fn list_check_logs(&self, filter: &CheckLogFilter) -> StoreResult<Vec<CheckLogEntry>>;

    /// Returns the number of entries matching the filter.
    async fn count_check_logs(&self, filter: &CheckLogFilter) -> StoreResult<u64>;

    /// Removes entries created before the given instant; returns the
    /// number removed.
    async fn purge_check_logs(&self, before: DateTime<Utc>) -> StoreResult<u64>;

    /// Removes all check logs for a tenant.
    async fn delete_check_logs_by_tenant(&self, tenant_id: &str) -> StoreResult<()>;
}
