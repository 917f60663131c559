//! The permission entity and its store contract.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::StoreResult;
use crate::id::Id;

/// A specific action allowed on a resource type, uniquely named per
/// tenant. The structured name is `resource:action`; either segment may be
/// a trailing glob (`document:*`, `*`).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Permission {
    /// Identifier (`perm_` prefix).
    pub id: Id,
    /// Owning tenant.
    pub tenant_id: String,
    /// Owning application.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub app_id: String,
    /// Unique per-tenant name, conventionally `resource:action`.
    pub name: String,
    /// Free-text description.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    /// Resource segment of the permission.
    pub resource: String,
    /// Action segment of the permission.
    pub action: String,
    /// System permissions cannot be modified or deleted.
    #[serde(default)]
    pub is_system: bool,
    /// Free-form metadata.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, Value>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

impl Permission {
    /// Returns the `resource:action` form used for matching.
    pub fn qualified_name(&self) -> String {
        format!("{}:{}", self.resource, self.action)
    }
}

/// Filters for listing permissions.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PermissionFilter {
    /// Restrict to a tenant.
    #[serde(default)]
    pub tenant_id: String,
    /// Restrict to a resource segment.
    #[serde(default)]
    pub resource: String,
    /// Restrict to an action segment.
    #[serde(default)]
    pub action: String,
    /// Restrict to (non-)system permissions.
    #[serde(default)]
    pub is_system: Option<bool>,
    /// Case-insensitive name search.
    #[serde(default)]
    pub search: String,
    /// Page size; 0 means unlimited.
    #[serde(default)]
    pub limit: usize,
    /// Page offset.
    #[serde(default)]
    pub offset: usize,
}

/// Persistence operations for permissions.
#[async_trait]
pub trait PermissionStore {
    /// Persists a new permission.
    async fn create_permission(&self, permission: &Permission) -> StoreResult<()>;

    /// Retrieves a permission by identifier.
    async fn get_permission(&self, permission_id: Id) -> StoreResult<Permission>;

    /// Retrieves a permission by tenant and name.
    async fn get_permission_by_name(&self, tenant_id: &str, name: &str) -> StoreResult<Permission>;

    /// Persists changes to a permission. System permissions are rejected
    /// with a precondition error.
    async fn update_permission(&self, permission: &Permission) -> StoreResult<()>;

    /// Removes a permission by identifier. System permissions are
    /// rejected with a precondition error.
    async fn delete_permission(&self, permission_id: Id) -> StoreResult<()>;

    /// Returns permissions matching the filter.
    async fn list_permissions(&self, filter: &PermissionFilter) -> StoreResult<Vec<Permission>>;

    /// Returns the number of permissions matching the filter.
    async fn count_permissions(&self, filter: &PermissionFilter) -> StoreResult<u64>;

    /// Returns all permissions attached to a role.
    async fn list_permissions_by_role(&self, role_id: Id) -> StoreResult<Vec<Permission>>;

    /// Returns all permissions granted to a subject through its assigned
    /// roles.
    async fn list_permissions_by_subject(
        &self,
        tenant_id: &str,
        subject_kind: &str,
        subject_id: &str,
    ) -> StoreResult<Vec<Permission>>;

    /// Removes all permissions for a tenant.
    async fn delete_permissions_by_tenant(&self, tenant_id: &str) -> StoreResult<()>;
}
