//! The role entity and its store contract.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::StoreResult;
use crate::id::Id;

/// Named authorization bundle scoped to a tenant, uniquely identified
/// within the tenant by `slug`.
///
/// A role may inherit from a parent role. The ancestor chain must stay
/// acyclic; evaluation bounds traversal at depth 20 as a safety net.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Role {
    /// Identifier (`role_` prefix).
    pub id: Id,
    /// Owning tenant; empty denotes the null tenant.
    pub tenant_id: String,
    /// Owning application.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub app_id: String,
    /// Display name.
    pub name: String,
    /// Free-text description.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    /// Stable per-tenant handle.
    pub slug: String,
    /// System roles cannot be modified or deleted.
    #[serde(default)]
    pub is_system: bool,
    /// Whether the role is granted to new subjects by default.
    #[serde(default)]
    pub is_default: bool,
    /// Parent role for inheritance, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<Id>,
    /// Maximum number of subjects that may hold the role, if bounded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_members: Option<u32>,
    /// Free-form metadata.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, Value>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

/// Filters for listing roles.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RoleFilter {
    /// Restrict to a tenant.
    #[serde(default)]
    pub tenant_id: String,
    /// Restrict to (non-)system roles.
    #[serde(default)]
    pub is_system: Option<bool>,
    /// Restrict to (non-)default roles.
    #[serde(default)]
    pub is_default: Option<bool>,
    /// Restrict to children of a parent role.
    #[serde(default)]
    pub parent_id: Option<Id>,
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

/// Persistence operations for roles.
#[async_trait]
pub trait RoleStore {
    /// Persists a new role.
    async fn create_role(&self, role: &Role) -> StoreResult<()>;

    /// Retrieves a role by identifier.
    async fn get_role(&self, role_id: Id) -> StoreResult<Role>;

    /// Retrieves a role by tenant and slug.
    async fn get_role_by_slug(&self, tenant_id: &str, slug: &str) -> StoreResult<Role>;

    /// Persists changes to a role. System roles are rejected with a
    /// precondition error.
    async fn update_role(&self, role: &Role) -> StoreResult<()>;

    /// Removes a role by identifier. System roles are rejected with a
    /// precondition error.
    async fn delete_role(&self, role_id: Id) -> StoreResult<()>;

    /// Returns roles matching the filter.
    async fn list_roles(&self, filter: &RoleFilter) -> StoreResult<Vec<Role>>;

    /// Returns the number of roles matching the filter.
    async fn count_roles(&self, filter: &RoleFilter) -> StoreResult<u64>;

    /// Returns permission identifiers attached to a role.
    async fn list_role_permissions(&self, role_id: Id) -> StoreResult<Vec<Id>>;

    /// Links a permission to a role.
    async fn attach_permission(&self, role_id: Id, permission_id: Id) -> StoreResult<()>;

    /// Removes a permission from a role.
    async fn detach_permission(&self, role_id: Id, permission_id: Id) -> StoreResult<()>;

    /// Replaces all permissions attached to a role.
    async fn set_role_permissions(&self, role_id: Id, permission_ids: &[Id]) -> StoreResult<()>;

    /// Returns direct child roles of a parent.
    async fn list_child_roles(&self, parent_id: Id) -> StoreResult<Vec<Role>>;

    /// Removes all roles for a tenant.
    async fn delete_roles_by_tenant(&self, tenant_id: &str) -> StoreResult<()>;
}
