//! The resource type entity (relation schema definition) and its store
//! contract.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::StoreResult;
use crate::id::Id;

/// Schema definition for a resource kind: the relations an object may
/// carry and derived permission expressions.
///
/// Stored as an artefact for external validators; the core evaluator does
/// not consult it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ResourceType {
    /// Identifier (`rtype_` prefix).
    pub id: Id,
    /// Owning tenant.
    pub tenant_id: String,
    /// Owning application.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub app_id: String,
    /// Unique per-tenant name, e.g. `"document"`.
    pub name: String,
    /// Free-text description.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    /// Valid relations for this resource kind.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub relations: Vec<RelationDef>,
    /// Derived permission expressions.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub permissions: Vec<PermissionDef>,
    /// Free-form metadata.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, Value>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

/// A valid relation on a resource type.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RelationDef {
    /// Relation name, e.g. `"viewer"`.
    pub name: String,
    /// Subject types allowed on the relation.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub allowed_subjects: Vec<String>,
}

/// A derived permission expression, e.g. `"viewer or editor or owner"`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PermissionDef {
    /// Permission name.
    pub name: String,
    /// Derivation expression over relations.
    pub expression: String,
}

/// Filters for listing resource types.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ResourceTypeFilter {
    /// Restrict to a tenant.
    #[serde(default)]
    pub tenant_id: String,
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

/// Persistence operations for resource type definitions.
#[async_trait]
pub trait ResourceTypeStore {
    /// Persists a new resource type.
    async fn create_resource_type(&self, resource_type: &ResourceType) -> StoreResult<()>;

    /// Retrieves a resource type by identifier.
    async fn get_resource_type(&self, resource_type_id: Id) -> StoreResult<ResourceType>;

    /// Retrieves a resource type by tenant and name.
    async fn get_resource_type_by_name(
        &self,
        tenant_id: &str,
        name: &str,
    ) -> StoreResult<ResourceType>;

    /// Persists changes to a resource type.
    async fn update_resource_type(&self, resource_type: &ResourceType) -> StoreResult<()>;

    /// Removes a resource type by identifier.
    async fn delete_resource_type(&self, resource_type_id: Id) -> StoreResult<()>;

    /// Returns resource types matching the filter.
    async fn list_resource_types(
        &self,
        filter: &ResourceTypeFilter,
    ) -> StoreResult<Vec<ResourceType>>;

    /// Returns the number of resource types matching the filter.
    async fn count_resource_types(&self, filter: &ResourceTypeFilter) -> StoreResult<u64>;

    /// Removes all resource types for a tenant.
    async fn delete_resource_types_by_tenant(&self, tenant_id: &str) -> StoreResult<()>;
}
