//! The relation tuple entity (Zanzibar-style edge) and its store contract.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::StoreResult;
use crate::id::Id;

/// A directed relationship edge between an object and a subject.
///
/// A non-empty `subject_relation` makes the subject a *subject set*: every
/// principal holding that relation on the subject object. Subject sets are
/// what enable transitive resolution, e.g.
/// `document:readme#viewer@group:eng#member`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RelationTuple {
    /// Identifier (`rel_` prefix).
    pub id: Id,
    /// Owning tenant.
    pub tenant_id: String,
    /// Owning application.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub app_id: String,
    /// Object type, e.g. `"document"`.
    pub object_type: String,
    /// Object identifier.
    pub object_id: String,
    /// Relation held on the object, e.g. `"viewer"`.
    pub relation: String,
    /// Subject type, e.g. `"user"` or `"folder"`.
    pub subject_type: String,
    /// Subject identifier.
    pub subject_id: String,
    /// Relation on the subject object for subject-set tuples; empty for a
    /// direct subject.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub subject_relation: String,
    /// Free-form metadata.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, Value>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// Filters for listing relation tuples.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RelationFilter {
    /// Restrict to a tenant.
    #[serde(default)]
    pub tenant_id: String,
    /// Restrict to an object type.
    #[serde(default)]
    pub object_type: String,
    /// Restrict to an object identifier.
    #[serde(default)]
    pub object_id: String,
    /// Restrict to a relation name.
    #[serde(default)]
    pub relation: String,
    /// Restrict to a subject type.
    #[serde(default)]
    pub subject_type: String,
    /// Restrict to a subject identifier.
    #[serde(default)]
    pub subject_id: String,
    /// Restrict to a subject relation.
    #[serde(default)]
    pub subject_relation: String,
    /// Page size; 0 means unlimited.
    #[serde(default)]
    pub limit: usize,
    /// Page offset.
    #[serde(default)]
    pub offset: usize,
}

/// Persistence operations for relation tuples.
#[async_trait]
pub trait RelationStore {
    /// Persists a new relation tuple.
    async fn create_relation(&self, tuple: &RelationTuple) -> StoreResult<()>;

    /// Removes a relation tuple by identifier.
    async fn delete_relation(&self, relation_id: Id) -> StoreResult<()>;

    /// Removes a relation tuple by its composite key.
    #[allow(clippy::too_many_arguments)]
    async fn delete_relation_tuple(
        &self,
        tenant_id: &str,
        object_type: &str,
        object_id: &str,
        relation: &str,
        subject_type: &str,
        subject_id: &str,
    ) -> StoreResult<()>;

    /// Returns relation tuples matching the filter.
    async fn list_relations(&self, filter: &RelationFilter) -> StoreResult<Vec<RelationTuple>>;

    /// Returns the number of tuples matching the filter.
    async fn count_relations(&self, filter: &RelationFilter) -> StoreResult<u64>;

    /// Returns tuples where the given object carries the given relation.
    async fn list_relation_subjects(
        &self,
        tenant_id: &str,
        object_type: &str,
        object_id: &str,
        relation: &str,
    ) -> StoreResult<Vec<RelationTuple>>;

    /// Returns tuples where the given subject carries the given relation.
    async fn list_relation_objects(
        &self,
        tenant_id: &str,
        subject_type: &str,
        subject_id: &str,
        relation: &str,
    ) -> StoreResult<Vec<RelationTuple>>;

    /// Checks whether a direct relation exists between subject and object.
    #[allow(clippy::too_many_arguments)]
    async fn check_direct_relation(
        &self,
        tenant_id: &str,
        object_type: &str,
        object_id: &str,
        relation: &str,
        subject_type: &str,
        subject_id: &str,
    ) -> StoreResult<bool>;

    /// Removes all relation tuples for an object.
    async fn delete_relations_by_object(
        &self,
        tenant_id: &str,
        object_type: &str,
        object_id: &str,
    ) -> StoreResult<()>;

    /// Removes all relation tuples for a subject.
    async fn delete_relations_by_subject(
        &self,
        tenant_id: &str,
        subject_type: &str,
        subject_id: &str,
    ) -> StoreResult<()>;

    /// Removes all relation tuples for a tenant.
    async fn delete_relations_by_tenant(&self, tenant_id: &str) -> StoreResult<()>;
}
