//! The assignment entity (role to subject binding) and its store contract.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::StoreResult;
use crate::id::Id;

/// Binds a role to a subject within a tenant.
///
/// An empty resource scope denotes a global assignment; a non-empty scope
/// grants the role only on one specific resource. Expired assignments must
/// not contribute to evaluation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    /// Identifier (`asgn_` prefix).
    pub id: Id,
    /// Owning tenant.
    pub tenant_id: String,
    /// Owning application.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub app_id: String,
    /// Assigned role.
    pub role_id: Id,
    /// Subject kind, e.g. `"user"`.
    pub subject_kind: String,
    /// Subject identifier.
    pub subject_id: String,
    /// Resource type scope; empty for global assignments.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub resource_type: String,
    /// Resource identifier scope; empty for global assignments.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub resource_id: String,
    /// Wall-clock expiration, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    /// Identifier of the principal that granted the assignment.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub granted_by: String,
    /// Free-form metadata.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, Value>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl Assignment {
    /// Reports whether the assignment has expired at `now`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at < now)
    }
}

/// Filters for listing assignments.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AssignmentFilter {
    /// Restrict to a tenant.
    #[serde(default)]
    pub tenant_id: String,
    /// Restrict to a role.
    #[serde(default)]
    pub role_id: Option<Id>,
    /// Restrict to a subject kind.
    #[serde(default)]
    pub subject_kind: String,
    /// Restrict to a subject identifier.
    #[serde(default)]
    pub subject_id: String,
    /// Restrict to a resource type scope.
    #[serde(default)]
    pub resource_type: String,
    /// Restrict to a resource identifier scope.
    #[serde(default)]
    pub resource_id: String,
    /// Page size; 0 means unlimited.
    #[serde(default)]
    pub limit: usize,
    /// Page offset.
    #[serde(default)]
    pub offset: usize,
}

/// Persistence operations for role assignments.
#[async_trait]
pub trait AssignmentStore {
    /// Persists a new assignment.
    async fn create_assignment(&self, assignment: &Assignment) -> StoreResult<()>;

    /// Retrieves an assignment by identifier.
    async fn get_assignment(&self, assignment_id: Id) -> StoreResult<Assignment>;

    /// Removes an assignment by identifier.
    async fn delete_assignment(&self, assignment_id: Id) -> StoreResult<()>;

    /// Returns assignments matching the filter.
    async fn list_assignments(&self, filter: &AssignmentFilter) -> StoreResult<Vec<Assignment>>;

    /// Returns the number of assignments matching the filter.
    async fn count_assignments(&self, filter: &AssignmentFilter) -> StoreResult<u64>;

    /// Returns identifiers of roles assigned to a subject globally
    /// (assignments with an empty resource scope). Expired assignments are
    /// excluded.
    async fn list_roles_for_subject(
        &self,
        tenant_id: &str,
        subject_kind: &str,
        subject_id: &str,
    ) -> StoreResult<Vec<Id>>;

    /// Returns identifiers of roles assigned to a subject on a specific
    /// resource. Expired assignments are excluded.
    async fn list_roles_for_subject_on_resource(
        &self,
        tenant_id: &str,
        subject_kind: &str,
        subject_id: &str,
        resource_type: &str,
        resource_id: &str,
    ) -> StoreResult<Vec<Id>>;

    /// Returns all assignments for a role.
    async fn list_subjects_for_role(&self, role_id: Id) -> StoreResult<Vec<Assignment>>;

    /// Removes assignments that expired before `now`; returns the number
    /// removed.
    async fn delete_expired_assignments(&self, now: DateTime<Utc>) -> StoreResult<u64>;

    /// Removes all assignments for a subject.
    async fn delete_assignments_by_subject(
        &self,
        tenant_id: &str,
        subject_kind: &str,
        subject_id: &str,
    ) -> StoreResult<()>;

    /// Removes all assignments for a role.
    async fn delete_assignments_by_role(&self, role_id: Id) -> StoreResult<()>;

    /// Removes all assignments for a tenant.
    async fn delete_assignments_by_tenant(&self, tenant_id: &str) -> StoreResult<()>;
}
