//! The ABAC policy entity with conditions and operators, plus its store
//! contract.

use std::collections::HashMap;
use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::StoreResult;
use crate::id::Id;

/// Policy outcome.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Effect {
    /// Permits matching requests.
    Allow,
    /// Blocks matching requests. An explicit deny overrides any allow.
    Deny,
}

impl fmt::Display for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Effect::Allow => "allow",
            Effect::Deny => "deny",
        })
    }
}

/// An attribute-based access control rule.
///
/// A policy applies to a request iff its subject, action, and resource
/// matchers all match and every condition holds. Evaluation visits active
/// policies in priority order (lower first).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Policy {
    /// Identifier (`wpol_` prefix).
    pub id: Id,
    /// Owning tenant.
    pub tenant_id: String,
    /// Owning application.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub app_id: String,
    /// Unique per-tenant name.
    pub name: String,
    /// Free-text description.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    /// Allow or deny.
    pub effect: Effect,
    /// Evaluation order; lower priorities are visited first.
    #[serde(default)]
    pub priority: i32,
    /// Inactive policies are never evaluated.
    pub is_active: bool,
    /// Monotonic revision counter.
    #[serde(default)]
    pub version: i32,
    /// Subject matchers; empty matches every subject.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub subjects: Vec<SubjectMatch>,
    /// Action patterns; empty matches every action.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub actions: Vec<String>,
    /// Resource patterns; empty matches every resource.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resources: Vec<String>,
    /// Conditions, all of which must hold.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
    /// Free-form metadata.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, Value>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

/// Restricts which subjects a policy applies to. Every non-empty field
/// must match.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SubjectMatch {
    /// Subject kind, e.g. `"user"`.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub kind: String,
    /// Subject identifier.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    /// Role slug the subject must hold (stored for external tooling).
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub role: String,
}

/// A single attribute predicate within a policy.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    /// Identifier (`cond_` prefix).
    #[serde(default, skip_serializing_if = "Id::is_nil")]
    pub id: Id,
    /// Dotted field path into the request, e.g. `subject.id` or
    /// `context.ip`.
    pub field: String,
    /// Comparison operator.
    pub operator: Operator,
    /// Expected value the resolved field is compared against.
    pub value: Value,
}

/// Comparison operator for conditions.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    /// Textual equality after stringification.
    Eq,
    /// Textual inequality after stringification.
    Neq,
    /// Membership in a list.
    In,
    /// Absence from a list.
    NotIn,
    /// Substring containment.
    Contains,
    /// String prefix.
    StartsWith,
    /// String suffix.
    EndsWith,
    /// Numeric greater-than after float coercion.
    Gt,
    /// Numeric less-than after float coercion.
    Lt,
    /// Numeric greater-or-equal after float coercion.
    Gte,
    /// Numeric less-or-equal after float coercion.
    Lte,
    /// The field is present.
    Exists,
    /// The field is absent.
    NotExists,
    /// The field parses as an IP contained in one of the expected CIDRs.
    IpInCidr,
    /// The field parses as a time after the expected one.
    TimeAfter,
    /// The field parses as a time before the expected one.
    TimeBefore,
    /// The field matches the expected regular expression.
    Regex,
}

/// Filters for listing policies.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PolicyFilter {
    /// Restrict to a tenant.
    #[serde(default)]
    pub tenant_id: String,
    /// Restrict to an effect.
    #[serde(default)]
    pub effect: Option<Effect>,
    /// Restrict to (in)active policies.
    #[serde(default)]
    pub is_active: Option<bool>,
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

/// Persistence operations for ABAC policies.
#[async_trait]
pub trait PolicyStore {
    /// Persists a new policy.
    async fn create_policy(&self, policy: &Policy) -> StoreResult<()>;

    /// Retrieves a policy by identifier.
    async fn get_policy(&self, policy_id: Id) -> StoreResult<Policy>;

    /// Retrieves a policy by tenant and name.
    async fn get_policy_by_name(&self, tenant_id: &str, name: &str) -> StoreResult<Policy>;

    /// Persists changes to a policy.
    async fn update_policy(&self, policy: &Policy) -> StoreResult<()>;

    /// Removes a policy by identifier.
    async fn delete_policy(&self, policy_id: Id) -> StoreResult<()>;

    /// Returns policies matching the filter.
    async fn list_policies(&self, filter: &PolicyFilter) -> StoreResult<Vec<Policy>>;

    /// Returns the number of policies matching the filter.
    async fn count_policies(&self, filter: &PolicyFilter) -> StoreResult<u64>;

    /// Returns all active policies for a tenant, ordered by ascending
    /// priority with creation order as the tie-break.
    async fn list_active_policies(&self, tenant_id: &str) -> StoreResult<Vec<Policy>>;

    /// Updates a policy's version number.
    async fn set_policy_version(&self, policy_id: Id, version: i32) -> StoreResult<()>;

    /// Removes all policies for a tenant.
    async fn delete_policies_by_tenant(&self, tenant_id: &str) -> StoreResult<()>;
}
