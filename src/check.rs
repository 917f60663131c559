//! Check request and result types shared by every evaluation model.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Kind of actor making an authorization request.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubjectKind {
    /// A human user.
    User,
    /// An API key.
    ApiKey,
    /// A service-to-service caller.
    Service,
    /// A service account.
    ServiceAcct,
}

impl SubjectKind {
    /// Returns the stable string form.
    pub fn as_str(self) -> &'static str {
        match self {
            SubjectKind::User => "user",
            SubjectKind::ApiKey => "api_key",
            SubjectKind::Service => "service",
            SubjectKind::ServiceAcct => "service_acct",
        }
    }
}

impl fmt::Display for SubjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Actor in an authorization check.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Subject {
    /// Actor kind.
    pub kind: SubjectKind,
    /// Actor identifier (opaque to the engine).
    pub id: String,
    /// Free-form attributes consulted by ABAC conditions.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub attributes: HashMap<String, Value>,
}

impl Subject {
    /// Creates a subject without attributes.
    pub fn new(kind: SubjectKind, id: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
            attributes: HashMap::new(),
        }
    }
}

/// Target of an authorization check.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    /// Resource type, e.g. `"document"`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Resource identifier; empty for type-level checks.
    #[serde(default)]
    pub id: String,
    /// Free-form attributes consulted by ABAC conditions.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub attributes: HashMap<String, Value>,
}

impl Resource {
    /// Creates a resource without attributes.
    pub fn new(kind: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            id: id.into(),
            attributes: HashMap::new(),
        }
    }
}

/// Operation the subject wants to perform.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Action {
    /// Action name, e.g. `"read"`.
    pub name: String,
}

impl Action {
    /// Creates an action.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// Input to an authorization check.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CheckRequest {
    /// Actor.
    pub subject: Subject,
    /// Requested operation.
    pub action: Action,
    /// Target resource.
    pub resource: Resource,
    /// Request context consulted by ABAC conditions (`context.*` fields).
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub context: HashMap<String, Value>,
}

impl CheckRequest {
    /// Creates a request from the five core coordinates.
    pub fn new(
        subject_kind: SubjectKind,
        subject_id: impl Into<String>,
        action: impl Into<String>,
        resource_type: impl Into<String>,
        resource_id: impl Into<String>,
    ) -> Self {
        Self {
            subject: Subject::new(subject_kind, subject_id),
            action: Action::new(action),
            resource: Resource::new(resource_type, resource_id),
            context: HashMap::new(),
        }
    }
}

/// Machine-readable authorization outcome.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    /// The request is permitted.
    Allow,
    /// The request is denied (generic).
    Deny,
    /// An explicit deny policy matched.
    DenyExplicit,
    /// No matching allow rule was found.
    DenyDefault,
    /// The subject has no roles assigned.
    DenyNoRoles,
    /// No role grants the required permission.
    DenyNoPerms,
    /// An ABAC condition blocked the request.
    DenyCondition,
    /// No matching relation was found.
    DenyRelation,
}

impl Decision {
    /// Returns the stable string form.
    pub fn as_str(self) -> &'static str {
        match self {
            Decision::Allow => "allow",
            Decision::Deny => "deny",
            Decision::DenyExplicit => "deny_explicit",
            Decision::DenyDefault => "deny_default",
            Decision::DenyNoRoles => "deny_no_roles",
            Decision::DenyNoPerms => "deny_no_perms",
            Decision::DenyCondition => "deny_condition",
            Decision::DenyRelation => "deny_relation",
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifies which rule produced an allow.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MatchInfo {
    /// Evaluation model: `"rbac"`, `"rebac"`, or `"abac"`.
    pub source: String,
    /// Identifier of the matching rule, where applicable.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub rule_id: String,
    /// Short human-readable detail.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub detail: String,
}

/// Outcome of an authorization check.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CheckResult {
    /// Whether the request is permitted.
    pub allowed: bool,
    /// Machine-readable decision code.
    pub decision: Decision,
    /// Human-readable reason, set on denials.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub reason: String,
    /// Rules that produced the decision.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub matched_by: Vec<MatchInfo>,
    /// Wall-clock evaluation time in nanoseconds.
    pub eval_time_ns: i64,
}

impl Default for Decision {
    fn default() -> Self {
        Decision::Deny
    }
}

impl CheckResult {
    pub(crate) fn allow(matched_by: MatchInfo) -> Self {
        CheckResult {
            allowed: true,
            decision: Decision::Allow,
            matched_by: vec![matched_by],
            ..CheckResult::default()
        }
    }

    pub(crate) fn deny(decision: Decision, reason: impl Into<String>) -> Self {
        CheckResult {
            decision,
            reason: reason.into(),
            ..CheckResult::default()
        }
    }
}
