use thiserror::Error;

use crate::check::Decision;
use crate::id::Id;

/// Boxed error used for transient store failures and plugin hooks.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Crate result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Store-layer result type.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Error taxonomy for store implementations.
///
/// Backends must map their native failures into these categories so the
/// engine and the API boundary can react uniformly. Wrapping a backend
/// error must preserve the category.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The requested record does not exist.
    #[error("{entity} not found: {key}")]
    NotFound {
        /// Entity family, e.g. `"role"`.
        entity: &'static str,
        /// Lookup key, for diagnostics.
        key: String,
    },
    /// A unique constraint was violated.
    #[error("duplicate {entity}: {key}")]
    Duplicate {
        /// Entity family, e.g. `"assignment"`.
        entity: &'static str,
        /// Conflicting key, for diagnostics.
        key: String,
    },
    /// A domain precondition failed (cyclic parent, immutable record, ...).
    #[error("precondition failed: {0}")]
    Precondition(String),
    /// A retryable backend failure (connection loss, timeout, ...).
    #[error("transient store error: {0}")]
    Transient(#[source] BoxError),
}

impl StoreError {
    /// Reports whether this error is the not-found category.
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }
}

/// Errors returned by this crate.
#[derive(Debug, Error)]
pub enum Error {
    /// An authorization check was denied (returned by enforce).
    #[error("warden: access denied: {decision}: {reason}")]
    AccessDenied {
        /// Machine-readable decision code.
        decision: Decision,
        /// Human-readable reason.
        reason: String,
    },
    /// A sub-evaluator failed; `model` identifies rbac, rebac, or abac.
    #[error("warden {model}: {source}")]
    Model {
        /// Evaluation model that failed.
        model: &'static str,
        #[source]
        source: Box<Error>,
    },
    /// Store error wrapper.
    #[error("store: {0}")]
    Store(#[from] StoreError),
    /// Invalid identifier input.
    #[error("invalid id: {0}")]
    InvalidId(String),
    /// Identifier prefix did not match the expected entity kind.
    #[error("expected id prefix {expected:?}, got {actual:?}")]
    PrefixMismatch {
        /// Prefix required by the call site.
        expected: &'static str,
        /// Prefix found in the input.
        actual: String,
    },
    /// Attempt to modify a system role.
    #[error("system role {0} cannot be modified")]
    SystemRoleImmutable(Id),
    /// Attempt to modify a system permission.
    #[error("system permission {0} cannot be modified")]
    SystemPermissionImmutable(Id),
    /// Role inheritance would create a cycle.
    #[error("cyclic role inheritance detected at {0}")]
    CyclicRoleInheritance(Id),
    /// A role's member limit was reached.
    #[error("role {role} max members exceeded (limit {limit})")]
    MaxMembersExceeded {
        /// Role whose limit was hit.
        role: Id,
        /// Configured member limit.
        limit: u32,
    },
    /// A policy condition is malformed.
    #[error("invalid policy condition: {0}")]
    InvalidCondition(String),
    /// Condition evaluation failed within a named policy.
    #[error("evaluate conditions for policy {policy}: {source}")]
    PolicyCondition {
        /// Policy being evaluated.
        policy: String,
        #[source]
        source: Box<Error>,
    },
    /// Relation graph traversal exceeded the configured depth bound.
    #[error("relation graph depth exceeded (max {max_depth})")]
    GraphDepthExceeded {
        /// Configured traversal bound.
        max_depth: usize,
    },
}

impl Error {
    pub(crate) fn model(model: &'static str, source: Error) -> Error {
        Error::Model {
            model,
            source: Box::new(source),
        }
    }
}
