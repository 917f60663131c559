//! Check-result caching.

use async_trait::async_trait;

use crate::check::{CheckRequest, CheckResult, SubjectKind};

/// Cache for authorization check results.
#[async_trait]
pub trait Cache: Send + Sync {
    /// Returns a cached result for the request, if present and fresh.
    async fn get(&self, tenant_id: &str, req: &CheckRequest) -> Option<CheckResult>;

    /// Stores a check result.
    async fn set(&self, tenant_id: &str, req: &CheckRequest, result: &CheckResult);

    /// Removes every cached result for a tenant.
    async fn invalidate_tenant(&self, tenant_id: &str);

    /// Removes every cached result for a specific subject.
    async fn invalidate_subject(&self, tenant_id: &str, kind: SubjectKind, subject_id: &str);
}

/// Builds the cache key for a request.
pub(crate) fn cache_key(tenant_id: &str, req: &CheckRequest) -> String {
    format!(
        "{}:{}:{}:{}:{}:{}",
        tenant_id,
        req.subject.kind,
        req.subject.id,
        req.action.name,
        req.resource.kind,
        req.resource.id,
    )
}

/// No-op cache implementation.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoCache;

#[async_trait]
impl Cache for NoCache {
    async fn get(&self, _tenant_id: &str, _req: &CheckRequest) -> Option<CheckResult> {
        None
    }

    async fn set(&self, _tenant_id: &str, _req: &CheckRequest, _result: &CheckResult) {}

    async fn invalidate_tenant(&self, _tenant_id: &str) {}

    async fn invalidate_subject(&self, _tenant_id: &str, _kind: SubjectKind, _subject_id: &str) {}
}
