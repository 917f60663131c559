//! Ambient request context and tenant scope resolution.

use serde::{Deserialize, Serialize};

/// The (application, tenant) pair every store query is filtered by.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct TenantScope {
    /// Application identifier.
    pub app_id: String,
    /// Tenant identifier. Empty denotes the null tenant, which is distinct
    /// from every populated tenant.
    pub tenant_id: String,
}

impl TenantScope {
    /// Creates a scope.
    pub fn new(app_id: impl Into<String>, tenant_id: impl Into<String>) -> Self {
        Self {
            app_id: app_id.into(),
            tenant_id: tenant_id.into(),
        }
    }
}

/// Per-request ambient context carried through a check.
///
/// Two scope sources are consulted in priority order: a [`TenantScope`]
/// bound by a host framework, then the standalone app/tenant values set via
/// [`Context::with_tenant`]. With neither present all store queries operate
/// over the null tenant. Cancellation follows the caller: dropping a check
/// future aborts the check at its next store call.
#[derive(Clone, Debug, Default)]
pub struct Context {
    scope: Option<TenantScope>,
    app_id: Option<String>,
    tenant_id: Option<String>,
}

impl Context {
    /// Creates an empty context scoped to the null tenant.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a context with standalone app and tenant identifiers.
    pub fn with_tenant(app_id: impl Into<String>, tenant_id: impl Into<String>) -> Self {
        Self {
            scope: None,
            app_id: Some(app_id.into()),
            tenant_id: Some(tenant_id.into()),
        }
    }

    /// Binds a host-framework scope object. It takes priority over any
    /// standalone values.
    pub fn bind_scope(mut self, scope: TenantScope) -> Self {
        self.scope = Some(scope);
        self
    }

    /// Resolves the effective scope.
    pub fn resolve_scope(&self) -> TenantScope {
        if let Some(scope) = &self.scope {
            return scope.clone();
        }
        TenantScope {
            app_id: self.app_id.clone().unwrap_or_default(),
            tenant_id: self.tenant_id.clone().unwrap_or_default(),
        }
    }
}

impl From<TenantScope> for Context {
    fn from(scope: TenantScope) -> Self {
        Context::new().bind_scope(scope)
    }
}
