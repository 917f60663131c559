use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use serde_json::Value;
use tracing::{debug, warn};

use crate::assignment::AssignmentStore;
use crate::cache::{Cache, NoCache};
use crate::check::{CheckRequest, CheckResult, Decision, MatchInfo, SubjectKind};
use crate::check_log::{CheckLogEntry, CheckLogStore};
use crate::config::Config;
use crate::context::{Context, TenantScope};
use crate::error::{Error, Result};
use crate::evaluator::{ConditionEvaluator, PolicyEvaluator};
use crate::graph::{BfsGraphWalker, GraphWalker};
use crate::id::Id;
use crate::matcher::match_permission;
use crate::permission::PermissionStore;
use crate::plugin::{Event, Plugin, PluginRegistry};
use crate::policy::PolicyStore;
use crate::relation::RelationStore;
use crate::role::RoleStore;
use crate::store::Store;

// Parent-chain traversal stops expanding past this depth. A cap this deep
// is a safety net, not a policy decision.
const ROLE_PARENT_DEPTH_LIMIT: usize = 20;

/// The central authorization engine.
///
/// Coordinates role-based, relationship-based, and attribute-based
/// evaluation against a [`Store`], merges the verdicts under a fixed
/// precedence, caches results, and fires observer hooks.
pub struct Engine<S, C = NoCache> {
    store: S,
    evaluator: Box<dyn PolicyEvaluator>,
    walker: Box<dyn GraphWalker>,
    cache: C,
    plugins: PluginRegistry,
    config: Config,
}

impl<S, C> std::fmt::Debug for Engine<S, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("plugins", &self.plugins)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Builder for [`Engine`]. The store is required up front; everything
/// else has defaults: all three models enabled, BFS graph walker with
/// depth 10, built-in condition evaluator, no cache.
pub struct EngineBuilder<S, C = NoCache> {
    store: S,
    evaluator: Box<dyn PolicyEvaluator>,
    walker: Option<Box<dyn GraphWalker>>,
    cache: C,
    plugins: PluginRegistry,
    config: Config,
}

impl<S> EngineBuilder<S, NoCache> {
    /// Creates a builder with default configuration.
    pub fn new(store: S) -> Self {
        Self {
            store,
            evaluator: Box::new(ConditionEvaluator),
            walker: None,
            cache: NoCache,
            plugins: PluginRegistry::new(),
            config: Config::default(),
        }
    }
}

impl<S, C> EngineBuilder<S, C> {
    /// Replaces the engine configuration.
    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Sets the maximum relation graph traversal depth.
    pub fn max_graph_depth(mut self, depth: usize) -> Self {
        self.config.max_graph_depth = depth;
        self
    }

    /// Replaces the ABAC policy evaluator.
    pub fn evaluator(mut self, evaluator: impl PolicyEvaluator + 'static) -> Self {
        self.evaluator = Box::new(evaluator);
        self
    }

    /// Replaces the relation graph walker.
    pub fn graph_walker(mut self, walker: impl GraphWalker + 'static) -> Self {
        self.walker = Some(Box::new(walker));
        self
    }

    /// Registers an observer plugin. Plugins are notified in registration
    /// order.
    pub fn plugin(mut self, plugin: impl Plugin + 'static) -> Self {
        self.plugins.register(Arc::new(plugin));
        self
    }

    /// Sets the check-result cache implementation.
    pub fn cache<C2: Cache>(self, cache: C2) -> EngineBuilder<S, C2> {
        EngineBuilder {
            store: self.store,
            evaluator: self.evaluator,
            walker: self.walker,
            cache,
            plugins: self.plugins,
            config: self.config,
        }
    }

    /// Builds the engine.
    pub fn build(self) -> Engine<S, C> {
        let walker = self
            .walker
            .unwrap_or_else(|| Box::new(BfsGraphWalker::new(self.config.max_graph_depth)));
        Engine {
            store: self.store,
            evaluator: self.evaluator,
            walker,
            cache: self.cache,
            plugins: self.plugins,
            config: self.config,
        }
    }
}

impl<S, C> Engine<S, C>
where
    S: Store,
    C: Cache,
{
    /// Returns the underlying composite store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Returns the plugin registry.
    pub fn plugins(&self) -> &PluginRegistry {
        &self.plugins
    }

    /// Returns the engine configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Performs any startup initialization.
    pub async fn start(&self) -> Result<()> {
        debug!("engine started");
        Ok(())
    }

    /// Performs a best-effort graceful shutdown, notifying plugins.
    pub async fn stop(&self) -> Result<()> {
        self.plugins.emit(Event::Shutdown).await;
        debug!("engine stopped");
        Ok(())
    }

    /// Performs an authorization check. This is the hot path.
    pub async fn check(&self, ctx: &Context, req: &CheckRequest) -> Result<CheckResult> {
        let start = Instant::now();
        let scope = ctx.resolve_scope();

        if let Some(mut cached) = self.cache.get(&scope.tenant_id, req).await {
            cached.eval_time_ns = elapsed_ns(start);
            return Ok(cached);
        }

        self.plugins.emit(Event::BeforeCheck(req)).await;

        let rbac = if self.config.enable_rbac {
            Some(
                self.evaluate_rbac(&scope, req)
                    .await
                    .map_err(|err| Error::model("rbac", err))?,
            )
        } else {
            None
        };

        let rebac = if self.config.enable_rebac {
            Some(
                self.evaluate_rebac(&scope, req)
                    .await
                    .map_err(|err| Error::model("rebac", err))?,
            )
        } else {
            None
        };

        let abac = if self.config.enable_abac {
            self.evaluate_abac(&scope, req)
                .await
                .map_err(|err| Error::model("abac", err))?
        } else {
            None
        };

        let mut result = merge_decisions(rbac, rebac, abac);
        result.eval_time_ns = elapsed_ns(start);

        self.cache.set(&scope.tenant_id, req, &result).await;

        if self.config.log_checks {
            self.write_check_log(&scope, req, &result).await;
        }

        self.plugins.emit(Event::AfterCheck(req, &result)).await;

        Ok(result)
    }

    /// Runs a check and returns an error if the request is denied.
    pub async fn enforce(&self, ctx: &Context, req: &CheckRequest) -> Result<()> {
        let result = self.check(ctx, req).await?;
        if !result.allowed {
            return Err(Error::AccessDenied {
                decision: result.decision,
                reason: result.reason,
            });
        }
        Ok(())
    }

    /// Shorthand for a simple authorization check.
    pub async fn can_i(
        &self,
        ctx: &Context,
        subject_kind: SubjectKind,
        subject_id: &str,
        action: &str,
        resource_type: &str,
        resource_id: &str,
    ) -> Result<bool> {
        let req = CheckRequest::new(subject_kind, subject_id, action, resource_type, resource_id);
        Ok(self.check(ctx, &req).await?.allowed)
    }

    async fn evaluate_rbac(&self, scope: &TenantScope, req: &CheckRequest) -> Result<CheckResult> {
        let kind = req.subject.kind.as_str();
        let mut all_roles = self
            .store
            .list_roles_for_subject(&scope.tenant_id, kind, &req.subject.id)
            .await?;
        let resource_roles = self
            .store
            .list_roles_for_subject_on_resource(
                &scope.tenant_id,
                kind,
                &req.subject.id,
                &req.resource.kind,
                &req.resource.id,
            )
            .await?;
        all_roles.extend(resource_roles);

        if all_roles.is_empty() {
            return Ok(CheckResult::deny(
                Decision::DenyNoRoles,
                "subject has no roles",
            ));
        }

        let all_roles = self.resolve_inherited_roles(all_roles).await;

        let required = format!("{}:{}", req.resource.kind, req.action.name);
        for role_id in all_roles {
            // A role whose permission list is unreachable grants nothing.
            let Ok(permission_ids) = self.store.list_role_permissions(role_id).await else {
                continue;
            };
            for permission_id in permission_ids {
                let Ok(permission) = self.store.get_permission(permission_id).await else {
                    continue;
                };
                let granted = permission.qualified_name();
                if match_permission(&granted, &required) {
                    return Ok(CheckResult::allow(MatchInfo {
                        source: "rbac".to_string(),
                        rule_id: role_id.to_string(),
                        detail: format!("role grants {granted}"),
                    }));
                }
            }
        }

        Ok(CheckResult::deny(
            Decision::DenyNoPerms,
            "no role grants required permission",
        ))
    }

    /// Expands roles with their ancestors. The seen-set breaks cycles;
    /// the depth cap stops expansion without failing the check.
    async fn resolve_inherited_roles(&self, role_ids: Vec<Id>) -> Vec<Id> {
        let mut seen = HashSet::with_capacity(role_ids.len());
        let mut result = Vec::with_capacity(role_ids.len());

        for role_id in role_ids {
            let mut current = role_id;
            let mut depth = 0;
            while depth <= ROLE_PARENT_DEPTH_LIMIT && seen.insert(current) {
                result.push(current);
                let parent = match self.store.get_role(current).await {
                    Ok(role) => role.parent_id,
                    Err(_) => None,
                };
                let Some(parent) = parent else {
                    break;
                };
                current = parent;
                depth += 1;
            }
        }

        result
    }

    async fn evaluate_rebac(&self, scope: &TenantScope, req: &CheckRequest) -> Result<CheckResult> {
        let direct = self
            .store
            .check_direct_relation(
                &scope.tenant_id,
                &req.resource.kind,
                &req.resource.id,
                &req.action.name,
                req.subject.kind.as_str(),
                &req.subject.id,
            )
            .await?;
        if direct {
            return Ok(CheckResult::allow(MatchInfo {
                source: "rebac".to_string(),
                rule_id: String::new(),
                detail: "direct relation".to_string(),
            }));
        }

        match self.walker.walk(&self.store, &scope.tenant_id, req).await {
            Ok(Some(path)) => {
                return Ok(CheckResult::allow(MatchInfo {
                    source: "rebac".to_string(),
                    rule_id: String::new(),
                    detail: format!("transitive: {path}"),
                }));
            }
            Ok(None) => {}
            // Depth exhaustion is a soft signal: the request falls through
            // to a relation denial.
            Err(Error::GraphDepthExceeded { .. }) => {}
            Err(err) => return Err(err),
        }

        Ok(CheckResult::deny(
            Decision::DenyRelation,
            "no relation found",
        ))
    }

    async fn evaluate_abac(
        &self,
        scope: &TenantScope,
        req: &CheckRequest,
    ) -> Result<Option<CheckResult>> {
        let policies = self.store.list_active_policies(&scope.tenant_id).await?;
        self.evaluator.evaluate(&policies, req).await
    }

    async fn write_check_log(&self, scope: &TenantScope, req: &CheckRequest, result: &CheckResult) {
        let entry = CheckLogEntry {
            id: Id::new_check_log(),
            tenant_id: scope.tenant_id.clone(),
            app_id: scope.app_id.clone(),
            subject_kind: req.subject.kind.as_str().to_string(),
            subject_id: req.subject.id.clone(),
            action: req.action.name.clone(),
            resource_type: req.resource.kind.clone(),
            resource_id: req.resource.id.clone(),
            decision: result.decision,
            reason: result.reason.clone(),
            eval_time_ns: result.eval_time_ns,
            request_ip: req
                .context
                .get("ip")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            metadata: Default::default(),
            created_at: Utc::now(),
        };
        if let Err(err) = self.store.create_check_log(&entry).await {
            warn!(error = %err, "check log write failed");
        }
    }
}

fn elapsed_ns(start: Instant) -> i64 {
    // Clamp so a coarse clock still reports a positive duration.
    start.elapsed().as_nanos().clamp(1, i64::MAX as u128) as i64
}

/// Merges the per-model verdicts: explicit deny beats any allow, any
/// allow beats a default deny, and the most informative denial wins
/// otherwise.
fn merge_decisions(
    rbac: Option<CheckResult>,
    rebac: Option<CheckResult>,
    abac: Option<CheckResult>,
) -> CheckResult {
    let mut results = [rbac, rebac, abac];

    // Explicit deny from ABAC always wins.
    if let Some(deny) = results[2].take_if(|r| r.decision == Decision::DenyExplicit) {
        return deny;
    }

    // Any allow from any model grants access.
    for slot in &mut results {
        if let Some(allow) = slot.take_if(|r| r.allowed) {
            return allow;
        }
    }

    // Default deny: keep the most informative reason.
    for slot in &mut results {
        if let Some(deny) = slot.take_if(|r| !r.reason.is_empty()) {
            return deny;
        }
    }

    CheckResult::deny(Decision::DenyDefault, "no matching allow rule")
}
