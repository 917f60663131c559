//! Axum integration: the HTTP surface for the engine under `/v1`.
//!
//! The adapter is a thin request-mapping layer: bodies mirror the check
//! and store contracts, identifiers travel in their textual form, and
//! tenant scope is taken from a [`TenantScope`] request extension when a
//! host framework installed one, else from the `x-warden-app-id` and
//! `x-warden-tenant-id` headers.

use std::collections::HashMap;
use std::convert::Infallible;
use std::future::{Future, poll_fn};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context as TaskContext, Poll};

use ::axum::Router;
use ::axum::body::Body;
use ::axum::extract::{FromRequestParts, Json, Path, Query, State};
use ::axum::http::request::Parts;
use ::axum::http::{HeaderMap, Request, StatusCode};
use ::axum::response::{IntoResponse, Response};
use ::axum::routing::{get, post};
use ::tower::{Layer, Service};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::assignment::{Assignment, AssignmentFilter, AssignmentStore};
use crate::cache::Cache;
use crate::check::{CheckRequest, CheckResult, SubjectKind};
use crate::check_log::{CheckLogEntry, CheckLogFilter, CheckLogStore};
use crate::context::{Context, TenantScope};
use crate::engine::Engine;
use crate::error::{Error, StoreError};
use crate::id::Id;
use crate::permission::{Permission, PermissionFilter, PermissionStore};
use crate::plugin::Event;
use crate::policy::{Condition, Effect, Policy, PolicyFilter, PolicyStore, SubjectMatch};
use crate::relation::{RelationFilter, RelationStore, RelationTuple};
use crate::resource_type::{
    PermissionDef, RelationDef, ResourceType, ResourceTypeFilter, ResourceTypeStore,
};
use crate::role::{Role, RoleFilter, RoleStore};
use crate::store::Store;

const HEADER_APP_ID: &str = "x-warden-app-id";
const HEADER_TENANT_ID: &str = "x-warden-tenant-id";

const DEFAULT_LIMIT: usize = 50;
const MAX_LIMIT: usize = 1000;

/// Builds the full `/v1` router over an engine.
pub fn router<S, C>(engine: Arc<Engine<S, C>>) -> Router
where
    S: Store + 'static,
    C: Cache + 'static,
{
    Router::new()
        .route("/v1/authz/check", post(check::<S, C>))
        .route("/v1/authz/enforce", post(enforce::<S, C>))
        .route("/v1/authz/batch-check", post(batch_check::<S, C>))
        .route("/v1/roles", get(list_roles::<S, C>).post(create_role::<S, C>))
        .route(
            "/v1/roles/{id}",
            get(get_role::<S, C>)
                .put(update_role::<S, C>)
                .delete(delete_role::<S, C>),
        )
        .route(
            "/v1/roles/{id}/permissions",
            get(list_role_permissions::<S, C>).put(set_role_permissions::<S, C>),
        )
        .route(
            "/v1/roles/{id}/permissions/{perm_id}",
            post(attach_permission::<S, C>).delete(detach_permission::<S, C>),
        )
        .route(
            "/v1/permissions",
            get(list_permissions::<S, C>).post(create_permission::<S, C>),
        )
        .route(
            "/v1/permissions/{id}",
            get(get_permission::<S, C>)
                .put(update_permission::<S, C>)
                .delete(delete_permission::<S, C>),
        )
        .route(
            "/v1/assignments",
            get(list_assignments::<S, C>).post(create_assignment::<S, C>),
        )
        .route(
            "/v1/assignments/{id}",
            get(get_assignment::<S, C>).delete(delete_assignment::<S, C>),
        )
        .route(
            "/v1/relations",
            get(list_relations::<S, C>).post(create_relation::<S, C>),
        )
        .route("/v1/relations/{id}", ::axum::routing::delete(delete_relation::<S, C>))
        .route(
            "/v1/policies",
            get(list_policies::<S, C>).post(create_policy::<S, C>),
        )
        .route(
            "/v1/policies/{id}",
            get(get_policy::<S, C>)
                .put(update_policy::<S, C>)
                .delete(delete_policy::<S, C>),
        )
        .route(
            "/v1/resource-types",
            get(list_resource_types::<S, C>).post(create_resource_type::<S, C>),
        )
        .route(
            "/v1/resource-types/{id}",
            get(get_resource_type::<S, C>)
                .put(update_resource_type::<S, C>)
                .delete(delete_resource_type::<S, C>),
        )
        .route("/v1/check-logs", get(list_check_logs::<S, C>))
        .route("/v1/check-logs/{id}", get(get_check_log::<S, C>))
        .with_state(engine)
}

// ──────────────────────────────────────────────────
// Scope binding
// ──────────────────────────────────────────────────

fn scope_from_headers(headers: &HeaderMap) -> TenantScope {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_string()
    };
    TenantScope {
        app_id: header(HEADER_APP_ID),
        tenant_id: header(HEADER_TENANT_ID),
    }
}

impl<S: Send + Sync> FromRequestParts<S> for TenantScope {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        // A host-installed scope extension wins over the header values.
        if let Some(scope) = parts.extensions.get::<TenantScope>() {
            return Ok(scope.clone());
        }
        Ok(scope_from_headers(&parts.headers))
    }
}

/// Middleware layer that parses the scope headers once and installs a
/// [`TenantScope`] into request extensions. Hosts with their own notion
/// of scope can install the extension themselves instead.
#[derive(Clone, Debug, Default)]
pub struct ScopeLayer;

impl<S> Layer<S> for ScopeLayer {
    type Service = ScopeService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        ScopeService { inner }
    }
}

/// Middleware service backing [`ScopeLayer`].
#[derive(Clone, Debug)]
pub struct ScopeService<S> {
    inner: S,
}

impl<S> Service<Request<Body>> for ScopeService<S>
where
    S: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut TaskContext<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, mut req: Request<Body>) -> Self::Future {
        let mut inner = self.inner.clone();
        let scope = scope_from_headers(req.headers());
        req.extensions_mut().insert(scope);

        Box::pin(async move {
            poll_fn(|cx| inner.poll_ready(cx)).await?;
            inner.call(req).await
        })
    }
}

// ──────────────────────────────────────────────────
// Errors and pagination
// ──────────────────────────────────────────────────

/// JSON error envelope returned by every handler.
#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(ErrorBody { error: self.message })).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        let status = match &err {
            StoreError::NotFound { .. } => StatusCode::NOT_FOUND,
            StoreError::Duplicate { .. } | StoreError::Precondition(_) => StatusCode::BAD_REQUEST,
            StoreError::Transient(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        let status = error_status(&err);
        Self {
            status,
            message: err.to_string(),
        }
    }
}

fn error_status(err: &Error) -> StatusCode {
    match err {
        Error::AccessDenied { .. } => StatusCode::FORBIDDEN,
        Error::Model { source, .. } => error_status(source),
        Error::PolicyCondition { source, .. } => error_status(source),
        Error::Store(store_err) => match store_err {
            StoreError::NotFound { .. } => StatusCode::NOT_FOUND,
            StoreError::Duplicate { .. } | StoreError::Precondition(_) => StatusCode::BAD_REQUEST,
            StoreError::Transient(_) => StatusCode::INTERNAL_SERVER_ERROR,
        },
        Error::InvalidId(_)
        | Error::PrefixMismatch { .. }
        | Error::SystemRoleImmutable(_)
        | Error::SystemPermissionImmutable(_)
        | Error::CyclicRoleInheritance(_)
        | Error::MaxMembersExceeded { .. }
        | Error::InvalidCondition(_) => StatusCode::BAD_REQUEST,
        Error::GraphDepthExceeded { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn clamp_limit(limit: Option<usize>) -> usize {
    match limit {
        None | Some(0) => DEFAULT_LIMIT,
        Some(n) => n.min(MAX_LIMIT),
    }
}

// ──────────────────────────────────────────────────
// Authorization endpoints
// ──────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct CheckBody {
    subject_kind: SubjectKind,
    subject_id: String,
    action: String,
    resource_type: String,
    #[serde(default)]
    resource_id: String,
    #[serde(default)]
    subject_attributes: HashMap<String, Value>,
    #[serde(default)]
    resource_attributes: HashMap<String, Value>,
    #[serde(default)]
    context: HashMap<String, Value>,
}

impl CheckBody {
    fn validate(&self) -> Result<(), ApiError> {
        if self.subject_id.is_empty() || self.action.is_empty() || self.resource_type.is_empty() {
            return Err(ApiError::bad_request(
                "subject_id, action, and resource_type are required",
            ));
        }
        Ok(())
    }

    fn into_request(self) -> CheckRequest {
        let mut req = CheckRequest::new(
            self.subject_kind,
            self.subject_id,
            self.action,
            self.resource_type,
            self.resource_id,
        );
        req.subject.attributes = self.subject_attributes;
        req.resource.attributes = self.resource_attributes;
        req.context = self.context;
        req
    }
}

#[derive(Debug, Deserialize)]
struct BatchCheckBody {
    checks: Vec<CheckBody>,
}

#[derive(Debug, Serialize)]
struct BatchCheckResponse {
    results: Vec<CheckResult>,
}

async fn check<S: Store, C: Cache>(
    State(engine): State<Arc<Engine<S, C>>>,
    scope: TenantScope,
    Json(body): Json<CheckBody>,
) -> Result<Json<CheckResult>, ApiError> {
    body.validate()?;
    let result = engine.check(&scope.into(), &body.into_request()).await?;
    Ok(Json(result))
}

async fn enforce<S: Store, C: Cache>(
    State(engine): State<Arc<Engine<S, C>>>,
    scope: TenantScope,
    Json(body): Json<CheckBody>,
) -> Result<Response, ApiError> {
    body.validate()?;
    let result = engine.check(&scope.into(), &body.into_request()).await?;
    let status = if result.allowed {
        StatusCode::OK
    } else {
        StatusCode::FORBIDDEN
    };
    Ok((status, Json(result)).into_response())
}

async fn batch_check<S: Store, C: Cache>(
    State(engine): State<Arc<Engine<S, C>>>,
    scope: TenantScope,
    Json(body): Json<BatchCheckBody>,
) -> Result<Json<BatchCheckResponse>, ApiError> {
    if body.checks.is_empty() {
        return Err(ApiError::bad_request("checks cannot be empty"));
    }
    let ctx: Context = scope.into();
    let mut results = Vec::with_capacity(body.checks.len());
    for check in body.checks {
        check.validate()?;
        results.push(engine.check(&ctx, &check.into_request()).await?);
    }
    Ok(Json(BatchCheckResponse { results }))
}

// ──────────────────────────────────────────────────
// Role endpoints
// ──────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct RoleBody {
    name: String,
    slug: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    is_system: bool,
    #[serde(default)]
    is_default: bool,
    #[serde(default)]
    parent_id: Option<Id>,
    #[serde(default)]
    max_members: Option<u32>,
    #[serde(default)]
    metadata: HashMap<String, Value>,
}

#[derive(Debug, Default, Deserialize)]
struct RoleListQuery {
    #[serde(default)]
    search: String,
    #[serde(default)]
    limit: Option<usize>,
    #[serde(default)]
    offset: Option<usize>,
}

/// Walks the parent chain and rejects a parent assignment that would
/// reach `role_id` again.
async fn ensure_acyclic_parent<S: Store, C: Cache>(
    engine: &Engine<S, C>,
    role_id: Id,
    parent_id: Option<Id>,
) -> Result<(), ApiError> {
    let mut current = parent_id;
    let mut depth = 0;
    while let Some(ancestor) = current {
        if ancestor == role_id {
            return Err(Error::CyclicRoleInheritance(role_id).into());
        }
        if depth > 20 {
            break;
        }
        current = match engine.store().get_role(ancestor).await {
            Ok(role) => role.parent_id,
            Err(_) => None,
        };
        depth += 1;
    }
    Ok(())
}

async fn create_role<S: Store, C: Cache>(
    State(engine): State<Arc<Engine<S, C>>>,
    scope: TenantScope,
    Json(body): Json<RoleBody>,
) -> Result<(StatusCode, Json<Role>), ApiError> {
    if body.name.is_empty() || body.slug.is_empty() {
        return Err(ApiError::bad_request("name and slug are required"));
    }
    let now = Utc::now();
    let role = Role {
        id: Id::new_role(),
        tenant_id: scope.tenant_id,
        app_id: scope.app_id,
        name: body.name,
        description: body.description,
        slug: body.slug,
        is_system: body.is_system,
        is_default: body.is_default,
        parent_id: body.parent_id,
        max_members: body.max_members,
        metadata: body.metadata,
        created_at: now,
        updated_at: now,
    };
    engine.store().create_role(&role).await?;
    engine.plugins().emit(Event::RoleCreated(&role)).await;
    Ok((StatusCode::CREATED, Json(role)))
}

async fn get_role<S: Store, C: Cache>(
    State(engine): State<Arc<Engine<S, C>>>,
    Path(id): Path<String>,
) -> Result<Json<Role>, ApiError> {
    let role_id = Id::parse_role(&id)?;
    Ok(Json(engine.store().get_role(role_id).await?))
}

async fn update_role<S: Store, C: Cache>(
    State(engine): State<Arc<Engine<S, C>>>,
    Path(id): Path<String>,
    Json(body): Json<RoleBody>,
) -> Result<Json<Role>, ApiError> {
    let role_id = Id::parse_role(&id)?;
    let mut role = engine.store().get_role(role_id).await?;
    ensure_acyclic_parent(&engine, role_id, body.parent_id).await?;

    role.name = body.name;
    role.slug = body.slug;
    role.description = body.description;
    role.is_default = body.is_default;
    role.parent_id = body.parent_id;
    role.max_members = body.max_members;
    role.metadata = body.metadata;
    role.updated_at = Utc::now();

    engine.store().update_role(&role).await?;
    engine.plugins().emit(Event::RoleUpdated(&role)).await;
    Ok(Json(role))
}

async fn delete_role<S: Store, C: Cache>(
    State(engine): State<Arc<Engine<S, C>>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let role_id = Id::parse_role(&id)?;
    // 404 for unknown ids; the store rejects system roles itself.
    engine.store().get_role(role_id).await?;
    engine.store().delete_role(role_id).await?;
    engine.store().delete_assignments_by_role(role_id).await?;
    engine.plugins().emit(Event::RoleDeleted(role_id)).await;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_roles<S: Store, C: Cache>(
    State(engine): State<Arc<Engine<S, C>>>,
    scope: TenantScope,
    Query(query): Query<RoleListQuery>,
) -> Result<Json<Vec<Role>>, ApiError> {
    let filter = RoleFilter {
        tenant_id: scope.tenant_id,
        search: query.search,
        limit: clamp_limit(query.limit),
        offset: query.offset.unwrap_or_default(),
        ..RoleFilter::default()
    };
    Ok(Json(engine.store().list_roles(&filter).await?))
}

async fn list_role_permissions<S: Store, C: Cache>(
    State(engine): State<Arc<Engine<S, C>>>,
    Path(id): Path<String>,
) -> Result<Json<Vec<Permission>>, ApiError> {
    let role_id = Id::parse_role(&id)?;
    Ok(Json(engine.store().list_permissions_by_role(role_id).await?))
}

#[derive(Debug, Deserialize)]
struct SetRolePermissionsBody {
    permission_ids: Vec<String>,
}

async fn set_role_permissions<S: Store, C: Cache>(
    State(engine): State<Arc<Engine<S, C>>>,
    Path(id): Path<String>,
    Json(body): Json<SetRolePermissionsBody>,
) -> Result<StatusCode, ApiError> {
    let role_id = Id::parse_role(&id)?;
    let permission_ids = body
        .permission_ids
        .iter()
        .map(|raw| Id::parse_permission(raw))
        .collect::<Result<Vec<Id>, Error>>()?;
    engine
        .store()
        .set_role_permissions(role_id, &permission_ids)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn attach_permission<S: Store, C: Cache>(
    State(engine): State<Arc<Engine<S, C>>>,
    Path((id, perm_id)): Path<(String, String)>,
) -> Result<StatusCode, ApiError> {
    let role_id = Id::parse_role(&id)?;
    let permission_id = Id::parse_permission(&perm_id)?;
    engine.store().attach_permission(role_id, permission_id).await?;
    engine
        .plugins()
        .emit(Event::PermissionAttached {
            role_id,
            permission_id,
        })
        .await;
    Ok(StatusCode::NO_CONTENT)
}

async fn detach_permission<S: Store, C: Cache>(
    State(engine): State<Arc<Engine<S, C>>>,
    Path((id, perm_id)): Path<(String, String)>,
) -> Result<StatusCode, ApiError> {
    let role_id = Id::parse_role(&id)?;
    let permission_id = Id::parse_permission(&perm_id)?;
    engine.store().detach_permission(role_id, permission_id).await?;
    engine
        .plugins()
        .emit(Event::PermissionDetached {
            role_id,
            permission_id,
        })
        .await;
    Ok(StatusCode::NO_CONTENT)
}

// ──────────────────────────────────────────────────
// Permission endpoints
// ──────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct PermissionBody {
    #[serde(default)]
    name: String,
    resource: String,
    action: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    is_system: bool,
    #[serde(default)]
    metadata: HashMap<String, Value>,
}

#[derive(Debug, Default, Deserialize)]
struct PermissionListQuery {
    #[serde(default)]
    resource: String,
    #[serde(default)]
    action: String,
    #[serde(default)]
    search: String,
    #[serde(default)]
    limit: Option<usize>,
    #[serde(default)]
    offset: Option<usize>,
}

async fn create_permission<S: Store, C: Cache>(
    State(engine): State<Arc<Engine<S, C>>>,
    scope: TenantScope,
    Json(body): Json<PermissionBody>,
) -> Result<(StatusCode, Json<Permission>), ApiError> {
    if body.resource.is_empty() || body.action.is_empty() {
        return Err(ApiError::bad_request("resource and action are required"));
    }
    let now = Utc::now();
    let name = if body.name.is_empty() {
        format!("{}:{}", body.resource, body.action)
    } else {
        body.name
    };
    let permission = Permission {
        id: Id::new_permission(),
        tenant_id: scope.tenant_id,
        app_id: scope.app_id,
        name,
        description: body.description,
        resource: body.resource,
        action: body.action,
        is_system: body.is_system,
        metadata: body.metadata,
        created_at: now,
        updated_at: now,
    };
    engine.store().create_permission(&permission).await?;
    engine
        .plugins()
        .emit(Event::PermissionCreated(&permission))
        .await;
    Ok((StatusCode::CREATED, Json(permission)))
}

async fn get_permission<S: Store, C: Cache>(
    State(engine): State<Arc<Engine<S, C>>>,
    Path(id): Path<String>,
) -> Result<Json<Permission>, ApiError> {
    let permission_id = Id::parse_permission(&id)?;
    Ok(Json(engine.store().get_permission(permission_id).await?))
}

async fn update_permission<S: Store, C: Cache>(
    State(engine): State<Arc<Engine<S, C>>>,
    Path(id): Path<String>,
    Json(body): Json<PermissionBody>,
) -> Result<Json<Permission>, ApiError> {
    let permission_id = Id::parse_permission(&id)?;
    let mut permission = engine.store().get_permission(permission_id).await?;
    if !body.name.is_empty() {
        permission.name = body.name;
    }
    permission.resource = body.resource;
    permission.action = body.action;
    permission.description = body.description;
    permission.metadata = body.metadata;
    permission.updated_at = Utc::now();

    engine.store().update_permission(&permission).await?;
    Ok(Json(permission))
}

async fn delete_permission<S: Store, C: Cache>(
    State(engine): State<Arc<Engine<S, C>>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let permission_id = Id::parse_permission(&id)?;
    // 404 for unknown ids; the store rejects system permissions itself.
    engine.store().get_permission(permission_id).await?;
    engine.store().delete_permission(permission_id).await?;
    engine
        .plugins()
        .emit(Event::PermissionDeleted(permission_id))
        .await;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_permissions<S: Store, C: Cache>(
    State(engine): State<Arc<Engine<S, C>>>,
    scope: TenantScope,
    Query(query): Query<PermissionListQuery>,
) -> Result<Json<Vec<Permission>>, ApiError> {
    let filter = PermissionFilter {
        tenant_id: scope.tenant_id,
        resource: query.resource,
        action: query.action,
        search: query.search,
        limit: clamp_limit(query.limit),
        offset: query.offset.unwrap_or_default(),
        ..PermissionFilter::default()
    };
    Ok(Json(engine.store().list_permissions(&filter).await?))
}

// ──────────────────────────────────────────────────
// Assignment endpoints
// ──────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct AssignmentBody {
    role_id: String,
    subject_kind: String,
    subject_id: String,
    #[serde(default)]
    resource_type: String,
    #[serde(default)]
    resource_id: String,
    #[serde(default)]
    expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    granted_by: String,
    #[serde(default)]
    metadata: HashMap<String, Value>,
}

#[derive(Debug, Default, Deserialize)]
struct AssignmentListQuery {
    #[serde(default)]
    subject_kind: String,
    #[serde(default)]
    subject_id: String,
    #[serde(default)]
    role_id: Option<String>,
    #[serde(default)]
    limit: Option<usize>,
    #[serde(default)]
    offset: Option<usize>,
}

async fn create_assignment<S: Store, C: Cache>(
    State(engine): State<Arc<Engine<S, C>>>,
    scope: TenantScope,
    Json(body): Json<AssignmentBody>,
) -> Result<(StatusCode, Json<Assignment>), ApiError> {
    if body.subject_kind.is_empty() || body.subject_id.is_empty() {
        return Err(ApiError::bad_request(
            "subject_kind and subject_id are required",
        ));
    }
    let assignment = Assignment {
        id: Id::new_assignment(),
        tenant_id: scope.tenant_id,
        app_id: scope.app_id,
        role_id: Id::parse_role(&body.role_id)?,
        subject_kind: body.subject_kind,
        subject_id: body.subject_id,
        resource_type: body.resource_type,
        resource_id: body.resource_id,
        expires_at: body.expires_at,
        granted_by: body.granted_by,
        metadata: body.metadata,
        created_at: Utc::now(),
    };
    engine.store().create_assignment(&assignment).await?;
    engine
        .plugins()
        .emit(Event::RoleAssigned(&assignment))
        .await;
    Ok((StatusCode::CREATED, Json(assignment)))
}

async fn get_assignment<S: Store, C: Cache>(
    State(engine): State<Arc<Engine<S, C>>>,
    Path(id): Path<String>,
) -> Result<Json<Assignment>, ApiError> {
    let assignment_id = Id::parse_assignment(&id)?;
    Ok(Json(engine.store().get_assignment(assignment_id).await?))
}

async fn delete_assignment<S: Store, C: Cache>(
    State(engine): State<Arc<Engine<S, C>>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let assignment_id = Id::parse_assignment(&id)?;
    let assignment = engine.store().get_assignment(assignment_id).await?;
    engine.store().delete_assignment(assignment_id).await?;
    engine
        .plugins()
        .emit(Event::RoleUnassigned(&assignment))
        .await;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_assignments<S: Store, C: Cache>(
    State(engine): State<Arc<Engine<S, C>>>,
    scope: TenantScope,
    Query(query): Query<AssignmentListQuery>,
) -> Result<Json<Vec<Assignment>>, ApiError> {
    let role_id = query
        .role_id
        .as_deref()
        .map(Id::parse_role)
        .transpose()?;
    let filter = AssignmentFilter {
        tenant_id: scope.tenant_id,
        role_id,
        subject_kind: query.subject_kind,
        subject_id: query.subject_id,
        limit: clamp_limit(query.limit),
        offset: query.offset.unwrap_or_default(),
        ..AssignmentFilter::default()
    };
    Ok(Json(engine.store().list_assignments(&filter).await?))
}

// ──────────────────────────────────────────────────
// Relation endpoints
// ──────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct RelationBody {
    object_type: String,
    object_id: String,
    relation: String,
    subject_type: String,
    subject_id: String,
    #[serde(default)]
    subject_relation: String,
    #[serde(default)]
    metadata: HashMap<String, Value>,
}

#[derive(Debug, Default, Deserialize)]
struct RelationListQuery {
    #[serde(default)]
    object_type: String,
    #[serde(default)]
    object_id: String,
    #[serde(default)]
    relation: String,
    #[serde(default)]
    subject_type: String,
    #[serde(default)]
    subject_id: String,
    #[serde(default)]
    limit: Option<usize>,
    #[serde(default)]
    offset: Option<usize>,
}

async fn create_relation<S: Store, C: Cache>(
    State(engine): State<Arc<Engine<S, C>>>,
    scope: TenantScope,
    Json(body): Json<RelationBody>,
) -> Result<(StatusCode, Json<RelationTuple>), ApiError> {
    if body.object_type.is_empty()
        || body.object_id.is_empty()
        || body.relation.is_empty()
        || body.subject_type.is_empty()
        || body.subject_id.is_empty()
    {
        return Err(ApiError::bad_request(
            "object, relation, and subject are required",
        ));
    }
    let tuple = RelationTuple {
        id: Id::new_relation(),
        tenant_id: scope.tenant_id,
        app_id: scope.app_id,
        object_type: body.object_type,
        object_id: body.object_id,
        relation: body.relation,
        subject_type: body.subject_type,
        subject_id: body.subject_id,
        subject_relation: body.subject_relation,
        metadata: body.metadata,
        created_at: Utc::now(),
    };
    engine.store().create_relation(&tuple).await?;
    engine.plugins().emit(Event::RelationWritten(&tuple)).await;
    Ok((StatusCode::CREATED, Json(tuple)))
}

async fn delete_relation<S: Store, C: Cache>(
    State(engine): State<Arc<Engine<S, C>>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let relation_id = Id::parse_relation(&id)?;
    engine.store().delete_relation(relation_id).await?;
    engine
        .plugins()
        .emit(Event::RelationDeleted(relation_id))
        .await;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_relations<S: Store, C: Cache>(
    State(engine): State<Arc<Engine<S, C>>>,
    scope: TenantScope,
    Query(query): Query<RelationListQuery>,
) -> Result<Json<Vec<RelationTuple>>, ApiError> {
    let filter = RelationFilter {
        tenant_id: scope.tenant_id,
        object_type: query.object_type,
        object_id: query.object_id,
        relation: query.relation,
        subject_type: query.subject_type,
        subject_id: query.subject_id,
        limit: clamp_limit(query.limit),
        offset: query.offset.unwrap_or_default(),
        ..RelationFilter::default()
    };
    Ok(Json(engine.store().list_relations(&filter).await?))
}

// ──────────────────────────────────────────────────
// Policy endpoints
// ──────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct PolicyBody {
    name: String,
    #[serde(default)]
    description: String,
    effect: Effect,
    #[serde(default)]
    priority: i32,
    #[serde(default = "default_true")]
    is_active: bool,
    #[serde(default)]
    subjects: Vec<SubjectMatch>,
    #[serde(default)]
    actions: Vec<String>,
    #[serde(default)]
    resources: Vec<String>,
    #[serde(default)]
    conditions: Vec<Condition>,
    #[serde(default)]
    metadata: HashMap<String, Value>,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Default, Deserialize)]
struct PolicyListQuery {
    #[serde(default)]
    is_active: Option<bool>,
    #[serde(default)]
    search: String,
    #[serde(default)]
    limit: Option<usize>,
    #[serde(default)]
    offset: Option<usize>,
}

fn assign_condition_ids(mut conditions: Vec<Condition>) -> Vec<Condition> {
    for condition in &mut conditions {
        if condition.id.is_nil() {
            condition.id = Id::new_condition();
        }
    }
    conditions
}

async fn create_policy<S: Store, C: Cache>(
    State(engine): State<Arc<Engine<S, C>>>,
    scope: TenantScope,
    Json(body): Json<PolicyBody>,
) -> Result<(StatusCode, Json<Policy>), ApiError> {
    if body.name.is_empty() {
        return Err(ApiError::bad_request("name is required"));
    }
    let now = Utc::now();
    let policy = Policy {
        id: Id::new_policy(),
        tenant_id: scope.tenant_id,
        app_id: scope.app_id,
        name: body.name,
        description: body.description,
        effect: body.effect,
        priority: body.priority,
        is_active: body.is_active,
        version: 1,
        subjects: body.subjects,
        actions: body.actions,
        resources: body.resources,
        conditions: assign_condition_ids(body.conditions),
        metadata: body.metadata,
        created_at: now,
        updated_at: now,
    };
    engine.store().create_policy(&policy).await?;
    engine.plugins().emit(Event::PolicyCreated(&policy)).await;
    Ok((StatusCode::CREATED, Json(policy)))
}

async fn get_policy<S: Store, C: Cache>(
    State(engine): State<Arc<Engine<S, C>>>,
    Path(id): Path<String>,
) -> Result<Json<Policy>, ApiError> {
    let policy_id = Id::parse_policy(&id)?;
    Ok(Json(engine.store().get_policy(policy_id).await?))
}

async fn update_policy<S: Store, C: Cache>(
    State(engine): State<Arc<Engine<S, C>>>,
    Path(id): Path<String>,
    Json(body): Json<PolicyBody>,
) -> Result<Json<Policy>, ApiError> {
    let policy_id = Id::parse_policy(&id)?;
    let mut policy = engine.store().get_policy(policy_id).await?;

    policy.name = body.name;
    policy.description = body.description;
    policy.effect = body.effect;
    policy.priority = body.priority;
    policy.is_active = body.is_active;
    policy.subjects = body.subjects;
    policy.actions = body.actions;
    policy.resources = body.resources;
    policy.conditions = assign_condition_ids(body.conditions);
    policy.metadata = body.metadata;
    policy.version += 1;
    policy.updated_at = Utc::now();

    engine.store().update_policy(&policy).await?;
    engine.plugins().emit(Event::PolicyUpdated(&policy)).await;
    Ok(Json(policy))
}

async fn delete_policy<S: Store, C: Cache>(
    State(engine): State<Arc<Engine<S, C>>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let policy_id = Id::parse_policy(&id)?;
    engine.store().delete_policy(policy_id).await?;
    engine.plugins().emit(Event::PolicyDeleted(policy_id)).await;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_policies<S: Store, C: Cache>(
    State(engine): State<Arc<Engine<S, C>>>,
    scope: TenantScope,
    Query(query): Query<PolicyListQuery>,
) -> Result<Json<Vec<Policy>>, ApiError> {
    let filter = PolicyFilter {
        tenant_id: scope.tenant_id,
        is_active: query.is_active,
        search: query.search,
        limit: clamp_limit(query.limit),
        offset: query.offset.unwrap_or_default(),
        ..PolicyFilter::default()
    };
    Ok(Json(engine.store().list_policies(&filter).await?))
}

// ──────────────────────────────────────────────────
// Resource type endpoints
// ──────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ResourceTypeBody {
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    relations: Vec<RelationDef>,
    #[serde(default)]
    permissions: Vec<PermissionDef>,
    #[serde(default)]
    metadata: HashMap<String, Value>,
}

#[derive(Debug, Default, Deserialize)]
struct ResourceTypeListQuery {
    #[serde(default)]
    search: String,
    #[serde(default)]
    limit: Option<usize>,
    #[serde(default)]
    offset: Option<usize>,
}

async fn create_resource_type<S: Store, C: Cache>(
    State(engine): State<Arc<Engine<S, C>>>,
    scope: TenantScope,
    Json(body): Json<ResourceTypeBody>,
) -> Result<(StatusCode, Json<ResourceType>), ApiError> {
    if body.name.is_empty() {
        return Err(ApiError::bad_request("name is required"));
    }
    let now = Utc::now();
    let resource_type = ResourceType {
        id: Id::new_resource_type(),
        tenant_id: scope.tenant_id,
        app_id: scope.app_id,
        name: body.name,
        description: body.description,
        relations: body.relations,
        permissions: body.permissions,
        metadata: body.metadata,
        created_at: now,
        updated_at: now,
    };
    engine.store().create_resource_type(&resource_type).await?;
    Ok((StatusCode::CREATED, Json(resource_type)))
}

async fn get_resource_type<S: Store, C: Cache>(
    State(engine): State<Arc<Engine<S, C>>>,
    Path(id): Path<String>,
) -> Result<Json<ResourceType>, ApiError> {
    let resource_type_id = Id::parse_resource_type(&id)?;
    Ok(Json(
        engine.store().get_resource_type(resource_type_id).await?,
    ))
}

async fn update_resource_type<S: Store, C: Cache>(
    State(engine): State<Arc<Engine<S, C>>>,
    Path(id): Path<String>,
    Json(body): Json<ResourceTypeBody>,
) -> Result<Json<ResourceType>, ApiError> {
    let resource_type_id = Id::parse_resource_type(&id)?;
    let mut resource_type = engine.store().get_resource_type(resource_type_id).await?;

    resource_type.name = body.name;
    resource_type.description = body.description;
    resource_type.relations = body.relations;
    resource_type.permissions = body.permissions;
    resource_type.metadata = body.metadata;
    resource_type.updated_at = Utc::now();

    engine.store().update_resource_type(&resource_type).await?;
    Ok(Json(resource_type))
}

async fn delete_resource_type<S: Store, C: Cache>(
    State(engine): State<Arc<Engine<S, C>>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let resource_type_id = Id::parse_resource_type(&id)?;
    engine.store().delete_resource_type(resource_type_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_resource_types<S: Store, C: Cache>(
    State(engine): State<Arc<Engine<S, C>>>,
    scope: TenantScope,
    Query(query): Query<ResourceTypeListQuery>,
) -> Result<Json<Vec<ResourceType>>, ApiError> {
    let filter = ResourceTypeFilter {
        tenant_id: scope.tenant_id,
        search: query.search,
        limit: clamp_limit(query.limit),
        offset: query.offset.unwrap_or_default(),
    };
    Ok(Json(engine.store().list_resource_types(&filter).await?))
}

// ──────────────────────────────────────────────────
// Check log endpoints
// ──────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
struct CheckLogListQuery {
    #[serde(default)]
    subject_kind: String,
    #[serde(default)]
    subject_id: String,
    #[serde(default)]
    action: String,
    #[serde(default)]
    resource_type: String,
    #[serde(default)]
    limit: Option<usize>,
    #[serde(default)]
    offset: Option<usize>,
}

async fn list_check_logs<S: Store, C: Cache>(
    State(engine): State<Arc<Engine<S, C>>>,
    scope: TenantScope,
    Query(query): Query<CheckLogListQuery>,
) -> Result<Json<Vec<CheckLogEntry>>, ApiError> {
    let filter = CheckLogFilter {
        tenant_id: scope.tenant_id,
        subject_kind: query.subject_kind,
        subject_id: query.subject_id,
        action: query.action,
        resource_type: query.resource_type,
        limit: clamp_limit(query.limit),
        offset: query.offset.unwrap_or_default(),
        ..CheckLogFilter::default()
    };
    Ok(Json(engine.store().list_check_logs(&filter).await?))
}

async fn get_check_log<S: Store, C: Cache>(
    State(engine): State<Arc<Engine<S, C>>>,
    Path(id): Path<String>,
) -> Result<Json<CheckLogEntry>, ApiError> {
    let log_id = Id::parse_check_log(&id)?;
    Ok(Json(engine.store().get_check_log(log_id).await?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamp_limit_should_apply_default_and_ceiling() {
        assert_eq!(clamp_limit(None), 50);
        assert_eq!(clamp_limit(Some(0)), 50);
        assert_eq!(clamp_limit(Some(25)), 25);
        assert_eq!(clamp_limit(Some(5000)), 1000);
    }

    #[test]
    fn scope_should_come_from_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(HEADER_APP_ID, "app1".parse().unwrap());
        headers.insert(HEADER_TENANT_ID, "t1".parse().unwrap());

        let scope = scope_from_headers(&headers);
        assert_eq!(scope, TenantScope::new("app1", "t1"));

        let empty = scope_from_headers(&HeaderMap::new());
        assert_eq!(empty, TenantScope::default());
    }

    #[test]
    fn store_errors_should_map_to_http_statuses() {
        let not_found = StoreError::NotFound {
            entity: "role",
            key: "x".to_string(),
        };
        assert_eq!(ApiError::from(not_found).status, StatusCode::NOT_FOUND);

        let duplicate = StoreError::Duplicate {
            entity: "policy",
            key: "x".to_string(),
        };
        assert_eq!(ApiError::from(duplicate).status, StatusCode::BAD_REQUEST);

        let transient = StoreError::Transient("connection reset".into());
        assert_eq!(
            ApiError::from(transient).status,
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn domain_errors_should_map_to_http_statuses() {
        assert_eq!(
            ApiError::from(Error::AccessDenied {
                decision: crate::check::Decision::DenyDefault,
                reason: String::new(),
            })
            .status,
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ApiError::from(Error::InvalidId("junk".to_string())).status,
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(Error::model(
                "rbac",
                Error::Store(StoreError::Transient("down".into())),
            ))
            .status,
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
