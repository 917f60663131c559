//! In-memory composite store for tests and demos.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::assignment::{Assignment, AssignmentFilter, AssignmentStore};
use crate::check_log::{CheckLogEntry, CheckLogFilter, CheckLogStore};
use crate::error::{StoreError, StoreResult};
use crate::id::Id;
use crate::permission::{Permission, PermissionFilter, PermissionStore};
use crate::policy::{Policy, PolicyFilter, PolicyStore};
use crate::relation::{RelationFilter, RelationStore, RelationTuple};
use crate::resource_type::{ResourceType, ResourceTypeFilter, ResourceTypeStore};
use crate::role::{Role, RoleFilter, RoleStore};
use crate::store::AdminStore;

/// Thread-safe in-memory store implementing the full composite contract.
///
/// Values are cloned on write and on read, so callers can never corrupt
/// store state through returned records. Lists are ordered by identifier,
/// which is creation order for generated identifiers.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    roles: RwLock<HashMap<Id, Role>>,
    role_permissions: RwLock<HashMap<Id, HashSet<Id>>>,
    permissions: RwLock<HashMap<Id, Permission>>,
    assignments: RwLock<HashMap<Id, Assignment>>,
    relations: RwLock<HashMap<Id, RelationTuple>>,
    policies: RwLock<HashMap<Id, Policy>>,
    resource_types: RwLock<HashMap<Id, ResourceType>>,
    check_logs: RwLock<HashMap<Id, CheckLogEntry>>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

fn not_found(entity: &'static str, key: impl ToString) -> StoreError {
    StoreError::NotFound {
        entity,
        key: key.to_string(),
    }
}

fn duplicate(entity: &'static str, key: impl ToString) -> StoreError {
    StoreError::Duplicate {
        entity,
        key: key.to_string(),
    }
}

fn matches_search(name: &str, search: &str) -> bool {
    search.is_empty() || name.to_lowercase().contains(&search.to_lowercase())
}

fn paginate<T>(mut items: Vec<T>, limit: usize, offset: usize) -> Vec<T> {
    if offset >= items.len() {
        return Vec::new();
    }
    if offset > 0 {
        items.drain(..offset);
    }
    if limit > 0 && items.len() > limit {
        items.truncate(limit);
    }
    items
}

#[async_trait]
impl RoleStore for MemoryStore {
    async fn create_role(&self, role: &Role) -> StoreResult<()> {
        let mut roles = self.inner.roles.write().expect("poisoned lock");
        if roles
            .values()
            .any(|existing| existing.tenant_id == role.tenant_id && existing.slug == role.slug)
        {
            return Err(duplicate(
                "role",
                format!("{}/{}", role.tenant_id, role.slug),
            ));
        }
        roles.insert(role.id, role.clone());
        Ok(())
    }

    async fn get_role(&self, role_id: Id) -> StoreResult<Role> {
        let roles = self.inner.roles.read().expect("poisoned lock");
        roles
            .get(&role_id)
            .cloned()
            .ok_or_else(|| not_found("role", role_id))
    }

    async fn get_role_by_slug(&self, tenant_id: &str, slug: &str) -> StoreResult<Role> {
        let roles = self.inner.roles.read().expect("poisoned lock");
        roles
            .values()
            .find(|role| role.tenant_id == tenant_id && role.slug == slug)
            .cloned()
            .ok_or_else(|| not_found("role", slug))
    }

    async fn update_role(&self, role: &Role) -> StoreResult<()> {
        let mut roles = self.inner.roles.write().expect("poisoned lock");
        let existing = roles.get(&role.id).ok_or_else(|| not_found("role", role.id))?;
        if existing.is_system {
            return Err(StoreError::Precondition(format!(
                "system role {} cannot be modified",
                role.id
            )));
        }
        roles.insert(role.id, role.clone());
        Ok(())
    }

    async fn delete_role(&self, role_id: Id) -> StoreResult<()> {
        let mut roles = self.inner.roles.write().expect("poisoned lock");
        if let Some(existing) = roles.get(&role_id)
            && existing.is_system
        {
            return Err(StoreError::Precondition(format!(
                "system role {role_id} cannot be deleted"
            )));
        }
        roles.remove(&role_id);
        drop(roles);
        self.inner
            .role_permissions
            .write()
            .expect("poisoned lock")
            .remove(&role_id);
        Ok(())
    }

    async fn list_roles(&self, filter: &RoleFilter) -> StoreResult<Vec<Role>> {
        let roles = self.inner.roles.read().expect("poisoned lock");
        let mut result: Vec<Role> = roles
            .values()
            .filter(|role| {
                (filter.tenant_id.is_empty() || role.tenant_id == filter.tenant_id)
                    && filter.is_system.is_none_or(|v| role.is_system == v)
                    && filter.is_default.is_none_or(|v| role.is_default == v)
                    && filter.parent_id.is_none_or(|v| role.parent_id == Some(v))
                    && matches_search(&role.name, &filter.search)
            })
            .cloned()
            .collect();
        result.sort_by_key(|role| role.id);
        Ok(paginate(result, filter.limit, filter.offset))
    }

    async fn count_roles(&self, filter: &RoleFilter) -> StoreResult<u64> {
        let unpaged = RoleFilter {
            limit: 0,
            offset: 0,
            ..filter.clone()
        };
        Ok(self.list_roles(&unpaged).await?.len() as u64)
    }

    async fn list_role_permissions(&self, role_id: Id) -> StoreResult<Vec<Id>> {
        let attached = self.inner.role_permissions.read().expect("poisoned lock");
        let mut result: Vec<Id> = attached
            .get(&role_id)
            .map(|ids| ids.iter().copied().collect())
            .unwrap_or_default();
        result.sort();
        Ok(result)
    }

    async fn attach_permission(&self, role_id: Id, permission_id: Id) -> StoreResult<()> {
        self.inner
            .role_permissions
            .write()
            .expect("poisoned lock")
            .entry(role_id)
            .or_default()
            .insert(permission_id);
        Ok(())
    }

    async fn detach_permission(&self, role_id: Id, permission_id: Id) -> StoreResult<()> {
        let mut attached = self.inner.role_permissions.write().expect("poisoned lock");
        if let Some(ids) = attached.get_mut(&role_id) {
            ids.remove(&permission_id);
        }
        Ok(())
    }

    async fn set_role_permissions(&self, role_id: Id, permission_ids: &[Id]) -> StoreResult<()> {
        self.inner
            .role_permissions
            .write()
            .expect("poisoned lock")
            .insert(role_id, permission_ids.iter().copied().collect());
        Ok(())
    }

    async fn list_child_roles(&self, parent_id: Id) -> StoreResult<Vec<Role>> {
        let roles = self.inner.roles.read().expect("poisoned lock");
        let mut result: Vec<Role> = roles
            .values()
            .filter(|role| role.parent_id == Some(parent_id))
            .cloned()
            .collect();
        result.sort_by_key(|role| role.id);
        Ok(result)
    }

    async fn delete_roles_by_tenant(&self, tenant_id: &str) -> StoreResult<()> {
        let mut roles = self.inner.roles.write().expect("poisoned lock");
        let mut attached = self.inner.role_permissions.write().expect("poisoned lock");
        roles.retain(|role_id, role| {
            let keep = role.tenant_id != tenant_id;
            if !keep {
                attached.remove(role_id);
            }
            keep
        });
        Ok(())
    }
}

#[async_trait]
impl PermissionStore for MemoryStore {
    async fn create_permission(&self, permission: &Permission) -> StoreResult<()> {
        let mut permissions = self.inner.permissions.write().expect("poisoned lock");
        if permissions.values().any(|existing| {
            existing.tenant_id == permission.tenant_id && existing.name == permission.name
        }) {
            return Err(duplicate(
                "permission",
                format!("{}/{}", permission.tenant_id, permission.name),
            ));
        }
        permissions.insert(permission.id, permission.clone());
        Ok(())
    }

    async fn get_permission(&self, permission_id: Id) -> StoreResult<Permission> {
        let permissions = self.inner.permissions.read().expect("poisoned lock");
        permissions
            .get(&permission_id)
            .cloned()
            .ok_or_else(|| not_found("permission", permission_id))
    }

    async fn get_permission_by_name(&self, tenant_id: &str, name: &str) -> StoreResult<Permission> {
        let permissions = self.inner.permissions.read().expect("poisoned lock");
        permissions
            .values()
            .find(|permission| permission.tenant_id == tenant_id && permission.name == name)
            .cloned()
            .ok_or_else(|| not_found("permission", name))
    }

    async fn update_permission(&self, permission: &Permission) -> StoreResult<()> {
        let mut permissions = self.inner.permissions.write().expect("poisoned lock");
        let existing = permissions
            .get(&permission.id)
            .ok_or_else(|| not_found("permission", permission.id))?;
        if existing.is_system {
            return Err(StoreError::Precondition(format!(
                "system permission {} cannot be modified",
                permission.id
            )));
        }
        permissions.insert(permission.id, permission.clone());
        Ok(())
    }

    async fn delete_permission(&self, permission_id: Id) -> StoreResult<()> {
        let mut permissions = self.inner.permissions.write().expect("poisoned lock");
        if let Some(existing) = permissions.get(&permission_id)
            && existing.is_system
        {
            return Err(StoreError::Precondition(format!(
                "system permission {permission_id} cannot be deleted"
            )));
        }
        permissions.remove(&permission_id);
        drop(permissions);
        let mut attached = self.inner.role_permissions.write().expect("poisoned lock");
        for ids in attached.values_mut() {
            ids.remove(&permission_id);
        }
        Ok(())
    }

    async fn list_permissions(&self, filter: &PermissionFilter) -> StoreResult<Vec<Permission>> {
        let permissions = self.inner.permissions.read().expect("poisoned lock");
        let mut result: Vec<Permission> = permissions
            .values()
            .filter(|permission| {
                (filter.tenant_id.is_empty() || permission.tenant_id == filter.tenant_id)
                    && (filter.resource.is_empty() || permission.resource == filter.resource)
                    && (filter.action.is_empty() || permission.action == filter.action)
                    && filter.is_system.is_none_or(|v| permission.is_system == v)
                    && matches_search(&permission.name, &filter.search)
            })
            .cloned()
            .collect();
        result.sort_by_key(|permission| permission.id);
        Ok(paginate(result, filter.limit, filter.offset))
    }

    async fn count_permissions(&self, filter: &PermissionFilter) -> StoreResult<u64> {
        let unpaged = PermissionFilter {
            limit: 0,
            offset: 0,
            ..filter.clone()
        };
        Ok(self.list_permissions(&unpaged).await?.len() as u64)
    }

    async fn list_permissions_by_role(&self, role_id: Id) -> StoreResult<Vec<Permission>> {
        let attached = self.inner.role_permissions.read().expect("poisoned lock");
        let permissions = self.inner.permissions.read().expect("poisoned lock");
        let mut result: Vec<Permission> = attached
            .get(&role_id)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| permissions.get(id).cloned())
                    .collect()
            })
            .unwrap_or_default();
        result.sort_by_key(|permission| permission.id);
        Ok(result)
    }

    async fn list_permissions_by_subject(
        &self,
        tenant_id: &str,
        subject_kind: &str,
        subject_id: &str,
    ) -> StoreResult<Vec<Permission>> {
        let now = Utc::now();
        let assignments = self.inner.assignments.read().expect("poisoned lock");
        let role_ids: HashSet<Id> = assignments
            .values()
            .filter(|a| {
                a.tenant_id == tenant_id
                    && a.subject_kind == subject_kind
                    && a.subject_id == subject_id
                    && !a.is_expired(now)
            })
            .map(|a| a.role_id)
            .collect();
        drop(assignments);

        let attached = self.inner.role_permissions.read().expect("poisoned lock");
        let permissions = self.inner.permissions.read().expect("poisoned lock");
        let mut seen = HashSet::new();
        let mut result = Vec::new();
        for role_id in role_ids {
            let Some(ids) = attached.get(&role_id) else {
                continue;
            };
            for id in ids {
                if seen.insert(*id)
                    && let Some(permission) = permissions.get(id)
                {
                    result.push(permission.clone());
                }
            }
        }
        result.sort_by_key(|permission| permission.id);
        Ok(result)
    }

    async fn delete_permissions_by_tenant(&self, tenant_id: &str) -> StoreResult<()> {
        let mut permissions = self.inner.permissions.write().expect("poisoned lock");
        let mut attached = self.inner.role_permissions.write().expect("poisoned lock");
        permissions.retain(|permission_id, permission| {
            let keep = permission.tenant_id != tenant_id;
            if !keep {
                for ids in attached.values_mut() {
                    ids.remove(permission_id);
                }
            }
            keep
        });
        Ok(())
    }
}

#[async_trait]
impl AssignmentStore for MemoryStore {
    async fn create_assignment(&self, assignment: &Assignment) -> StoreResult<()> {
        let mut assignments = self.inner.assignments.write().expect("poisoned lock");
        if assignments.values().any(|existing| {
            existing.tenant_id == assignment.tenant_id
                && existing.role_id == assignment.role_id
                && existing.subject_kind == assignment.subject_kind
                && existing.subject_id == assignment.subject_id
                && existing.resource_type == assignment.resource_type
                && existing.resource_id == assignment.resource_id
        }) {
            return Err(duplicate(
                "assignment",
                format!(
                    "{}/{}/{}:{}",
                    assignment.tenant_id,
                    assignment.role_id,
                    assignment.subject_kind,
                    assignment.subject_id
                ),
            ));
        }

        let roles = self.inner.roles.read().expect("poisoned lock");
        if let Some(role) = roles.get(&assignment.role_id)
            && let Some(limit) = role.max_members
        {
            let members = assignments
                .values()
                .filter(|a| a.role_id == assignment.role_id)
                .count();
            if members >= limit as usize {
                return Err(StoreError::Precondition(format!(
                    "role {} max members exceeded (limit {limit})",
                    assignment.role_id
                )));
            }
        }
        drop(roles);

        assignments.insert(assignment.id, assignment.clone());
        Ok(())
    }

    async fn get_assignment(&self, assignment_id: Id) -> StoreResult<Assignment> {
        let assignments = self.inner.assignments.read().expect("poisoned lock");
        assignments
            .get(&assignment_id)
            .cloned()
            .ok_or_else(|| not_found("assignment", assignment_id))
    }

    async fn delete_assignment(&self, assignment_id: Id) -> StoreResult<()> {
        self.inner
            .assignments
            .write()
            .expect("poisoned lock")
            .remove(&assignment_id);
        Ok(())
    }

    async fn list_assignments(&self, filter: &AssignmentFilter) -> StoreResult<Vec<Assignment>> {
        let assignments = self.inner.assignments.read().expect("poisoned lock");
        let mut result: Vec<Assignment> = assignments
            .values()
            .filter(|a| {
                (filter.tenant_id.is_empty() || a.tenant_id == filter.tenant_id)
                    && filter.role_id.is_none_or(|v| a.role_id == v)
                    && (filter.subject_kind.is_empty() || a.subject_kind == filter.subject_kind)
                    && (filter.subject_id.is_empty() || a.subject_id == filter.subject_id)
                    && (filter.resource_type.is_empty() || a.resource_type == filter.resource_type)
                    && (filter.resource_id.is_empty() || a.resource_id == filter.resource_id)
            })
            .cloned()
            .collect();
        result.sort_by_key(|a| a.id);
        Ok(paginate(result, filter.limit, filter.offset))
    }

    async fn count_assignments(&self, filter: &AssignmentFilter) -> StoreResult<u64> {
        let unpaged = AssignmentFilter {
            limit: 0,
            offset: 0,
            ..filter.clone()
        };
        Ok(self.list_assignments(&unpaged).await?.len() as u64)
    }

    async fn list_roles_for_subject(
        &self,
        tenant_id: &str,
        subject_kind: &str,
        subject_id: &str,
    ) -> StoreResult<Vec<Id>> {
        let now = Utc::now();
        let assignments = self.inner.assignments.read().expect("poisoned lock");
        let mut result: Vec<Id> = assignments
            .values()
            .filter(|a| {
                a.tenant_id == tenant_id
                    && a.subject_kind == subject_kind
                    && a.subject_id == subject_id
                    && a.resource_type.is_empty()
                    && a.resource_id.is_empty()
                    && !a.is_expired(now)
            })
            .map(|a| a.role_id)
            .collect();
        result.sort();
        Ok(result)
    }

    async fn list_roles_for_subject_on_resource(
        &self,
        tenant_id: &str,
        subject_kind: &str,
        subject_id: &str,
        resource_type: &str,
        resource_id: &str,
    ) -> StoreResult<Vec<Id>> {
        let now = Utc::now();
        let assignments = self.inner.assignments.read().expect("poisoned lock");
        let mut result: Vec<Id> = assignments
            .values()
            .filter(|a| {
                a.tenant_id == tenant_id
                    && a.subject_kind == subject_kind
                    && a.subject_id == subject_id
                    && a.resource_type == resource_type
                    && a.resource_id == resource_id
                    && !a.is_expired(now)
            })
            .map(|a| a.role_id)
            .collect();
        result.sort();
        Ok(result)
    }

    async fn list_subjects_for_role(&self, role_id: Id) -> StoreResult<Vec<Assignment>> {
        let assignments = self.inner.assignments.read().expect("poisoned lock");
        let mut result: Vec<Assignment> = assignments
            .values()
            .filter(|a| a.role_id == role_id)
            .cloned()
            .collect();
        result.sort_by_key(|a| a.id);
        Ok(result)
    }

    async fn delete_expired_assignments(&self, now: DateTime<Utc>) -> StoreResult<u64> {
        let mut assignments = self.inner.assignments.write().expect("poisoned lock");
        let before = assignments.len();
        assignments.retain(|_, a| !a.is_expired(now));
        Ok((before - assignments.len()) as u64)
    }

    async fn delete_assignments_by_subject(
        &self,
        tenant_id: &str,
        subject_kind: &str,
        subject_id: &str,
    ) -> StoreResult<()> {
        self.inner
            .assignments
            .write()
            .expect("poisoned lock")
            .retain(|_, a| {
                !(a.tenant_id == tenant_id
                    && a.subject_kind == subject_kind
                    && a.subject_id == subject_id)
            });
        Ok(())
    }

    async fn delete_assignments_by_role(&self, role_id: Id) -> StoreResult<()> {
        self.inner
            .assignments
            .write()
            .expect("poisoned lock")
            .retain(|_, a| a.role_id != role_id);
        Ok(())
    }

    async fn delete_assignments_by_tenant(&self, tenant_id: &str) -> StoreResult<()> {
        self.inner
            .assignments
            .write()
            .expect("poisoned lock")
            .retain(|_, a| a.tenant_id != tenant_id);
        Ok(())
    }
}

#[async_trait]
impl RelationStore for MemoryStore {
    async fn create_relation(&self, tuple: &RelationTuple) -> StoreResult<()> {
        let mut relations = self.inner.relations.write().expect("poisoned lock");
        if relations.values().any(|existing| {
            existing.tenant_id == tuple.tenant_id
                && existing.object_type == tuple.object_type
                && existing.object_id == tuple.object_id
                && existing.relation == tuple.relation
                && existing.subject_type == tuple.subject_type
                && existing.subject_id == tuple.subject_id
                && existing.subject_relation == tuple.subject_relation
        }) {
            return Err(duplicate(
                "relation",
                format!(
                    "{}:{}#{}@{}:{}",
                    tuple.object_type,
                    tuple.object_id,
                    tuple.relation,
                    tuple.subject_type,
                    tuple.subject_id
                ),
            ));
        }
        relations.insert(tuple.id, tuple.clone());
        Ok(())
    }

    async fn delete_relation(&self, relation_id: Id) -> StoreResult<()> {
        self.inner
            .relations
            .write()
            .expect("poisoned lock")
            .remove(&relation_id);
        Ok(())
    }

    async fn delete_relation_tuple(
        &self,
        tenant_id: &str,
        object_type: &str,
        object_id: &str,
        relation: &str,
        subject_type: &str,
        subject_id: &str,
    ) -> StoreResult<()> {
        self.inner
            .relations
            .write()
            .expect("poisoned lock")
            .retain(|_, t| {
                !(t.tenant_id == tenant_id
                    && t.object_type == object_type
                    && t.object_id == object_id
                    && t.relation == relation
                    && t.subject_type == subject_type
                    && t.subject_id == subject_id)
            });
        Ok(())
    }

    async fn list_relations(&self, filter: &RelationFilter) -> StoreResult<Vec<RelationTuple>> {
        let relations = self.inner.relations.read().expect("poisoned lock");
        let mut result: Vec<RelationTuple> = relations
            .values()
            .filter(|t| {
                (filter.tenant_id.is_empty() || t.tenant_id == filter.tenant_id)
                    && (filter.object_type.is_empty() || t.object_type == filter.object_type)
                    && (filter.object_id.is_empty() || t.object_id == filter.object_id)
                    && (filter.relation.is_empty() || t.relation == filter.relation)
                    && (filter.subject_type.is_empty() || t.subject_type == filter.subject_type)
                    && (filter.subject_id.is_empty() || t.subject_id == filter.subject_id)
                    && (filter.subject_relation.is_empty()
                        || t.subject_relation == filter.subject_relation)
            })
            .cloned()
            .collect();
        result.sort_by_key(|t| t.id);
        Ok(paginate(result, filter.limit, filter.offset))
    }

    async fn count_relations(&self, filter: &RelationFilter) -> StoreResult<u64> {
        let unpaged = RelationFilter {
            limit: 0,
            offset: 0,
            ..filter.clone()
        };
        Ok(self.list_relations(&unpaged).await?.len() as u64)
    }

    async fn list_relation_subjects(
        &self,
        tenant_id: &str,
        object_type: &str,
        object_id: &str,
        relation: &str,
    ) -> StoreResult<Vec<RelationTuple>> {
        let relations = self.inner.relations.read().expect("poisoned lock");
        let mut result: Vec<RelationTuple> = relations
            .values()
            .filter(|t| {
                t.tenant_id == tenant_id
                    && t.object_type == object_type
                    && t.object_id == object_id
                    && t.relation == relation
            })
            .cloned()
            .collect();
        result.sort_by_key(|t| t.id);
        Ok(result)
    }

    async fn list_relation_objects(
        &self,
        tenant_id: &str,
        subject_type: &str,
        subject_id: &str,
        relation: &str,
    ) -> StoreResult<Vec<RelationTuple>> {
        let relations = self.inner.relations.read().expect("poisoned lock");
        let mut result: Vec<RelationTuple> = relations
            .values()
            .filter(|t| {
                t.tenant_id == tenant_id
                    && t.subject_type == subject_type
                    && t.subject_id == subject_id
                    && t.relation == relation
            })
            .cloned()
            .collect();
        result.sort_by_key(|t| t.id);
        Ok(result)
    }

    async fn check_direct_relation(
        &self,
        tenant_id: &str,
        object_type: &str,
        object_id: &str,
        relation: &str,
        subject_type: &str,
        subject_id: &str,
    ) -> StoreResult<bool> {
        let relations = self.inner.relations.read().expect("poisoned lock");
        Ok(relations.values().any(|t| {
            t.tenant_id == tenant_id
                && t.object_type == object_type
                && t.object_id == object_id
                && t.relation == relation
                && t.subject_type == subject_type
                && t.subject_id == subject_id
                && t.subject_relation.is_empty()
        }))
    }

    async fn delete_relations_by_object(
        &self,
        tenant_id: &str,
        object_type: &str,
        object_id: &str,
    ) -> StoreResult<()> {
        self.inner
            .relations
            .write()
            .expect("poisoned lock")
            .retain(|_, t| {
                !(t.tenant_id == tenant_id
                    && t.object_type == object_type
                    && t.object_id == object_id)
            });
        Ok(())
    }

    async fn delete_relations_by_subject(
        &self,
        tenant_id: &str,
        subject_type: &str,
        subject_id: &str,
    ) -> StoreResult<()> {
        self.inner
            .relations
            .write()
            .expect("poisoned lock")
            .retain(|_, t| {
                !(t.tenant_id == tenant_id
                    && t.subject_type == subject_type
                    && t.subject_id == subject_id)
            });
        Ok(())
    }

    async fn delete_relations_by_tenant(&self, tenant_id: &str) -> StoreResult<()> {
        self.inner
            .relations
            .write()
            .expect("poisoned lock")
            .retain(|_, t| t.tenant_id != tenant_id);
        Ok(())
    }
}

#[async_trait]
impl PolicyStore for MemoryStore {
    async fn create_policy(&self, policy: &Policy) -> StoreResult<()> {
        let mut policies = self.inner.policies.write().expect("poisoned lock");
        if policies
            .values()
            .any(|existing| existing.tenant_id == policy.tenant_id && existing.name == policy.name)
        {
            return Err(duplicate(
                "policy",
                format!("{}/{}", policy.tenant_id, policy.name),
            ));
        }
        policies.insert(policy.id, policy.clone());
        Ok(())
    }

    async fn get_policy(&self, policy_id: Id) -> StoreResult<Policy> {
        let policies = self.inner.policies.read().expect("poisoned lock");
        policies
            .get(&policy_id)
            .cloned()
            .ok_or_else(|| not_found("policy", policy_id))
    }

    async fn get_policy_by_name(&self, tenant_id: &str, name: &str) -> StoreResult<Policy> {
        let policies = self.inner.policies.read().expect("poisoned lock");
        policies
            .values()
            .find(|policy| policy.tenant_id == tenant_id && policy.name == name)
            .cloned()
            .ok_or_else(|| not_found("policy", name))
    }

    async fn update_policy(&self, policy: &Policy) -> StoreResult<()> {
        let mut policies = self.inner.policies.write().expect("poisoned lock");
        if !policies.contains_key(&policy.id) {
            return Err(not_found("policy", policy.id));
        }
        policies.insert(policy.id, policy.clone());
        Ok(())
    }

    async fn delete_policy(&self, policy_id: Id) -> StoreResult<()> {
        self.inner
            .policies
            .write()
            .expect("poisoned lock")
            .remove(&policy_id);
        Ok(())
    }

    async fn list_policies(&self, filter: &PolicyFilter) -> StoreResult<Vec<Policy>> {
        let policies = self.inner.policies.read().expect("poisoned lock");
        let mut result: Vec<Policy> = policies
            .values()
            .filter(|policy| {
                (filter.tenant_id.is_empty() || policy.tenant_id == filter.tenant_id)
                    && filter.effect.is_none_or(|v| policy.effect == v)
                    && filter.is_active.is_none_or(|v| policy.is_active == v)
                    && matches_search(&policy.name, &filter.search)
            })
            .cloned()
            .collect();
        result.sort_by_key(|policy| policy.id);
        Ok(paginate(result, filter.limit, filter.offset))
    }

    async fn count_policies(&self, filter: &PolicyFilter) -> StoreResult<u64> {
        let unpaged = PolicyFilter {
            limit: 0,
            offset: 0,
            ..filter.clone()
        };
        Ok(self.list_policies(&unpaged).await?.len() as u64)
    }

    async fn list_active_policies(&self, tenant_id: &str) -> StoreResult<Vec<Policy>> {
        let policies = self.inner.policies.read().expect("poisoned lock");
        let mut result: Vec<Policy> = policies
            .values()
            .filter(|policy| policy.tenant_id == tenant_id && policy.is_active)
            .cloned()
            .collect();
        // Priority ascending, creation order as the tie-break.
        result.sort_by_key(|policy| (policy.priority, policy.id));
        Ok(result)
    }

    async fn set_policy_version(&self, policy_id: Id, version: i32) -> StoreResult<()> {
        let mut policies = self.inner.policies.write().expect("poisoned lock");
        let policy = policies
            .get_mut(&policy_id)
            .ok_or_else(|| not_found("policy", policy_id))?;
        policy.version = version;
        Ok(())
    }

    async fn delete_policies_by_tenant(&self, tenant_id: &str) -> StoreResult<()> {
        self.inner
            .policies
            .write()
            .expect("poisoned lock")
            .retain(|_, policy| policy.tenant_id != tenant_id);
        Ok(())
    }
}

#[async_trait]
impl ResourceTypeStore for MemoryStore {
    async fn create_resource_type(&self, resource_type: &ResourceType) -> StoreResult<()> {
        let mut resource_types = self.inner.resource_types.write().expect("poisoned lock");
        if resource_types.values().any(|existing| {
            existing.tenant_id == resource_type.tenant_id && existing.name == resource_type.name
        }) {
            return Err(duplicate(
                "resource type",
                format!("{}/{}", resource_type.tenant_id, resource_type.name),
            ));
        }
        resource_types.insert(resource_type.id, resource_type.clone());
        Ok(())
    }

    async fn get_resource_type(&self, resource_type_id: Id) -> StoreResult<ResourceType> {
        let resource_types = self.inner.resource_types.read().expect("poisoned lock");
        resource_types
            .get(&resource_type_id)
            .cloned()
            .ok_or_else(|| not_found("resource type", resource_type_id))
    }

    async fn get_resource_type_by_name(
        &self,
        tenant_id: &str,
        name: &str,
    ) -> StoreResult<ResourceType> {
        let resource_types = self.inner.resource_types.read().expect("poisoned lock");
        resource_types
            .values()
            .find(|rt| rt.tenant_id == tenant_id && rt.name == name)
            .cloned()
            .ok_or_else(|| not_found("resource type", name))
    }

    async fn update_resource_type(&self, resource_type: &ResourceType) -> StoreResult<()> {
        let mut resource_types = self.inner.resource_types.write().expect("poisoned lock");
        if !resource_types.contains_key(&resource_type.id) {
            return Err(not_found("resource type", resource_type.id));
        }
        resource_types.insert(resource_type.id, resource_type.clone());
        Ok(())
    }

    async fn delete_resource_type(&self, resource_type_id: Id) -> StoreResult<()> {
        self.inner
            .resource_types
            .write()
            .expect("poisoned lock")
            .remove(&resource_type_id);
        Ok(())
    }

    async fn list_resource_types(
        &self,
        filter: &ResourceTypeFilter,
    ) -> StoreResult<Vec<ResourceType>> {
        let resource_types = self.inner.resource_types.read().expect("poisoned lock");
        let mut result: Vec<ResourceType> = resource_types
            .values()
            .filter(|rt| {
                (filter.tenant_id.is_empty() || rt.tenant_id == filter.tenant_id)
                    && matches_search(&rt.name, &filter.search)
            })
            .cloned()
            .collect();
        result.sort_by_key(|rt| rt.id);
        Ok(paginate(result, filter.limit, filter.offset))
    }

    async fn count_resource_types(&self, filter: &ResourceTypeFilter) -> StoreResult<u64> {
        let unpaged = ResourceTypeFilter {
            limit: 0,
            offset: 0,
            ..filter.clone()
        };
        Ok(self.list_resource_types(&unpaged).await?.len() as u64)
    }

    async fn delete_resource_types_by_tenant(&self, tenant_id: &str) -> StoreResult<()> {
        self.inner
            .resource_types
            .write()
            .expect("poisoned lock")
            .retain(|_, rt| rt.tenant_id != tenant_id);
        Ok(())
    }
}

#[async_trait]
impl CheckLogStore for MemoryStore {
    async fn create_check_log(&self, entry: &CheckLogEntry) -> StoreResult<()> {
        self.inner
            .check_logs
            .write()
            .expect("poisoned lock")
            .insert(entry.id, entry.clone());
        Ok(())
    }

    async fn get_check_log(&self, log_id: Id) -> StoreResult<CheckLogEntry> {
        let check_logs = self.inner.check_logs.read().expect("poisoned lock");
        check_logs
            .get(&log_id)
            .cloned()
            .ok_or_else(|| not_found("check log", log_id))
    }

    async fn list_check_logs(&self, filter: &CheckLogFilter) -> StoreResult<Vec<CheckLogEntry>> {
        let check_logs = self.inner.check_logs.read().expect("poisoned lock");
        let mut result: Vec<CheckLogEntry> = check_logs
            .values()
            .filter(|entry| {
                (filter.tenant_id.is_empty() || entry.tenant_id == filter.tenant_id)
                    && (filter.subject_kind.is_empty() || entry.subject_kind == filter.subject_kind)
                    && (filter.subject_id.is_empty() || entry.subject_id == filter.subject_id)
                    && (filter.action.is_empty() || entry.action == filter.action)
                    && (filter.resource_type.is_empty()
                        || entry.resource_type == filter.resource_type)
                    && (filter.resource_id.is_empty() || entry.resource_id == filter.resource_id)
                    && filter.decision.is_none_or(|v| entry.decision == v)
                    && filter.after.is_none_or(|v| entry.created_at >= v)
                    && filter.before.is_none_or(|v| entry.created_at <= v)
            })
            .cloned()
            .collect();
        result.sort_by_key(|entry| entry.id);
        Ok(paginate(result, filter.limit, filter.offset))
    }

    async fn count_check_logs(&self, filter: &CheckLogFilter) -> StoreResult<u64> {
        let unpaged = CheckLogFilter {
            limit: 0,
            offset: 0,
            ..filter.clone()
        };
        Ok(self.list_check_logs(&unpaged).await?.len() as u64)
    }

    async fn purge_check_logs(&self, before: DateTime<Utc>) -> StoreResult<u64> {
        let mut check_logs = self.inner.check_logs.write().expect("poisoned lock");
        let count = check_logs.len();
        check_logs.retain(|_, entry| entry.created_at >= before);
        Ok((count - check_logs.len()) as u64)
    }

    async fn delete_check_logs_by_tenant(&self, tenant_id: &str) -> StoreResult<()> {
        self.inner
            .check_logs
            .write()
            .expect("poisoned lock")
            .retain(|_, entry| entry.tenant_id != tenant_id);
        Ok(())
    }
}

#[async_trait]
impl AdminStore for MemoryStore {
    async fn migrate(&self) -> StoreResult<()> {
        Ok(())
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }

    async fn close(&self) -> StoreResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::block_on;

    fn role(tenant: &str, slug: &str) -> Role {
        Role {
            id: Id::new_role(),
            tenant_id: tenant.to_string(),
            app_id: String::new(),
            name: slug.to_string(),
            description: String::new(),
            slug: slug.to_string(),
            is_system: false,
            is_default: false,
            parent_id: None,
            max_members: None,
            metadata: Default::default(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn assignment(tenant: &str, role_id: Id, subject_id: &str) -> Assignment {
        Assignment {
            id: Id::new_assignment(),
            tenant_id: tenant.to_string(),
            app_id: String::new(),
            role_id,
            subject_kind: "user".to_string(),
            subject_id: subject_id.to_string(),
            resource_type: String::new(),
            resource_id: String::new(),
            expires_at: None,
            granted_by: String::new(),
            metadata: Default::default(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn roles_should_round_trip() {
        let store = MemoryStore::new();
        let editor = role("t1", "editor");

        block_on(store.create_role(&editor)).unwrap();
        assert_eq!(block_on(store.get_role(editor.id)).unwrap(), editor);
        assert_eq!(
            block_on(store.get_role_by_slug("t1", "editor")).unwrap(),
            editor
        );

        let err = block_on(store.get_role(Id::new_role())).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn duplicate_slug_should_be_rejected_per_tenant() {
        let store = MemoryStore::new();
        block_on(store.create_role(&role("t1", "editor"))).unwrap();

        let err = block_on(store.create_role(&role("t1", "editor"))).unwrap_err();
        assert!(matches!(err, StoreError::Duplicate { entity: "role", .. }));

        // Same slug in another tenant is fine.
        block_on(store.create_role(&role("t2", "editor"))).unwrap();
    }

    #[test]
    fn returned_values_should_be_defensive_copies() {
        let store = MemoryStore::new();
        let editor = role("t1", "editor");
        block_on(store.create_role(&editor)).unwrap();

        let mut fetched = block_on(store.get_role(editor.id)).unwrap();
        fetched.name = "mutated".to_string();

        assert_eq!(block_on(store.get_role(editor.id)).unwrap().name, "editor");
    }

    #[test]
    fn list_roles_should_filter_and_paginate() {
        let store = MemoryStore::new();
        for i in 0..5 {
            block_on(store.create_role(&role("t1", &format!("role-{i}")))).unwrap();
        }
        block_on(store.create_role(&role("t2", "other"))).unwrap();

        let filter = RoleFilter {
            tenant_id: "t1".to_string(),
            limit: 2,
            offset: 2,
            ..RoleFilter::default()
        };
        let page = block_on(store.list_roles(&filter)).unwrap();
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].slug, "role-2");

        // Count ignores pagination.
        assert_eq!(block_on(store.count_roles(&filter)).unwrap(), 5);
    }

    #[test]
    fn expired_assignments_should_be_invisible_to_evaluation_queries() {
        let store = MemoryStore::new();
        let editor = role("t1", "editor");
        block_on(store.create_role(&editor)).unwrap();

        let mut expired = assignment("t1", editor.id, "alice");
        expired.expires_at = Some(Utc::now() - chrono::Duration::seconds(1));
        block_on(store.create_assignment(&expired)).unwrap();

        assert!(block_on(store.list_roles_for_subject("t1", "user", "alice"))
            .unwrap()
            .is_empty());

        assert_eq!(
            block_on(store.delete_expired_assignments(Utc::now())).unwrap(),
            1
        );
        assert_eq!(
            block_on(store.count_assignments(&AssignmentFilter::default())).unwrap(),
            0
        );
    }

    #[test]
    fn duplicate_assignment_should_be_rejected() {
        let store = MemoryStore::new();
        let editor = role("t1", "editor");
        block_on(store.create_role(&editor)).unwrap();
        block_on(store.create_assignment(&assignment("t1", editor.id, "alice"))).unwrap();

        let err =
            block_on(store.create_assignment(&assignment("t1", editor.id, "alice"))).unwrap_err();
        assert!(matches!(
            err,
            StoreError::Duplicate {
                entity: "assignment",
                ..
            }
        ));
    }

    #[test]
    fn max_members_should_be_enforced() {
        let store = MemoryStore::new();
        let mut bounded = role("t1", "bounded");
        bounded.max_members = Some(1);
        block_on(store.create_role(&bounded)).unwrap();

        block_on(store.create_assignment(&assignment("t1", bounded.id, "alice"))).unwrap();
        let err =
            block_on(store.create_assignment(&assignment("t1", bounded.id, "bob"))).unwrap_err();
        assert!(matches!(err, StoreError::Precondition(_)));
    }

    #[test]
    fn system_roles_should_be_immutable() {
        let store = MemoryStore::new();
        let mut admin = role("t1", "admin");
        admin.is_system = true;
        block_on(store.create_role(&admin)).unwrap();

        let mut renamed = admin.clone();
        renamed.name = "renamed".to_string();
        assert!(matches!(
            block_on(store.update_role(&renamed)).unwrap_err(),
            StoreError::Precondition(_)
        ));
        assert!(matches!(
            block_on(store.delete_role(admin.id)).unwrap_err(),
            StoreError::Precondition(_)
        ));
        assert_eq!(block_on(store.get_role(admin.id)).unwrap().name, "admin");
    }

    #[test]
    fn system_permissions_should_be_immutable() {
        let store = MemoryStore::new();
        let manage = Permission {
            id: Id::new_permission(),
            tenant_id: "t1".to_string(),
            app_id: String::new(),
            name: "system:manage".to_string(),
            description: String::new(),
            resource: "system".to_string(),
            action: "manage".to_string(),
            is_system: true,
            metadata: Default::default(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        block_on(store.create_permission(&manage)).unwrap();

        let mut renamed = manage.clone();
        renamed.description = "renamed".to_string();
        assert!(matches!(
            block_on(store.update_permission(&renamed)).unwrap_err(),
            StoreError::Precondition(_)
        ));
        assert!(matches!(
            block_on(store.delete_permission(manage.id)).unwrap_err(),
            StoreError::Precondition(_)
        ));
        assert!(block_on(store.get_permission(manage.id)).is_ok());
    }

    #[test]
    fn detached_permissions_should_disappear_from_role() {
        let store = MemoryStore::new();
        let editor = role("t1", "editor");
        block_on(store.create_role(&editor)).unwrap();

        let read = Permission {
            id: Id::new_permission(),
            tenant_id: "t1".to_string(),
            app_id: String::new(),
            name: "document:read".to_string(),
            description: String::new(),
            resource: "document".to_string(),
            action: "read".to_string(),
            is_system: false,
            metadata: Default::default(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        block_on(store.create_permission(&read)).unwrap();
        block_on(store.attach_permission(editor.id, read.id)).unwrap();
        assert_eq!(
            block_on(store.list_permissions_by_role(editor.id))
                .unwrap()
                .len(),
            1
        );

        block_on(store.detach_permission(editor.id, read.id)).unwrap();
        assert!(block_on(store.list_role_permissions(editor.id))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn active_policies_should_come_back_in_priority_order() {
        let store = MemoryStore::new();
        for (name, priority, active) in
            [("low", 100, true), ("high", 1, true), ("off", 0, false)]
        {
            let policy = Policy {
                id: Id::new_policy(),
                tenant_id: "t1".to_string(),
                app_id: String::new(),
                name: name.to_string(),
                description: String::new(),
                effect: crate::policy::Effect::Allow,
                priority,
                is_active: active,
                version: 1,
                subjects: Vec::new(),
                actions: Vec::new(),
                resources: Vec::new(),
                conditions: Vec::new(),
                metadata: Default::default(),
                created_at: Utc::now(),
                updated_at: Utc::now(),
            };
            block_on(store.create_policy(&policy)).unwrap();
        }

        let active = block_on(store.list_active_policies("t1")).unwrap();
        let names: Vec<&str> = active.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["high", "low"]);
    }

    #[test]
    fn purge_check_logs_should_remove_old_entries() {
        let store = MemoryStore::new();
        let entry = CheckLogEntry {
            id: Id::new_check_log(),
            tenant_id: "t1".to_string(),
            app_id: String::new(),
            subject_kind: "user".to_string(),
            subject_id: "alice".to_string(),
            action: "read".to_string(),
            resource_type: "document".to_string(),
            resource_id: "d1".to_string(),
            decision: crate::check::Decision::Allow,
            reason: String::new(),
            eval_time_ns: 42,
            request_ip: String::new(),
            metadata: Default::default(),
            created_at: Utc::now() - chrono::Duration::days(30),
        };
        block_on(store.create_check_log(&entry)).unwrap();

        let removed =
            block_on(store.purge_check_logs(Utc::now() - chrono::Duration::days(7))).unwrap();
        assert_eq!(removed, 1);
        assert!(block_on(store.get_check_log(entry.id)).unwrap_err().is_not_found());
    }
}
