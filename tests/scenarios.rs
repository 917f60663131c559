#![cfg(feature = "memory-store")]

//! End-to-end decision pipeline scenarios against the in-memory store.

use std::collections::HashMap;

use chrono::Utc;
use futures::executor::block_on;
use serde_json::json;
use warden::{
    Assignment, CheckRequest, Condition, Context, Decision, Effect, EngineBuilder, Id,
    MemoryStore, Operator, Permission, Policy, Role, RoleStore, SubjectKind,
};

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
        metadata: HashMap::new(),
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

fn permission(tenant: &str, resource: &str, action: &str) -> Permission {
    Permission {
        id: Id::new_permission(),
        tenant_id: tenant.to_string(),
        app_id: String::new(),
        name: format!("{resource}:{action}"),
        description: String::new(),
        resource: resource.to_string(),
        action: action.to_string(),
        is_system: false,
        metadata: HashMap::new(),
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
        metadata: HashMap::new(),
        created_at: Utc::now(),
    }
}

fn tuple(
    tenant: &str,
    object: (&str, &str),
    relation: &str,
    subject: (&str, &str),
    subject_relation: &str,
) -> warden::RelationTuple {
    warden::RelationTuple {
        id: Id::new_relation(),
        tenant_id: tenant.to_string(),
        app_id: String::new(),
        object_type: object.0.to_string(),
        object_id: object.1.to_string(),
        relation: relation.to_string(),
        subject_type: subject.0.to_string(),
        subject_id: subject.1.to_string(),
        subject_relation: subject_relation.to_string(),
        metadata: HashMap::new(),
        created_at: Utc::now(),
    }
}

fn policy(tenant: &str, name: &str, effect: Effect, priority: i32) -> Policy {
    Policy {
        id: Id::new_policy(),
        tenant_id: tenant.to_string(),
        app_id: String::new(),
        name: name.to_string(),
        description: String::new(),
        effect,
        priority,
        is_active: true,
        version: 1,
        subjects: Vec::new(),
        actions: Vec::new(),
        resources: Vec::new(),
        conditions: Vec::new(),
        metadata: HashMap::new(),
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

fn ctx() -> Context {
    Context::with_tenant("app1", "t1")
}

fn check(subject_id: &str, action: &str, resource_type: &str, resource_id: &str) -> CheckRequest {
    CheckRequest::new(SubjectKind::User, subject_id, action, resource_type, resource_id)
}

#[test]
fn rbac_glob_permission_grants_access() {
    use warden::{AssignmentStore, PermissionStore};

    let store = MemoryStore::new();
    let editor = role("t1", "editor");
    let read = permission("t1", "document", "read");
    block_on(store.create_role(&editor)).unwrap();
    block_on(store.create_permission(&read)).unwrap();
    block_on(store.attach_permission(editor.id, read.id)).unwrap();
    block_on(store.create_assignment(&assignment("t1", editor.id, "alice"))).unwrap();

    let engine = EngineBuilder::new(store).build();
    let result = block_on(engine.check(&ctx(), &check("alice", "read", "document", "d1"))).unwrap();

    assert!(result.allowed);
    assert_eq!(result.decision, Decision::Allow);
    assert_eq!(result.matched_by[0].source, "rbac");
    assert!(result.matched_by[0].detail.contains("document:read"));
    assert!(result.eval_time_ns > 0);
}

#[test]
fn role_inheritance_grants_parent_permissions() {
    use warden::{AssignmentStore, PermissionStore};

    let store = MemoryStore::new();
    let viewer = role("t1", "viewer");
    let read = permission("t1", "document", "read");
    block_on(store.create_role(&viewer)).unwrap();
    block_on(store.create_permission(&read)).unwrap();
    block_on(store.attach_permission(viewer.id, read.id)).unwrap();

    let mut editor = role("t1", "editor");
    editor.parent_id = Some(viewer.id);
    let write = permission("t1", "document", "write");
    block_on(store.create_role(&editor)).unwrap();
    block_on(store.create_permission(&write)).unwrap();
    block_on(store.attach_permission(editor.id, write.id)).unwrap();

    block_on(store.create_assignment(&assignment("t1", editor.id, "alice"))).unwrap();
    let engine = EngineBuilder::new(store).build();

    let read_result =
        block_on(engine.check(&ctx(), &check("alice", "read", "document", "d1"))).unwrap();
    assert!(read_result.allowed);

    let write_result =
        block_on(engine.check(&ctx(), &check("alice", "write", "document", "d1"))).unwrap();
    assert!(write_result.allowed);

    let delete_result =
        block_on(engine.check(&ctx(), &check("alice", "delete", "document", "d1"))).unwrap();
    assert!(!delete_result.allowed);
    assert_eq!(delete_result.decision, Decision::DenyNoPerms);
}

#[test]
fn direct_relation_grants_access() {
    use warden::RelationStore;

    let store = MemoryStore::new();
    block_on(store.create_relation(&tuple("t1", ("document", "doc1"), "read", ("user", "u1"), "")))
        .unwrap();

    let engine = EngineBuilder::new(store).build();
    let result = block_on(engine.check(&ctx(), &check("u1", "read", "document", "doc1"))).unwrap();

    assert!(result.allowed);
    assert_eq!(result.matched_by[0].source, "rebac");
    assert_eq!(result.matched_by[0].detail, "direct relation");
}

#[test]
fn transitive_relation_is_found_by_graph_walk() {
    use warden::RelationStore;

    let store = MemoryStore::new();
    block_on(store.create_relation(&tuple(
        "t1",
        ("document", "doc2"),
        "read",
        ("folder", "engineering"),
        "read",
    )))
    .unwrap();
    block_on(store.create_relation(&tuple(
        "t1",
        ("folder", "engineering"),
        "read",
        ("user", "bob"),
        "",
    )))
    .unwrap();

    let engine = EngineBuilder::new(store).build();
    let result = block_on(engine.check(&ctx(), &check("bob", "read", "document", "doc2"))).unwrap();

    assert!(result.allowed);
    let detail = &result.matched_by[0].detail;
    assert!(detail.contains("folder:engineering#read"), "detail: {detail}");
    assert!(detail.ends_with("user:bob"), "detail: {detail}");
}

#[test]
fn explicit_deny_policy_wins_over_allow() {
    use warden::PolicyStore;

    let store = MemoryStore::new();
    let mut allow_all = policy("t1", "allow-all", Effect::Allow, 10);
    allow_all.actions = vec!["*".to_string()];
    block_on(store.create_policy(&allow_all)).unwrap();

    let mut deny_internal = policy("t1", "deny-internal-network", Effect::Deny, 1);
    deny_internal.conditions = vec![Condition {
        id: Id::new_condition(),
        field: "context.ip".to_string(),
        operator: Operator::IpInCidr,
        value: json!("10.0.0.0/8"),
    }];
    block_on(store.create_policy(&deny_internal)).unwrap();

    let engine = EngineBuilder::new(store).build();

    let mut denied = check("u1", "read", "document", "doc1");
    denied.context.insert("ip".to_string(), json!("10.0.1.5"));
    let result = block_on(engine.check(&ctx(), &denied)).unwrap();
    assert!(!result.allowed);
    assert_eq!(result.decision, Decision::DenyExplicit);

    let mut allowed = check("u1", "read", "document", "doc1");
    allowed.context.insert("ip".to_string(), json!("203.0.113.1"));
    let result = block_on(engine.check(&ctx(), &allowed)).unwrap();
    assert!(result.allowed);
}

#[cfg(feature = "memory-cache")]
#[test]
fn cache_entries_expire_after_ttl() {
    use std::time::Duration;
    use warden::{Cache, CheckResult, MemoryCache};

    let cache = MemoryCache::new().with_ttl(Duration::from_millis(1));
    let req = check("u1", "read", "document", "doc1");
    let result = CheckResult {
        allowed: true,
        decision: Decision::Allow,
        ..CheckResult::default()
    };

    block_on(cache.set("t1", &req, &result));
    std::thread::sleep(Duration::from_millis(5));

    assert!(block_on(cache.get("t1", &req)).is_none());
}

#[test]
fn resource_scoped_assignments_only_apply_to_that_resource() {
    use warden::{AssignmentStore, PermissionStore};

    let store = MemoryStore::new();
    let editor = role("t1", "editor");
    let read = permission("t1", "document", "read");
    block_on(store.create_role(&editor)).unwrap();
    block_on(store.create_permission(&read)).unwrap();
    block_on(store.attach_permission(editor.id, read.id)).unwrap();

    let mut scoped = assignment("t1", editor.id, "carol");
    scoped.resource_type = "document".to_string();
    scoped.resource_id = "d1".to_string();
    block_on(store.create_assignment(&scoped)).unwrap();

    let engine = EngineBuilder::new(store).build();

    let on_d1 = block_on(engine.check(&ctx(), &check("carol", "read", "document", "d1"))).unwrap();
    assert!(on_d1.allowed);

    let on_d2 = block_on(engine.check(&ctx(), &check("carol", "read", "document", "d2"))).unwrap();
    assert!(!on_d2.allowed);
    assert_eq!(on_d2.decision, Decision::DenyNoRoles);
}

#[test]
fn typeid_text_round_trips_and_rejects_cross_type() {
    let id = Id::new_role();
    let text = id.to_string();

    assert_eq!(Id::parse(&text).unwrap(), id);
    assert_eq!(Id::parse_role(&text).unwrap(), id);
    assert!(Id::parse_policy(&text).is_err());
}

#[test]
fn policy_conditions_survive_json_round_trips() {
    let operators = [
        Operator::Eq,
        Operator::Neq,
        Operator::In,
        Operator::NotIn,
        Operator::Contains,
        Operator::StartsWith,
        Operator::EndsWith,
        Operator::Gt,
        Operator::Lt,
        Operator::Gte,
        Operator::Lte,
        Operator::Exists,
        Operator::NotExists,
        Operator::IpInCidr,
        Operator::TimeAfter,
        Operator::TimeBefore,
        Operator::Regex,
    ];

    for operator in operators {
        let condition = Condition {
            id: Id::new_condition(),
            field: "context.ip".to_string(),
            operator,
            value: json!(["10.0.0.0/8"]),
        };
        let encoded = serde_json::to_string(&condition).unwrap();
        let decoded: Condition = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, condition);
    }
}

#[test]
fn entities_survive_store_round_trips() {
    use warden::{AssignmentStore, PolicyStore};

    let store = MemoryStore::new();

    let mut stored_role = role("t1", "auditor");
    stored_role.metadata.insert("team".to_string(), json!("sec"));
    block_on(store.create_role(&stored_role)).unwrap();
    assert_eq!(block_on(store.get_role(stored_role.id)).unwrap(), stored_role);

    let mut stored_policy = policy("t1", "audit-window", Effect::Allow, 5);
    stored_policy.conditions = vec![Condition {
        id: Id::new_condition(),
        field: "context.time".to_string(),
        operator: Operator::TimeBefore,
        value: json!("2030-01-01T00:00:00Z"),
    }];
    block_on(store.create_policy(&stored_policy)).unwrap();
    assert_eq!(
        block_on(store.get_policy(stored_policy.id)).unwrap(),
        stored_policy
    );

    let mut stored_assignment = assignment("t1", stored_role.id, "dave");
    stored_assignment.granted_by = "admin".to_string();
    block_on(store.create_assignment(&stored_assignment)).unwrap();
    assert_eq!(
        block_on(store.get_assignment(stored_assignment.id)).unwrap(),
        stored_assignment
    );
}
