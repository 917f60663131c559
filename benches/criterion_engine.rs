#![cfg(all(
    feature = "criterion-bench",
    feature = "memory-store",
    feature = "memory-cache"
))]

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use futures::executor::block_on;
use warden::{
    Assignment, AssignmentStore, CheckRequest, Context, EngineBuilder, Id, MemoryCache,
    MemoryStore, Permission, PermissionStore, RelationStore, RelationTuple, Role, RoleStore,
    SubjectKind,
};

fn role(tenant: &str, slug: &str, parent_id: Option<Id>) -> Role {
    Role {
        id: Id::new_role(),
        tenant_id: tenant.to_string(),
        app_id: String::new(),
        name: slug.to_string(),
        description: String::new(),
        slug: slug.to_string(),
        is_system: false,
        is_default: false,
        parent_id,
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

fn setup_flat_store() -> MemoryStore {
    let store = MemoryStore::new();
    let reader = role("t1", "reader", None);
    let read = permission("t1", "document", "read");
    block_on(store.create_role(&reader)).unwrap();
    block_on(store.create_permission(&read)).unwrap();
    block_on(store.attach_permission(reader.id, read.id)).unwrap();
    block_on(store.create_assignment(&assignment("t1", reader.id, "bench-user"))).unwrap();
    store
}

fn setup_hierarchy_store(depth: usize) -> MemoryStore {
    let store = MemoryStore::new();

    let top = role("t1", "chain-top", None);
    let read = permission("t1", "document", "read");
    block_on(store.create_role(&top)).unwrap();
    block_on(store.create_permission(&read)).unwrap();
    block_on(store.attach_permission(top.id, read.id)).unwrap();

    let mut parent = top.id;
    let mut bottom = top.id;
    for i in 0..depth {
        let child = role("t1", &format!("chain-{i}"), Some(parent));
        block_on(store.create_role(&child)).unwrap();
        parent = child.id;
        bottom = child.id;
    }
    block_on(store.create_assignment(&assignment("t1", bottom, "bench-user"))).unwrap();
    store
}

fn setup_relation_chain_store(depth: usize) -> MemoryStore {
    let store = MemoryStore::new();
    let mut object = ("document".to_string(), "doc-bench".to_string());
    for i in 0..depth {
        let group = ("group".to_string(), format!("g{i}"));
        block_on(store.create_relation(&RelationTuple {
            id: Id::new_relation(),
            tenant_id: "t1".to_string(),
            app_id: String::new(),
            object_type: object.0.clone(),
            object_id: object.1.clone(),
            relation: "read".to_string(),
            subject_type: group.0.clone(),
            subject_id: group.1.clone(),
            subject_relation: "read".to_string(),
            metadata: HashMap::new(),
            created_at: Utc::now(),
        }))
        .unwrap();
        object = group;
    }
    block_on(store.create_relation(&RelationTuple {
        id: Id::new_relation(),
        tenant_id: "t1".to_string(),
        app_id: String::new(),
        object_type: object.0,
        object_id: object.1,
        relation: "read".to_string(),
        subject_type: "user".to_string(),
        subject_id: "bench-user".to_string(),
        subject_relation: String::new(),
        metadata: HashMap::new(),
        created_at: Utc::now(),
    }))
    .unwrap();
    store
}

fn request() -> CheckRequest {
    CheckRequest::new(SubjectKind::User, "bench-user", "read", "document", "doc-bench")
}

fn bench_flat(c: &mut Criterion) {
    let mut group = c.benchmark_group("check_flat");
    group.sample_size(30);
    group.throughput(Throughput::Elements(1));

    let engine = EngineBuilder::new(setup_flat_store()).build();
    let ctx = Context::with_tenant("app1", "t1");
    let req = request();

    group.bench_function("uncached", |b| {
        b.iter(|| {
            let result = block_on(engine.check(&ctx, black_box(&req))).unwrap();
            black_box(result.allowed)
        })
    });

    let cached_engine = EngineBuilder::new(setup_flat_store())
        .cache(MemoryCache::new())
        .build();
    group.bench_function("cached", |b| {
        b.iter(|| {
            let result = block_on(cached_engine.check(&ctx, black_box(&req))).unwrap();
            black_box(result.allowed)
        })
    });

    group.finish();
}

fn bench_role_hierarchy(c: &mut Criterion) {
    let mut group = c.benchmark_group("check_role_hierarchy");
    group.sample_size(30);

    for depth in [2usize, 8, 16] {
        let engine = Arc::new(EngineBuilder::new(setup_hierarchy_store(depth)).build());
        let ctx = Context::with_tenant("app1", "t1");
        let req = request();

        group.bench_with_input(BenchmarkId::from_parameter(depth), &depth, |b, _| {
            b.iter(|| {
                let result = block_on(engine.check(&ctx, black_box(&req))).unwrap();
                black_box(result.allowed)
            })
        });
    }

    group.finish();
}

fn bench_graph_walk(c: &mut Criterion) {
    let mut group = c.benchmark_group("check_graph_walk");
    group.sample_size(30);

    for depth in [1usize, 4, 8] {
        let engine = Arc::new(EngineBuilder::new(setup_relation_chain_store(depth)).build());
        let ctx = Context::with_tenant("app1", "t1");
        let req = request();

        group.bench_with_input(BenchmarkId::from_parameter(depth), &depth, |b, _| {
            b.iter(|| {
                let result = block_on(engine.check(&ctx, black_box(&req))).unwrap();
                black_box(result.allowed)
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_flat, bench_role_hierarchy, bench_graph_walk);
criterion_main!(benches);
