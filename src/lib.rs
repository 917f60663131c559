//! Multi-model authorization engine.
//!
//! This crate answers one question per request: may a subject perform an
//! action on a resource, within a tenant and optional context? Three
//! models are evaluated and reconciled on every decision: role-based
//! (roles own permissions), relationship-based (bounded traversal over
//! relation tuples), and attribute-based (prioritized policies with
//! conditions). The default behavior is deny-by-default; only an ABAC
//! policy can produce an allow-overriding explicit deny.
//!
//! Use [`EngineBuilder`] to wire an engine over any [`Store`]
//! implementation, and [`Context`] to scope requests to a tenant.
//!
//! # Examples
//!
//! Checking a permission against the in-memory store (enable
//! `memory-store`):
//! ```no_run
//! use warden::{CheckRequest, Context, EngineBuilder, SubjectKind};
//! # #[cfg(feature = "memory-store")]
//! # {
//! use warden::MemoryStore;
//! # async fn check() -> warden::Result<()> {
//! let engine = EngineBuilder::new(MemoryStore::new()).build();
//! let ctx = Context::with_tenant("app1", "t1");
//! let req = CheckRequest::new(SubjectKind::User, "alice", "read", "document", "d1");
//! let result = engine.check(&ctx, &req).await?;
//! assert!(!result.allowed);
//! # Ok(())
//! # }
//! # }
//! ```
//!
//! Caching check results (enable `memory-cache`):
//! ```no_run
//! # #[cfg(all(feature = "memory-store", feature = "memory-cache"))]
//! # {
//! use std::time::Duration;
//! use warden::{EngineBuilder, MemoryCache, MemoryStore};
//! let engine = EngineBuilder::new(MemoryStore::new())
//!     .cache(MemoryCache::new().with_ttl(Duration::from_secs(30)))
//!     .build();
//! # let _ = engine;
//! # }
//! ```
#![forbid(unsafe_code)]

mod assignment;
mod cache;
mod check;
mod check_log;
mod config;
mod context;
mod engine;
mod error;
mod evaluator;
mod graph;
mod id;
mod matcher;
mod permission;
mod plugin;
mod policy;
mod relation;
mod resource_type;
mod role;
mod store;

#[cfg(feature = "memory-cache")]
mod memory_cache;

#[cfg(feature = "memory-store")]
mod memory_store;

#[cfg(feature = "axum")]
pub mod axum;

pub use crate::assignment::{Assignment, AssignmentFilter, AssignmentStore};
pub use crate::cache::{Cache, NoCache};
pub use crate::check::{
    Action, CheckRequest, CheckResult, Decision, MatchInfo, Resource, Subject, SubjectKind,
};
pub use crate::check_log::{CheckLogEntry, CheckLogFilter, CheckLogStore};
pub use crate::config::Config;
pub use crate::context::{Context, TenantScope};
pub use crate::engine::{Engine, EngineBuilder};
pub use crate::error::{BoxError, Error, Result, StoreError, StoreResult};
pub use crate::evaluator::{ConditionEvaluator, PolicyEvaluator};
pub use crate::graph::{BfsGraphWalker, GraphWalker};
pub use crate::id::{Id, Prefix};
pub use crate::permission::{Permission, PermissionFilter, PermissionStore};
pub use crate::plugin::{Event, EventKind, Plugin, PluginRegistry};
pub use crate::policy::{
    Condition, Effect, Operator, Policy, PolicyFilter, PolicyStore, SubjectMatch,
};
pub use crate::relation::{RelationFilter, RelationStore, RelationTuple};
pub use crate::resource_type::{
    PermissionDef, RelationDef, ResourceType, ResourceTypeFilter, ResourceTypeStore,
};
pub use crate::role::{Role, RoleFilter, RoleStore};
pub use crate::store::{AdminStore, Store};

#[cfg(feature = "memory-store")]
pub use crate::memory_store::MemoryStore;

#[cfg(feature = "memory-cache")]
pub use crate::memory_cache::MemoryCache;
