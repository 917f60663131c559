//! The aggregate persistence contract.
//!
//! Each entity family defines its own store trait next to its entity; the
//! composite [`Store`] composes them all plus the administrative
//! operations. A single backend implements every sub-trait. All
//! operations are tenant-scoped at the call site: the caller passes tenant
//! identifiers, the store never infers them.

use async_trait::async_trait;

use crate::assignment::AssignmentStore;
use crate::check_log::CheckLogStore;
use crate::error::StoreResult;
use crate::permission::PermissionStore;
use crate::policy::PolicyStore;
use crate::relation::RelationStore;
use crate::resource_type::ResourceTypeStore;
use crate::role::RoleStore;

/// Administrative operations every backend provides.
#[async_trait]
pub trait AdminStore {
    /// Runs schema migrations. Must be idempotent.
    async fn migrate(&self) -> StoreResult<()>;

    /// Checks backend connectivity.
    async fn ping(&self) -> StoreResult<()>;

    /// Closes the backend connection.
    async fn close(&self) -> StoreResult<()>;
}

/// The composite persistence contract.
pub trait Store:
    RoleStore
    + PermissionStore
    + AssignmentStore
    + RelationStore
    + PolicyStore
    + ResourceTypeStore
    + CheckLogStore
    + AdminStore
    + Send
    + Sync
{
}

impl<T> Store for T where
    T: RoleStore
        + PermissionStore
        + AssignmentStore
        + RelationStore
        + PolicyStore
        + ResourceTypeStore
        + CheckLogStore
        + AdminStore
        + Send
        + Sync
{
}
