//! Repository Port
//!
//! Contract the role service drives against a durable store. The service is
//! generic over these traits; [`crate::role::store::MongoRoleStore`] is the
//! production implementation and [`crate::role::memory::MemoryRoleStore`]
//! backs tests and local development.

use async_trait::async_trait;

use crate::role::entity::{Role, RoleFilter, RoleMember};
use crate::shared::error::Result;

/// Durable store for roles and membership links.
///
/// Point lookups return `Ok(None)` when nothing matches; `Err` is reserved
/// for store failures. Lookups by id/name/handle resolve roles in any
/// lifecycle state: a soft-deleted role keeps ownership of its name and
/// handle, and undelete has to be able to find its target.
///
/// State transitions are keyed by ID and absolute: repeating one is a no-op,
/// an unknown ID is [`crate::DirectoryError::NotFound`]. The store, not the
/// caller, is the authority on current state.
#[async_trait]
pub trait RoleStore: Send + Sync {
    type Tx: RoleStoreTx;

    /// Open a transaction. Writes through the returned handle become
    /// visible only after [`RoleStoreTx::commit`].
    async fn begin(&self) -> Result<Self::Tx>;

    async fn find_by_id(&self, id: u64) -> Result<Option<Role>>;
    async fn find_by_name(&self, name: &str) -> Result<Option<Role>>;
    async fn find_by_handle(&self, handle: &str) -> Result<Option<Role>>;

    /// Filtered search. The role service injects the read scope before
    /// delegating here.
    async fn search(&self, filter: &RoleFilter) -> Result<Vec<Role>>;

    async fn archive_by_id(&self, id: u64) -> Result<()>;
    async fn unarchive_by_id(&self, id: u64) -> Result<()>;
    async fn delete_by_id(&self, id: u64) -> Result<()>;
    async fn undelete_by_id(&self, id: u64) -> Result<()>;

    /// Consolidate `role_id` into `target_role_id`: memberships move to the
    /// target (deduplicated) and the source role is soft-deleted.
    async fn merge_by_id(&self, role_id: u64, target_role_id: u64) -> Result<()>;

    /// Reassign the role to another organisational container.
    async fn move_by_id(&self, role_id: u64, organisation_id: u64) -> Result<()>;

    async fn memberships_by_user(&self, user_id: u64) -> Result<Vec<RoleMember>>;
    async fn members_by_role(&self, role_id: u64) -> Result<Vec<RoleMember>>;

    /// Add a membership link. Adding an existing link is a no-op.
    async fn member_add(&self, role_id: u64, user_id: u64) -> Result<()>;

    /// Remove a membership link. Removing a missing link is a no-op.
    async fn member_remove(&self, role_id: u64, user_id: u64) -> Result<()>;
}

/// A single open transaction against a [`RoleStore`].
///
/// The handle is owned by the operation that opened it and consumed by
/// `commit`/`abort`; dropping it uncommitted abandons its writes. Uniqueness
/// violations surface from the write (or the commit) as the corresponding
/// error kind, backed by the store's unique constraints, so two concurrent
/// creates for one handle can never both succeed.
#[async_trait]
pub trait RoleStoreTx: Send {
    async fn find_by_id(&mut self, id: u64) -> Result<Option<Role>>;
    async fn find_by_name(&mut self, name: &str) -> Result<Option<Role>>;
    async fn find_by_handle(&mut self, handle: &str) -> Result<Option<Role>>;

    /// Persist a new role, assigning its ID.
    async fn create(&mut self, role: Role) -> Result<Role>;

    /// Persist changes to an existing role.
    async fn update(&mut self, role: Role) -> Result<Role>;

    async fn commit(self) -> Result<()>;
    async fn abort(self) -> Result<()>;
}
