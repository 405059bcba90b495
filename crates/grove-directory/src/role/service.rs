//! Role Service
//!
//! The single entry point for role reads, writes, and membership changes.
//! Authorization is enforced before any side effect, uniqueness before any
//! create/update write, and multi-step sequences run inside one store
//! transaction so partial writes never become visible.
//!
//! Mutations of existing state authorize against the freshly fetched role,
//! never against a caller-supplied payload. The one exception is the initial
//! gate in [`RoleService::update`], where the payload is all that exists
//! before the fetch; keeping that gate first preserves the failure order for
//! unknown IDs.

use std::sync::Arc;

use tracing::info;

use crate::access::context::AuthContext;
use crate::access::control::RoleAccessControl;
use crate::role::entity::{Role, RoleFilter, RoleMember};
use crate::role::repository::{RoleStore, RoleStoreTx};
use crate::shared::error::{DirectoryError, Result};
use crate::shared::handle;

/// Role lifecycle service bound to one acting identity.
///
/// Construct a fresh instance per request scope; dependencies are injected,
/// never taken from globals.
pub struct RoleService<S, A> {
    store: Arc<S>,
    access: Arc<A>,
    identity: AuthContext,
}

impl<S, A> RoleService<S, A>
where
    S: RoleStore,
    A: RoleAccessControl,
{
    pub fn new(store: Arc<S>, access: Arc<A>, identity: AuthContext) -> Self {
        Self {
            store,
            access,
            identity,
        }
    }

    /// Rebind to a different acting identity, sharing the same ports.
    pub fn with_identity(&self, identity: AuthContext) -> Self {
        Self {
            store: Arc::clone(&self.store),
            access: Arc::clone(&self.access),
            identity,
        }
    }

    pub async fn find_by_id(&self, role_id: u64) -> Result<Role> {
        self.find_role(role_id).await
    }

    /// Shared lookup: resolve the role, then gate it behind the read
    /// capability. Soft state does not hide a role from direct lookup.
    async fn find_role(&self, role_id: u64) -> Result<Role> {
        if role_id == 0 {
            return Err(DirectoryError::InvalidId);
        }

        let role = self
            .store
            .find_by_id(role_id)
            .await?
            .ok_or(DirectoryError::NotFound)?;

        if !self.access.can_read_role(&self.identity, &role).await {
            return Err(DirectoryError::NoPermission);
        }
        Ok(role)
    }

    /// Search with the caller's read scope injected. Listing archived or
    /// deleted roles additionally requires the coarse access capability.
    /// Returns the matches together with the effective filter.
    pub async fn find(&self, mut filter: RoleFilter) -> Result<(Vec<Role>, RoleFilter)> {
        filter.readable = Some(self.access.readable_roles(&self.identity).await);

        if filter.state.is_restricted() && !self.access.can_access(&self.identity).await {
            return Err(DirectoryError::NoPermission);
        }

        let roles = self.store.search(&filter).await?;
        Ok((roles, filter))
    }

    /// Lookup by name, gated behind the read capability like
    /// [`RoleService::find_by_id`]: the name is an alternate key to the same
    /// entity and must not leak it.
    pub async fn find_by_name(&self, name: &str) -> Result<Role> {
        let role = self
            .store
            .find_by_name(name)
            .await?
            .ok_or(DirectoryError::NotFound)?;

        if !self.access.can_read_role(&self.identity, &role).await {
            return Err(DirectoryError::NoPermission);
        }
        Ok(role)
    }

    /// Lookup by handle, gated like [`RoleService::find_by_name`].
    pub async fn find_by_handle(&self, handle: &str) -> Result<Role> {
        let role = self
            .store
            .find_by_handle(handle)
            .await?
            .ok_or(DirectoryError::NotFound)?;

        if !self.access.can_read_role(&self.identity, &role).await {
            return Err(DirectoryError::NoPermission);
        }
        Ok(role)
    }

    /// Create a role. Handle syntax and the create capability are checked
    /// before any store call; the uniqueness check and the write share one
    /// transaction, so a failure leaves no partial role behind.
    pub async fn create(&self, role: Role) -> Result<Role> {
        if !handle::is_valid(&role.handle) {
            return Err(DirectoryError::InvalidHandle);
        }
        if !self.access.can_create_role(&self.identity).await {
            return Err(DirectoryError::NoCreatePermission);
        }

        let mut tx = self.store.begin().await?;
        let created = match self.create_in(&mut tx, role).await {
            Ok(created) => created,
            Err(err) => {
                let _ = tx.abort().await;
                return Err(err);
            }
        };
        tx.commit().await?;

        info!(role_id = created.id, handle = %created.handle, "role created");
        Ok(created)
    }

    async fn create_in(&self, tx: &mut S::Tx, role: Role) -> Result<Role> {
        self.unique_check_in(tx, &role).await?;
        tx.create(role).await
    }

    /// Update a role's mutable fields (`name`, `handle`). The current role
    /// is re-fetched and uniqueness re-checked inside the transaction;
    /// everything but the mutable fields is preserved from the store.
    pub async fn update(&self, role: Role) -> Result<Role> {
        if role.id == 0 {
            return Err(DirectoryError::InvalidId);
        }
        if !handle::is_valid(&role.handle) {
            return Err(DirectoryError::InvalidHandle);
        }

        // Gated on the incoming payload: the stored role is not fetched yet,
        // and an unknown ID must fail authorization before lookup.
        if !self.access.can_update_role(&self.identity, &role).await {
            return Err(DirectoryError::NoUpdatePermission);
        }

        let mut tx = self.store.begin().await?;
        let updated = match self.update_in(&mut tx, role).await {
            Ok(updated) => updated,
            Err(err) => {
                let _ = tx.abort().await;
                return Err(err);
            }
        };
        tx.commit().await?;

        info!(role_id = updated.id, "role updated");
        Ok(updated)
    }

    async fn update_in(&self, tx: &mut S::Tx, incoming: Role) -> Result<Role> {
        let mut current = tx
            .find_by_id(incoming.id)
            .await?
            .ok_or(DirectoryError::NotFound)?;

        self.unique_check_in(tx, &incoming).await?;

        current.name = incoming.name;
        current.handle = incoming.handle;

        tx.update(current).await
    }

    /// Validate that the role's non-empty handle and name are not owned by a
    /// different role. Handle is checked before name.
    ///
    /// A failed lookup counts as the absence of a conflict. That suppression
    /// is intentional and this is the only place an error is swallowed; the
    /// store's unique constraints reject the write if a masked conflict
    /// exists.
    pub async fn unique_check(&self, role: &Role) -> Result<()> {
        if !role.handle.is_empty() {
            if let Ok(Some(existing)) = self.store.find_by_handle(&role.handle).await {
                if existing.id > 0 && existing.id != role.id {
                    return Err(DirectoryError::HandleNotUnique);
                }
            }
        }

        if !role.name.is_empty() {
            if let Ok(Some(existing)) = self.store.find_by_name(&role.name).await {
                if existing.id > 0 && existing.id != role.id {
                    return Err(DirectoryError::NameNotUnique);
                }
            }
        }

        Ok(())
    }

    /// Transactional variant of [`RoleService::unique_check`], same
    /// fail-open lookup semantics.
    async fn unique_check_in(&self, tx: &mut S::Tx, role: &Role) -> Result<()> {
        if !role.handle.is_empty() {
            if let Ok(Some(existing)) = tx.find_by_handle(&role.handle).await {
                if existing.id > 0 && existing.id != role.id {
                    return Err(DirectoryError::HandleNotUnique);
                }
            }
        }

        if !role.name.is_empty() {
            if let Ok(Some(existing)) = tx.find_by_name(&role.name).await {
                if existing.id > 0 && existing.id != role.id {
                    return Err(DirectoryError::NameNotUnique);
                }
            }
        }

        Ok(())
    }

    /// Soft-delete, authorized against the delete capability on the fetched
    /// role. Reversible via [`RoleService::undelete`].
    pub async fn delete(&self, role_id: u64) -> Result<()> {
        let role = self.find_role(role_id).await?;

        if !self.access.can_delete_role(&self.identity, &role).await {
            return Err(DirectoryError::NoPermission);
        }

        self.store.delete_by_id(role_id).await?;
        info!(role_id, "role deleted");
        Ok(())
    }

    pub async fn undelete(&self, role_id: u64) -> Result<()> {
        let role = self.find_role(role_id).await?;

        if !self.access.can_delete_role(&self.identity, &role).await {
            return Err(DirectoryError::NoPermission);
        }

        self.store.undelete_by_id(role_id).await?;
        info!(role_id, "role undeleted");
        Ok(())
    }

    /// Archive, authorized against the update capability: archiving is
    /// modeled as an update, not a delete.
    pub async fn archive(&self, role_id: u64) -> Result<()> {
        let role = self.find_role(role_id).await?;

        if !self.access.can_update_role(&self.identity, &role).await {
            return Err(DirectoryError::NoPermission);
        }

        self.store.archive_by_id(role_id).await?;
        info!(role_id, "role archived");
        Ok(())
    }

    pub async fn unarchive(&self, role_id: u64) -> Result<()> {
        let role = self.find_role(role_id).await?;

        if !self.access.can_update_role(&self.identity, &role).await {
            return Err(DirectoryError::NoPermission);
        }

        self.store.unarchive_by_id(role_id).await?;
        info!(role_id, "role unarchived");
        Ok(())
    }

    /// Merge this role into a target role. Consolidation semantics belong
    /// to the store; this only gates and forwards.
    pub async fn merge(&self, role_id: u64, target_role_id: u64) -> Result<()> {
        let role = self.find_role(role_id).await?;

        if target_role_id == 0 {
            return Err(DirectoryError::InvalidId);
        }
        if !self.access.can_update_role(&self.identity, &role).await {
            return Err(DirectoryError::NoPermission);
        }

        self.store.merge_by_id(role_id, target_role_id).await?;
        info!(role_id, target_role_id, "role merged");
        Ok(())
    }

    /// Move this role to another organisational container.
    pub async fn move_to_organisation(&self, role_id: u64, organisation_id: u64) -> Result<()> {
        let role = self.find_role(role_id).await?;

        if organisation_id == 0 {
            return Err(DirectoryError::InvalidId);
        }
        if !self.access.can_update_role(&self.identity, &role).await {
            return Err(DirectoryError::NoPermission);
        }

        self.store.move_by_id(role_id, organisation_id).await?;
        info!(role_id, organisation_id, "role moved");
        Ok(())
    }

    /// All memberships for a user. Deliberately ungated: the listing is
    /// keyed by user and consumed while assembling that user's own session.
    pub async fn membership(&self, user_id: u64) -> Result<Vec<RoleMember>> {
        self.store.memberships_by_user(user_id).await
    }

    /// Members of a role, behind the same read gate as
    /// [`RoleService::find_by_id`].
    pub async fn member_list(&self, role_id: u64) -> Result<Vec<RoleMember>> {
        self.find_role(role_id).await?;
        self.store.members_by_role(role_id).await
    }

    /// Add a user to a role. Requires the dedicated member-management
    /// capability, distinct from generic update.
    pub async fn member_add(&self, role_id: u64, user_id: u64) -> Result<()> {
        let role = self.find_role(role_id).await?;

        if user_id == 0 {
            return Err(DirectoryError::InvalidId);
        }
        if !self
            .access
            .can_manage_role_members(&self.identity, &role)
            .await
        {
            return Err(DirectoryError::not_allowed(
                "not allowed to manage role members",
            ));
        }

        self.store.member_add(role_id, user_id).await?;
        info!(role_id, user_id, "role member added");
        Ok(())
    }

    pub async fn member_remove(&self, role_id: u64, user_id: u64) -> Result<()> {
        let role = self.find_role(role_id).await?;

        if user_id == 0 {
            return Err(DirectoryError::InvalidId);
        }
        if !self
            .access
            .can_manage_role_members(&self.identity, &role)
            .await
        {
            return Err(DirectoryError::not_allowed(
                "not allowed to manage role members",
            ));
        }

        self.store.member_remove(role_id, user_id).await?;
        info!(role_id, user_id, "role member removed");
        Ok(())
    }
}
