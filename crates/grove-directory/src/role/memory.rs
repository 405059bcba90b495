//! In-Memory Role Store
//!
//! Backs the test suite and local development without a MongoDB deployment.
//! Transactions snapshot the role table on `begin` and re-validate staged
//! writes against live state on `commit`, which reproduces the uniqueness
//! behavior of the production indexes: of two racing creates for one handle,
//! the second commit fails.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;

use crate::role::entity::{Role, RoleFilter, RoleMember};
use crate::role::repository::{RoleStore, RoleStoreTx};
use crate::shared::error::{DirectoryError, Result};
use crate::shared::id;

#[derive(Default)]
struct State {
    roles: HashMap<u64, Role>,
    members: Vec<RoleMember>,
}

/// Role store holding everything in process memory.
#[derive(Clone, Default)]
pub struct MemoryRoleStore {
    state: Arc<Mutex<State>>,
}

impl MemoryRoleStore {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Reject a role whose non-empty handle or name is owned by a different ID.
/// Handle is checked before name.
fn check_unique(roles: &HashMap<u64, Role>, candidate: &Role) -> Result<()> {
    if !candidate.handle.is_empty()
        && roles
            .values()
            .any(|r| r.id != candidate.id && r.handle == candidate.handle)
    {
        return Err(DirectoryError::HandleNotUnique);
    }
    if !candidate.name.is_empty()
        && roles
            .values()
            .any(|r| r.id != candidate.id && r.name == candidate.name)
    {
        return Err(DirectoryError::NameNotUnique);
    }
    Ok(())
}

#[async_trait]
impl RoleStore for MemoryRoleStore {
    type Tx = MemoryRoleTx;

    async fn begin(&self) -> Result<MemoryRoleTx> {
        let snapshot = self.state.lock().unwrap().roles.clone();
        Ok(MemoryRoleTx {
            state: Arc::clone(&self.state),
            snapshot,
            staged: Vec::new(),
        })
    }

    async fn find_by_id(&self, id: u64) -> Result<Option<Role>> {
        Ok(self.state.lock().unwrap().roles.get(&id).cloned())
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<Role>> {
        let state = self.state.lock().unwrap();
        Ok(state.roles.values().find(|r| r.name == name).cloned())
    }

    async fn find_by_handle(&self, handle: &str) -> Result<Option<Role>> {
        let state = self.state.lock().unwrap();
        Ok(state.roles.values().find(|r| r.handle == handle).cloned())
    }

    async fn search(&self, filter: &RoleFilter) -> Result<Vec<Role>> {
        let state = self.state.lock().unwrap();
        let mut out: Vec<Role> = state
            .roles
            .values()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect();
        out.sort_by_key(|r| r.id);
        Ok(out)
    }

    async fn archive_by_id(&self, id: u64) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let role = state.roles.get_mut(&id).ok_or(DirectoryError::NotFound)?;
        role.archived_at.get_or_insert_with(Utc::now);
        Ok(())
    }

    async fn unarchive_by_id(&self, id: u64) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let role = state.roles.get_mut(&id).ok_or(DirectoryError::NotFound)?;
        role.archived_at = None;
        Ok(())
    }

    async fn delete_by_id(&self, id: u64) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let role = state.roles.get_mut(&id).ok_or(DirectoryError::NotFound)?;
        role.deleted_at.get_or_insert_with(Utc::now);
        Ok(())
    }

    async fn undelete_by_id(&self, id: u64) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let role = state.roles.get_mut(&id).ok_or(DirectoryError::NotFound)?;
        role.deleted_at = None;
        Ok(())
    }

    async fn merge_by_id(&self, role_id: u64, target_role_id: u64) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if !state.roles.contains_key(&target_role_id) {
            return Err(DirectoryError::NotFound);
        }
        let source = state
            .roles
            .get_mut(&role_id)
            .ok_or(DirectoryError::NotFound)?;
        source.deleted_at.get_or_insert_with(Utc::now);

        let moved: Vec<u64> = state
            .members
            .iter()
            .filter(|m| m.role_id == role_id)
            .map(|m| m.user_id)
            .collect();
        state.members.retain(|m| m.role_id != role_id);
        for user_id in moved {
            if !state
                .members
                .iter()
                .any(|m| m.role_id == target_role_id && m.user_id == user_id)
            {
                state.members.push(RoleMember {
                    role_id: target_role_id,
                    user_id,
                });
            }
        }
        Ok(())
    }

    async fn move_by_id(&self, role_id: u64, organisation_id: u64) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let role = state
            .roles
            .get_mut(&role_id)
            .ok_or(DirectoryError::NotFound)?;
        role.organisation_id = organisation_id;
        role.updated_at = Some(Utc::now());
        Ok(())
    }

    async fn memberships_by_user(&self, user_id: u64) -> Result<Vec<RoleMember>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .members
            .iter()
            .filter(|m| m.user_id == user_id)
            .copied()
            .collect())
    }

    async fn members_by_role(&self, role_id: u64) -> Result<Vec<RoleMember>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .members
            .iter()
            .filter(|m| m.role_id == role_id)
            .copied()
            .collect())
    }

    async fn member_add(&self, role_id: u64, user_id: u64) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if !state
            .members
            .iter()
            .any(|m| m.role_id == role_id && m.user_id == user_id)
        {
            state.members.push(RoleMember { role_id, user_id });
        }
        Ok(())
    }

    async fn member_remove(&self, role_id: u64, user_id: u64) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state
            .members
            .retain(|m| !(m.role_id == role_id && m.user_id == user_id));
        Ok(())
    }
}

/// One open transaction: reads come from the snapshot, writes stage locally
/// and apply on commit after re-validation against live state.
pub struct MemoryRoleTx {
    state: Arc<Mutex<State>>,
    snapshot: HashMap<u64, Role>,
    staged: Vec<Role>,
}

#[async_trait]
impl RoleStoreTx for MemoryRoleTx {
    async fn find_by_id(&mut self, id: u64) -> Result<Option<Role>> {
        Ok(self.snapshot.get(&id).cloned())
    }

    async fn find_by_name(&mut self, name: &str) -> Result<Option<Role>> {
        Ok(self.snapshot.values().find(|r| r.name == name).cloned())
    }

    async fn find_by_handle(&mut self, handle: &str) -> Result<Option<Role>> {
        Ok(self.snapshot.values().find(|r| r.handle == handle).cloned())
    }

    async fn create(&mut self, mut role: Role) -> Result<Role> {
        check_unique(&self.snapshot, &role)?;
        role.id = id::next_id();
        role.created_at = Utc::now();
        self.snapshot.insert(role.id, role.clone());
        self.staged.push(role.clone());
        Ok(role)
    }

    async fn update(&mut self, mut role: Role) -> Result<Role> {
        if !self.snapshot.contains_key(&role.id) {
            return Err(DirectoryError::NotFound);
        }
        check_unique(&self.snapshot, &role)?;
        role.updated_at = Some(Utc::now());
        self.snapshot.insert(role.id, role.clone());
        self.staged.push(role.clone());
        Ok(role)
    }

    async fn commit(self) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        // Re-validate against live state: another transaction may have
        // committed since this one took its snapshot.
        for role in &self.staged {
            check_unique(&state.roles, role)?;
        }
        for role in self.staged {
            state.roles.insert(role.id, role);
        }
        Ok(())
    }

    async fn abort(self) -> Result<()> {
        Ok(())
    }
}
