//! Access-Control Port
//!
//! Capability checks consumed by the role service. Each check is a boolean
//! query keyed by the acting identity and, where relevant, the target role.
//! Deployments plug in their own policy engine by implementing
//! [`RoleAccessControl`]; the service never hard-codes a decision.

use async_trait::async_trait;

use crate::access::context::AuthContext;
use crate::role::entity::{Role, RoleAccessScope};

/// Permission strings understood by [`PermissionAccessControl`].
pub mod permissions {
    /// Coarse capability over restricted views (archived/deleted listings).
    pub const DIRECTORY_ACCESS: &str = "directory:access";

    pub const ROLE_READ: &str = "directory:role:read";
    pub const ROLE_CREATE: &str = "directory:role:create";
    pub const ROLE_UPDATE: &str = "directory:role:update";
    pub const ROLE_DELETE: &str = "directory:role:delete";
    pub const ROLE_MANAGE_MEMBERS: &str = "directory:role:manage-members";

    /// Superuser permission (grants all access)
    pub const ADMIN_ALL: &str = "*:*";

    /// All directory permissions
    pub const ALL: &[&str] = &[
        DIRECTORY_ACCESS,
        ROLE_READ,
        ROLE_CREATE,
        ROLE_UPDATE,
        ROLE_DELETE,
        ROLE_MANAGE_MEMBERS,
    ];
}

/// Capability checks for role operations.
///
/// Checks are pure reads; no lock is held across them. Implementations may
/// consult external policy stores, hence async.
#[async_trait]
pub trait RoleAccessControl: Send + Sync {
    /// Coarse capability gating restricted views (archived/deleted listings).
    async fn can_access(&self, identity: &AuthContext) -> bool;

    async fn can_create_role(&self, identity: &AuthContext) -> bool;
    async fn can_read_role(&self, identity: &AuthContext, role: &Role) -> bool;
    async fn can_update_role(&self, identity: &AuthContext, role: &Role) -> bool;
    async fn can_delete_role(&self, identity: &AuthContext, role: &Role) -> bool;
    async fn can_manage_role_members(&self, identity: &AuthContext, role: &Role) -> bool;

    /// Read-visibility scope the service injects into every search filter
    /// before the store is consulted.
    async fn readable_roles(&self, identity: &AuthContext) -> RoleAccessScope;
}

/// Access control backed by the identity's resolved permission set.
#[derive(Debug, Clone, Copy, Default)]
pub struct PermissionAccessControl;

impl PermissionAccessControl {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl RoleAccessControl for PermissionAccessControl {
    async fn can_access(&self, identity: &AuthContext) -> bool {
        identity.has_permission(permissions::DIRECTORY_ACCESS)
    }

    async fn can_create_role(&self, identity: &AuthContext) -> bool {
        identity.has_permission(permissions::ROLE_CREATE)
    }

    async fn can_read_role(&self, identity: &AuthContext, _role: &Role) -> bool {
        identity.has_permission(permissions::ROLE_READ)
    }

    async fn can_update_role(&self, identity: &AuthContext, _role: &Role) -> bool {
        identity.has_permission(permissions::ROLE_UPDATE)
    }

    async fn can_delete_role(&self, identity: &AuthContext, _role: &Role) -> bool {
        identity.has_permission(permissions::ROLE_DELETE)
    }

    async fn can_manage_role_members(&self, identity: &AuthContext, _role: &Role) -> bool {
        identity.has_permission(permissions::ROLE_MANAGE_MEMBERS)
    }

    async fn readable_roles(&self, identity: &AuthContext) -> RoleAccessScope {
        if identity.has_permission(permissions::ROLE_READ) {
            RoleAccessScope::Any
        } else {
            RoleAccessScope::Only(Default::default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn role() -> Role {
        Role::new("Admins", "admins")
    }

    #[tokio::test]
    async fn test_permission_checks() {
        let ac = PermissionAccessControl::new();
        let reader = AuthContext::new(7, "reader").with_permission(permissions::ROLE_READ);

        assert!(ac.can_read_role(&reader, &role()).await);
        assert!(!ac.can_update_role(&reader, &role()).await);
        assert!(!ac.can_access(&reader).await);
        assert_eq!(ac.readable_roles(&reader).await, RoleAccessScope::Any);
    }

    #[tokio::test]
    async fn test_no_permissions_scopes_to_nothing() {
        let ac = PermissionAccessControl::new();
        let nobody = AuthContext::anonymous();

        assert!(!ac.can_read_role(&nobody, &role()).await);
        assert!(!ac.readable_roles(&nobody).await.allows(42));
    }
}
