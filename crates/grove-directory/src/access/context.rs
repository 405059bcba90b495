//! Acting Identity
//!
//! Opaque identity context carried through a service instance. The embedding
//! application builds it from its own session/claims layer; this crate never
//! authenticates anyone.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

/// The identity performing directory operations, with its resolved
/// permission strings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthContext {
    /// Principal performing the action (0 for anonymous).
    pub principal_id: u64,

    /// Display name, used in logging.
    pub name: String,

    /// Resolved permission strings.
    #[serde(default)]
    pub permissions: HashSet<String>,
}

impl AuthContext {
    pub fn new(principal_id: u64, name: impl Into<String>) -> Self {
        Self {
            principal_id,
            name: name.into(),
            permissions: HashSet::new(),
        }
    }

    /// Identity with no principal and no permissions.
    pub fn anonymous() -> Self {
        Self::new(0, "anonymous")
    }

    /// Internal identity holding every permission.
    pub fn system() -> Self {
        Self::new(1, "system").with_permission(crate::access::control::permissions::ADMIN_ALL)
    }

    pub fn with_permission(mut self, permission: impl Into<String>) -> Self {
        self.permissions.insert(permission.into());
        self
    }

    pub fn with_permissions(
        mut self,
        permissions: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        for p in permissions {
            self.permissions.insert(p.into());
        }
        self
    }

    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions.contains(permission) || self.has_wildcard_permission(permission)
    }

    pub fn has_any_permission(&self, required: &[&str]) -> bool {
        required.iter().any(|p| self.has_permission(p))
    }

    /// Check for wildcard permissions.
    /// Supports hierarchical wildcards for format: directory:entity:action
    /// Examples:
    ///   - "*:*" matches everything (superuser)
    ///   - "directory:*" matches all directory permissions
    ///   - "directory:role:*" matches all role operations
    fn has_wildcard_permission(&self, permission: &str) -> bool {
        if self.permissions.contains("*:*") {
            return true;
        }

        let parts: Vec<&str> = permission.split(':').collect();
        if parts.is_empty() {
            return false;
        }

        let mut prefix = String::new();
        for (i, part) in parts.iter().enumerate() {
            if i > 0 {
                prefix.push(':');
            }
            prefix.push_str(part);

            // Don't check wildcard for the full permission (last part)
            if i < parts.len() - 1 {
                let wildcard = format!("{}:*", prefix);
                if self.permissions.contains(&wildcard) {
                    return true;
                }
            }
        }

        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::control::permissions;

    #[test]
    fn test_direct_permission() {
        let ctx = AuthContext::new(42, "alex").with_permission(permissions::ROLE_READ);
        assert!(ctx.has_permission(permissions::ROLE_READ));
        assert!(!ctx.has_permission(permissions::ROLE_UPDATE));
    }

    #[test]
    fn test_wildcard_permission() {
        let ctx = AuthContext::new(42, "alex").with_permission("directory:role:*");
        assert!(ctx.has_permission(permissions::ROLE_READ));
        assert!(ctx.has_permission(permissions::ROLE_DELETE));
        assert!(!ctx.has_permission(permissions::DIRECTORY_ACCESS));
    }

    #[test]
    fn test_superuser_permission() {
        let ctx = AuthContext::system();
        assert!(ctx.has_permission(permissions::ROLE_CREATE));
        assert!(ctx.has_permission(permissions::DIRECTORY_ACCESS));
        assert!(ctx.has_permission("anything:everything"));
    }

    #[test]
    fn test_anonymous_has_nothing() {
        let ctx = AuthContext::anonymous();
        assert_eq!(ctx.principal_id, 0);
        assert!(!ctx.has_permission(permissions::ROLE_READ));
    }
}
