//! Role Entities
//!
//! Organizational roles, membership links, and the search filter.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A named organizational role.
///
/// `name` and `handle`, when non-empty, are unique across all roles. A role
/// with `id == 0` has not been persisted; stores assign the ID on create.
/// Archive and delete are reversible soft states carried as timestamps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Role {
    /// Numeric identity; 0 marks an unsaved role.
    #[serde(default)]
    pub id: u64,

    /// Human-readable name, unique when non-empty.
    pub name: String,

    /// Machine-safe identifier, unique when non-empty.
    pub handle: String,

    /// Organisational container the role belongs to.
    #[serde(default)]
    pub organisation_id: u64,

    pub created_at: DateTime<Utc>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub archived_at: Option<DateTime<Utc>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Role {
    pub fn new(name: impl Into<String>, handle: impl Into<String>) -> Self {
        Self {
            id: 0,
            name: name.into(),
            handle: handle.into(),
            organisation_id: 0,
            created_at: Utc::now(),
            updated_at: None,
            archived_at: None,
            deleted_at: None,
        }
    }

    pub fn with_organisation(mut self, organisation_id: u64) -> Self {
        self.organisation_id = organisation_id;
        self
    }

    pub fn is_archived(&self) -> bool {
        self.archived_at.is_some()
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

/// Link between a role and a user. No lifecycle of its own beyond the
/// existence of the link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleMember {
    pub role_id: u64,
    pub user_id: u64,
}

/// Which lifecycle states a search returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StateFilter {
    /// Live roles only.
    #[default]
    Active,
    /// Archived roles that are not deleted.
    Archived,
    /// Soft-deleted roles.
    Deleted,
}

impl StateFilter {
    /// Archived and deleted listings require the coarse access capability.
    pub fn is_restricted(&self) -> bool {
        !matches!(self, Self::Active)
    }
}

/// Read-visibility scope produced by the access-control layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoleAccessScope {
    /// Every role is readable.
    Any,
    /// Only the listed role IDs are readable.
    Only(HashSet<u64>),
}

impl RoleAccessScope {
    pub fn allows(&self, role_id: u64) -> bool {
        match self {
            Self::Any => true,
            Self::Only(ids) => ids.contains(&role_id),
        }
    }
}

/// Search filter for roles.
///
/// The read scope is injected by the role service, never decoded from a
/// caller: `readable` is skipped by serde, so a deserialized filter cannot
/// widen its own visibility.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RoleFilter {
    /// Case-insensitive match against name or handle.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,

    /// Exact handle match.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub handle: Option<String>,

    /// Lifecycle visibility.
    pub state: StateFilter,

    /// Injected read scope; `None` only outside the service.
    #[serde(skip)]
    pub readable: Option<RoleAccessScope>,
}

impl RoleFilter {
    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }

    pub fn with_handle(mut self, handle: impl Into<String>) -> Self {
        self.handle = Some(handle.into());
        self
    }

    pub fn with_state(mut self, state: StateFilter) -> Self {
        self.state = state;
        self
    }

    /// Whether the role satisfies every criterion, including the injected
    /// read scope.
    pub fn matches(&self, role: &Role) -> bool {
        let state_ok = match self.state {
            StateFilter::Active => !role.is_archived() && !role.is_deleted(),
            StateFilter::Archived => role.is_archived() && !role.is_deleted(),
            StateFilter::Deleted => role.is_deleted(),
        };
        if !state_ok {
            return false;
        }

        if let Some(handle) = &self.handle {
            if !role.handle.eq_ignore_ascii_case(handle) {
                return false;
            }
        }

        if let Some(query) = &self.query {
            let q = query.to_lowercase();
            if !role.name.to_lowercase().contains(&q) && !role.handle.to_lowercase().contains(&q) {
                return false;
            }
        }

        match &self.readable {
            Some(scope) => scope.allows(role.id),
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn saved(id: u64, name: &str, handle: &str) -> Role {
        let mut role = Role::new(name, handle);
        role.id = id;
        role
    }

    #[test]
    fn test_default_filter_excludes_soft_state() {
        let filter = RoleFilter::default();
        let mut role = saved(1, "Admins", "admins");
        assert!(filter.matches(&role));

        role.archived_at = Some(Utc::now());
        assert!(!filter.matches(&role));

        role.archived_at = None;
        role.deleted_at = Some(Utc::now());
        assert!(!filter.matches(&role));
    }

    #[test]
    fn test_archived_filter_excludes_deleted() {
        let filter = RoleFilter::default().with_state(StateFilter::Archived);
        let mut role = saved(1, "Admins", "admins");
        role.archived_at = Some(Utc::now());
        assert!(filter.matches(&role));

        role.deleted_at = Some(Utc::now());
        assert!(!filter.matches(&role));
    }

    #[test]
    fn test_query_matches_name_or_handle() {
        let role = saved(1, "Team Leads", "team-leads");
        assert!(RoleFilter::default().with_query("leads").matches(&role));
        assert!(RoleFilter::default().with_query("TEAM-").matches(&role));
        assert!(!RoleFilter::default().with_query("admin").matches(&role));
    }

    #[test]
    fn test_scope_restricts_matches() {
        let role = saved(9, "Admins", "admins");
        let mut filter = RoleFilter::default();
        filter.readable = Some(RoleAccessScope::Only([9].into_iter().collect()));
        assert!(filter.matches(&role));

        filter.readable = Some(RoleAccessScope::Only(Default::default()));
        assert!(!filter.matches(&role));
    }

    #[test]
    fn test_scope_never_decoded_from_callers() {
        let json = r#"{"query":"admin","state":"DELETED"}"#;
        let filter: RoleFilter = serde_json::from_str(json).unwrap();
        assert_eq!(filter.state, StateFilter::Deleted);
        assert!(filter.readable.is_none());
    }
}
