//! Grove Directory
//!
//! Role lifecycle & access-control service for hierarchical, named
//! organizational roles and their user memberships:
//! - Every mutation is gated by a pluggable capability check
//! - Name and handle uniqueness enforced inside one transaction
//! - Reversible soft lifecycle state (archive / delete), plus merge and move
//! - Row-level read scoping injected into every search
//!
//! ## Module Organization
//!
//! - `role` - entities, the repository port, stores, and the service
//! - `access` - the acting identity and the capability-check port
//! - `shared` - errors, handle validation, ID generation

pub mod access;
pub mod role;
pub mod shared;

// Re-export common types from shared
pub use shared::error::{DirectoryError, Result};

// Re-export the acting identity and the access-control port
pub use access::context::AuthContext;
pub use access::control::{permissions, PermissionAccessControl, RoleAccessControl};

// Re-export the role aggregate
pub use role::entity::{Role, RoleAccessScope, RoleFilter, RoleMember, StateFilter};
pub use role::memory::MemoryRoleStore;
pub use role::repository::{RoleStore, RoleStoreTx};
pub use role::service::RoleService;
pub use role::store::{initialize_indexes, MongoRoleStore};
