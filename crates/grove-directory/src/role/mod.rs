//! Role Aggregate
//!
//! Role lifecycle, membership, and search.

pub mod entity;
pub mod memory;
pub mod repository;
pub mod service;
pub mod store;

pub use entity::{Role, RoleAccessScope, RoleFilter, RoleMember, StateFilter};
pub use memory::MemoryRoleStore;
pub use repository::{RoleStore, RoleStoreTx};
pub use service::RoleService;
pub use store::MongoRoleStore;
