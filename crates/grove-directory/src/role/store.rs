//! MongoDB Role Store
//!
//! Production implementation of the repository port. Create/update run
//! inside a client-session transaction; unique indexes on role name and
//! handle are the persistence-level backstop for the service's uniqueness
//! checks, so two racing creates for one handle cannot both commit.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use mongodb::{
    bson::{doc, Bson, Document},
    options::IndexOptions,
    Client, ClientSession, Collection, Database, IndexModel,
};
use tracing::{debug, info};

use crate::role::entity::{Role, RoleFilter, RoleMember, StateFilter};
use crate::role::repository::{RoleStore, RoleStoreTx};
use crate::shared::error::{DirectoryError, Result};
use crate::shared::id;

const ROLES: &str = "roles";
const MEMBERS: &str = "role_members";

const IDX_ROLE_HANDLE: &str = "uq_role_handle";
const IDX_ROLE_NAME: &str = "uq_role_name";
const IDX_ROLE_MEMBER: &str = "uq_role_member";

/// Role store backed by MongoDB.
///
/// Requires a replica-set deployment (transactions) and the indexes from
/// [`initialize_indexes`].
#[derive(Clone)]
pub struct MongoRoleStore {
    client: Client,
    roles: Collection<Document>,
    members: Collection<Document>,
}

impl MongoRoleStore {
    pub fn new(client: Client, database: &Database) -> Self {
        Self {
            client,
            roles: database.collection(ROLES),
            members: database.collection(MEMBERS),
        }
    }

    async fn find_one(&self, query: Document) -> Result<Option<Role>> {
        self.roles
            .find_one(query)
            .await?
            .map(|doc| role_from_document(&doc))
            .transpose()
    }

    /// Apply an update to one role, reporting `NotFound` for unknown IDs.
    async fn mark(&self, id: u64, update: Document) -> Result<()> {
        let result = self
            .roles
            .update_one(doc! { "_id": id as i64 }, update)
            .await?;
        if result.matched_count == 0 {
            return Err(DirectoryError::NotFound);
        }
        Ok(())
    }

    async fn merge_in_session(
        &self,
        session: &mut ClientSession,
        role_id: u64,
        target_role_id: u64,
        moved: Vec<RoleMember>,
    ) -> Result<()> {
        let target = self
            .roles
            .find_one(doc! { "_id": target_role_id as i64 })
            .session(&mut *session)
            .await?;
        if target.is_none() {
            return Err(DirectoryError::NotFound);
        }

        for member in moved {
            self.members
                .insert_one(member_to_document(target_role_id, member.user_id))
                .session(&mut *session)
                .await
                .map_err(map_write_error)?;
        }

        self.members
            .delete_many(doc! { "role_id": role_id as i64 })
            .session(&mut *session)
            .await?;

        let result = self
            .roles
            .update_one(
                doc! { "_id": role_id as i64 },
                doc! { "$set": { "deleted_at": mongodb::bson::DateTime::now() } },
            )
            .session(&mut *session)
            .await?;
        if result.matched_count == 0 {
            return Err(DirectoryError::NotFound);
        }

        Ok(())
    }
}

#[async_trait]
impl RoleStore for MongoRoleStore {
    type Tx = MongoRoleTx;

    async fn begin(&self) -> Result<MongoRoleTx> {
        let mut session = self.client.start_session().await?;
        session.start_transaction().await?;
        Ok(MongoRoleTx {
            session,
            roles: self.roles.clone(),
        })
    }

    async fn find_by_id(&self, id: u64) -> Result<Option<Role>> {
        self.find_one(doc! { "_id": id as i64 }).await
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<Role>> {
        self.find_one(doc! { "name": name }).await
    }

    async fn find_by_handle(&self, handle: &str) -> Result<Option<Role>> {
        self.find_one(doc! { "handle": handle }).await
    }

    async fn search(&self, filter: &RoleFilter) -> Result<Vec<Role>> {
        let mut query = match filter.state {
            StateFilter::Active => doc! {
                "archived_at": Bson::Null,
                "deleted_at": Bson::Null,
            },
            StateFilter::Archived => doc! {
                "archived_at": { "$ne": Bson::Null },
                "deleted_at": Bson::Null,
            },
            StateFilter::Deleted => doc! {
                "deleted_at": { "$ne": Bson::Null },
            },
        };
        if let Some(handle) = &filter.handle {
            query.insert("handle", handle.as_str());
        }

        let mut cursor = self.roles.find(query).await?;
        let mut out = Vec::new();
        while let Some(doc) = cursor.try_next().await? {
            let role = role_from_document(&doc)?;
            // Query text and read scope are applied here rather than pushed
            // into the server query.
            if filter.matches(&role) {
                out.push(role);
            }
        }
        Ok(out)
    }

    async fn archive_by_id(&self, id: u64) -> Result<()> {
        self.mark(
            id,
            doc! { "$set": { "archived_at": mongodb::bson::DateTime::now() } },
        )
        .await
    }

    async fn unarchive_by_id(&self, id: u64) -> Result<()> {
        self.mark(id, doc! { "$unset": { "archived_at": "" } }).await
    }

    async fn delete_by_id(&self, id: u64) -> Result<()> {
        self.mark(
            id,
            doc! { "$set": { "deleted_at": mongodb::bson::DateTime::now() } },
        )
        .await
    }

    async fn undelete_by_id(&self, id: u64) -> Result<()> {
        self.mark(id, doc! { "$unset": { "deleted_at": "" } }).await
    }

    async fn merge_by_id(&self, role_id: u64, target_role_id: u64) -> Result<()> {
        let source_members = self.members_by_role(role_id).await?;
        let target_members = self.members_by_role(target_role_id).await?;
        let moved: Vec<RoleMember> = source_members
            .into_iter()
            .filter(|m| !target_members.iter().any(|t| t.user_id == m.user_id))
            .collect();

        let mut session = self.client.start_session().await?;
        session.start_transaction().await?;

        match self
            .merge_in_session(&mut session, role_id, target_role_id, moved)
            .await
        {
            Ok(()) => {
                session.commit_transaction().await?;
                info!(role_id, target_role_id, "merged role");
                Ok(())
            }
            Err(err) => {
                let _ = session.abort_transaction().await;
                Err(err)
            }
        }
    }

    async fn move_by_id(&self, role_id: u64, organisation_id: u64) -> Result<()> {
        self.mark(
            role_id,
            doc! { "$set": {
                "organisation_id": organisation_id as i64,
                "updated_at": mongodb::bson::DateTime::now(),
            } },
        )
        .await
    }

    async fn memberships_by_user(&self, user_id: u64) -> Result<Vec<RoleMember>> {
        let mut cursor = self
            .members
            .find(doc! { "user_id": user_id as i64 })
            .await?;
        let mut out = Vec::new();
        while let Some(doc) = cursor.try_next().await? {
            out.push(member_from_document(&doc)?);
        }
        Ok(out)
    }

    async fn members_by_role(&self, role_id: u64) -> Result<Vec<RoleMember>> {
        let mut cursor = self
            .members
            .find(doc! { "role_id": role_id as i64 })
            .await?;
        let mut out = Vec::new();
        while let Some(doc) = cursor.try_next().await? {
            out.push(member_from_document(&doc)?);
        }
        Ok(out)
    }

    async fn member_add(&self, role_id: u64, user_id: u64) -> Result<()> {
        self.members
            .update_one(
                doc! { "role_id": role_id as i64, "user_id": user_id as i64 },
                doc! { "$setOnInsert": member_to_document(role_id, user_id) },
            )
            .upsert(true)
            .await?;
        Ok(())
    }

    async fn member_remove(&self, role_id: u64, user_id: u64) -> Result<()> {
        self.members
            .delete_one(doc! { "role_id": role_id as i64, "user_id": user_id as i64 })
            .await?;
        Ok(())
    }
}

/// One open MongoDB transaction over the roles collection.
pub struct MongoRoleTx {
    session: ClientSession,
    roles: Collection<Document>,
}

impl MongoRoleTx {
    async fn find_one(&mut self, query: Document) -> Result<Option<Role>> {
        self.roles
            .find_one(query)
            .session(&mut self.session)
            .await?
            .map(|doc| role_from_document(&doc))
            .transpose()
    }
}

#[async_trait]
impl RoleStoreTx for MongoRoleTx {
    async fn find_by_id(&mut self, id: u64) -> Result<Option<Role>> {
        self.find_one(doc! { "_id": id as i64 }).await
    }

    async fn find_by_name(&mut self, name: &str) -> Result<Option<Role>> {
        self.find_one(doc! { "name": name }).await
    }

    async fn find_by_handle(&mut self, handle: &str) -> Result<Option<Role>> {
        self.find_one(doc! { "handle": handle }).await
    }

    async fn create(&mut self, mut role: Role) -> Result<Role> {
        role.id = id::next_id();
        role.created_at = Utc::now();
        self.roles
            .insert_one(role_to_document(&role))
            .session(&mut self.session)
            .await
            .map_err(map_write_error)?;
        Ok(role)
    }

    async fn update(&mut self, mut role: Role) -> Result<Role> {
        role.updated_at = Some(Utc::now());
        let result = self
            .roles
            .replace_one(doc! { "_id": role.id as i64 }, role_to_document(&role))
            .session(&mut self.session)
            .await
            .map_err(map_write_error)?;
        if result.matched_count == 0 {
            return Err(DirectoryError::NotFound);
        }
        Ok(role)
    }

    async fn commit(mut self) -> Result<()> {
        self.session
            .commit_transaction()
            .await
            .map_err(map_write_error)?;
        debug!("committed role transaction");
        Ok(())
    }

    async fn abort(mut self) -> Result<()> {
        self.session.abort_transaction().await?;
        Ok(())
    }
}

/// Create the directory indexes. Run once on application startup.
pub async fn initialize_indexes(db: &Database) -> std::result::Result<(), mongodb::error::Error> {
    let roles = db.collection::<Document>(ROLES);

    roles
        .create_index(
            IndexModel::builder()
                .keys(doc! { "handle": 1 })
                .options(
                    IndexOptions::builder()
                        .name(IDX_ROLE_HANDLE.to_string())
                        .unique(true)
                        .background(true)
                        .build(),
                )
                .build(),
        )
        .await?;

    // Partial: empty names stay non-unique, named roles must not collide.
    roles
        .create_index(
            IndexModel::builder()
                .keys(doc! { "name": 1 })
                .options(
                    IndexOptions::builder()
                        .name(IDX_ROLE_NAME.to_string())
                        .unique(true)
                        .partial_filter_expression(doc! { "name": { "$gt": "" } })
                        .background(true)
                        .build(),
                )
                .build(),
        )
        .await?;

    let members = db.collection::<Document>(MEMBERS);

    members
        .create_index(
            IndexModel::builder()
                .keys(doc! { "role_id": 1, "user_id": 1 })
                .options(
                    IndexOptions::builder()
                        .name(IDX_ROLE_MEMBER.to_string())
                        .unique(true)
                        .background(true)
                        .build(),
                )
                .build(),
        )
        .await?;

    members
        .create_index(
            IndexModel::builder()
                .keys(doc! { "user_id": 1 })
                .options(IndexOptions::builder().background(true).build())
                .build(),
        )
        .await?;

    info!("Created indexes on roles, role_members");
    Ok(())
}

/// Translate duplicate-key write failures into the uniqueness error kinds.
fn map_write_error(err: mongodb::error::Error) -> DirectoryError {
    use mongodb::error::{ErrorKind, WriteFailure};

    if let ErrorKind::Write(WriteFailure::WriteError(write_error)) = err.kind.as_ref() {
        if write_error.code == 11000 {
            if write_error.message.contains(IDX_ROLE_HANDLE) {
                return DirectoryError::HandleNotUnique;
            }
            if write_error.message.contains(IDX_ROLE_NAME) {
                return DirectoryError::NameNotUnique;
            }
        }
    }
    err.into()
}

fn role_to_document(role: &Role) -> Document {
    let mut doc = doc! {
        "_id": role.id as i64,
        "name": &role.name,
        "handle": &role.handle,
        "organisation_id": role.organisation_id as i64,
        "created_at": mongodb::bson::DateTime::from_chrono(role.created_at),
    };
    if let Some(at) = role.updated_at {
        doc.insert("updated_at", mongodb::bson::DateTime::from_chrono(at));
    }
    if let Some(at) = role.archived_at {
        doc.insert("archived_at", mongodb::bson::DateTime::from_chrono(at));
    }
    if let Some(at) = role.deleted_at {
        doc.insert("deleted_at", mongodb::bson::DateTime::from_chrono(at));
    }
    doc
}

fn role_from_document(doc: &Document) -> Result<Role> {
    Ok(Role {
        id: doc.get_i64("_id").map_err(malformed)? as u64,
        name: doc.get_str("name").map_err(malformed)?.to_string(),
        handle: doc.get_str("handle").map_err(malformed)?.to_string(),
        organisation_id: doc.get_i64("organisation_id").unwrap_or(0) as u64,
        created_at: doc.get_datetime("created_at").map_err(malformed)?.to_chrono(),
        updated_at: optional_datetime(doc, "updated_at"),
        archived_at: optional_datetime(doc, "archived_at"),
        deleted_at: optional_datetime(doc, "deleted_at"),
    })
}

fn member_to_document(role_id: u64, user_id: u64) -> Document {
    doc! { "role_id": role_id as i64, "user_id": user_id as i64 }
}

fn member_from_document(doc: &Document) -> Result<RoleMember> {
    Ok(RoleMember {
        role_id: doc.get_i64("role_id").map_err(malformed)? as u64,
        user_id: doc.get_i64("user_id").map_err(malformed)? as u64,
    })
}

fn optional_datetime(doc: &Document, key: &str) -> Option<DateTime<Utc>> {
    doc.get_datetime(key).ok().map(|at| at.to_chrono())
}

fn malformed(err: mongodb::bson::document::ValueAccessError) -> DirectoryError {
    DirectoryError::store(format!("malformed document: {err}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_document_round_trip() {
        let mut role = Role::new("Admins", "admins").with_organisation(7);
        role.id = 42;
        role.archived_at = Some(Utc::now());

        let restored = role_from_document(&role_to_document(&role)).unwrap();
        assert_eq!(restored.id, 42);
        assert_eq!(restored.name, "Admins");
        assert_eq!(restored.handle, "admins");
        assert_eq!(restored.organisation_id, 7);
        assert!(restored.is_archived());
        assert!(!restored.is_deleted());
        assert_eq!(
            restored.created_at.timestamp_millis(),
            role.created_at.timestamp_millis()
        );
    }

    #[test]
    fn test_member_document_round_trip() {
        let member = member_from_document(&member_to_document(5, 9)).unwrap();
        assert_eq!(member, RoleMember { role_id: 5, user_id: 9 });
    }
}
