//! MongoDB administrative backend.
//!
//! Issues the replica set and user management commands against the
//! `admin` database over a direct connection to the configured primary
//! node.  Driver failures are converted to [`AdminError`] (and thereby
//! classified) by the `?` operator at each call.

use std::sync::Arc;

use bson::{doc, Bson, Document};
use mongodb::options::InsertManyOptions;
use mongodb::{Client, Collection};

use super::client::{
    AdminFuture, ApplicationUser, ClusterAdmin, MemberState, MemberStatus, NewMember,
    ReplicaSetConfig, ReplicaSetStatus, SeedCollection, SeedRecord,
};
use crate::errors::AdminError;

const ADMIN_DB: &str = "admin";

/// Read a numeric field that the server may encode as int32, int64,
/// double, or boolean.
fn number(doc: &Document, key: &str) -> Option<i64> {
    match doc.get(key)? {
        Bson::Int32(v) => Some(i64::from(*v)),
        Bson::Int64(v) => Some(*v),
        Bson::Double(v) => Some(*v as i64),
        Bson::Boolean(v) => Some(i64::from(*v)),
        _ => None,
    }
}

/// Decode a `replSetGetStatus` reply.
pub fn parse_status(reply: &Document) -> ReplicaSetStatus {
    let members = reply
        .get_array("members")
        .map(|members| {
            members
                .iter()
                .filter_map(Bson::as_document)
                .filter_map(|m| m.get_str("name").ok())
                .map(|name| MemberStatus {
                    name: name.to_string(),
                })
                .collect()
        })
        .unwrap_or_default();

    ReplicaSetStatus {
        ok: number(reply, "ok") == Some(1),
        my_state: number(reply, "myState")
            .map(MemberState::from_code)
            .unwrap_or(MemberState::Other),
        members,
    }
}

fn initiate_command(config: &ReplicaSetConfig) -> Document {
    let members: Vec<Document> = config
        .members
        .iter()
        .map(|m| doc! { "_id": m.id as i32, "host": m.host.as_str(), "priority": m.priority as i32 })
        .collect();
    doc! {
        "replSetInitiate": { "_id": config.id.as_str(), "members": members },
    }
}

/// Append `member` to a `replSetGetConfig` configuration document and bump
/// its version, producing the body of a `replSetReconfig`.
fn append_member(mut config: Document, member: &NewMember) -> Result<Document, AdminError> {
    let members = config
        .get_array_mut("members")
        .map_err(|e| AdminError::fatal(format!("malformed replica set config: {e}")))?;
    let next_id = members
        .iter()
        .filter_map(Bson::as_document)
        .filter_map(|m| number(m, "_id"))
        .max()
        .map_or(0, |id| id + 1);
    members.push(Bson::Document(doc! {
        "_id": next_id as i32,
        "host": member.host.as_str(),
        "priority": member.priority as i32,
    }));

    let version = number(&config, "version").unwrap_or(0) + 1;
    config.insert("version", version as i32);
    Ok(config)
}

fn seed_document(record: &SeedRecord) -> Document {
    doc! {
        "title": record.title.as_str(),
        "status": record.status.as_str(),
        "created_at": bson::DateTime::from_chrono(record.created_at),
    }
}

/// Administrative session over the MongoDB driver.
pub struct MongoClusterAdmin {
    client: Client,
}

impl MongoClusterAdmin {
    /// Build a client for `uri`. The driver connects lazily, so an
    /// unreachable node surfaces on the first command, not here.
    pub async fn connect(uri: &str) -> Result<Self, AdminError> {
        let client = Client::with_uri_str(uri).await?;
        Ok(Self { client })
    }

    async fn admin_command(&self, command: Document) -> Result<Document, AdminError> {
        Ok(self
            .client
            .database(ADMIN_DB)
            .run_command(command, None)
            .await?)
    }
}

impl ClusterAdmin for MongoClusterAdmin {
    fn replica_status(&self) -> AdminFuture<'_, ReplicaSetStatus> {
        Box::pin(async move {
            let reply = self.admin_command(doc! { "replSetGetStatus": 1 }).await?;
            Ok(parse_status(&reply))
        })
    }

    fn initiate(&self, config: ReplicaSetConfig) -> AdminFuture<'_, ()> {
        Box::pin(async move {
            self.admin_command(initiate_command(&config)).await?;
            Ok(())
        })
    }

    fn add_member(&self, member: NewMember) -> AdminFuture<'_, ()> {
        Box::pin(async move {
            let reply = self.admin_command(doc! { "replSetGetConfig": 1 }).await?;
            let current = reply
                .get_document("config")
                .map_err(|e| AdminError::fatal(format!("malformed replSetGetConfig reply: {e}")))?
                .clone();
            let next = append_member(current, &member)?;
            self.admin_command(doc! { "replSetReconfig": next }).await?;
            Ok(())
        })
    }

    fn user_exists(&self, auth_database: &str, name: &str) -> AdminFuture<'_, bool> {
        let auth_database = auth_database.to_string();
        let name = name.to_string();
        Box::pin(async move {
            let reply = self
                .client
                .database(&auth_database)
                .run_command(doc! { "usersInfo": name.as_str() }, None)
                .await?;
            Ok(reply
                .get_array("users")
                .map(|users| !users.is_empty())
                .unwrap_or(false))
        })
    }

    fn create_user(&self, auth_database: &str, user: ApplicationUser) -> AdminFuture<'_, ()> {
        let auth_database = auth_database.to_string();
        Box::pin(async move {
            let roles: Vec<Document> = user
                .roles
                .iter()
                .map(|r| doc! { "role": r.role.as_str(), "db": r.database.as_str() })
                .collect();
            self.client
                .database(&auth_database)
                .run_command(
                    doc! {
                        "createUser": user.name.as_str(),
                        "pwd": user.secret.as_str(),
                        "roles": roles,
                    },
                    None,
                )
                .await?;
            Ok(())
        })
    }

    fn collection(
        &self,
        database: &str,
        collection: &str,
    ) -> AdminFuture<'_, Arc<dyn SeedCollection>> {
        let inner = self.client.database(database).collection::<Document>(collection);
        Box::pin(async move {
            let handle: Arc<dyn SeedCollection> = Arc::new(MongoSeedCollection { inner });
            Ok(handle)
        })
    }
}

/// A driver collection handle.
struct MongoSeedCollection {
    inner: Collection<Document>,
}

impl SeedCollection for MongoSeedCollection {
    fn has_any(&self) -> AdminFuture<'_, bool> {
        Box::pin(async move { Ok(self.inner.find_one(doc! {}, None).await?.is_some()) })
    }

    fn insert_ordered(&self, records: Vec<SeedRecord>) -> AdminFuture<'_, usize> {
        Box::pin(async move {
            let docs: Vec<Document> = records.iter().map(seed_document).collect();
            let options = InsertManyOptions::builder().ordered(true).build();
            let result = self.inner.insert_many(docs, options).await?;
            Ok(result.inserted_ids.len())
        })
    }
}
