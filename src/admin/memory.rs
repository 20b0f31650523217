//! In-memory simulated replica set.
//!
//! Models just enough of a single-node view of a replica set to drive the
//! bootstrap sequence without a datastore: initiation, delayed election,
//! member addition, users, and collections.  Every mutating call is
//! counted so tests can assert on side effects.  Uses `RwLock` behind an
//! `Arc` so collection handles share state with the cluster.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, RwLock};

use super::client::{
    AdminFuture, ApplicationUser, ClusterAdmin, MemberConfig, MemberState, MemberStatus, NewMember,
    ReplicaSetConfig, ReplicaSetStatus, SeedCollection, SeedRecord,
};
use crate::errors::AdminError;

type UserKey = (String, String);
type CollectionKey = (String, String);

/// Number of mutating calls observed, per operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub status: u32,
    pub initiate: u32,
    pub add_member: u32,
    pub user_exists: u32,
    pub create_user: u32,
    pub insert: u32,
}

#[derive(Debug, Default)]
struct Inner {
    config: Option<ReplicaSetConfig>,
    config_version: u32,
    my_state: Option<MemberState>,
    /// Status reads after initiation that still report SECONDARY.
    election_delay: u32,
    status_script: VecDeque<Result<ReplicaSetStatus, AdminError>>,
    users: HashMap<UserKey, ApplicationUser>,
    collections: HashMap<CollectionKey, Vec<SeedRecord>>,
    added_members: Vec<NewMember>,
    collection_failure: Option<AdminError>,
    insert_failure: Option<(usize, AdminError)>,
    create_user_failure: Option<AdminError>,
    calls: CallCounts,
}

/// A simulated replica set node.
#[derive(Clone, Default)]
pub struct MemoryCluster {
    inner: Arc<RwLock<Inner>>,
}

impl MemoryCluster {
    /// A freshly started node that has never been initiated.
    pub fn new() -> Self {
        Self::default()
    }

    /// A node already initiated with `hosts` and currently primary.
    pub fn stable(name: &str, hosts: &[&str]) -> Self {
        let members = hosts
            .iter()
            .enumerate()
            .map(|(id, host)| MemberConfig {
                id: id as u32,
                host: host.to_string(),
                priority: 1,
            })
            .collect();
        let cluster = Self::new();
        {
            let mut inner = cluster.write();
            inner.config = Some(ReplicaSetConfig {
                id: name.to_string(),
                members,
            });
            inner.config_version = 1;
            inner.my_state = Some(MemberState::Primary);
        }
        cluster
    }

    /// Report SECONDARY for `reads` status queries after initiation before
    /// becoming primary.
    pub fn with_election_delay(self, reads: u32) -> Self {
        self.write().election_delay = reads;
        self
    }

    /// Pre-populate `database.collection`.
    pub fn with_documents(self, database: &str, collection: &str, records: Vec<SeedRecord>) -> Self {
        self.write()
            .collections
            .insert((database.to_string(), collection.to_string()), records);
        self
    }

    /// Pre-create a user.
    pub fn with_user(self, auth_database: &str, user: ApplicationUser) -> Self {
        self.write()
            .users
            .insert((auth_database.to_string(), user.name.clone()), user);
        self
    }

    /// Queue a canned status response, served before the simulated state.
    pub fn script_status(&self, response: Result<ReplicaSetStatus, AdminError>) {
        self.write().status_script.push_back(response);
    }

    /// Make every collection lookup fail.
    pub fn fail_collection(&self, err: AdminError) {
        self.write().collection_failure = Some(err);
    }

    /// Make ordered inserts fail at record `index`; earlier records land.
    pub fn fail_inserts_at(&self, index: usize, err: AdminError) {
        self.write().insert_failure = Some((index, err));
    }

    /// Make user creation fail.
    pub fn fail_create_user(&self, err: AdminError) {
        self.write().create_user_failure = Some(err);
    }

    pub fn calls(&self) -> CallCounts {
        self.read().calls
    }

    /// Current replica set configuration, if initiated.
    pub fn config(&self) -> Option<ReplicaSetConfig> {
        self.read().config.clone()
    }

    /// Configuration version; bumped by every reconfiguration.
    pub fn config_version(&self) -> u32 {
        self.read().config_version
    }

    pub fn added_members(&self) -> Vec<NewMember> {
        self.read().added_members.clone()
    }

    pub fn documents(&self, database: &str, collection: &str) -> Vec<SeedRecord> {
        self.read()
            .collections
            .get(&(database.to_string(), collection.to_string()))
            .cloned()
            .unwrap_or_default()
    }

    pub fn user(&self, auth_database: &str, name: &str) -> Option<ApplicationUser> {
        self.read()
            .users
            .get(&(auth_database.to_string(), name.to_string()))
            .cloned()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Inner> {
        self.inner.read().expect("rwlock poisoned")
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Inner> {
        self.inner.write().expect("rwlock poisoned")
    }
}

impl Inner {
    fn status(&mut self) -> Result<ReplicaSetStatus, AdminError> {
        if let Some(scripted) = self.status_script.pop_front() {
            return scripted;
        }
        let members = match &self.config {
            Some(config) => config
                .members
                .iter()
                .map(|m| MemberStatus { name: m.host.clone() })
                .collect(),
            None => return Err(AdminError::not_yet_initialized()),
        };
        let my_state = match self.my_state {
            Some(MemberState::Primary) => MemberState::Primary,
            _ if self.election_delay == 0 => {
                self.my_state = Some(MemberState::Primary);
                MemberState::Primary
            }
            _ => {
                self.election_delay -= 1;
                MemberState::Secondary
            }
        };
        Ok(ReplicaSetStatus {
            ok: true,
            my_state,
            members,
        })
    }
}

impl ClusterAdmin for MemoryCluster {
    fn replica_status(&self) -> AdminFuture<'_, ReplicaSetStatus> {
        Box::pin(async move {
            let mut inner = self.write();
            inner.calls.status += 1;
            inner.status()
        })
    }

    fn initiate(&self, config: ReplicaSetConfig) -> AdminFuture<'_, ()> {
        Box::pin(async move {
            let mut inner = self.write();
            inner.calls.initiate += 1;
            if inner.config.is_some() {
                return Err(AdminError::command(23, "AlreadyInitialized", "already initialized"));
            }
            inner.config = Some(config);
            inner.config_version = 1;
            inner.my_state = Some(MemberState::Secondary);
            Ok(())
        })
    }

    fn add_member(&self, member: NewMember) -> AdminFuture<'_, ()> {
        Box::pin(async move {
            let mut inner = self.write();
            inner.calls.add_member += 1;
            let Some(config) = inner.config.as_mut() else {
                return Err(AdminError::not_yet_initialized());
            };
            if config.members.iter().any(|m| m.host == member.host) {
                return Err(AdminError::command(
                    103,
                    "NewReplicaSetConfigurationIncompatible",
                    format!("Found two member configurations with same host field, {}", member.host),
                ));
            }
            let next_id = config.members.iter().map(|m| m.id + 1).max().unwrap_or(0);
            config.members.push(MemberConfig {
                id: next_id,
                host: member.host.clone(),
                priority: member.priority,
            });
            inner.config_version += 1;
            inner.added_members.push(member);
            Ok(())
        })
    }

    fn user_exists(&self, auth_database: &str, name: &str) -> AdminFuture<'_, bool> {
        let key = (auth_database.to_string(), name.to_string());
        Box::pin(async move {
            let mut inner = self.write();
            inner.calls.user_exists += 1;
            Ok(inner.users.contains_key(&key))
        })
    }

    fn create_user(&self, auth_database: &str, user: ApplicationUser) -> AdminFuture<'_, ()> {
        let key = (auth_database.to_string(), user.name.clone());
        Box::pin(async move {
            let mut inner = self.write();
            inner.calls.create_user += 1;
            if let Some(err) = inner.create_user_failure.clone() {
                return Err(err);
            }
            if inner.users.contains_key(&key) {
                return Err(AdminError::command(
                    51003,
                    "Location51003",
                    format!("User \"{}@{}\" already exists", key.1, key.0),
                ));
            }
            inner.users.insert(key, user);
            Ok(())
        })
    }

    fn collection(
        &self,
        database: &str,
        collection: &str,
    ) -> AdminFuture<'_, Arc<dyn SeedCollection>> {
        let key = (database.to_string(), collection.to_string());
        Box::pin(async move {
            if let Some(err) = self.read().collection_failure.clone() {
                return Err(err);
            }
            let handle: Arc<dyn SeedCollection> = Arc::new(MemoryCollection {
                cluster: self.clone(),
                key,
            });
            Ok(handle)
        })
    }
}

/// Collection handle backed by a [`MemoryCluster`].
struct MemoryCollection {
    cluster: MemoryCluster,
    key: CollectionKey,
}

impl SeedCollection for MemoryCollection {
    fn has_any(&self) -> AdminFuture<'_, bool> {
        Box::pin(async move {
            let inner = self.cluster.read();
            Ok(inner
                .collections
                .get(&self.key)
                .is_some_and(|docs| !docs.is_empty()))
        })
    }

    fn insert_ordered(&self, records: Vec<SeedRecord>) -> AdminFuture<'_, usize> {
        Box::pin(async move {
            let mut inner = self.cluster.write();
            inner.calls.insert += 1;
            let failure = inner.insert_failure.clone();
            let docs = inner.collections.entry(self.key.clone()).or_default();
            let mut inserted = 0;
            for (index, record) in records.into_iter().enumerate() {
                if let Some((at, err)) = &failure {
                    if *at == index {
                        return Err(err.clone());
                    }
                }
                docs.push(record);
                inserted += 1;
            }
            Ok(inserted)
        })
    }
}
