//! Administrative session contract.
//!
//! Every bootstrap component receives an `Arc<dyn ClusterAdmin>` in its
//! constructor; there is no ambient connection state.  The trait uses
//! manually desugared async methods (pinned boxed futures) so it stays
//! object safe.

use chrono::{DateTime, Utc};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::errors::AdminError;

/// Boxed future returned by administrative calls.
pub type AdminFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, AdminError>> + Send + 'a>>;

// ── Topology types ─────────────────────────────────────────────────

/// Election priority of the configured primary member.
pub const PRIMARY_PRIORITY: u32 = 2;

/// Election priority of the optional secondary member.
pub const SECONDARY_PRIORITY: u32 = 1;

/// One member entry of a replica set configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberConfig {
    pub id: u32,
    pub host: String,
    pub priority: u32,
}

/// Replica set configuration as submitted to `replSetInitiate`.
///
/// Member ids are unique and contiguous from 0.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplicaSetConfig {
    pub id: String,
    pub members: Vec<MemberConfig>,
}

impl ReplicaSetConfig {
    /// Initial configuration: the primary at priority 2, plus the
    /// secondary at priority 1 when one is given.
    pub fn initial(name: &str, primary: &str, secondary: Option<&str>) -> Self {
        let hosts = std::iter::once((primary, PRIMARY_PRIORITY))
            .chain(secondary.map(|host| (host, SECONDARY_PRIORITY)));
        let members = hosts
            .enumerate()
            .map(|(id, (host, priority))| MemberConfig {
                id: id as u32,
                host: host.to_string(),
                priority,
            })
            .collect();
        Self {
            id: name.to_string(),
            members,
        }
    }
}

/// A member to append to a running replica set. The id is assigned by the
/// backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMember {
    pub host: String,
    pub priority: u32,
}

/// Replication state of the node the session is connected to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberState {
    Primary,
    Secondary,
    Other,
}

impl MemberState {
    /// Map the numeric `myState` field of `replSetGetStatus`.
    pub fn from_code(code: i64) -> Self {
        match code {
            1 => MemberState::Primary,
            2 => MemberState::Secondary,
            _ => MemberState::Other,
        }
    }
}

/// Member entry of a status response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberStatus {
    pub name: String,
}

/// Successful `replSetGetStatus` response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplicaSetStatus {
    pub ok: bool,
    pub my_state: MemberState,
    pub members: Vec<MemberStatus>,
}

impl ReplicaSetStatus {
    /// Whether `host` appears among the member names.
    pub fn has_member(&self, host: &str) -> bool {
        self.members.iter().any(|m| m.name == host)
    }
}

// ── Credential types ───────────────────────────────────────────────

/// A role scoped to a database.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RoleGrant {
    pub role: String,
    pub database: String,
}

/// Application login to create.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplicationUser {
    pub name: String,
    pub secret: String,
    pub roles: Vec<RoleGrant>,
}

// ── Seed types ─────────────────────────────────────────────────────

/// Workflow status of a seeded assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignmentStatus {
    Todo,
    InProgress,
    Done,
}

impl AssignmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssignmentStatus::Todo => "todo",
            AssignmentStatus::InProgress => "in_progress",
            AssignmentStatus::Done => "done",
        }
    }
}

/// A demo document inserted into an empty application collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedRecord {
    pub title: String,
    pub status: AssignmentStatus,
    pub created_at: DateTime<Utc>,
}

// ── Traits ─────────────────────────────────────────────────────────

/// Handle to a single collection of the application database.
pub trait SeedCollection: Send + Sync {
    /// Whether at least one document exists (a `findOne({})` probe).
    fn has_any(&self) -> AdminFuture<'_, bool>;

    /// Ordered bulk insert. Stops at the first failing document.
    /// Returns the number of documents inserted.
    fn insert_ordered(&self, records: Vec<SeedRecord>) -> AdminFuture<'_, usize>;
}

/// The datastore's administrative surface.
pub trait ClusterAdmin: Send + Sync + 'static {
    /// `replSetGetStatus` on the connected node.
    fn replica_status(&self) -> AdminFuture<'_, ReplicaSetStatus>;

    /// `replSetInitiate` with the given configuration.
    fn initiate(&self, config: ReplicaSetConfig) -> AdminFuture<'_, ()>;

    /// Append a member to the current configuration.
    fn add_member(&self, member: NewMember) -> AdminFuture<'_, ()>;

    /// Whether `name` exists in `auth_database`.
    fn user_exists(&self, auth_database: &str, name: &str) -> AdminFuture<'_, bool>;

    /// Create `user` in `auth_database`.
    fn create_user(&self, auth_database: &str, user: ApplicationUser) -> AdminFuture<'_, ()>;

    /// Obtain a handle to `database.collection`.
    fn collection(&self, database: &str, collection: &str)
        -> AdminFuture<'_, Arc<dyn SeedCollection>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_config_primary_only() {
        let config = ReplicaSetConfig::initial("rs0", "a:27017", None);
        assert_eq!(config.id, "rs0");
        assert_eq!(
            config.members,
            vec![MemberConfig {
                id: 0,
                host: "a:27017".into(),
                priority: 2
            }]
        );
    }

    #[test]
    fn test_initial_config_with_secondary() {
        let config = ReplicaSetConfig::initial("rs0", "a:27017", Some("b:27017"));
        let ids: Vec<u32> = config.members.iter().map(|m| m.id).collect();
        let priorities: Vec<u32> = config.members.iter().map(|m| m.priority).collect();
        assert_eq!(ids, vec![0, 1]);
        assert_eq!(priorities, vec![2, 1]);
        assert_eq!(config.members[1].host, "b:27017");
    }

    #[test]
    fn test_member_state_codes() {
        assert_eq!(MemberState::from_code(1), MemberState::Primary);
        assert_eq!(MemberState::from_code(2), MemberState::Secondary);
        assert_eq!(MemberState::from_code(0), MemberState::Other);
        assert_eq!(MemberState::from_code(5), MemberState::Other);
    }

    #[test]
    fn test_status_wire_names() {
        assert_eq!(AssignmentStatus::Todo.as_str(), "todo");
        assert_eq!(AssignmentStatus::InProgress.as_str(), "in_progress");
        assert_eq!(AssignmentStatus::Done.as_str(), "done");
    }
}
