//! Replica set status classification.

use std::sync::Arc;

use tracing::debug;

use super::LOG_TARGET;
use crate::admin::client::{ClusterAdmin, MemberState, ReplicaSetStatus};
use crate::errors::{AdminError, ErrorKind};

/// Closed set of states every other stage consumes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplicationState {
    /// The node has never received a replica set configuration.
    Uninitialized,
    /// Configured, but this node is not (yet) primary.
    Initializing(ReplicaSetStatus),
    /// Configured and this node is primary.
    Stable(ReplicaSetStatus),
    /// Anything else. Aborts the run.
    Fatal(AdminError),
}

impl ReplicationState {
    /// Status payload for the configured states.
    pub fn status(&self) -> Option<&ReplicaSetStatus> {
        match self {
            ReplicationState::Initializing(s) | ReplicationState::Stable(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_stable(&self) -> bool {
        matches!(self, ReplicationState::Stable(_))
    }

    /// Short label for log lines.
    pub fn label(&self) -> &'static str {
        match self {
            ReplicationState::Uninitialized => "uninitialized",
            ReplicationState::Initializing(_) => "initializing",
            ReplicationState::Stable(_) => "stable",
            ReplicationState::Fatal(_) => "fatal",
        }
    }
}

/// Map one status query outcome onto a [`ReplicationState`].
///
/// Only the `NotYetInitialized` kind is benign; transient failures are
/// fatal here and left to the process supervisor.
pub fn classify(result: Result<ReplicaSetStatus, AdminError>) -> ReplicationState {
    match result {
        Ok(status) if status.ok && status.my_state == MemberState::Primary => {
            ReplicationState::Stable(status)
        }
        Ok(status) if status.ok => ReplicationState::Initializing(status),
        Ok(_) => ReplicationState::Fatal(AdminError::fatal("replSetGetStatus returned ok: 0")),
        Err(e) if e.kind == ErrorKind::NotYetInitialized => ReplicationState::Uninitialized,
        Err(e) => ReplicationState::Fatal(e),
    }
}

/// Queries the connected node's replication status.
#[derive(Clone)]
pub struct ReplicationStateInspector {
    admin: Arc<dyn ClusterAdmin>,
}

impl ReplicationStateInspector {
    pub fn new(admin: Arc<dyn ClusterAdmin>) -> Self {
        Self { admin }
    }

    pub async fn inspect(&self) -> ReplicationState {
        let state = classify(self.admin.replica_status().await);
        debug!(target: LOG_TARGET, state = state.label(), "Inspected replica set status");
        state
    }
}
