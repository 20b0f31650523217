//! Replica set initiation and secondary membership reconciliation.

use std::sync::Arc;

use tracing::info;

use super::inspect::ReplicationState;
use super::LOG_TARGET;
use crate::admin::client::{ClusterAdmin, NewMember, ReplicaSetConfig, SECONDARY_PRIORITY};
use crate::errors::AdminError;

/// Result of a secondary reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    Added,
    AlreadyPresent,
    /// The status read showed no configuration; nothing was mutated.
    SkippedUninitialized,
}

pub struct TopologyInitializer {
    admin: Arc<dyn ClusterAdmin>,
    replica_set: String,
    primary: String,
}

impl TopologyInitializer {
    pub fn new(admin: Arc<dyn ClusterAdmin>, replica_set: &str, primary: &str) -> Self {
        Self {
            admin,
            replica_set: replica_set.to_string(),
            primary: primary.to_string(),
        }
    }

    /// Submit the initial configuration. Only called after an inspection
    /// reported [`ReplicationState::Uninitialized`].
    pub async fn initialize(&self, secondary: Option<&str>) -> Result<ReplicaSetConfig, AdminError> {
        let config = ReplicaSetConfig::initial(&self.replica_set, &self.primary, secondary);
        match secondary {
            Some(host) => info!(
                target: LOG_TARGET,
                "Initialising replica set {} with primary {} and secondary {}",
                self.replica_set,
                self.primary,
                host
            ),
            None => info!(
                target: LOG_TARGET,
                "Initialising replica set {} with primary {}",
                self.replica_set,
                self.primary
            ),
        }
        self.admin.initiate(config.clone()).await?;
        Ok(config)
    }

    /// Add `secondary_host` at priority 1 unless `observed` already lists it.
    ///
    /// `observed` must come from a fresh inspection. An uninitialised
    /// observation is skipped without mutation; a fatal one is returned.
    pub async fn reconcile_secondary(
        &self,
        observed: &ReplicationState,
        secondary_host: &str,
    ) -> Result<ReconcileOutcome, AdminError> {
        let status = match observed {
            ReplicationState::Uninitialized => {
                info!(
                    target: LOG_TARGET,
                    "Replica set reported uninitialised while checking members; skipping secondary reconciliation"
                );
                return Ok(ReconcileOutcome::SkippedUninitialized);
            }
            ReplicationState::Fatal(e) => return Err(e.clone()),
            ReplicationState::Initializing(s) | ReplicationState::Stable(s) => s,
        };

        if status.has_member(secondary_host) {
            info!(target: LOG_TARGET, "Secondary member {} already configured", secondary_host);
            return Ok(ReconcileOutcome::AlreadyPresent);
        }

        info!(target: LOG_TARGET, "Adding missing secondary member {}", secondary_host);
        self.admin
            .add_member(NewMember {
                host: secondary_host.to_string(),
                priority: SECONDARY_PRIORITY,
            })
            .await?;
        Ok(ReconcileOutcome::Added)
    }
}
