//! Bootstrap sequence.
//!
//! One pass per process: inspect, initiate or reconcile, wait for a
//! primary, provision the application user, seed demo data.  Nothing is
//! persisted locally; every run re-derives its decisions from live cluster
//! state, and any fatal failure aborts so the supervisor can restart us.

pub mod credentials;
pub mod inspect;
pub mod primary;
pub mod seed;
pub mod topology;

use std::sync::Arc;

use tracing::info;

use crate::admin::client::{ClusterAdmin, SeedRecord};
use crate::config::{AppCredentials, Config};
use crate::errors::BootstrapError;
use crate::retry::{Clock, RetryPolicy};

use self::credentials::{CredentialProvisioner, UserOutcome};
use self::inspect::{ReplicationState, ReplicationStateInspector};
use self::primary::PrimaryAwaiter;
use self::seed::{SeedLoader, SeedOutcome};
use self::topology::{ReconcileOutcome, TopologyInitializer};

/// Tracing target carried by every progress line.
pub const LOG_TARGET: &str = "bootstrap";

/// What to converge the cluster to.
#[derive(Debug, Clone)]
pub struct BootstrapPlan {
    pub replica_set: String,
    pub primary: String,
    pub secondary: Option<String>,
    pub credentials: Option<AppCredentials>,
    pub role: String,
    pub auth_database: String,
    pub app_database: String,
    pub seed_collection: String,
}

impl From<&Config> for BootstrapPlan {
    fn from(config: &Config) -> Self {
        Self {
            replica_set: config.replica_set.name.clone(),
            primary: config.replica_set.primary.clone(),
            secondary: config.replica_set.secondary.clone(),
            credentials: config.app_credentials(),
            role: config.credentials.role.clone(),
            auth_database: config.credentials.auth_database.clone(),
            app_database: config.application.database.clone(),
            seed_collection: config.application.seed_collection.clone(),
        }
    }
}

/// Summary of a completed run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapReport {
    /// Whether this run submitted the initial configuration.
    pub initialized: bool,
    pub secondary: Option<ReconcileOutcome>,
    /// `None` when credentials were not configured.
    pub user: Option<UserOutcome>,
    pub seed: SeedOutcome,
}

pub struct Bootstrapper {
    plan: BootstrapPlan,
    inspector: ReplicationStateInspector,
    topology: TopologyInitializer,
    awaiter: PrimaryAwaiter,
    credentials: CredentialProvisioner,
    seeder: SeedLoader,
}

impl Bootstrapper {
    pub fn new(
        admin: Arc<dyn ClusterAdmin>,
        plan: BootstrapPlan,
        policy: RetryPolicy,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let inspector = ReplicationStateInspector::new(admin.clone());
        Self {
            topology: TopologyInitializer::new(admin.clone(), &plan.replica_set, &plan.primary),
            awaiter: PrimaryAwaiter::new(inspector.clone(), policy, clock),
            credentials: CredentialProvisioner::new(admin.clone(), &plan.auth_database),
            seeder: SeedLoader::new(admin),
            inspector,
            plan,
        }
    }

    /// Run the whole sequence, seeding with `records`.
    pub async fn run(&self, records: Vec<SeedRecord>) -> Result<BootstrapReport, BootstrapError> {
        let secondary = self.plan.secondary.as_deref();

        let mut initialized = false;
        let mut reconciled = None;
        match self.inspector.inspect().await {
            ReplicationState::Fatal(e) => return Err(e.into()),
            ReplicationState::Uninitialized => {
                self.topology.initialize(secondary).await?;
                initialized = true;
            }
            ReplicationState::Initializing(_) | ReplicationState::Stable(_) => {
                info!(target: LOG_TARGET, "Replica set already initialised.");
                if let Some(host) = secondary {
                    // Re-read right before the mutating call.
                    let observed = self.inspector.inspect().await;
                    reconciled = Some(self.topology.reconcile_secondary(&observed, host).await?);
                }
            }
        }

        self.awaiter.await_primary().await?;

        let user = match &self.plan.credentials {
            Some(creds) => Some(
                self.credentials
                    .ensure_user(
                        &creds.username,
                        &creds.password,
                        &self.plan.role,
                        &self.plan.app_database,
                    )
                    .await?,
            ),
            None => {
                info!(target: LOG_TARGET, "Application credentials missing; skipping user creation.");
                None
            }
        };

        let seed = self
            .seeder
            .seed(&self.plan.app_database, &self.plan.seed_collection, records)
            .await;

        info!(target: LOG_TARGET, "Replica bootstrap complete.");
        Ok(BootstrapReport {
            initialized,
            secondary: reconciled,
            user,
            seed,
        })
    }
}
