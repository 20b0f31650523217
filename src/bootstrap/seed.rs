//! Demo data seeding.
//!
//! Best effort: every failure is logged and reported in the outcome,
//! never returned as an error.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use super::LOG_TARGET;
use crate::admin::client::{AssignmentStatus, ClusterAdmin, SeedCollection, SeedRecord};
use crate::errors::AdminError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SeedOutcome {
    Inserted(usize),
    /// The collection already held at least one document.
    SkippedNonEmpty,
    Failed(AdminError),
}

/// The fixed assignment records, all stamped `now`.
pub fn assignment_seed(now: DateTime<Utc>) -> Vec<SeedRecord> {
    [
        ("Prototype architecture", AssignmentStatus::InProgress),
        ("Implement backend", AssignmentStatus::Todo),
        ("Analytics aggregation", AssignmentStatus::Done),
    ]
    .into_iter()
    .map(|(title, status)| SeedRecord {
        title: title.to_string(),
        status,
        created_at: now,
    })
    .collect()
}

pub struct SeedLoader {
    admin: Arc<dyn ClusterAdmin>,
}

impl SeedLoader {
    pub fn new(admin: Arc<dyn ClusterAdmin>) -> Self {
        Self { admin }
    }

    /// Resolve `database.collection` and seed it.
    pub async fn seed(&self, database: &str, collection: &str, records: Vec<SeedRecord>) -> SeedOutcome {
        match self.admin.collection(database, collection).await {
            Ok(handle) => self.seed_if_empty(handle.as_ref(), records).await,
            Err(e) => {
                warn!(target: LOG_TARGET, "Unable to obtain application database: {}", e);
                SeedOutcome::Failed(e)
            }
        }
    }

    /// Probe once; insert `records` in order only if nothing was found.
    pub async fn seed_if_empty(
        &self,
        collection: &dyn SeedCollection,
        records: Vec<SeedRecord>,
    ) -> SeedOutcome {
        match collection.has_any().await {
            Ok(true) => {
                info!(target: LOG_TARGET, "Assignments collection already populated; skipping seed.");
                return SeedOutcome::SkippedNonEmpty;
            }
            Ok(false) => {}
            Err(e) => {
                warn!(target: LOG_TARGET, "Failed to seed demo assignments: {}", e);
                return SeedOutcome::Failed(e);
            }
        }

        match collection.insert_ordered(records).await {
            Ok(n) => {
                info!(target: LOG_TARGET, "Seeded demo assignments collection ({} records).", n);
                SeedOutcome::Inserted(n)
            }
            Err(e) => {
                warn!(target: LOG_TARGET, "Failed to seed demo assignments: {}", e);
                SeedOutcome::Failed(e)
            }
        }
    }
}
