//! Blocks until the connected node is primary.

use std::sync::Arc;

use tracing::info;

use super::inspect::{ReplicationState, ReplicationStateInspector};
use super::LOG_TARGET;
use crate::admin::client::ReplicaSetStatus;
use crate::errors::BootstrapError;
use crate::retry::{Clock, RetryPolicy};

pub struct PrimaryAwaiter {
    inspector: ReplicationStateInspector,
    policy: RetryPolicy,
    clock: Arc<dyn Clock>,
}

impl PrimaryAwaiter {
    pub fn new(inspector: ReplicationStateInspector, policy: RetryPolicy, clock: Arc<dyn Clock>) -> Self {
        Self {
            inspector,
            policy,
            clock,
        }
    }

    /// Poll until [`ReplicationState::Stable`].
    ///
    /// A fatal inspection aborts immediately. With the default policy there
    /// is no attempt ceiling; the surrounding supervisor owns the timeout.
    pub async fn await_primary(&self) -> Result<ReplicaSetStatus, BootstrapError> {
        let mut attempt: u32 = 0;
        loop {
            match self.inspector.inspect().await {
                ReplicationState::Stable(status) => {
                    info!(target: LOG_TARGET, "Replica set primary is online.");
                    return Ok(status);
                }
                ReplicationState::Initializing(status) => {
                    info!(
                        target: LOG_TARGET,
                        "Replica set status: {:?} (waiting for primary)", status.my_state
                    );
                }
                ReplicationState::Uninitialized => {
                    info!(target: LOG_TARGET, "Replica set not yet initialised; waiting...");
                }
                ReplicationState::Fatal(e) => return Err(e.into()),
            }

            attempt = attempt.saturating_add(1);
            if !self.policy.allows_retry(attempt) {
                return Err(BootstrapError::PrimaryWaitExhausted { attempts: attempt });
            }
            self.clock.sleep(self.policy.delay(attempt)).await;
        }
    }
}
