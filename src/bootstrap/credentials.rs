//! Application user provisioning.

use std::sync::Arc;

use tracing::info;

use super::LOG_TARGET;
use crate::admin::client::{ApplicationUser, ClusterAdmin, RoleGrant};
use crate::errors::AdminError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserOutcome {
    Created,
    AlreadyExists,
}

/// Creates the application user when it does not exist yet.
pub struct CredentialProvisioner {
    admin: Arc<dyn ClusterAdmin>,
    auth_database: String,
}

impl CredentialProvisioner {
    pub fn new(admin: Arc<dyn ClusterAdmin>, auth_database: &str) -> Self {
        Self {
            admin,
            auth_database: auth_database.to_string(),
        }
    }

    /// Check, then create `name` with `role` on `database`.
    ///
    /// A failed create is returned as is; nothing is rolled back.
    pub async fn ensure_user(
        &self,
        name: &str,
        secret: &str,
        role: &str,
        database: &str,
    ) -> Result<UserOutcome, AdminError> {
        if self.admin.user_exists(&self.auth_database, name).await? {
            info!(target: LOG_TARGET, "Application user {} already exists.", name);
            return Ok(UserOutcome::AlreadyExists);
        }

        info!(target: LOG_TARGET, "Creating application user {}.", name);
        let user = ApplicationUser {
            name: name.to_string(),
            secret: secret.to_string(),
            roles: vec![RoleGrant {
                role: role.to_string(),
                database: database.to_string(),
            }],
        };
        self.admin.create_user(&self.auth_database, user).await?;
        Ok(UserOutcome::Created)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::admin::memory::MemoryCluster;
    use crate::errors::ErrorKind;

    #[tokio::test]
    async fn test_creates_once_across_repeated_calls() {
        let cluster = MemoryCluster::stable("rs0", &["a:27017"]);
        let provisioner = CredentialProvisioner::new(Arc::new(cluster.clone()), "admin");

        let first = provisioner
            .ensure_user("animo_app", "s3cret", "readWrite", "animoassign")
            .await
            .unwrap();
        assert_eq!(first, UserOutcome::Created);

        for _ in 0..3 {
            let again = provisioner
                .ensure_user("animo_app", "s3cret", "readWrite", "animoassign")
                .await
                .unwrap();
            assert_eq!(again, UserOutcome::AlreadyExists);
        }

        assert_eq!(cluster.calls().create_user, 1);
        let user = cluster.user("admin", "animo_app").unwrap();
        assert_eq!(
            user.roles,
            vec![RoleGrant {
                role: "readWrite".into(),
                database: "animoassign".into()
            }]
        );
    }

    #[tokio::test]
    async fn test_existing_user_untouched() {
        let existing = ApplicationUser {
            name: "animo_app".into(),
            secret: "old".into(),
            roles: vec![],
        };
        let cluster = MemoryCluster::stable("rs0", &["a:27017"]).with_user("admin", existing.clone());
        let provisioner = CredentialProvisioner::new(Arc::new(cluster.clone()), "admin");
        let outcome = provisioner
            .ensure_user("animo_app", "new", "readWrite", "animoassign")
            .await
            .unwrap();
        assert_eq!(outcome, UserOutcome::AlreadyExists);
        assert_eq!(cluster.calls().create_user, 0);
        assert_eq!(cluster.user("admin", "animo_app"), Some(existing));
    }

    #[tokio::test]
    async fn test_create_failure_is_fatal() {
        let cluster = MemoryCluster::stable("rs0", &["a:27017"]);
        cluster.fail_create_user(AdminError::command(13, "Unauthorized", "not authorized on admin to execute command"));
        let provisioner = CredentialProvisioner::new(Arc::new(cluster), "admin");
        let err = provisioner
            .ensure_user("animo_app", "s3cret", "readWrite", "animoassign")
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Fatal);
        assert_eq!(err.to_string(), "not authorized on admin to execute command");
    }
}
