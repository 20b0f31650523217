//! Configuration loading and types for rsbootstrap.
//!
//! Configuration may be read from a YAML file and is then overlaid with
//! the process environment, which always wins.  Container deployments
//! usually supply nothing but environment variables, so every field has a
//! default and the file is optional.

use serde::Deserialize;
use std::path::Path;

/// Top-level configuration.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    /// Replica set topology.
    #[serde(default)]
    pub replica_set: ReplicaSetSettings,

    /// Application user to provision.
    #[serde(default)]
    pub credentials: CredentialSettings,

    /// Application database and seed target.
    #[serde(default)]
    pub application: ApplicationSettings,

    /// Administrative connection.
    #[serde(default)]
    pub admin: AdminSettings,

    /// Run behaviour.
    #[serde(default)]
    pub bootstrap: BootstrapSettings,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Replica set topology.
#[derive(Debug, Clone, Deserialize)]
pub struct ReplicaSetSettings {
    /// Replica set identifier (`_id` of the initial configuration).
    #[serde(default = "default_replica_set")]
    pub name: String,

    /// `host:port` of the priority-2 member.
    #[serde(default = "default_primary")]
    pub primary: String,

    /// `host:port` of the optional priority-1 member.
    #[serde(default)]
    pub secondary: Option<String>,
}

impl Default for ReplicaSetSettings {
    fn default() -> Self {
        Self {
            name: default_replica_set(),
            primary: default_primary(),
            secondary: None,
        }
    }
}

/// Application user settings. Provisioning only happens when both
/// `username` and `password` are set.
#[derive(Debug, Clone, Deserialize)]
pub struct CredentialSettings {
    #[serde(default)]
    pub username: Option<String>,

    #[serde(default)]
    pub password: Option<String>,

    /// Role granted on the application database.
    #[serde(default = "default_role")]
    pub role: String,

    /// Database the user is created in.
    #[serde(default = "default_auth_database")]
    pub auth_database: String,
}

impl Default for CredentialSettings {
    fn default() -> Self {
        Self {
            username: None,
            password: None,
            role: default_role(),
            auth_database: default_auth_database(),
        }
    }
}

/// Application database settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ApplicationSettings {
    #[serde(default = "default_app_database")]
    pub database: String,

    /// Collection that receives the demo seed records.
    #[serde(default = "default_seed_collection")]
    pub seed_collection: String,
}

impl Default for ApplicationSettings {
    fn default() -> Self {
        Self {
            database: default_app_database(),
            seed_collection: default_seed_collection(),
        }
    }
}

/// Administrative connection settings.
#[derive(Debug, Clone, Deserialize)]
pub struct AdminSettings {
    /// Backend type: `mongodb` or `memory`.
    #[serde(default = "default_backend")]
    pub backend: String,

    /// Connection string. Derived from the primary address when unset.
    #[serde(default)]
    pub uri: Option<String>,
}

impl Default for AdminSettings {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            uri: None,
        }
    }
}

/// Run behaviour.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct BootstrapSettings {
    /// Cap on primary polling attempts. Unset means poll forever.
    #[serde(default)]
    pub max_primary_attempts: Option<u32>,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: text or json.
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

/// Resolved application user credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppCredentials {
    pub username: String,
    pub password: String,
}

impl Config {
    /// Credentials, if both halves are configured.
    pub fn app_credentials(&self) -> Option<AppCredentials> {
        match (&self.credentials.username, &self.credentials.password) {
            (Some(username), Some(password)) => Some(AppCredentials {
                username: username.clone(),
                password: password.clone(),
            }),
            _ => None,
        }
    }

    /// Connection string for the administrative session.
    ///
    /// Direct connection is required: before initiation the node is not
    /// part of any replica set and topology discovery would never finish.
    pub fn admin_uri(&self) -> String {
        self.admin
            .uri
            .clone()
            .unwrap_or_else(|| format!("mongodb://{}/?directConnection=true", self.replica_set.primary))
    }

    /// Overlay environment values onto this configuration.
    ///
    /// `lookup` returns the raw value of a variable; empty strings are
    /// treated as unset.
    pub fn apply_env<F>(&mut self, lookup: F) -> anyhow::Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.is_empty());

        if let Some(v) = get("MONGO_REPLICA_SET") {
            self.replica_set.name = v;
        }
        if let Some(v) = get("MONGO_PRIMARY_NODE") {
            self.replica_set.primary = v;
        }
        if let Some(v) = get("MONGO_SECONDARY_NODE") {
            self.replica_set.secondary = Some(v);
        }
        if let Some(v) = get("APP_MONGODB_USERNAME") {
            self.credentials.username = Some(v);
        }
        if let Some(v) = get("APP_MONGODB_PASSWORD") {
            self.credentials.password = Some(v);
        }
        // `MONGODB_URI` is the application services' connection string.
        if let Some(v) = get("BOOTSTRAP_MONGODB_URI") {
            self.admin.uri = Some(v);
        }
        if let Some(v) = get("APP_DB_NAME") {
            self.application.database = v;
        }
        if let Some(v) = get("BOOTSTRAP_BACKEND") {
            self.admin.backend = v;
        }
        if let Some(v) = get("BOOTSTRAP_MAX_PRIMARY_ATTEMPTS") {
            let attempts: u32 = v
                .parse()
                .map_err(|_| anyhow::anyhow!("BOOTSTRAP_MAX_PRIMARY_ATTEMPTS is not a number: {v}"))?;
            self.bootstrap.max_primary_attempts = Some(attempts);
        }
        Ok(())
    }

    /// Normalise blank optionals and reject unusable topology settings.
    pub fn validate(&mut self) -> anyhow::Result<()> {
        for slot in [
            &mut self.replica_set.secondary,
            &mut self.credentials.username,
            &mut self.credentials.password,
            &mut self.admin.uri,
        ] {
            if slot.as_deref().is_some_and(|s| s.trim().is_empty()) {
                *slot = None;
            }
        }

        if self.replica_set.name.trim().is_empty() {
            anyhow::bail!("replica set name must not be empty");
        }
        if self.replica_set.primary.trim().is_empty() {
            anyhow::bail!("primary node address must not be empty");
        }
        if !matches!(self.admin.backend.as_str(), "mongodb" | "memory") {
            anyhow::bail!(
                "admin.backend must be 'mongodb' or 'memory', got '{}'",
                self.admin.backend
            );
        }
        if self.bootstrap.max_primary_attempts == Some(0) {
            anyhow::bail!("max_primary_attempts must be at least 1 when set");
        }
        Ok(())
    }
}

// -- Defaults ----------------------------------------------------------------

fn default_replica_set() -> String {
    "animoassignRS".to_string()
}

fn default_primary() -> String {
    "mongo-primary:27017".to_string()
}

fn default_role() -> String {
    "readWrite".to_string()
}

fn default_auth_database() -> String {
    "admin".to_string()
}

fn default_app_database() -> String {
    "animoassign".to_string()
}

fn default_seed_collection() -> String {
    "assignments".to_string()
}

fn default_backend() -> String {
    "mongodb".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

// -- Loader ------------------------------------------------------------------

/// Load and parse configuration from a YAML file at `path`.
pub fn load_config<P: AsRef<Path>>(path: P) -> anyhow::Result<Config> {
    let contents = std::fs::read_to_string(path.as_ref())?;
    let config: Config = serde_yaml::from_str(&contents)?;
    Ok(config)
}

/// Resolve the effective configuration: optional file, then `lookup`
/// overlay, then validation.
pub fn resolve<F>(path: Option<&Path>, lookup: F) -> anyhow::Result<Config>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = match path {
        Some(p) => load_config(p)?,
        None => Config::default(),
    };
    config.apply_env(lookup)?;
    config.validate()?;
    Ok(config)
}

/// Resolve against the real process environment.
pub fn resolve_from_env(path: Option<&Path>) -> anyhow::Result<Config> {
    resolve(path, |name| std::env::var(name).ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| map.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = resolve(None, env(&[])).unwrap();
        assert_eq!(config.replica_set.name, "animoassignRS");
        assert_eq!(config.replica_set.primary, "mongo-primary:27017");
        assert!(config.replica_set.secondary.is_none());
        assert!(config.app_credentials().is_none());
        assert_eq!(config.application.database, "animoassign");
        assert_eq!(config.application.seed_collection, "assignments");
        assert_eq!(config.credentials.role, "readWrite");
        assert_eq!(config.admin.backend, "mongodb");
        assert_eq!(
            config.admin_uri(),
            "mongodb://mongo-primary:27017/?directConnection=true"
        );
        assert!(config.bootstrap.max_primary_attempts.is_none());
    }

    #[test]
    fn test_env_overrides() {
        let config = resolve(
            None,
            env(&[
                ("MONGO_REPLICA_SET", "rs0"),
                ("MONGO_PRIMARY_NODE", "db-a:27017"),
                ("MONGO_SECONDARY_NODE", "db-b:27017"),
                ("APP_MONGODB_USERNAME", "app"),
                ("APP_MONGODB_PASSWORD", "s3cret"),
                ("BOOTSTRAP_MAX_PRIMARY_ATTEMPTS", "40"),
            ]),
        )
        .unwrap();
        assert_eq!(config.replica_set.name, "rs0");
        assert_eq!(config.replica_set.secondary.as_deref(), Some("db-b:27017"));
        assert_eq!(
            config.app_credentials(),
            Some(AppCredentials {
                username: "app".into(),
                password: "s3cret".into()
            })
        );
        assert_eq!(config.admin_uri(), "mongodb://db-a:27017/?directConnection=true");
        assert_eq!(config.bootstrap.max_primary_attempts, Some(40));
    }

    #[test]
    fn test_empty_env_values_are_unset() {
        let config = resolve(
            None,
            env(&[("MONGO_SECONDARY_NODE", ""), ("MONGO_REPLICA_SET", "")]),
        )
        .unwrap();
        assert!(config.replica_set.secondary.is_none());
        assert_eq!(config.replica_set.name, "animoassignRS");
    }

    #[test]
    fn test_username_without_password_disables_provisioning() {
        let config = resolve(None, env(&[("APP_MONGODB_USERNAME", "app")])).unwrap();
        assert!(config.app_credentials().is_none());
    }

    #[test]
    fn test_file_then_env() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "replica_set:\n  name: fromfile\n  secondary: \"\"\nadmin:\n  uri: mongodb://file:1/\nlogging:\n  format: json"
        )
        .unwrap();

        let config = resolve(Some(file.path()), env(&[("BOOTSTRAP_MONGODB_URI", "mongodb://env:2/")])).unwrap();
        assert_eq!(config.replica_set.name, "fromfile");
        assert!(config.replica_set.secondary.is_none());
        assert_eq!(config.admin_uri(), "mongodb://env:2/");
        assert_eq!(config.logging.format, "json");
    }

    #[test]
    fn test_rejects_bad_attempts() {
        assert!(resolve(None, env(&[("BOOTSTRAP_MAX_PRIMARY_ATTEMPTS", "many")])).is_err());
        assert!(resolve(None, env(&[("BOOTSTRAP_MAX_PRIMARY_ATTEMPTS", "0")])).is_err());
    }

    #[test]
    fn test_application_uri_does_not_replace_admin_uri() {
        let config = resolve(
            None,
            env(&[(
                "MONGODB_URI",
                "mongodb://animo_app:pw@mongo-primary:27017,mongo-secondary:27017/animoassign?replicaSet=animoassignRS",
            )]),
        )
        .unwrap();
        assert_eq!(
            config.admin_uri(),
            "mongodb://mongo-primary:27017/?directConnection=true"
        );
        assert!(config.admin.uri.is_none());
    }

    #[test]
    fn test_rejects_unknown_backend() {
        let err = resolve(None, env(&[("BOOTSTRAP_BACKEND", "etcd")])).unwrap_err();
        assert!(err.to_string().contains("etcd"));
        let config = resolve(None, env(&[("BOOTSTRAP_BACKEND", "memory")])).unwrap();
        assert_eq!(config.admin.backend, "memory");
    }
}
