//! Migration file: source, target, runtime settings and collection mappings.
//!
//! ```toml
//! [source]
//! host = "localhost"
//! database = "app"
//!
//! [target]
//! adapter = "mysql"
//! host = "localhost"
//! user = "root"
//! password = "root"
//! database = "app"
//!
//! [runtime]
//! write_timeout = "30s"
//! error_policy = "skip"
//!
//! [[collections]]
//! collection = "users"
//! [collections.mapping]
//! relation = "user"
//! fields = ["name"]
//! ```
//!
//! Files ending in `.yaml` / `.yml` are read as YAML, everything else as TOML.

pub mod duration;

use crate::error::{MappingError, MigrationError};
use crate::mapper::MappingBlock;
use crate::migrate::ErrorPolicy;
use crate::session::MigrationSession;
use anyhow::Context;
use serde::Deserialize;
use sql_sink::{Adapter, ConnectParams, TargetOptions};
use squeal_sync_mongodb_source::{MongoConnector, SourceOptions};
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use sync_core::{ProgressSink, RetryPolicy};
use tokio_util::sync::CancellationToken;

/// A whole migration run.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MigrationConfig {
    #[serde(default)]
    pub source: Option<SourceConfig>,
    #[serde(default)]
    pub target: Option<TargetConfig>,
    #[serde(default)]
    pub runtime: RuntimeConfig,
    #[serde(default)]
    pub collections: Vec<CollectionConfig>,
}

/// Document store to import from.
#[derive(Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SourceConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_mongodb_port")]
    pub port: u16,
    pub database: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub auth_source: Option<String>,
}

/// Relational database to export to.
#[derive(Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TargetConfig {
    pub adapter: String,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default)]
    pub port: Option<u16>,
    pub user: String,
    #[serde(default)]
    pub password: String,
    pub database: String,
}

/// Timeouts, retry and error handling for a run.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RuntimeConfig {
    #[serde(deserialize_with = "duration::deserialize")]
    pub connect_timeout: Duration,
    #[serde(deserialize_with = "duration::deserialize_option")]
    pub cursor_timeout: Option<Duration>,
    #[serde(deserialize_with = "duration::deserialize_option")]
    pub write_timeout: Option<Duration>,
    /// Retries for transient connect and write failures
    pub max_retries: u32,
    #[serde(deserialize_with = "duration::deserialize")]
    pub retry_initial_delay: Duration,
    #[serde(deserialize_with = "duration::deserialize")]
    pub retry_max_delay: Duration,
    pub error_policy: ErrorPolicy,
    /// Log statements instead of executing them
    pub dry_run: bool,
    /// Log progress every N exported rows
    pub progress_every: u64,
}

/// One collection and the mapping applied to its documents.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CollectionConfig {
    pub collection: String,
    pub mapping: MappingBlock,
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_mongodb_port() -> u16 {
    27017
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        let retry = RetryPolicy::default();
        Self {
            connect_timeout: Duration::from_secs(10),
            cursor_timeout: None,
            write_timeout: None,
            max_retries: retry.max_retries,
            retry_initial_delay: retry.initial_delay,
            retry_max_delay: retry.max_delay,
            error_policy: ErrorPolicy::default(),
            dry_run: false,
            progress_every: 1000,
        }
    }
}

impl RuntimeConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            initial_delay: self.retry_initial_delay,
            max_delay: self.retry_max_delay,
            ..RetryPolicy::default()
        }
    }

    pub fn source_options(
        &self,
        cancel: CancellationToken,
        progress: Arc<dyn ProgressSink>,
    ) -> SourceOptions {
        SourceOptions {
            cursor_timeout: self.cursor_timeout,
            cancel,
            progress,
        }
    }

    pub fn target_options(&self) -> TargetOptions {
        TargetOptions {
            write_timeout: self.write_timeout,
            retry: self.retry_policy(),
        }
    }

    /// Apply timeouts, retry and cancellation to a session.
    pub fn configure(&self, session: MigrationSession, cancel: CancellationToken) -> MigrationSession {
        session
            .with_source_options(self.source_options(cancel, Arc::new(sync_core::NoopProgress)))
            .with_target_options(self.target_options())
            .with_connect_retry(self.retry_policy())
            .with_connect_timeout(self.connect_timeout)
    }
}

impl SourceConfig {
    pub fn connector(&self, connect_timeout: Duration) -> MongoConnector {
        MongoConnector {
            username: self.username.clone(),
            password: self.password.clone(),
            auth_source: self.auth_source.clone(),
            connect_timeout,
        }
    }
}

impl TargetConfig {
    pub fn adapter(&self) -> Result<Adapter, MigrationError> {
        Ok(self.adapter.parse()?)
    }

    pub fn connect_params(&self) -> ConnectParams {
        let params = ConnectParams::new(&self.host, &self.user, &self.password, &self.database);
        match self.port {
            Some(port) => params.with_port(port),
            None => params,
        }
    }
}

impl MigrationConfig {
    /// Read and validate a migration file.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read migration file {}", path.display()))?;

        let is_yaml = matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("yaml") | Some("yml")
        );
        let config: Self = if is_yaml {
            serde_yaml::from_str(&text)
                .with_context(|| format!("Failed to parse YAML in {}", path.display()))?
        } else {
            toml::from_str(&text)
                .with_context(|| format!("Failed to parse TOML in {}", path.display()))?
        };

        config
            .validate()
            .with_context(|| format!("Invalid migration file {}", path.display()))?;
        Ok(config)
    }

    /// Check the adapter name and every mapping block.
    pub fn validate(&self) -> Result<(), MigrationError> {
        if let Some(target) = &self.target {
            target.adapter()?;
        }

        let mut seen = HashSet::new();
        for entry in &self.collections {
            if entry.collection.trim().is_empty() {
                return Err(MigrationError::Config(
                    "collection name is empty".to_string(),
                ));
            }
            if !seen.insert(entry.collection.as_str()) {
                return Err(MigrationError::Config(format!(
                    "collection '{}' is listed more than once",
                    entry.collection
                )));
            }
            entry
                .mapping
                .validate()
                .map_err(|e: MappingError| {
                    MigrationError::Config(format!("collection '{}': {e}", entry.collection))
                })?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for SourceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("auth_source", &self.auth_source)
            .finish()
    }
}

impl std::fmt::Debug for TargetConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TargetConfig")
            .field("adapter", &self.adapter)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"***")
            .field("database", &self.database)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOML: &str = r#"
        [source]
        database = "app"

        [target]
        adapter = "MariaDB"
        host = "db"
        port = 3307
        user = "root"
        database = "app"

        [runtime]
        write_timeout = "2s"
        retry_initial_delay = "50ms"
        error_policy = "skip"

        [[collections]]
        collection = "users"
        [collections.mapping]
        relation = "user"
        fields = ["name"]
    "#;

    #[test]
    fn test_parse_toml() {
        let config: MigrationConfig = toml::from_str(TOML).unwrap();
        config.validate().unwrap();

        let source = config.source.as_ref().unwrap();
        assert_eq!(source.host, "localhost");
        assert_eq!(source.port, 27017);

        let target = config.target.as_ref().unwrap();
        assert_eq!(target.adapter().unwrap(), Adapter::MySql);
        assert_eq!(target.connect_params().address(Adapter::MySql), "db:3307");

        assert_eq!(config.runtime.write_timeout, Some(Duration::from_secs(2)));
        assert_eq!(config.runtime.error_policy, ErrorPolicy::Skip);
        assert_eq!(config.runtime.progress_every, 1000);
        assert_eq!(
            config.runtime.retry_policy().initial_delay,
            Duration::from_millis(50)
        );
        assert_eq!(config.collections[0].mapping.relation, "user");
    }

    #[test]
    fn test_validate_rejects_unknown_adapter() {
        let config: MigrationConfig =
            toml::from_str(&TOML.replace("MariaDB", "sqlite")).unwrap();
        assert!(matches!(
            config.validate(),
            Err(MigrationError::Sink(sql_sink::SinkError::UnsupportedAdapter(_)))
        ));
    }

    #[test]
    fn test_validate_rejects_duplicate_collections() {
        let mut config: MigrationConfig = toml::from_str(TOML).unwrap();
        config.collections.push(config.collections[0].clone());
        assert!(matches!(config.validate(), Err(MigrationError::Config(_))));
    }

    #[test]
    fn test_unknown_keys_are_rejected() {
        assert!(toml::from_str::<MigrationConfig>("[runtime]\nretries = 3").is_err());
    }

    #[test]
    fn test_debug_hides_passwords() {
        let config: MigrationConfig =
            toml::from_str(&TOML.replace("user = \"root\"", "user = \"root\"\npassword = \"hunter2\""))
                .unwrap();
        let rendered = format!("{:?}", config.target);
        assert!(!rendered.contains("hunter2"));
    }
}
