//! SquealSync Library
//!
//! A library for migrating MongoDB collections into relational databases
//! (MySQL / MariaDB and PostgreSQL).
//!
//! # Features
//!
//! - Record mapping: documents become rows, embedded documents become child
//!   rows linked to their parent through a foreign-key column
//! - Upserts where the target supports them (MySQL), plain inserts otherwise
//! - Progress counters per collection (total / imported / exported)
//! - Dry runs that log the generated statements instead of executing them
//!
//! # Crates
//!
//! - `sync_core` - values, rows, progress sinks and retry policy
//! - `mongodb_types` - BSON to relational value conversion
//! - `squeal_sync_mongodb_source` - document-store connections and sources
//! - `sql_sink` - adapters, statement rendering and export targets
//!
//! # CLI Usage
//!
//! ```bash
//! # Run a migration file
//! squeal-sync migrate --config migration.toml
//!
//! # Override the target and preview the statements
//! squeal-sync migrate --config migration.toml --adapter postgres --target-database app --dry-run
//!
//! # Ask the source server something
//! squeal-sync eval --source-database app '{"dbStats": 1}'
//! ```

use clap::Parser;
use std::time::Duration;

pub mod config;
pub mod error;
pub mod mapper;
pub mod migrate;
pub mod session;

pub use config::{CollectionConfig, MigrationConfig, RuntimeConfig, SourceConfig, TargetConfig};
pub use error::{MappingError, MigrationError};
pub use mapper::{FieldAssignment, MappingBlock, MappingOutcome, NestedBlock, RecordMapper};
pub use migrate::{
    migrate_collection, run_collections, run_migration, session_for, CollectionReport,
    ErrorPolicy, MigrationReport,
};
pub use session::MigrationSession;

/// Document store to read from.
#[derive(Parser, Clone, Debug)]
pub struct SourceOpts {
    /// MongoDB host
    #[arg(long, default_value = "localhost", env = "SQUEAL_SOURCE_HOST")]
    pub source_host: String,

    /// MongoDB port
    #[arg(long, default_value = "27017", env = "SQUEAL_SOURCE_PORT")]
    pub source_port: u16,

    /// MongoDB database (overrides the migration file's [source] when set)
    #[arg(long, env = "SQUEAL_SOURCE_DATABASE")]
    pub source_database: Option<String>,

    /// MongoDB username
    #[arg(long, env = "SQUEAL_SOURCE_USERNAME")]
    pub source_username: Option<String>,

    /// MongoDB password
    #[arg(long, env = "SQUEAL_SOURCE_PASSWORD", hide_env_values = true)]
    pub source_password: Option<String>,

    /// Database holding the MongoDB user's credentials
    #[arg(long, env = "SQUEAL_SOURCE_AUTH_SOURCE")]
    pub source_auth_source: Option<String>,
}

/// Relational database to write to.
#[derive(Parser, Clone, Debug)]
pub struct TargetOpts {
    /// Adapter name: mysql, mysql2, mariadb, postgres, postgresql or pg
    /// (overrides the migration file's [target] when set)
    #[arg(long, env = "SQUEAL_TARGET_ADAPTER")]
    pub adapter: Option<String>,

    /// Target host
    #[arg(long, default_value = "localhost", env = "SQUEAL_TARGET_HOST")]
    pub target_host: String,

    /// Target port (adapter default when unset)
    #[arg(long, env = "SQUEAL_TARGET_PORT")]
    pub target_port: Option<u16>,

    /// Target user
    #[arg(long, default_value = "root", env = "SQUEAL_TARGET_USER")]
    pub target_user: String,

    /// Target password
    #[arg(long, default_value = "", env = "SQUEAL_TARGET_PASSWORD", hide_env_values = true)]
    pub target_password: String,

    /// Target database
    #[arg(long, env = "SQUEAL_TARGET_DATABASE")]
    pub target_database: Option<String>,
}

/// Timeouts, retry and error handling.
#[derive(Parser, Clone, Debug, Default)]
pub struct RuntimeOpts {
    /// Connect timeout, e.g. "10s"
    #[arg(long, value_parser = parse_duration_arg)]
    pub connect_timeout: Option<Duration>,

    /// Upper bound for a single cursor step, e.g. "30s"
    #[arg(long, value_parser = parse_duration_arg)]
    pub cursor_timeout: Option<Duration>,

    /// Upper bound for a single statement, e.g. "30s"
    #[arg(long, value_parser = parse_duration_arg)]
    pub write_timeout: Option<Duration>,

    /// Retries for transient connect and write failures
    #[arg(long)]
    pub max_retries: Option<u32>,

    /// What to do with documents that fail to migrate
    #[arg(long, value_enum)]
    pub error_policy: Option<ErrorPolicy>,

    /// Dry run mode - log statements instead of executing them
    #[arg(long)]
    pub dry_run: bool,

    /// Log progress every N exported rows
    #[arg(long)]
    pub progress_every: Option<u64>,
}

fn parse_duration_arg(s: &str) -> Result<Duration, String> {
    config::duration::parse_duration(s).map_err(|e| format!("{e:#}"))
}

impl SourceOpts {
    /// Source section built from the flags, if a database was given.
    pub fn config(&self) -> Option<SourceConfig> {
        let database = self.source_database.clone()?;
        Some(SourceConfig {
            host: self.source_host.clone(),
            port: self.source_port,
            database,
            username: self.source_username.clone(),
            password: self.source_password.clone(),
            auth_source: self.source_auth_source.clone(),
        })
    }
}

impl TargetOpts {
    /// Target section built from the flags, if an adapter was given.
    pub fn config(&self) -> anyhow::Result<Option<TargetConfig>> {
        let Some(adapter) = self.adapter.clone() else {
            return Ok(None);
        };
        let database = self
            .target_database
            .clone()
            .ok_or_else(|| anyhow::anyhow!("--target-database is required with --adapter"))?;
        Ok(Some(TargetConfig {
            adapter,
            host: self.target_host.clone(),
            port: self.target_port,
            user: self.target_user.clone(),
            password: self.target_password.clone(),
            database,
        }))
    }
}

impl RuntimeOpts {
    /// Overlay the flags that were given onto `runtime`.
    pub fn apply(&self, runtime: &mut RuntimeConfig) {
        if let Some(timeout) = self.connect_timeout {
            runtime.connect_timeout = timeout;
        }
        if let Some(timeout) = self.cursor_timeout {
            runtime.cursor_timeout = Some(timeout);
        }
        if let Some(timeout) = self.write_timeout {
            runtime.write_timeout = Some(timeout);
        }
        if let Some(retries) = self.max_retries {
            runtime.max_retries = retries;
        }
        if let Some(policy) = self.error_policy {
            runtime.error_policy = policy;
        }
        if self.dry_run {
            runtime.dry_run = true;
        }
        if let Some(every) = self.progress_every {
            runtime.progress_every = every;
        }
    }
}

// CLI flags → migration file sections
impl MigrationConfig {
    /// Replace the file's sections with the ones given on the command line.
    pub fn merge_opts(
        &mut self,
        source: &SourceOpts,
        target: &TargetOpts,
        runtime: &RuntimeOpts,
    ) -> anyhow::Result<()> {
        if let Some(source) = source.config() {
            self.source = Some(source);
        }
        if let Some(target) = target.config()? {
            self.target = Some(target);
        }
        runtime.apply(&mut self.runtime);
        Ok(self.validate()?)
    }
}
