//! Command-line interface for squeal-sync
//!
//! # Usage Examples
//!
//! ## Migrate
//! ```bash
//! # Run every collection listed in a migration file
//! squeal-sync migrate --config migration.toml
//!
//! # Same file, but write to a local PostgreSQL and skip bad documents
//! squeal-sync migrate --config migration.yaml \
//!   --adapter postgres --target-user postgres --target-database app \
//!   --error-policy skip
//!
//! # Log the statements instead of executing them
//! squeal-sync migrate --config migration.toml --dry-run --json
//! ```
//!
//! ## Inspect the source
//! ```bash
//! squeal-sync eval --source-database app '{"dbStats": 1}'
//! squeal-sync count --source-database app users orders
//! ```

use anyhow::Context;
use clap::{Parser, Subcommand};
use sql_sink::Adapter;
use squeal_sync::{
    run_migration, session_for, MigrationConfig, RuntimeOpts, SourceOpts, TargetOpts,
};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;

#[derive(Parser)]
#[command(name = "squeal-sync")]
#[command(about = "A tool for migrating MongoDB collections into MySQL and PostgreSQL")]
#[command(long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Migrate the collections of a migration file
    Migrate {
        /// Migration file (TOML, or YAML for .yaml / .yml)
        #[arg(long, value_name = "PATH", env = "SQUEAL_CONFIG")]
        config: PathBuf,

        /// Source database connection options
        #[command(flatten)]
        source: SourceOpts,

        /// Target database connection options
        #[command(flatten)]
        target: TargetOpts,

        /// Timeouts, retry and error handling
        #[command(flatten)]
        runtime: RuntimeOpts,

        /// Print the migration report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Run a server-side command (a JSON command document) on the source
    Eval {
        #[command(flatten)]
        source: SourceOpts,

        #[command(flatten)]
        runtime: RuntimeOpts,

        /// Command document, e.g. '{"dbStats": 1}'
        command: String,
    },

    /// Count documents per collection (all collections when none are named)
    Count {
        #[command(flatten)]
        source: SourceOpts,

        #[command(flatten)]
        runtime: RuntimeOpts,

        collections: Vec<String>,
    },

    /// List supported adapters
    Adapters,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = run().await {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}

async fn run() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Migrate {
            config,
            source,
            target,
            runtime,
            json,
        } => {
            let mut config = MigrationConfig::load(&config)?;
            config.merge_opts(&source, &target, &runtime)?;
            run_migrate(config, json).await?;
        }
        Commands::Eval {
            source,
            runtime,
            command,
        } => {
            let config = source_only(&source, &runtime)?;
            let mut session = session_for(&config, CancellationToken::new());
            let result = async {
                connect_source(&mut session, &config).await?;
                let reply = session.import()?.eval(&command).await?;
                println!(
                    "{}",
                    serde_json::to_string_pretty(&reply.into_relaxed_extjson())?
                );
                anyhow::Ok(())
            }
            .await;
            session.close().await;
            result?;
        }
        Commands::Count {
            source,
            runtime,
            collections,
        } => {
            let config = source_only(&source, &runtime)?;
            let mut session = session_for(&config, CancellationToken::new());
            let result = async {
                connect_source(&mut session, &config).await?;
                let connection = session.import()?;
                let names = if collections.is_empty() {
                    connection.collection_names().await?
                } else {
                    collections
                };
                for name in names {
                    println!("{}\t{}", name, connection.total(&name).await?);
                }
                anyhow::Ok(())
            }
            .await;
            session.close().await;
            result?;
        }
        Commands::Adapters => {
            for (adapter, names) in Adapter::table() {
                println!(
                    "{}\tupsert: {}\tdefault port: {}\tnames: {}",
                    adapter,
                    if adapter.upsertable() { "yes" } else { "no" },
                    adapter.default_port(),
                    names.join(", ")
                );
            }
        }
    }

    Ok(())
}

async fn run_migrate(config: MigrationConfig, json: bool) -> anyhow::Result<()> {
    tracing::info!(
        "Starting migration of {} collections",
        config.collections.len()
    );

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, stopping after the current document");
            on_signal.cancel();
        }
    });

    let mut session = session_for(&config, cancel);
    let report = run_migration(&mut session, &config).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    }
    tracing::info!(
        "Migration complete: {} rows exported across {} collections, {} documents skipped",
        report.exported(),
        report.collections.len(),
        report.skipped()
    );
    Ok(())
}

fn source_only(source: &SourceOpts, runtime: &RuntimeOpts) -> anyhow::Result<MigrationConfig> {
    let mut config = MigrationConfig {
        source: Some(source.config().context("--source-database is required")?),
        ..MigrationConfig::default()
    };
    runtime.apply(&mut config.runtime);
    Ok(config)
}

async fn connect_source(
    session: &mut squeal_sync::MigrationSession,
    config: &MigrationConfig,
) -> anyhow::Result<()> {
    let source = config
        .source
        .as_ref()
        .context("No source configured")?;
    session
        .import_from(&source.host, source.port, &source.database)
        .await
        .with_context(|| format!("Failed to connect to {}:{}", source.host, source.port))
}
