//! Collection runner: drives sources through the record mapper.

use crate::config::{CollectionConfig, MigrationConfig};
use crate::error::MigrationError;
use crate::mapper::MappingBlock;
use crate::session::MigrationSession;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use sql_sink::{RecordingConnector, RelationalConnector, SqlConnector};
use squeal_sync_mongodb_source::Counts;
use std::sync::Arc;
use sync_core::LogProgress;
use tokio_util::sync::CancellationToken;

/// What to do when a single document cannot be migrated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ErrorPolicy {
    /// Stop the collection at the first failed document
    #[default]
    Abort,
    /// Log the failure and continue with the next document
    Skip,
}

/// Outcome of migrating one collection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CollectionReport {
    pub collection: String,
    pub relation: String,
    pub counts: Counts,
    /// Rows derived from embedded documents
    pub embedded_rows: u64,
    /// Rows written with an insert-or-update statement
    pub upserts: u64,
    /// Documents skipped under [`ErrorPolicy::Skip`]
    pub skipped: u64,
}

/// Outcome of a whole run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MigrationReport {
    pub dry_run: bool,
    pub collections: Vec<CollectionReport>,
}

impl MigrationReport {
    /// Top-level rows written across all collections.
    pub fn exported(&self) -> u64 {
        self.collections.iter().map(|c| c.counts.exported).sum()
    }

    pub fn skipped(&self) -> u64 {
        self.collections.iter().map(|c| c.skipped).sum()
    }
}

/// Migrate every document of `collection` with `block`.
///
/// Under [`ErrorPolicy::Skip`] documents that fail to map or write are logged
/// and counted; failures of the source itself always end the collection.
pub async fn migrate_collection(
    session: &MigrationSession,
    collection: &str,
    block: &MappingBlock,
    policy: ErrorPolicy,
    progress_every: u64,
) -> Result<CollectionReport, MigrationError> {
    let connection = session.import()?;
    let total = connection.total(collection).await?;
    let progress = Arc::new(LogProgress::new(
        format!("{collection} -> {}", block.relation),
        Some(total),
        progress_every,
    ));
    let mut source = connection.source_with_progress(collection, progress).await?;
    let mapper = session.mapper()?.with_tracker(source.tracker());

    tracing::info!(
        "Migrating {} documents from '{}' into '{}'",
        total,
        collection,
        block.relation
    );

    let mut report = CollectionReport {
        collection: collection.to_string(),
        relation: block.relation.clone(),
        counts: source.counts(),
        embedded_rows: 0,
        upserts: 0,
        skipped: 0,
    };

    while let Some(document) = source.next_document().await? {
        match mapper.map(&document, block).await {
            Ok(outcome) => {
                report.embedded_rows += outcome.embedded_rows;
                report.upserts += outcome.upserts;
            }
            Err(e) if policy == ErrorPolicy::Skip && e.is_per_document() => {
                tracing::warn!("Skipping document in '{}': {}", collection, e);
                report.skipped += 1;
            }
            Err(e) => return Err(e),
        }
    }

    report.counts = source.counts();
    tracing::info!(
        "Finished '{}': {} imported, {} exported, {} embedded rows, {} skipped",
        collection,
        report.counts.imported,
        report.counts.exported,
        report.embedded_rows,
        report.skipped
    );
    Ok(report)
}

/// Migrate `collections` in order, stopping at the first collection that fails.
pub async fn run_collections(
    session: &MigrationSession,
    collections: &[CollectionConfig],
    policy: ErrorPolicy,
    progress_every: u64,
) -> anyhow::Result<Vec<CollectionReport>> {
    let mut reports = Vec::with_capacity(collections.len());
    for entry in collections {
        let report = migrate_collection(
            session,
            &entry.collection,
            &entry.mapping,
            policy,
            progress_every,
        )
        .await
        .with_context(|| format!("Failed to migrate collection '{}'", entry.collection))?;
        reports.push(report);
    }
    Ok(reports)
}

/// Connect `session` to the configured source and target, then migrate every
/// configured collection. The session is closed afterwards, also on failure.
pub async fn run_migration(
    session: &mut MigrationSession,
    config: &MigrationConfig,
) -> anyhow::Result<MigrationReport> {
    let result = connect_and_run(session, config).await;
    session.close().await;
    result
}

async fn connect_and_run(
    session: &mut MigrationSession,
    config: &MigrationConfig,
) -> anyhow::Result<MigrationReport> {
    let source = config
        .source
        .as_ref()
        .context("Migration file has no [source] section")?;
    let target = config
        .target
        .as_ref()
        .context("Migration file has no [target] section")?;

    session
        .import_from(&source.host, source.port, &source.database)
        .await
        .with_context(|| format!("Failed to connect to {}:{}", source.host, source.port))?;
    let adapter = target.adapter()?;
    session
        .export_to_params(adapter, target.connect_params())
        .await
        .with_context(|| format!("Failed to connect to {adapter} at {}", target.host))?;

    if config.runtime.dry_run {
        tracing::info!("Running in dry-run mode - no data will be written");
    }

    let collections = run_collections(
        session,
        &config.collections,
        config.runtime.error_policy,
        config.runtime.progress_every,
    )
    .await?;
    Ok(MigrationReport {
        dry_run: config.runtime.dry_run,
        collections,
    })
}

/// A session for `config`: MongoDB as source, and the configured SQL server
/// as target unless the run is a dry run.
pub fn session_for(config: &MigrationConfig, cancel: CancellationToken) -> MigrationSession {
    let runtime = &config.runtime;
    let source_connector = config
        .source
        .as_ref()
        .map(|source| source.connector(runtime.connect_timeout))
        .unwrap_or_default();
    let target_connector: Arc<dyn RelationalConnector> = if runtime.dry_run {
        Arc::new(RecordingConnector::new())
    } else {
        Arc::new(SqlConnector)
    };
    runtime.configure(
        MigrationSession::with_drivers(Arc::new(source_connector), target_connector),
        cancel,
    )
}
