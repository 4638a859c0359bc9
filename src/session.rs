//! Migration session: the active import connection and export target.

use crate::error::MigrationError;
use crate::mapper::RecordMapper;
use sql_sink::{
    Adapter, ConnectParams, ExportTarget, RelationalConnector, SqlConnector, TargetOptions,
};
use sql_sink::SinkError;
use squeal_sync_mongodb_source::{
    Connection, DocumentStoreConnector, MongoConnector, SourceError, SourceOptions,
};
use std::sync::Arc;
use std::time::Duration;
use sync_core::RetryPolicy;

/// Holds at most one live [`Connection`] and one live [`ExportTarget`].
///
/// `import_from` and `export_to` replace the current handle only once the
/// new one is established, then close the old one. A failed call leaves the
/// session as it was.
pub struct MigrationSession {
    source_connector: Arc<dyn DocumentStoreConnector>,
    target_connector: Arc<dyn RelationalConnector>,
    source_options: SourceOptions,
    target_options: TargetOptions,
    connect_retry: RetryPolicy,
    connect_timeout: Duration,
    connection: Option<Connection>,
    target: Option<ExportTarget>,
}

impl Default for MigrationSession {
    fn default() -> Self {
        Self::new()
    }
}

impl MigrationSession {
    /// A session that talks to MongoDB, MySQL and PostgreSQL servers.
    pub fn new() -> Self {
        Self::with_drivers(Arc::new(MongoConnector::default()), Arc::new(SqlConnector))
    }

    pub fn with_drivers(
        source_connector: Arc<dyn DocumentStoreConnector>,
        target_connector: Arc<dyn RelationalConnector>,
    ) -> Self {
        Self {
            source_connector,
            target_connector,
            source_options: SourceOptions::default(),
            target_options: TargetOptions::default(),
            connect_retry: RetryPolicy::no_retry(),
            connect_timeout: Duration::from_secs(10),
            connection: None,
            target: None,
        }
    }

    /// Cursor timeout, cancellation and progress for sources opened later.
    pub fn with_source_options(mut self, options: SourceOptions) -> Self {
        self.source_options = options;
        self
    }

    /// Write timeout and retry for targets opened later.
    pub fn with_target_options(mut self, options: TargetOptions) -> Self {
        self.target_options = options;
        self
    }

    /// Retry transient connection failures in `import_from` / `export_to`.
    pub fn with_connect_retry(mut self, retry: RetryPolicy) -> Self {
        self.connect_retry = retry;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Open a document-store connection and make it the active one.
    pub async fn import_from(
        &mut self,
        host: &str,
        port: u16,
        database: &str,
    ) -> Result<(), MigrationError> {
        let connector = self.source_connector.clone();
        let store = self
            .connect_retry
            .run(
                &format!("connect to {host}:{port}"),
                || connector.connect(host, port, database),
                SourceError::is_transient,
            )
            .await?;
        let connection = Connection::new(store, self.source_options.clone());
        tracing::info!(
            "Importing from {} (database '{}')",
            connection.server_name(),
            connection.database_name()
        );

        if let Some(previous) = self.connection.replace(connection) {
            previous.close().await;
        }
        Ok(())
    }

    /// The active import connection.
    pub fn import(&self) -> Result<&Connection, MigrationError> {
        self.connection
            .as_ref()
            .ok_or(MigrationError::NotConfigured("import connection"))
    }

    /// Open a relational session for `adapter` and make it the active target.
    ///
    /// `host` may carry a port (`db.example:3307`); otherwise the adapter's
    /// default port is used.
    pub async fn export_to(
        &mut self,
        adapter: &str,
        host: &str,
        user: &str,
        password: &str,
        database: &str,
    ) -> Result<(), MigrationError> {
        let adapter: Adapter = adapter.parse()?;
        let mut params = ConnectParams::new(host, user, password, database);
        if let Some((name, port)) = host.rsplit_once(':') {
            if let Ok(port) = port.parse::<u16>() {
                params.host = name.to_string();
                params.port = Some(port);
            }
        }
        self.export_to_params(adapter, params).await
    }

    /// [`export_to`](Self::export_to) with explicit connection parameters.
    pub async fn export_to_params(
        &mut self,
        adapter: Adapter,
        mut params: ConnectParams,
    ) -> Result<(), MigrationError> {
        params.connect_timeout = self.connect_timeout;
        let connector = self.target_connector.clone();
        let session = self
            .connect_retry
            .run(
                &format!("connect to {adapter} at {}", params.address(adapter)),
                || connector.connect(adapter, &params),
                SinkError::is_transient,
            )
            .await?;
        let target = ExportTarget::new(session, self.target_options.clone());
        tracing::info!(
            "Exporting to {} at {} (upsert: {})",
            adapter,
            params.address(adapter),
            target.upsertable()
        );

        if let Some(previous) = self.target.replace(target) {
            previous.close().await;
        }
        Ok(())
    }

    /// The active export target.
    pub fn export(&self) -> Result<&ExportTarget, MigrationError> {
        self.target
            .as_ref()
            .ok_or(MigrationError::NotConfigured("export target"))
    }

    /// Whether the active target accepts insert-or-update statements.
    pub fn upsertable(&self) -> Result<bool, MigrationError> {
        Ok(self.export()?.upsertable())
    }

    /// A mapper writing to the active target.
    pub fn mapper(&self) -> Result<RecordMapper<'_>, MigrationError> {
        Ok(RecordMapper::new(self.export()?))
    }

    /// Close and drop both handles.
    pub async fn close(&mut self) {
        if let Some(connection) = self.connection.take() {
            connection.close().await;
        }
        if let Some(target) = self.target.take() {
            target.close().await;
        }
    }
}
