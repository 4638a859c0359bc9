//! Export target: a relational session bound to its adapter.

use crate::adapter::Adapter;
use crate::driver::RelationalSession;
use crate::error::SinkError;
use crate::statement::{Statement, WriteMode};
use std::fmt;
use std::time::Duration;
use sync_core::{RetryPolicy, Row};

/// Write behaviour of an [`ExportTarget`].
#[derive(Debug, Clone, Default)]
pub struct TargetOptions {
    /// Upper bound for a single statement
    pub write_timeout: Option<Duration>,
    /// Applied to transient write failures only
    pub retry: RetryPolicy,
}

/// Executes mapped rows against the relational target.
pub struct ExportTarget {
    adapter: Adapter,
    upsertable: bool,
    session: Box<dyn RelationalSession>,
    options: TargetOptions,
}

impl ExportTarget {
    pub fn new(session: Box<dyn RelationalSession>, options: TargetOptions) -> Self {
        let adapter = session.adapter();
        Self {
            adapter,
            upsertable: adapter.upsertable(),
            session,
            options,
        }
    }

    pub fn adapter(&self) -> Adapter {
        self.adapter
    }

    /// Fixed when the target is created.
    pub fn upsertable(&self) -> bool {
        self.upsertable
    }

    /// Write one row, upserting when the adapter allows it and the row has an id.
    pub async fn write(&self, row: &Row) -> Result<WriteMode, SinkError> {
        let mode = WriteMode::choose(self.adapter, row);
        let statement = Statement::build(self.adapter, row, mode)?;
        tracing::trace!("{:?} into '{}': {}", mode, row.relation, statement.sql);

        self.options
            .retry
            .run(
                &format!("write to '{}'", row.relation),
                || self.execute_once(&statement),
                SinkError::is_transient,
            )
            .await?;
        Ok(mode)
    }

    /// Execute a pre-rendered statement.
    pub async fn execute(&self, statement: &Statement) -> Result<u64, SinkError> {
        self.execute_once(statement).await
    }

    async fn execute_once(&self, statement: &Statement) -> Result<u64, SinkError> {
        match self.options.write_timeout {
            Some(timeout) => tokio::time::timeout(timeout, self.session.execute(statement))
                .await
                .map_err(|_| SinkError::Timeout {
                    relation: statement.relation.clone(),
                    timeout,
                })?,
            None => self.session.execute(statement).await,
        }
    }

    pub async fn close(&self) {
        self.session.close().await;
    }
}

impl fmt::Debug for ExportTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExportTarget")
            .field("adapter", &self.adapter)
            .field("upsertable", &self.upsertable)
            .field("options", &self.options)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recording::RecordingConnector;
    use sync_core::Value;

    fn target(connector: &RecordingConnector, adapter: Adapter) -> ExportTarget {
        let options = TargetOptions {
            write_timeout: None,
            retry: RetryPolicy {
                jitter: false,
                ..RetryPolicy::default()
            },
        };
        ExportTarget::new(Box::new(connector.session(adapter)), options)
    }

    fn row() -> Row {
        let mut row = Row::new("user", Some("u1".to_string()));
        row.push("name", "Ann");
        row
    }

    #[tokio::test]
    async fn test_mysql_target_upserts_rows_with_id() {
        let connector = RecordingConnector::new();
        let target = target(&connector, Adapter::MySql);
        assert!(target.upsertable());
        assert_eq!(target.write(&row()).await.unwrap(), WriteMode::Upsert);

        let keyless = Row::new("tag", None);
        assert_eq!(target.write(&keyless).await.unwrap(), WriteMode::Insert);

        let sql = &connector.statements()[0].sql;
        assert!(sql.contains("ON DUPLICATE KEY UPDATE"));
    }

    #[tokio::test]
    async fn test_postgres_target_inserts() {
        let connector = RecordingConnector::new();
        let target = target(&connector, Adapter::Postgres);
        assert!(!target.upsertable());
        assert_eq!(target.write(&row()).await.unwrap(), WriteMode::Insert);
        assert_eq!(
            connector.statements()[0].sql,
            "INSERT INTO \"user\" (\"id\", \"name\") VALUES ('u1', 'Ann')"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_failures_are_retried() {
        let connector = RecordingConnector::new();
        let target = target(&connector, Adapter::MySql);
        connector.fail_transiently(2);
        target.write(&row()).await.unwrap();
        assert_eq!(connector.statements().len(), 1);
        assert_eq!(connector.statements()[0].params[0], Value::Text("u1".into()));
    }

    #[tokio::test]
    async fn test_permanent_failure_surfaces() {
        let connector = RecordingConnector::new();
        let target = target(&connector, Adapter::MySql);
        connector.fail_relation("user");
        assert!(matches!(
            target.write(&row()).await,
            Err(SinkError::Write {
                transient: false,
                ..
            })
        ));
        assert!(connector.statements().is_empty());
    }
}
