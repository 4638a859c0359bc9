//! PostgreSQL session.

use crate::adapter::Adapter;
use crate::driver::{ConnectParams, RelationalSession};
use crate::error::SinkError;
use crate::statement::Statement;
use async_trait::async_trait;
use tokio::task::JoinHandle;
use tokio_postgres::error::SqlState;
use tokio_postgres::{Client, NoTls};

/// A single PostgreSQL client connection.
pub struct PostgresSession {
    client: Client,
    connection_task: JoinHandle<()>,
    address: String,
}

impl PostgresSession {
    pub async fn connect(params: &ConnectParams) -> Result<Self, SinkError> {
        let address = params.address(Adapter::Postgres);
        let mut config = tokio_postgres::Config::new();
        config
            .host(params.host.clone())
            .port(params.port.unwrap_or(Adapter::Postgres.default_port()))
            .user(params.user.clone())
            .password(params.password.clone())
            .dbname(params.database.clone())
            .application_name("squeal-sync")
            .connect_timeout(params.connect_timeout);

        let (client, connection) =
            config
                .connect(NoTls)
                .await
                .map_err(|e| SinkError::Connection {
                    adapter: Adapter::Postgres.to_string(),
                    address: address.clone(),
                    message: e.to_string(),
                })?;

        // Spawn the connection task
        let connection_task = tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::error!("PostgreSQL connection error: {}", e);
            }
        });

        Ok(Self {
            client,
            connection_task,
            address,
        })
    }
}

fn is_transient(e: &tokio_postgres::Error) -> bool {
    if e.is_closed() {
        return true;
    }
    if let Some(code) = e.code() {
        return *code == SqlState::T_R_DEADLOCK_DETECTED
            || *code == SqlState::T_R_SERIALIZATION_FAILURE
            || *code == SqlState::LOCK_NOT_AVAILABLE;
    }
    std::error::Error::source(e)
        .map(|source| source.is::<std::io::Error>())
        .unwrap_or(false)
}

#[async_trait]
impl RelationalSession for PostgresSession {
    fn adapter(&self) -> Adapter {
        Adapter::Postgres
    }

    async fn execute(&self, statement: &Statement) -> Result<u64, SinkError> {
        tracing::trace!("Executing on {}: {}", self.address, statement.sql);
        self.client
            .execute(statement.sql.as_str(), &[])
            .await
            .map_err(|e| SinkError::Write {
                relation: statement.relation.clone(),
                message: e.to_string(),
                transient: is_transient(&e),
            })
    }

    async fn close(&self) {
        tracing::debug!("Closing PostgreSQL connection to {}", self.address);
        self.connection_task.abort();
    }
}
