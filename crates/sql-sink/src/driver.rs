//! Relational driver seam.

use crate::adapter::Adapter;
use crate::error::SinkError;
use crate::mysql::MySqlSession;
use crate::postgresql::PostgresSession;
use crate::statement::Statement;
use async_trait::async_trait;
use std::fmt;
use std::time::Duration;

/// Where and as whom to connect.
#[derive(Clone)]
pub struct ConnectParams {
    pub host: String,
    /// Falls back to the adapter's default port
    pub port: Option<u16>,
    pub user: String,
    pub password: String,
    pub database: String,
    pub connect_timeout: Duration,
}

impl ConnectParams {
    pub fn new(
        host: impl Into<String>,
        user: impl Into<String>,
        password: impl Into<String>,
        database: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            port: None,
            user: user.into(),
            password: password.into(),
            database: database.into(),
            connect_timeout: Duration::from_secs(10),
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// `host:port` for the given adapter.
    pub fn address(&self, adapter: Adapter) -> String {
        format!(
            "{}:{}",
            self.host,
            self.port.unwrap_or_else(|| adapter.default_port())
        )
    }
}

impl fmt::Debug for ConnectParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectParams")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"***")
            .field("database", &self.database)
            .field("connect_timeout", &self.connect_timeout)
            .finish()
    }
}

/// An open session against a relational database.
#[async_trait]
pub trait RelationalSession: Send + Sync {
    fn adapter(&self) -> Adapter;

    /// Execute one statement and return the number of affected rows.
    async fn execute(&self, statement: &Statement) -> Result<u64, SinkError>;

    /// Release the session.
    async fn close(&self);
}

/// Factory for relational sessions.
#[async_trait]
pub trait RelationalConnector: Send + Sync {
    async fn connect(
        &self,
        adapter: Adapter,
        params: &ConnectParams,
    ) -> Result<Box<dyn RelationalSession>, SinkError>;
}

/// Connects to real MySQL and PostgreSQL servers.
#[derive(Debug, Default, Clone, Copy)]
pub struct SqlConnector;

#[async_trait]
impl RelationalConnector for SqlConnector {
    async fn connect(
        &self,
        adapter: Adapter,
        params: &ConnectParams,
    ) -> Result<Box<dyn RelationalSession>, SinkError> {
        let session: Box<dyn RelationalSession> = match adapter {
            Adapter::MySql => Box::new(MySqlSession::connect(params).await?),
            Adapter::Postgres => Box::new(PostgresSession::connect(params).await?),
        };
        tracing::info!(
            "Connected to {} at {} (database '{}')",
            adapter,
            params.address(adapter),
            params.database
        );
        Ok(session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_uses_default_port() {
        let params = ConnectParams::new("db", "root", "secret", "app");
        assert_eq!(params.address(Adapter::MySql), "db:3306");
        assert_eq!(params.address(Adapter::Postgres), "db:5432");
        assert_eq!(params.with_port(13306).address(Adapter::MySql), "db:13306");
    }

    #[test]
    fn test_debug_hides_password() {
        let params = ConnectParams::new("db", "root", "secret", "app");
        assert!(!format!("{params:?}").contains("secret"));
    }
}
