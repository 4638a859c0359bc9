//! MySQL / MariaDB session.

use crate::adapter::Adapter;
use crate::driver::{ConnectParams, RelationalSession};
use crate::error::SinkError;
use crate::statement::Statement;
use async_trait::async_trait;
use chrono::{Datelike, Timelike};
use mysql_async::{prelude::*, OptsBuilder, Params, Pool};
use sync_core::Value;

/// ER_LOCK_WAIT_TIMEOUT and ER_LOCK_DEADLOCK
const RETRYABLE_SERVER_CODES: &[u16] = &[1205, 1213];

/// A pooled MySQL session.
pub struct MySqlSession {
    pool: Pool,
    address: String,
}

impl MySqlSession {
    pub async fn connect(params: &ConnectParams) -> Result<Self, SinkError> {
        let address = params.address(Adapter::MySql);
        let opts = OptsBuilder::default()
            .ip_or_hostname(params.host.clone())
            .tcp_port(params.port.unwrap_or(Adapter::MySql.default_port()))
            .user(Some(params.user.clone()))
            .pass(Some(params.password.clone()))
            .db_name(Some(params.database.clone()));
        let pool = Pool::new(opts);

        let connection_error = |message: String| SinkError::Connection {
            adapter: Adapter::MySql.to_string(),
            address: address.clone(),
            message,
        };

        // The pool connects lazily; check out a connection so bad endpoints
        // and credentials fail here.
        let conn = tokio::time::timeout(params.connect_timeout, pool.get_conn())
            .await
            .map_err(|_| connection_error(format!("timed out after {:?}", params.connect_timeout)))?
            .map_err(|e| connection_error(e.to_string()))?;
        drop(conn);

        Ok(Self { pool, address })
    }
}

/// Convert a column value into a MySQL parameter.
pub(crate) fn to_mysql(value: &Value) -> mysql_async::Value {
    match value {
        Value::Null => mysql_async::Value::NULL,
        Value::Bool(b) => mysql_async::Value::Int(*b as i64),
        Value::Int(i) => mysql_async::Value::Int(*i),
        Value::Float(f) => mysql_async::Value::Double(*f),
        Value::Bytes(bytes) => mysql_async::Value::Bytes(bytes.clone()),
        Value::DateTime(dt) => match u16::try_from(dt.year()) {
            Ok(year) => mysql_async::Value::Date(
                year,
                dt.month() as u8,
                dt.day() as u8,
                dt.hour() as u8,
                dt.minute() as u8,
                dt.second() as u8,
                dt.timestamp_subsec_micros(),
            ),
            // year outside the DATETIME range; let the server parse the text
            Err(_) => mysql_async::Value::Bytes(dt.to_rfc3339().into_bytes()),
        },
        other => mysql_async::Value::Bytes(other.to_text().unwrap_or_default().into_bytes()),
    }
}

fn is_transient(e: &mysql_async::Error) -> bool {
    match e {
        mysql_async::Error::Io(_) => true,
        mysql_async::Error::Server(server) => RETRYABLE_SERVER_CODES.contains(&server.code),
        _ => false,
    }
}

#[async_trait]
impl RelationalSession for MySqlSession {
    fn adapter(&self) -> Adapter {
        Adapter::MySql
    }

    async fn execute(&self, statement: &Statement) -> Result<u64, SinkError> {
        let write_error = |e: mysql_async::Error| SinkError::Write {
            relation: statement.relation.clone(),
            message: e.to_string(),
            transient: is_transient(&e),
        };

        let mut conn = self.pool.get_conn().await.map_err(write_error)?;
        let params = if statement.params.is_empty() {
            Params::Empty
        } else {
            Params::Positional(statement.params.iter().map(to_mysql).collect())
        };
        tracing::trace!("Executing on {}: {}", self.address, statement.sql);
        conn.exec_drop(&statement.sql, params)
            .await
            .map_err(write_error)?;
        Ok(conn.affected_rows())
    }

    async fn close(&self) {
        tracing::debug!("Disconnecting MySQL pool for {}", self.address);
        if let Err(e) = self.pool.clone().disconnect().await {
            tracing::warn!("Failed to disconnect MySQL pool for {}: {}", self.address, e);
        }
    }
}
