//! Relational export targets for squeal-sync
//!
//! Rows produced by the record mapper are rendered into dialect-specific
//! statements ([`Statement`]) and executed through a [`RelationalSession`].
//! [`ExportTarget`] binds a session to its [`Adapter`] and decides per row
//! whether to insert or upsert.

mod adapter;
mod driver;
mod error;
mod mysql;
mod postgresql;
mod recording;
mod statement;
mod target;

pub use adapter::Adapter;
pub use driver::{ConnectParams, RelationalConnector, RelationalSession, SqlConnector};
pub use error::SinkError;
pub use mysql::MySqlSession;
pub use postgresql::PostgresSession;
pub use recording::{RecordingConnector, RecordingSession};
pub use statement::{Statement, WriteMode};
pub use target::{ExportTarget, TargetOptions};
