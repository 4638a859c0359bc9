//! Error types for relational export targets.

use std::time::Duration;
use thiserror::Error;

/// Errors raised while connecting to or writing into the relational target.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SinkError {
    /// The adapter name is not in the capability table.
    #[error("Unsupported adapter '{0}' (expected one of: {names})", names = crate::Adapter::names().join(", "))]
    UnsupportedAdapter(String),

    /// Network or authentication failure.
    #[error("Failed to connect to {adapter} at {address}: {message}")]
    Connection {
        adapter: String,
        address: String,
        message: String,
    },

    /// The statement was rejected or the connection dropped mid-write.
    #[error("Write to '{relation}' failed: {message}")]
    Write {
        relation: String,
        message: String,
        /// Connectivity loss, deadlock or lock timeout
        transient: bool,
    },

    /// The statement did not complete within the write timeout.
    #[error("Write to '{relation}' timed out after {timeout:?}")]
    Timeout { relation: String, timeout: Duration },
}

impl SinkError {
    /// Whether retrying the same call may succeed.
    ///
    /// Constraint violations and other rejected statements are permanent.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::UnsupportedAdapter(_) => false,
            Self::Connection { .. } | Self::Timeout { .. } => true,
            Self::Write { transient, .. } => *transient,
        }
    }
}
