//! Error types for the document source.

use std::time::Duration;
use thiserror::Error;

/// Errors raised while talking to the document store.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SourceError {
    /// The store is unreachable or rejected the credentials.
    #[error("Failed to connect to document store at {address}: {message}")]
    Connection { address: String, message: String },

    /// A server-side command was malformed or failed.
    #[error("Command evaluation failed: {0}")]
    Eval(String),

    /// The store reports that the collection does not exist.
    #[error("Collection '{0}' not found")]
    CollectionNotFound(String),

    /// Counting, opening or advancing a cursor failed.
    #[error("Cursor over '{collection}' failed: {message}")]
    Cursor { collection: String, message: String },

    /// The store did not answer within the configured timeout.
    #[error("Timed out after {timeout:?} waiting for '{collection}'")]
    Timeout {
        collection: String,
        timeout: Duration,
    },

    /// Iteration stopped because the run was cancelled.
    #[error("Iteration over '{0}' was cancelled")]
    Cancelled(String),
}

impl SourceError {
    pub(crate) fn cursor(collection: &str, err: impl std::fmt::Display) -> Self {
        Self::Cursor {
            collection: collection.to_string(),
            message: err.to_string(),
        }
    }

    /// Whether retrying the same call may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Connection { .. } | Self::Timeout { .. })
    }
}
