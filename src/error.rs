//! Error types for mapping and migration.

use sql_sink::SinkError;
use squeal_sync_mongodb_source::SourceError;
use thiserror::Error;

/// A document does not fit the mapping declared for it.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MappingError {
    /// The document has no `_id` but one is required (top-level documents,
    /// and embedded documents that have nested blocks of their own).
    #[error("Document mapped to '{relation}' has no '_id'")]
    MissingIdentity { relation: String },

    /// A nested block's accessor does not resolve to embedded documents.
    #[error("Embedded accessor '{accessor}' on '{relation}' (row {row_id}) {problem}", row_id = .row_id.as_deref().unwrap_or("-"))]
    EmbeddedAccessor {
        relation: String,
        accessor: String,
        row_id: Option<String>,
        problem: String,
    },

    /// A field assignment is malformed or its value cannot be converted.
    #[error("Invalid assignment for column '{column}' of '{relation}': {message}")]
    InvalidAssignment {
        relation: String,
        column: String,
        message: String,
    },
}

/// Errors surfaced by a migration session.
#[derive(Error, Debug)]
pub enum MigrationError {
    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Sink(#[from] SinkError),

    #[error(transparent)]
    Mapping(#[from] MappingError),

    /// `import()` / `export()` called before a successful `import_from` / `export_to`.
    #[error("No {0} configured")]
    NotConfigured(&'static str),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl MigrationError {
    /// Whether retrying the same call may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Source(e) => e.is_transient(),
            Self::Sink(e) => e.is_transient(),
            Self::Mapping(_) | Self::NotConfigured(_) | Self::Config(_) => false,
        }
    }

    /// Whether the error concerns a single document rather than the run.
    ///
    /// Mapping failures and rejected writes are per document. Losing the
    /// source cursor, cancellation and configuration problems are not.
    pub fn is_per_document(&self) -> bool {
        match self {
            Self::Mapping(_) => true,
            Self::Sink(SinkError::Write { .. }) | Self::Sink(SinkError::Timeout { .. }) => true,
            _ => false,
        }
    }
}
