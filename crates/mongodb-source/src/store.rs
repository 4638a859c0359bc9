//! Document-store driver seam.

use crate::cursor::DocumentCursor;
use crate::error::SourceError;
use async_trait::async_trait;
use bson::{Bson, Document};
use std::sync::Arc;

/// An open session against a document database.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Database this session is bound to.
    fn database_name(&self) -> &str;

    /// `host:port` of the server behind this session.
    fn server_name(&self) -> String;

    /// Run a server-side command and return the raw reply.
    async fn eval(&self, command: &str) -> Result<Bson, SourceError>;

    /// Number of documents in a collection at the time of the call.
    async fn count(&self, collection: &str) -> Result<u64, SourceError>;

    /// Whether a missing collection can be told apart from an empty one.
    fn distinguishes_missing_collections(&self) -> bool {
        false
    }

    /// Whether the collection exists. Only meaningful when
    /// [`distinguishes_missing_collections`](Self::distinguishes_missing_collections) is true.
    async fn collection_exists(&self, collection: &str) -> Result<bool, SourceError>;

    /// Names of every collection in the database.
    async fn collection_names(&self) -> Result<Vec<String>, SourceError>;

    /// Open a cursor over every document of a collection.
    async fn cursor(&self, collection: &str) -> Result<DocumentCursor, SourceError>;

    /// Insert or replace a document by `_id`. Used to seed fixtures.
    async fn save(&self, collection: &str, document: Document) -> Result<(), SourceError>;

    /// Release the session.
    async fn close(&self);
}

/// Factory for document-store sessions.
#[async_trait]
pub trait DocumentStoreConnector: Send + Sync {
    async fn connect(
        &self,
        host: &str,
        port: u16,
        database: &str,
    ) -> Result<Arc<dyn DocumentStore>, SourceError>;
}

/// Parse a JSON (Extended JSON) command into a command document.
///
/// Key order is preserved because the server reads the command name from
/// the first key.
pub(crate) fn parse_command(command: &str) -> Result<Document, SourceError> {
    let json: serde_json::Value = serde_json::from_str(command)
        .map_err(|e| SourceError::Eval(format!("invalid command '{command}': {e}")))?;
    match json {
        serde_json::Value::Object(map) => Document::try_from(map)
            .map_err(|e| SourceError::Eval(format!("invalid command '{command}': {e}"))),
        other => Err(SourceError::Eval(format!(
            "command must be a JSON object, got '{other}'"
        ))),
    }
}
