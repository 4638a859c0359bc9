//! Open document-store connection.

use crate::error::SourceError;
use crate::source::{Source, SourceOptions};
use crate::store::DocumentStore;
use bson::Bson;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use sync_core::ProgressSink;

/// A document-store session that materializes [`Source`]s.
///
/// Collection totals are counted once per connection and reused when a
/// source for the same collection is requested again.
pub struct Connection {
    store: Arc<dyn DocumentStore>,
    options: SourceOptions,
    totals: Mutex<HashMap<String, u64>>,
}

impl Connection {
    pub fn new(store: Arc<dyn DocumentStore>, options: SourceOptions) -> Self {
        Self {
            store,
            options,
            totals: Mutex::new(HashMap::new()),
        }
    }

    /// `host:port` of the server.
    pub fn server_name(&self) -> String {
        self.store.server_name()
    }

    pub fn database_name(&self) -> &str {
        self.store.database_name()
    }

    /// The raw store handle.
    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    pub fn options(&self) -> &SourceOptions {
        &self.options
    }

    /// Forward a server-side command and return the reply unchanged.
    pub async fn eval(&self, command: &str) -> Result<Bson, SourceError> {
        self.store.eval(command).await
    }

    /// Every collection in the database.
    pub async fn collection_names(&self) -> Result<Vec<String>, SourceError> {
        self.bounded("collections", self.store.collection_names())
            .await
    }

    /// Cardinality of a collection, counted on first request.
    pub async fn total(&self, collection: &str) -> Result<u64, SourceError> {
        if self.store.distinguishes_missing_collections()
            && !self.store.collection_exists(collection).await?
        {
            return Err(SourceError::CollectionNotFound(collection.to_string()));
        }

        let cached = self
            .totals
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(collection)
            .copied();
        if let Some(total) = cached {
            return Ok(total);
        }

        let total = self
            .bounded(collection, self.store.count(collection))
            .await?;
        tracing::debug!("Collection '{}' contains {} documents", collection, total);
        self.totals
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(collection.to_string(), total);
        Ok(total)
    }

    /// Open a fresh source over a collection.
    pub async fn source(&self, collection: &str) -> Result<Source, SourceError> {
        let total = self.total(collection).await?;
        let cursor = self
            .bounded(collection, self.store.cursor(collection))
            .await?;
        Ok(Source::new(collection, total, cursor, &self.options))
    }

    /// Open a fresh source whose tracker ticks `progress` instead of the
    /// connection-wide sink.
    pub async fn source_with_progress(
        &self,
        collection: &str,
        progress: Arc<dyn ProgressSink>,
    ) -> Result<Source, SourceError> {
        Ok(self.source(collection).await?.with_progress(progress))
    }

    pub async fn close(&self) {
        tracing::debug!(
            "Closing connection to {}/{}",
            self.server_name(),
            self.database_name()
        );
        self.store.close().await;
    }

    async fn bounded<T>(
        &self,
        what: &str,
        fut: impl Future<Output = Result<T, SourceError>>,
    ) -> Result<T, SourceError> {
        match self.options.cursor_timeout {
            Some(timeout) => tokio::time::timeout(timeout, fut)
                .await
                .map_err(|_| SourceError::Timeout {
                    collection: what.to_string(),
                    timeout,
                })?,
            None => fut.await,
        }
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("server", &self.server_name())
            .field("database", &self.database_name())
            .finish()
    }
}
