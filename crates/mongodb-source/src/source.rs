//! Per-collection source with progress counters.

use crate::cursor::DocumentCursor;
use crate::error::SourceError;
use bson::Document;
use serde::Serialize;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use sync_core::{NoopProgress, ProgressSink};
use tokio_util::sync::CancellationToken;

/// Snapshot of a source's progress counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Counts {
    /// Documents in the collection when the source was created
    pub total: u64,
    /// Documents yielded by iteration
    pub imported: u64,
    /// Top-level rows written to the target
    pub exported: u64,
}

/// Runtime settings shared by every source of a connection.
#[derive(Clone)]
pub struct SourceOptions {
    /// Upper bound for a single cursor step, count or cursor open
    pub cursor_timeout: Option<Duration>,
    /// Checked between documents
    pub cancel: CancellationToken,
    /// Ticked once per exported row
    pub progress: Arc<dyn ProgressSink>,
}

impl Default for SourceOptions {
    fn default() -> Self {
        Self {
            cursor_timeout: None,
            cancel: CancellationToken::new(),
            progress: Arc::new(NoopProgress),
        }
    }
}

impl fmt::Debug for SourceOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceOptions")
            .field("cursor_timeout", &self.cursor_timeout)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish_non_exhaustive()
    }
}

fn lock(counters: &Mutex<Counts>) -> MutexGuard<'_, Counts> {
    counters.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Handle used by the mapper to record exported rows.
#[derive(Clone)]
pub struct ExportTracker {
    counters: Arc<Mutex<Counts>>,
    progress: Arc<dyn ProgressSink>,
}

impl ExportTracker {
    /// Record one successfully written top-level row.
    pub fn record_exported(&self) {
        lock(&self.counters).exported += 1;
        self.progress.tick(1);
    }

    pub fn exported(&self) -> u64 {
        lock(&self.counters).exported
    }
}

impl fmt::Debug for ExportTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExportTracker")
            .field("exported", &self.exported())
            .finish()
    }
}

/// A single pass over one collection.
pub struct Source {
    collection: String,
    cursor: DocumentCursor,
    counters: Arc<Mutex<Counts>>,
    progress: Arc<dyn ProgressSink>,
    cursor_timeout: Option<Duration>,
    cancel: CancellationToken,
}

impl Source {
    pub fn new(
        collection: impl Into<String>,
        total: u64,
        cursor: DocumentCursor,
        options: &SourceOptions,
    ) -> Self {
        Self {
            collection: collection.into(),
            cursor,
            counters: Arc::new(Mutex::new(Counts {
                total,
                ..Counts::default()
            })),
            progress: options.progress.clone(),
            cursor_timeout: options.cursor_timeout,
            cancel: options.cancel.clone(),
        }
    }

    /// Replace the progress sink ticked by this source's tracker.
    pub fn with_progress(mut self, progress: Arc<dyn ProgressSink>) -> Self {
        self.progress = progress;
        self
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Raw access to the underlying cursor. Documents read this way are not counted.
    pub fn cursor(&mut self) -> &mut DocumentCursor {
        &mut self.cursor
    }

    /// Consistent snapshot of all three counters.
    pub fn counts(&self) -> Counts {
        *lock(&self.counters)
    }

    pub fn tracker(&self) -> ExportTracker {
        ExportTracker {
            counters: self.counters.clone(),
            progress: self.progress.clone(),
        }
    }

    /// Yield the next document, counting it as imported.
    pub async fn next_document(&mut self) -> Result<Option<Document>, SourceError> {
        if self.cancel.is_cancelled() {
            return Err(SourceError::Cancelled(self.collection.clone()));
        }

        let next = match self.cursor_timeout {
            Some(timeout) => tokio::time::timeout(timeout, self.cursor.next_document())
                .await
                .map_err(|_| SourceError::Timeout {
                    collection: self.collection.clone(),
                    timeout,
                })??,
            None => self.cursor.next_document().await?,
        };

        if next.is_some() {
            let mut counts = lock(&self.counters);
            counts.imported += 1;
            tracing::trace!(
                "Yielding document {} of {} from '{}'",
                counts.imported,
                counts.total,
                self.collection
            );
        }
        Ok(next)
    }

    /// Run `f` for every remaining document, stopping at the first error.
    ///
    /// Returns the number of documents delivered.
    pub async fn each<F, Fut, E>(&mut self, mut f: F) -> Result<u64, E>
    where
        F: FnMut(Document) -> Fut,
        Fut: Future<Output = Result<(), E>>,
        E: From<SourceError>,
    {
        let mut delivered = 0;
        while let Some(document) = self.next_document().await? {
            f(document).await?;
            delivered += 1;
        }
        Ok(delivered)
    }
}

impl fmt::Debug for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Source")
            .field("collection", &self.collection)
            .field("counts", &self.counts())
            .finish()
    }
}
