//! Lazy document sequence over one collection.

use crate::error::SourceError;
use bson::Document;
use futures::stream::{self, BoxStream, Stream, StreamExt};
use std::fmt;

/// A single-pass, lazily evaluated sequence of documents.
///
/// Cursors cannot be rewound. Iterating a collection again means asking the
/// connection for a new source, which opens a new cursor.
pub struct DocumentCursor {
    collection: String,
    inner: BoxStream<'static, Result<Document, SourceError>>,
    exhausted: bool,
}

impl DocumentCursor {
    /// Wrap a driver stream.
    pub fn new<S>(collection: impl Into<String>, stream: S) -> Self
    where
        S: Stream<Item = Result<Document, SourceError>> + Send + 'static,
    {
        Self {
            collection: collection.into(),
            inner: stream.boxed(),
            exhausted: false,
        }
    }

    /// Cursor over an already materialized list of documents.
    pub fn from_documents(collection: impl Into<String>, documents: Vec<Document>) -> Self {
        Self::new(collection, stream::iter(documents.into_iter().map(Ok)))
    }

    /// Name of the collection this cursor reads.
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Whether the cursor has yielded its last document.
    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    /// Advance the cursor. Returns `Ok(None)` once the collection is exhausted.
    pub async fn next_document(&mut self) -> Result<Option<Document>, SourceError> {
        if self.exhausted {
            return Ok(None);
        }
        match self.inner.next().await {
            Some(Ok(doc)) => Ok(Some(doc)),
            Some(Err(e)) => Err(e),
            None => {
                self.exhausted = true;
                Ok(None)
            }
        }
    }
}

impl fmt::Debug for DocumentCursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocumentCursor")
            .field("collection", &self.collection)
            .field("exhausted", &self.exhausted)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[tokio::test]
    async fn test_yields_in_order_then_stays_exhausted() {
        let mut cursor =
            DocumentCursor::from_documents("users", vec![doc! {"_id": 1}, doc! {"_id": 2}]);
        assert_eq!(cursor.collection(), "users");
        assert_eq!(cursor.next_document().await.unwrap(), Some(doc! {"_id": 1}));
        assert_eq!(cursor.next_document().await.unwrap(), Some(doc! {"_id": 2}));
        assert_eq!(cursor.next_document().await.unwrap(), None);
        assert!(cursor.is_exhausted());
        assert_eq!(cursor.next_document().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_surfaces_stream_errors() {
        let items = vec![
            Ok(doc! {"_id": 1}),
            Err(SourceError::cursor("users", "connection reset")),
        ];
        let mut cursor = DocumentCursor::new("users", stream::iter(items));
        assert!(cursor.next_document().await.unwrap().is_some());
        assert!(matches!(
            cursor.next_document().await,
            Err(SourceError::Cursor { .. })
        ));
    }
}
