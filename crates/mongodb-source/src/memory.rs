//! In-process document store.
//!
//! Backs dry runs and tests. Cursors iterate a snapshot taken when they are
//! opened, so writes made during iteration are not observed.

use crate::cursor::DocumentCursor;
use crate::error::SourceError;
use crate::store::{parse_command, DocumentStore, DocumentStoreConnector};
use async_trait::async_trait;
use bson::{doc, oid::ObjectId, Bson, Document};
use mongodb_types::ID_FIELD;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

/// A document database held in memory.
#[derive(Debug)]
pub struct MemoryStore {
    server: String,
    database: String,
    strict: bool,
    collections: RwLock<BTreeMap<String, Vec<Document>>>,
    closes: AtomicUsize,
}

impl MemoryStore {
    /// Create an empty database.
    ///
    /// A strict store reports [`SourceError::CollectionNotFound`] for
    /// collections that were never written to; a lenient one treats them as
    /// empty, the way MongoDB does.
    pub fn new(server: impl Into<String>, database: impl Into<String>, strict: bool) -> Self {
        Self {
            server: server.into(),
            database: database.into(),
            strict,
            collections: RwLock::new(BTreeMap::new()),
            closes: AtomicUsize::new(0),
        }
    }

    /// Create an empty collection.
    pub fn create_collection(&self, collection: &str) {
        self.collections
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(collection.to_string())
            .or_default();
    }

    /// Seed documents as given: documents with an `_id` replace the stored
    /// document with the same `_id`, documents without one are appended
    /// unchanged.
    pub fn insert_many(&self, collection: &str, documents: impl IntoIterator<Item = Document>) {
        let mut collections = self
            .collections
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let docs = collections.entry(collection.to_string()).or_default();
        for document in documents {
            replace_by_id(docs, document);
        }
    }

    /// Copy of every document in a collection, in insertion order.
    pub fn documents(&self, collection: &str) -> Vec<Document> {
        self.collections
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(collection)
            .cloned()
            .unwrap_or_default()
    }

    /// How many times a session over this store has been closed.
    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    fn len(&self, collection: &str) -> Option<usize> {
        self.collections
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(collection)
            .map(Vec::len)
    }

    fn run(&self, command: &Document) -> Result<Document, SourceError> {
        let Some((name, argument)) = command.iter().next() else {
            return Err(SourceError::Eval("empty command document".to_string()));
        };
        match name.as_str() {
            "ping" => Ok(doc! { "ok": 1.0 }),
            "dbStats" => {
                let collections = self.collections.read().unwrap_or_else(PoisonError::into_inner);
                let objects: usize = collections.values().map(Vec::len).sum();
                Ok(doc! {
                    "db": self.database.clone(),
                    "collections": collections.len() as i64,
                    "objects": objects as i64,
                    "ok": 1.0,
                })
            }
            "count" => {
                let Bson::String(collection) = argument else {
                    return Err(SourceError::Eval(format!(
                        "collection name has invalid type {:?}",
                        argument.element_type()
                    )));
                };
                let n = self.len(collection).unwrap_or(0);
                Ok(doc! { "n": n as i64, "ok": 1.0 })
            }
            "listCollections" => {
                let collections = self.collections.read().unwrap_or_else(PoisonError::into_inner);
                let batch: Vec<Bson> = collections
                    .keys()
                    .map(|name| Bson::Document(doc! { "name": name.clone(), "type": "collection" }))
                    .collect();
                Ok(doc! {
                    "cursor": { "id": 0_i64, "ns": format!("{}.$cmd.listCollections", self.database), "firstBatch": batch },
                    "ok": 1.0,
                })
            }
            other => Err(SourceError::Eval(format!("no such command: '{other}'"))),
        }
    }
}

fn replace_by_id(docs: &mut Vec<Document>, document: Document) {
    let Some(id) = document.get(ID_FIELD).cloned() else {
        docs.push(document);
        return;
    };
    match docs
        .iter_mut()
        .find(|existing| existing.get(ID_FIELD) == Some(&id))
    {
        Some(existing) => *existing = document,
        None => docs.push(document),
    }
}

/// Prepend a fresh `ObjectId` when the document has no `_id`, as the server
/// does on insert.
fn with_generated_id(document: Document) -> Document {
    if document.contains_key(ID_FIELD) {
        return document;
    }
    let mut with_id = Document::new();
    with_id.insert(ID_FIELD, ObjectId::new());
    with_id.extend(document);
    with_id
}

#[async_trait]
impl DocumentStore for MemoryStore {
    fn database_name(&self) -> &str {
        &self.database
    }

    fn server_name(&self) -> String {
        self.server.clone()
    }

    async fn eval(&self, command: &str) -> Result<Bson, SourceError> {
        let command = parse_command(command)?;
        self.run(&command).map(Bson::Document)
    }

    async fn count(&self, collection: &str) -> Result<u64, SourceError> {
        Ok(self.len(collection).unwrap_or(0) as u64)
    }

    fn distinguishes_missing_collections(&self) -> bool {
        self.strict
    }

    async fn collection_exists(&self, collection: &str) -> Result<bool, SourceError> {
        Ok(self.len(collection).is_some())
    }

    async fn collection_names(&self) -> Result<Vec<String>, SourceError> {
        Ok(self
            .collections
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect())
    }

    async fn cursor(&self, collection: &str) -> Result<DocumentCursor, SourceError> {
        Ok(DocumentCursor::from_documents(
            collection,
            self.documents(collection),
        ))
    }

    async fn save(&self, collection: &str, document: Document) -> Result<(), SourceError> {
        self.insert_many(collection, [with_generated_id(document)]);
        Ok(())
    }

    async fn close(&self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }
}

/// Hands out [`MemoryStore`]s keyed by `host:port/database`.
///
/// Connecting twice to the same address and database returns the same store,
/// so fixtures seeded through [`MemoryConnector::database`] are visible to
/// every session.
#[derive(Debug, Default)]
pub struct MemoryConnector {
    strict: bool,
    stores: Mutex<HashMap<String, Arc<MemoryStore>>>,
    unreachable: Mutex<HashSet<String>>,
}

impl MemoryConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores created from now on distinguish missing collections from empty ones.
    pub fn strict(mut self) -> Self {
        self.strict = true;
        self
    }

    /// Get or create the store for a database.
    pub fn database(&self, host: &str, port: u16, database: &str) -> Arc<MemoryStore> {
        let server = format!("{host}:{port}");
        let key = format!("{server}/{database}");
        self.stores
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(key)
            .or_insert_with(|| Arc::new(MemoryStore::new(server, database, self.strict)))
            .clone()
    }

    /// Make connections to `host` fail.
    pub fn refuse(&self, host: &str) {
        self.unreachable
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(host.to_string());
    }
}

#[async_trait]
impl DocumentStoreConnector for MemoryConnector {
    async fn connect(
        &self,
        host: &str,
        port: u16,
        database: &str,
    ) -> Result<Arc<dyn DocumentStore>, SourceError> {
        let refused = self
            .unreachable
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(host);
        if refused {
            return Err(SourceError::Connection {
                address: format!("{host}:{port}"),
                message: "connection refused".to_string(),
            });
        }
        Ok(self.database(host, port, database))
    }
}
