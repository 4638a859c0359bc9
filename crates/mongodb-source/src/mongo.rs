//! MongoDB implementation of the document-store seam.

use crate::cursor::DocumentCursor;
use crate::error::SourceError;
use crate::store::{parse_command, DocumentStore, DocumentStoreConnector};
use async_trait::async_trait;
use bson::{doc, Bson, Document};
use futures::StreamExt;
use mongodb::options::{ClientOptions, Credential};
use mongodb::{Client as MongoClient, Database};
use mongodb_types::ID_FIELD;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Opens sessions against a MongoDB server.
#[derive(Clone)]
pub struct MongoConnector {
    pub username: Option<String>,
    pub password: Option<String>,
    /// Database holding the user's credentials (defaults to `admin`)
    pub auth_source: Option<String>,
    /// Applied to both connect and server selection
    pub connect_timeout: Duration,
}

impl Default for MongoConnector {
    fn default() -> Self {
        Self {
            username: None,
            password: None,
            auth_source: None,
            connect_timeout: Duration::from_secs(10),
        }
    }
}

impl fmt::Debug for MongoConnector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MongoConnector")
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("auth_source", &self.auth_source)
            .field("connect_timeout", &self.connect_timeout)
            .finish()
    }
}

#[async_trait]
impl DocumentStoreConnector for MongoConnector {
    async fn connect(
        &self,
        host: &str,
        port: u16,
        database: &str,
    ) -> Result<Arc<dyn DocumentStore>, SourceError> {
        let address = format!("{host}:{port}");
        let connection_error = |e: mongodb::error::Error| SourceError::Connection {
            address: address.clone(),
            message: e.to_string(),
        };

        tracing::debug!("Parsing MongoDB connection options for {}", address);
        let mut options = ClientOptions::parse(format!("mongodb://{address}"))
            .await
            .map_err(connection_error)?;
        options.connect_timeout = Some(self.connect_timeout);
        options.server_selection_timeout = Some(self.connect_timeout);
        options.app_name = Some("squeal-sync".to_string());
        if let Some(username) = &self.username {
            options.credential = Some(
                Credential::builder()
                    .username(username.clone())
                    .password(self.password.clone())
                    .source(self.auth_source.clone())
                    .build(),
            );
        }

        let client = MongoClient::with_options(options).map_err(connection_error)?;
        let db = client.database(database);

        // The driver connects lazily; ping so unreachable servers and bad
        // credentials fail here instead of on the first cursor.
        db.run_command(doc! { "ping": 1 })
            .await
            .map_err(connection_error)?;
        tracing::info!("Connected to MongoDB at {} (database '{}')", address, database);

        Ok(Arc::new(MongoStore {
            client,
            db,
            database: database.to_string(),
            address,
        }))
    }
}

/// An open MongoDB session bound to one database.
pub struct MongoStore {
    client: MongoClient,
    db: Database,
    database: String,
    address: String,
}

impl fmt::Debug for MongoStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MongoStore")
            .field("address", &self.address)
            .field("database", &self.database)
            .finish()
    }
}

#[async_trait]
impl DocumentStore for MongoStore {
    fn database_name(&self) -> &str {
        &self.database
    }

    fn server_name(&self) -> String {
        self.address.clone()
    }

    async fn eval(&self, command: &str) -> Result<Bson, SourceError> {
        let command = parse_command(command)?;
        tracing::debug!("Running command on '{}': {}", self.database, command);
        let reply = self
            .db
            .run_command(command)
            .await
            .map_err(|e| SourceError::Eval(e.to_string()))?;
        Ok(Bson::Document(reply))
    }

    async fn count(&self, collection: &str) -> Result<u64, SourceError> {
        self.db
            .collection::<Document>(collection)
            .count_documents(doc! {})
            .await
            .map_err(|e| SourceError::cursor(collection, e))
    }

    async fn collection_exists(&self, collection: &str) -> Result<bool, SourceError> {
        Ok(self
            .collection_names()
            .await?
            .iter()
            .any(|name| name == collection))
    }

    async fn collection_names(&self) -> Result<Vec<String>, SourceError> {
        self.db
            .list_collection_names()
            .await
            .map_err(|e| SourceError::Eval(e.to_string()))
    }

    async fn cursor(&self, collection: &str) -> Result<DocumentCursor, SourceError> {
        tracing::debug!("Creating cursor for collection: {}", collection);
        let cursor = self
            .db
            .collection::<Document>(collection)
            .find(doc! {})
            .await
            .map_err(|e| SourceError::cursor(collection, e))?;

        let name = collection.to_string();
        let documents = cursor.map(move |result| result.map_err(|e| SourceError::cursor(&name, e)));
        Ok(DocumentCursor::new(collection, documents))
    }

    async fn save(&self, collection: &str, document: Document) -> Result<(), SourceError> {
        let coll = self.db.collection::<Document>(collection);
        let result = match document.get(ID_FIELD) {
            Some(id) => {
                let mut filter = Document::new();
                filter.insert(ID_FIELD, id.clone());
                coll.replace_one(filter, &document)
                    .upsert(true)
                    .await
                    .map(|_| ())
            }
            None => coll.insert_one(&document).await.map(|_| ()),
        };
        result.map_err(|e| SourceError::cursor(collection, e))
    }

    async fn close(&self) {
        tracing::debug!("Closing MongoDB session to {}", self.address);
        self.client.clone().shutdown().immediate(true).await;
    }
}
