//! MongoDB document source for squeal-sync
//!
//! Provides the import side of a migration:
//!
//! - [`DocumentStore`] / [`DocumentStoreConnector`] - the driver seam, with a
//!   MongoDB implementation ([`MongoConnector`]) and an in-process one
//!   ([`MemoryConnector`]) used for dry runs and tests
//! - [`Connection`] - an open document-store session that materializes sources
//! - [`Source`] - a single pass over one collection with progress counters
//! - [`DocumentCursor`] - the lazy document sequence a source wraps

mod connection;
mod cursor;
mod error;
mod memory;
mod mongo;
mod source;
mod store;

pub use connection::Connection;
pub use cursor::DocumentCursor;
pub use error::SourceError;
pub use memory::{MemoryConnector, MemoryStore};
pub use mongo::{MongoConnector, MongoStore};
pub use source::{Counts, ExportTracker, Source, SourceOptions};
pub use store::{DocumentStore, DocumentStoreConnector};
