//! MongoDB/BSON type conversions for sync-core values.
//!
//! # Modules
//!
//! - [`value`] - BSON value → [`sync_core::Value`] conversion
//! - [`identity`] - string form of a document's `_id`
//! - [`path`] - dotted-path lookup into nested documents
//!
//! # Example
//!
//! ```ignore
//! use bson::Bson;
//! use mongodb_types::bson_to_value;
//!
//! let value = bson_to_value(Bson::Int32(7))?;
//! assert_eq!(value, sync_core::Value::Int(7));
//! ```

pub mod identity;
pub mod path;
pub mod value;

pub use identity::{document_identity, identity_string, ID_FIELD};
pub use path::lookup;
pub use value::{bson_to_value, ConversionError};
