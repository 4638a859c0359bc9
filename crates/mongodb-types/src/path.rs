//! Dotted-path lookup into nested documents.

use bson::{Bson, Document};

/// Resolve `path` (e.g. `"address.city"`) against `doc`.
///
/// A key containing a literal dot is matched first, so documents whose field
/// names contain dots still resolve.
pub fn lookup<'a>(doc: &'a Document, path: &str) -> Option<&'a Bson> {
    if let Some(value) = doc.get(path) {
        return Some(value);
    }
    let (head, rest) = path.split_once('.')?;
    match doc.get(head)? {
        Bson::Document(inner) => lookup(inner, rest),
        _ => None,
    }
}
