//! Document identity.

use bson::{Bson, Document};

/// Field that holds a document's unique identifier.
pub const ID_FIELD: &str = "_id";

/// String form of an identifier value.
///
/// ObjectIds render as their 24-character hex form, strings as themselves and
/// numbers in decimal. Null and undefined identifiers count as absent.
pub fn identity_string(id: &Bson) -> Option<String> {
    match id {
        Bson::Null | Bson::Undefined => None,
        Bson::ObjectId(oid) => Some(oid.to_hex()),
        Bson::String(s) => Some(s.clone()),
        Bson::Int32(i) => Some(i.to_string()),
        Bson::Int64(i) => Some(i.to_string()),
        Bson::Double(f) => Some(f.to_string()),
        Bson::Decimal128(d) => Some(d.to_string()),
        other => Some(other.clone().into_relaxed_extjson().to_string()),
    }
}

/// Identity of a document, if its `_id` field is present and not null.
pub fn document_identity(doc: &Document) -> Option<String> {
    doc.get(ID_FIELD).and_then(identity_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::{doc, oid::ObjectId};

    #[test]
    fn test_object_id_identity() {
        let oid = ObjectId::parse_str("507f191e810c19729de860ea").unwrap();
        let document = doc! { "_id": oid, "name": "Bar" };
        assert_eq!(
            document_identity(&document).as_deref(),
            Some("507f191e810c19729de860ea")
        );
    }

    #[test]
    fn test_scalar_identities() {
        assert_eq!(identity_string(&Bson::String("u1".into())).as_deref(), Some("u1"));
        assert_eq!(identity_string(&Bson::Int32(42)).as_deref(), Some("42"));
        assert_eq!(identity_string(&Bson::Int64(-7)).as_deref(), Some("-7"));
    }

    #[test]
    fn test_missing_or_null_identity() {
        assert_eq!(document_identity(&doc! { "name": "Bar" }), None);
        assert_eq!(document_identity(&doc! { "_id": Bson::Null }), None);
    }

    #[test]
    fn test_compound_identity_uses_extended_json() {
        let document = doc! { "_id": { "a": 1 } };
        assert_eq!(document_identity(&document).as_deref(), Some(r#"{"a":1}"#));
    }
}
