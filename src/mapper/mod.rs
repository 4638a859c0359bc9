//! Record mapping: documents → relational rows.
//!
//! The mapper walks a document tree depth-first, pre-order. Every document
//! (the top-level one and each embedded document reached through a nested
//! block) becomes one [`Row`]; embedded rows carry a foreign key to the row
//! of the document that contains them.
//!
//! The whole walk is planned before the first write, so a document that does
//! not fit its mapping is rejected without touching the target. Writes are
//! not transactional: a failed write can leave earlier rows of the same
//! document in place.

mod block;

pub use block::{FieldAssignment, MappingBlock, NestedBlock};

use crate::error::{MappingError, MigrationError};
use bson::{Bson, Document};
use mongodb_types::{bson_to_value, document_identity, lookup};
use sql_sink::{ExportTarget, WriteMode};
use squeal_sync_mongodb_source::ExportTracker;
use sync_core::{ForeignKey, Row, Value};

/// What writing one document produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MappingOutcome {
    /// Row id of the top-level row
    pub row_id: Option<String>,
    /// Rows derived from embedded documents
    pub embedded_rows: u64,
    /// Rows written with an insert-or-update statement
    pub upserts: u64,
}

/// Writes documents to an export target according to a [`MappingBlock`].
pub struct RecordMapper<'a> {
    target: &'a ExportTarget,
    tracker: Option<ExportTracker>,
}

impl<'a> RecordMapper<'a> {
    pub fn new(target: &'a ExportTarget) -> Self {
        Self {
            target,
            tracker: None,
        }
    }

    /// Record each fully written document on a source's counters.
    pub fn with_tracker(mut self, tracker: ExportTracker) -> Self {
        self.tracker = Some(tracker);
        self
    }

    pub fn target(&self) -> &ExportTarget {
        self.target
    }

    /// Rows `document` maps to, in write order.
    pub fn plan(document: &Document, block: &MappingBlock) -> Result<Vec<Row>, MappingError> {
        let mut rows = Vec::new();
        plan_into(document, block, None, &mut rows)?;
        Ok(rows)
    }

    /// Plan and write one document.
    pub async fn map(
        &self,
        document: &Document,
        block: &MappingBlock,
    ) -> Result<MappingOutcome, MigrationError> {
        let rows = Self::plan(document, block)?;
        let mut outcome = MappingOutcome::default();

        for (index, row) in rows.iter().enumerate() {
            let mode = self.target.write(row).await?;
            if mode == WriteMode::Upsert {
                outcome.upserts += 1;
            }
            if index == 0 {
                outcome.row_id = row.row_id.clone();
            } else {
                outcome.embedded_rows += 1;
            }
        }

        // Counted once every row of the document is written.
        if let Some(tracker) = &self.tracker {
            tracker.record_exported();
        }

        tracing::trace!(
            "Mapped document {:?} into '{}' with {} embedded rows",
            outcome.row_id,
            block.relation,
            outcome.embedded_rows
        );
        Ok(outcome)
    }
}

fn plan_into(
    document: &Document,
    block: &MappingBlock,
    parent: Option<&ForeignKey>,
    rows: &mut Vec<Row>,
) -> Result<(), MappingError> {
    let row_id = document_identity(document);
    if row_id.is_none() && (parent.is_none() || !block.nested.is_empty()) {
        return Err(MappingError::MissingIdentity {
            relation: block.relation.clone(),
        });
    }

    let mut row = Row::new(block.relation.clone(), row_id.clone());
    if let Some(fk) = parent {
        row = row.with_foreign_key(fk.clone());
    }
    for field in &block.fields {
        let value = resolve(document, field, &block.relation, parent)?;
        row.push(field.column(), value);
    }
    rows.push(row);

    let Some(row_id) = row_id else {
        return Ok(());
    };
    for nested in &block.nested {
        let fk = ForeignKey::new(
            nested.foreign_key_column(&block.relation),
            block.relation.clone(),
            row_id.clone(),
        );
        for element in embedded(document, nested, &block.relation, &row_id)? {
            plan_into(element, &nested.block, Some(&fk), rows)?;
        }
    }
    Ok(())
}

/// Embedded documents reached through a nested block's accessor.
///
/// A single embedded document counts as a one-element collection.
fn embedded<'d>(
    document: &'d Document,
    nested: &NestedBlock,
    relation: &str,
    row_id: &str,
) -> Result<Vec<&'d Document>, MappingError> {
    let accessor_error = |problem: String| MappingError::EmbeddedAccessor {
        relation: relation.to_string(),
        accessor: nested.accessor.clone(),
        row_id: Some(row_id.to_string()),
        problem,
    };

    match lookup(document, &nested.accessor) {
        None => Err(accessor_error("is missing".to_string())),
        Some(Bson::Document(single)) => Ok(vec![single]),
        Some(Bson::Array(items)) => items
            .iter()
            .enumerate()
            .map(|(i, item)| match item {
                Bson::Document(doc) => Ok(doc),
                other => Err(accessor_error(format!(
                    "has a non-document element at index {i} ({:?})",
                    other.element_type()
                ))),
            })
            .collect(),
        Some(other) => Err(accessor_error(format!(
            "is not an embedded document or array ({:?})",
            other.element_type()
        ))),
    }
}

fn resolve(
    document: &Document,
    field: &FieldAssignment,
    relation: &str,
    parent: Option<&ForeignKey>,
) -> Result<Value, MappingError> {
    let invalid = |message: String| MappingError::InvalidAssignment {
        relation: relation.to_string(),
        column: field.column().to_string(),
        message,
    };
    let convert = |bson: &Bson| bson_to_value(bson.clone()).map_err(|e| invalid(e.to_string()));

    match field {
        FieldAssignment::Identity(key) => match (lookup(document, key), parent) {
            (Some(bson), _) => convert(bson),
            (None, Some(fk)) if fk.column == *key => Ok(Value::Text(fk.parent_row_id.clone())),
            (None, _) => Ok(Value::Null),
        },
        FieldAssignment::Rename { from, .. } => lookup(document, from).map_or(Ok(Value::Null), convert),
        FieldAssignment::Constant { value, .. } => Ok(value.clone()),
        FieldAssignment::ParentKey { .. } => parent
            .map(|fk| Value::Text(fk.parent_row_id.clone()))
            .ok_or_else(|| invalid("parent_key is only valid in nested blocks".to_string())),
    }
}
