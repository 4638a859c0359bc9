//! Relational rows produced by the record mapper.

use crate::value::Value;

/// Column that carries a row's identity (the source document's `_id`).
pub const ROW_ID_COLUMN: &str = "id";

/// Link from a nested row to the row of its parent document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKey {
    /// Column in the child relation that stores the parent's row id
    pub column: String,
    /// Relation the parent row was written to
    pub parent_relation: String,
    /// Row id of the parent row
    pub parent_row_id: String,
}

impl ForeignKey {
    pub fn new(
        column: impl Into<String>,
        parent_relation: impl Into<String>,
        parent_row_id: impl Into<String>,
    ) -> Self {
        Self {
            column: column.into(),
            parent_relation: parent_relation.into(),
            parent_row_id: parent_row_id.into(),
        }
    }
}

/// A single relational row ready to be written.
///
/// Columns keep the order in which the mapping declared them so the
/// generated statements are reproducible.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    /// Target relation (table) name
    pub relation: String,
    /// Identity derived from the source document, if it has one
    pub row_id: Option<String>,
    /// Parent link for rows derived from embedded documents
    pub foreign_key: Option<ForeignKey>,
    /// Ordered column assignments
    pub columns: Vec<(String, Value)>,
}

impl Row {
    /// Create a row without columns.
    pub fn new(relation: impl Into<String>, row_id: Option<String>) -> Self {
        Self {
            relation: relation.into(),
            row_id,
            foreign_key: None,
            columns: Vec::new(),
        }
    }

    /// Attach a parent link.
    pub fn with_foreign_key(mut self, foreign_key: ForeignKey) -> Self {
        self.foreign_key = Some(foreign_key);
        self
    }

    /// Append a column assignment.
    pub fn push(&mut self, column: impl Into<String>, value: impl Into<Value>) {
        self.columns.push((column.into(), value.into()));
    }

    /// Look up a declared column value.
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.columns
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    /// Whether the row is linked to a parent row.
    pub fn is_nested(&self) -> bool {
        self.foreign_key.is_some()
    }

    /// Every column the row writes, in statement order.
    ///
    /// The identity column comes first, then the foreign-key column, then the
    /// declared columns. Identity and foreign-key columns are only added when
    /// the mapping did not already declare a column of the same name.
    pub fn statement_columns(&self) -> Vec<(&str, Value)> {
        let mut out: Vec<(&str, Value)> = Vec::with_capacity(self.columns.len() + 2);

        if let Some(id) = &self.row_id {
            if self.get(ROW_ID_COLUMN).is_none() {
                out.push((ROW_ID_COLUMN, Value::Text(id.clone())));
            }
        }
        if let Some(fk) = &self.foreign_key {
            if self.get(&fk.column).is_none() {
                out.push((fk.column.as_str(), Value::Text(fk.parent_row_id.clone())));
            }
        }
        for (name, value) in &self.columns {
            out.push((name.as_str(), value.clone()));
        }
        out
    }
}
