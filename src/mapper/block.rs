//! Mapping blocks: how one document shape becomes relational rows.
//!
//! Blocks are built with the builder methods or deserialized from a
//! migration file:
//!
//! ```toml
//! relation = "user"
//! fields = ["name", { column = "email", from = "contact.email" }]
//!
//! [[nested]]
//! accessor = "activities"
//! relation = "activity"
//! fields = ["name", { column = "kind", value = "workout" }]
//! ```

use crate::error::MappingError;
use serde::Deserialize;
use std::collections::HashSet;
use sync_core::Value;

/// One target column and where its value comes from.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "RawAssignment")]
pub enum FieldAssignment {
    /// Column named after the source key.
    Identity(String),
    /// Column filled from a (dotted) path in the document.
    Rename { column: String, from: String },
    /// Column filled with a constant.
    Constant { column: String, value: Value },
    /// Column filled with the parent row id (nested blocks only).
    ParentKey { column: String },
}

impl FieldAssignment {
    pub fn column(&self) -> &str {
        match self {
            Self::Identity(column)
            | Self::Rename { column, .. }
            | Self::Constant { column, .. }
            | Self::ParentKey { column } => column,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawAssignment {
    Key(String),
    Table(RawColumn),
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawColumn {
    column: String,
    #[serde(default)]
    from: Option<String>,
    #[serde(default)]
    value: Option<serde_json::Value>,
    #[serde(default)]
    parent_key: bool,
}

impl TryFrom<RawAssignment> for FieldAssignment {
    type Error = String;

    fn try_from(raw: RawAssignment) -> Result<Self, Self::Error> {
        let RawColumn {
            column,
            from,
            value,
            parent_key,
        } = match raw {
            RawAssignment::Key(key) => return Ok(Self::Identity(key)),
            RawAssignment::Table(table) => table,
        };
        match (from, value, parent_key) {
            (None, None, false) => Ok(Self::Identity(column)),
            (Some(from), None, false) => Ok(Self::Rename { column, from }),
            (None, Some(value), false) => Ok(Self::Constant {
                column,
                value: value.into(),
            }),
            (None, None, true) => Ok(Self::ParentKey { column }),
            _ => Err(format!(
                "column '{column}' must set at most one of 'from', 'value' or 'parent_key'"
            )),
        }
    }
}

/// Relation, columns and embedded collections of one document shape.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MappingBlock {
    pub relation: String,
    #[serde(default)]
    pub fields: Vec<FieldAssignment>,
    #[serde(default)]
    pub nested: Vec<NestedBlock>,
}

/// A block applied to every embedded document reached through `accessor`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(from = "RawNested")]
pub struct NestedBlock {
    /// Key (or dotted path) of the embedded array or document
    pub accessor: String,
    /// Foreign-key column, `<parent relation>_id` when unset
    pub foreign_key: Option<String>,
    pub block: MappingBlock,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawNested {
    accessor: String,
    #[serde(default)]
    foreign_key: Option<String>,
    relation: String,
    #[serde(default)]
    fields: Vec<FieldAssignment>,
    #[serde(default)]
    nested: Vec<NestedBlock>,
}

impl From<RawNested> for NestedBlock {
    fn from(raw: RawNested) -> Self {
        Self {
            accessor: raw.accessor,
            foreign_key: raw.foreign_key,
            block: MappingBlock {
                relation: raw.relation,
                fields: raw.fields,
                nested: raw.nested,
            },
        }
    }
}

impl NestedBlock {
    /// Column that stores the parent row id.
    pub fn foreign_key_column(&self, parent_relation: &str) -> String {
        self.foreign_key
            .clone()
            .unwrap_or_else(|| format!("{parent_relation}_id"))
    }
}

impl MappingBlock {
    pub fn new(relation: impl Into<String>) -> Self {
        Self {
            relation: relation.into(),
            fields: Vec::new(),
            nested: Vec::new(),
        }
    }

    /// Copy `key` into a column of the same name.
    pub fn field(mut self, key: impl Into<String>) -> Self {
        self.fields.push(FieldAssignment::Identity(key.into()));
        self
    }

    /// Copy the value at `from` (dotted path) into `column`.
    pub fn rename(mut self, column: impl Into<String>, from: impl Into<String>) -> Self {
        self.fields.push(FieldAssignment::Rename {
            column: column.into(),
            from: from.into(),
        });
        self
    }

    pub fn constant(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.push(FieldAssignment::Constant {
            column: column.into(),
            value: value.into(),
        });
        self
    }

    pub fn parent_key(mut self, column: impl Into<String>) -> Self {
        self.fields.push(FieldAssignment::ParentKey {
            column: column.into(),
        });
        self
    }

    /// Map every embedded document under `accessor` with `block`.
    pub fn nest(mut self, accessor: impl Into<String>, block: MappingBlock) -> Self {
        self.nested.push(NestedBlock {
            accessor: accessor.into(),
            foreign_key: None,
            block,
        });
        self
    }

    /// Like [`nest`](Self::nest) with an explicit foreign-key column.
    pub fn nest_with_key(
        mut self,
        accessor: impl Into<String>,
        foreign_key: impl Into<String>,
        block: MappingBlock,
    ) -> Self {
        self.nested.push(NestedBlock {
            accessor: accessor.into(),
            foreign_key: Some(foreign_key.into()),
            block,
        });
        self
    }

    /// Relations written by this block and its nested blocks, in pre-order.
    pub fn relations(&self) -> Vec<&str> {
        let mut out = vec![self.relation.as_str()];
        for nested in &self.nested {
            out.extend(nested.block.relations());
        }
        out
    }

    /// Check the block tree for declarations no document could satisfy.
    pub fn validate(&self) -> Result<(), MappingError> {
        self.validate_at(false)
    }

    fn validate_at(&self, nested: bool) -> Result<(), MappingError> {
        let invalid = |column: &str, message: &str| MappingError::InvalidAssignment {
            relation: self.relation.clone(),
            column: column.to_string(),
            message: message.to_string(),
        };

        if self.relation.trim().is_empty() {
            return Err(invalid("", "relation name is empty"));
        }

        let mut seen = HashSet::new();
        for field in &self.fields {
            let column = field.column();
            if column.trim().is_empty() {
                return Err(invalid(column, "column name is empty"));
            }
            if !seen.insert(column) {
                return Err(invalid(column, "column assigned more than once"));
            }
            if matches!(field, FieldAssignment::ParentKey { .. }) && !nested {
                return Err(invalid(column, "parent_key is only valid in nested blocks"));
            }
        }

        for child in &self.nested {
            if child.accessor.trim().is_empty() {
                return Err(MappingError::EmbeddedAccessor {
                    relation: self.relation.clone(),
                    accessor: child.accessor.clone(),
                    row_id: None,
                    problem: "is empty".to_string(),
                });
            }
            child.block.validate_at(true)?;
        }
        Ok(())
    }
}
