//! Dialect-specific write statements.
//!
//! MySQL statements bind every value as a positional `?` parameter.
//! PostgreSQL statements carry values inline as untyped quoted literals so the
//! server coerces them to whatever type the column has.

use crate::adapter::Adapter;
use crate::error::SinkError;
use sync_core::{Row, Value, ROW_ID_COLUMN};

/// How a row was written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    Insert,
    Upsert,
}

impl WriteMode {
    /// Upsert when the adapter supports it and the row has a natural key.
    pub fn choose(adapter: Adapter, row: &Row) -> Self {
        if adapter.upsertable() && row.row_id.is_some() {
            Self::Upsert
        } else {
            Self::Insert
        }
    }
}

/// A rendered statement ready for execution.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub relation: String,
    pub sql: String,
    /// Positional parameters (empty for PostgreSQL)
    pub params: Vec<Value>,
}

impl Statement {
    /// Render the statement that writes `row` with `mode`.
    pub fn build(adapter: Adapter, row: &Row, mode: WriteMode) -> Result<Self, SinkError> {
        if mode == WriteMode::Upsert && !adapter.upsertable() {
            return Err(SinkError::Write {
                relation: row.relation.clone(),
                message: format!("adapter '{adapter}' does not support upserts"),
                transient: false,
            });
        }

        let columns = row.statement_columns();
        let table = adapter.quote_ident(&row.relation);
        let column_list = columns
            .iter()
            .map(|(name, _)| adapter.quote_ident(name))
            .collect::<Vec<_>>()
            .join(", ");

        let statement = match adapter {
            Adapter::MySql => {
                let placeholders = vec!["?"; columns.len()].join(", ");
                let mut sql = format!("INSERT INTO {table} ({column_list}) VALUES ({placeholders})");
                if mode == WriteMode::Upsert {
                    sql.push_str(" ON DUPLICATE KEY UPDATE ");
                    sql.push_str(&mysql_update_clause(adapter, &columns));
                }
                Statement {
                    relation: row.relation.clone(),
                    sql,
                    params: columns.into_iter().map(|(_, value)| value).collect(),
                }
            }
            Adapter::Postgres => {
                let sql = if columns.is_empty() {
                    format!("INSERT INTO {table} DEFAULT VALUES")
                } else {
                    let literals = columns
                        .iter()
                        .map(|(_, value)| postgres_literal(value))
                        .collect::<Vec<_>>()
                        .join(", ");
                    format!("INSERT INTO {table} ({column_list}) VALUES ({literals})")
                };
                Statement {
                    relation: row.relation.clone(),
                    sql,
                    params: Vec::new(),
                }
            }
        };
        Ok(statement)
    }
}

/// `col = VALUES(col)` for every non-key column, or a no-op key assignment
/// when the row has nothing else to update.
fn mysql_update_clause(adapter: Adapter, columns: &[(&str, Value)]) -> String {
    let updates: Vec<String> = columns
        .iter()
        .filter(|(name, _)| *name != ROW_ID_COLUMN)
        .map(|(name, _)| {
            let quoted = adapter.quote_ident(name);
            format!("{quoted} = VALUES({quoted})")
        })
        .collect();
    if updates.is_empty() {
        let id = adapter.quote_ident(ROW_ID_COLUMN);
        format!("{id} = {id}")
    } else {
        updates.join(", ")
    }
}

/// Quote text as a string constant. Text with a backslash becomes an escape
/// string constant so it reads the same whatever `standard_conforming_strings` is.
fn quote_literal(text: &str) -> String {
    let quoted = text.replace('\'', "''");
    if quoted.contains('\\') {
        format!("E'{}'", quoted.replace('\\', "\\\\"))
    } else {
        format!("'{quoted}'")
    }
}

/// Render a value as an untyped PostgreSQL literal.
pub(crate) fn postgres_literal(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Float(f) if f.is_nan() => quote_literal("NaN"),
        Value::Float(f) if f.is_infinite() => {
            quote_literal(if *f > 0.0 { "Infinity" } else { "-Infinity" })
        }
        Value::Bytes(bytes) => {
            let hex: String = bytes.iter().map(|b| format!("{b:02x}")).collect();
            quote_literal(&format!("\\x{hex}"))
        }
        other => quote_literal(&other.to_text().unwrap_or_default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sync_core::ForeignKey;

    fn user_row() -> Row {
        let mut row = Row::new("user", Some("u1".to_string()));
        row.push("name", "O'Brien");
        row.push("age", 42_i64);
        row
    }

    #[test]
    fn test_choose_mode() {
        assert_eq!(WriteMode::choose(Adapter::MySql, &user_row()), WriteMode::Upsert);
        assert_eq!(WriteMode::choose(Adapter::Postgres, &user_row()), WriteMode::Insert);
        let keyless = Row::new("tag", None);
        assert_eq!(WriteMode::choose(Adapter::MySql, &keyless), WriteMode::Insert);
    }

    #[test]
    fn test_mysql_insert() {
        let stmt = Statement::build(Adapter::MySql, &user_row(), WriteMode::Insert).unwrap();
        assert_eq!(
            stmt.sql,
            "INSERT INTO `user` (`id`, `name`, `age`) VALUES (?, ?, ?)"
        );
        assert_eq!(
            stmt.params,
            vec![
                Value::Text("u1".into()),
                Value::Text("O'Brien".into()),
                Value::Int(42)
            ]
        );
    }

    #[test]
    fn test_mysql_upsert() {
        let stmt = Statement::build(Adapter::MySql, &user_row(), WriteMode::Upsert).unwrap();
        assert_eq!(
            stmt.sql,
            "INSERT INTO `user` (`id`, `name`, `age`) VALUES (?, ?, ?) \
             ON DUPLICATE KEY UPDATE `name` = VALUES(`name`), `age` = VALUES(`age`)"
        );
    }

    #[test]
    fn test_mysql_upsert_key_only() {
        let row = Row::new("seen", Some("s1".to_string()));
        let stmt = Statement::build(Adapter::MySql, &row, WriteMode::Upsert).unwrap();
        assert!(stmt.sql.ends_with("ON DUPLICATE KEY UPDATE `id` = `id`"));
    }

    #[test]
    fn test_postgres_literals() {
        let mut row = Row::new("activity", None)
            .with_foreign_key(ForeignKey::new("user_id", "user", "u1"));
        row.push("active", true);
        row.push("note", Value::Null);
        row.push("blob", Value::Bytes(vec![0xde, 0xad]));
        row.push("score", f64::INFINITY);

        let stmt = Statement::build(Adapter::Postgres, &row, WriteMode::Insert).unwrap();
        assert_eq!(
            stmt.sql,
            "INSERT INTO \"activity\" (\"user_id\", \"active\", \"note\", \"blob\", \"score\") \
             VALUES ('u1', 'true', NULL, E'\\\\xdead', 'Infinity')"
        );
        assert!(stmt.params.is_empty());
    }

    #[test]
    fn test_postgres_escapes_quotes() {
        let stmt = Statement::build(Adapter::Postgres, &user_row(), WriteMode::Insert).unwrap();
        assert!(stmt.sql.contains("'O''Brien'"));
        assert!(stmt.sql.contains("'42'"));
    }

    #[test]
    fn test_postgres_escapes_backslashes() {
        let mut row = Row::new("file", None);
        row.push("path", "C:\\tmp\\it's");
        row.push("plain", "no escapes");

        let stmt = Statement::build(Adapter::Postgres, &row, WriteMode::Insert).unwrap();
        assert_eq!(
            stmt.sql,
            "INSERT INTO \"file\" (\"path\", \"plain\") \
             VALUES (E'C:\\\\tmp\\\\it''s', 'no escapes')"
        );
    }

    #[test]
    fn test_postgres_rejects_upsert() {
        let err = Statement::build(Adapter::Postgres, &user_row(), WriteMode::Upsert).unwrap_err();
        assert!(!err.is_transient());
    }

    #[test]
    fn test_postgres_empty_row() {
        let stmt = Statement::build(Adapter::Postgres, &Row::new("t", None), WriteMode::Insert)
            .unwrap();
        assert_eq!(stmt.sql, "INSERT INTO \"t\" DEFAULT VALUES");
    }
}
