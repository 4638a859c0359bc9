//! Relational adapters and their capabilities.

use crate::error::SinkError;
use std::fmt;
use std::str::FromStr;

/// Adapter names accepted by [`Adapter::from_str`], with the adapter they select.
///
/// | adapter names                   | adapter    | upsertable |
/// |---------------------------------|------------|------------|
/// | `mysql`, `mysql2`, `mariadb`    | MySql      | yes        |
/// | `postgres`, `postgresql`, `pg`  | Postgres   | no         |
///
/// Adding an adapter means adding a variant and its rows here.
const ADAPTER_NAMES: &[(&str, Adapter)] = &[
    ("mysql", Adapter::MySql),
    ("mysql2", Adapter::MySql),
    ("mariadb", Adapter::MySql),
    ("postgres", Adapter::Postgres),
    ("postgresql", Adapter::Postgres),
    ("pg", Adapter::Postgres),
];

/// A relational database family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Adapter {
    MySql,
    Postgres,
}

impl Adapter {
    /// Every accepted adapter name.
    pub fn names() -> Vec<&'static str> {
        ADAPTER_NAMES.iter().map(|(name, _)| *name).collect()
    }

    /// Every adapter with the names that select it.
    pub fn table() -> Vec<(Adapter, Vec<&'static str>)> {
        let mut out: Vec<(Adapter, Vec<&'static str>)> = Vec::new();
        for (name, adapter) in ADAPTER_NAMES {
            match out.iter_mut().find(|(a, _)| *a == *adapter) {
                Some((_, names)) => names.push(*name),
                None => out.push((*adapter, vec![*name])),
            }
        }
        out
    }

    /// Canonical name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::MySql => "mysql",
            Self::Postgres => "postgres",
        }
    }

    /// Whether the adapter supports a single insert-or-update statement.
    pub fn upsertable(&self) -> bool {
        match self {
            Self::MySql => true,
            Self::Postgres => false,
        }
    }

    pub fn default_port(&self) -> u16 {
        match self {
            Self::MySql => 3306,
            Self::Postgres => 5432,
        }
    }

    /// Quote an identifier, doubling any embedded quote character.
    pub fn quote_ident(&self, name: &str) -> String {
        match self {
            Self::MySql => format!("`{}`", name.replace('`', "``")),
            Self::Postgres => format!("\"{}\"", name.replace('"', "\"\"")),
        }
    }
}

impl FromStr for Adapter {
    type Err = SinkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        ADAPTER_NAMES
            .iter()
            .find(|(name, _)| *name == wanted)
            .map(|(_, adapter)| *adapter)
            .ok_or_else(|| SinkError::UnsupportedAdapter(s.to_string()))
    }
}

impl fmt::Display for Adapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
