//! Schema introspection.
//!
//! These helpers answer yes/no questions about the schema. A failing query is
//! logged and read as "no", never returned to the caller.

use crate::db::{Database, Value};
use rusqlite::Params;
use tracing::warn;

impl Database {
    /// Check if a table exists.
    pub fn table_exists(&self, name: &str) -> bool {
        self.count(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
            [name],
            "table_exists",
        ) > 0
    }

    /// Check if `table` has a column called `column`.
    pub fn column_exists(&self, table: &str, column: &str) -> bool {
        self.count(
            "SELECT COUNT(*) FROM pragma_table_info(?1) WHERE name = ?2",
            [table, column],
            "column_exists",
        ) > 0
    }

    /// Check if `table` holds at least one row.
    pub fn has_any_row(&self, table: &str) -> bool {
        let sql = format!("SELECT EXISTS(SELECT 1 FROM {})", quote_identifier(table));
        self.count(&sql, [], "has_any_row") > 0
    }

    /// Column names of `table` in declaration order, minus those in `excluding`.
    pub fn column_names(&self, table: &str, excluding: &[&str]) -> Vec<String> {
        let table_info = match self.query(
            "SELECT name FROM pragma_table_info(?1) ORDER BY cid",
            [table],
        ) {
            Ok(t) => t,
            Err(e) => {
                warn!(table, error = %e, "column_names query failed");
                return Vec::new();
            }
        };

        table_info
            .rows()
            .iter()
            .filter_map(|row| match row.first() {
                Some(Value::Text(name)) => Some(name.clone()),
                _ => None,
            })
            .filter(|name| !excluding.contains(&name.as_str()))
            .collect()
    }

    fn count<P: Params>(&self, sql: &str, params: P, helper: &str) -> i64 {
        match self.query_scalar(sql, params) {
            Ok(Some(Value::Integer(n))) => n,
            Ok(_) => 0,
            Err(e) => {
                warn!(helper, error = %e, "introspection query failed");
                0
            }
        }
    }
}

/// Quote an identifier for interpolation into SQL text.
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
