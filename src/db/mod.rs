//! Database layer for the option store.
//!
//! Owns the SQLite connection, runs statements, materialises result sets and
//! answers schema questions. Knows nothing about options.

mod connection;
pub mod schema;
mod table;

pub use connection::{Database, DbPath};
pub use rusqlite::types::Value;
pub use table::Table;
