//! # optstore - embedded option store
//!
//! Named configuration values kept in a local SQLite file, with optional
//! encryption of both name and value under a key generated on first use.

pub mod cli;
pub mod cli_handlers;
pub mod crypto;
pub mod db;
pub mod error;
pub mod journal;
pub mod models;
pub mod options;
pub mod shared;

pub use error::{Result, StoreError};
pub use models::*;
pub use options::OptionsStore;
pub use shared::SharedStore;
