use std::path::PathBuf;
use thiserror::Error;

/// All possible errors in the option store
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database is not connected. Call `connect` first.")]
    NotConnected,

    #[error("Connect DB is failed ({}): {source}", .path.display())]
    Connect {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    #[error("Close DB is failed: a background query is still using the connection")]
    ConnectionBusy,

    #[error("Close DB is failed: {0}")]
    Close(#[source] rusqlite::Error),

    #[error("Database error: {0}")]
    Db(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Encryption key is missing. Run `optstore init` first.")]
    MissingKey,

    #[error("Cipher error: {0}")]
    Crypto(String),

    #[error("Unexpected value in options table: {0}")]
    UnexpectedValue(String),

    #[error("Background query failed: {0}")]
    Background(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, StoreError>;
