//! Database connection management.

use crate::db::Table;
use crate::error::{Result, StoreError};
use crate::models::FileStatus;
use rusqlite::types::Value;
use rusqlite::{Connection, OptionalExtension, Params};
use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tracing::debug;

const MEMORY_PATH: &str = ":memory:";

/// How long a statement waits on a locked database file before failing.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Path to the option database file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbPath {
    path: PathBuf,
}

impl DbPath {
    /// Create a new DbPath with the default filename "options.db".
    pub fn default_path() -> Self {
        Self {
            path: PathBuf::from("options.db"),
        }
    }

    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn as_path(&self) -> &Path {
        &self.path
    }

    /// Check if the database file exists.
    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Whether this path names SQLite's private in-memory database.
    pub fn is_memory(&self) -> bool {
        self.path.as_os_str() == MEMORY_PATH
    }
}

impl Default for DbPath {
    fn default() -> Self {
        Self::default_path()
    }
}

/// Handle on one SQLite database file and its (at most one) open connection.
///
/// The connection is opened by [`Database::connect`] and released by
/// [`Database::close`]. Statements are not grouped: share a `Database`
/// across tasks only behind a mutex.
pub struct Database {
    path: DbPath,
    busy_timeout: Duration,
    conn: Option<Arc<Mutex<Connection>>>,
}

impl Database {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: DbPath::new(path),
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
            conn: None,
        }
    }

    /// A database that lives only as long as its connection.
    pub fn in_memory() -> Self {
        Self::new(MEMORY_PATH)
    }

    pub fn with_busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    pub fn path(&self) -> &DbPath {
        &self.path
    }

    pub fn is_connected(&self) -> bool {
        self.conn.is_some()
    }

    /// Create an empty database file (and its parent directories) if absent.
    pub fn create_database_file(&self) -> Result<FileStatus> {
        if self.path.is_memory() || self.path.exists() {
            return Ok(FileStatus::Exists);
        }

        if let Some(parent) = self
            .path
            .as_path()
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
        {
            fs::create_dir_all(parent)?;
        }

        // An empty file is a valid, empty SQLite database.
        match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(self.path.as_path())
        {
            Ok(_) => {
                debug!(path = %self.path.as_path().display(), "DB File is created");
                Ok(FileStatus::Created)
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Ok(FileStatus::Exists),
            Err(e) => Err(e.into()),
        }
    }

    /// Open the connection. Calling this while already connected is a no-op.
    pub fn connect(&mut self) -> Result<()> {
        if self.conn.is_some() {
            return Ok(());
        }

        let conn = Connection::open(self.path.as_path())
            .and_then(|conn| {
                conn.busy_timeout(self.busy_timeout)?;
                Ok(conn)
            })
            .map_err(|source| StoreError::Connect {
                path: self.path.as_path().to_path_buf(),
                source,
            })?;

        debug!(path = %self.path.as_path().display(), "DB is connected");
        self.conn = Some(Arc::new(Mutex::new(conn)));
        Ok(())
    }

    /// Close the connection. Closing a database that was never opened succeeds.
    ///
    /// Fails with [`StoreError::ConnectionBusy`], leaving the connection open,
    /// while an abandoned [`Database::query_async`] is still running on it.
    pub fn close(&mut self) -> Result<()> {
        let Some(shared) = self.conn.take() else {
            return Ok(());
        };

        let conn = match Arc::try_unwrap(shared) {
            Ok(mutex) => mutex.into_inner().unwrap_or_else(PoisonError::into_inner),
            Err(shared) => {
                self.conn = Some(shared);
                return Err(StoreError::ConnectionBusy);
            }
        };

        conn.close().map_err(|(conn, source)| {
            self.conn = Some(Arc::new(Mutex::new(conn)));
            StoreError::Close(source)
        })?;

        debug!(path = %self.path.as_path().display(), "DB is closed");
        Ok(())
    }

    /// Run `f` on the connection, waiting for any background query using it.
    fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let shared = self.conn.as_ref().ok_or(StoreError::NotConnected)?;
        let conn = shared.lock().unwrap_or_else(PoisonError::into_inner);
        f(&conn)
    }

    /// Execute a statement that returns no rows; yields the affected row count.
    pub fn execute<P: Params>(&self, sql: &str, params: P) -> Result<usize> {
        self.with_conn(|conn| Ok(conn.execute(sql, params)?))
    }

    /// Execute one or more statements without parameters.
    pub fn execute_batch(&self, sql: &str) -> Result<()> {
        self.with_conn(|conn| Ok(conn.execute_batch(sql)?))
    }

    /// Run a query and load every row into memory.
    pub fn query<P: Params>(&self, sql: &str, params: P) -> Result<Table> {
        self.with_conn(|conn| run_query(conn, sql, params))
    }

    /// First column of the first row. `Ok(None)` means the query returned no rows.
    pub fn query_scalar<P: Params>(&self, sql: &str, params: P) -> Result<Option<Value>> {
        self.with_conn(|conn| {
            conn.query_row(sql, params, |row| row.get::<_, Value>(0))
                .optional()
                .map_err(|e| e.into())
        })
    }

    /// Async variant of [`Database::query`].
    ///
    /// The query runs on a blocking thread that shares the connection. If this
    /// future is dropped early the query still finishes in the background and
    /// the connection stays usable; later calls wait for it.
    pub async fn query_async(&self, sql: &str, params: Vec<Value>) -> Result<Table> {
        let shared = Arc::clone(self.conn.as_ref().ok_or(StoreError::NotConnected)?);
        let sql = sql.to_owned();

        tokio::task::spawn_blocking(move || {
            let conn = shared.lock().unwrap_or_else(PoisonError::into_inner);
            run_query(&conn, &sql, rusqlite::params_from_iter(params))
        })
        .await
        .map_err(|e| StoreError::Background(e.to_string()))?
    }
}

fn run_query<P: Params>(conn: &Connection, sql: &str, params: P) -> Result<Table> {
    let mut stmt = conn.prepare(sql)?;
    let columns: Vec<String> = stmt
        .column_names()
        .into_iter()
        .map(String::from)
        .collect();
    let width = columns.len();

    let rows = stmt
        .query_map(params, |row| {
            (0..width)
                .map(|i| row.get::<_, Value>(i))
                .collect::<rusqlite::Result<Vec<_>>>()
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(Table::new(columns, rows))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn connected() -> Database {
        let mut db = Database::in_memory();
        db.connect().unwrap();
        db.execute_batch(
            "CREATE TABLE things (id INTEGER PRIMARY KEY AUTOINCREMENT, name TEXT NOT NULL);
             INSERT INTO things (name) VALUES ('alpha');
             INSERT INTO things (name) VALUES ('beta');",
        )
        .unwrap();
        db
    }

    #[test]
    fn test_db_path_default() {
        let path = DbPath::default_path();
        assert_eq!(path.as_path(), Path::new("options.db"));
        assert!(!path.is_memory());
    }

    #[test]
    fn test_db_path_memory() {
        assert!(Database::in_memory().path().is_memory());
    }

    #[test]
    fn test_create_database_file_is_idempotent() {
        let dir = tempfile::TempDir::new().unwrap();
        let db = Database::new(dir.path().join("nested").join("store.db"));

        assert_eq!(db.create_database_file().unwrap(), FileStatus::Created);
        assert!(db.path().exists());
        assert_eq!(db.create_database_file().unwrap(), FileStatus::Exists);
    }

    #[test]
    fn test_created_file_is_usable() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut db = Database::new(dir.path().join("store.db"));
        db.create_database_file().unwrap();
        db.connect().unwrap();
        db.execute("CREATE TABLE t (x INTEGER)", []).unwrap();
        assert_eq!(db.execute("INSERT INTO t (x) VALUES (?1)", [7]).unwrap(), 1);
    }

    #[test]
    fn test_connect_failure_reports_cause() {
        let dir = tempfile::TempDir::new().unwrap();
        // A directory cannot be opened as a database file.
        let mut db = Database::new(dir.path());
        let err = db.connect().unwrap_err();
        assert!(matches!(err, StoreError::Connect { .. }));
        assert!(err.to_string().starts_with("Connect DB is failed"));
        assert!(!db.is_connected());
    }

    #[test]
    fn test_connect_twice_is_noop() {
        let mut db = connected();
        db.connect().unwrap();
        let count = db.query_scalar("SELECT COUNT(*) FROM things", []).unwrap();
        assert_eq!(count, Some(Value::Integer(2)));
    }

    #[test]
    fn test_close_without_connect() {
        let mut db = Database::in_memory();
        db.close().unwrap();
        db.close().unwrap();
    }

    #[test]
    fn test_statements_after_close_fail() {
        let mut db = connected();
        db.close().unwrap();
        assert!(matches!(
            db.execute("DELETE FROM things", []),
            Err(StoreError::NotConnected)
        ));
        assert!(matches!(
            db.query("SELECT * FROM things", []),
            Err(StoreError::NotConnected)
        ));
    }

    #[test]
    fn test_execute_reports_engine_message() {
        let db = connected();
        let err = db.execute("INSERT INTO nowhere VALUES (1)", []).unwrap_err();
        assert!(matches!(err, StoreError::Db(_)));
        assert!(err.to_string().contains("no such table: nowhere"));
    }

    #[test]
    fn test_query_materializes_rows() {
        let db = connected();
        let table = db
            .query("SELECT id, name FROM things ORDER BY id", [])
            .unwrap();
        assert_eq!(table.columns(), ["id", "name"]);
        assert_eq!(table.row_count(), 2);
        assert_eq!(table.text(1, "name"), Some("beta"));
    }

    #[test]
    fn test_query_with_params() {
        let db = connected();
        let table = db
            .query("SELECT id FROM things WHERE name = ?1", ["alpha"])
            .unwrap();
        assert_eq!(table.get(0, "id"), Some(&Value::Integer(1)));
    }

    #[test]
    fn test_query_scalar_no_rows() {
        let db = connected();
        let value = db
            .query_scalar("SELECT name FROM things WHERE id = ?1", [99])
            .unwrap();
        assert_eq!(value, None);
    }

    #[test]
    fn test_query_scalar_error() {
        let db = connected();
        assert!(db.query_scalar("SELECT nope FROM things", []).is_err());
    }

    #[tokio::test]
    async fn test_query_async_restores_connection() {
        let db = connected();
        let table = db
            .query_async(
                "SELECT name FROM things WHERE id = ?1",
                vec![Value::Integer(2)],
            )
            .await
            .unwrap();
        assert_eq!(table.text(0, "name"), Some("beta"));

        assert!(db.is_connected());
        assert_eq!(
            db.query_scalar("SELECT COUNT(*) FROM things", []).unwrap(),
            Some(Value::Integer(2))
        );
    }

    #[tokio::test]
    async fn test_query_async_error_keeps_connection() {
        let db = connected();
        assert!(db.query_async("SELECT * FROM missing", vec![]).await.is_err());
        assert!(db.is_connected());
    }

    #[tokio::test]
    async fn test_query_async_not_connected() {
        let db = Database::in_memory();
        assert!(matches!(
            db.query_async("SELECT 1", vec![]).await,
            Err(StoreError::NotConnected)
        ));
    }

    #[tokio::test]
    async fn test_dropped_query_async_keeps_connection() {
        let mut db = connected();
        {
            let pending = db.query_async(
                "WITH RECURSIVE c(x) AS (SELECT 1 UNION ALL SELECT x + 1 FROM c WHERE x < 2000000)
                 SELECT MAX(x) FROM c",
                vec![],
            );
            tokio::pin!(pending);
            // Start the query, then abandon it.
            std::future::poll_fn(|cx| {
                let _ = pending.as_mut().poll(cx);
                std::task::Poll::Ready(())
            })
            .await;
        }

        assert!(db.is_connected());
        assert_eq!(db.execute("INSERT INTO things (name) VALUES ('gamma')", []).unwrap(), 1);
        assert_eq!(
            db.query_scalar("SELECT COUNT(*) FROM things", []).unwrap(),
            Some(Value::Integer(3))
        );
    }
}
