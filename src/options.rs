//! The option store.
//!
//! Options live in a single `options` table. Lookups take the lowest
//! `option_id` among rows with a matching name; updates and deletes touch
//! every row with that name. Encrypted options store the sealed name and
//! sealed value, keyed by the plain `"key"` option written at bootstrap.

use crate::crypto::{self, Cipher};
use crate::db::{Database, Value};
use crate::error::{Result, StoreError};
use crate::journal::{Event, EventKind, EventSink, TracingSink};
use crate::models::{Bootstrap, Outcome};
use std::path::Path;
use tracing::{info, warn};

pub const OPTIONS_TABLE: &str = "options";

/// Name of the plain option that holds the encryption key.
pub const KEY_OPTION: &str = "key";

const CREATE_OPTIONS_TABLE: &str = "CREATE TABLE IF NOT EXISTS options (
        option_id INTEGER PRIMARY KEY AUTOINCREMENT,
        option_name TEXT NOT NULL,
        option_value TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_options_name ON options(option_name);";

const COUNT_OPTIONS_TABLE: &str =
    "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1";
const SELECT_VALUE: &str =
    "SELECT option_value FROM options WHERE option_name = ?1 ORDER BY option_id ASC LIMIT 1";
const INSERT_OPTION: &str = "INSERT INTO options (option_name, option_value) VALUES (?1, ?2)";
const UPDATE_OPTION: &str = "UPDATE options SET option_value = ?1 WHERE option_name = ?2";
const DELETE_OPTION: &str = "DELETE FROM options WHERE option_name = ?1";

/// Persistent option store over one database.
pub struct OptionsStore {
    db: Database,
    sink: Box<dyn EventSink>,
}

impl OptionsStore {
    /// Wrap an already connected database. Does not bootstrap.
    pub fn new(db: Database) -> Self {
        Self {
            db,
            sink: Box::new(TracingSink),
        }
    }

    /// Send store events to `sink` instead of `tracing`.
    pub fn with_sink<S: EventSink + 'static>(mut self, sink: S) -> Self {
        self.sink = Box::new(sink);
        self
    }

    /// Create the file if needed, connect and bootstrap the options table.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_database(Database::new(path))
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::open_database(Database::in_memory())
    }

    pub fn open_database(mut db: Database) -> Result<Self> {
        db.create_database_file()?;
        db.connect()?;
        let mut store = Self::new(db);
        store.create_options_table()?;
        Ok(store)
    }

    /// The underlying database, for introspection.
    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn close(&mut self) -> Result<()> {
        self.db.close()
    }

    // ==================== Bootstrap ====================

    /// Create the options table and the encryption key on first use.
    ///
    /// Once the table exists this does nothing: a new key would make every
    /// encrypted option unreadable.
    pub fn create_options_table(&mut self) -> Result<Bootstrap> {
        let present = self
            .db
            .query_scalar(COUNT_OPTIONS_TABLE, [OPTIONS_TABLE])?;
        if matches!(present, Some(Value::Integer(n)) if n > 0) {
            self.emit(EventKind::Bootstrap, "Options table already present");
            return Ok(Bootstrap::AlreadyPresent);
        }

        let key_created = self.in_transaction(|store| {
            store.db.execute_batch(CREATE_OPTIONS_TABLE)?;
            if store.lookup(KEY_OPTION)?.is_some() {
                return Ok(false);
            }
            store.write_row(KEY_OPTION, &crypto::generate_key())?;
            Ok(true)
        })?;

        info!(path = %self.db.path().as_path().display(), "options table created");
        self.emit(EventKind::Bootstrap, "Options table created");
        if key_created {
            self.emit(EventKind::KeyGenerated, "Encryption key generated");
        }
        Ok(Bootstrap::Created)
    }

    // ==================== Plain Options ====================

    /// Current value of `name`, else `default`.
    ///
    /// An empty name is rejected without touching storage and yields `None`.
    pub fn get(&mut self, name: &str, default: Option<&str>) -> Result<Option<String>> {
        if name.is_empty() {
            self.reject("get");
            return Ok(None);
        }

        let value = self.lookup(name)?;
        self.emit_read(name, value.is_some());
        Ok(value.or_else(|| default.map(str::to_owned)))
    }

    /// Async variant of [`OptionsStore::get`].
    pub async fn get_async(&mut self, name: &str, default: Option<&str>) -> Result<Option<String>> {
        if name.is_empty() {
            self.reject("get");
            return Ok(None);
        }

        let table = self
            .db
            .query_async(SELECT_VALUE, vec![Value::Text(name.to_owned())])
            .await?;
        let value = table
            .rows()
            .first()
            .and_then(|row| row.first())
            .cloned()
            .map(into_text)
            .transpose()?;

        self.emit_read(name, value.is_some());
        Ok(value.or_else(|| default.map(str::to_owned)))
    }

    /// Insert `name` if absent, otherwise overwrite its value.
    ///
    /// The encryption key option is read-only here and yields `Invalid`.
    pub fn update(&mut self, name: &str, value: &str) -> Result<Outcome> {
        if name.is_empty() {
            self.reject("update");
            return Ok(Outcome::Invalid);
        }
        if name == KEY_OPTION {
            self.reject_key("update");
            return Ok(Outcome::Invalid);
        }

        let outcome = self.in_transaction(|store| store.write_row(name, value))?;
        self.emit(EventKind::Write, format!("Option {name} {outcome}"));
        Ok(outcome)
    }

    /// Delete every row named `name`. The encryption key cannot be deleted.
    pub fn delete(&mut self, name: &str) -> Result<Outcome> {
        if name.is_empty() {
            self.reject("delete");
            return Ok(Outcome::Invalid);
        }
        if name == KEY_OPTION {
            self.reject_key("delete");
            return Ok(Outcome::Invalid);
        }

        let outcome = self.in_transaction(|store| store.delete_rows(name))?;
        self.emit(EventKind::Delete, format!("Option {name} {outcome}"));
        Ok(outcome)
    }

    // ==================== Encrypted Options ====================

    /// Decrypted value of the encrypted option `name`.
    ///
    /// An empty `default` counts as no default.
    pub fn get_encrypted(&mut self, name: &str, default: Option<&str>) -> Result<Option<String>> {
        if name.is_empty() {
            self.reject("get_encrypted");
            return Ok(None);
        }

        let cipher = self.cipher()?;
        let sealed = self.lookup(&cipher.seal(name)?)?;
        self.emit(
            EventKind::Read,
            format!(
                "Encrypted option {}",
                if sealed.is_some() { "found" } else { "missing" }
            ),
        );

        match sealed {
            Some(sealed) => cipher.open(&sealed).map(Some),
            None => Ok(default.filter(|d| !d.is_empty()).map(str::to_owned)),
        }
    }

    pub fn update_encrypted(&mut self, name: &str, value: &str) -> Result<Outcome> {
        if name.is_empty() {
            self.reject("update_encrypted");
            return Ok(Outcome::Invalid);
        }

        let outcome = self.in_transaction(|store| {
            let cipher = store.cipher()?;
            store.write_row(&cipher.seal(name)?, &cipher.seal(value)?)
        })?;
        self.emit(EventKind::Write, format!("Encrypted option {outcome}"));
        Ok(outcome)
    }

    pub fn delete_encrypted(&mut self, name: &str) -> Result<Outcome> {
        if name.is_empty() {
            self.reject("delete_encrypted");
            return Ok(Outcome::Invalid);
        }

        let outcome = self.in_transaction(|store| {
            let cipher = store.cipher()?;
            store.delete_rows(&cipher.seal(name)?)
        })?;
        self.emit(EventKind::Delete, format!("Encrypted option {outcome}"));
        Ok(outcome)
    }

    // ==================== Internals ====================

    /// Key is read on every call, never cached.
    fn cipher(&self) -> Result<Cipher> {
        let key = self.lookup(KEY_OPTION)?.ok_or(StoreError::MissingKey)?;
        Ok(Cipher::new(&key))
    }

    fn lookup(&self, stored_name: &str) -> Result<Option<String>> {
        self.db
            .query_scalar(SELECT_VALUE, [stored_name])?
            .map(into_text)
            .transpose()
    }

    fn write_row(&self, stored_name: &str, stored_value: &str) -> Result<Outcome> {
        if self.lookup(stored_name)?.is_none() {
            self.db.execute(INSERT_OPTION, [stored_name, stored_value])?;
            return Ok(Outcome::Inserted);
        }

        self.db.execute(UPDATE_OPTION, [stored_value, stored_name])?;
        Ok(Outcome::Updated)
    }

    fn delete_rows(&self, stored_name: &str) -> Result<Outcome> {
        if self.lookup(stored_name)?.is_none() {
            return Ok(Outcome::NotFound);
        }

        self.db.execute(DELETE_OPTION, [stored_name])?;
        Ok(Outcome::Deleted)
    }

    /// Run `f` inside `BEGIN IMMEDIATE`, so the lookup and the write it
    /// decides on see the same table.
    fn in_transaction<T>(&self, f: impl FnOnce(&Self) -> Result<T>) -> Result<T> {
        self.db.execute_batch("BEGIN IMMEDIATE")?;

        let result = f(self).and_then(|value| {
            self.db.execute_batch("COMMIT")?;
            Ok(value)
        });

        if result.is_err() {
            if let Err(e) = self.db.execute_batch("ROLLBACK") {
                warn!(error = %e, "rollback failed");
            }
        }
        result
    }

    fn emit(&self, kind: EventKind, message: impl Into<String>) {
        self.sink.record(&Event::new(kind, message));
    }

    fn emit_read(&self, name: &str, found: bool) {
        let state = if found { "found" } else { "missing" };
        self.emit(EventKind::Read, format!("Option {name} {state}"));
    }

    fn reject(&self, operation: &str) {
        self.emit(
            EventKind::Rejected,
            format!("{operation} rejected: empty option name"),
        );
    }

    fn reject_key(&self, operation: &str) {
        self.emit(
            EventKind::Rejected,
            format!("{operation} rejected: {KEY_OPTION} is reserved"),
        );
    }
}

fn into_text(value: Value) -> Result<String> {
    match value {
        Value::Text(s) => Ok(s),
        Value::Integer(n) => Ok(n.to_string()),
        Value::Real(f) => Ok(f.to_string()),
        Value::Blob(bytes) => {
            String::from_utf8(bytes).map_err(|e| StoreError::UnexpectedValue(e.to_string()))
        }
        Value::Null => Err(StoreError::UnexpectedValue(
            "option_value is NULL".to_string(),
        )),
    }
}
