use crate::cli::{Cli, Commands};
use crate::db::Database;
use crate::journal::FileJournal;
use crate::models::Bootstrap;
use crate::options::{OPTIONS_TABLE, OptionsStore};
use anyhow::{Context, Result};
use std::path::Path;
use tracing::debug;

/// Printed when a read finds nothing.
const NULL_WORD: &str = "null";

/// Dispatch one parsed command line.
pub fn run(cli: Cli) -> Result<()> {
    let journal = cli.journal.as_deref();
    match cli.command {
        Commands::Init => handle_init(&cli.db, journal),
        Commands::Get {
            name,
            default,
            encrypted,
        } => handle_get(&cli.db, journal, &name, default.as_deref(), encrypted),
        Commands::Set {
            name,
            value,
            encrypted,
        } => handle_set(&cli.db, journal, &name, &value, encrypted),
        Commands::Delete { name, encrypted } => handle_delete(&cli.db, journal, &name, encrypted),
        Commands::Columns => handle_columns(&cli.db, journal),
    }
}

/// Connect to the database file without bootstrapping it.
fn connect(db: &Path, journal: Option<&Path>) -> Result<OptionsStore> {
    let mut database = Database::new(db);
    let status = database
        .create_database_file()
        .with_context(|| format!("creating {}", db.display()))?;
    debug!(path = %db.display(), %status);
    database.connect()?;

    let store = OptionsStore::new(database);
    Ok(match journal {
        Some(path) => store.with_sink(
            FileJournal::open(path).with_context(|| format!("opening journal {}", path.display()))?,
        ),
        None => store,
    })
}

fn open(db: &Path, journal: Option<&Path>) -> Result<OptionsStore> {
    let mut store = connect(db, journal)?;
    store.create_options_table()?;
    Ok(store)
}

/// Handle the init command
pub fn handle_init(db: &Path, journal: Option<&Path>) -> Result<()> {
    let mut store = connect(db, journal)?;
    match store.create_options_table()? {
        Bootstrap::Created => println!("Initialized option store in {}", db.display()),
        Bootstrap::AlreadyPresent => {
            println!("Option store already initialized in {}", db.display())
        }
    }
    store.close()?;
    Ok(())
}

/// Handle the get command
pub fn handle_get(
    db: &Path,
    journal: Option<&Path>,
    name: &str,
    default: Option<&str>,
    encrypted: bool,
) -> Result<()> {
    let mut store = open(db, journal)?;
    let value = if encrypted {
        store.get_encrypted(name, default)?
    } else {
        store.get(name, default)?
    };
    println!("{}", value.as_deref().unwrap_or(NULL_WORD));
    store.close()?;
    Ok(())
}

/// Handle the set command
pub fn handle_set(
    db: &Path,
    journal: Option<&Path>,
    name: &str,
    value: &str,
    encrypted: bool,
) -> Result<()> {
    let mut store = open(db, journal)?;
    let outcome = if encrypted {
        store.update_encrypted(name, value)?
    } else {
        store.update(name, value)?
    };
    println!("{outcome}");
    store.close()?;
    Ok(())
}

/// Handle the delete command
pub fn handle_delete(db: &Path, journal: Option<&Path>, name: &str, encrypted: bool) -> Result<()> {
    let mut store = open(db, journal)?;
    let outcome = if encrypted {
        store.delete_encrypted(name)?
    } else {
        store.delete(name)?
    };
    println!("{outcome}");
    store.close()?;
    Ok(())
}

/// Handle the columns command
pub fn handle_columns(db: &Path, journal: Option<&Path>) -> Result<()> {
    let mut store = open(db, journal)?;
    let database = store.database();
    let description = serde_json::json!({
        "table": OPTIONS_TABLE,
        "columns": database.column_names(OPTIONS_TABLE, &[]),
        "has_rows": database.has_any_row(OPTIONS_TABLE),
    });
    println!("{}", serde_json::to_string_pretty(&description)?);
    store.close()?;
    Ok(())
}
