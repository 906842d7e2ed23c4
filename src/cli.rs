use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "optstore")]
#[command(about = "Embedded SQLite option store")]
#[command(version)]
pub struct Cli {
    /// Path to the database file
    #[arg(long, global = true, default_value = "options.db")]
    pub db: PathBuf,

    /// Append store events to this file
    #[arg(long, global = true)]
    pub journal: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create the database file, the options table and the encryption key
    Init,

    /// Print the value of an option
    Get {
        /// Option name
        name: String,
        /// Printed when the option does not exist
        #[arg(long)]
        default: Option<String>,
        /// Read an encrypted option
        #[arg(long)]
        encrypted: bool,
    },

    /// Insert or update an option
    Set {
        /// Option name
        name: String,
        /// Option value
        value: String,
        /// Encrypt both name and value
        #[arg(long)]
        encrypted: bool,
    },

    /// Delete an option
    Delete {
        /// Option name
        name: String,
        /// Delete an encrypted option
        #[arg(long)]
        encrypted: bool,
    },

    /// Describe the options table as JSON
    Columns,
}
