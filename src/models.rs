use serde::{Deserialize, Serialize};
use std::fmt;

/// Result of a write or delete against the options table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Inserted,
    Updated,
    Deleted,
    NotFound,
    Invalid,
}

impl Outcome {
    /// The word printed for this outcome. Absence keeps the historic `null`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Inserted => "inserted",
            Outcome::Updated => "updated",
            Outcome::Deleted => "deleted",
            Outcome::NotFound => "null",
            Outcome::Invalid => "invalid",
        }
    }

    /// Whether the table was changed by the operation.
    pub fn is_change(&self) -> bool {
        matches!(self, Outcome::Inserted | Outcome::Updated | Outcome::Deleted)
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// What `create_options_table` found
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Bootstrap {
    Created,
    AlreadyPresent,
}

/// What `create_database_file` found on disk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileStatus {
    Created,
    Exists,
}

impl FileStatus {
    pub fn message(&self) -> &'static str {
        match self {
            FileStatus::Created => "DB File is created",
            FileStatus::Exists => "DB File exists",
        }
    }
}

impl fmt::Display for FileStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}
