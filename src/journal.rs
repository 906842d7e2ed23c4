//! Store events and the sinks that receive them.

use crate::error::Result;
use chrono::Local;
use serde::Serialize;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Category of a store event. The numeric code is stable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Bootstrap,
    KeyGenerated,
    Read,
    Write,
    Delete,
    Rejected,
}

impl EventKind {
    pub fn code(&self) -> u16 {
        match self {
            EventKind::Bootstrap => 1,
            EventKind::KeyGenerated => 2,
            EventKind::Read => 3,
            EventKind::Write => 4,
            EventKind::Delete => 5,
            EventKind::Rejected => 6,
        }
    }
}

/// A milestone reported by the option store
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Event {
    pub kind: EventKind,
    pub message: String,
}

impl Event {
    pub fn new(kind: EventKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn code(&self) -> u16 {
        self.kind.code()
    }
}

/// Receiver for store events, injected at construction.
pub trait EventSink: Send + Sync {
    fn record(&self, event: &Event);
}

/// Forwards events to `tracing` at debug level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn record(&self, event: &Event) {
        debug!(code = event.code(), "{}", event.message);
    }
}

type Observer = Box<dyn Fn(&Event) + Send + Sync>;

/// Append-only text log, one timestamped line per entry.
pub struct FileJournal {
    path: PathBuf,
    observer: Option<Observer>,
}

impl FileJournal {
    /// Open the journal, creating the file if it does not exist.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            path,
            observer: None,
        })
    }

    /// Call `observer` after every event this journal records.
    pub fn with_observer<F>(mut self, observer: F) -> Self
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.observer = Some(Box::new(observer));
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append `[timestamp] content` as one line.
    pub fn append(&self, content: &str) -> Result<()> {
        let mut file = OpenOptions::new().append(true).open(&self.path)?;
        let stamp = Local::now().format("%Y-%m-%d %H:%M:%S");
        writeln!(file, "[{stamp}] {content}")?;
        Ok(())
    }
}

impl EventSink for FileJournal {
    fn record(&self, event: &Event) {
        if let Err(e) = self.append(&format!("{} {}", event.code(), event.message)) {
            warn!(path = %self.path.display(), error = %e, "journal append failed");
            return;
        }
        if let Some(observer) = &self.observer {
            observer(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_codes_are_stable() {
        assert_eq!(EventKind::Bootstrap.code(), 1);
        assert_eq!(EventKind::KeyGenerated.code(), 2);
        assert_eq!(EventKind::Rejected.code(), 6);
    }

    #[test]
    fn test_open_creates_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("store.log");
        let journal = FileJournal::open(&path).unwrap();
        assert!(journal.path().exists());
        assert_eq!(fs::read_to_string(&path).unwrap(), "");
    }

    #[test]
    fn test_append_writes_timestamped_lines() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("store.log");
        let journal = FileJournal::open(&path).unwrap();

        journal.append("first").unwrap();
        journal.append("second").unwrap();

        let text = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with('['));
        assert!(lines[0].ends_with("] first"));
        assert!(lines[1].ends_with("] second"));
    }

    #[test]
    fn test_record_notifies_observer() {
        let dir = tempfile::TempDir::new().unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let journal = FileJournal::open(dir.path().join("store.log"))
            .unwrap()
            .with_observer(move |event| sink.lock().unwrap().push(event.code()));

        journal.record(&Event::new(EventKind::Write, "Option inserted"));

        assert_eq!(*seen.lock().unwrap(), vec![4]);
        let text = fs::read_to_string(journal.path()).unwrap();
        assert!(text.contains("] 4 Option inserted"));
    }
}
