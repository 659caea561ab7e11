//! Append-only history logs, one file per session.
//!
//! Every byte a session's process emits is appended to `<dir>/<id>.log`.
//! The file is replayed to viewers when they attach and removed when the
//! session is explicitly deleted.

use std::fs::{self, File, OpenOptions};
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};

/// File extension for history logs.
const HISTORY_EXTENSION: &str = "log";

/// Locates and manages history files under a base directory.
#[derive(Debug, Clone)]
pub struct HistoryStore {
    dir: PathBuf,
}

impl HistoryStore {
    /// Creates a store rooted at `dir`. The directory is created lazily.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Returns the base directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Returns the history file path for a session.
    pub fn path_for(&self, session_id: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", session_id, HISTORY_EXTENSION))
    }

    /// Opens the history file for appending, creating it and the base
    /// directory if needed.
    pub fn open(&self, session_id: &str) -> io::Result<File> {
        fs::create_dir_all(&self.dir)?;
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.path_for(session_id))
    }

    /// Reads the full history for a session. A missing file reads as empty.
    pub fn read(&self, session_id: &str) -> io::Result<Vec<u8>> {
        match fs::read(self.path_for(session_id)) {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e),
        }
    }

    /// Removes a session's history file. Removing a missing file succeeds.
    pub fn remove(&self, session_id: &str) -> io::Result<()> {
        match fs::remove_file(self.path_for(session_id)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn test_path_is_derived_from_id() {
        let store = HistoryStore::new("/var/lib/conductor/sessions");
        assert_eq!(
            store.path_for("a1b2c3d4"),
            PathBuf::from("/var/lib/conductor/sessions/a1b2c3d4.log")
        );
    }

    #[test]
    fn test_open_creates_directory_and_appends() {
        let temp = TempDir::new().unwrap();
        let store = HistoryStore::new(temp.path().join("nested").join("sessions"));

        let mut file = store.open("s1").unwrap();
        file.write_all(b"first ").unwrap();
        drop(file);

        // Reopening must append, never truncate.
        let mut file = store.open("s1").unwrap();
        file.write_all(b"second").unwrap();
        drop(file);

        assert_eq!(store.read("s1").unwrap(), b"first second");
    }

    #[test]
    fn test_read_missing_is_empty() {
        let temp = TempDir::new().unwrap();
        let store = HistoryStore::new(temp.path());
        assert!(store.read("nope").unwrap().is_empty());
    }

    #[test]
    fn test_remove_is_idempotent() {
        let temp = TempDir::new().unwrap();
        let store = HistoryStore::new(temp.path());
        store.open("gone").unwrap();
        assert!(store.path_for("gone").exists());

        store.remove("gone").unwrap();
        assert!(!store.path_for("gone").exists());
        store.remove("gone").unwrap();
    }

    #[test]
    fn test_open_fails_when_directory_is_a_file() {
        let temp = TempDir::new().unwrap();
        let blocker = temp.path().join("blocker");
        fs::write(&blocker, b"not a directory").unwrap();

        let store = HistoryStore::new(blocker.join("sessions"));
        assert!(store.open("s1").is_err());
    }
}
