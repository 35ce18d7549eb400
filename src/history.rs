// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Move journal for undo support

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::placement;
use crate::{Result, SortwiseError};

/// A single file move in history
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub original_path: PathBuf,
    pub new_path: PathBuf,
    pub category: String,
    #[serde(default)]
    pub fingerprint: Option<String>,
    pub undone: bool,
}

/// Outcome of undoing one entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UndoResult {
    Restored,
    /// The moved file is no longer where it was put
    Missing,
    /// Something else now occupies the original location
    Occupied,
}

/// History manager for tracking file moves
pub struct History {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl History {
    /// Create a new history manager
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            write_lock: Mutex::new(()),
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, ()>> {
        self.write_lock
            .lock()
            .map_err(|_| SortwiseError::LockPoisoned("history"))
    }

    /// Append an entry to the history
    pub fn append(&self, entry: &HistoryEntry) -> Result<()> {
        let _guard = self.lock()?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        let json = serde_json::to_string(entry)?;
        writeln!(file, "{}", json)?;

        Ok(())
    }

    /// Read all history entries
    pub fn read_all(&self) -> Result<Vec<HistoryEntry>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let file = File::open(&self.path)?;
        let reader = BufReader::new(file);

        let mut entries = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str(&line) {
                Ok(entry) => entries.push(entry),
                Err(e) => {
                    tracing::warn!("Failed to parse history entry: {}", e);
                }
            }
        }

        Ok(entries)
    }

    /// Get the most recent N entries (newest first)
    pub fn get_recent(&self, count: usize) -> Result<Vec<HistoryEntry>> {
        let mut entries = self.read_all()?;
        entries.reverse();
        entries.truncate(count);
        Ok(entries)
    }

    /// Mark an entry as undone
    pub fn mark_undone(&self, id: &str) -> Result<()> {
        let entries = self.read_all()?;
        let _guard = self.lock()?;

        // Rewrite the entire file with the updated entry
        let file = File::create(&self.path)?;
        let mut writer = std::io::BufWriter::new(file);

        for mut entry in entries {
            if entry.id == id {
                entry.undone = true;
            }
            let json = serde_json::to_string(&entry)?;
            writeln!(writer, "{}", json)?;
        }

        Ok(())
    }

    /// Get entries that haven't been undone
    pub fn get_undoable(&self) -> Result<Vec<HistoryEntry>> {
        let entries = self.read_all()?;
        Ok(entries.into_iter().filter(|e| !e.undone).collect())
    }

    /// Move a file back to where it came from and mark the entry undone
    pub fn undo(&self, entry: &HistoryEntry) -> Result<UndoResult> {
        if !entry.new_path.exists() {
            return Ok(UndoResult::Missing);
        }
        if entry.original_path.exists() {
            return Ok(UndoResult::Occupied);
        }
        placement::move_file(&entry.new_path, &entry.original_path)?;
        self.mark_undone(&entry.id)?;
        Ok(UndoResult::Restored)
    }

    /// Clear all history
    pub fn clear(&self) -> Result<()> {
        let _guard = self.lock()?;
        if self.path.exists() {
            fs::remove_file(&self.path)?;
        }
        Ok(())
    }

    /// Get history file path
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Create a new history entry
pub fn create_entry(
    original_path: PathBuf,
    new_path: PathBuf,
    category: String,
    fingerprint: Option<String>,
) -> HistoryEntry {
    HistoryEntry {
        id: uuid::Uuid::new_v4().to_string(),
        timestamp: Utc::now(),
        original_path,
        new_path,
        category,
        fingerprint,
        undone: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_and_read() {
        let dir = tempfile::tempdir().unwrap();
        let history = History::new(dir.path().join("history.jsonl"));
        assert!(history.read_all().unwrap().is_empty());

        for i in 0..3 {
            let entry = create_entry(
                PathBuf::from(format!("/in/{}.txt", i)),
                PathBuf::from(format!("/out/Work/{}.txt", i)),
                "Work".to_string(),
                None,
            );
            history.append(&entry).unwrap();
        }

        let recent = history.get_recent(2).unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].original_path, PathBuf::from("/in/2.txt"));
    }

    #[test]
    fn test_undo_restores_file() {
        let dir = tempfile::tempdir().unwrap();
        let history = History::new(dir.path().join("history.jsonl"));
        let original = dir.path().join("report.pdf");
        let moved = dir.path().join("Work/report.pdf");
        std::fs::create_dir_all(moved.parent().unwrap()).unwrap();
        std::fs::write(&moved, b"pdf").unwrap();

        let entry = create_entry(original.clone(), moved.clone(), "Work".to_string(), None);
        history.append(&entry).unwrap();

        assert_eq!(history.undo(&entry).unwrap(), UndoResult::Restored);
        assert!(original.exists());
        assert!(!moved.exists());
        assert!(history.get_undoable().unwrap().is_empty());
        assert_eq!(history.undo(&entry).unwrap(), UndoResult::Missing);
    }

    #[test]
    fn test_undo_refuses_to_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let history = History::new(dir.path().join("history.jsonl"));
        let original = dir.path().join("a.txt");
        let moved = dir.path().join("b.txt");
        std::fs::write(&original, b"new occupant").unwrap();
        std::fs::write(&moved, b"moved").unwrap();

        let entry = create_entry(original, moved.clone(), "Other".to_string(), None);
        assert_eq!(history.undo(&entry).unwrap(), UndoResult::Occupied);
        assert!(moved.exists());
    }
}
