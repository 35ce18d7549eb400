// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Destination paths and atomic moves

use chrono::Local;
use std::fs;
use std::io::ErrorKind as IoErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::record::FileRecord;
use crate::{AppConfig, Result};

/// Directory a record belongs in: `<output>/<category>[/<extension>]`
pub fn category_dir(config: &AppConfig, record: &FileRecord, category: &str) -> PathBuf {
    let mut dir = config.output_root(&record.root).join(category);
    if config.rules.sort_by_type {
        let ext = if record.extension.is_empty() { "no_extension" } else { &record.extension };
        dir = dir.join(ext);
    }
    dir
}

/// Pick a free path for `file_name` inside `dir`.
///
/// Collisions get a `_HHMMSS` suffix first, then a counter.
pub fn unique_destination(dir: &Path, file_name: &str) -> PathBuf {
    let candidate = dir.join(file_name);
    if !candidate.exists() {
        return candidate;
    }

    let name_path = Path::new(file_name);
    let stem = name_path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| file_name.to_string());
    let ext = name_path.extension().map(|e| e.to_string_lossy().to_string());
    let with_suffix = |suffix: &str| match &ext {
        Some(ext) => dir.join(format!("{}_{}.{}", stem, suffix, ext)),
        None => dir.join(format!("{}_{}", stem, suffix)),
    };

    let timestamp = Local::now().format("%H%M%S").to_string();
    let stamped = with_suffix(&timestamp);
    if !stamped.exists() {
        return stamped;
    }

    let mut n = 1u32;
    loop {
        let numbered = with_suffix(&format!("{}_{}", timestamp, n));
        if !numbered.exists() {
            return numbered;
        }
        n += 1;
    }
}

/// Move a file so that it ends up either fully at `to` or still at `from`.
///
/// Same-filesystem moves are a single rename. Across devices the data is
/// copied to a temporary name beside `to`, renamed into place, and only then
/// is the source removed.
pub fn move_file(from: &Path, to: &Path) -> Result<()> {
    if from == to {
        return Ok(());
    }
    if let Some(parent) = to.parent() {
        fs::create_dir_all(parent)?;
    }

    match fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() != IoErrorKind::NotFound => {
            debug!("rename {:?} -> {:?} failed ({}), copying", from, to, e);
            let tmp = staging_path(to);
            if let Err(copy_err) = fs::copy(from, &tmp).and_then(|_| fs::rename(&tmp, to)) {
                let _ = fs::remove_file(&tmp);
                return Err(copy_err.into());
            }
            fs::remove_file(from)?;
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

fn staging_path(to: &Path) -> PathBuf {
    let name = to
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    to.with_file_name(format!(".{}.sortwise-{}", name, uuid::Uuid::new_v4()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_dir() {
        let mut config = AppConfig::default();
        config.output_dir = Some("/out".to_string());
        let record = FileRecord::new(Path::new("/in"), Path::new("/in/a/report.pdf"), 10);

        assert_eq!(category_dir(&config, &record, "Finance"), PathBuf::from("/out/Finance"));
        config.rules.sort_by_type = true;
        assert_eq!(category_dir(&config, &record, "Finance"), PathBuf::from("/out/Finance/pdf"));

        config.output_dir = None;
        assert_eq!(category_dir(&config, &record, "Work"), PathBuf::from("/in/Work/pdf"));
    }

    #[test]
    fn test_unique_destination_avoids_collisions() {
        let dir = tempfile::tempdir().unwrap();
        let first = unique_destination(dir.path(), "notes.txt");
        assert_eq!(first, dir.path().join("notes.txt"));
        fs::write(&first, b"1").unwrap();

        let second = unique_destination(dir.path(), "notes.txt");
        assert_ne!(second, first);
        assert_eq!(second.extension().unwrap(), "txt");
        fs::write(&second, b"2").unwrap();

        let third = unique_destination(dir.path(), "notes.txt");
        assert!(third != first && third != second);
    }

    #[test]
    fn test_move_file_creates_parents() {
        let dir = tempfile::tempdir().unwrap();
        let from = dir.path().join("a.txt");
        let to = dir.path().join("Docs/deep/a.txt");
        fs::write(&from, b"payload").unwrap();

        move_file(&from, &to).unwrap();
        assert!(!from.exists());
        assert_eq!(fs::read(&to).unwrap(), b"payload");
    }

    #[test]
    fn test_move_missing_source_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = move_file(&dir.path().join("nope"), &dir.path().join("x/nope")).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Io);
    }
}
