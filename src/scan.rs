// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Directory traversal and include/exclude filters

use glob::Pattern;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

use crate::record::FileRecord;
use crate::{AppConfig, Result, SortwiseError};

/// Marker used in names of in-progress staging files and directories
pub const STAGING_MARKER: &str = ".sortwise-";

/// Files found by a walk, plus the entries that could not be read
#[derive(Debug, Default)]
pub struct Discovery {
    pub records: Vec<FileRecord>,
    pub errors: Vec<(PathBuf, SortwiseError)>,
}

/// Check if a file name is worth processing at all
pub fn should_process(path: &Path) -> bool {
    let filename = match path.file_name().and_then(|n| n.to_str()) {
        Some(n) => n,
        None => return false,
    };

    if filename.contains(STAGING_MARKER) {
        return false;
    }

    // Skip temporary files
    let temp_extensions = [".tmp", ".part", ".crdownload", ".partial", ".download", ".swp"];
    for ext in &temp_extensions {
        if filename.ends_with(ext) {
            return false;
        }
    }

    // Skip system files
    let skip_names = ["desktop.ini", "thumbs.db", ".ds_store"];
    if skip_names.iter().any(|n| filename.eq_ignore_ascii_case(n)) {
        return false;
    }

    true
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.starts_with('.'))
        .unwrap_or(false)
}

/// Include/exclude rules for one root
pub struct ScanFilter<'a> {
    config: &'a AppConfig,
    root: PathBuf,
    quarantine: PathBuf,
    exclude: Vec<Pattern>,
}

impl<'a> ScanFilter<'a> {
    pub fn new(config: &'a AppConfig, root: &Path) -> Result<Self> {
        let exclude = config
            .scan
            .exclude
            .iter()
            .map(|p| Pattern::new(p))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(Self {
            config,
            root: root.to_path_buf(),
            quarantine: config.quarantine_root(root),
            exclude,
        })
    }

    fn excluded(&self, path: &Path) -> bool {
        let relative = path.strip_prefix(&self.root).unwrap_or(path);
        let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
        self.exclude
            .iter()
            .any(|p| p.matches_path(relative) || p.matches(name))
    }

    /// Whether the walk should descend into a directory
    pub fn allows_dir(&self, path: &Path) -> bool {
        if path == self.root {
            return true;
        }
        if path.starts_with(&self.quarantine) {
            return false;
        }
        let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
        if name.contains(STAGING_MARKER) {
            return false;
        }
        if !self.config.scan.include_hidden && is_hidden(path) {
            return false;
        }
        !self.excluded(path)
    }

    /// Whether a file passes every filter
    pub fn allows_file(&self, record: &FileRecord) -> bool {
        let path = &record.path;
        if !should_process(path) {
            return false;
        }
        if !self.config.scan.include_hidden && is_hidden(path) {
            return false;
        }
        if path.starts_with(&self.quarantine) || self.excluded(path) {
            return false;
        }
        self.config.accepts_extension(&record.extension) && self.config.accepts_kind(record.kind)
    }
}

/// Walk `scope` (the root itself or a directory inside it).
///
/// The depth limit counts from `root`, so a subtree scan never reaches
/// deeper than a full scan would. Entries come back sorted by name.
pub fn discover(config: &AppConfig, root: &Path, scope: &Path) -> Result<Discovery> {
    let filter = ScanFilter::new(config, root)?;
    let mut discovery = Discovery::default();

    if !scope.is_dir() {
        debug!("Scan scope {:?} is not a directory, nothing to do", scope);
        return Ok(discovery);
    }
    if scope != root && !filter.allows_dir(scope) {
        return Ok(discovery);
    }

    let scope_depth = scope
        .strip_prefix(root)
        .map(|rel| rel.components().count())
        .unwrap_or(0);

    let mut walker = WalkDir::new(scope).sort_by_file_name();
    if let Some(max_depth) = config.scan.max_depth {
        if scope_depth >= max_depth {
            return Ok(discovery);
        }
        walker = walker.max_depth(max_depth - scope_depth);
    }

    let entries = walker
        .into_iter()
        .filter_entry(|e: &DirEntry| !e.file_type().is_dir() || filter.allows_dir(e.path()));

    for entry in entries {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| scope.to_path_buf());
                warn!("Cannot read {:?}: {}", path, e);
                discovery.errors.push((path, std::io::Error::from(e).into()));
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let size = match entry.metadata() {
            Ok(m) => m.len(),
            Err(e) => {
                warn!("Cannot stat {:?}: {}", entry.path(), e);
                discovery.errors.push((entry.path().to_path_buf(), std::io::Error::from(e).into()));
                continue;
            }
        };

        let record = FileRecord::new(root, entry.path(), size);
        if filter.allows_file(&record) {
            discovery.records.push(record);
        } else {
            debug!("Filtered out: {:?}", entry.path());
        }
    }

    Ok(discovery)
}
