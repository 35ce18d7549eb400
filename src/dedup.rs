// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Deduplication engine
//!
//! Every record goes `Unknown -> Original | Duplicate`. The first file seen
//! with a fingerprint is the original; every later one is a duplicate of
//! that original. Lookup and insertion happen under a single lock so two
//! files with the same content can never both become originals.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, warn};

use crate::config::DuplicateAction;
use crate::identity::{self, Fingerprint};
use crate::placement;
use crate::record::{DedupStatus, FileRecord};
use crate::{AppConfig, Result, SortwiseError};

/// Durable fingerprint index shared across runs
pub trait GlobalDedupStore: Send + Sync {
    /// Path recorded for a fingerprint
    fn lookup(&self, fingerprint: &Fingerprint) -> Result<Option<PathBuf>>;

    /// Record a first sighting
    fn insert(&self, fingerprint: &Fingerprint, path: &Path) -> Result<()>;

    /// The original moved to `path`
    fn relocate(&self, fingerprint: &Fingerprint, path: &Path) -> Result<()>;
}

/// What was done with a duplicate
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disposition {
    /// Not a duplicate; continues down the pipeline
    Proceed,
    /// Left in place
    Kept,
    /// Moved into quarantine
    Quarantined(PathBuf),
    Deleted,
    /// The recorded original is this very file
    AlreadyOrganized,
}

/// True if `original` exists and its current content still hashes to `fp`.
///
/// Recorded originals can be edited in place after they were indexed.
fn still_holds(original: &Path, fp: &Fingerprint) -> bool {
    match identity::fingerprint(original) {
        Ok(current) => current == *fp,
        Err(_) => false,
    }
}

/// Local (per run) and optional global fingerprint index
pub struct Deduplicator {
    local: Mutex<HashMap<Fingerprint, PathBuf>>,
    global: Option<Arc<dyn GlobalDedupStore>>,
}

impl Deduplicator {
    pub fn new(global: Option<Arc<dyn GlobalDedupStore>>) -> Self {
        Self {
            local: Mutex::new(HashMap::new()),
            global,
        }
    }

    fn lock_local(&self) -> Result<MutexGuard<'_, HashMap<Fingerprint, PathBuf>>> {
        self.local
            .lock()
            .map_err(|_| SortwiseError::LockPoisoned("fingerprint index"))
    }

    /// Drop the local index (start of a standalone run)
    pub fn reset_local(&self) -> Result<()> {
        self.lock_local()?.clear();
        Ok(())
    }

    /// Number of fingerprints in the local index
    pub fn local_len(&self) -> usize {
        self.lock_local().map(|l| l.len()).unwrap_or(0)
    }

    /// Classify a record as original or duplicate and store the result on it.
    pub fn classify(&self, config: &AppConfig, record: &mut FileRecord) -> Result<DedupStatus> {
        if !config.dedup_enabled() {
            record.status = DedupStatus::Original;
            return Ok(record.status.clone());
        }

        let fp = record.fingerprint()?;
        let status = {
            let mut local = self.lock_local()?;
            self.classify_locked(config, &mut local, fp, &record.path)?
        };

        match &status {
            DedupStatus::Duplicate { original } => {
                debug!("Duplicate: {:?} (original {:?})", record.path, original);
            }
            _ => debug!("Original: {:?}", record.path),
        }

        record.status = status.clone();
        Ok(status)
    }

    fn classify_locked(
        &self,
        config: &AppConfig,
        local: &mut HashMap<Fingerprint, PathBuf>,
        fp: Fingerprint,
        path: &Path,
    ) -> Result<DedupStatus> {
        if let Some(original) = local.get(&fp) {
            if original == path || still_holds(original, &fp) {
                return Ok(DedupStatus::Duplicate { original: original.clone() });
            }
            debug!("Original {:?} no longer holds this content, {:?} takes its place", original, path);
        }

        let global = self.global.as_ref().filter(|_| config.global_dedup_enabled());
        if let Some(global) = global {
            match global.lookup(&fp)? {
                Some(original) if original == path || still_holds(&original, &fp) => {
                    local.insert(fp, original.clone());
                    return Ok(DedupStatus::Duplicate { original });
                }
                Some(stale) => {
                    debug!("Global original {:?} no longer holds this content, {:?} takes its place", stale, path);
                    if !config.rules.dry_run {
                        global.relocate(&fp, path)?;
                    }
                }
                None => {
                    if !config.rules.dry_run {
                        global.insert(&fp, path)?;
                    }
                }
            }
        }

        local.insert(fp, path.to_path_buf());
        Ok(DedupStatus::Original)
    }

    /// Follow an original to its new location after a move.
    pub fn relocate(&self, config: &AppConfig, fp: &Fingerprint, new_path: &Path) -> Result<()> {
        self.lock_local()?.insert(*fp, new_path.to_path_buf());
        if let Some(global) = self.global.as_ref().filter(|_| config.global_dedup_enabled()) {
            if !config.rules.dry_run {
                global.relocate(fp, new_path)?;
            }
        }
        Ok(())
    }

    /// Apply the configured duplicate policy to a classified record.
    pub fn dispose(&self, config: &AppConfig, record: &FileRecord) -> Result<Disposition> {
        let original = match &record.status {
            DedupStatus::Duplicate { original } => original,
            _ => return Ok(Disposition::Proceed),
        };

        if original == &record.path {
            return Ok(Disposition::AlreadyOrganized);
        }

        match config.rules.duplicate_action {
            DuplicateAction::Skip => Ok(Disposition::Kept),
            DuplicateAction::Quarantine => {
                let relative = record.path.strip_prefix(&record.root).unwrap_or(&record.path);
                let target_dir = match relative.parent() {
                    Some(parent) => config.quarantine_root(&record.root).join(parent),
                    None => config.quarantine_root(&record.root),
                };
                let target = placement::unique_destination(&target_dir, &record.file_name());

                if config.rules.dry_run {
                    info!("DRY RUN: Would quarantine {:?} to {:?}", record.path, target);
                } else {
                    placement::move_file(&record.path, &target)?;
                    info!("Quarantined duplicate {:?} -> {:?}", record.path, target);
                }
                Ok(Disposition::Quarantined(target))
            }
            DuplicateAction::Delete => {
                if config.rules.dry_run {
                    info!("DRY RUN: Would delete duplicate {:?}", record.path);
                } else {
                    std::fs::remove_file(&record.path)?;
                    warn!("Deleted duplicate {:?} (original {:?})", record.path, original);
                }
                Ok(Disposition::Deleted)
            }
        }
    }
}
