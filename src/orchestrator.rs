// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Extraction orchestrator: one pass of the pipeline over a set of directories
//!
//! Files move through the stages in batches:
//!
//! 1. fingerprint (blocking pool, bounded, discovery order kept)
//! 2. dedup, one file at a time in discovery order
//! 3. duplicate disposal and archive extraction; extracted files form the next batch
//! 4. classification and placement, `max_concurrent` at a time
//!
//! Per-file failures end up in the [`RunSummary`]; only configuration
//! problems abort a run, and those are caught before anything is touched.

use async_trait::async_trait;
use chrono::Utc;
use futures_util::stream::{self, StreamExt};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{watch, Mutex as AsyncMutex};
use tracing::{debug, info, warn};

use crate::archive::{ArchiveFormat, ArchiveHandler, ExtractionOutcome};
use crate::coordinator::{PipelineRunner, WatchState};
use crate::db::Database;
use crate::dedup::{Deduplicator, Disposition, GlobalDedupStore};
use crate::history::{create_entry, History};
use crate::identity::Fingerprint;
use crate::placement;
use crate::record::{DedupStatus, FileRecord};
use crate::scan::{self, ScanFilter};
use crate::sorter::{Classification, SmartSorter};
use crate::{AppConfig, ErrorKind, Result, SortwiseError};

/// A file that did not complete normally
#[derive(Debug, Clone, Serialize)]
pub struct FailedFile {
    pub path: PathBuf,
    pub kind: ErrorKind,
    pub message: String,
}

/// Where a file went (or would go, in a dry run)
#[derive(Debug, Clone, Serialize)]
pub struct PlacedFile {
    pub from: PathBuf,
    pub to: PathBuf,
    pub category: String,
    /// False for dry runs and files already in their category directory
    pub moved: bool,
}

/// Outcome of one run
#[derive(Debug, Default, Serialize)]
pub struct RunSummary {
    pub processed: usize,
    pub duplicates: usize,
    pub extracted: usize,
    pub unchanged: usize,
    pub classifier_fallbacks: usize,
    /// Files never started because shutdown was requested
    pub cancelled: usize,
    pub errors: Vec<FailedFile>,
    pub placements: Vec<PlacedFile>,
}

impl RunSummary {
    fn record_error(&mut self, path: PathBuf, error: &SortwiseError) {
        self.errors.push(FailedFile {
            path,
            kind: error.kind(),
            message: error.to_string(),
        });
    }

    /// Files skipped or left half-handled because of an error
    pub fn errored(&self) -> usize {
        self.errors
            .iter()
            .filter(|e| e.kind != ErrorKind::Classifier)
            .count()
    }

    pub fn log(&self) {
        info!(
            "Run complete: {} processed, {} duplicates, {} archives extracted, {} unchanged, {} classifier fallbacks, {} errors",
            self.processed,
            self.duplicates,
            self.extracted,
            self.unchanged,
            self.classifier_fallbacks,
            self.errored()
        );
        if self.cancelled > 0 {
            warn!("{} files not started because of shutdown", self.cancelled);
        }
        for failure in &self.errors {
            warn!("  [{}] {:?}: {}", failure.kind, failure.path, failure.message);
        }
    }
}

enum FileOutcome {
    Placed {
        placed: PlacedFile,
        fingerprint: Option<Fingerprint>,
        failure: Option<SortwiseError>,
    },
    Failed {
        path: PathBuf,
        error: SortwiseError,
        failure: Option<SortwiseError>,
    },
    Cancelled,
}

type Hashed = std::result::Result<(FileRecord, Option<SortwiseError>), (PathBuf, SortwiseError)>;

/// Drives the pipeline for standalone and incremental runs
pub struct Orchestrator {
    config: Arc<AppConfig>,
    dedup: Deduplicator,
    archives: ArchiveHandler,
    sorter: SmartSorter,
    db: Option<Database>,
    history: Option<History>,
    placing: AsyncMutex<()>,
}

impl Orchestrator {
    /// Assemble an orchestrator. Fails if the configuration is invalid.
    pub fn new(
        config: Arc<AppConfig>,
        sorter: SmartSorter,
        archives: ArchiveHandler,
        db: Option<Database>,
        history: Option<History>,
    ) -> Result<Self> {
        config.validate()?;

        let global = db
            .clone()
            .filter(|_| config.global_dedup_enabled())
            .map(|db| Arc::new(db) as Arc<dyn GlobalDedupStore>);

        Ok(Self {
            config,
            dedup: Deduplicator::new(global),
            archives,
            sorter,
            db,
            history,
            placing: AsyncMutex::new(()),
        })
    }

    /// Orchestrator with the database, history and classifier named in the config
    pub fn from_config(config: Arc<AppConfig>) -> Result<Self> {
        config.validate()?;
        let db = Database::open(&config.database.path)?;
        let history = History::new(PathBuf::from(&config.history.path));
        let sorter = SmartSorter::from_config(&config)?;
        info!("Classifier backend: {}", sorter.backend());
        Self::new(config, sorter, ArchiveHandler::default(), Some(db), Some(history))
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn sorter(&self) -> &SmartSorter {
        &self.sorter
    }

    /// Standalone run over every configured root with a fresh local index
    pub async fn run(&self, shutdown: &watch::Receiver<bool>) -> Result<RunSummary> {
        self.dedup.reset_local()?;
        let roots = self.config.roots();
        self.run_inner(&roots, None, shutdown).await
    }

    /// Incremental run over `scopes`, skipping files `state` has already seen
    pub async fn run_incremental(
        &self,
        scopes: &[PathBuf],
        state: &mut WatchState,
        shutdown: &watch::Receiver<bool>,
    ) -> Result<RunSummary> {
        let summary = self.run_inner(scopes, Some(&mut *state), shutdown).await?;
        let now = Utc::now();
        for scope in scopes {
            state.mark_run(scope, now);
        }
        Ok(summary)
    }

    async fn run_inner(
        &self,
        scopes: &[PathBuf],
        mut state: Option<&mut WatchState>,
        shutdown: &watch::Receiver<bool>,
    ) -> Result<RunSummary> {
        let roots = self.config.roots();
        let mut summary = RunSummary::default();
        let mut batch = Vec::new();

        for scope in scopes {
            let root = match root_for(&roots, scope) {
                Some(root) => root,
                None => {
                    warn!("{:?} is outside every configured root, skipping", scope);
                    continue;
                }
            };
            let discovery = scan::discover(&self.config, root, scope)?;
            debug!("{:?}: {} files", scope, discovery.records.len());
            for (path, error) in discovery.errors {
                summary.record_error(path, &error);
            }
            batch.extend(discovery.records);
        }

        while !batch.is_empty() {
            if *shutdown.borrow() {
                summary.cancelled += batch.len();
                break;
            }
            batch = self
                .process_batch(batch, state.as_deref_mut(), &mut summary, shutdown)
                .await?;
        }

        Ok(summary)
    }

    /// Push one batch through every stage; returns files extracted from archives
    async fn process_batch(
        &self,
        batch: Vec<FileRecord>,
        mut state: Option<&mut WatchState>,
        summary: &mut RunSummary,
        shutdown: &watch::Receiver<bool>,
    ) -> Result<Vec<FileRecord>> {
        let limit = self.config.ai_engine.max_concurrent;
        let needs_fingerprint = self.config.dedup_enabled() || state.is_some();

        let hashed: Vec<Hashed> = if needs_fingerprint {
            stream::iter(batch)
                .map(|record| async move {
                    let path = record.path.clone();
                    tokio::task::spawn_blocking(move || {
                        let error = record.fingerprint().err();
                        (record, error)
                    })
                    .await
                    .map_err(|e| (path, SortwiseError::from(std::io::Error::from(e))))
                })
                .buffered(limit)
                .collect()
                .await
        } else {
            batch.into_iter().map(|record| Ok((record, None))).collect()
        };

        let mut originals = Vec::new();
        for item in hashed {
            let mut record = match item {
                Ok((record, None)) => record,
                Ok((record, Some(error))) => {
                    warn!("Cannot read {:?}: {}", record.path, error);
                    summary.record_error(record.path, &error);
                    continue;
                }
                Err((path, error)) => {
                    summary.record_error(path, &error);
                    continue;
                }
            };

            if let (Some(state), Some(fp)) = (state.as_deref(), record.cached_fingerprint()) {
                if state.is_unchanged(&record.path, &fp) {
                    debug!("Unchanged: {:?}", record.path);
                    summary.unchanged += 1;
                    continue;
                }
            }

            match self.dedup.classify(&self.config, &mut record) {
                Ok(DedupStatus::Duplicate { original }) => {
                    summary.duplicates += 1;
                    match self.dedup.dispose(&self.config, &record) {
                        Ok(disposition) => {
                            info!(
                                "Duplicate {:?} of {:?}: {:?}",
                                record.path, original, disposition
                            );
                            let still_there =
                                matches!(disposition, Disposition::Kept | Disposition::AlreadyOrganized);
                            if let (true, Some(state), Some(fp)) =
                                (still_there, state.as_deref_mut(), record.cached_fingerprint())
                            {
                                state.remember(&record.path, fp);
                            }
                        }
                        Err(error) => summary.record_error(record.path, &error),
                    }
                }
                Ok(_) => originals.push(record),
                Err(error) => summary.record_error(record.path, &error),
            }
        }

        let mut next = Vec::new();
        let mut to_sort = Vec::with_capacity(originals.len());
        for record in originals {
            if !self.config.rules.extract_archives || ArchiveFormat::detect(&record.path).is_none() {
                to_sort.push(record);
                continue;
            }

            let path = record.path.clone();
            let handler = self.archives.clone();
            let config = self.config.clone();
            let joined = tokio::task::spawn_blocking(move || {
                let outcome = handler.handle(&config, &record);
                (record, outcome)
            })
            .await;

            let (record, outcome) = match joined {
                Ok(pair) => pair,
                Err(e) => {
                    summary.record_error(path, &SortwiseError::from(std::io::Error::from(e)));
                    continue;
                }
            };

            match outcome {
                Ok(ExtractionOutcome::Extracted { files, source_deleted, .. }) => {
                    summary.extracted += 1;
                    let filter = ScanFilter::new(&self.config, &record.root)?;
                    for file in files {
                        match FileRecord::from_path(&record.root, &file) {
                            Ok(extracted) if filter.allows_file(&extracted) => next.push(extracted),
                            Ok(_) => debug!("Filtered out: {:?}", file),
                            Err(error) => summary.record_error(file, &error),
                        }
                    }
                    if !source_deleted {
                        to_sort.push(record);
                    }
                }
                Ok(ExtractionOutcome::NotApplicable) => to_sort.push(record),
                Err(error) => {
                    warn!("{}", error);
                    summary.record_error(record.path.clone(), &error);
                    // The archive is intact; sort it like any other file
                    to_sort.push(record);
                }
            }
        }

        let outcomes: Vec<FileOutcome> = stream::iter(to_sort)
            .map(|record| self.sort_and_place(record, shutdown))
            .buffer_unordered(limit)
            .collect()
            .await;

        for outcome in outcomes {
            match outcome {
                FileOutcome::Placed { placed, fingerprint, failure } => {
                    summary.processed += 1;
                    if let Some(error) = failure {
                        summary.classifier_fallbacks += 1;
                        summary.record_error(placed.from.clone(), &error);
                    }
                    if let (Some(state), Some(fp)) = (state.as_deref_mut(), fingerprint) {
                        let location = if placed.moved { &placed.to } else { &placed.from };
                        state.remember(location, fp);
                    }
                    summary.placements.push(placed);
                }
                FileOutcome::Failed { path, error, failure } => {
                    if let Some(failure) = failure {
                        summary.classifier_fallbacks += 1;
                        summary.record_error(path.clone(), &failure);
                    }
                    summary.record_error(path, &error);
                }
                FileOutcome::Cancelled => summary.cancelled += 1,
            }
        }

        Ok(next)
    }

    async fn sort_and_place(
        &self,
        mut record: FileRecord,
        shutdown: &watch::Receiver<bool>,
    ) -> FileOutcome {
        if *shutdown.borrow() {
            return FileOutcome::Cancelled;
        }

        let classification = tokio::select! {
            classification = self.sorter.classify(&self.config, &mut record) => classification,
            _ = wait_for_shutdown(shutdown.clone()) => {
                warn!("Shutdown during classification of {:?}, using fallback", record.path);
                Classification::fallback(
                    &self.config,
                    SortwiseError::Classifier("Abandoned at shutdown".to_string()),
                )
            }
        };
        let Classification { category, failure } = classification;
        record.category = Some(category.clone());
        let fingerprint = record.cached_fingerprint();

        let dir = placement::category_dir(&self.config, &record, &category);
        if record.path.parent() == Some(dir.as_path()) {
            debug!("{:?} is already in {}", record.path, category);
            let placed = PlacedFile {
                from: record.path.clone(),
                to: record.path,
                category,
                moved: false,
            };
            return FileOutcome::Placed { placed, fingerprint, failure };
        }

        // Destination choice and move happen together so concurrent files
        // with the same name cannot claim the same path
        let _placing = self.placing.lock().await;
        let to = placement::unique_destination(&dir, &record.file_name());
        let from = record.path;

        if self.config.rules.dry_run {
            info!("DRY RUN: Would move {:?} to {:?}", from, to);
            let placed = PlacedFile { from, to, category, moved: false };
            return FileOutcome::Placed { placed, fingerprint, failure };
        }

        let (src, dst) = (from.clone(), to.clone());
        let moved = tokio::task::spawn_blocking(move || placement::move_file(&src, &dst))
            .await
            .map_err(|e| SortwiseError::from(std::io::Error::from(e)))
            .and_then(|r| r);
        if let Err(error) = moved {
            warn!("Failed to move {:?}: {}", from, error);
            return FileOutcome::Failed { path: from, error, failure };
        }

        info!("{:?} -> {:?} [{}]", from, to, category);
        self.journal(&from, &to, &category, fingerprint.as_ref());

        let placed = PlacedFile { from, to, category, moved: true };
        FileOutcome::Placed { placed, fingerprint, failure }
    }

    /// Bookkeeping after a completed move. Failures here do not undo the move.
    fn journal(&self, from: &Path, to: &Path, category: &str, fingerprint: Option<&Fingerprint>) {
        if let (true, Some(fp)) = (self.config.dedup_enabled(), fingerprint) {
            if let Err(e) = self.dedup.relocate(&self.config, fp, to) {
                warn!("Failed to update fingerprint index for {:?}: {}", to, e);
            }
        }

        if let Some(db) = &self.db {
            if let Err(e) = db.record_placement(from, to, fingerprint, category) {
                warn!("Failed to store placement in database: {}", e);
            }
        }

        if let Some(history) = &self.history {
            let entry = create_entry(
                from.to_path_buf(),
                to.to_path_buf(),
                category.to_string(),
                fingerprint.map(|f| f.to_hex()),
            );
            if let Err(e) = history.append(&entry) {
                warn!("Failed to write history entry: {}", e);
            }
        }
    }
}

#[async_trait]
impl PipelineRunner for Orchestrator {
    async fn run_scopes(
        &self,
        scopes: &[PathBuf],
        state: &mut WatchState,
        shutdown: &watch::Receiver<bool>,
    ) -> Result<RunSummary> {
        self.run_incremental(scopes, state, shutdown).await
    }
}

/// Innermost configured root containing `scope`
fn root_for<'a>(roots: &'a [PathBuf], scope: &Path) -> Option<&'a Path> {
    roots
        .iter()
        .filter(|root| scope.starts_with(root))
        .max_by_key(|root| root.components().count())
        .map(PathBuf::as_path)
}

/// Resolves once the stop signal is set; never if the sender is gone
pub(crate) async fn wait_for_shutdown(mut shutdown: watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow_and_update() {
            return;
        }
        if shutdown.changed().await.is_err() {
            // Nobody can signal any more
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sorter::{ClassifyRequest, Classifier, RuleClassifier};
    use std::fs;

    struct Fixed(&'static str);

    #[async_trait]
    impl Classifier for Fixed {
        fn name(&self) -> &'static str {
            "fixed"
        }

        async fn classify(&self, _request: &ClassifyRequest) -> Result<String> {
            Ok(self.0.to_string())
        }
    }

    fn config_for(root: &Path) -> AppConfig {
        let mut config = AppConfig::default();
        config.watch_paths = vec![root.to_string_lossy().to_string()];
        config.ai_engine.enabled = false;
        config
    }

    fn orchestrator(config: AppConfig, classifier: Arc<dyn Classifier>, db: Option<Database>) -> Orchestrator {
        Orchestrator::new(
            Arc::new(config),
            SmartSorter::new(classifier),
            ArchiveHandler::default(),
            db,
            None,
        )
        .unwrap()
    }

    /// Signals when a classification starts, then never answers
    struct Stalled(Arc<tokio::sync::Notify>);

    #[async_trait]
    impl Classifier for Stalled {
        fn name(&self) -> &'static str {
            "stalled"
        }

        async fn classify(&self, _request: &ClassifyRequest) -> Result<String> {
            self.0.notify_one();
            std::future::pending().await
        }
    }

    fn no_shutdown() -> (watch::Sender<bool>, watch::Receiver<bool>) {
        watch::channel(false)
    }

    #[tokio::test]
    async fn test_duplicate_left_in_place_original_sorted() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::write(root.join("a.txt"), b"same").unwrap();
        fs::write(root.join("b.txt"), b"same").unwrap();
        fs::write(root.join("c.jpg"), b"jpeg").unwrap();

        let orch = orchestrator(config_for(root), Arc::new(RuleClassifier), None);
        let (_tx, rx) = no_shutdown();
        let summary = orch.run(&rx).await.unwrap();

        assert_eq!(summary.processed, 2);
        assert_eq!(summary.duplicates, 1);
        assert!(summary.errors.is_empty());
        assert!(root.join("Documents/a.txt").exists());
        assert!(root.join("b.txt").exists());
        assert!(root.join("Images/c.jpg").exists());
    }

    #[tokio::test]
    async fn test_global_dedup_second_run_sees_only_duplicates() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::write(root.join("a.txt"), b"one").unwrap();
        fs::write(root.join("c.jpg"), b"two").unwrap();

        let mut config = config_for(root);
        config.rules.global_dedup = true;
        let db = Database::in_memory().unwrap();
        let (_tx, rx) = no_shutdown();

        let first = orchestrator(config.clone(), Arc::new(RuleClassifier), Some(db.clone()));
        let summary = first.run(&rx).await.unwrap();
        assert_eq!(summary.processed, 2);

        let second = orchestrator(config, Arc::new(RuleClassifier), Some(db.clone()));
        let summary = second.run(&rx).await.unwrap();
        assert_eq!(summary.processed, 0);
        assert_eq!(summary.duplicates, 2);
        assert!(root.join("Documents/a.txt").exists());
        assert_eq!(db.get_stats().unwrap().placement_count, 2);
    }

    #[tokio::test]
    async fn test_invalid_answer_goes_to_fallback() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::write(root.join("notes.txt"), b"hello").unwrap();

        let orch = orchestrator(config_for(root), Arc::new(Fixed("Spaceships")), None);
        let (_tx, rx) = no_shutdown();
        let summary = orch.run(&rx).await.unwrap();

        assert_eq!(summary.processed, 1);
        assert_eq!(summary.classifier_fallbacks, 1);
        assert_eq!(summary.errored(), 0);
        assert_eq!(summary.errors[0].kind, ErrorKind::Classifier);
        assert!(root.join("Uncategorized/notes.txt").exists());
    }

    #[tokio::test]
    async fn test_dry_run_moves_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::write(root.join("report.txt"), b"q3").unwrap();

        let mut config = config_for(root);
        config.rules.dry_run = true;
        let orch = orchestrator(config, Arc::new(Fixed("Work")), None);
        let (_tx, rx) = no_shutdown();
        let summary = orch.run(&rx).await.unwrap();

        assert!(root.join("report.txt").exists());
        assert!(!root.join("Work").exists());
        assert_eq!(summary.placements.len(), 1);
        assert_eq!(summary.placements[0].to, root.join("Work/report.txt"));
        assert!(!summary.placements[0].moved);
    }

    #[tokio::test]
    async fn test_incremental_skips_unchanged_files() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::write(root.join("a.txt"), b"first").unwrap();

        let mut config = config_for(root);
        config.rules.dry_run = true;
        let orch = orchestrator(config, Arc::new(RuleClassifier), None);
        let (_tx, rx) = no_shutdown();
        let mut state = WatchState::new();
        let scopes = vec![root.to_path_buf()];

        let first = orch.run_incremental(&scopes, &mut state, &rx).await.unwrap();
        assert_eq!(first.processed, 1);
        assert!(state.last_run(root).is_some());

        fs::write(root.join("b.md"), b"second").unwrap();
        let second = orch.run_incremental(&scopes, &mut state, &rx).await.unwrap();
        assert_eq!(second.unchanged, 1);
        assert_eq!(second.processed, 1);
    }

    #[tokio::test]
    async fn test_edited_original_does_not_swallow_new_copy() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::write(root.join("a.txt"), b"X").unwrap();

        let mut config = config_for(root);
        config.rules.duplicate_action = crate::config::DuplicateAction::Delete;
        let orch = orchestrator(config, Arc::new(RuleClassifier), None);
        let (_tx, rx) = no_shutdown();
        let mut state = WatchState::new();
        let scopes = vec![root.to_path_buf()];

        orch.run_incremental(&scopes, &mut state, &rx).await.unwrap();
        assert!(root.join("Documents/a.txt").exists());

        // The sorted original is rewritten in place, then the old content reappears
        fs::write(root.join("Documents/a.txt"), b"Y").unwrap();
        fs::write(root.join("new.txt"), b"X").unwrap();

        let summary = orch.run_incremental(&scopes, &mut state, &rx).await.unwrap();
        assert_eq!(summary.duplicates, 0);
        assert_eq!(fs::read(root.join("Documents/new.txt")).unwrap(), b"X");
        assert_eq!(fs::read(root.join("Documents/a.txt")).unwrap(), b"Y");
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_mid_run_finishes_in_flight_file() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::write(root.join("a.txt"), b"first").unwrap();
        fs::write(root.join("b.txt"), b"second").unwrap();

        let mut config = config_for(root);
        config.ai_engine.max_concurrent = 1;
        config.ai_engine.timeout_secs = 600;
        let started = Arc::new(tokio::sync::Notify::new());
        let orch = orchestrator(config, Arc::new(Stalled(started.clone())), None);
        let (tx, rx) = no_shutdown();

        let stop = async {
            started.notified().await;
            tx.send(true).unwrap();
        };
        let (summary, _) = tokio::join!(orch.run(&rx), stop);
        let summary = summary.unwrap();

        // a.txt was mid-classification: it falls back and is moved whole
        assert_eq!(summary.processed, 1);
        assert_eq!(summary.classifier_fallbacks, 1);
        assert!(!root.join("a.txt").exists());
        assert_eq!(fs::read(root.join("Uncategorized/a.txt")).unwrap(), b"first");

        // b.txt never started
        assert_eq!(summary.cancelled, 1);
        assert!(root.join("b.txt").exists());
        assert!(!root.join("Uncategorized/b.txt").exists());
    }

    #[tokio::test]
    async fn test_shutdown_before_start_touches_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::write(root.join("a.txt"), b"x").unwrap();

        let orch = orchestrator(config_for(root), Arc::new(RuleClassifier), None);
        let (tx, rx) = no_shutdown();
        tx.send(true).unwrap();
        let summary = orch.run(&rx).await.unwrap();

        assert_eq!(summary.cancelled, 1);
        assert!(root.join("a.txt").exists());
    }

    #[test]
    fn test_invalid_config_is_fatal() {
        let mut config = AppConfig::default();
        config.scan.max_depth = Some(0);
        let err = Orchestrator::new(
            Arc::new(config),
            SmartSorter::new(Arc::new(RuleClassifier)),
            ArchiveHandler::default(),
            None,
            None,
        )
        .err()
        .unwrap();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_root_for_prefers_innermost() {
        let roots = vec![PathBuf::from("/data"), PathBuf::from("/data/inbox")];
        assert_eq!(root_for(&roots, Path::new("/data/inbox/x")), Some(Path::new("/data/inbox")));
        assert_eq!(root_for(&roots, Path::new("/data/other")), Some(Path::new("/data")));
        assert_eq!(root_for(&roots, Path::new("/elsewhere")), None);
    }
}
