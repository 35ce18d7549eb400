// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Watch coordinator
//!
//! Turns a stream of filesystem events into debounced, incremental pipeline
//! runs. Events are mapped to the directory they touch; a pending directory
//! restarts its timer on every new event and swallows pending directories
//! nested below it. When timers elapse, all due directories go into a single
//! run. Runs are awaited inline, so there is never more than one at a time;
//! events arriving meanwhile wait in the channel and are coalesced afterwards.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, error, info};

use crate::identity::Fingerprint;
use crate::orchestrator::{wait_for_shutdown, RunSummary};
use crate::scan::STAGING_MARKER;
use crate::watcher::{wait_for_stable, ChangeKind, WatchEvent};
use crate::{AppConfig, Result};

/// Lifecycle of the coordinator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchPhase {
    Idle,
    Watching,
    Debouncing,
    Running,
    Stopped,
}

/// What the last runs saw in one directory
#[derive(Debug, Clone, Default)]
pub struct SubtreeState {
    pub last_run: Option<DateTime<Utc>>,
    pub files: HashMap<PathBuf, Fingerprint>,
}

/// Per-directory memory of processed files, kept for the life of a watch
#[derive(Debug, Default)]
pub struct WatchState {
    subtrees: HashMap<PathBuf, SubtreeState>,
}

fn subtree_of(path: &Path) -> PathBuf {
    path.parent().map(Path::to_path_buf).unwrap_or_default()
}

impl WatchState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Same path, same content as last time
    pub fn is_unchanged(&self, path: &Path, fingerprint: &Fingerprint) -> bool {
        self.subtrees
            .get(&subtree_of(path))
            .and_then(|s| s.files.get(path))
            .map(|fp| fp == fingerprint)
            .unwrap_or(false)
    }

    /// Remember that `path` now holds `fingerprint`
    pub fn remember(&mut self, path: &Path, fingerprint: Fingerprint) {
        self.subtrees
            .entry(subtree_of(path))
            .or_default()
            .files
            .insert(path.to_path_buf(), fingerprint);
    }

    pub fn forget(&mut self, path: &Path) {
        if let Some(subtree) = self.subtrees.get_mut(&subtree_of(path)) {
            subtree.files.remove(path);
        }
    }

    pub fn mark_run(&mut self, scope: &Path, at: DateTime<Utc>) {
        self.subtrees.entry(scope.to_path_buf()).or_default().last_run = Some(at);
    }

    pub fn last_run(&self, scope: &Path) -> Option<DateTime<Utc>> {
        self.subtrees.get(scope).and_then(|s| s.last_run)
    }

    /// Number of files being tracked
    pub fn tracked(&self) -> usize {
        self.subtrees.values().map(|s| s.files.len()).sum()
    }
}

/// Per-directory debounce timers
#[derive(Debug)]
pub struct Debouncer {
    window: Duration,
    pending: BTreeMap<PathBuf, Instant>,
}

impl Debouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            pending: BTreeMap::new(),
        }
    }

    /// Note activity in `subtree` at `now`
    pub fn record(&mut self, subtree: PathBuf, now: Instant) {
        let deadline = now + self.window;

        if let Some(ancestor) = self
            .pending
            .keys()
            .find(|p| subtree.starts_with(p))
            .cloned()
        {
            self.pending.insert(ancestor, deadline);
            return;
        }

        self.pending.retain(|p, _| !p.starts_with(&subtree));
        self.pending.insert(subtree, deadline);
    }

    /// Earliest pending deadline
    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.values().min().copied()
    }

    /// Remove and return every subtree whose quiet period has elapsed
    pub fn take_due(&mut self, now: Instant) -> Vec<PathBuf> {
        let due: Vec<PathBuf> = self
            .pending
            .iter()
            .filter(|(_, deadline)| **deadline <= now)
            .map(|(p, _)| p.clone())
            .collect();
        for p in &due {
            self.pending.remove(p);
        }
        due
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }
}

/// Something that can process a set of directories incrementally
#[async_trait]
pub trait PipelineRunner: Send + Sync {
    async fn run_scopes(
        &self,
        scopes: &[PathBuf],
        state: &mut WatchState,
        shutdown: &watch::Receiver<bool>,
    ) -> Result<RunSummary>;
}

/// Directory an event should trigger a run for
pub fn event_subtree(event: &WatchEvent) -> Option<PathBuf> {
    let in_staging = event
        .path
        .components()
        .any(|c| c.as_os_str().to_string_lossy().contains(STAGING_MARKER));
    if in_staging {
        return None;
    }

    if event.kind != ChangeKind::Removed && event.path.is_dir() {
        Some(event.path.clone())
    } else {
        event.path.parent().map(Path::to_path_buf)
    }
}

/// Drives debounced runs from watcher events
pub struct WatchCoordinator {
    config: Arc<AppConfig>,
    runner: Arc<dyn PipelineRunner>,
    debouncer: Debouncer,
    state: WatchState,
    /// Files written since the last run, checked for stability before it
    touched: HashSet<PathBuf>,
    phase: WatchPhase,
    runs: usize,
}

impl WatchCoordinator {
    pub fn new(config: Arc<AppConfig>, runner: Arc<dyn PipelineRunner>) -> Self {
        let window = Duration::from_millis(config.watch.debounce_ms);
        Self {
            config,
            runner,
            debouncer: Debouncer::new(window),
            state: WatchState::new(),
            touched: HashSet::new(),
            phase: WatchPhase::Idle,
            runs: 0,
        }
    }

    pub fn phase(&self) -> WatchPhase {
        self.phase
    }

    /// Completed runs so far
    pub fn runs(&self) -> usize {
        self.runs
    }

    pub fn state(&self) -> &WatchState {
        &self.state
    }

    /// One full pass over every configured root
    pub async fn process_existing(&mut self, shutdown: &watch::Receiver<bool>) {
        let roots = self.config.roots();
        self.execute(&roots, shutdown).await;
    }

    /// Consume events until the stop signal flips or the event stream ends
    pub async fn run(
        &mut self,
        mut events: UnboundedReceiver<WatchEvent>,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<()> {
        self.phase = WatchPhase::Watching;
        info!(
            "Watching with a {}ms debounce window",
            self.config.watch.debounce_ms
        );

        loop {
            if *shutdown.borrow() {
                break;
            }

            let deadline = self.debouncer.next_deadline();
            tokio::select! {
                biased;

                changed = shutdown.changed() => {
                    if changed.is_err() {
                        debug!("Shutdown sender dropped");
                        break;
                    }
                }

                event = events.recv() => match event {
                    Some(event) => self.on_event(event),
                    None => {
                        debug!("Event stream closed");
                        break;
                    }
                },

                _ = tokio::time::sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    let due = self.debouncer.take_due(Instant::now());
                    if !due.is_empty() {
                        self.execute(&due, &shutdown).await;
                    }
                }
            }
        }

        self.phase = WatchPhase::Stopped;
        info!("Watch stopped after {} runs", self.runs);
        Ok(())
    }

    fn on_event(&mut self, event: WatchEvent) {
        if event.kind == ChangeKind::Removed {
            self.state.forget(&event.path);
            self.touched.remove(&event.path);
        } else if event.path.is_file() {
            self.touched.insert(event.path.clone());
        }
        if let Some(subtree) = event_subtree(&event) {
            debug!("{:?} {:?} -> {:?}", event.kind, event.path, subtree);
            self.debouncer.record(subtree, Instant::now());
            self.phase = WatchPhase::Debouncing;
        }
    }

    /// Give files still being written a chance to finish, unless told to stop
    async fn settle(&mut self, scopes: &[PathBuf], shutdown: &watch::Receiver<bool>) {
        let max_wait = Duration::from_secs(self.config.watch.stability_timeout_secs);
        let (due, rest): (Vec<PathBuf>, Vec<PathBuf>) = self
            .touched
            .drain()
            .partition(|p| scopes.iter().any(|s| p.starts_with(s)));
        self.touched.extend(rest);

        if max_wait.is_zero() || due.is_empty() {
            return;
        }
        debug!("Waiting for {} files to settle", due.len());
        tokio::select! {
            _ = join_all(due.iter().map(|p| wait_for_stable(p, max_wait))) => {}
            _ = wait_for_shutdown(shutdown.clone()) => {
                debug!("Stop requested while {} files were settling", due.len());
            }
        }
    }

    async fn execute(&mut self, scopes: &[PathBuf], shutdown: &watch::Receiver<bool>) {
        self.phase = WatchPhase::Running;
        self.settle(scopes, shutdown).await;
        if *shutdown.borrow() {
            info!("Stop requested, skipping run for {:?}", scopes);
            return;
        }
        info!("Running for {:?}", scopes);

        match self.runner.run_scopes(scopes, &mut self.state, shutdown).await {
            Ok(summary) => summary.log(),
            Err(e) => error!("Run failed: {}", e),
        }
        self.runs += 1;

        self.phase = if self.debouncer.is_empty() {
            WatchPhase::Watching
        } else {
            WatchPhase::Debouncing
        };
    }
}
