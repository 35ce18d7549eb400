// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! File system watcher for monitoring directories

use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tracing::{debug, info, warn};

use crate::Result;

/// What happened to a path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Created,
    Modified,
    Removed,
}

/// A change reported by the watcher
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchEvent {
    pub path: PathBuf,
    pub kind: ChangeKind,
}

impl WatchEvent {
    pub fn new(path: impl Into<PathBuf>, kind: ChangeKind) -> Self {
        Self { path: path.into(), kind }
    }

    pub fn created(path: impl Into<PathBuf>) -> Self {
        Self::new(path, ChangeKind::Created)
    }
}

/// File system watcher feeding a tokio channel
pub struct FileWatcher {
    watcher: RecommendedWatcher,
    watched_paths: Vec<PathBuf>,
}

impl FileWatcher {
    /// Create a watcher and the receiving end of its event stream
    pub fn new() -> Result<(Self, UnboundedReceiver<WatchEvent>)> {
        let (tx, rx) = unbounded_channel();

        let config = Config::default()
            .with_poll_interval(Duration::from_secs(2));

        let watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| forward(&tx, res),
            config,
        )?;

        Ok((
            Self {
                watcher,
                watched_paths: Vec::new(),
            },
            rx,
        ))
    }

    /// Add a directory tree to watch
    pub fn watch(&mut self, path: &Path) -> Result<()> {
        // Create directory if it doesn't exist
        if !path.exists() {
            std::fs::create_dir_all(path)?;
            info!("Created watch directory: {:?}", path);
        }

        self.watcher.watch(path, RecursiveMode::Recursive)?;
        self.watched_paths.push(path.to_path_buf());
        info!("Watching: {:?}", path);

        Ok(())
    }

    /// Get currently watched paths
    pub fn watched_paths(&self) -> &[PathBuf] {
        &self.watched_paths
    }
}

fn forward(tx: &UnboundedSender<WatchEvent>, res: notify::Result<Event>) {
    match res {
        Ok(event) => {
            for change in convert_event(event) {
                // Receiver gone means the coordinator has stopped
                if tx.send(change).is_err() {
                    return;
                }
            }
        }
        Err(e) => warn!("Watch error: {}", e),
    }
}

/// Convert notify event to our event type
fn convert_event(event: Event) -> Vec<WatchEvent> {
    let kind = match event.kind {
        EventKind::Create(_) => ChangeKind::Created,
        EventKind::Modify(_) => ChangeKind::Modified,
        EventKind::Remove(_) => ChangeKind::Removed,
        _ => return Vec::new(),
    };
    event.paths.into_iter().map(|p| WatchEvent::new(p, kind)).collect()
}

/// Wait for file to be stable (not being written)
pub async fn wait_for_stable(path: &Path, max_wait: Duration) -> bool {
    let check_interval = Duration::from_millis(500);
    let start = tokio::time::Instant::now();

    let mut last_size = match std::fs::metadata(path) {
        Ok(m) => m.len(),
        Err(_) => return false,
    };

    loop {
        tokio::time::sleep(check_interval).await;

        if start.elapsed() > max_wait {
            warn!("File stability check timed out for {:?}", path);
            return true; // Proceed anyway
        }

        let current_size = match std::fs::metadata(path) {
            Ok(m) => m.len(),
            Err(_) => return false, // File was deleted
        };

        if current_size == last_size {
            return true;
        }

        last_size = current_size;
        debug!("File {:?} still being written, size: {}", path, current_size);
    }
}
